use std::sync::Arc;

use parley_core::ConversationService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub service: ConversationService,
    pub jwt_secret: String,
}

impl AppStateInner {
    pub fn new(service: ConversationService, jwt_secret: impl Into<String>) -> AppState {
        Arc::new(Self {
            service,
            jwt_secret: jwt_secret.into(),
        })
    }
}
