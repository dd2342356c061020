pub mod directory;
pub mod error;
pub mod membership;
pub mod memory;
pub mod messages;
pub mod notify;
pub mod phone;
pub mod resolver;
pub mod service;
pub mod store;

pub use error::{ConversationError, ErrorKind, Result, StoreError, UniqueField};
pub use memory::MemoryStore;
pub use service::ConversationService;
