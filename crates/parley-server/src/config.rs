use std::net::SocketAddr;

use anyhow::{Context, Result, bail};

use parley_core::phone::PhoneRegion;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

/// Sentinel path selecting the in-process store.
pub const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub jwt_secret: String,
    pub push_webhook_url: Option<String>,
    pub phone_region: PhoneRegion,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = get("PARLEY_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("PARLEY_JWT_SECRET is unset or still a placeholder; it must match the identity provider's signing secret");
        }

        let port = match get("PARLEY_PORT") {
            Some(p) => p.parse().with_context(|| format!("invalid PARLEY_PORT {}", p))?,
            None => 3000,
        };

        let phone_region = match get("PARLEY_PHONE_REGION") {
            Some(r) => r.parse().map_err(anyhow::Error::msg)?,
            None => PhoneRegion::default(),
        };

        Ok(Self {
            host: get("PARLEY_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: get("PARLEY_DB_PATH").unwrap_or_else(|| "parley.db".into()),
            jwt_secret,
            push_webhook_url: get("PARLEY_PUSH_WEBHOOK_URL").filter(|u| !u.is_empty()),
            phone_region,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    pub fn in_memory(&self) -> bool {
        self.db_path == IN_MEMORY
    }
}
