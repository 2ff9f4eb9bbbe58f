//! Process configuration from `APP_`-prefixed environment variables
//!
//! `.env` files are loaded by the binary before this is read.

use serde::Deserialize;

use crate::result_ext::ResultExt;
use crate::store::SeedUser;
use crate::{ApiError, Result};

const PREFIX: &str = "APP_";

#[derive(Deserialize, Clone)]
pub struct AppConfig {
    /// Shared HS256 secret for bearer tokens (`APP_SECRET`)
    pub secret: String,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// PostgreSQL URL. Without it the in-memory store is used.
    pub database_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    /// Users created at startup, `name:email` pairs separated by commas
    /// (`APP_SEED_USERS`)
    pub seed_users: Option<String>,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Load from an explicit set of variables
    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config = envy::prefixed(PREFIX)
            .from_iter::<_, AppConfig>(vars)
            .log("Provide missing application environment variables")
            .map_err(|e| ApiError::InvalidArgument(e.to_string()))?;

        if config.secret.trim().is_empty() {
            return Err(ApiError::InvalidArgument("APP_SECRET must not be empty".to_string()));
        }
        Ok(config)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn seed_users(&self) -> Result<Vec<SeedUser>> {
        let Some(raw) = self.seed_users.as_deref() else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| match entry.split_once(':') {
                Some((name, email)) if !name.trim().is_empty() && email.contains('@') => Ok(SeedUser {
                    name: name.trim().to_string(),
                    email: email.trim().to_string(),
                }),
                _ => Err(ApiError::InvalidArgument(format!(
                    "APP_SEED_USERS entry '{}' is not 'name:email'",
                    entry
                ))),
            })
            .collect()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("secret", &"<redacted>")
            .field("bind", &self.bind)
            .field("port", &self.port)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .field("seed_users", &self.seed_users)
            .finish()
    }
}
