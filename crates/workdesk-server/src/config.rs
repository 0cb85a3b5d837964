use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Server settings, read from the environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = lookup("WORKDESK_PORT").unwrap_or_else(|| "3000".into());
        Ok(Self {
            db_path: PathBuf::from(lookup("WORKDESK_DB_PATH").unwrap_or_else(|| "workdesk.db".into())),
            jwt_secret: lookup("WORKDESK_JWT_SECRET").unwrap_or_else(|| "dev-secret-change-me".into()),
            host: lookup("WORKDESK_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: port
                .parse()
                .with_context(|| format!("WORKDESK_PORT is not a port number: {port}"))?,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}
