//! Server configuration

use anyhow::Result;
use chrono::Duration;

/// HTTP server and session settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address (default: 0.0.0.0:3000)
    pub bind_address: String,
    /// Permanent session lifetime; `None` means sessions never expire
    pub session_ttl: Option<Duration>,
}

impl ServerConfig {
    /// Create a new ServerConfig from environment variables
    ///
    /// # Environment Variables
    /// - `BIND_ADDRESS`: Listen address (default: 0.0.0.0:3000)
    /// - `SESSION_TTL`: Permanent session lifetime in seconds (optional)
    pub fn from_env() -> Result<Self> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let session_ttl = match std::env::var("SESSION_TTL") {
            Ok(value) if !value.trim().is_empty() => {
                let seconds: i64 = value
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("SESSION_TTL must be a number of seconds"))?;
                if seconds <= 0 {
                    anyhow::bail!("SESSION_TTL must be positive");
                }
                Some(Duration::seconds(seconds))
            }
            _ => None,
        };

        Ok(ServerConfig {
            bind_address,
            session_ttl,
        })
    }
}
