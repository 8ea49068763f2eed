//! Configuration loaded from environment variables.

use std::env;

use anyhow::{Context, Result};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Fallback culture used when a variant request omits one on a
    /// varying type (default: "en-us").
    pub default_culture: String,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load .env if present; ignore errors (production uses real env vars)
        dotenvy::dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let default_culture = env::var("DEFAULT_CULTURE")
            .unwrap_or_else(|_| "en-us".to_string())
            .to_lowercase();

        Ok(Self {
            database_url,
            database_max_connections,
            default_culture,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn config_struct_defaults() {
        let config = EngineConfig {
            database_url: "postgres://localhost/stampa".to_string(),
            database_max_connections: 10,
            default_culture: "en-us".to_string(),
        };

        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.default_culture, "en-us");
    }
}
