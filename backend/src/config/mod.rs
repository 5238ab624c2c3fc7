//! Application configuration management

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind to
    pub host: String,

    /// Server port
    pub port: u16,

    /// gvmd Unix domain socket
    pub gvmd_socket_path: PathBuf,

    /// Timeout for a single GMP command
    pub gmp_timeout: Duration,

    /// Secret used to sign session tokens
    pub jwt_secret: String,

    /// Inactivity timeout of a session
    pub session_timeout: chrono::TimeDelta,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // JWT_SECRET should be set in production; generate a random one for development
        let jwt_secret = var("JWT_SECRET")
            .unwrap_or_else(|| format!("dev-secret-{}", uuid::Uuid::new_v4().simple()));

        let gmp_timeout_secs: u64 = var("GMP_TIMEOUT_SECS")
            .unwrap_or_else(|| "60".to_string())
            .parse()
            .context("Invalid GMP_TIMEOUT_SECS")?;

        let session_timeout_minutes: i64 = var("SESSION_TIMEOUT_MINUTES")
            .unwrap_or_else(|| "60".to_string())
            .parse()
            .context("Invalid SESSION_TIMEOUT_MINUTES")?;

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),

            port: var("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse()
                .context("Invalid PORT")?,

            gvmd_socket_path: var("GVMD_SOCKET_PATH")
                .unwrap_or_else(|| "/run/gvmd/gvmd.sock".to_string())
                .into(),

            gmp_timeout: Duration::from_secs(gmp_timeout_secs),

            jwt_secret,

            session_timeout: chrono::TimeDelta::minutes(session_timeout_minutes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.gvmd_socket_path, PathBuf::from("/run/gvmd/gvmd.sock"));
        assert_eq!(config.gmp_timeout, Duration::from_secs(60));
        assert_eq!(config.session_timeout, chrono::TimeDelta::minutes(60));
        assert!(config.jwt_secret.starts_with("dev-secret-"));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "9392"),
            ("GVMD_SOCKET_PATH", "/tmp/gvmd.sock"),
            ("JWT_SECRET", "s3cret"),
            ("SESSION_TIMEOUT_MINUTES", "5"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9392);
        assert_eq!(config.gvmd_socket_path, PathBuf::from("/tmp/gvmd.sock"));
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.session_timeout, chrono::TimeDelta::minutes(5));
    }

    #[test]
    fn test_invalid_port() {
        assert!(Config::from_lookup(lookup(&[("PORT", "http")])).is_err());
    }
}
