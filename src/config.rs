// =============================================================================
// Config (C11) — environment-driven startup configuration
// =============================================================================
//
// Loaded once at startup; any missing required value is fatal. Grounded in
// the teacher's `RuntimeConfig::load`: env-driven rather than file-driven
// here, since every tunable in this repo is per-process rather than
// hot-reloadable.
// =============================================================================

use std::str::FromStr;

use tracing::info;

use crate::error::EngineError;
use crate::types::Environment;

fn env_var(key: &str) -> Result<String, EngineError> {
    std::env::var(key).map_err(|_| EngineError::Configuration(format!("missing required environment variable '{key}'")))
}

/// The signing key for the active environment, as `address:secret`. Agent
/// wallets authenticate with a key pair; the address half is also the
/// identity passed to `VenuePort::user_role`.
pub struct VenueKey {
    pub address: String,
    pub secret: String,
}

impl FromStr for VenueKey {
    type Err = EngineError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (address, secret) = raw.split_once(':').ok_or_else(|| {
            EngineError::Configuration("venue key must be formatted as 'address:secret'".to_string())
        })?;
        if address.is_empty() || secret.is_empty() {
            return Err(EngineError::Configuration("venue key address/secret must be non-empty".to_string()));
        }
        Ok(VenueKey { address: address.to_string(), secret: secret.to_string() })
    }
}

pub struct Config {
    pub environment: Environment,
    pub venue_key: VenueKey,
    pub venue_base_url: String,
    pub mongo_url: Option<String>,
    pub db_name: String,
    pub bind_addr: String,
    pub admin_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, EngineError> {
        let environment: Environment = std::env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "testnet".to_string())
            .parse()
            .map_err(EngineError::Configuration)?;

        let active_key_var = match environment {
            Environment::Testnet => "HYPERLIQUID_TESTNET_KEY",
            Environment::Mainnet => "HYPERLIQUID_MAINNET_KEY",
        };
        let venue_key: VenueKey = env_var(active_key_var)?.parse()?;

        let venue_base_url = match environment {
            Environment::Testnet => "https://api.hyperliquid-testnet.xyz".to_string(),
            Environment::Mainnet => "https://api.hyperliquid.xyz".to_string(),
        };

        let mongo_url = std::env::var("MONGO_URL").ok();
        let db_name = std::env::var("DB_NAME").unwrap_or_else(|_| "signal_bridge".to_string());
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".to_string());
        let admin_token = std::env::var("ADMIN_TOKEN").ok();

        if admin_token.is_none() {
            tracing::warn!("ADMIN_TOKEN is not set — all authenticated control endpoints will reject every request");
        }

        info!(
            environment = %environment,
            store = if mongo_url.is_some() { "mongodb" } else { "memory" },
            %bind_addr,
            "configuration loaded"
        );

        Ok(Self { environment, venue_key, venue_base_url, mongo_url, db_name, bind_addr, admin_token })
    }

    /// Re-read and swap to a different environment's key at runtime, for the
    /// `POST /environment` control endpoint. Does not restart the process.
    pub fn for_environment(environment: Environment) -> Result<(VenueKey, String), EngineError> {
        let active_key_var = match environment {
            Environment::Testnet => "HYPERLIQUID_TESTNET_KEY",
            Environment::Mainnet => "HYPERLIQUID_MAINNET_KEY",
        };
        let venue_key: VenueKey = env_var(active_key_var)?.parse()?;
        let venue_base_url = match environment {
            Environment::Testnet => "https://api.hyperliquid-testnet.xyz".to_string(),
            Environment::Mainnet => "https://api.hyperliquid.xyz".to_string(),
        };
        Ok((venue_key, venue_base_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn venue_key_parses_address_and_secret() {
        let key: VenueKey = "0xabc:supersecret".parse().unwrap();
        assert_eq!(key.address, "0xabc");
        assert_eq!(key.secret, "supersecret");
    }

    #[test]
    fn venue_key_rejects_missing_separator() {
        let err = "no-colon-here".parse::<VenueKey>().unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }
}
