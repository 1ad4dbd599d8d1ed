//! Process-level configuration: CLI flags plus the long-term keys file.

use std::collections::HashMap;

use clap::Parser;
use serde::Deserialize;

#[derive(Debug, Clone, Parser)]
#[command(name = "didserver", about = "Registrar and resolver for did:jlinc:")]
pub struct ServerConfig {
    /// Address to bind the HTTP server to.
    #[arg(long, env = "DIDSERVER_BIND_ADDR", default_value = "127.0.0.1:5001")]
    pub bind_addr: String,

    /// Path to the SQLite database file.
    #[arg(long, env = "DIDSERVER_DB_PATH", default_value = "./didserver.db")]
    pub db_path: String,

    /// Path to the TOML file holding the service's long-term keypair and contexts.
    #[arg(long, env = "DIDSERVER_KEYS_FILE", default_value = "./keys.toml")]
    pub keys_file: String,

    /// Base URL used to build `Location` headers for supersede redirects.
    #[arg(long, env = "DIDSERVER_BASE_URL", default_value = "http://localhost:5001")]
    pub base_url: String,

    /// Disables the document `created` clock-skew check. Test environments only.
    #[arg(long, env = "DIDSERVER_TEST_MODE", default_value_t = false)]
    pub test_mode: bool,

    /// Durable error log for chainlink append failures.
    #[arg(
        long,
        env = "DIDSERVER_CHAINLINK_ERROR_LOG",
        default_value = "./log/chainlink.log"
    )]
    pub chainlink_error_log: String,
}

/// The service's long-term keypair and recognized `@context` strings, loaded
/// once at startup from `keys_file` and never mutated thereafter.
#[derive(Debug, Clone, Deserialize)]
pub struct Keys {
    /// Base64url-encoded Ed25519 signing public key, published at `GET /`.
    pub signing_public: String,
    /// Base64url-encoded Ed25519 signing secret key.
    pub signing_secret: String,
    /// Base64url-encoded X25519 box public key.
    pub box_public: String,
    /// Base64url-encoded X25519 box secret key.
    pub box_secret: String,
    pub context_v1: String,
    pub context_v2: String,
    /// Shared HMAC keys for trusted agent-register callers, keyed by agent key.
    /// Values are base64url-encoded HMAC secrets.
    #[serde(default)]
    pub agent_keys: HashMap<String, String>,
}

impl Keys {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let keys: Keys = toml::from_str(&raw)?;
        Ok(keys)
    }

    pub fn box_secret_key(&self) -> anyhow::Result<crypto_box::SecretKey> {
        let bytes = crate::crypto::base64url_decode(&self.box_secret)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("box_secret must decode to 32 bytes"))?;
        Ok(crypto_box::SecretKey::from(arr))
    }

    pub fn recognized_contexts(&self) -> crate::document::RecognizedContexts {
        crate::document::RecognizedContexts {
            v1: self.context_v1.clone(),
            v2: self.context_v2.clone(),
        }
    }
}
