use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{ClientError, ClientResult};
use crate::storage::{open_store, LocalStore};

#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    #[serde(default = "default_ratings_url")]
    pub ratings_url: String,
    #[serde(default = "default_moderation_url")]
    pub moderation_url: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

fn default_ratings_url() -> String { "http://localhost:3101".into() }
fn default_moderation_url() -> String { "http://localhost:3102".into() }
fn default_timeout() -> u64 { 15 }

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ratings_url: default_ratings_url(),
            moderation_url: default_moderation_url(),
            access_token: None,
            timeout_secs: default_timeout(),
            store_path: None,
        }
    }
}

impl ClientConfig {
    /// Read `UPICKS_CLIENT__*` variables. Unlike the services, a client
    /// with a malformed environment refuses to start.
    pub fn load() -> Result<Self, ClientError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("UPICKS_CLIENT").separator("__"))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ClientError::Config(e.to_string()))
    }

    /// Open the device store at `store_path`, in memory when unset.
    pub fn local_store(&self) -> ClientResult<Box<dyn LocalStore>> {
        open_store(self.store_path.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_services() {
        let config: ClientConfig = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(config.ratings_url, "http://localhost:3101");
        assert_eq!(config.moderation_url, "http://localhost:3102");
        assert_eq!(config.timeout_secs, 15);
        assert!(config.access_token.is_none());
    }
}
