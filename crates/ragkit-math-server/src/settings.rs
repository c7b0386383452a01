use anyhow::{Context, Result};
use figment::providers::{Env, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

impl ServerSettings {
    /// Defaults overridden by `RAGKIT_MATH__*` variables
    pub fn from_env() -> Result<Self> {
        Figment::new()
            .merge(Serialized::defaults(ServerSettings::default()))
            .merge(Env::prefixed("RAGKIT_MATH__"))
            .extract()
            .context("Failed to load math server settings")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bind_address() {
        assert_eq!(ServerSettings::default().bind, "0.0.0.0:8080");
    }

    #[test]
    fn explicit_bind_deserializes() {
        let settings: ServerSettings = Figment::new()
            .merge(Serialized::defaults(ServerSettings::default()))
            .merge(Serialized::default("bind", "127.0.0.1:9090"))
            .extract()
            .unwrap();
        assert_eq!(settings.bind, "127.0.0.1:9090");
    }
}
