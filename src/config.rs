//! Network configuration with TOML and environment variable support.

use crate::error::Error;
use crate::group::MAX_GROUP_SIZE;
use serde::{Deserialize, Serialize};

/// Which public network the node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    MainNet,
    TestNet,
    LocalNet,
}

impl Network {
    /// Explorer base URL for this network.
    pub fn explorer_base_url(&self) -> &'static str {
        match self {
            Network::MainNet => "https://lora.algokit.io/mainnet",
            Network::TestNet => "https://lora.algokit.io/testnet",
            Network::LocalNet => "https://lora.algokit.io/localnet",
        }
    }
}

impl std::str::FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::MainNet),
            "testnet" => Ok(Network::TestNet),
            "localnet" => Ok(Network::LocalNet),
            other => Err(Error::Config(format!("unknown network {:?}", other))),
        }
    }
}

/// Settings shared by every orchestrated action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub network: Network,

    /// Node API endpoint
    pub algod_server: String,
    pub algod_port: Option<u16>,
    pub algod_token: String,

    /// Explorer used for outcome links; defaults to the network's explorer
    pub explorer_base_url: String,

    /// Largest atomic group the ledger accepts
    pub max_group_size: usize,

    /// Rounds to wait for confirmation before giving up
    pub confirmation_rounds: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            network: Network::TestNet,
            algod_server: "https://testnet-api.algonode.cloud".to_string(),
            algod_port: None,
            algod_token: String::new(),
            explorer_base_url: Network::TestNet.explorer_base_url().to_string(),
            max_group_size: MAX_GROUP_SIZE,
            confirmation_rounds: 4,
        }
    }
}

impl NetworkConfig {
    pub fn localnet() -> Self {
        Self {
            network: Network::LocalNet,
            algod_server: "http://localhost".to_string(),
            algod_port: Some(4001),
            algod_token: "a".repeat(64),
            explorer_base_url: Network::LocalNet.explorer_base_url().to_string(),
            ..Self::default()
        }
    }

    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| Error::Config(format!("failed to parse TOML config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with environment variables.
    pub fn from_env() -> Result<Self, Error> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay values from `lookup`, which maps a variable name to its value.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(network) = lookup("ALGOD_NETWORK") {
            self.network = network.parse()?;
            self.explorer_base_url = self.network.explorer_base_url().to_string();
        }

        if let Some(server) = lookup("ALGOD_SERVER") {
            self.algod_server = server;
        }

        if let Some(port) = lookup("ALGOD_PORT") {
            self.algod_port = if port.is_empty() {
                None
            } else {
                Some(
                    port.parse()
                        .map_err(|e| Error::Config(format!("invalid ALGOD_PORT: {}", e)))?,
                )
            };
        }

        if let Some(token) = lookup("ALGOD_TOKEN") {
            self.algod_token = token;
        }

        if let Some(url) = lookup("EXPLORER_BASE_URL") {
            self.explorer_base_url = url;
        }

        if let Some(size) = lookup("MAX_GROUP_SIZE") {
            self.max_group_size = size
                .parse()
                .map_err(|e| Error::Config(format!("invalid MAX_GROUP_SIZE: {}", e)))?;
        }

        if let Some(rounds) = lookup("CONFIRMATION_ROUNDS") {
            self.confirmation_rounds = rounds
                .parse()
                .map_err(|e| Error::Config(format!("invalid CONFIRMATION_ROUNDS: {}", e)))?;
        }

        self.validate()
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.algod_server.is_empty() {
            return Err(Error::Config("algod_server must not be empty".to_string()));
        }
        if self.max_group_size == 0 || self.max_group_size > MAX_GROUP_SIZE {
            return Err(Error::Config(format!(
                "max_group_size must be between 1 and {}",
                MAX_GROUP_SIZE
            )));
        }
        if self.confirmation_rounds == 0 {
            return Err(Error::Config("confirmation_rounds must be positive".to_string()));
        }
        Ok(())
    }

    /// Node URL including the port, if one is set.
    pub fn algod_url(&self) -> String {
        let server = self.algod_server.trim_end_matches('/');
        match self.algod_port {
            Some(port) => format!("{}:{}", server, port),
            None => server.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_is_testnet() {
        let config = NetworkConfig::default();
        assert_eq!(config.network, Network::TestNet);
        assert_eq!(config.explorer_base_url, "https://lora.algokit.io/testnet");
        assert_eq!(config.max_group_size, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overlay() {
        let vars: HashMap<&str, &str> = [
            ("ALGOD_NETWORK", "localnet"),
            ("ALGOD_SERVER", "http://127.0.0.1/"),
            ("ALGOD_PORT", "4001"),
            ("CONFIRMATION_ROUNDS", "10"),
        ]
        .into_iter()
        .collect();

        let mut config = NetworkConfig::default();
        config
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.network, Network::LocalNet);
        assert_eq!(config.algod_url(), "http://127.0.0.1:4001");
        assert_eq!(config.explorer_base_url, "https://lora.algokit.io/localnet");
        assert_eq!(config.confirmation_rounds, 10);
    }

    #[test]
    fn test_env_rejects_bad_values() {
        let mut config = NetworkConfig::default();
        let err = config
            .apply_env(|key| (key == "MAX_GROUP_SIZE").then(|| "32".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let mut config = NetworkConfig::default();
        assert!(config
            .apply_env(|key| (key == "ALGOD_PORT").then(|| "port".to_string()))
            .is_err());
    }

    #[test]
    fn test_from_toml() {
        let config = NetworkConfig::from_toml_str(
            r#"
            network = "mainnet"
            algod_server = "https://mainnet-api.algonode.cloud"
            explorer_base_url = "https://lora.algokit.io/mainnet"
            "#,
        )
        .unwrap();
        assert_eq!(config.network, Network::MainNet);
        assert_eq!(config.max_group_size, MAX_GROUP_SIZE);

        assert!(NetworkConfig::from_toml_str("max_group_size = 0").is_err());
    }
}
