use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub stun_servers: Vec<String>,
    #[serde(default)]
    pub turn_servers: Vec<TurnServer>,
    pub negotiation_timeout_secs: u64,
    pub outbound_queue_depth: usize,
    pub shutdown_grace_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TurnServer {
    pub url: String,
    pub username: String,
    pub credential: String,
}

impl Config {
    /// Load from `path`, or `relay.toml` in the working directory if present,
    /// then apply `RELAY_*` environment variables
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name("relay").required(false),
        };

        let config: Config = defaults()?
            .add_source(file)
            .add_source(
                Environment::with_prefix("RELAY")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("stun_servers"),
            )
            .build()?
            .try_deserialize()?;

        if config.outbound_queue_depth == 0 {
            anyhow::bail!("outbound_queue_depth must be at least 1");
        }
        if config.stun_servers.is_empty() && config.turn_servers.is_empty() {
            tracing::warn!("No STUN or TURN servers configured, only host candidates will be offered");
        }

        Ok(config)
    }

    pub fn negotiation_timeout(&self) -> Duration {
        Duration::from_secs(self.negotiation_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stun_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            turn_servers: vec![],
            negotiation_timeout_secs: 10,
            outbound_queue_depth: 256,
            shutdown_grace_secs: 5,
        }
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let fallback = Config::default();
    config::Config::builder()
        .set_default("stun_servers", fallback.stun_servers)?
        .set_default("negotiation_timeout_secs", fallback.negotiation_timeout_secs)?
        .set_default("outbound_queue_depth", fallback.outbound_queue_depth as u64)?
        .set_default("shutdown_grace_secs", fallback.shutdown_grace_secs)
}
