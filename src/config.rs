use config::{ConfigError, Environment};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    pub log_level: String,
    pub address: String,
    pub api_key: Option<String>,
    pub backend_url: String,
    pub backend_token: Option<String>,
    pub account_acronym: String,
    pub poll_interval_secs: u64,
    pub task_timeout_secs: u64,
    pub provision_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_builder(config::Config::builder())
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let s = builder
            .set_default("log_level", "info")?
            .set_default("address", "0.0.0.0:7787")?
            .set_default("account_acronym", "acc")?
            .set_default("poll_interval_secs", 5)?
            .set_default("task_timeout_secs", 180)?
            .set_default("provision_timeout_secs", 7200)?
            .add_source(Environment::with_prefix("EC2GW"))
            .build()?;

        s.try_deserialize()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Deadline class for lightweight network/volume/group operations.
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    /// Deadline class for instance provisioning.
    pub fn provision_timeout(&self) -> Duration {
        Duration::from_secs(self.provision_timeout_secs)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
