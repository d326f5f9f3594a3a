use std::time::Duration;
use std::{fs, path::Path};

use serde::Deserialize;

use crate::core::queue::{QueueOptions, QueueStatus};

/// Default behavior applied to queues created from configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct QueueSettings {
    pub initial_status: QueueStatus,
    pub message_limit: usize,
    pub message_size_limit: usize,
    /// Zero disables the message deadline.
    pub message_timeout_ms: u64,
    pub acknowledge_timeout_ms: u64,
    pub request_acknowledge: bool,
    pub wait_for_acknowledge: bool,
    pub send_only_first_acquirer: bool,
    pub hide_client_names: bool,
    pub use_message_id: bool,
}

impl QueueSettings {
    pub fn to_options(&self) -> QueueOptions {
        QueueOptions {
            initial_status: self.initial_status,
            message_limit: self.message_limit,
            message_size_limit: self.message_size_limit,
            message_timeout: (self.message_timeout_ms > 0)
                .then(|| Duration::from_millis(self.message_timeout_ms)),
            acknowledge_timeout: Duration::from_millis(self.acknowledge_timeout_ms),
            request_acknowledge: self.request_acknowledge,
            wait_for_acknowledge: self.wait_for_acknowledge,
            send_only_first_acquirer: self.send_only_first_acquirer,
            hide_client_names: self.hide_client_names,
            use_message_id: self.use_message_id,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedeliverySettings {
    /// Directory holding per-queue redelivery counter files.
    pub directory: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub queues: QueueSettings,
    pub redelivery: RedeliverySettings,
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, anyhow::Error> {
    let raw: String = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&raw)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let raw = r#"
            [queues]
            initial_status = "round_robin"
            message_limit = 1000
            message_size_limit = 65536
            message_timeout_ms = 60000
            acknowledge_timeout_ms = 15000
            request_acknowledge = true
            wait_for_acknowledge = false
            send_only_first_acquirer = false
            hide_client_names = false
            use_message_id = true

            [redelivery]
            directory = "data/deliveries"
        "#;

        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.queues.initial_status, QueueStatus::RoundRobin);
        assert_eq!(config.redelivery.directory, "data/deliveries");

        let options = config.queues.to_options();
        assert_eq!(options.message_limit, 1000);
        assert_eq!(options.message_timeout, Some(Duration::from_secs(60)));
        assert!(options.request_acknowledge);
    }

    #[test]
    fn zero_message_timeout_disables_deadline() {
        let settings = QueueSettings {
            initial_status: QueueStatus::Broadcast,
            message_limit: 0,
            message_size_limit: 0,
            message_timeout_ms: 0,
            acknowledge_timeout_ms: 15000,
            request_acknowledge: false,
            wait_for_acknowledge: false,
            send_only_first_acquirer: false,
            hide_client_names: false,
            use_message_id: true,
        };
        assert!(settings.to_options().message_timeout.is_none());
    }
}
