//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every section is optional; omitted fields take the defaults below.

use serde::{Deserialize, Serialize};

/// Root configuration for the daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP listener settings.
    pub listener: ListenerConfig,

    /// Frame decoding limits.
    pub protocol: ProtocolConfig,

    /// Broker engine settings.
    pub broker: BrokerConfig,

    /// Drain behavior on stop.
    pub shutdown: ShutdownConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:4150").
    pub bind_address: String,

    /// Extra delay before retrying after a transient accept failure.
    /// Zero keeps the plain scheduler yield.
    pub accept_retry_delay_ms: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4150".to_string(),
            accept_retry_delay_ms: 0,
        }
    }
}

/// Limits enforced by the frame decoder.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Longest accepted command line, excluding the newline.
    pub max_line_length: usize,

    /// Largest accepted message body in bytes.
    pub max_message_size: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_line_length: 1024,
            max_message_size: 1024 * 1024,
        }
    }
}

/// Broker engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BrokerConfig {
    /// Directory holding the metadata file.
    pub data_path: String,

    /// Messages retained in memory per topic before the oldest is dropped.
    pub mem_queue_size: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            data_path: ".".to_string(),
            mem_queue_size: 10_000,
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long the daemon waits for in-flight connections after a stop.
    pub drain_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 25,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9150".to_string(),
        }
    }
}
