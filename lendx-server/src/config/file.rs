//! TOML file configuration structures.
//!
//! These structs directly map to the `lendx-config.toml` file format.

use lendx_core::broker::{DEFAULT_ORDER_SUBJECT, DEFAULT_RESPONSE_SUBJECT};
use lendx_core::registry::DEFAULT_CLIENT_QUEUE_CAPACITY;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
    /// Outbound frames queued per websocket before the client is dropped.
    #[serde(default = "default_client_queue_capacity")]
    pub client_queue_capacity: usize,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_client_queue_capacity() -> usize {
    DEFAULT_CLIENT_QUEUE_CAPACITY
}

/// NATS connection and subjects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_url")]
    pub url: String,
    #[serde(default = "default_order_subject")]
    pub order_subject: String,
    #[serde(default = "default_response_subject")]
    pub response_subject: String,
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: default_broker_url(),
            order_subject: default_order_subject(),
            response_subject: default_response_subject(),
            publish_timeout_ms: default_publish_timeout_ms(),
        }
    }
}

fn default_broker_url() -> String {
    "nats://127.0.0.1:4222".to_string()
}

fn default_order_subject() -> String {
    DEFAULT_ORDER_SUBJECT.to_string()
}

fn default_response_subject() -> String {
    DEFAULT_RESPONSE_SUBJECT.to_string()
}

fn default_publish_timeout_ms() -> u64 {
    5_000
}

/// Order-book snapshot batching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: default_flush_interval_ms(),
        }
    }
}

fn default_flush_interval_ms() -> u64 {
    500
}
