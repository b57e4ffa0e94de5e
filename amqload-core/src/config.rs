//! Configuration schema for a load-test run.
//!
//! Three sections mirror the tool's moving parts: `[broker]` describes how
//! to reach and authenticate against the broker, `[topology]` what to
//! declare and bind on it, `[run]` how hard to drive it. Every field has a
//! default so a config file only needs to name what it changes; CLI flags
//! override file values.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Default connection timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Default heartbeat interval in seconds.
pub const DEFAULT_HEARTBEAT_SECS: u16 = 1;

/// Broker connection settings, immutable for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    /// Virtual host to open the connection against.
    pub virtual_host: String,
    /// Comma-separated host list, tried in order on connect.
    pub hosts: String,
    /// Broker port; zero means the AMQP default (5672).
    pub port: u16,
    /// Username for PLAIN authentication.
    pub username: String,
    /// Password for PLAIN authentication.
    pub password: String,
    /// Connection timeout in milliseconds; values below 1 fall back to
    /// the default.
    pub timeout_ms: u64,
    /// Protocol heartbeat interval in seconds; values below 1 fall back
    /// to the default.
    pub heartbeat_secs: u16,
    /// TLS settings.
    pub tls: TlsSettings,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            virtual_host: "/".to_string(),
            hosts: "localhost".to_string(),
            port: 0,
            username: "guest".to_string(),
            password: "guest".to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            heartbeat_secs: DEFAULT_HEARTBEAT_SECS,
            tls: TlsSettings::default(),
        }
    }
}

impl BrokerSettings {
    /// Connection timeout with the below-1 fallback applied.
    #[must_use]
    pub fn effective_timeout_ms(&self) -> u64 {
        if self.timeout_ms < 1 {
            DEFAULT_TIMEOUT_MS
        } else {
            self.timeout_ms
        }
    }

    /// Heartbeat interval with the below-1 fallback applied.
    #[must_use]
    pub fn effective_heartbeat_secs(&self) -> u16 {
        if self.heartbeat_secs < 1 {
            DEFAULT_HEARTBEAT_SECS
        } else {
            self.heartbeat_secs
        }
    }
}

/// TLS settings for broker connections.
///
/// The key store is a PKCS#12 container holding the client identity; the
/// trust store is a PEM bundle of CA certificates the broker's certificate
/// must chain to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsSettings {
    /// Whether to connect over TLS at all.
    pub enabled: bool,
    /// Whether the broker requires a client certificate. When false, a
    /// plain TLS session with platform trust is used and the stores below
    /// are ignored.
    pub client_cert: bool,
    /// Path to the PKCS#12 key store with the client identity.
    pub key_store: String,
    /// Password protecting the key store.
    pub key_store_password: String,
    /// Path to the PEM CA bundle the broker certificate is verified
    /// against.
    pub trust_store: String,
}

/// Exchange routing type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeType {
    /// Exact routing-key match.
    #[default]
    Direct,
    /// Pattern routing-key match.
    Topic,
    /// Header-table match, routing key ignored.
    Headers,
    /// Broadcast to all bound queues.
    Fanout,
}

impl ExchangeType {
    /// Name of the type as it appears on the wire.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Topic => "topic",
            Self::Headers => "headers",
            Self::Fanout => "fanout",
        }
    }
}

impl fmt::Display for ExchangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for ExchangeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "direct" => Ok(Self::Direct),
            "topic" => Ok(Self::Topic),
            "headers" => Ok(Self::Headers),
            "fanout" => Ok(Self::Fanout),
            other => Err(Error::Configuration(format!(
                "unknown exchange type `{other}` (expected direct|topic|headers|fanout)"
            ))),
        }
    }
}

/// Exchange/queue topology to ensure on the broker, consumed once per
/// channel initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologySettings {
    /// Exchange name; blank means the default exchange.
    pub exchange: String,
    /// Exchange routing type.
    pub exchange_type: ExchangeType,
    /// Whether a declared exchange survives broker restarts.
    pub exchange_durable: bool,
    /// Whether to declare the exchange at all.
    pub declare_exchange: bool,
    /// Whether to delete the exchange before declaring it, so changed
    /// properties take effect.
    pub redeclare_exchange: bool,
    /// Queue name; blank means no queue work and no binding.
    pub queue: String,
    /// Whether a declared queue survives broker restarts.
    pub queue_durable: bool,
    /// Whether the queue is exclusive to this connection.
    pub queue_exclusive: bool,
    /// Whether the queue is deleted when its last consumer goes away.
    pub queue_auto_delete: bool,
    /// Whether to declare the queue at all.
    pub declare_queue: bool,
    /// Whether to delete the queue before declaring it.
    pub redeclare_queue: bool,
    /// Routing key used for binding and publishing.
    pub routing_key: String,
    /// Per-message TTL in milliseconds; applied only when it parses to an
    /// integer of at least 1.
    pub message_ttl: String,
    /// Queue expiry in milliseconds; same positive-integer rule.
    pub queue_expires: String,
}

impl Default for TopologySettings {
    fn default() -> Self {
        Self {
            exchange: String::new(),
            exchange_type: ExchangeType::Direct,
            exchange_durable: true,
            declare_exchange: false,
            redeclare_exchange: false,
            queue: String::new(),
            queue_durable: true,
            queue_exclusive: false,
            queue_auto_delete: false,
            declare_queue: false,
            redeclare_queue: false,
            routing_key: String::new(),
            message_ttl: String::new(),
            queue_expires: String::new(),
        }
    }
}

impl TopologySettings {
    /// Whether a queue is configured, which drives both the queue declare
    /// step and the bind step. Whitespace-only names count as unset.
    #[must_use]
    pub fn queue_configured(&self) -> bool {
        !self.queue.trim().is_empty()
    }

    /// Whether a non-blank exchange name is configured, which gates the
    /// exchange declare step. Same blank rule as [`Self::queue_configured`].
    #[must_use]
    pub fn exchange_configured(&self) -> bool {
        !self.exchange.trim().is_empty()
    }

    /// Message TTL in milliseconds, when configured to a positive value.
    #[must_use]
    pub fn message_ttl_ms(&self) -> Option<u32> {
        parse_positive(&self.message_ttl)
    }

    /// Queue expiry in milliseconds, when configured to a positive value.
    #[must_use]
    pub fn queue_expires_ms(&self) -> Option<u32> {
        parse_positive(&self.queue_expires)
    }
}

/// Parse an optional positive integer from a form-style string value.
///
/// Anything that is absent, non-numeric, or below 1 counts as unset: the
/// value is omitted rather than zeroed.
fn parse_positive(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok().filter(|v| *v >= 1)
}

/// What each worker does per iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleMode {
    /// Publish generated payloads to the exchange.
    #[default]
    Publish,
    /// Pull messages off the queue.
    Consume,
}

impl FromStr for SampleMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "publish" => Ok(Self::Publish),
            "consume" => Ok(Self::Consume),
            other => Err(Error::Configuration(format!(
                "unknown sample mode `{other}` (expected publish|consume)"
            ))),
        }
    }
}

/// Load-driving settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Number of concurrent workers, each owning one channel.
    pub workers: usize,
    /// Samples per worker.
    pub iterations: u64,
    /// Generated payload size in bytes for publish mode.
    pub payload_bytes: usize,
    /// Whether workers publish or consume.
    pub mode: SampleMode,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self { workers: 1, iterations: 1, payload_bytes: 128, mode: SampleMode::Publish }
    }
}

/// Complete configuration for one load-test run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadTestConfig {
    /// Broker connection settings.
    pub broker: BrokerSettings,
    /// Topology to provision.
    pub topology: TopologySettings,
    /// Load-driving settings.
    pub run: RunSettings,
}

impl LoadTestConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] when the file cannot be read or
    /// parsed.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&content).map_err(|e| {
            Error::Configuration(format!("failed to parse {}: {e}", path.display()))
        })
    }
}
