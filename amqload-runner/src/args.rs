//! Command-line surface of the load tester.
//!
//! Every configuration knob is reachable from the CLI; a TOML config file
//! can carry the bulk of a scenario, with flags overriding file values,
//! which override built-in defaults.

use amqload_core::config::{ExchangeType, SampleMode};
use amqload_core::{LoadTestConfig, Result};
use clap::Parser;
use std::path::PathBuf;

/// AMQP broker load-testing driver.
#[derive(Parser, Debug)]
#[command(name = "amqload", version, about)]
pub struct Args {
    /// TOML configuration file; flags below override its values.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log filter when AMQLOAD_LOG is unset.
    #[arg(long, default_value = "info")]
    pub log: String,

    // Broker connection.
    /// Comma-separated broker host list, tried in order.
    #[arg(long)]
    pub hosts: Option<String>,

    /// Broker port (0 = AMQP default 5672).
    #[arg(long)]
    pub port: Option<u16>,

    /// Virtual host.
    #[arg(long)]
    pub virtual_host: Option<String>,

    /// Username.
    #[arg(long)]
    pub username: Option<String>,

    /// Password.
    #[arg(long)]
    pub password: Option<String>,

    /// Connection timeout in milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Heartbeat interval in seconds.
    #[arg(long)]
    pub heartbeat_secs: Option<u16>,

    /// Connect over TLS.
    #[arg(long)]
    pub tls: Option<bool>,

    /// Present a client certificate (requires key and trust stores).
    #[arg(long)]
    pub client_cert: Option<bool>,

    /// PKCS#12 key store path.
    #[arg(long)]
    pub key_store: Option<String>,

    /// Key store password.
    #[arg(long)]
    pub key_store_password: Option<String>,

    /// PEM CA bundle path.
    #[arg(long)]
    pub trust_store: Option<String>,

    // Topology.
    /// Exchange name.
    #[arg(long)]
    pub exchange: Option<String>,

    /// Exchange type: direct|topic|headers|fanout.
    #[arg(long)]
    pub exchange_type: Option<ExchangeType>,

    /// Declare the exchange.
    #[arg(long)]
    pub declare_exchange: Option<bool>,

    /// Delete the exchange before declaring it.
    #[arg(long)]
    pub redeclare_exchange: Option<bool>,

    /// Queue name.
    #[arg(long)]
    pub queue: Option<String>,

    /// Declare the queue.
    #[arg(long)]
    pub declare_queue: Option<bool>,

    /// Delete the queue before declaring it.
    #[arg(long)]
    pub redeclare_queue: Option<bool>,

    /// Routing key for binding and publishing.
    #[arg(long)]
    pub routing_key: Option<String>,

    /// Per-message TTL in milliseconds (applied when >= 1).
    #[arg(long)]
    pub message_ttl: Option<String>,

    /// Queue expiry in milliseconds (applied when >= 1).
    #[arg(long)]
    pub queue_expires: Option<String>,

    // Load shape.
    /// Number of concurrent workers.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Samples per worker.
    #[arg(long)]
    pub iterations: Option<u64>,

    /// Generated payload size in bytes (publish mode).
    #[arg(long)]
    pub payload_bytes: Option<usize>,

    /// Workload: publish|consume.
    #[arg(long)]
    pub mode: Option<SampleMode>,
}

impl Args {
    /// Assemble the run configuration: defaults, then the config file,
    /// then CLI overrides.
    ///
    /// # Errors
    /// Propagates configuration-file load failures.
    pub fn into_config(self) -> Result<LoadTestConfig> {
        let mut config = match &self.config {
            Some(path) => LoadTestConfig::load_from_file(path)?,
            None => LoadTestConfig::default(),
        };

        let broker = &mut config.broker;
        apply(&mut broker.hosts, self.hosts);
        apply(&mut broker.port, self.port);
        apply(&mut broker.virtual_host, self.virtual_host);
        apply(&mut broker.username, self.username);
        apply(&mut broker.password, self.password);
        apply(&mut broker.timeout_ms, self.timeout_ms);
        apply(&mut broker.heartbeat_secs, self.heartbeat_secs);
        apply(&mut broker.tls.enabled, self.tls);
        apply(&mut broker.tls.client_cert, self.client_cert);
        apply(&mut broker.tls.key_store, self.key_store);
        apply(&mut broker.tls.key_store_password, self.key_store_password);
        apply(&mut broker.tls.trust_store, self.trust_store);

        let topology = &mut config.topology;
        apply(&mut topology.exchange, self.exchange);
        apply(&mut topology.exchange_type, self.exchange_type);
        apply(&mut topology.declare_exchange, self.declare_exchange);
        apply(&mut topology.redeclare_exchange, self.redeclare_exchange);
        apply(&mut topology.queue, self.queue);
        apply(&mut topology.declare_queue, self.declare_queue);
        apply(&mut topology.redeclare_queue, self.redeclare_queue);
        apply(&mut topology.routing_key, self.routing_key);
        apply(&mut topology.message_ttl, self.message_ttl);
        apply(&mut topology.queue_expires, self.queue_expires);

        let run = &mut config.run;
        apply(&mut run.workers, self.workers);
        apply(&mut run.iterations, self.iterations);
        apply(&mut run.payload_bytes, self.payload_bytes);
        apply(&mut run.mode, self.mode);

        Ok(config)
    }
}

fn apply<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_flags_or_file() {
        let args = Args::parse_from(["amqload"]);
        let config = args.into_config().unwrap();
        assert_eq!(config.broker.hosts, "localhost");
        assert_eq!(config.run.workers, 1);
        assert_eq!(config.run.mode, SampleMode::Publish);
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "amqload",
            "--hosts",
            "a,b",
            "--port",
            "5671",
            "--tls",
            "true",
            "--queue",
            "load.q",
            "--declare-queue",
            "true",
            "--message-ttl",
            "500",
            "--workers",
            "4",
            "--mode",
            "consume",
        ]);
        let config = args.into_config().unwrap();
        assert_eq!(config.broker.hosts, "a,b");
        assert_eq!(config.broker.port, 5671);
        assert!(config.broker.tls.enabled);
        assert_eq!(config.topology.queue, "load.q");
        assert!(config.topology.declare_queue);
        assert_eq!(config.topology.message_ttl_ms(), Some(500));
        assert_eq!(config.run.workers, 4);
        assert_eq!(config.run.mode, SampleMode::Consume);
    }

    #[test]
    fn exchange_type_flag_parses_wire_names() {
        let args = Args::parse_from(["amqload", "--exchange-type", "fanout"]);
        let config = args.into_config().unwrap();
        assert_eq!(config.topology.exchange_type, ExchangeType::Fanout);

        assert!(Args::try_parse_from(["amqload", "--exchange-type", "bogus"]).is_err());
    }

    #[test]
    fn missing_config_file_fails() {
        let args = Args::parse_from(["amqload", "--config", "/nope/run.toml"]);
        assert!(args.into_config().is_err());
    }
}
