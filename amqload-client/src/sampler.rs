//! Sampler contract and the publish/consume samplers.
//!
//! Each worker owns exactly one sampler, and each sampler owns exactly
//! one channel. The channel is created lazily on first use, health
//! checked before every reuse, and recreated (with topology provisioning
//! rerun) when it is observed closed. The sampler never bypasses the
//! shared [`ConnectionManager`] to open sockets itself.

use crate::connection::ConnectionManager;
use crate::topology::TopologyManager;
use amqload_core::{Error, Result, TopologySettings};
use bytes::Bytes;
use lapin::options::{BasicGetOptions, BasicPublishOptions};
use lapin::{BasicProperties, Channel};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Delivery mode marking published messages as persistent.
const PERSISTENT: u8 = 2;

/// Outcome of a single publish or consume round trip.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Round-trip time of the broker operation.
    pub elapsed: Duration,
    /// Payload bytes moved; zero for an empty-queue consume.
    pub bytes: u64,
    /// Failure message, when the operation failed.
    pub error: Option<String>,
}

impl Sample {
    /// Whether the round trip succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Capability surface a sampler exposes to generic plumbing: its cached
/// channel, the connection manager it draws from, and the provisioning
/// configuration it was built with. [`ready_channel`] is written against
/// this trait, so every sampler variant shares one channel lifecycle.
pub trait ChannelOwner {
    /// The cached channel, if one has been created.
    fn channel(&self) -> Option<&Channel>;
    /// Remove and return the cached channel.
    fn take_channel(&mut self) -> Option<Channel>;
    /// Replace (or clear) the cached channel.
    fn set_channel(&mut self, channel: Option<Channel>);
    /// Topology this sampler provisions its channel against.
    fn topology(&self) -> &TopologySettings;
    /// Shared connection manager the channel is opened on.
    fn manager(&self) -> &ConnectionManager;
}

/// Hand back a healthy, provisioned channel for any channel owner.
///
/// Takes the cached channel, runs it through the provisioner's health
/// check (recreating and re-provisioning when it was observed closed),
/// and caches the result back on the owner.
///
/// # Errors
/// Propagates connection, channel-open, declare, and bind failures; the
/// owner's cache is left empty in that case.
pub async fn ready_channel<S: ChannelOwner + ?Sized>(owner: &mut S) -> Result<Channel> {
    let current = owner.take_channel();
    let channel =
        TopologyManager::new(owner.manager(), owner.topology()).ensure_channel(current).await?;
    owner.set_channel(Some(channel.clone()));
    Ok(channel)
}

/// Shared state and channel lifecycle for every sampler variant.
///
/// Concrete samplers compose this rather than inheriting from it: the
/// publish/consume behavior differs, the provisioning logic does not.
#[derive(Debug)]
pub struct SamplerCore {
    manager: Arc<ConnectionManager>,
    topology: TopologySettings,
    channel: Option<Channel>,
}

impl SamplerCore {
    /// Create a sampler core bound to the shared connection manager.
    #[must_use]
    pub fn new(manager: Arc<ConnectionManager>, topology: TopologySettings) -> Self {
        Self { manager, topology, channel: None }
    }

    /// Hand back a healthy, provisioned channel handle.
    ///
    /// First call creates and provisions the channel; later calls return
    /// the cached one unless it was observed closed, in which case it is
    /// discarded and the create-and-provision sequence reruns.
    ///
    /// # Errors
    /// Propagates connection, channel-open, declare, and bind failures.
    pub async fn ready_channel(&mut self) -> Result<Channel> {
        ready_channel(self).await
    }
}

impl ChannelOwner for SamplerCore {
    fn channel(&self) -> Option<&Channel> {
        self.channel.as_ref()
    }

    fn take_channel(&mut self) -> Option<Channel> {
        self.channel.take()
    }

    fn set_channel(&mut self, channel: Option<Channel>) {
        self.channel = channel;
    }

    fn topology(&self) -> &TopologySettings {
        &self.topology
    }

    fn manager(&self) -> &ConnectionManager {
        &self.manager
    }
}

/// Publishes generated payloads to the configured exchange/routing key.
#[derive(Debug)]
pub struct PublishSampler {
    core: SamplerCore,
    payload: Bytes,
}

impl PublishSampler {
    /// Create a publish sampler with a deterministic payload of
    /// `payload_bytes` bytes.
    #[must_use]
    pub fn new(
        manager: Arc<ConnectionManager>,
        topology: TopologySettings,
        payload_bytes: usize,
    ) -> Self {
        Self { core: SamplerCore::new(manager, topology), payload: generate_payload(payload_bytes) }
    }

    /// Publish one message, timing the broker round trip.
    ///
    /// # Errors
    /// Returns [`Error::Sample`] when the publish fails; the next call
    /// runs the channel health check again, so a broken channel heals
    /// rather than poisoning the sampler.
    pub async fn sample(&mut self) -> Result<Sample> {
        let channel = self.core.ready_channel().await?;
        let topology = self.core.topology();
        let exchange = topology.exchange.clone();
        let routing_key = topology.routing_key.clone();

        let started = Instant::now();
        let confirm = channel
            .basic_publish(
                &exchange,
                &routing_key,
                BasicPublishOptions::default(),
                &self.payload,
                BasicProperties::default().with_delivery_mode(PERSISTENT),
            )
            .await
            .map_err(|e| Error::Sample(format!("publish to `{exchange}`: {e}")))?;
        confirm
            .await
            .map_err(|e| Error::Sample(format!("publish confirmation on `{exchange}`: {e}")))?;

        Ok(Sample {
            elapsed: started.elapsed(),
            bytes: self.payload.len() as u64,
            error: None,
        })
    }
}

impl ChannelOwner for PublishSampler {
    fn channel(&self) -> Option<&Channel> {
        self.core.channel()
    }

    fn take_channel(&mut self) -> Option<Channel> {
        self.core.take_channel()
    }

    fn set_channel(&mut self, channel: Option<Channel>) {
        self.core.set_channel(channel);
    }

    fn topology(&self) -> &TopologySettings {
        self.core.topology()
    }

    fn manager(&self) -> &ConnectionManager {
        self.core.manager()
    }
}

/// Pulls messages off the configured queue with auto-ack.
#[derive(Debug)]
pub struct ConsumeSampler {
    core: SamplerCore,
}

impl ConsumeSampler {
    /// Create a consume sampler.
    #[must_use]
    pub fn new(manager: Arc<ConnectionManager>, topology: TopologySettings) -> Self {
        Self { core: SamplerCore::new(manager, topology) }
    }

    /// Fetch one message, timing the broker round trip. An empty queue
    /// yields a successful zero-byte sample.
    ///
    /// # Errors
    /// Returns [`Error::Sample`] when the fetch fails.
    pub async fn sample(&mut self) -> Result<Sample> {
        let channel = self.core.ready_channel().await?;
        let queue = self.core.topology().queue.clone();

        let started = Instant::now();
        let message = channel
            .basic_get(&queue, BasicGetOptions { no_ack: true })
            .await
            .map_err(|e| Error::Sample(format!("consume from `{queue}`: {e}")))?;

        let bytes = message.map_or(0, |m| m.delivery.data.len() as u64);
        Ok(Sample { elapsed: started.elapsed(), bytes, error: None })
    }
}

impl ChannelOwner for ConsumeSampler {
    fn channel(&self) -> Option<&Channel> {
        self.core.channel()
    }

    fn take_channel(&mut self) -> Option<Channel> {
        self.core.take_channel()
    }

    fn set_channel(&mut self, channel: Option<Channel>) {
        self.core.set_channel(channel);
    }

    fn topology(&self) -> &TopologySettings {
        self.core.topology()
    }

    fn manager(&self) -> &ConnectionManager {
        self.core.manager()
    }
}

/// Either sampler variant, so a worker can hold one by value.
#[derive(Debug)]
pub enum Sampler {
    /// Publishing workload.
    Publish(PublishSampler),
    /// Consuming workload.
    Consume(ConsumeSampler),
}

impl Sampler {
    /// Run one iteration of the workload.
    ///
    /// # Errors
    /// Propagates the underlying sampler's failure.
    pub async fn sample(&mut self) -> Result<Sample> {
        match self {
            Self::Publish(sampler) => sampler.sample().await,
            Self::Consume(sampler) => sampler.sample().await,
        }
    }
}

/// Deterministic printable payload of the requested size.
fn generate_payload(size: usize) -> Bytes {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let data: Vec<u8> = ALPHABET.iter().copied().cycle().take(size).collect();
    Bytes::from(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use amqload_core::BrokerSettings;

    #[test]
    fn payload_has_requested_size_and_is_deterministic() {
        assert_eq!(generate_payload(0).len(), 0);
        assert_eq!(generate_payload(5).as_ref(), b"abcde");
        assert_eq!(generate_payload(128).len(), 128);
        assert_eq!(generate_payload(64), generate_payload(64));
    }

    #[test]
    fn samplers_start_without_a_channel() {
        let manager = Arc::new(ConnectionManager::new(BrokerSettings::default()));
        let publish =
            PublishSampler::new(Arc::clone(&manager), TopologySettings::default(), 32);
        assert!(publish.channel().is_none());
        assert_eq!(publish.payload.len(), 32);

        let consume = ConsumeSampler::new(manager, TopologySettings::default());
        assert!(consume.channel().is_none());
    }

    #[tokio::test]
    async fn ready_channel_runs_generically_over_any_owner() {
        let settings = BrokerSettings { hosts: String::new(), ..Default::default() };
        let mut sampler = PublishSampler::new(
            Arc::new(ConnectionManager::new(settings)),
            TopologySettings::default(),
            8,
        );

        let owner: &mut dyn ChannelOwner = &mut sampler;
        let err = ready_channel(owner).await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
        assert!(owner.channel().is_none());
    }

    #[test]
    fn sample_outcome_reports_ok_without_error() {
        let sample =
            Sample { elapsed: Duration::from_millis(3), bytes: 128, error: None };
        assert!(sample.is_ok());

        let failed = Sample {
            elapsed: Duration::from_millis(3),
            bytes: 0,
            error: Some("channel closed".into()),
        };
        assert!(!failed.is_ok());
    }
}
