//! # amqload Client
//!
//! Broker-facing core of the amqload load tester: connection lifecycle
//! management, TLS credential loading, declarative topology provisioning,
//! and the publish/consume samplers.
//!
//! ## Architecture
//!
//! Data flows one way: endpoint resolution feeds the
//! [`ConnectionManager`], which hands channels to the
//! [`topology::TopologyManager`], which hands provisioned channels to the
//! samplers. Samplers never open sockets themselves.
//!
//! - [`slot`]: guarded get-or-create slot behind the connection manager
//! - [`tls`]: PKCS#12 identity + PEM trust bundle loading and validation
//! - [`connection`]: shared connection manager with ordered host failover
//! - [`topology`]: declare / redeclare / bind provisioning per channel
//! - [`sampler`]: sampler contract plus publish and consume samplers

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connection;
pub mod sampler;
pub mod slot;
pub mod tls;
pub mod topology;

pub use crate::{
    connection::ConnectionManager,
    sampler::{ready_channel, ChannelOwner, ConsumeSampler, PublishSampler, Sample, Sampler, SamplerCore},
    topology::{provisioning_plan, ProvisionStep, TopologyManager},
};
pub use amqload_core::{Error, Result};
