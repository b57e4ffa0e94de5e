//! # amqload Core
//!
//! Shared foundation for the amqload broker load tester: configuration
//! schema with file loading, broker endpoint resolution, the error
//! taxonomy, and telemetry bootstrap.
//!
//! ## Architecture
//!
//! - [`config`]: serde-backed configuration for broker, topology, and run
//!   settings, plus TOML file loading
//! - [`endpoint`]: comma-separated host list to ordered endpoint candidates
//! - [`error`]: error types and result handling
//! - [`telemetry`]: tracing subscriber setup
//! - [`prelude`]: common imports for convenient usage

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod endpoint;
pub mod error;
pub mod prelude;
pub mod telemetry;

pub use crate::{
    config::{BrokerSettings, LoadTestConfig, RunSettings, TlsSettings, TopologySettings},
    endpoint::{resolve, Endpoint, DEFAULT_PORT},
    error::{Error, Result},
};
