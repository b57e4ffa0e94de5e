//! Convenient access to commonly used amqload-core types.

pub use crate::{
    config::{
        BrokerSettings, ExchangeType, LoadTestConfig, RunSettings, SampleMode, TlsSettings,
        TopologySettings,
    },
    endpoint::{resolve, Endpoint, DEFAULT_PORT},
    error::{Error, Result},
};
