//! Error types for amqload operations.
//!
//! Every broker round-trip can fail, and the failures must stay
//! distinguishable: connection setup problems are fatal and never retried
//! here, while topology and sampling failures surface to the caller, who
//! decides whether the next iteration tries again.

use thiserror::Error;

/// Error type covering the amqload failure classes.
#[derive(Error, Debug)]
pub enum Error {
    /// TLS key material missing, unreadable, or malformed (including a
    /// wrong key-store password). Aborts connection setup.
    #[error("credential load failed: {0}")]
    CredentialLoad(String),

    /// No candidate endpoint accepted a connection.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The broker rejected a channel open.
    #[error("channel open failed: {0}")]
    ChannelOpen(String),

    /// Queue or exchange declare rejected by the broker, e.g. a property
    /// mismatch with an existing resource.
    #[error("topology declare failed: {0}")]
    TopologyDeclare(String),

    /// Queue bind rejected, e.g. binding to an absent exchange.
    #[error("bind failed: {0}")]
    Bind(String),

    /// Configuration file unreadable, unparseable, or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A publish or consume round-trip failed.
    #[error("sample failed: {0}")]
    Sample(String),
}

/// Result type alias for amqload operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_failure_class() {
        let err = Error::Connection("no endpoint reachable".into());
        assert_eq!(err.to_string(), "connection failed: no endpoint reachable");

        let err = Error::CredentialLoad("bad password".into());
        assert!(err.to_string().starts_with("credential load failed"));
    }
}
