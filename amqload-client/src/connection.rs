//! Broker connection lifecycle management.
//!
//! One [`ConnectionManager`] is shared by every worker in a run and owns
//! at most one live broker connection. Workers never open sockets
//! themselves; they ask the manager for channels, and the manager
//! lazily (re)establishes the underlying connection as needed, walking
//! the configured host list in order until one endpoint accepts.

use crate::slot::Slot;
use crate::tls::{self, TlsMaterial};
use amqload_core::{resolve, BrokerSettings, Endpoint, Error, Result};
use lapin::uri::{AMQPAuthority, AMQPQueryString, AMQPScheme, AMQPUri, AMQPUserInfo};
use lapin::{Channel, Connection, ConnectionProperties};
use std::sync::Arc;
use tracing::{error, info, warn};

/// AMQP reply code sent with a graceful connection close.
const REPLY_SUCCESS: u16 = 200;

/// Shared, long-lived owner of the broker connection.
///
/// `get_connection` has get-or-create semantics: repeated calls either
/// return the existing open connection or transparently replace a dead
/// one, never leaking two live connections for the same identity.
#[derive(Debug)]
pub struct ConnectionManager {
    settings: BrokerSettings,
    slot: Slot<Connection>,
}

impl ConnectionManager {
    /// Create a manager for the given broker identity. No connection is
    /// opened until the first channel is requested.
    #[must_use]
    pub fn new(settings: BrokerSettings) -> Self {
        Self { settings, slot: Slot::new() }
    }

    /// The broker identity this manager connects as.
    #[must_use]
    pub fn settings(&self) -> &BrokerSettings {
        &self.settings
    }

    /// Return the live connection, establishing or replacing it first if
    /// necessary.
    ///
    /// # Errors
    /// Returns [`Error::Connection`] when no candidate endpoint accepts,
    /// or [`Error::CredentialLoad`] when TLS material cannot be loaded.
    /// Both are fatal for this call; retry policy belongs to the caller.
    pub async fn get_connection(&self) -> Result<Arc<Connection>> {
        self.slot
            .acquire(|conn| conn.status().connected(), || self.connect())
            .await
    }

    /// Open a new channel on the managed connection.
    ///
    /// A channel the broker refuses right after opening is logged as a
    /// severe condition but still handed back; the provisioner's health
    /// check is the next gate (see [`crate::topology`]).
    ///
    /// # Errors
    /// Returns [`Error::ChannelOpen`] when the open itself fails, plus
    /// anything `get_connection` can return.
    pub async fn create_channel(&self) -> Result<Channel> {
        let connection = self.get_connection().await?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| Error::ChannelOpen(e.to_string()))?;

        if !channel.status().connected() {
            error!(channel = channel.id(), "channel reported closed immediately after open");
        }
        Ok(channel)
    }

    /// Close the connection if one is open. Close errors are logged and
    /// swallowed: teardown must not fail the shutdown path. Idempotent.
    pub async fn shutdown(&self) {
        if let Some(connection) = self.slot.take().await {
            if connection.status().connected() {
                if let Err(e) = connection.close(REPLY_SUCCESS, "amqload shutdown").await {
                    warn!(error = %e, "error closing broker connection during shutdown");
                }
            }
        }
    }

    /// Try each resolved endpoint in configured order; first success wins.
    async fn connect(&self) -> Result<Connection> {
        let endpoints = resolve(&self.settings.hosts, self.settings.port);
        if endpoints.is_empty() {
            return Err(Error::Connection("no broker hosts configured".into()));
        }

        let tls_material = if self.settings.tls.enabled {
            Some(tls::load(&self.settings.tls)?)
        } else {
            None
        };

        let mut last_error = None;
        for endpoint in &endpoints {
            match self.connect_endpoint(endpoint, tls_material.as_ref()).await {
                Ok(connection) => {
                    info!(endpoint = %endpoint, vhost = %self.settings.virtual_host, "connected to broker");
                    return Ok(connection);
                }
                Err(e) => {
                    warn!(endpoint = %endpoint, error = %e, "endpoint refused connection");
                    last_error = Some(e);
                }
            }
        }

        let detail = last_error.map_or_else(String::new, |e| format!(": last error: {e}"));
        Err(Error::Connection(format!(
            "no endpoint accepted a connection (tried {}){detail}",
            endpoints.len()
        )))
    }

    async fn connect_endpoint(
        &self,
        endpoint: &Endpoint,
        tls_material: Option<&TlsMaterial>,
    ) -> lapin::Result<Connection> {
        let uri = self.amqp_uri(endpoint);
        let options = ConnectionProperties::default()
            .with_executor(tokio_executor_trait::Tokio::current())
            .with_reactor(tokio_reactor_trait::Tokio);

        match tls_material {
            Some(material) => {
                Connection::connect_uri_with_config(uri, options, material.to_owned_config())
                    .await
            }
            None => Connection::connect_uri(uri, options).await,
        }
    }

    /// Build the connection URI for one endpoint, carrying credentials,
    /// vhost, timeout, and heartbeat.
    fn amqp_uri(&self, endpoint: &Endpoint) -> AMQPUri {
        let scheme =
            if self.settings.tls.enabled { AMQPScheme::AMQPS } else { AMQPScheme::AMQP };
        AMQPUri {
            scheme,
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: self.settings.username.clone(),
                    password: self.settings.password.clone(),
                },
                host: endpoint.host.clone(),
                port: endpoint.port,
            },
            vhost: self.settings.virtual_host.clone(),
            query: AMQPQueryString {
                heartbeat: Some(self.settings.effective_heartbeat_secs()),
                connection_timeout: Some(self.settings.effective_timeout_ms()),
                ..Default::default()
            },
        }
    }
}
