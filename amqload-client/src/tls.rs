//! TLS credential loading for broker connections.
//!
//! The client identity comes from a PKCS#12 key store, the broker trust
//! anchors from a PEM CA bundle. Both are read and validated up front so
//! that a missing file, a wrong password, or malformed store content
//! aborts connection setup with [`Error::CredentialLoad`] instead of
//! surfacing mid-handshake. Validation goes as far as building a full
//! TLS 1.2-pinned connector from the material, the same context shape
//! the handshake will use.

use amqload_core::{Error, Result, TlsSettings};
use lapin::tcp::{OwnedIdentity, OwnedTLSConfig};
use native_tls::Protocol;

/// Protocol version the client-certificate context is pinned to, both
/// as floor and ceiling.
const PINNED_PROTOCOL: Protocol = Protocol::Tlsv12;

/// Validated TLS material, ready to be turned into a per-connection
/// config.
#[derive(Debug, Default)]
pub struct TlsMaterial {
    identity: Option<(Vec<u8>, String)>,
    cert_chain: Option<String>,
}

impl TlsMaterial {
    /// Build the lapin TLS config for one connection attempt.
    #[must_use]
    pub fn to_owned_config(&self) -> OwnedTLSConfig {
        OwnedTLSConfig {
            identity: self.identity.as_ref().map(|(der, password)| OwnedIdentity {
                der: der.clone(),
                password: password.clone(),
            }),
            cert_chain: self.cert_chain.clone(),
        }
    }

    /// Whether a client identity is attached.
    #[must_use]
    pub fn has_identity(&self) -> bool {
        self.identity.is_some()
    }
}

/// Load and validate TLS material per the connection settings.
///
/// Without a required client certificate this is a bare TLS session with
/// platform trust: no key or trust material is loaded. With one, the key
/// store and trust bundle are read from disk and a TLS 1.2-pinned
/// connector is built from them, so any material the handshake would
/// reject is caught here.
///
/// # Errors
/// Returns [`Error::CredentialLoad`] for any filesystem read failure,
/// wrong key-store password, malformed store content, or material the
/// pinned context refuses. Never retried.
pub fn load(settings: &TlsSettings) -> Result<TlsMaterial> {
    if !settings.client_cert {
        return Ok(TlsMaterial::default());
    }

    let der = std::fs::read(&settings.key_store).map_err(|e| {
        Error::CredentialLoad(format!("failed to read key store {}: {e}", settings.key_store))
    })?;
    let identity =
        native_tls::Identity::from_pkcs12(&der, &settings.key_store_password).map_err(|e| {
            Error::CredentialLoad(format!("invalid key store {}: {e}", settings.key_store))
        })?;

    let cert_chain = std::fs::read_to_string(&settings.trust_store).map_err(|e| {
        Error::CredentialLoad(format!(
            "failed to read trust store {}: {e}",
            settings.trust_store
        ))
    })?;
    let trust_anchor = native_tls::Certificate::from_pem(cert_chain.as_bytes()).map_err(|e| {
        Error::CredentialLoad(format!("invalid trust store {}: {e}", settings.trust_store))
    })?;

    native_tls::TlsConnector::builder()
        .identity(identity)
        .add_root_certificate(trust_anchor)
        .min_protocol_version(Some(PINNED_PROTOCOL))
        .max_protocol_version(Some(PINNED_PROTOCOL))
        .build()
        .map_err(|e| Error::CredentialLoad(format!("cannot build pinned TLS context: {e}")))?;

    Ok(TlsMaterial {
        identity: Some((der, settings.key_store_password.clone())),
        cert_chain: Some(cert_chain),
    })
}
