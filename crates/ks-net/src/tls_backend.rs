//! TLS upgrade of TCP connections.

use crate::tls::TlsHandshakeConfig;
use crate::tls::TlsPolicy;
use crate::transport::BoxedIoStream;
use ks_core::NetError;
use ks_core::NetResult;
use std::net::TcpStream;

#[cfg(feature = "tls-rustls")]
use crate::tls::TlsVersion;
#[cfg(feature = "tls-rustls")]
use crate::tls::TrustStoreMode;
#[cfg(feature = "tls-rustls")]
use rustls::RootCertStore;
#[cfg(feature = "tls-rustls")]
use rustls::SupportedProtocolVersion;
#[cfg(feature = "tls-rustls")]
use rustls::pki_types::ServerName;
#[cfg(feature = "tls-rustls")]
use std::sync::Arc;

pub trait TlsBackendAdapter {
    fn connect_tls(
        &self,
        stream: TcpStream,
        handshake: &TlsHandshakeConfig,
        policy: &TlsPolicy,
    ) -> NetResult<BoxedIoStream>;
}

/// rustls-backed connector.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustlsTlsAdapter;

#[cfg(feature = "tls-rustls")]
impl TlsBackendAdapter for RustlsTlsAdapter {
    fn connect_tls(
        &self,
        mut stream: TcpStream,
        handshake: &TlsHandshakeConfig,
        policy: &TlsPolicy,
    ) -> NetResult<BoxedIoStream> {
        use rustls::ClientConfig;
        use rustls::ClientConnection;
        use rustls::StreamOwned;

        let versions = supported_versions(handshake.minimum_version, handshake.maximum_version)?;
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let roots = root_store(policy.trust_store_mode)?;

        let mut config = ClientConfig::builder_with_provider(provider)
            .with_protocol_versions(&versions)
            .map_err(|error| {
                NetError::new(
                    "net.tls.config_versions_invalid",
                    format!("failed to configure TLS protocol versions: {error}"),
                )
            })?
            .with_root_certificates(roots)
            .with_no_client_auth();
        config.alpn_protocols = handshake
            .alpn_protocols
            .iter()
            .map(|protocol| protocol.as_bytes().to_vec())
            .collect();

        let server_name = ServerName::try_from(handshake.server_name.clone()).map_err(|error| {
            NetError::new(
                "net.tls.server_name_invalid",
                format!("invalid TLS server name `{}`: {error}", handshake.server_name),
            )
        })?;

        let mut connection =
            ClientConnection::new(Arc::new(config), server_name).map_err(|error| {
                NetError::new(
                    "net.tls.connection_init_failed",
                    format!(
                        "failed to initialize TLS connection for `{}`: {error}",
                        handshake.server_name
                    ),
                )
            })?;

        connection.complete_io(&mut stream).map_err(|error| {
            NetError::new(
                "net.tls.handshake_failed",
                format!(
                    "TLS handshake failed for `{}`: {error}",
                    handshake.server_name
                ),
            )
        })?;

        Ok(Box::new(StreamOwned::new(connection, stream)))
    }
}

#[cfg(feature = "tls-rustls")]
fn root_store(mode: TrustStoreMode) -> NetResult<RootCertStore> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if mode == TrustStoreMode::WebPkiAndOs {
        let native = rustls_native_certs::load_native_certs();
        for error in &native.errors {
            tracing::warn!(%error, "skipping unreadable operating-system root");
        }

        let (added, ignored) = roots.add_parsable_certificates(native.certs);
        tracing::debug!(added, ignored, "merged operating-system roots");
    }

    if roots.is_empty() {
        return Err(NetError::new(
            "net.tls.root_store_empty",
            "no trust anchors available for TLS verification",
        ));
    }

    Ok(roots)
}

#[cfg(feature = "tls-rustls")]
fn supported_versions(
    minimum: TlsVersion,
    maximum: TlsVersion,
) -> NetResult<Vec<&'static SupportedProtocolVersion>> {
    let versions: Vec<&'static SupportedProtocolVersion> = [TlsVersion::V1_3, TlsVersion::V1_2]
        .into_iter()
        .filter(|version| *version >= minimum && *version <= maximum)
        .map(|version| match version {
            TlsVersion::V1_2 => &rustls::version::TLS12,
            TlsVersion::V1_3 => &rustls::version::TLS13,
        })
        .collect();

    if versions.is_empty() {
        return Err(NetError::new(
            "net.tls.version_set_empty",
            "no supported TLS versions match the requested policy",
        ));
    }

    Ok(versions)
}

#[cfg(not(feature = "tls-rustls"))]
impl TlsBackendAdapter for RustlsTlsAdapter {
    fn connect_tls(
        &self,
        _stream: TcpStream,
        _handshake: &TlsHandshakeConfig,
        _policy: &TlsPolicy,
    ) -> NetResult<BoxedIoStream> {
        Err(NetError::new(
            "net.tls.backend_unavailable",
            "rustls backend is disabled for this build; enable `ks-net/tls-rustls`",
        ))
    }
}
