//! TLS requirements for HTTPS fetches.

use crate::url::RemoteUrl;
use crate::url::Scheme;
use ks_core::NetError;
use ks_core::NetResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    V1_2,
    V1_3,
}

/// Trust anchors used to verify server certificates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrustStoreMode {
    /// Embedded Mozilla/WebPKI roots only.
    #[default]
    WebPkiOnly,
    /// WebPKI roots merged with operating-system roots.
    WebPkiAndOs,
}

/// Per-connection handshake parameters derived from a [`TlsPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsHandshakeConfig {
    pub server_name: String,
    pub minimum_version: TlsVersion,
    pub maximum_version: TlsVersion,
    pub alpn_protocols: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPolicy {
    pub minimum_version: TlsVersion,
    pub maximum_version: TlsVersion,
    pub trust_store_mode: TrustStoreMode,
    /// Whether plain `http://` URLs may be fetched at all.
    pub allow_plain_http: bool,
}

impl Default for TlsPolicy {
    fn default() -> Self {
        Self {
            minimum_version: TlsVersion::V1_2,
            maximum_version: TlsVersion::V1_3,
            trust_store_mode: TrustStoreMode::WebPkiOnly,
            allow_plain_http: true,
        }
    }
}

impl TlsPolicy {
    pub fn https_only() -> Self {
        Self {
            allow_plain_http: false,
            ..Self::default()
        }
    }

    pub fn with_trust_store_mode(mut self, mode: TrustStoreMode) -> Self {
        self.trust_store_mode = mode;
        self
    }

    pub fn validate(&self) -> NetResult<()> {
        if self.minimum_version > self.maximum_version {
            return Err(NetError::new(
                "net.tls.invalid_version_range",
                "minimum TLS version cannot be greater than maximum version",
            ));
        }

        Ok(())
    }

    /// `None` for plain HTTP, handshake parameters for HTTPS.
    pub fn handshake_config_for(&self, url: &RemoteUrl) -> NetResult<Option<TlsHandshakeConfig>> {
        self.validate()?;

        match url.scheme() {
            Scheme::Http if self.allow_plain_http => Ok(None),
            Scheme::Http => Err(NetError::new(
                "net.tls.https_only",
                format!("refusing plain HTTP fetch of `{}`", url.as_str()),
            )),
            Scheme::Https => Ok(Some(TlsHandshakeConfig {
                server_name: url.host().to_owned(),
                minimum_version: self.minimum_version,
                maximum_version: self.maximum_version,
                alpn_protocols: vec!["http/1.1".to_owned()],
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TlsPolicy;
    use super::TlsVersion;
    use crate::url::RemoteUrl;

    fn url(raw: &str) -> RemoteUrl {
        match RemoteUrl::parse(raw) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn rejects_inverted_version_range() {
        let policy = TlsPolicy {
            minimum_version: TlsVersion::V1_3,
            maximum_version: TlsVersion::V1_2,
            ..TlsPolicy::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn https_gets_handshake_with_sni_host() {
        let handshake = TlsPolicy::default().handshake_config_for(&url("https://Example.com/a.kml"));
        let handshake = match handshake {
            Ok(Some(value)) => value,
            other => panic!("expected handshake, got {other:?}"),
        };
        assert_eq!(handshake.server_name, "example.com");
    }

    #[test]
    fn https_only_blocks_plain_http() {
        let result = TlsPolicy::https_only().handshake_config_for(&url("http://example.com/a.kml"));
        assert_eq!(result.err().map(|error| error.code), Some("net.tls.https_only"));
        assert_eq!(
            TlsPolicy::default().handshake_config_for(&url("http://example.com/a.kml")),
            Ok(None)
        );
    }
}
