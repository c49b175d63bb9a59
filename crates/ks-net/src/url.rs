//! Validation of remote KML locations.

use ks_core::NetError;
use ks_core::NetResult;
use url::Url;

/// Schemes a remote KML document may be fetched over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    pub fn is_secure(self) -> bool {
        matches!(self, Self::Https)
    }

    fn default_port(self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

/// Parsed and validated URL of a remote KML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    parsed: Url,
    scheme: Scheme,
    host: String,
    port: u16,
}

impl RemoteUrl {
    pub fn parse(input: &str) -> NetResult<Self> {
        let mut parsed = Url::parse(input.trim()).map_err(|error| {
            NetError::new(
                "net.url.invalid",
                format!("failed to parse URL `{input}`: {error}"),
            )
        })?;

        let scheme = match parsed.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => {
                return Err(NetError::new(
                    "net.url.scheme_unsupported",
                    format!("KML can only be fetched over http or https, not `{other}`"),
                ));
            }
        };

        let host = parsed
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| NetError::new("net.url.host_missing", "URL must include a host"))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_ascii_lowercase();

        let port = parsed.port().unwrap_or(scheme.default_port());

        // Fragments never go on the wire.
        parsed.set_fragment(None);

        Ok(Self {
            parsed,
            scheme,
            host,
            port,
        })
    }

    /// Resolves a `Location` header against this URL.
    pub fn join(&self, location: &str) -> NetResult<Self> {
        let joined = self.parsed.join(location.trim()).map_err(|error| {
            NetError::new(
                "net.url.redirect_invalid",
                format!("invalid redirect target `{location}`: {error}"),
            )
        })?;
        Self::parse(joined.as_str())
    }

    pub fn as_str(&self) -> &str {
        self.parsed.as_str()
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_secure(&self) -> bool {
        self.scheme.is_secure()
    }

    /// Value for the `Host` header.
    pub fn authority(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };

        if self.port == self.scheme.default_port() {
            host
        } else {
            format!("{host}:{}", self.port)
        }
    }

    pub fn path_and_query(&self) -> String {
        let path = match self.parsed.path() {
            "" => "/",
            path => path,
        };

        match self.parsed.query() {
            Some(query) => format!("{path}?{query}"),
            None => path.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RemoteUrl;

    fn parsed(input: &str) -> RemoteUrl {
        match RemoteUrl::parse(input) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn parses_presigned_bucket_url() {
        let url = parsed("https://bucket.s3.amazonaws.com/maps/SMC.kml?X-Amz-Expires=300&X-Amz-Signature=abc");

        assert_eq!(url.host(), "bucket.s3.amazonaws.com");
        assert_eq!(url.port(), 443);
        assert_eq!(
            url.path_and_query(),
            "/maps/SMC.kml?X-Amz-Expires=300&X-Amz-Signature=abc"
        );
        assert!(url.is_secure());
    }

    #[test]
    fn keeps_explicit_port_in_authority() {
        let url = parsed("http://localhost:8080/a.kml#frag");
        assert_eq!(url.authority(), "localhost:8080");
        assert_eq!(url.as_str(), "http://localhost:8080/a.kml");
    }

    #[test]
    fn joins_relative_redirects() {
        let url = parsed("https://example.com/maps/a.kml");
        let next = url.join("../b.kml");
        assert_eq!(next.ok().map(|value| value.as_str().to_owned()).as_deref(), Some("https://example.com/b.kml"));
    }

    #[test]
    fn rejects_non_http_schemes() {
        let result = RemoteUrl::parse("ftp://example.com/a.kml");
        assert_eq!(result.err().map(|error| error.code), Some("net.url.scheme_unsupported"));
    }
}
