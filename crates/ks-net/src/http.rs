//! HTTP/1.1 request and response values.

use crate::url::RemoteUrl;
use ks_core::NetError;
use ks_core::NetResult;

/// Methods the fetcher issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http10,
    Http11,
}

impl HttpVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http10 => "HTTP/1.0",
            Self::Http11 => "HTTP/1.1",
        }
    }
}

/// Header with a token name and a value free of CR, LF and NUL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: &str, value: &str) -> NetResult<Self> {
        if name.is_empty() || !name.bytes().all(is_token_byte) {
            return Err(NetError::new(
                "net.http.header_name_invalid",
                format!("invalid HTTP header name `{name}`"),
            ));
        }

        if value.bytes().any(|byte| matches!(byte, b'\r' | b'\n' | 0)) {
            return Err(NetError::new(
                "net.http.header_value_invalid",
                format!("invalid characters found in HTTP header `{name}`"),
            ));
        }

        Ok(Self {
            name: name.to_owned(),
            value: value.to_owned(),
        })
    }
}

/// Outgoing request; bodies are never sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: RemoteUrl,
    pub headers: Vec<Header>,
}

impl HttpRequest {
    /// Builds a request with `Host` and `Connection: close` already set.
    pub fn new(method: HttpMethod, url: RemoteUrl) -> NetResult<Self> {
        let headers = vec![
            Header::new("Host", &url.authority())?,
            Header::new("Connection", "close")?,
        ];

        Ok(Self {
            method,
            url,
            headers,
        })
    }

    pub fn with_header(mut self, name: &str, value: &str) -> NetResult<Self> {
        let header = Header::new(name, value)?;
        self.headers
            .retain(|existing| !existing.name.eq_ignore_ascii_case(name));
        self.headers.push(header);
        Ok(self)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Wire form of the request head.
    pub fn encode(&self) -> Vec<u8> {
        let mut encoded = Vec::new();
        encoded.extend_from_slice(self.method.as_str().as_bytes());
        encoded.push(b' ');
        encoded.extend_from_slice(self.url.path_and_query().as_bytes());
        encoded.push(b' ');
        encoded.extend_from_slice(HttpVersion::Http11.as_str().as_bytes());
        encoded.extend_from_slice(b"\r\n");

        for header in &self.headers {
            encoded.extend_from_slice(header.name.as_bytes());
            encoded.extend_from_slice(b": ");
            encoded.extend_from_slice(header.value.as_bytes());
            encoded.extend_from_slice(b"\r\n");
        }
        encoded.extend_from_slice(b"\r\n");
        encoded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HttpStatusCode(u16);

impl HttpStatusCode {
    pub fn new(code: u16) -> NetResult<Self> {
        if (100..=599).contains(&code) {
            return Ok(Self(code));
        }

        Err(NetError::new(
            "net.http.status_invalid",
            format!("status code must be 100-599, got `{code}`"),
        ))
    }

    pub fn as_u16(self) -> u16 {
        self.0
    }

    pub fn is_success(self) -> bool {
        (200..=299).contains(&self.0)
    }

    pub fn is_redirect(self) -> bool {
        matches!(self.0, 301 | 302 | 303 | 307 | 308)
    }

    pub fn disallows_body(self) -> bool {
        (100..200).contains(&self.0) || self.0 == 204 || self.0 == 304
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub version: HttpVersion,
    pub status: HttpStatusCode,
    pub headers: Vec<Header>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|header| header.name.eq_ignore_ascii_case(name))
        .map(|header| header.value.as_str())
}

fn is_token_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(
            byte,
            b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_'
                | b'`' | b'|' | b'~'
        )
}

#[cfg(test)]
mod tests {
    use super::Header;
    use super::HttpMethod;
    use super::HttpRequest;
    use super::HttpStatusCode;
    use crate::url::RemoteUrl;

    fn request(raw: &str) -> HttpRequest {
        let url = match RemoteUrl::parse(raw) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        match HttpRequest::new(HttpMethod::Get, url) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn encodes_request_head_with_host_and_close() {
        let request = request("http://example.com:8080/files/a.kml?v=2");
        let encoded = String::from_utf8(request.encode());

        assert_eq!(
            encoded.ok().as_deref(),
            Some("GET /files/a.kml?v=2 HTTP/1.1\r\nHost: example.com:8080\r\nConnection: close\r\n\r\n")
        );
    }

    #[test]
    fn replacing_a_header_keeps_one_copy() {
        let request = request("https://example.com/").with_header("connection", "keep-alive");
        let request = match request {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };

        assert_eq!(request.header("Connection"), Some("keep-alive"));
        assert_eq!(
            request
                .headers
                .iter()
                .filter(|header| header.name.eq_ignore_ascii_case("connection"))
                .count(),
            1
        );
    }

    #[test]
    fn rejects_header_injection() {
        assert!(Header::new("X-Test", "a\r\nInjected: 1").is_err());
        assert!(Header::new("Bad Name", "v").is_err());
    }

    #[test]
    fn status_code_classes() {
        let moved = HttpStatusCode::new(302);
        assert!(moved.is_ok_and(|code| code.is_redirect()));
        assert!(HttpStatusCode::new(204).is_ok_and(|code| code.disallows_body()));
        assert!(HttpStatusCode::new(99).is_err());
        assert!(HttpStatusCode::new(600).is_err());
    }
}
