//! Minimal HTTP(S) fetching for remote KML documents.

pub mod client;
pub mod dns;
pub mod http;
pub mod tls;
pub mod tls_backend;
pub mod transport;
pub mod url;

pub use client::DEFAULT_MAX_REDIRECTS;
pub use client::DEFAULT_TIMEOUT;
pub use client::Http11Client;
pub use http::HttpStatusCode;
pub use tls::TlsPolicy;
pub use tls::TrustStoreMode;
pub use self::url::RemoteUrl;

/// Body and metadata of a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    pub final_url: String,
    pub status: HttpStatusCode,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub redirects: usize,
}

impl FetchedDocument {
    /// Body decoded as UTF-8, lossy, without a leading byte-order mark.
    pub fn text(&self) -> String {
        let text = String::from_utf8_lossy(&self.body);
        match text.strip_prefix('\u{feff}') {
            Some(stripped) => stripped.to_owned(),
            None => text.into_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FetchedDocument;
    use super::HttpStatusCode;

    #[test]
    fn text_drops_byte_order_mark() {
        let status = match HttpStatusCode::new(200) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        let fetched = FetchedDocument {
            final_url: "https://example.com/a.kml".to_owned(),
            status,
            content_type: None,
            body: "\u{feff}<kml/>".as_bytes().to_vec(),
            redirects: 0,
        };

        assert_eq!(fetched.text(), "<kml/>");
    }
}
