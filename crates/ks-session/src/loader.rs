//! Resolves a KML source to text and parses it.

use ks_core::KmlError;
use ks_core::KmlResult;
use ks_core::NetError;
use ks_dom::Document;
use ks_net::Http11Client;
use ks_net::TlsPolicy;
use ks_storage::KmlStore;
use std::path::PathBuf;
use tracing::info;

/// Where a KML document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KmlSource {
    Url(String),
    Path(PathBuf),
    Inline(String),
}

impl KmlSource {
    /// Inputs starting with `http` are URLs; anything else is a file path.
    pub fn detect(input: &str) -> Self {
        if input.starts_with("http") {
            Self::Url(input.to_owned())
        } else {
            Self::Path(PathBuf::from(input))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Path(path) => path.display().to_string(),
            Self::Inline(_) => "<inline>".to_owned(),
        }
    }
}

/// Fetches remote KML text.
pub trait RemoteFetcher {
    fn fetch_text(&mut self, url: &str) -> Result<String, NetError>;
}

/// [`RemoteFetcher`] over a blocking HTTP/1.1 client.
pub struct HttpFetcher {
    client: Http11Client,
}

impl HttpFetcher {
    pub fn new() -> KmlResult<Self> {
        Self::with_policy(TlsPolicy::default())
    }

    pub fn with_policy(policy: TlsPolicy) -> KmlResult<Self> {
        let client = Http11Client::new(policy).map_err(|error| KmlError::Config {
            message: format!("HTTP client setup failed: {error}"),
        })?;
        Ok(Self { client })
    }

    pub fn client_mut(&mut self) -> &mut Http11Client {
        &mut self.client
    }
}

impl RemoteFetcher for HttpFetcher {
    fn fetch_text(&mut self, url: &str) -> Result<String, NetError> {
        let fetched = self.client.fetch(url)?;
        if fetched.redirects > 0 {
            info!(requested = url, final_url = %fetched.final_url, "fetched after redirects");
        }
        Ok(fetched.text())
    }
}

/// Loads documents from files, URLs, or inline text.
pub struct Loader<F = HttpFetcher> {
    store: KmlStore,
    fetcher: F,
}

impl Loader {
    pub fn new(store: KmlStore) -> KmlResult<Self> {
        Ok(Self::with_fetcher(store, HttpFetcher::new()?))
    }
}

impl<F: RemoteFetcher> Loader<F> {
    pub fn with_fetcher(store: KmlStore, fetcher: F) -> Self {
        Self { store, fetcher }
    }

    pub fn store(&self) -> &KmlStore {
        &self.store
    }

    pub fn read_text(&mut self, source: &KmlSource) -> KmlResult<String> {
        match source {
            KmlSource::Url(url) => {
                self.fetcher
                    .fetch_text(url)
                    .map_err(|source| KmlError::Fetch {
                        url: url.clone(),
                        source,
                    })
            }
            KmlSource::Path(path) => self.store.read(path),
            KmlSource::Inline(text) => Ok(text.clone()),
        }
    }

    pub fn load(&mut self, source: &KmlSource) -> KmlResult<Document> {
        let text = self.read_text(source)?;
        info!(source = %source.describe(), bytes = text.len(), "loaded KML");
        ks_xml::parse_kml(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::KmlSource;
    use super::Loader;
    use super::RemoteFetcher;
    use ks_core::KmlError;
    use ks_core::NetError;
    use ks_storage::KmlStore;
    use std::path::PathBuf;

    struct FailingFetcher;

    impl RemoteFetcher for FailingFetcher {
        fn fetch_text(&mut self, _url: &str) -> Result<String, NetError> {
            Err(NetError::new("net.http.status_unsuccessful", "404"))
        }
    }

    #[test]
    fn detect_splits_urls_from_paths() {
        assert_eq!(
            KmlSource::detect("https://example.com/a.kml"),
            KmlSource::Url("https://example.com/a.kml".to_owned())
        );
        assert_eq!(
            KmlSource::detect("http://example.com/a.kml"),
            KmlSource::Url("http://example.com/a.kml".to_owned())
        );
        assert_eq!(
            KmlSource::detect("maps/SMC.kml"),
            KmlSource::Path(PathBuf::from("maps/SMC.kml"))
        );
    }

    #[test]
    fn inline_source_parses_without_io() {
        let mut loader = Loader::with_fetcher(KmlStore::new(), FailingFetcher);
        let doc = loader.load(&KmlSource::Inline("<kml><Document/></kml>".to_owned()));
        let doc = match doc {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert!(doc.first_element_named(doc.root(), "Document").is_some());
    }

    #[test]
    fn fetch_failures_keep_url_and_cause() {
        let mut loader = Loader::with_fetcher(KmlStore::new(), FailingFetcher);
        let result = loader.load(&KmlSource::Url("https://example.com/a.kml".to_owned()));

        match result {
            Err(KmlError::Fetch { url, source }) => {
                assert_eq!(url, "https://example.com/a.kml");
                assert_eq!(source.code, "net.http.status_unsuccessful");
            }
            other => panic!("expected fetch error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_inline_text_is_reported() {
        let mut loader = Loader::with_fetcher(KmlStore::new(), FailingFetcher);
        let result = loader.load(&KmlSource::Inline("<kml><Document>".to_owned()));
        assert!(matches!(result, Err(KmlError::MalformedXml { .. })));
    }
}
