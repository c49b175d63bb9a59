//! Editing session over one loaded document, and the stock job runner.

use crate::config::JobConfig;
use crate::loader::KmlSource;
use crate::loader::Loader;
use crate::loader::RemoteFetcher;
use ks_core::KmlResult;
use ks_dom::Document;
use ks_storage::KmlStore;
use ks_style::StyleColor;
use ks_style::StyleReport;
use ks_style::StyleRequest;
use ks_style::StyleScope;
use std::path::Path;
use std::path::PathBuf;
use tracing::info;

/// Owns a parsed document for the duration of a set of edits.
#[derive(Debug, Clone)]
pub struct EditSession {
    document: Document,
    store: KmlStore,
}

impl EditSession {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            store: KmlStore::new(),
        }
    }

    pub fn with_store(mut self, store: KmlStore) -> Self {
        self.store = store;
        self
    }

    pub fn open<F: RemoteFetcher>(loader: &mut Loader<F>, source: &KmlSource) -> KmlResult<Self> {
        let document = loader.load(source)?;
        Ok(Self::new(document).with_store(loader.store().clone()))
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn apply_style(&mut self, request: &StyleRequest) -> KmlResult<StyleReport> {
        ks_style::apply_style(&mut self.document, request)
    }

    pub fn ensure_style_references(&mut self) -> KmlResult<usize> {
        ks_style::ensure_style_references(&mut self.document)
    }

    pub fn apply_line_color(&mut self, color: &str, transparency: f64) -> KmlResult<StyleReport> {
        ks_style::apply_line_color(&mut self.document, color, transparency)
    }

    pub fn apply_fill_color(&mut self, color: &str, transparency: f64) -> KmlResult<StyleReport> {
        ks_style::apply_fill_color(&mut self.document, color, transparency)
    }

    pub fn apply_line_width(&mut self, width: f64) -> KmlResult<StyleReport> {
        ks_style::apply_line_width(&mut self.document, width)
    }

    pub fn current_colors(&self, scope: StyleScope) -> KmlResult<Vec<StyleColor>> {
        ks_style::current_colors(&self.document, scope)
    }

    pub fn to_kml_string(&self) -> String {
        ks_xml::serialize(&self.document)
    }

    /// Serializes the document and writes it, returning the resolved path.
    pub fn write_to(&self, path: &Path) -> KmlResult<PathBuf> {
        self.store.write(path, &self.to_kml_string())
    }
}

/// Outcome of [`run_job`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub linked_placemarks: usize,
    pub style: StyleReport,
    /// Colors present before the style edit overwrote them.
    pub replaced_colors: Vec<StyleColor>,
    /// `None` when the job was not asked to persist its output.
    pub written_to: Option<PathBuf>,
    pub output: String,
}

/// Load, link placemarks, restyle, and write, with the default HTTP fetcher.
pub fn run_job(config: &JobConfig) -> KmlResult<JobReport> {
    let mut loader = Loader::new(KmlStore::new())?;
    run_job_with(&mut loader, config, true)
}

/// [`run_job`] over a caller-supplied loader; `persist = false` skips the write.
pub fn run_job_with<F: RemoteFetcher>(
    loader: &mut Loader<F>,
    config: &JobConfig,
    persist: bool,
) -> KmlResult<JobReport> {
    config.style.validate()?;

    let source = KmlSource::detect(&config.input);
    let mut session = EditSession::open(loader, &source)?;

    let linked_placemarks = session.ensure_style_references()?;
    info!(linked_placemarks, "linked placemarks");

    let replaced_colors = session.current_colors(config.style.style_scope)?;
    let style = session.apply_style(&config.style.to_request())?;
    info!(
        containers = style.containers,
        created_nodes = style.created_nodes,
        scope = config.style.style_scope.as_str(),
        "applied style"
    );

    let output = session.to_kml_string();
    let written_to = if persist {
        let path = session.write_to(&config.output)?;
        info!(path = %path.display(), "wrote KML");
        Some(path)
    } else {
        None
    };

    Ok(JobReport {
        linked_placemarks,
        style,
        replaced_colors,
        written_to,
        output,
    })
}

#[cfg(test)]
mod tests {
    use super::EditSession;
    use ks_style::StyleRequest;
    use ks_style::StyleScope;

    const INPUT: &str = "<kml><Document><Style id=\"s\"><LineStyle><color>ff000000</color></LineStyle></Style><Placemark/></Document></kml>";

    fn session() -> EditSession {
        match ks_xml::parse_kml(INPUT) {
            Ok(doc) => EditSession::new(doc),
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn failed_edit_leaves_serialization_unchanged() {
        let mut session = session();
        let request = StyleRequest {
            line_width: 2.0,
            line_color: "red".to_owned(),
            fill_color: "#00FF00".to_owned(),
            fill_transparency: 10.0,
            scope: StyleScope::AllStyles,
        };

        assert!(session.apply_style(&request).is_err());
        assert_eq!(session.to_kml_string(), INPUT);
    }

    #[test]
    fn granular_edits_compose() {
        let mut session = session();

        assert!(session.apply_line_color("#0000FF", 0.0).is_ok());
        assert!(session.apply_fill_color("#00FF00", 100.0).is_ok());
        assert!(session.apply_line_width(3.0).is_ok());

        assert_eq!(
            session.to_kml_string(),
            "<kml><Document><Style id=\"s\"><LineStyle><color>00FF0000</color><width>3</width></LineStyle><PolyStyle><color>FF00FF00</color><width>3</width></PolyStyle></Style><Placemark/></Document></kml>"
        );
    }

    #[test]
    fn reports_colors_before_they_are_replaced() {
        let session = session();
        let colors = match session.current_colors(StyleScope::AllStyles) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert_eq!(colors.len(), 1);
        assert_eq!(colors[0].block, "LineStyle");
        assert_eq!(colors[0].raw, "ff000000");
    }

    #[test]
    fn linking_is_counted_once() {
        let mut session = session();
        assert_eq!(session.ensure_style_references().ok(), Some(1));
        assert_eq!(session.ensure_style_references().ok(), Some(0));
    }
}
