//! Style rewriting and placemark linking over a parsed KML tree.

pub mod editor;
pub mod linker;

pub use editor::StyleColor;
pub use editor::StyleReport;
pub use editor::StyleRequest;
pub use editor::StyleScope;
pub use editor::apply_fill_color;
pub use editor::apply_line_color;
pub use editor::apply_line_width;
pub use editor::apply_style;
pub use editor::current_colors;
pub use editor::format_width;
pub use linker::MANAGED_STYLE_URL;
pub use linker::ensure_style_references;

use ks_core::KmlError;
use ks_core::KmlResult;
use ks_dom::Document;
use ks_dom::NodeId;

pub const DOCUMENT_TAG: &str = "Document";
pub const CASCADING_STYLE_TAG: &str = "gx:CascadingStyle";
pub const STYLE_TAG: &str = "Style";
pub const LINE_STYLE_TAG: &str = "LineStyle";
pub const POLY_STYLE_TAG: &str = "PolyStyle";
pub const WIDTH_TAG: &str = "width";
pub const COLOR_TAG: &str = "color";
pub const PLACEMARK_TAG: &str = "Placemark";
pub const STYLE_URL_TAG: &str = "styleUrl";

/// Locates the first `Document` element anywhere in the tree.
pub fn document_node(doc: &Document) -> KmlResult<NodeId> {
    doc.first_element_named(doc.root(), DOCUMENT_TAG)
        .ok_or_else(|| KmlError::missing_node(DOCUMENT_TAG))
}
