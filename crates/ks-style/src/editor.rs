//! Find-or-create rewriting of `LineStyle`/`PolyStyle` width and color.

use crate::COLOR_TAG;
use crate::CASCADING_STYLE_TAG;
use crate::LINE_STYLE_TAG;
use crate::POLY_STYLE_TAG;
use crate::STYLE_TAG;
use crate::WIDTH_TAG;
use crate::document_node;
use ks_color::KmlColor;
use ks_core::KmlError;
use ks_core::KmlResult;
use ks_dom::Document;
use ks_dom::NodeId;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

/// Selects which `Style` elements an edit applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StyleScope {
    /// The `Style` inside every `gx:CascadingStyle` under `Document`.
    #[default]
    Cascading,
    /// Every `Style` element in the tree.
    AllStyles,
}

impl StyleScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cascading => "cascading",
            Self::AllStyles => "allStyles",
        }
    }
}

/// Inputs for a full line + fill rewrite.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleRequest {
    pub line_width: f64,
    pub line_color: String,
    pub fill_color: String,
    /// Percentage applied to both the line and the fill color.
    pub fill_transparency: f64,
    pub scope: StyleScope,
}

/// Summary of a style edit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StyleReport {
    pub containers: usize,
    pub created_nodes: usize,
}

impl StyleReport {
    fn record(&mut self, created: bool) {
        if created {
            self.created_nodes = self.created_nodes.saturating_add(1);
        }
    }
}

/// Writes width and color into `LineStyle` and `PolyStyle` of every selected
/// style, creating any missing level. `PolyStyle/width` also receives
/// `line_width`.
pub fn apply_style(doc: &mut Document, request: &StyleRequest) -> KmlResult<StyleReport> {
    let line_color = ks_color::encode(&request.line_color, request.fill_transparency)?;
    let fill_color = ks_color::encode(&request.fill_color, request.fill_transparency)?;
    let width = format_width(request.line_width)?;
    let styles = style_containers(doc, request.scope)?;

    let mut report = StyleReport::default();
    for style in styles {
        report.containers = report.containers.saturating_add(1);
        write_block(doc, style, LINE_STYLE_TAG, Some(&width), &line_color, &mut report);
        write_block(doc, style, POLY_STYLE_TAG, Some(&width), &fill_color, &mut report);
    }

    debug!(
        scope = request.scope.as_str(),
        containers = report.containers,
        created = report.created_nodes,
        "applied line and fill style"
    );
    Ok(report)
}

/// Sets `LineStyle/color` on every `Style` in the tree.
pub fn apply_line_color(
    doc: &mut Document,
    color: &str,
    transparency: f64,
) -> KmlResult<StyleReport> {
    let encoded = ks_color::encode(color, transparency)?;
    apply_color_to_every_style(doc, LINE_STYLE_TAG, &encoded)
}

/// Sets `PolyStyle/color` on every `Style` in the tree.
pub fn apply_fill_color(
    doc: &mut Document,
    color: &str,
    transparency: f64,
) -> KmlResult<StyleReport> {
    let encoded = ks_color::encode(color, transparency)?;
    apply_color_to_every_style(doc, POLY_STYLE_TAG, &encoded)
}

/// Sets `width` inside the `LineStyle` and `PolyStyle` elements that already
/// exist; missing style elements are left absent.
pub fn apply_line_width(doc: &mut Document, width: f64) -> KmlResult<StyleReport> {
    let width = format_width(width)?;
    let styles = style_containers(doc, StyleScope::AllStyles)?;

    let mut report = StyleReport::default();
    for style in styles {
        report.containers = report.containers.saturating_add(1);
        for block_tag in [LINE_STYLE_TAG, POLY_STYLE_TAG] {
            let Some(block) = doc.first_child_named(style, block_tag) else {
                continue;
            };
            let (width_node, created) = doc.find_or_create_child(block, WIDTH_TAG);
            report.record(created);
            doc.set_text_content(width_node, &width);
        }
    }

    debug!(
        containers = report.containers,
        created = report.created_nodes,
        "applied line width"
    );
    Ok(report)
}

fn apply_color_to_every_style(
    doc: &mut Document,
    block_tag: &str,
    encoded: &str,
) -> KmlResult<StyleReport> {
    let styles = style_containers(doc, StyleScope::AllStyles)?;

    let mut report = StyleReport::default();
    for style in styles {
        report.containers = report.containers.saturating_add(1);
        write_block(doc, style, block_tag, None, encoded, &mut report);
    }

    debug!(
        block = block_tag,
        containers = report.containers,
        created = report.created_nodes,
        "applied color"
    );
    Ok(report)
}

/// Color currently held by one `LineStyle` or `PolyStyle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleColor {
    /// `LineStyle` or `PolyStyle`.
    pub block: &'static str,
    pub raw: String,
    /// `None` when `raw` is not an 8-digit `aabbggrr` value.
    pub color: Option<KmlColor>,
}

/// Lists the colors an edit with `scope` would overwrite, in document order.
pub fn current_colors(doc: &Document, scope: StyleScope) -> KmlResult<Vec<StyleColor>> {
    let styles = style_containers(doc, scope)?;

    let mut colors = Vec::new();
    for style in styles {
        for block_tag in [LINE_STYLE_TAG, POLY_STYLE_TAG] {
            let color = doc
                .first_child_named(style, block_tag)
                .and_then(|block| doc.first_child_named(block, COLOR_TAG));
            let Some(color) = color else {
                continue;
            };

            let raw = doc.text_content(color).trim().to_owned();
            colors.push(StyleColor {
                block: block_tag,
                color: KmlColor::parse_kml(&raw).ok(),
                raw,
            });
        }
    }

    Ok(colors)
}

/// Resolves every target `Style` before any mutation happens, so a missing
/// node fails the edit with the tree untouched.
fn style_containers(doc: &Document, scope: StyleScope) -> KmlResult<Vec<NodeId>> {
    let document = document_node(doc)?;

    match scope {
        StyleScope::Cascading => doc
            .elements_named(document, CASCADING_STYLE_TAG)
            .into_iter()
            .map(|cascading| {
                doc.first_child_named(cascading, STYLE_TAG)
                    .ok_or_else(|| KmlError::missing_node(STYLE_TAG))
            })
            .collect(),
        StyleScope::AllStyles => Ok(doc.elements_named(doc.root(), STYLE_TAG)),
    }
}

fn write_block(
    doc: &mut Document,
    style: NodeId,
    block_tag: &str,
    width: Option<&str>,
    color: &str,
    report: &mut StyleReport,
) {
    let (block, created) = doc.find_or_create_child(style, block_tag);
    report.record(created);

    if let Some(width) = width {
        let (width_node, created) = doc.find_or_create_child(block, WIDTH_TAG);
        report.record(created);
        doc.set_text_content(width_node, width);
    }

    let (color_node, created) = doc.find_or_create_child(block, COLOR_TAG);
    report.record(created);
    doc.set_text_content(color_node, color);
}

/// Renders a line width for a `width` element; rejects negative and
/// non-finite values.
pub fn format_width(width: f64) -> KmlResult<String> {
    if !width.is_finite() || width < 0.0 {
        return Err(KmlError::Config {
            message: format!("line width must be a finite, non-negative number, got `{width}`"),
        });
    }

    Ok(width.to_string())
}
