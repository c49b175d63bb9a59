//! Ensures every placemark references a style.

use crate::PLACEMARK_TAG;
use crate::STYLE_URL_TAG;
use crate::document_node;
use ks_core::KmlResult;
use ks_dom::Document;
use tracing::debug;

/// Reference written into placemarks that carry no `styleUrl` of their own.
pub const MANAGED_STYLE_URL: &str = "#__managed_style_093FF8B01F2FCE7FD363";

/// Appends a `styleUrl` pointing at [`MANAGED_STYLE_URL`] to each `Placemark`
/// under `Document` that lacks one. Returns how many placemarks changed.
pub fn ensure_style_references(doc: &mut Document) -> KmlResult<usize> {
    let document = document_node(doc)?;
    let placemarks = doc.elements_named(document, PLACEMARK_TAG);

    let mut updated = 0_usize;
    for placemark in placemarks {
        if doc.first_child_named(placemark, STYLE_URL_TAG).is_some() {
            continue;
        }

        let (style_url, _) = doc.find_or_create_child(placemark, STYLE_URL_TAG);
        doc.set_text_content(style_url, MANAGED_STYLE_URL);
        updated = updated.saturating_add(1);
    }

    debug!(updated, "linked placemarks to managed style");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::MANAGED_STYLE_URL;
    use super::ensure_style_references;
    use ks_core::KmlError;
    use ks_dom::Document;
    use ks_xml::parse_kml;
    use ks_xml::serialize;

    fn parsed(input: &str) -> Document {
        match parse_kml(input) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn no_placemarks_is_a_no_op() {
        let input = "<kml><Document><name>empty</name></Document></kml>";
        let mut doc = parsed(input);

        assert_eq!(ensure_style_references(&mut doc).ok(), Some(0));
        assert_eq!(serialize(&doc), input);
    }

    #[test]
    fn placemark_without_reference_gets_sentinel() {
        let mut doc = parsed("<kml><Document><Placemark><name>p</name></Placemark></Document></kml>");

        assert_eq!(ensure_style_references(&mut doc).ok(), Some(1));

        let placemark = doc.first_element_named(doc.root(), "Placemark");
        let placemark = match placemark {
            Some(value) => value,
            None => panic!("Placemark should exist"),
        };
        let references = doc.elements_named(placemark, "styleUrl");
        assert_eq!(references.len(), 1);
        assert_eq!(doc.text_content(references[0]), MANAGED_STYLE_URL);
        assert_eq!(doc.children(placemark).last().copied(), Some(references[0]));
    }

    #[test]
    fn existing_references_are_kept() {
        let input = "<kml><Document><Folder><Placemark><styleUrl>#mine</styleUrl></Placemark><Placemark/></Folder></Document></kml>";
        let mut doc = parsed(input);

        assert_eq!(ensure_style_references(&mut doc).ok(), Some(1));
        assert_eq!(
            serialize(&doc),
            "<kml><Document><Folder><Placemark><styleUrl>#mine</styleUrl></Placemark><Placemark><styleUrl>#__managed_style_093FF8B01F2FCE7FD363</styleUrl></Placemark></Folder></Document></kml>"
        );
        assert_eq!(ensure_style_references(&mut doc).ok(), Some(0));
    }

    #[test]
    fn missing_document_is_reported() {
        let mut doc = parsed("<kml><Placemark/></kml>");
        let result = ensure_style_references(&mut doc);
        assert!(matches!(
            result,
            Err(KmlError::MissingRequiredNode { ref tag }) if tag == "Document"
        ));
    }
}
