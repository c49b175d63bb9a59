//! KML text parsing into [`ks_dom::Document`] and serialization back to text.

use ks_core::KmlError;
use ks_core::KmlResult;
use ks_dom::Attribute;
use ks_dom::Document;
use ks_dom::NodeId;
use ks_dom::NodeKind;
use roxmltree::NodeType;
use roxmltree::ParsingOptions;

const XML_PREFIX: &str = "xml";
const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";

/// Parses KML source text into an owned, mutable document tree.
pub fn parse_kml(input: &str) -> KmlResult<Document> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let parsed = roxmltree::Document::parse_with_options(input, options).map_err(|error| {
        KmlError::MalformedXml {
            message: error.to_string(),
        }
    })?;

    let mut doc = Document::new();
    doc.set_declaration(read_declaration(input));

    let root = doc.root();
    for child in parsed.root().children() {
        import_node(input, &mut doc, root, child);
    }

    if doc.document_element().is_none() {
        return Err(KmlError::MalformedXml {
            message: "document has no root element".to_owned(),
        });
    }

    Ok(doc)
}

/// Serializes the attached part of `doc` back to XML text.
pub fn serialize(doc: &Document) -> String {
    let mut out = String::new();
    if let Some(declaration) = doc.declaration() {
        out.push_str(declaration);
    }

    for child in doc.children(doc.root()) {
        write_node(doc, *child, &mut out);
    }

    out
}

fn import_node(input: &str, doc: &mut Document, parent: NodeId, node: roxmltree::Node<'_, '_>) {
    let kind = match node.node_type() {
        NodeType::Root => return,
        NodeType::Element => NodeKind::Element {
            name: qualified_element_name(input, node),
            attributes: collect_attributes(input, node),
        },
        NodeType::Text => {
            for piece in character_data(input, node) {
                let id = doc.create_node(piece);
                doc.append_child(parent, id);
            }
            return;
        }
        NodeType::Comment => NodeKind::Comment(node.text().unwrap_or_default().to_owned()),
        NodeType::PI => match node.pi() {
            Some(pi) => NodeKind::ProcessingInstruction {
                target: pi.target.to_owned(),
                value: pi.value.map(str::to_owned),
            },
            None => return,
        },
    };

    let id = doc.create_node(kind);
    doc.append_child(parent, id);

    for child in node.children() {
        import_node(input, doc, id, child);
    }
}

/// Reads the element's qualified name straight from its start tag so the
/// written prefix survives even when several prefixes share one URI.
fn qualified_element_name(input: &str, node: roxmltree::Node<'_, '_>) -> String {
    let start = node.range().start.saturating_add(1);
    let raw = input
        .get(start..)
        .map(|rest| {
            let end = rest
                .find(|ch: char| ch.is_whitespace() || ch == '>' || ch == '/')
                .unwrap_or(rest.len());
            &rest[..end]
        })
        .unwrap_or_default();

    if !raw.is_empty() && raw.ends_with(node.tag_name().name()) {
        return raw.to_owned();
    }

    let local = node.tag_name().name();
    match node
        .tag_name()
        .namespace()
        .and_then(|uri| node.lookup_prefix(uri))
    {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}:{local}"),
        _ => local.to_owned(),
    }
}

/// Splits a text node back into the plain and CDATA runs it was written as.
///
/// roxmltree merges adjacent text and CDATA into one node. Runs are only
/// split when the plain parts hold no references or carriage returns and the
/// pieces add up to the parsed text; anything else stays a single text node.
fn character_data(input: &str, node: roxmltree::Node<'_, '_>) -> Vec<NodeKind> {
    let text = node.text().unwrap_or_default();
    let merged = vec![NodeKind::Text(text.to_owned())];

    let Some(raw) = text_source(input, node) else {
        return merged;
    };
    if !raw.contains(CDATA_OPEN) {
        return merged;
    }

    let mut pieces = Vec::new();
    let mut rest = raw;
    while !rest.is_empty() {
        let Some(open) = rest.find(CDATA_OPEN) else {
            pieces.push(NodeKind::Text(rest.to_owned()));
            break;
        };
        if open > 0 {
            pieces.push(NodeKind::Text(rest[..open].to_owned()));
        }

        let body = &rest[open + CDATA_OPEN.len()..];
        let Some(close) = body.find(CDATA_CLOSE) else {
            return merged;
        };
        pieces.push(NodeKind::CData(body[..close].to_owned()));
        rest = &body[close + CDATA_CLOSE.len()..];
    }

    let plain_is_literal = pieces.iter().all(|piece| match piece {
        NodeKind::Text(plain) => !plain.contains(['&', '\r']),
        _ => true,
    });
    let rebuilt: String = pieces
        .iter()
        .filter_map(|piece| match piece {
            NodeKind::Text(value) | NodeKind::CData(value) => Some(value.as_str()),
            _ => None,
        })
        .collect();

    if plain_is_literal && rebuilt == text {
        pieces
    } else {
        merged
    }
}

/// Source text of a (possibly merged) text node: from its first byte up to
/// the next sibling, or to the parent's end tag.
fn text_source<'a>(input: &'a str, node: roxmltree::Node<'_, '_>) -> Option<&'a str> {
    let start = node.range().start;
    let end = match node.next_sibling() {
        Some(next) => next.range().start,
        None => {
            let parent_end = node.parent_element()?.range().end;
            input.get(..parent_end)?.rfind("</")?
        }
    };
    input.get(start..end)
}

/// Attribute and namespace declaration names in the order the start tag
/// lists them.
fn source_attribute_order<'a>(input: &'a str, node: roxmltree::Node<'_, '_>) -> Vec<&'a str> {
    let mut names = Vec::new();
    let Some(tag) = input.get(node.range().start..) else {
        return names;
    };

    let name_end = |text: &str| {
        text.find(|ch: char| ch.is_whitespace() || matches!(ch, '=' | '>' | '/'))
            .unwrap_or(text.len())
    };

    let mut rest = tag.get(1..).unwrap_or_default();
    rest = &rest[name_end(rest)..];
    loop {
        rest = rest.trim_start();
        if rest.is_empty() || rest.starts_with(['>', '/']) {
            break;
        }

        let end = name_end(rest);
        if end == 0 {
            break;
        }
        names.push(&rest[..end]);

        rest = rest[end..].trim_start();
        let Some(after_eq) = rest.strip_prefix('=') else {
            break;
        };
        rest = after_eq.trim_start();
        let Some(quote) = rest.chars().next().filter(|ch| matches!(ch, '"' | '\'')) else {
            break;
        };
        let Some(close) = rest[1..].find(quote) else {
            break;
        };
        rest = &rest[close + 2..];
    }

    names
}

fn collect_attributes(input: &str, node: roxmltree::Node<'_, '_>) -> Vec<Attribute> {
    let mut attributes = declared_namespaces(node);

    for attribute in node.attributes() {
        let name = match attribute.namespace() {
            Some(uri) => match attribute_prefix(node, uri) {
                Some(prefix) => format!("{prefix}:{}", attribute.name()),
                None => attribute.name().to_owned(),
            },
            None => attribute.name().to_owned(),
        };

        attributes.push(Attribute {
            name,
            value: attribute.value().to_owned(),
        });
    }

    let order = source_attribute_order(input, node);
    attributes.sort_by_key(|attribute| {
        order
            .iter()
            .position(|name| *name == attribute.name)
            .unwrap_or(order.len())
    });
    attributes
}

/// Namespace bindings introduced on this element rather than inherited.
fn declared_namespaces(node: roxmltree::Node<'_, '_>) -> Vec<Attribute> {
    let inherited: Vec<(Option<&str>, &str)> = node
        .parent_element()
        .map(|parent| {
            parent
                .namespaces()
                .map(|ns| (ns.name(), ns.uri()))
                .collect()
        })
        .unwrap_or_default();

    node.namespaces()
        .filter(|ns| ns.name() != Some(XML_PREFIX))
        .filter(|ns| !inherited.contains(&(ns.name(), ns.uri())))
        .map(|ns| Attribute {
            name: match ns.name() {
                Some(prefix) => format!("xmlns:{prefix}"),
                None => "xmlns".to_owned(),
            },
            value: ns.uri().to_owned(),
        })
        .collect()
}

fn attribute_prefix<'a>(node: roxmltree::Node<'a, '_>, uri: &str) -> Option<&'a str> {
    if uri == "http://www.w3.org/XML/1998/namespace" {
        return Some(XML_PREFIX);
    }

    node.namespaces()
        .find(|ns| ns.uri() == uri && ns.name().is_some())
        .and_then(|ns| ns.name())
}

fn read_declaration(input: &str) -> Option<String> {
    let trimmed = input.trim_start_matches('\u{feff}');
    if !trimmed.starts_with("<?xml") {
        return None;
    }

    let after_target = trimmed.as_bytes().get(5).copied();
    if !after_target.is_some_and(|byte| byte.is_ascii_whitespace() || byte == b'?') {
        return None;
    }

    // Whitespace after the declaration sits outside the root element, where
    // the parser keeps no text nodes.
    let end = trimmed.find("?>")? + 2;
    let trailing = trimmed[end..]
        .find(|ch: char| !ch.is_whitespace())
        .unwrap_or(trimmed.len() - end);
    Some(trimmed[..end + trailing].to_owned())
}

fn write_node(doc: &Document, id: NodeId, out: &mut String) {
    match doc.kind(id) {
        NodeKind::Root => {
            for child in doc.children(id) {
                write_node(doc, *child, out);
            }
        }
        NodeKind::Element { name, attributes } => {
            out.push('<');
            out.push_str(name);
            for attribute in attributes {
                out.push(' ');
                out.push_str(&attribute.name);
                out.push_str("=\"");
                escape_into(&attribute.value, true, out);
                out.push('"');
            }

            let children = doc.children(id);
            if children.is_empty() {
                out.push_str("/>");
                return;
            }

            out.push('>');
            for child in children {
                write_node(doc, *child, out);
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        NodeKind::Text(text) => escape_into(text, false, out),
        NodeKind::CData(text) => {
            out.push_str(CDATA_OPEN);
            out.push_str(text);
            out.push_str(CDATA_CLOSE);
        }
        NodeKind::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeKind::ProcessingInstruction { target, value } => {
            out.push_str("<?");
            out.push_str(target);
            if let Some(value) = value {
                out.push(' ');
                out.push_str(value);
            }
            out.push_str("?>");
        }
    }
}

fn escape_into(input: &str, attribute: bool, out: &mut String) {
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\n' if attribute => out.push_str("&#10;"),
            '\t' if attribute => out.push_str("&#9;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_kml;
    use super::serialize;
    use ks_core::KmlError;

    const SAMPLE: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
<Document>
  <!-- exported -->
  <gx:CascadingStyle xmlns:gx="http://www.google.com/kml/ext/2.2" id="managed">
    <Style><LineStyle><width>2</width></LineStyle></Style>
  </gx:CascadingStyle>
  <Placemark><name>A &amp; B</name></Placemark>
</Document>
</kml>"##;

    #[test]
    fn parsed_document_round_trips_unchanged() {
        let doc = parse_kml(SAMPLE);
        let doc = match doc {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };

        assert_eq!(serialize(&doc), SAMPLE);
    }

    #[test]
    fn keeps_prefixed_element_names() {
        let doc = match parse_kml(SAMPLE) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };

        let cascading = doc.first_element_named(doc.root(), "gx:CascadingStyle");
        assert!(cascading.is_some());
        if let Some(id) = cascading {
            assert_eq!(doc.attribute(id, "id"), Some("managed"));
        }
    }

    #[test]
    fn keeps_prefixed_attribute_names() {
        let input = r#"<kml xmlns="http://www.opengis.net/kml/2.2" xmlns:kml="http://www.opengis.net/kml/2.2"><Document><Style kml:id="s1"/></Document></kml>"#;
        let doc = match parse_kml(input) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };

        let style = doc.first_element_named(doc.root(), "Style");
        let id = style.and_then(|style| doc.attribute(style, "kml:id"));
        assert_eq!(id, Some("s1"));
        assert!(doc.first_element_named(doc.root(), "Document").is_some());
    }

    #[test]
    fn decodes_entities_in_text() {
        let doc = match parse_kml(SAMPLE) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };

        let name = doc.first_element_named(doc.root(), "name");
        let text = name.map(|id| doc.text_content(id));
        assert_eq!(text.as_deref(), Some("A & B"));
    }

    #[test]
    fn empty_elements_serialize_self_closing() {
        let doc = match parse_kml("<kml><Document></Document></kml>") {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };

        assert_eq!(serialize(&doc), "<kml><Document/></kml>");
    }

    #[test]
    fn cdata_sections_survive_a_round_trip() {
        let input = "<kml><Document><description>\n  <![CDATA[<b>Campus</b> & annex]]>\n</description><name>a<![CDATA[<b>]]>c</name></Document></kml>";
        let doc = match parse_kml(input) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };

        assert_eq!(serialize(&doc), input);
        let description = doc.first_element_named(doc.root(), "description");
        let text = description.map(|id| doc.text_content(id));
        assert_eq!(text.as_deref(), Some("\n  <b>Campus</b> & annex\n"));
    }

    #[test]
    fn cdata_next_to_entities_falls_back_to_text() {
        let input = "<kml><name>&amp;<![CDATA[<b>]]></name></kml>";
        let doc = match parse_kml(input) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };

        assert_eq!(serialize(&doc), "<kml><name>&amp;&lt;b&gt;</name></kml>");
    }

    #[test]
    fn attributes_keep_source_order() {
        let input = r#"<kml xmlns="http://www.opengis.net/kml/2.2"><Document id="a" xmlns:gx="http://www.google.com/kml/ext/2.2" gx:x = 'q>"' name="n"/></kml>"#;
        let doc = match parse_kml(input) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };

        assert_eq!(
            serialize(&doc),
            r#"<kml xmlns="http://www.opengis.net/kml/2.2"><Document id="a" xmlns:gx="http://www.google.com/kml/ext/2.2" gx:x="q>&quot;" name="n"/></kml>"#
        );
    }

    #[test]
    fn rejects_malformed_input() {
        let result = parse_kml("<kml><Document></kml>");
        assert!(matches!(result, Err(KmlError::MalformedXml { .. })));
    }

    #[test]
    fn escapes_new_text_content() {
        let mut doc = match parse_kml("<kml><Document/></kml>") {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };

        let document = doc.first_element_named(doc.root(), "Document");
        let document = match document {
            Some(value) => value,
            None => panic!("Document element should exist"),
        };
        let (name, _) = doc.find_or_create_child(document, "name");
        doc.set_text_content(name, "<a>&");

        assert_eq!(
            serialize(&doc),
            "<kml><Document><name>&lt;a&gt;&amp;</name></Document></kml>"
        );
    }
}
