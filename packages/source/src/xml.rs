//! Owned XML element tree for WFS documents.
//!
//! WFS responses are parsed into a lightweight tree of [`XmlElement`]s
//! built from `quick-xml` events. Namespace prefixes are stripped —
//! lookups match on local names, which is what the declarative locator
//! syntax works with. The whole document is held in memory; true
//! streaming XML parsing is a non-goal.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::SourceError;

/// One XML element: local name, child elements, and direct text content.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    /// Local tag name, namespace prefix stripped.
    pub name: String,
    /// Child elements, in document order.
    pub children: Vec<XmlElement>,
    /// Concatenated direct text content.
    pub text: String,
}

impl XmlElement {
    fn new(name: String) -> Self {
        Self {
            name,
            children: Vec::new(),
            text: String::new(),
        }
    }

    /// Finds the first descendant with the given local name, depth-first.
    /// The element itself is not considered.
    #[must_use]
    pub fn find(&self, local_name: &str) -> Option<&Self> {
        for child in &self.children {
            if child.name == local_name {
                return Some(child);
            }
            if let Some(found) = child.find(local_name) {
                return Some(found);
            }
        }
        None
    }

    /// Collects every descendant with the given local name, depth-first.
    #[must_use]
    pub fn find_all(&self, local_name: &str) -> Vec<&Self> {
        let mut found = Vec::new();
        self.collect_named(local_name, &mut found);
        found
    }

    fn collect_named<'a>(&'a self, local_name: &str, found: &mut Vec<&'a Self>) {
        for child in &self.children {
            if child.name == local_name {
                found.push(child);
            }
            child.collect_named(local_name, found);
        }
    }

    /// Returns the trimmed direct text content.
    #[must_use]
    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }
}

/// Parses a complete XML document into its root element.
///
/// # Errors
///
/// Returns [`SourceError::Xml`] on malformed input or an empty document.
pub fn parse_document(input: &str) -> Result<XmlElement, SourceError> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text_start = true;
    reader.config_mut().trim_text_end = true;

    let mut stack: Vec<XmlElement> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                stack.push(XmlElement::new(name));
            }
            Ok(Event::Empty(empty)) => {
                let name = String::from_utf8_lossy(empty.local_name().as_ref()).into_owned();
                let element = XmlElement::new(name);
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    // a self-closing root is a complete (if vacuous) document
                    None => return Ok(element),
                }
            }
            Ok(Event::Text(text)) => {
                let unescaped = text
                    .unescape()
                    .map_err(|e| SourceError::Xml(e.to_string()))?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| SourceError::Xml("unbalanced closing tag".to_string()))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => return Ok(element),
                }
            }
            Ok(Event::Eof) => {
                return Err(SourceError::Xml(
                    "document ended before the root element closed".to_string(),
                ));
            }
            Ok(_) => {}
            Err(e) => return Err(SourceError::Xml(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
        <wfs:FeatureCollection xmlns:wfs="http://www.opengis.net/wfs">
            <gml:featureMember>
                <ms:observation>
                    <ms:cd_nom>60630</ms:cd_nom>
                    <ms:observer>A. Dupont</ms:observer>
                    <ms:place>
                        <ms:code_dept>05</ms:code_dept>
                    </ms:place>
                </ms:observation>
            </gml:featureMember>
        </wfs:FeatureCollection>"#;

    #[test]
    fn parses_and_strips_namespace_prefixes() {
        let root = parse_document(SAMPLE).unwrap();
        assert_eq!(root.name, "FeatureCollection");
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].name, "featureMember");
    }

    #[test]
    fn find_matches_nested_descendants() {
        let root = parse_document(SAMPLE).unwrap();
        assert_eq!(root.find("cd_nom").unwrap().trimmed_text(), "60630");
        // nested two levels down
        assert_eq!(root.find("code_dept").unwrap().trimmed_text(), "05");
        assert!(root.find("nonexistent").is_none());
    }

    #[test]
    fn find_all_collects_every_match() {
        let doc = "<root><a><b>1</b></a><b>2</b><c><b>3</b></c></root>";
        let root = parse_document(doc).unwrap();
        let all: Vec<&str> = root
            .find_all("b")
            .into_iter()
            .map(XmlElement::trimmed_text)
            .collect();
        assert_eq!(all, vec!["1", "2", "3"]);
    }

    #[test]
    fn unescapes_entities() {
        let root = parse_document("<r><name>Quercus &amp; co</name></r>").unwrap();
        assert_eq!(root.find("name").unwrap().trimmed_text(), "Quercus & co");
    }

    #[test]
    fn self_closing_tags_are_empty_elements() {
        let root = parse_document("<r><empty/><v>x</v></r>").unwrap();
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.find("empty").unwrap().trimmed_text(), "");
    }

    #[test]
    fn rejects_truncated_documents() {
        assert!(matches!(
            parse_document("<r><unclosed>"),
            Err(SourceError::Xml(_))
        ));
    }
}
