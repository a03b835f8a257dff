use std::collections::BTreeMap;
use std::ops::Range;

use mp_core::{ProblemError, SourceLocation, SourceSpan};
use roxmltree::{Document, Node, TextPos};

#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub root: XmlElementNode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElementNode),
    Text(XmlTextNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlElementNode {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<XmlNode>,
    pub location: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlTextNode {
    pub value: String,
    pub location: SourceSpan,
}

impl XmlElementNode {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn element_children(&self) -> impl Iterator<Item = &XmlElementNode> {
        self.children.iter().filter_map(|entry| match entry {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    pub fn children_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElementNode> + 'a {
        self.element_children().filter(move |child| child.name == name)
    }

    pub fn first_child(&self, name: &str) -> Option<&XmlElementNode> {
        self.element_children().find(|child| child.name == name)
    }

    /// Concatenated direct text children.
    pub fn text_content(&self) -> String {
        self.children
            .iter()
            .filter_map(|entry| match entry {
                XmlNode::Text(XmlTextNode { value, .. }) => Some(value.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn has_element_children(&self) -> bool {
        self.element_children().next().is_some()
    }

    /// True when the element holds only character data (no child elements) that is
    /// not blank.
    pub fn is_text_only(&self) -> bool {
        !self.has_element_children() && !self.text_content().trim().is_empty()
    }
}

/// Parses `source` into an owned tree. Comments and processing instructions are dropped;
/// a parse failure carries the position roxmltree stopped at.
pub fn parse_xml_document(source: &str) -> Result<XmlDocument, ProblemError> {
    let document = Document::parse(source).map_err(|error| {
        let at = location(error.pos());
        ProblemError::with_span(
            "XML_PARSE_ERROR",
            error.to_string(),
            SourceSpan {
                start: at.clone(),
                end: at,
            },
        )
    })?;
    let tree = TreeBuilder {
        document: &document,
    };
    Ok(XmlDocument {
        root: tree.element(document.root_element()),
    })
}

struct TreeBuilder<'d, 'input> {
    document: &'d Document<'input>,
}

impl TreeBuilder<'_, '_> {
    fn element(&self, node: Node<'_, '_>) -> XmlElementNode {
        XmlElementNode {
            name: node.tag_name().name().to_string(),
            attributes: node
                .attributes()
                .map(|attribute| (attribute.name().to_string(), attribute.value().to_string()))
                .collect(),
            children: node.children().filter_map(|child| self.node(child)).collect(),
            location: self.span(node.range()),
        }
    }

    fn node(&self, node: Node<'_, '_>) -> Option<XmlNode> {
        if node.is_element() {
            return Some(XmlNode::Element(self.element(node)));
        }
        if !node.is_text() {
            return None;
        }
        let value = node.text().filter(|text| !text.is_empty())?;
        Some(XmlNode::Text(XmlTextNode {
            value: value.to_string(),
            location: self.span(node.range()),
        }))
    }

    fn span(&self, range: Range<usize>) -> SourceSpan {
        SourceSpan {
            start: location(self.document.text_pos_at(range.start)),
            end: location(self.document.text_pos_at(range.end)),
        }
    }
}

fn location(position: TextPos) -> SourceLocation {
    SourceLocation {
        line: position.row as usize,
        column: position.col as usize,
    }
}
