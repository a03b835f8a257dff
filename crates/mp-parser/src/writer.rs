use std::fmt;

use crate::xml::{XmlElementNode, XmlNode};

const INDENT_WIDTH: usize = 2;

pub fn make_indent(level: usize) -> String {
    " ".repeat(level * INDENT_WIDTH)
}

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn escape_attr(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Append-only text buffer used to emit XML and HTML.
#[derive(Debug, Clone, Default)]
pub struct XmlBuilder {
    out: String,
}

impl XmlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn indent(&mut self, level: usize) -> &mut Self {
        self.out.push_str(&make_indent(level));
        self
    }

    pub fn add(&mut self, text: &str) -> &mut Self {
        self.out.push_str(text);
        self
    }

    pub fn addln(&mut self, text: &str) -> &mut Self {
        self.out.push_str(text);
        self.out.push('\n');
        self
    }

    /// Writes ` name="value"` with the value escaped.
    pub fn attr(&mut self, name: &str, value: &str) -> &mut Self {
        self.out.push(' ');
        self.out.push_str(name);
        self.out.push_str("=\"");
        self.out.push_str(&escape_attr(value));
        self.out.push('"');
        self
    }

    pub fn open(&mut self, level: usize, tag: &str) -> &mut Self {
        self.indent(level).add("<").add(tag).addln(">")
    }

    pub fn close(&mut self, level: usize, tag: &str) -> &mut Self {
        self.indent(level).add("</").add(tag).addln(">")
    }

    /// Writes `<tag>text</tag>` on its own line.
    pub fn text_element(&mut self, level: usize, tag: &str, text: &str) -> &mut Self {
        self.indent(level)
            .add("<")
            .add(tag)
            .add(">")
            .add(&escape_text(text))
            .add("</")
            .add(tag)
            .addln(">")
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.out
    }

    pub fn into_string(self) -> String {
        self.out
    }
}

impl fmt::Display for XmlBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.out)
    }
}

/// Re-serializes an element and its subtree without added whitespace.
pub fn write_element(builder: &mut XmlBuilder, element: &XmlElementNode) {
    builder.add("<").add(&element.name);
    for (name, value) in &element.attributes {
        builder.attr(name, value);
    }
    if element.children.is_empty() {
        builder.add("/>");
        return;
    }
    builder.add(">");
    write_children(builder, &element.children);
    builder.add("</").add(&element.name).add(">");
}

pub fn write_children(builder: &mut XmlBuilder, children: &[XmlNode]) {
    for child in children {
        match child {
            XmlNode::Element(element) => write_element(builder, element),
            XmlNode::Text(text) => {
                builder.add(&escape_text(&text.value));
            }
        }
    }
}
