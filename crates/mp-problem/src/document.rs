use std::fmt;
use std::sync::OnceLock;

use mp_core::{Diagnostics, ParserMode, ResponseValue, SourceSpan, Value};
use mp_formula::EvalContext;
use mp_parser::{
    escape_attr, escape_text, write_children, XmlBuilder, XmlElementNode, XmlNode, XmlTextNode,
};
use regex::Regex;
use serde::Serialize;
use tracing::warn;

fn reference_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_.\-]*)\}")
            .expect("document reference regex should compile")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Long,
    Double,
    String,
    Radio,
    Checkbox,
}

impl InputKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Double => "double",
            Self::String => "string",
            Self::Radio => "radio",
            Self::Checkbox => "checkbox",
        }
    }

    pub fn for_label(label: &str) -> Option<Self> {
        match label {
            "long" => Some(Self::Long),
            "double" => Some(Self::Double),
            "string" => Some(Self::String),
            "radio" => Some(Self::Radio),
            "checkbox" => Some(Self::Checkbox),
            _ => None,
        }
    }

    /// Free-entry fields, located by `id='INP_<name>'`.
    pub fn is_field(self) -> bool {
        matches!(self, Self::Long | Self::Double | Self::String)
    }

    pub fn is_numeric_field(self) -> bool {
        matches!(self, Self::Long | Self::Double)
    }
}

/// An `<input>` embedded in a document column.
#[derive(Debug, Clone, PartialEq)]
pub struct DocInput {
    pub kind: InputKind,
    pub name: String,
    /// Value submitted by a radio button or checkbox.
    pub value: Option<i64>,
    /// Radio alternative (`name`, `value`) that must be selected for this input to be enabled.
    pub enabled_by: Option<(String, i64)>,
}

impl DocInput {
    fn parse(
        element: &XmlElementNode,
        diagnostics: &mut Diagnostics,
        mode: ParserMode,
    ) -> Option<Self> {
        let span = Some(&element.location);
        let Some(kind) = element.attr("type").and_then(InputKind::for_label) else {
            diagnostics.report_error(
                mode,
                "<input> needs a type of long, double, string, radio or checkbox.",
                span,
            );
            return None;
        };
        let Some(name) = element.attr("name").filter(|name| valid_input_name(name)) else {
            diagnostics.report_error(mode, "<input> needs a valid 'name' attribute.", span);
            return None;
        };

        let value = match (kind.is_field(), element.attr("value")) {
            (true, _) => None,
            (false, Some(text)) => match text.trim().parse::<i64>() {
                Ok(value) if kind != InputKind::Checkbox || value > 0 => Some(value),
                _ => {
                    diagnostics.report_error(
                        mode,
                        format!("Invalid 'value' on {} input '{}'.", kind.label(), name),
                        span,
                    );
                    return None;
                }
            },
            (false, None) => {
                diagnostics.report_error(
                    mode,
                    format!("The {} input '{}' needs a 'value' attribute.", kind.label(), name),
                    span,
                );
                return None;
            }
        };

        let enabled_by = match (element.attr("enabled-by"), element.attr("enabled-value")) {
            (None, None) => None,
            (Some(source), Some(text)) => match text.trim().parse::<i64>() {
                Ok(value) => Some((source.to_string(), value)),
                Err(_) => {
                    diagnostics.report_error(mode, "Invalid 'enabled-value' on <input>.", span);
                    return None;
                }
            },
            _ => {
                diagnostics.report_error(
                    mode,
                    "'enabled-by' and 'enabled-value' must be given together.",
                    span,
                );
                return None;
            }
        };

        Some(Self {
            kind,
            name: name.to_string(),
            value,
            enabled_by,
        })
    }

    fn render(&self, builder: &mut XmlBuilder) {
        let name = &self.name;
        match (self.kind, self.value) {
            (InputKind::Radio, Some(value)) | (InputKind::Checkbox, Some(value)) => {
                builder.add(&format!(
                    "<input type='{}' id='INP_{}_{}' name='INP_{}' value='{}'",
                    self.kind.label(),
                    name,
                    value,
                    name,
                    value
                ));
            }
            _ => {
                builder.add(&format!(
                    "<input type='text' id='INP_{}' name='INP_{}' data-type='{}'",
                    name,
                    name,
                    self.kind.label()
                ));
            }
        }
        if let Some((source, value)) = &self.enabled_by {
            builder.add(&format!(" disabled data-choice='INP_{}_{}'", source, value));
        }
        builder.add(">");
    }
}

fn valid_input_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' || ch == '.')
}

/// HTML produced from a document column for one realization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RenderedDoc {
    html: String,
}

impl RenderedDoc {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.html
    }

    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }
}

impl fmt::Display for RenderedDoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.html)
    }
}

/// Markup content of a `<question>`, `<solution>`, `<content>` or `<answer>` element.
#[derive(Debug, Clone, PartialEq)]
pub struct DocColumn {
    tag: String,
    children: Vec<XmlNode>,
    inputs: Vec<DocInput>,
}

impl DocColumn {
    /// A column holding a single paragraph of text.
    pub fn from_text(tag: &str, text: &str) -> Self {
        let paragraph = XmlElementNode {
            name: "p".to_string(),
            attributes: Default::default(),
            children: vec![XmlNode::Text(XmlTextNode {
                value: text.to_string(),
                location: SourceSpan::synthetic(),
            })],
            location: SourceSpan::synthetic(),
        };
        Self {
            tag: tag.to_string(),
            children: vec![XmlNode::Element(paragraph)],
            inputs: Vec::new(),
        }
    }

    pub fn parse(
        element: &XmlElementNode,
        diagnostics: &mut Diagnostics,
        mode: ParserMode,
    ) -> Option<Self> {
        let mut inputs = Vec::new();
        if !collect_inputs(&element.children, &mut inputs, diagnostics, mode) {
            return None;
        }
        Some(Self {
            tag: element.name.clone(),
            children: element.children.clone(),
            inputs,
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Inputs in document order.
    pub fn inputs(&self) -> &[DocInput] {
        &self.inputs
    }

    /// Variable names referenced as `{name}` in text or attribute values.
    pub fn referenced_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        collect_references(&self.children, &mut names);
        names
    }

    /// Renders the column to HTML with variable values substituted and inputs expanded.
    pub fn create_instance(&self, context: &EvalContext) -> RenderedDoc {
        let mut builder = XmlBuilder::new();
        render_nodes(&self.children, context, &mut builder);
        RenderedDoc::new(builder.into_string())
    }

    /// Binds recorded `{name}=value` answers to the matching input variables of
    /// `context`.
    pub fn bind_input_values(&self, context: &mut EvalContext, answers: &[ResponseValue]) {
        for answer in answers {
            let Some(text) = answer.as_text() else {
                continue;
            };
            let Some((name, raw)) = split_answer(text) else {
                continue;
            };
            if raw == "null" || raw.is_empty() {
                continue;
            }
            let Some(input) = self.inputs.iter().find(|input| input.name == name) else {
                continue;
            };
            if context.variable(name).is_none() {
                continue;
            }
            let value = match input.kind {
                InputKind::Double => raw.parse::<f64>().ok().map(Value::Real),
                InputKind::Long | InputKind::Radio | InputKind::Checkbox => {
                    raw.parse::<i64>().ok().map(Value::Integer)
                }
                InputKind::String => None,
            };
            let Some(value) = value else {
                warn!(input = %name, value = %raw, "ignoring malformed input value");
                continue;
            };
            if let Err(error) = context.set_input_value(name, value) {
                warn!(input = %name, %error, "unable to bind input value");
            }
        }
    }

    pub fn append_xml(&self, builder: &mut XmlBuilder, level: usize) {
        builder.indent(level).add("<").add(&self.tag).add(">");
        write_children(builder, &self.children);
        builder.add("</").add(&self.tag).addln(">");
    }
}

/// Splits a recorded `{name}=value` answer.
pub(crate) fn split_answer(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix('{')?;
    let close = rest.find("}=")?;
    Some((&rest[..close], &rest[close + 2..]))
}

fn collect_inputs(
    nodes: &[XmlNode],
    inputs: &mut Vec<DocInput>,
    diagnostics: &mut Diagnostics,
    mode: ParserMode,
) -> bool {
    let mut valid = true;
    for node in nodes {
        let XmlNode::Element(element) = node else {
            continue;
        };
        if element.name == "input" {
            match DocInput::parse(element, diagnostics, mode) {
                Some(input) => inputs.push(input),
                None => valid = false,
            }
        } else if !collect_inputs(&element.children, inputs, diagnostics, mode) {
            valid = false;
        }
    }
    valid
}

fn collect_references(nodes: &[XmlNode], names: &mut Vec<String>) {
    let push = |text: &str, names: &mut Vec<String>| {
        for captures in reference_regex().captures_iter(text) {
            let name = captures[1].to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
    };
    for node in nodes {
        match node {
            XmlNode::Text(text) => push(&text.value, names),
            XmlNode::Element(element) => {
                for value in element.attributes.values() {
                    push(value, names);
                }
                collect_references(&element.children, names);
            }
        }
    }
}

fn substitute(text: &str, context: &EvalContext) -> String {
    reference_regex()
        .replace_all(text, |captures: &regex::Captures<'_>| match context.value(&captures[1]) {
            Some(value) => value.to_string(),
            None => captures[0].to_string(),
        })
        .to_string()
}

fn render_nodes(nodes: &[XmlNode], context: &EvalContext, builder: &mut XmlBuilder) {
    for node in nodes {
        match node {
            XmlNode::Text(text) => {
                builder.add(&escape_text(&substitute(&text.value, context)));
            }
            XmlNode::Element(element) if element.name == "input" => {
                let mut scratch = Diagnostics::new();
                if let Some(input) = DocInput::parse(element, &mut scratch, ParserMode::SILENT) {
                    input.render(builder);
                }
            }
            XmlNode::Element(element) => {
                builder.add("<").add(&element.name);
                for (name, value) in &element.attributes {
                    builder.add(&format!(
                        " {}='{}'",
                        name,
                        escape_attr(&substitute(value, context))
                    ));
                }
                if element.children.is_empty() {
                    builder.add("/>");
                    continue;
                }
                builder.add(">");
                render_nodes(&element.children, context, builder);
                builder.add("</").add(&element.name).add(">");
            }
        }
    }
}
