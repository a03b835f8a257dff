use mp_core::{Diagnostics, ParserMode, Value, ValueType};
use mp_parser::{XmlBuilder, XmlElementNode};

use crate::formula::{parse_formula_element, Formula};

#[derive(Debug, Clone, PartialEq)]
pub enum VariableKind {
    Integer,
    Real,
    Boolean,
    Span,
    RandomInteger {
        min: Formula,
        max: Formula,
        exclude: Vec<Formula>,
    },
    RandomReal {
        min: Formula,
        max: Formula,
    },
    RandomBoolean,
    RandomChoice {
        choose_from: Vec<Formula>,
        exclude: Vec<Formula>,
    },
    Derived {
        formula: Formula,
        min: Option<Formula>,
        max: Option<Formula>,
        exclude: Vec<Formula>,
        value_type: Option<ValueType>,
    },
    InputInteger,
    InputReal,
}

impl VariableKind {
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Integer => "int",
            Self::Real => "real",
            Self::Boolean => "boolean",
            Self::Span => "span",
            Self::RandomInteger { .. } => "random-int",
            Self::RandomReal { .. } => "random-real",
            Self::RandomBoolean => "random-boolean",
            Self::RandomChoice { .. } => "random-choice",
            Self::Derived { .. } => "derived",
            Self::InputInteger => "input-int",
            Self::InputReal => "input-real",
        }
    }

    pub fn is_input(&self) -> bool {
        matches!(self, Self::InputInteger | Self::InputReal)
    }

    /// Random and derived kinds get a fresh value on every generation pass.
    pub fn is_generated(&self) -> bool {
        matches!(
            self,
            Self::RandomInteger { .. }
                | Self::RandomReal { .. }
                | Self::RandomBoolean
                | Self::RandomChoice { .. }
                | Self::Derived { .. }
        )
    }

    pub(crate) fn formulas(&self) -> Vec<&Formula> {
        match self {
            Self::RandomInteger { min, max, exclude } => {
                let mut out = vec![min, max];
                out.extend(exclude);
                out
            }
            Self::RandomReal { min, max } => vec![min, max],
            Self::RandomChoice {
                choose_from,
                exclude,
            } => choose_from.iter().chain(exclude).collect(),
            Self::Derived {
                formula,
                min,
                max,
                exclude,
                ..
            } => {
                let mut out = vec![formula];
                out.extend(min.iter());
                out.extend(max.iter());
                out.extend(exclude);
                out
            }
            _ => Vec::new(),
        }
    }
}

/// A named binding in an evaluation context.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub kind: VariableKind,
    value: Option<Value>,
}

impl Variable {
    pub fn new(name: impl Into<String>, kind: VariableKind) -> Self {
        Self {
            name: name.into(),
            kind,
            value: None,
        }
    }

    /// A fixed binding whose kind follows the value's type.
    pub fn constant(name: impl Into<String>, value: Value) -> Self {
        let kind = match value {
            Value::Integer(_) => VariableKind::Integer,
            Value::Real(_) => VariableKind::Real,
            Value::Boolean(_) => VariableKind::Boolean,
            Value::Span(_) | Value::Error(_) => VariableKind::Span,
        };
        Self {
            name: name.into(),
            kind,
            value: Some(value),
        }
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub(crate) fn set_value(&mut self, value: Option<Value>) {
        self.value = value;
    }

    pub fn referenced_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        for formula in self.kind.formulas() {
            for name in formula.referenced_names() {
                if !names.contains(&name.as_str()) {
                    names.push(name.as_str());
                }
            }
        }
        names
    }

    /// Loads a `<var>` element. Errors are appended to `diagnostics` and yield `None`.
    pub fn parse(
        element: &XmlElementNode,
        diagnostics: &mut Diagnostics,
        mode: ParserMode,
    ) -> Option<Self> {
        let span = Some(&element.location);
        let Some(name) = element.attr("name") else {
            diagnostics.report_error(mode, "Missing 'name' attribute on <var> element.", span);
            return None;
        };
        let Some(type_tag) = element.attr("type") else {
            diagnostics.report_error(mode, "Missing 'type' attribute on <var> element.", span);
            return None;
        };
        if name.trim().is_empty() || name.contains('{') || name.contains('}') {
            diagnostics.report_error(
                mode,
                format!("Invalid variable name '{}'.", name),
                span,
            );
            return None;
        }

        let stored = element.attr("value");
        let (kind, value) = match type_tag {
            "int" | "real" | "boolean" => {
                let Some(text) = stored else {
                    diagnostics.report_error(
                        mode,
                        format!("Variable '{}' requires a 'value' attribute.", name),
                        span,
                    );
                    return None;
                };
                let value = match (type_tag, parse_value_literal(text)) {
                    ("int", Value::Integer(value)) => Value::Integer(value),
                    ("real", Value::Integer(value)) => Value::Real(value as f64),
                    ("real", Value::Real(value)) => Value::Real(value),
                    ("boolean", Value::Boolean(value)) => Value::Boolean(value),
                    _ => {
                        diagnostics.report_error(
                            mode,
                            format!("Invalid {} value '{}' for '{}'.", type_tag, text, name),
                            span,
                        );
                        return None;
                    }
                };
                return Some(Self::constant(name, value));
            }
            "span" => {
                let text = stored
                    .map(str::to_string)
                    .unwrap_or_else(|| element.text_content());
                return Some(Self::constant(name, Value::Span(text)));
            }
            "input-int" => (VariableKind::InputInteger, None),
            "input-real" => (VariableKind::InputReal, None),
            "random-boolean" => (
                VariableKind::RandomBoolean,
                stored.map(parse_value_literal),
            ),
            "random-int" => {
                let min = required_formula(element, "min", name, diagnostics, mode)?;
                let max = required_formula(element, "max", name, diagnostics, mode)?;
                let exclude = formula_list(element, "exclude", diagnostics, mode)?;
                (
                    VariableKind::RandomInteger { min, max, exclude },
                    stored.map(parse_value_literal),
                )
            }
            "random-real" => {
                let min = required_formula(element, "min", name, diagnostics, mode)?;
                let max = required_formula(element, "max", name, diagnostics, mode)?;
                (
                    VariableKind::RandomReal { min, max },
                    stored.map(parse_value_literal),
                )
            }
            "random-choice" => {
                let choose_from = formula_list(element, "choose-from", diagnostics, mode)?;
                if choose_from.is_empty() {
                    diagnostics.report_error(
                        mode,
                        format!("Variable '{}' needs at least one <choose-from>.", name),
                        span,
                    );
                    return None;
                }
                let exclude = formula_list(element, "exclude", diagnostics, mode)?;
                (
                    VariableKind::RandomChoice {
                        choose_from,
                        exclude,
                    },
                    stored.map(parse_value_literal),
                )
            }
            "derived" => {
                let formula = derived_formula(element, name, diagnostics, mode)?;
                let min = optional_formula(element, "min", diagnostics, mode)?;
                let max = optional_formula(element, "max", diagnostics, mode)?;
                let exclude = formula_list(element, "exclude", diagnostics, mode)?;
                let value_type = element.attr("value-type").and_then(value_type_for_label);
                (
                    VariableKind::Derived {
                        formula,
                        min,
                        max,
                        exclude,
                        value_type,
                    },
                    stored.map(parse_value_literal),
                )
            }
            other => {
                diagnostics.report_error(
                    mode,
                    format!("Unrecognized variable type '{}'.", other),
                    span,
                );
                return None;
            }
        };

        let mut variable = Self::new(name, kind);
        variable.value = value;
        Some(variable)
    }

    pub fn append_xml(&self, builder: &mut XmlBuilder, level: usize) {
        builder
            .indent(level)
            .add("<var")
            .attr("name", &self.name)
            .attr("type", self.kind.type_tag());
        if let Some(value) = self.value.as_ref().filter(|value| !value.is_error()) {
            if !self.kind.is_input() {
                builder.attr("value", &format_value_literal(value));
            }
        }
        if let VariableKind::Derived {
            value_type: Some(value_type),
            ..
        } = &self.kind
        {
            builder.attr("value-type", value_type.label());
        }

        let inner = level + 1;
        match &self.kind {
            VariableKind::RandomInteger { min, max, exclude } => {
                builder.addln(">");
                min.append_xml(builder, inner, "min");
                max.append_xml(builder, inner, "max");
                for formula in exclude {
                    formula.append_xml(builder, inner, "exclude");
                }
            }
            VariableKind::RandomReal { min, max } => {
                builder.addln(">");
                min.append_xml(builder, inner, "min");
                max.append_xml(builder, inner, "max");
            }
            VariableKind::RandomChoice {
                choose_from,
                exclude,
            } => {
                builder.addln(">");
                for formula in choose_from {
                    formula.append_xml(builder, inner, "choose-from");
                }
                for formula in exclude {
                    formula.append_xml(builder, inner, "exclude");
                }
            }
            VariableKind::Derived {
                formula,
                min,
                max,
                exclude,
                ..
            } => {
                builder.addln(">");
                builder.text_element(inner, "expr", formula.source());
                if let Some(min) = min {
                    min.append_xml(builder, inner, "min");
                }
                if let Some(max) = max {
                    max.append_xml(builder, inner, "max");
                }
                for formula in exclude {
                    formula.append_xml(builder, inner, "exclude");
                }
            }
            _ => {
                builder.addln("/>");
                return;
            }
        }
        builder.close(level, "var");
    }
}

/// Text form used for persisted values; reals keep a fractional part so they reload as
/// reals.
pub fn format_value_literal(value: &Value) -> String {
    match value {
        Value::Integer(value) => value.to_string(),
        Value::Real(value) => format!("{:?}", value),
        Value::Boolean(value) => value.to_string(),
        Value::Span(value) => value.clone(),
        Value::Error(_) => String::new(),
    }
}

pub fn parse_value_literal(text: &str) -> Value {
    let trimmed = text.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Value::Integer(value);
    }
    if let Ok(value) = trimmed.parse::<f64>() {
        if value.is_finite() {
            return Value::Real(value);
        }
    }
    match trimmed {
        "true" => Value::Boolean(true),
        "false" => Value::Boolean(false),
        _ => Value::Span(text.to_string()),
    }
}

fn value_type_for_label(label: &str) -> Option<ValueType> {
    match label {
        "integer" => Some(ValueType::Integer),
        "real" => Some(ValueType::Real),
        "boolean" => Some(ValueType::Boolean),
        "span" => Some(ValueType::Span),
        _ => None,
    }
}

/// Reads a formula given either as an attribute or as a child element.
fn optional_formula(
    element: &XmlElementNode,
    tag: &str,
    diagnostics: &mut Diagnostics,
    mode: ParserMode,
) -> Option<Option<Formula>> {
    if let Some(source) = element.attr(tag) {
        return match Formula::parse(source) {
            Ok(formula) => Some(Some(formula)),
            Err(error) => {
                diagnostics.report_error(mode, error.message, Some(&element.location));
                None
            }
        };
    }
    match element.first_child(tag) {
        Some(child) => parse_formula_element(child, diagnostics, mode).map(Some),
        None => Some(None),
    }
}

fn required_formula(
    element: &XmlElementNode,
    tag: &str,
    name: &str,
    diagnostics: &mut Diagnostics,
    mode: ParserMode,
) -> Option<Formula> {
    let formula = optional_formula(element, tag, diagnostics, mode)?;
    if formula.is_none() {
        diagnostics.report_error(
            mode,
            format!("Variable '{}' is missing <{}>.", name, tag),
            Some(&element.location),
        );
    }
    formula
}

fn formula_list(
    element: &XmlElementNode,
    tag: &str,
    diagnostics: &mut Diagnostics,
    mode: ParserMode,
) -> Option<Vec<Formula>> {
    let mut out = Vec::new();
    for child in element.children_named(tag) {
        out.push(parse_formula_element(child, diagnostics, mode)?);
    }
    Some(out)
}

fn derived_formula(
    element: &XmlElementNode,
    name: &str,
    diagnostics: &mut Diagnostics,
    mode: ParserMode,
) -> Option<Formula> {
    if let Some(expr) = element.first_child("expr") {
        return match Formula::parse(&expr.text_content()) {
            Ok(formula) => Some(formula),
            Err(error) => {
                diagnostics.report_error(mode, error.message, Some(&expr.location));
                None
            }
        };
    }
    if let Some(legacy) = element.first_child("formula") {
        diagnostics.report_deprecated(
            mode,
            "<formula> is deprecated, use <expr> instead.",
            Some(&legacy.location),
        );
        return parse_formula_element(legacy, diagnostics, mode);
    }
    diagnostics.report_error(
        mode,
        format!("Derived variable '{}' is missing <expr>.", name),
        Some(&element.location),
    );
    None
}

#[cfg(test)]
mod variable_tests {
    use super::*;
    use mp_parser::parse_xml_document;

    fn parse_var(source: &str, mode: ParserMode) -> (Option<Variable>, Diagnostics) {
        let document = parse_xml_document(source).expect("xml should parse");
        let mut diagnostics = Diagnostics::new();
        let variable = Variable::parse(&document.root, &mut diagnostics, mode);
        (variable, diagnostics)
    }

    #[test]
    fn constants_parse_with_typed_values() {
        let (variable, _) =
            parse_var(r#"<var name="n" type="int" value="4"/>"#, ParserMode::NORMAL);
        let variable = variable.expect("int var");
        assert_eq!(variable.kind, VariableKind::Integer);
        assert_eq!(variable.value(), Some(&Value::Integer(4)));

        let (variable, _) =
            parse_var(r#"<var name="r" type="real" value="2"/>"#, ParserMode::NORMAL);
        assert_eq!(variable.expect("real var").value(), Some(&Value::Real(2.0)));

        let (variable, diagnostics) =
            parse_var(r#"<var name="b" type="boolean" value="maybe"/>"#, ParserMode::NORMAL);
        assert!(variable.is_none());
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn random_int_accepts_attribute_and_child_bounds() {
        let (variable, diagnostics) = parse_var(
            r#"<var name="a" type="random-int" min="1"><max><expr>{n} + 5</expr></max><exclude><expr>3</expr></exclude></var>"#,
            ParserMode::STRICT,
        );
        let variable = variable.expect("random int");
        assert!(diagnostics.is_empty());
        assert_eq!(variable.referenced_names(), vec!["n"]);
        match &variable.kind {
            VariableKind::RandomInteger { min, max, exclude } => {
                assert_eq!(min.source(), "1");
                assert_eq!(max.source(), "{n} + 5");
                assert_eq!(exclude.len(), 1);
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn missing_bounds_and_unknown_types_are_errors() {
        let (variable, diagnostics) =
            parse_var(r#"<var name="a" type="random-int" min="1"/>"#, ParserMode::NORMAL);
        assert!(variable.is_none());
        assert!(diagnostics.has_errors());

        let (variable, diagnostics) =
            parse_var(r#"<var name="a" type="matrix"/>"#, ParserMode::NORMAL);
        assert!(variable.is_none());
        assert!(diagnostics.has_errors());

        let (variable, diagnostics) =
            parse_var(r#"<var name="{a}" type="int" value="1"/>"#, ParserMode::SILENT);
        assert!(variable.is_none());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn derived_accepts_legacy_formula_element_with_deprecation() {
        let (variable, diagnostics) = parse_var(
            r#"<var name="d" type="derived"><formula>{a} * 2</formula></var>"#,
            ParserMode::STRICT,
        );
        assert!(variable.is_some());
        assert!(!diagnostics.has_errors());
        assert_eq!(diagnostics.entries().len(), 2);
    }

    #[test]
    fn append_xml_round_trips_generated_values() {
        let (variable, _) = parse_var(
            r#"<var name="d" type="derived" value="2.5" value-type="real"><expr>{a} / 2.0</expr><min><expr>0</expr></min></var>"#,
            ParserMode::NORMAL,
        );
        let variable = variable.expect("derived var");
        assert_eq!(variable.value(), Some(&Value::Real(2.5)));

        let mut builder = XmlBuilder::new();
        variable.append_xml(&mut builder, 0);
        let (reloaded, diagnostics) = parse_var(builder.as_str(), ParserMode::STRICT);
        assert!(diagnostics.is_empty());
        assert_eq!(reloaded.expect("reloaded"), variable);
    }

    #[test]
    fn value_literals_keep_real_fractions() {
        assert_eq!(format_value_literal(&Value::Real(3.0)), "3.0");
        assert_eq!(parse_value_literal("3.0"), Value::Real(3.0));
        assert_eq!(parse_value_literal("3"), Value::Integer(3));
        assert_eq!(parse_value_literal("true"), Value::Boolean(true));
        assert_eq!(parse_value_literal("abc"), Value::Span("abc".to_string()));
    }
}
