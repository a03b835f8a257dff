use std::sync::OnceLock;

use mp_core::{Diagnostics, ParserMode, ProblemError, Value};
use mp_parser::{escape_text, XmlBuilder, XmlElementNode};
use regex::Regex;
use rhai::{Dynamic, Engine, EvalAltResult, Position, Scope, INT};

use crate::context::EvalContext;
use crate::rhai_bridge::{dynamic_to_value, value_to_dynamic, variable_symbol};

const MAX_OPERATIONS: u64 = 100_000;

fn reference_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"\{\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*\}")
            .expect("variable reference regex should compile")
    })
}

/// An expression over context variables, written with `{name}` references.
///
/// The expression grammar is rhai's expression language. A formula never fails to
/// evaluate: problems surface as [`Value::Error`].
#[derive(Debug, Clone)]
pub struct Formula {
    source: String,
    script: String,
    names: Vec<String>,
}

impl PartialEq for Formula {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self, ProblemError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(ProblemError::new("FORMULA_EMPTY", "Formula is empty."));
        }

        let mut names = Vec::new();
        for captures in reference_regex().captures_iter(trimmed) {
            let name = captures[1].to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        let script = reference_regex()
            .replace_all(trimmed, |captures: &regex::Captures<'_>| {
                variable_symbol(&captures[1])
            })
            .to_string();

        let mut validator = formula_engine();
        validator.set_strict_variables(false);
        validator.compile_expression(&script).map_err(|error| {
            ProblemError::new(
                "FORMULA_SYNTAX",
                format!("Invalid formula \"{}\": {}", trimmed, error),
            )
        })?;

        Ok(Self {
            source: trimmed.to_string(),
            script,
            names,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Variable names referenced by the formula, in first-use order.
    pub fn referenced_names(&self) -> &[String] {
        &self.names
    }

    pub fn evaluate(&self, context: &EvalContext) -> Value {
        match self.try_evaluate(context) {
            Ok(value) => value,
            Err(error) => Value::Error(error.message),
        }
    }

    fn try_evaluate(&self, context: &EvalContext) -> Result<Value, ProblemError> {
        let mut scope = Scope::new();
        for name in &self.names {
            let value = context.value(name).ok_or_else(|| {
                ProblemError::new(
                    "FORMULA_UNBOUND",
                    format!("Variable {{{}}} has no value.", name),
                )
            })?;
            scope.push_dynamic(variable_symbol(name), value_to_dynamic(value)?);
        }

        let result = formula_engine()
            .eval_expression_with_scope::<Dynamic>(&mut scope, &self.script)
            .map_err(|error| {
                ProblemError::new(
                    "FORMULA_EVAL_ERROR",
                    format!("Formula \"{}\" failed: {}", self.source, error),
                )
            })?;
        dynamic_to_value(result)
    }

    /// Writes `<tag><expr>...</expr></tag>` on one line.
    pub fn append_xml(&self, builder: &mut XmlBuilder, level: usize, tag: &str) {
        builder
            .indent(level)
            .add("<")
            .add(tag)
            .add("><expr>")
            .add(&escape_text(&self.source))
            .add("</expr></")
            .add(tag)
            .addln(">");
    }
}

fn formula_engine() -> Engine {
    let mut engine = Engine::new();
    engine.set_strict_variables(true);
    engine.set_max_operations(MAX_OPERATIONS);
    engine.register_fn("gcd", gcd);
    engine.register_fn("lcm", lcm);
    engine
}

fn overflow(name: &str, a: INT, b: INT) -> Box<EvalAltResult> {
    EvalAltResult::ErrorArithmetic(
        format!("{}({}, {}) overflows", name, a, b),
        Position::NONE,
    )
    .into()
}

fn gcd(a: INT, b: INT) -> Result<INT, Box<EvalAltResult>> {
    let (Some(mut x), Some(mut y)) = (a.checked_abs(), b.checked_abs()) else {
        return Err(overflow("gcd", a, b));
    };
    while y != 0 {
        let next = x % y;
        x = y;
        y = next;
    }
    Ok(x)
}

fn lcm(a: INT, b: INT) -> Result<INT, Box<EvalAltResult>> {
    let divisor = gcd(a, b)?;
    if divisor == 0 {
        return Ok(0);
    }
    (a / divisor)
        .checked_mul(b)
        .and_then(INT::checked_abs)
        .ok_or_else(|| overflow("lcm", a, b))
}

pub fn parse_formula_element(
    element: &XmlElementNode,
    diagnostics: &mut Diagnostics,
    mode: ParserMode,
) -> Option<Formula> {
    let source = if let Some(expr) = element.first_child("expr") {
        expr.text_content()
    } else if element.is_text_only() {
        diagnostics.report_deprecated(
            mode,
            format!(
                "Formula as text content of <{}> is deprecated, use <expr>.",
                element.name
            ),
            Some(&element.location),
        );
        element.text_content()
    } else {
        diagnostics.report_error(
            mode,
            format!("<{}> must contain an <expr> element.", element.name),
            Some(&element.location),
        );
        return None;
    };

    match Formula::parse(&source) {
        Ok(formula) => Some(formula),
        Err(error) => {
            diagnostics.report_error(
                mode,
                format!("<{}>: {}", element.name, error.message),
                Some(&element.location),
            );
            None
        }
    }
}
