use mp_core::{Diagnostics, ParserMode, ProblemError, ResponseValue, Value};
use mp_formula::{
    format_value_literal, parse_formula_element, parse_value_literal, EvalContext, Formula,
};
use mp_parser::{XmlBuilder, XmlElementNode};

use crate::instance::AcceptNumberInstance;

/// Tolerance around the correct answer of a numeric problem.
#[derive(Debug, Clone, PartialEq)]
pub enum Variance {
    Constant(Value),
    Formula(Formula),
}

/// Acceptance rule for a numeric answer.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptNumber {
    pub force_integer: bool,
    pub variance: Option<Variance>,
    pub correct_answer: Formula,
}

/// Inclusive range of accepted answers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericBand {
    Integer { min: i64, max: i64 },
    Real { min: f64, max: f64 },
}

impl NumericBand {
    pub fn contains(&self, answer: f64) -> bool {
        match *self {
            Self::Integer { min, max } => answer >= min as f64 && answer <= max as f64,
            Self::Real { min, max } => answer >= min && answer <= max,
        }
    }
}

impl AcceptNumber {
    pub fn new(force_integer: bool, correct_answer: Formula) -> Self {
        Self {
            force_integer,
            variance: None,
            correct_answer,
        }
    }

    pub fn with_variance(mut self, variance: Variance) -> Self {
        self.variance = Some(variance);
        self
    }

    fn correct_value(&self, context: &EvalContext) -> Result<Value, ProblemError> {
        let value = self.correct_answer.evaluate(context);
        if value.is_numeric() {
            return Ok(value);
        }
        Err(ProblemError::new(
            "REALIZE_CORRECT_ANSWER_NOT_NUMERIC",
            format!(
                "Correct answer \"{}\" evaluated to {} ({}).",
                self.correct_answer.source(),
                value,
                value.type_name()
            ),
        ))
    }

    fn variance_value(&self, context: &EvalContext) -> Result<Option<Value>, ProblemError> {
        let value = match &self.variance {
            None => return Ok(None),
            Some(Variance::Constant(value)) => value.clone(),
            Some(Variance::Formula(formula)) => formula.evaluate(context),
        };
        if value.is_numeric() {
            return Ok(Some(value));
        }
        Err(ProblemError::new(
            "REALIZE_VARIANCE_NOT_NUMERIC",
            format!("Variance evaluated to {} ({}).", value, value.type_name()),
        ))
    }

    /// Evaluates the accepted range against `context`.
    ///
    /// Integer arithmetic is used only when both the correct answer and the variance are
    /// integers; any real operand makes the whole band real.
    pub fn band(&self, context: &EvalContext) -> Result<NumericBand, ProblemError> {
        let correct = self.correct_value(context)?;
        let variance = self.variance_value(context)?;

        let band = match (&correct, &variance) {
            (Value::Integer(answer), None) => NumericBand::Integer {
                min: *answer,
                max: *answer,
            },
            (Value::Integer(answer), Some(Value::Integer(delta))) => NumericBand::Integer {
                min: answer.saturating_sub(*delta),
                max: answer.saturating_add(*delta),
            },
            _ => {
                let answer = correct.as_real().unwrap_or_default();
                let delta = variance
                    .as_ref()
                    .and_then(Value::as_real)
                    .unwrap_or_default();
                NumericBand::Real {
                    min: answer - delta,
                    max: answer + delta,
                }
            }
        };
        Ok(band)
    }

    /// Snapshot of the rule with its formulas evaluated.
    pub fn realize(&self, context: &EvalContext) -> Result<AcceptNumberInstance, ProblemError> {
        let correct = self.correct_value(context)?;
        let variance = self.variance_value(context)?;
        Ok(AcceptNumberInstance::new(
            self.force_integer,
            correct.as_real().unwrap_or_default(),
            variance
                .as_ref()
                .and_then(Value::as_real)
                .unwrap_or_default(),
        ))
    }

    /// Tests one response entry against the band.
    pub fn accepts(&self, context: &EvalContext, response: &ResponseValue) -> bool {
        let answer = match response {
            ResponseValue::Text(text) => {
                let sanitized = sanitize(text);
                let parsed = if self.force_integer {
                    parse_long(&sanitized).map(|value| value as f64)
                } else {
                    parse_double(&sanitized)
                };
                match parsed {
                    Some(value) => value,
                    None => return false,
                }
            }
            ResponseValue::Long(value) => *value as f64,
            ResponseValue::Double(value) => *value,
        };
        self.band(context)
            .map(|band| band.contains(answer))
            .unwrap_or(false)
    }

    pub fn parse(
        element: &XmlElementNode,
        diagnostics: &mut Diagnostics,
        mode: ParserMode,
    ) -> Option<Self> {
        let span = Some(&element.location);
        let force_integer = match element.attr("type").map(str::trim) {
            Some("integer") => true,
            Some("real") => false,
            _ => {
                diagnostics.report_error(
                    mode,
                    "<accept-number> needs type=\"integer\" or type=\"real\".",
                    span,
                );
                return None;
            }
        };

        let constant = match element.attr("variance") {
            None => None,
            Some(text) => {
                let value = parse_value_literal(text.trim());
                if !value.is_numeric() {
                    diagnostics.report_error(
                        mode,
                        format!("Invalid 'variance' value \"{}\" on <accept-number>.", text),
                        span,
                    );
                    return None;
                }
                Some(Variance::Constant(value))
            }
        };
        let formula = match element.first_child("variance") {
            None => None,
            Some(child) => Some(Variance::Formula(parse_formula_element(
                child,
                diagnostics,
                mode,
            )?)),
        };
        let variance = match (constant, formula) {
            (Some(_), Some(_)) => {
                diagnostics.report_error(
                    mode,
                    "<accept-number> may not have both a 'variance' attribute and a <variance> element.",
                    span,
                );
                return None;
            }
            (constant, formula) => constant.or(formula),
        };

        let correct_answer = if let Some(child) = element.first_child("correct-answer") {
            parse_formula_element(child, diagnostics, mode)?
        } else if let Some(source) = element.attr("correct-answer") {
            diagnostics.report_deprecated(
                mode,
                "'correct-answer' attribute is deprecated, use a <correct-answer> element.",
                span,
            );
            match Formula::parse(source) {
                Ok(formula) => formula,
                Err(error) => {
                    diagnostics.report_error(mode, error.message, span);
                    return None;
                }
            }
        } else {
            diagnostics.report_error(mode, "<accept-number> has no correct answer.", span);
            return None;
        };

        Some(Self {
            force_integer,
            variance,
            correct_answer,
        })
    }

    pub fn append_xml(&self, builder: &mut XmlBuilder, level: usize) {
        builder
            .indent(level)
            .add("<accept-number")
            .attr("type", if self.force_integer { "integer" } else { "real" });
        if let Some(Variance::Constant(value)) = &self.variance {
            builder.attr("variance", &format_value_literal(value));
        }
        builder.addln(">");
        if let Some(Variance::Formula(formula)) = &self.variance {
            formula.append_xml(builder, level + 1, "variance");
        }
        self.correct_answer
            .append_xml(builder, level + 1, "correct-answer");
        builder.close(level, "accept-number");
    }
}

/// Removes spaces and commas, then unwraps one level of surrounding parentheses.
pub fn sanitize(raw: &str) -> String {
    let sanitized: String = raw.chars().filter(|ch| *ch != ' ' && *ch != ',').collect();
    if sanitized.len() >= 2 && sanitized.starts_with('(') && sanitized.ends_with(')') {
        return sanitized[1..sanitized.len() - 1].to_string();
    }
    sanitized
}

/// Parses integer text, integral real text, or an evenly divisible `n/d` fraction.
pub fn parse_long(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    let trimmed = trimmed.strip_prefix('$').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed);
    let cleaned = trimmed.replace(',', "");

    if let Ok(value) = cleaned.parse::<i64>() {
        return Some(value);
    }
    if let Ok(value) = cleaned.parse::<f64>() {
        let in_range = value.abs() < 9.0e18;
        return (value.is_finite() && value.fract() == 0.0 && in_range).then_some(value as i64);
    }

    let (numerator, denominator) = cleaned.split_once('/')?;
    let numerator = numerator.trim().parse::<i64>().ok()?;
    let denominator = denominator.trim().parse::<i64>().ok()?;
    if denominator == 0 || numerator.checked_rem(denominator)? != 0 {
        return None;
    }
    numerator.checked_div(denominator)
}

/// Parses real text or an `n/d` fraction with a non-zero denominator.
pub fn parse_double(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    let trimmed = trimmed.strip_prefix('$').unwrap_or(trimmed);
    let trimmed = trimmed.strip_prefix('(').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix(')').unwrap_or(trimmed);
    let cleaned = trimmed.replace(',', "");

    if let Ok(value) = cleaned.parse::<f64>() {
        return value.is_finite().then_some(value);
    }

    let (numerator, denominator) = cleaned.split_once('/')?;
    if denominator.contains('/') {
        return None;
    }
    let numerator = numerator.trim().parse::<f64>().ok()?;
    let denominator = denominator.trim().parse::<f64>().ok()?;
    if denominator == 0.0 {
        return None;
    }
    let value = numerator / denominator;
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod numeric_tests {
    use super::*;
    use mp_formula::Variable;
    use mp_parser::parse_xml_document;

    fn text(value: &str) -> ResponseValue {
        ResponseValue::Text(value.to_string())
    }

    fn context() -> EvalContext {
        let mut context = EvalContext::new();
        context
            .add_variable(Variable::constant("c", Value::Integer(10)))
            .expect("add c");
        context
    }

    #[test]
    fn integer_band_is_inclusive() {
        let accept = AcceptNumber::new(true, Formula::parse("{c}").expect("formula"))
            .with_variance(Variance::Constant(Value::Integer(2)));
        let context = context();
        assert_eq!(
            accept.band(&context).expect("band"),
            NumericBand::Integer { min: 8, max: 12 }
        );
        for answer in ["8", "9", "10", "11", "12"] {
            assert!(accept.accepts(&context, &text(answer)), "{} should pass", answer);
        }
        for answer in ["7", "13"] {
            assert!(!accept.accepts(&context, &text(answer)), "{} should fail", answer);
        }
        assert!(accept.accepts(&context, &ResponseValue::Long(12)));
        assert!(!accept.accepts(&context, &text("ten")));
    }

    #[test]
    fn real_operand_makes_band_real() {
        let accept = AcceptNumber::new(false, Formula::parse("10.0").expect("formula"))
            .with_variance(Variance::Constant(Value::Real(0.5)));
        let empty = EvalContext::new();
        assert!(accept.accepts(&empty, &text("9.5")));
        assert!(!accept.accepts(&empty, &text("9.4")));
        assert!(accept.accepts(&empty, &ResponseValue::Double(10.5)));

        let mixed = AcceptNumber::new(false, Formula::parse("{c}").expect("formula"))
            .with_variance(Variance::Formula(Formula::parse("0.25").expect("formula")));
        assert_eq!(
            mixed.band(&context()).expect("band"),
            NumericBand::Real {
                min: 9.75,
                max: 10.25
            }
        );
    }

    #[test]
    fn missing_variance_collapses_band() {
        let accept = AcceptNumber::new(false, Formula::parse("3 / 4.0").expect("formula"));
        let context = EvalContext::new();
        assert!(accept.accepts(&context, &text("0.75")));
        assert!(accept.accepts(&context, &text("3/4")));
        assert!(!accept.accepts(&context, &text("0.7501")));
    }

    #[test]
    fn non_numeric_correct_answer_fails_realize() {
        let accept = AcceptNumber::new(false, Formula::parse("true").expect("formula"));
        let error = accept.realize(&EvalContext::new()).expect_err("boolean answer");
        assert_eq!(error.code, "REALIZE_CORRECT_ANSWER_NOT_NUMERIC");
        assert!(!accept.accepts(&EvalContext::new(), &text("1")));
    }

    #[test]
    fn sanitize_strips_separators_and_parentheses() {
        assert_eq!(sanitize(" 1, 234 "), "1234");
        assert_eq!(sanitize("(-5)"), "-5");
        assert_eq!(sanitize("("), "(");
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn parse_long_accepts_integral_forms() {
        assert_eq!(parse_long("$1,200"), Some(1200));
        assert_eq!(parse_long("45%"), Some(45));
        assert_eq!(parse_long("12.0"), Some(12));
        assert_eq!(parse_long("12/4"), Some(3));
        assert_eq!(parse_long("12.5"), None);
        assert_eq!(parse_long("7/2"), None);
        assert_eq!(parse_long("7/0"), None);
        assert_eq!(parse_long("abc"), None);
    }

    #[test]
    fn parse_double_accepts_reals_and_fractions() {
        assert_eq!(parse_double("$(2.5)"), Some(2.5));
        assert_eq!(parse_double("1,000.25"), Some(1000.25));
        assert_eq!(parse_double("1/4"), Some(0.25));
        assert_eq!(parse_double("1/0"), None);
        assert_eq!(parse_double("1/2/3"), None);
        assert_eq!(parse_double("NaN"), None);
    }

    #[test]
    fn parse_reads_canonical_and_legacy_forms() {
        let document = parse_xml_document(
            r#"<accept-number type="integer" variance="2"><correct-answer><expr>{c}</expr></correct-answer></accept-number>"#,
        )
        .expect("xml should parse");
        let mut diagnostics = Diagnostics::new();
        let accept = AcceptNumber::parse(&document.root, &mut diagnostics, ParserMode::STRICT)
            .expect("accept-number should parse");
        assert!(accept.force_integer);
        assert_eq!(accept.variance, Some(Variance::Constant(Value::Integer(2))));
        assert!(diagnostics.is_empty());

        let mut builder = XmlBuilder::new();
        accept.append_xml(&mut builder, 0);
        assert_eq!(
            builder.as_str(),
            "<accept-number type=\"integer\" variance=\"2\">\n  <correct-answer><expr>{c}</expr></correct-answer>\n</accept-number>\n"
        );

        let legacy = parse_xml_document(
            r#"<accept-number type="real" correct-answer="{c}/3"><variance>0.1</variance></accept-number>"#,
        )
        .expect("xml should parse");
        let mut diagnostics = Diagnostics::new();
        let accept = AcceptNumber::parse(&legacy.root, &mut diagnostics, ParserMode::STRICT)
            .expect("legacy accept-number should parse");
        assert!(matches!(accept.variance, Some(Variance::Formula(_))));
        assert_eq!(diagnostics.entries().len(), 2);
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn parse_rejects_conflicting_variance() {
        let document = parse_xml_document(
            r#"<accept-number type="real" variance="1"><variance><expr>2</expr></variance><correct-answer><expr>1</expr></correct-answer></accept-number>"#,
        )
        .expect("xml should parse");
        let mut diagnostics = Diagnostics::new();
        let parsed = AcceptNumber::parse(&document.root, &mut diagnostics, ParserMode::NORMAL);
        assert!(parsed.is_none());
        assert!(diagnostics.has_errors());
    }
}
