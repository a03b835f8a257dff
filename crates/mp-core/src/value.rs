use std::fmt;

use serde::{Deserialize, Serialize};

/// A typed value produced by evaluating a formula or generating a variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Span(String),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Integer,
    Real,
    Boolean,
    Span,
    Error,
}

impl ValueType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Boolean => "boolean",
            Self::Span => "span",
            Self::Error => "error",
        }
    }
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Integer(_) => ValueType::Integer,
            Self::Real(_) => ValueType::Real,
            Self::Boolean(_) => ValueType::Boolean,
            Self::Span(_) => ValueType::Span,
            Self::Error(_) => ValueType::Error,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.value_type().label()
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Numeric view of the value; integers widen to reals.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Real(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Real(_))
    }
}

/// Largest magnitude below which every integral `f64` is exactly representable.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{}", value),
            Self::Real(value) => {
                if value.fract() == 0.0 && value.abs() < MAX_EXACT_INTEGER {
                    write!(f, "{}", *value as i64)
                } else {
                    write!(f, "{}", value)
                }
            }
            Self::Boolean(value) => write!(f, "{}", value),
            Self::Span(value) => write!(f, "{}", value),
            Self::Error(message) => write!(f, "#ERROR({})", message),
        }
    }
}

/// One entry of a recorded student response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseValue {
    Long(i64),
    Double(f64),
    Text(String),
}

impl ResponseValue {
    /// Leaf element name used in `<student-response>`.
    pub fn xml_tag(&self) -> &'static str {
        match self {
            Self::Long(_) => "long",
            Self::Double(_) => "double",
            Self::Text(_) => "string",
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for ResponseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long(value) => write!(f, "{}", value),
            Self::Double(value) => write!(f, "{:?}", value),
            Self::Text(value) => write!(f, "{}", value),
        }
    }
}

#[cfg(test)]
mod value_tests {
    use super::*;

    #[test]
    fn numeric_views_widen_integers() {
        assert_eq!(Value::Integer(4).as_real(), Some(4.0));
        assert_eq!(Value::Real(2.5).as_integer(), None);
        assert_eq!(Value::Boolean(true).as_real(), None);
        assert!(Value::Error("x".to_string()).is_error());
        assert_eq!(Value::Span("a".to_string()).type_name(), "span");
    }

    #[test]
    fn display_drops_fraction_of_integral_reals() {
        assert_eq!(Value::Real(3.0).to_string(), "3");
        assert_eq!(Value::Real(0.25).to_string(), "0.25");
        assert_eq!(Value::Integer(-7).to_string(), "-7");
        assert_eq!(Value::Real(-0.0).to_string(), "0");
    }

    #[test]
    fn display_keeps_extreme_reals_exact() {
        assert_eq!(Value::Real(1e20).to_string(), "100000000000000000000");
        assert_eq!(Value::Real(1e-20).to_string(), "0.00000000000000000001");
        assert_eq!(Value::Real(f64::NAN).to_string(), "NaN");
        assert_eq!(Value::Real(f64::INFINITY).to_string(), "inf");
    }

    #[test]
    fn response_values_report_leaf_tags() {
        assert_eq!(ResponseValue::Long(1).xml_tag(), "long");
        assert_eq!(ResponseValue::Double(1.5).xml_tag(), "double");
        assert_eq!(ResponseValue::Text("y".to_string()).xml_tag(), "string");
        assert_eq!(ResponseValue::Double(2.0).to_string(), "2.0");
    }

    #[test]
    fn value_serializes_with_type_tag() {
        let json = serde_json::to_string(&Value::Integer(3)).expect("serialize");
        assert_eq!(json, r#"{"type":"integer","value":3}"#);
    }
}
