use mp_core::{ProblemError, Value};
use rhai::{Dynamic, ImmutableString, FLOAT, INT};

const VARIABLE_PREFIX: &str = "v_";

/// Rhai identifier a `{name}` reference is rewritten to.
pub(crate) fn variable_symbol(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + VARIABLE_PREFIX.len());
    out.push_str(VARIABLE_PREFIX);
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    out
}

pub(crate) fn value_to_dynamic(value: &Value) -> Result<Dynamic, ProblemError> {
    match value {
        Value::Integer(value) => Ok(Dynamic::from_int(*value as INT)),
        Value::Real(value) => Ok(Dynamic::from_float(*value as FLOAT)),
        Value::Boolean(value) => Ok(Dynamic::from_bool(*value)),
        Value::Span(value) => Ok(Dynamic::from(value.clone())),
        Value::Error(message) => Err(ProblemError::new(
            "FORMULA_ERROR_OPERAND",
            format!("Operand is an error value: {}", message),
        )),
    }
}

pub(crate) fn dynamic_to_value(value: Dynamic) -> Result<Value, ProblemError> {
    if value.is::<bool>() {
        return Ok(Value::Boolean(value.cast::<bool>()));
    }
    if value.is::<INT>() {
        return Ok(Value::Integer(value.cast::<INT>() as i64));
    }
    if value.is::<FLOAT>() {
        let number = value.cast::<FLOAT>() as f64;
        if !number.is_finite() {
            return Err(ProblemError::new(
                "FORMULA_NOT_FINITE",
                "Formula produced a non-finite number.",
            ));
        }
        return Ok(Value::Real(number));
    }
    if value.is::<ImmutableString>() {
        return Ok(Value::Span(value.cast::<ImmutableString>().to_string()));
    }
    if value.is::<char>() {
        return Ok(Value::Span(value.cast::<char>().to_string()));
    }

    Err(ProblemError::new(
        "FORMULA_VALUE_UNSUPPORTED",
        format!("Unsupported formula result type \"{}\".", value.type_name()),
    ))
}

#[cfg(test)]
mod rhai_bridge_tests {
    use super::*;

    #[test]
    fn variable_symbol_mangles_non_identifier_characters() {
        assert_eq!(variable_symbol("a.b-c"), "v_a_b_c");
        assert_eq!(variable_symbol("x1"), "v_x1");
    }

    #[test]
    fn values_cross_the_bridge_with_their_types() {
        let back = dynamic_to_value(value_to_dynamic(&Value::Integer(4)).expect("int"))
            .expect("back");
        assert_eq!(back, Value::Integer(4));
        let back = dynamic_to_value(value_to_dynamic(&Value::Real(0.5)).expect("real"))
            .expect("back");
        assert_eq!(back, Value::Real(0.5));
        let back = dynamic_to_value(value_to_dynamic(&Value::Span("s".into())).expect("span"))
            .expect("back");
        assert_eq!(back, Value::Span("s".to_string()));
        assert!(value_to_dynamic(&Value::Error("bad".into())).is_err());
    }

    #[test]
    fn dynamic_to_value_rejects_units_and_infinities() {
        assert!(dynamic_to_value(Dynamic::UNIT).is_err());
        let error = dynamic_to_value(Dynamic::from_float(FLOAT::INFINITY))
            .expect_err("infinity should fail");
        assert_eq!(error.code, "FORMULA_NOT_FINITE");
        assert_eq!(
            dynamic_to_value(Dynamic::from('q')).expect("char"),
            Value::Span("q".to_string())
        );
    }
}
