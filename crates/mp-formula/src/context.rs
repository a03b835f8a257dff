use std::collections::BTreeMap;

use mp_core::{ProblemError, Value, ValueType};
use mp_parser::XmlBuilder;
use tracing::{debug, warn};

use crate::formula::Formula;
use crate::rng::RandomSource;
use crate::variable::{Variable, VariableKind};

/// Whole-generation retries allowed when derived values fall outside their constraints.
pub const MAX_GENERATE_ATTEMPTS: usize = 10_000;
const MAX_EXCLUDE_DRAWS: usize = 1_000;

enum Step {
    Generated(Value),
    Pending,
    Rejected,
    Failed(String),
}

/// Ordered set of variables that formulas evaluate against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalContext {
    variables: Vec<Variable>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, variable: Variable) -> Result<(), ProblemError> {
        if self.variable(&variable.name).is_some() {
            return Err(ProblemError::new(
                "VARIABLE_DUPLICATE",
                format!("Variable '{}' is duplicated.", variable.name),
            ));
        }
        self.variables.push(variable);
        Ok(())
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|variable| variable.name == name)
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.variable(name).and_then(Variable::value)
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Binds a student-supplied value to an input variable.
    pub fn set_input_value(&mut self, name: &str, value: Value) -> Result<(), ProblemError> {
        let Some(variable) = self
            .variables
            .iter_mut()
            .find(|variable| variable.name == name)
        else {
            return Err(ProblemError::new(
                "VARIABLE_NOT_FOUND",
                format!("Input variable '{}' does not exist.", name),
            ));
        };
        let value = match (&variable.kind, value) {
            (VariableKind::InputInteger, Value::Integer(value)) => Value::Integer(value),
            (VariableKind::InputReal, Value::Integer(value)) => Value::Real(value as f64),
            (VariableKind::InputReal, Value::Real(value)) => Value::Real(value),
            (kind, value) => {
                return Err(ProblemError::new(
                    "VARIABLE_INPUT_MISMATCH",
                    format!(
                        "Cannot bind {} value to '{}' of type {}.",
                        value.type_name(),
                        name,
                        kind.type_tag()
                    ),
                ));
            }
        };
        variable.set_value(Some(value));
        Ok(())
    }

    pub fn clear_inputs(&mut self) {
        for variable in &mut self.variables {
            if variable.kind.is_input() {
                variable.set_value(None);
            }
        }
    }

    pub(crate) fn set_derived_type(&mut self, name: &str, inferred: ValueType) {
        if let Some(variable) = self
            .variables
            .iter_mut()
            .find(|variable| variable.name == name)
        {
            if let VariableKind::Derived { value_type, .. } = &mut variable.kind {
                *value_type = Some(inferred);
            }
        }
    }

    /// Assigns fresh values to every random and derived variable.
    ///
    /// Values are filled in passes until each non-input variable has one. A derived value
    /// that violates its bounds or exclusions restarts the whole pass. Returns `false` when
    /// a referenced variable does not exist, when a pass makes no progress, when a formula
    /// yields an error, or when the retry budget runs out.
    pub fn generate(&mut self, reference: &str, rng: &mut dyn RandomSource) -> bool {
        if let Some(missing) = self.first_missing_reference() {
            warn!(
                reference,
                variable = %missing.0,
                missing = %missing.1,
                "formula references an unknown variable"
            );
            return false;
        }

        for attempt in 0..MAX_GENERATE_ATTEMPTS {
            for variable in &mut self.variables {
                if variable.kind.is_generated() {
                    variable.set_value(None);
                }
            }

            let mut retry = false;
            loop {
                if self
                    .variables
                    .iter()
                    .all(|variable| variable.kind.is_input() || variable.value().is_some())
                {
                    return true;
                }

                let mut progress = false;
                for index in 0..self.variables.len() {
                    let variable = &self.variables[index];
                    if variable.kind.is_input() || variable.value().is_some() {
                        continue;
                    }
                    match self.generate_value(variable, rng) {
                        Step::Generated(value) => {
                            self.variables[index].set_value(Some(value));
                            progress = true;
                        }
                        Step::Pending => {}
                        Step::Rejected => {
                            retry = true;
                            break;
                        }
                        Step::Failed(message) => {
                            warn!(
                                reference,
                                variable = %self.variables[index].name,
                                %message,
                                "variable generation failed"
                            );
                            return false;
                        }
                    }
                }

                if retry {
                    debug!(reference, attempt, "derived value rejected, regenerating");
                    break;
                }
                if !progress {
                    let unresolved = self
                        .variables
                        .iter()
                        .filter(|variable| !variable.kind.is_input() && variable.value().is_none())
                        .map(|variable| variable.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ");
                    warn!(reference, %unresolved, "unable to compute variable values");
                    return false;
                }
            }
        }

        warn!(
            reference,
            attempts = MAX_GENERATE_ATTEMPTS,
            "derived values never satisfied their constraints"
        );
        false
    }

    /// Generates `rounds` times and records the type each derived variable produces,
    /// widening integer to real when both appear.
    pub fn infer_derived_types(
        &mut self,
        reference: &str,
        rng: &mut dyn RandomSource,
        rounds: usize,
    ) -> Result<BTreeMap<String, ValueType>, ProblemError> {
        let mut inferred: BTreeMap<String, ValueType> = BTreeMap::new();
        for _ in 0..rounds {
            if !self.generate(reference, rng) {
                return Err(ProblemError::new(
                    "VARIABLE_GENERATE_FAILED",
                    format!("{}: unable to generate variable values.", reference),
                ));
            }
            for variable in &self.variables {
                if !matches!(variable.kind, VariableKind::Derived { .. }) {
                    continue;
                }
                let Some(value) = variable.value() else {
                    continue;
                };
                let current = value.value_type();
                let merged = match inferred.get(&variable.name) {
                    None => current,
                    Some(previous) if *previous == current => current,
                    Some(ValueType::Integer) if current == ValueType::Real => ValueType::Real,
                    Some(ValueType::Real) if current == ValueType::Integer => ValueType::Real,
                    Some(previous) => {
                        return Err(ProblemError::new(
                            "VARIABLE_TYPE_INCONSISTENT",
                            format!(
                                "{}: derived variable '{}' produced both {} and {} values.",
                                reference,
                                variable.name,
                                previous.label(),
                                current.label()
                            ),
                        ));
                    }
                };
                inferred.insert(variable.name.clone(), merged);
            }
        }

        for (name, value_type) in &inferred {
            self.set_derived_type(name, *value_type);
        }
        Ok(inferred)
    }

    pub fn append_xml(&self, builder: &mut XmlBuilder, level: usize) {
        for variable in &self.variables {
            variable.append_xml(builder, level);
        }
    }

    fn first_missing_reference(&self) -> Option<(String, String)> {
        for variable in &self.variables {
            for name in variable.referenced_names() {
                if self.variable(name).is_none() {
                    return Some((variable.name.clone(), name.to_string()));
                }
            }
        }
        None
    }

    fn is_ready(&self, formulas: &[&Formula]) -> bool {
        formulas.iter().all(|formula| {
            formula
                .referenced_names()
                .iter()
                .all(|name| self.value(name).is_some())
        })
    }

    fn generate_value(&self, variable: &Variable, rng: &mut dyn RandomSource) -> Step {
        if !self.is_ready(&variable.kind.formulas()) {
            return Step::Pending;
        }

        match &variable.kind {
            VariableKind::RandomBoolean => Step::Generated(Value::Boolean(rng.next_bool())),
            VariableKind::RandomInteger { min, max, exclude } => {
                let (min, max) = match (min.evaluate(self), max.evaluate(self)) {
                    (Value::Integer(min), Value::Integer(max)) => (min, max),
                    (min, max) => {
                        return Step::Failed(format!(
                            "random-int bounds must be integers, got {} and {}",
                            min, max
                        ));
                    }
                };
                if min > max {
                    return Step::Failed(format!("random-int range {}..{} is empty", min, max));
                }
                let span = (max as i128 - min as i128 + 1) as u128;
                if span > u128::from(u32::MAX) {
                    return Step::Failed(format!("random-int range {}..{} is too wide", min, max));
                }
                let excluded = match self.evaluate_all(exclude) {
                    Ok(values) => values,
                    Err(message) => return Step::Failed(message),
                };
                for _ in 0..MAX_EXCLUDE_DRAWS {
                    let candidate = min + i64::from(rng.next_below(span as u32));
                    if !excluded
                        .iter()
                        .any(|value| values_equal(value, &Value::Integer(candidate)))
                    {
                        return Step::Generated(Value::Integer(candidate));
                    }
                }
                Step::Failed(format!(
                    "no admissible random-int value in {}..{}",
                    min, max
                ))
            }
            VariableKind::RandomReal { min, max } => {
                match (min.evaluate(self).as_real(), max.evaluate(self).as_real()) {
                    (Some(min), Some(max)) if min <= max => {
                        Step::Generated(Value::Real(min + rng.next_unit() * (max - min)))
                    }
                    _ => Step::Failed("random-real bounds must be ordered numbers".to_string()),
                }
            }
            VariableKind::RandomChoice {
                choose_from,
                exclude,
            } => {
                let options = match self.evaluate_all(choose_from) {
                    Ok(values) => values,
                    Err(message) => return Step::Failed(message),
                };
                let excluded = match self.evaluate_all(exclude) {
                    Ok(values) => values,
                    Err(message) => return Step::Failed(message),
                };
                let allowed = options
                    .into_iter()
                    .filter(|option| !excluded.iter().any(|value| values_equal(value, option)))
                    .collect::<Vec<_>>();
                if allowed.is_empty() {
                    return Step::Failed("random-choice has no admissible option".to_string());
                }
                let index = rng.next_below(allowed.len() as u32) as usize;
                Step::Generated(allowed[index].clone())
            }
            VariableKind::Derived {
                formula,
                min,
                max,
                exclude,
                ..
            } => {
                let value = formula.evaluate(self);
                if let Value::Error(message) = &value {
                    return Step::Failed(message.clone());
                }
                if let Some(min) = min {
                    match (min.evaluate(self).as_real(), value.as_real()) {
                        (Some(bound), Some(actual)) if actual < bound => return Step::Rejected,
                        (Some(_), Some(_)) => {}
                        _ => return Step::Failed("derived min needs numeric values".to_string()),
                    }
                }
                if let Some(max) = max {
                    match (max.evaluate(self).as_real(), value.as_real()) {
                        (Some(bound), Some(actual)) if actual > bound => return Step::Rejected,
                        (Some(_), Some(_)) => {}
                        _ => return Step::Failed("derived max needs numeric values".to_string()),
                    }
                }
                let excluded = match self.evaluate_all(exclude) {
                    Ok(values) => values,
                    Err(message) => return Step::Failed(message),
                };
                if excluded.iter().any(|excluded| values_equal(excluded, &value)) {
                    return Step::Rejected;
                }
                Step::Generated(value)
            }
            VariableKind::Integer
            | VariableKind::Real
            | VariableKind::Boolean
            | VariableKind::Span => Step::Failed("constant variable has no value".to_string()),
            VariableKind::InputInteger | VariableKind::InputReal => Step::Pending,
        }
    }

    fn evaluate_all(&self, formulas: &[Formula]) -> Result<Vec<Value>, String> {
        formulas
            .iter()
            .map(|formula| match formula.evaluate(self) {
                Value::Error(message) => Err(message),
                value => Ok(value),
            })
            .collect()
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left.as_real(), right.as_real()) {
        (Some(left), Some(right)) => (left - right).abs() < f64::EPSILON,
        _ => left == right,
    }
}

#[cfg(test)]
mod context_tests {
    use super::*;
    use crate::rng::SeededRandom;

    fn formula(source: &str) -> Formula {
        Formula::parse(source).expect("formula should parse")
    }

    #[test]
    fn generate_fills_values_in_dependency_order() {
        let mut context = EvalContext::new();
        context
            .add_variable(Variable::new(
                "d",
                VariableKind::Derived {
                    formula: formula("{a} * 10"),
                    min: None,
                    max: None,
                    exclude: Vec::new(),
                    value_type: None,
                },
            ))
            .expect("add d");
        context
            .add_variable(Variable::new(
                "a",
                VariableKind::RandomInteger {
                    min: formula("{n}"),
                    max: formula("{n} + 3"),
                    exclude: vec![formula("{n} + 1")],
                },
            ))
            .expect("add a");
        context
            .add_variable(Variable::constant("n", Value::Integer(2)))
            .expect("add n");

        let mut rng = SeededRandom::new(Some(11));
        for _ in 0..20 {
            assert!(context.generate("test", &mut rng));
            let a = context.value("a").and_then(Value::as_integer).expect("a");
            assert!((2..=5).contains(&a) && a != 3);
            assert_eq!(context.value("d"), Some(&Value::Integer(a * 10)));
        }
    }

    #[test]
    fn generate_retries_rejected_derived_values() {
        let mut context = EvalContext::new();
        context
            .add_variable(Variable::new(
                "a",
                VariableKind::RandomInteger {
                    min: formula("1"),
                    max: formula("10"),
                    exclude: Vec::new(),
                },
            ))
            .expect("add a");
        context
            .add_variable(Variable::new(
                "even",
                VariableKind::Derived {
                    formula: formula("{a} * 2"),
                    min: Some(formula("12")),
                    max: None,
                    exclude: vec![formula("14")],
                    value_type: None,
                },
            ))
            .expect("add even");

        let mut rng = SeededRandom::new(Some(5));
        assert!(context.generate("test", &mut rng));
        let even = context.value("even").and_then(Value::as_integer).expect("even");
        assert!(even >= 12 && even != 14);
    }

    #[test]
    fn generate_fails_on_circular_and_unknown_references() {
        let derived = |source: &str| VariableKind::Derived {
            formula: formula(source),
            min: None,
            max: None,
            exclude: Vec::new(),
            value_type: None,
        };
        let mut circular = EvalContext::new();
        circular
            .add_variable(Variable::new("x", derived("{y} + 1")))
            .expect("add x");
        circular
            .add_variable(Variable::new("y", derived("{x} + 1")))
            .expect("add y");
        let mut rng = SeededRandom::default();
        assert!(!circular.generate("loop", &mut rng));

        let mut unknown = EvalContext::new();
        unknown
            .add_variable(Variable::new("x", derived("{nowhere}")))
            .expect("add x");
        assert!(!unknown.generate("unknown", &mut rng));
    }

    #[test]
    fn random_choice_skips_excluded_options() {
        let mut context = EvalContext::new();
        context
            .add_variable(Variable::new(
                "c",
                VariableKind::RandomChoice {
                    choose_from: vec![formula("1"), formula("2"), formula("3")],
                    exclude: vec![formula("2"), formula("3")],
                },
            ))
            .expect("add c");
        let mut rng = SeededRandom::new(Some(9));
        assert!(context.generate("choice", &mut rng));
        assert_eq!(context.value("c"), Some(&Value::Integer(1)));
    }

    #[test]
    fn input_values_bind_only_to_input_variables() {
        let mut context = EvalContext::new();
        context
            .add_variable(Variable::new("x", VariableKind::InputReal))
            .expect("add x");
        context
            .add_variable(Variable::constant("k", Value::Integer(1)))
            .expect("add k");
        assert!(context.add_variable(Variable::constant("k", Value::Integer(2))).is_err());

        let mut rng = SeededRandom::default();
        assert!(context.generate("inputs", &mut rng));
        context
            .set_input_value("x", Value::Integer(3))
            .expect("bind x");
        assert_eq!(context.value("x"), Some(&Value::Real(3.0)));
        assert!(context.set_input_value("k", Value::Integer(3)).is_err());
        assert!(context.set_input_value("nope", Value::Integer(3)).is_err());
        context.clear_inputs();
        assert_eq!(context.value("x"), None);
    }

    #[test]
    fn infer_derived_types_widens_integer_to_real() {
        let mut context = EvalContext::new();
        context
            .add_variable(Variable::new(
                "pick",
                VariableKind::RandomChoice {
                    choose_from: vec![formula("1"), formula("0.5")],
                    exclude: Vec::new(),
                },
            ))
            .expect("add pick");
        context
            .add_variable(Variable::new(
                "mixed",
                VariableKind::Derived {
                    formula: formula("{pick}"),
                    min: None,
                    max: None,
                    exclude: Vec::new(),
                    value_type: None,
                },
            ))
            .expect("add mixed");

        let mut rng = SeededRandom::new(Some(2));
        let inferred = context
            .infer_derived_types("infer", &mut rng, 40)
            .expect("inference should succeed");
        assert_eq!(inferred.get("mixed"), Some(&ValueType::Real));
        match &context.variable("mixed").expect("mixed").kind {
            VariableKind::Derived { value_type, .. } => {
                assert_eq!(*value_type, Some(ValueType::Real))
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }
}
