mod context;
mod formula;
mod rhai_bridge;
mod rng;
mod variable;

pub use context::{EvalContext, MAX_GENERATE_ATTEMPTS};
pub use formula::{parse_formula_element, Formula};
pub use rng::{RandomSource, SeededRandom};
pub use variable::{format_value_literal, parse_value_literal, Variable, VariableKind};
