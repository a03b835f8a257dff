use std::collections::BTreeMap;

mod choice;
mod document;
mod embedded;
mod factory;
mod html;
mod instance;
mod numeric;
mod options;
mod template;

pub use choice::{Choice, ChoiceSet, CorrectRange};
pub use document::{DocColumn, DocInput, InputKind, RenderedDoc};
pub use embedded::{
    extract_embedded_answers, insert_embedded_answers, is_embedded_answered, EmbeddedInputProblem,
};
pub use factory::{infer_variable_types, load_template, parse_problem_element, XmlContent};
pub use html::render_problem_html;
pub use instance::{AcceptNumberInstance, ChoiceInstance, InstanceKind, ProblemInstance};
pub use numeric::{parse_double, parse_long, sanitize, AcceptNumber, NumericBand, Variance};
pub use options::{RealizeOptions, DEFAULT_MAX_ORDER_ATTEMPTS};
pub use template::{
    DummyProblem, MultipleChoiceProblem, MultipleSelectionProblem, NumericProblem, ProblemKind,
    ProblemTemplate, Realization,
};

/// Submitted form parameters: field name to the values posted under it.
pub type ParamMap = BTreeMap<String, Vec<String>>;
