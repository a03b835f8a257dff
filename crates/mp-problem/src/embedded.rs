use mp_core::{Diagnostics, ParserMode, ResponseValue, Value};
use mp_formula::{EvalContext, Formula};
use mp_parser::{escape_attr, XmlBuilder};
use tracing::warn;

use crate::document::{split_answer, DocColumn, DocInput, InputKind};
use crate::html::splice_before;
use crate::ParamMap;

/// Problem whose question carries its own inputs, graded by a boolean formula.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmbeddedInputProblem {
    pub correctness: Option<Formula>,
    /// Worked answer shown after grading.
    pub answer: Option<DocColumn>,
}

impl EmbeddedInputProblem {
    pub fn new(correctness: Formula) -> Self {
        Self {
            correctness: Some(correctness),
            answer: None,
        }
    }

    /// Evaluates the correctness formula with `response` bound to the input variables.
    pub fn is_correct(
        &self,
        context: &EvalContext,
        question: Option<&DocColumn>,
        response: &[ResponseValue],
    ) -> bool {
        let Some(correctness) = &self.correctness else {
            return false;
        };
        let mut bound = context.clone();
        bound.clear_inputs();
        if let Some(question) = question {
            question.bind_input_values(&mut bound, response);
        }
        correctness.evaluate(&bound) == Value::Boolean(true)
    }

    pub(crate) fn append_begin_xml(&self, builder: &mut XmlBuilder, level: usize) {
        if let Some(correctness) = &self.correctness {
            correctness.append_xml(builder, level, "correct");
        }
    }

    pub(crate) fn append_end_xml(&self, builder: &mut XmlBuilder, level: usize) {
        if let Some(answer) = &self.answer {
            answer.append_xml(builder, level);
        }
    }

    pub(crate) fn validate_references(
        &self,
        context: &EvalContext,
        diagnostics: &mut Diagnostics,
        mode: ParserMode,
    ) {
        if let Some(answer) = &self.answer {
            for name in answer.referenced_names() {
                if context.variable(&name).is_none() {
                    diagnostics.report_error(
                        mode,
                        format!("<answer> references undefined variable {{{}}}.", name),
                        None,
                    );
                }
            }
        }
    }
}

/// Distinct inputs by name, keeping the first declaration of each.
fn named_inputs(question: &DocColumn) -> Vec<&DocInput> {
    let mut named: Vec<&DocInput> = Vec::new();
    for input in question.inputs() {
        if !named.iter().any(|seen| seen.name == input.name) {
            named.push(input);
        }
    }
    named
}

fn clean_numeric_entry(raw: &str) -> String {
    let cleaned = raw.replace(' ', "");
    if cleaned.starts_with("(-") && cleaned.ends_with(')') {
        return cleaned[1..cleaned.len() - 1].to_string();
    }
    cleaned
}

/// Maps `INP_<name>` parameters to one `{name}=value` entry per distinct input name.
///
/// Returns `None` when no parameter for any input was submitted.
pub fn extract_embedded_answers(
    question: &DocColumn,
    params: &ParamMap,
) -> Option<Vec<ResponseValue>> {
    let mut answers = Vec::new();
    let mut found = 0;

    for input in named_inputs(question) {
        let name = &input.name;
        let Some(values) = params.get(&format!("INP_{}", name)) else {
            answers.push(ResponseValue::Text(format!("{{{}}}=null", name)));
            continue;
        };
        found += 1;

        let values: Vec<String> = if input.kind.is_numeric_field() {
            values.iter().map(|value| clean_numeric_entry(value)).collect()
        } else {
            values.clone()
        };

        let answer = match values.as_slice() {
            [] => format!("{{{}}}=", name),
            [single] => format!("{{{}}}={}", name, single),
            many => {
                let sum = many
                    .iter()
                    .map(|value| value.trim().parse::<i64>())
                    .sum::<Result<i64, _>>()
                    .unwrap_or_else(|error| {
                        warn!(input = %name, %error, "invalid values for multi-valued input");
                        0
                    });
                format!("{{{}}}={}", name, sum)
            }
        };
        answers.push(ResponseValue::Text(answer));
    }

    (found > 0).then_some(answers)
}

/// Splices recorded answers into HTML rendered from the question.
pub fn insert_embedded_answers(
    question: &DocColumn,
    answers: &[ResponseValue],
    html: &str,
) -> String {
    let mut result = html.to_string();
    if question.inputs().is_empty() {
        warn!("question has no inputs to fill");
        return result;
    }

    for answer in answers {
        let Some((name, value)) = answer.as_text().and_then(split_answer) else {
            continue;
        };
        if value.is_empty() || value == "null" {
            continue;
        }

        for input in question.inputs().iter().filter(|input| input.name == name) {
            match (input.kind, input.value) {
                (kind, _) if kind.is_field() => {
                    let marker = format!("id='INP_{}' name='INP_{}'", name, name);
                    let attribute = format!("value='{}' ", escape_attr(value));
                    match splice_before(&result, &marker, &attribute) {
                        Some(updated) => result = updated,
                        None => warn!(input = %name, "unable to locate field input"),
                    }
                    break;
                }
                (InputKind::Radio, Some(choice)) => {
                    if choice.to_string() != value {
                        continue;
                    }
                    let marker = format!("id='INP_{}_{}' name='INP_{}'", name, choice, name);
                    match splice_before(&result, &marker, "checked ") {
                        Some(updated) => result = updated,
                        None => warn!(input = %name, "unable to locate radio button"),
                    }
                    let dependent = format!(" disabled data-choice='INP_{}_{}'", name, choice);
                    let enabled = format!(" data-choice='INP_{}_{}'", name, choice);
                    result = result.replace(&dependent, &enabled);
                    break;
                }
                (InputKind::Checkbox, Some(bit)) => {
                    let Ok(mask) = value.parse::<i64>() else {
                        continue;
                    };
                    if mask & bit != bit {
                        continue;
                    }
                    let marker = format!("id='INP_{}_{}' name='INP_{}'", name, bit, name);
                    match splice_before(&result, &marker, "checked ") {
                        Some(updated) => result = updated,
                        None => warn!(input = %name, "unable to locate checkbox"),
                    }
                }
                _ => {}
            }
        }
    }
    result
}

/// True when some entry carries an actual value.
pub fn is_embedded_answered(answers: &[ResponseValue]) -> bool {
    answers.iter().filter_map(ResponseValue::as_text).any(|text| {
        text != "null" && !text.is_empty() && !text.ends_with("}=") && !text.ends_with("}=null")
    })
}
