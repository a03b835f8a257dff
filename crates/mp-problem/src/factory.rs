use std::collections::BTreeSet;

use mp_core::{CalculatorType, Diagnostics, ParserMode, ProblemType, ResponseValue};
use mp_formula::{parse_formula_element, EvalContext, Formula, SeededRandom, Variable};
use mp_parser::{parse_xml_document, XmlElementNode};
use tracing::debug;

use crate::choice::{Choice, ChoiceSet};
use crate::document::DocColumn;
use crate::embedded::EmbeddedInputProblem;
use crate::numeric::AcceptNumber;
use crate::template::{
    MultipleChoiceProblem, MultipleSelectionProblem, NumericProblem, ProblemKind, ProblemTemplate,
};

const UNKNOWN_REF: &str = "unknown";
const TYPE_INFERENCE_ROUNDS: usize = 10;

/// Problem XML source plus the diagnostics gathered while loading it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlContent {
    source: String,
    diagnostics: Diagnostics,
}

impl XmlContent {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

/// A parse step failed; the reason is already in the diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ParseFailed;

/// Loads the problem in `content`. Never fails: an unloadable document yields a dummy
/// template carrying the diagnostics.
pub fn load_template(content: &mut XmlContent, mode: ParserMode) -> ProblemTemplate {
    match parse_xml_document(&content.source) {
        Ok(document) => parse_problem_element(&document.root, &mut content.diagnostics, mode),
        Err(error) => {
            content
                .diagnostics
                .report_error(mode, error.message, error.span.as_ref());
            ProblemTemplate::dummy(UNKNOWN_REF, content.diagnostics.clone())
        }
    }
}

/// Builds a template from a `<problem>` (or dedicated `<problem-*>`) element.
pub fn parse_problem_element(
    element: &XmlElementNode,
    diagnostics: &mut Diagnostics,
    mode: ParserMode,
) -> ProblemTemplate {
    let mut local = Diagnostics::new();
    let parsed = parse_template(element, &mut local, mode);
    diagnostics.extend(local.clone());
    match parsed {
        Some(template) => template,
        None => {
            let reference = reference_hint(element).unwrap_or_else(|| UNKNOWN_REF.to_string());
            debug!(reference = %reference, "problem failed to load, substituting placeholder");
            ProblemTemplate::dummy(reference, local)
        }
    }
}

/// Generates the template's variables repeatedly and checks that every derived variable
/// keeps a consistent type, recording the inferred types.
pub fn infer_variable_types(template: &mut ProblemTemplate, diagnostics: &mut Diagnostics) -> bool {
    let mut rng = SeededRandom::default();
    match template.eval_context.infer_derived_types(
        &template.ref_base,
        &mut rng,
        TYPE_INFERENCE_ROUNDS,
    ) {
        Ok(_) => true,
        Err(error) => {
            diagnostics.error(error.message, None);
            false
        }
    }
}

fn resolve_type(
    element: &XmlElementNode,
    diagnostics: &mut Diagnostics,
    mode: ParserMode,
) -> Option<ProblemType> {
    let span = Some(&element.location);
    if element.name == "problem" {
        let Some(label) = element.attr("type") else {
            diagnostics.report_error(mode, "<problem> has no 'type' attribute.", span);
            return None;
        };
        let resolved = ProblemType::for_label(label);
        if resolved.is_none() {
            diagnostics.report_error(mode, format!("Unsupported problem type '{}'.", label), span);
        }
        return resolved;
    }
    let resolved = ProblemType::for_tag(&element.name);
    if resolved.is_none() {
        diagnostics.report_error(
            mode,
            format!("<{}> is not a problem element.", element.name),
            span,
        );
    }
    resolved
}

fn parse_template(
    element: &XmlElementNode,
    diagnostics: &mut Diagnostics,
    mode: ParserMode,
) -> Option<ProblemTemplate> {
    let problem_type = resolve_type(element, diagnostics, mode)?;
    if problem_type == ProblemType::AutoCorrect {
        return Some(ProblemTemplate::auto_correct());
    }

    let ref_base = parse_reference(element, diagnostics, mode)?;
    let calculator = parse_calculator(element, diagnostics, mode)?;
    let completion_time = parse_completed(element, diagnostics, mode)?;
    let eval_context = parse_variables(element, diagnostics, mode)?;
    let question = parse_single_doc(element, "question", diagnostics, mode)?;
    let solution = parse_single_doc(element, "solution", diagnostics, mode)?;
    for column in question.iter().chain(solution.iter()) {
        check_references(column, &eval_context, diagnostics, mode);
    }
    let response = parse_student_response(element, diagnostics, mode)?;
    let score = parse_score(element, diagnostics, mode)?;

    let kind = match problem_type {
        ProblemType::Numeric => parse_numeric(element, diagnostics, mode)?,
        ProblemType::MultipleChoice => ProblemKind::MultipleChoice(MultipleChoiceProblem {
            choices: parse_choice_set(element, &eval_context, diagnostics, mode)?,
        }),
        ProblemType::MultipleSelection => {
            let choices = parse_choice_set(element, &eval_context, diagnostics, mode)?;
            ProblemKind::MultipleSelection(MultipleSelectionProblem {
                choices,
                min_correct: optional_formula(element, "min-correct", diagnostics, mode).ok()?,
                max_correct: optional_formula(element, "max-correct", diagnostics, mode).ok()?,
            })
        }
        ProblemType::EmbeddedInput => {
            let problem = parse_embedded(element, diagnostics, mode)?;
            problem.validate_references(&eval_context, diagnostics, mode);
            ProblemKind::EmbeddedInput(problem)
        }
        ProblemType::AutoCorrect | ProblemType::Dummy => return None,
    };

    let mut template = ProblemTemplate::new(ref_base, kind);
    template.eval_context = eval_context;
    template.question = question;
    template.solution = solution;
    template.calculator = calculator;
    template.score = score;

    match response {
        Some(response) => template.set_response(Some(response)),
        None => restore_legacy_response(element, &mut template, diagnostics, mode)?,
    }
    template.set_completion_time(completion_time);
    Some(template)
}

fn reference_hint(element: &XmlElementNode) -> Option<String> {
    element
        .first_child("ref-base")
        .map(|child| child.text_content().trim().to_string())
        .or_else(|| element.attr("id").map(|id| id.trim().to_string()))
        .filter(|reference| !reference.is_empty())
}

fn valid_reference(reference: &str) -> bool {
    !reference.is_empty()
        && reference
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || "._-+=:~".contains(ch))
}

fn parse_reference(
    element: &XmlElementNode,
    diagnostics: &mut Diagnostics,
    mode: ParserMode,
) -> Option<String> {
    let Some(reference) = reference_hint(element) else {
        diagnostics.report_error(
            mode,
            "Problem has no <ref-base> element or 'id' attribute.",
            Some(&element.location),
        );
        return None;
    };
    if !valid_reference(&reference) {
        diagnostics.report_error(
            mode,
            format!("Invalid problem reference '{}'.", reference),
            Some(&element.location),
        );
        return None;
    }
    Some(reference)
}

fn parse_calculator(
    element: &XmlElementNode,
    diagnostics: &mut Diagnostics,
    mode: ParserMode,
) -> Option<CalculatorType> {
    let Some(label) = element.attr("calculator") else {
        return Some(CalculatorType::default());
    };
    let calculator = CalculatorType::for_label(label);
    if calculator.is_none() {
        diagnostics.report_error(
            mode,
            format!("Invalid 'calculator' value '{}'.", label),
            Some(&element.location),
        );
    }
    calculator
}

fn parse_completed(
    element: &XmlElementNode,
    diagnostics: &mut Diagnostics,
    mode: ParserMode,
) -> Option<i64> {
    let Some(text) = element.attr("completed") else {
        return Some(0);
    };
    let completed = text.trim().parse::<i64>().ok();
    if completed.is_none() {
        diagnostics.report_error(
            mode,
            format!("Invalid 'completed' value '{}'.", text),
            Some(&element.location),
        );
    }
    completed
}

fn parse_variables(
    element: &XmlElementNode,
    diagnostics: &mut Diagnostics,
    mode: ParserMode,
) -> Option<EvalContext> {
    let mut context = EvalContext::new();
    for child in element.children_named("var") {
        let variable = Variable::parse(child, diagnostics, mode)?;
        if let Err(error) = context.add_variable(variable) {
            diagnostics.report_error(mode, error.message, Some(&child.location));
            return None;
        }
    }
    Some(context)
}

fn parse_single_doc(
    element: &XmlElementNode,
    tag: &str,
    diagnostics: &mut Diagnostics,
    mode: ParserMode,
) -> Option<Option<DocColumn>> {
    let mut matches = element.children_named(tag);
    let Some(first) = matches.next() else {
        return Some(None);
    };
    if let Some(extra) = matches.next() {
        diagnostics.report_error(
            mode,
            format!("Only one <{}> is allowed.", tag),
            Some(&extra.location),
        );
        return None;
    }
    DocColumn::parse(first, diagnostics, mode).map(Some)
}

/// Reports `{name}` references to undefined variables without aborting the load.
fn check_references(
    column: &DocColumn,
    context: &EvalContext,
    diagnostics: &mut Diagnostics,
    mode: ParserMode,
) {
    for name in column.referenced_names() {
        if context.variable(&name).is_none() {
            diagnostics.report_error(
                mode,
                format!("<{}> references undefined variable {{{}}}.", column.tag(), name),
                None,
            );
        }
    }
}

fn parse_student_response(
    element: &XmlElementNode,
    diagnostics: &mut Diagnostics,
    mode: ParserMode,
) -> Option<Option<Vec<ResponseValue>>> {
    let Some(container) = element.first_child("student-response") else {
        return Some(None);
    };
    let mut values = Vec::new();
    for leaf in container.element_children() {
        let text = leaf.text_content();
        let value = match leaf.name.as_str() {
            "long" => text.trim().parse::<i64>().ok().map(ResponseValue::Long),
            "double" => text.trim().parse::<f64>().ok().map(ResponseValue::Double),
            "string" => Some(ResponseValue::Text(text)),
            _ => None,
        };
        let Some(value) = value else {
            diagnostics.report_error(
                mode,
                format!("Invalid <{}> in <student-response>.", leaf.name),
                Some(&leaf.location),
            );
            return None;
        };
        values.push(value);
    }
    Some(Some(values))
}

fn parse_score(
    element: &XmlElementNode,
    diagnostics: &mut Diagnostics,
    mode: ParserMode,
) -> Option<f64> {
    let Some(child) = element.first_child("score") else {
        return Some(0.0);
    };
    let score = child.text_content().trim().parse::<f64>().ok();
    if score.is_none() {
        diagnostics.report_error(mode, "Invalid <score> value.", Some(&child.location));
    }
    score
}

/// Reads a formula given either as a child element or as a (deprecated) attribute.
fn optional_formula(
    element: &XmlElementNode,
    name: &str,
    diagnostics: &mut Diagnostics,
    mode: ParserMode,
) -> Result<Option<Formula>, ParseFailed> {
    let span = Some(&element.location);
    match (element.first_child(name), element.attr(name)) {
        (Some(_), Some(_)) => {
            diagnostics.report_error(
                mode,
                format!("'{}' given both as attribute and element.", name),
                span,
            );
            Err(ParseFailed)
        }
        (Some(child), None) => parse_formula_element(child, diagnostics, mode)
            .map(Some)
            .ok_or(ParseFailed),
        (None, Some(source)) => {
            diagnostics.report_deprecated(
                mode,
                format!("'{}' attribute is deprecated, use a <{}> element.", name, name),
                span,
            );
            Formula::parse(source).map(Some).map_err(|error| {
                diagnostics.report_error(mode, format!("'{}': {}", name, error.message), span);
                ParseFailed
            })
        }
        (None, None) => Ok(None),
    }
}

fn parse_numeric(
    element: &XmlElementNode,
    diagnostics: &mut Diagnostics,
    mode: ParserMode,
) -> Option<ProblemKind> {
    let mut matches = element.children_named("accept-number");
    let Some(first) = matches.next() else {
        diagnostics.report_error(
            mode,
            "Numeric problem has no <accept-number> element.",
            Some(&element.location),
        );
        return None;
    };
    if let Some(extra) = matches.next() {
        diagnostics.report_error(
            mode,
            "Only one <accept-number> is allowed.",
            Some(&extra.location),
        );
        return None;
    }
    let accept_number = AcceptNumber::parse(first, diagnostics, mode)?;
    Some(ProblemKind::Numeric(NumericProblem {
        accept_number: Some(accept_number),
    }))
}

fn parse_choice_set(
    element: &XmlElementNode,
    context: &EvalContext,
    diagnostics: &mut Diagnostics,
    mode: ParserMode,
) -> Option<ChoiceSet> {
    let mut choices = Vec::new();
    let mut ids = BTreeSet::new();
    for child in element.children_named("choice") {
        let choice = Choice::parse(child, diagnostics, mode)?;
        if !ids.insert(choice.choice_id) {
            diagnostics.report_error(
                mode,
                format!("Duplicate choice id {}.", choice.choice_id),
                Some(&child.location),
            );
            return None;
        }
        check_references(&choice.content, context, diagnostics, mode);
        choices.push(choice);
    }
    if choices.is_empty() {
        diagnostics.report_error(
            mode,
            "Problem has no <choice> elements.",
            Some(&element.location),
        );
        return None;
    }

    let mut set = ChoiceSet::new(choices);
    set.num_choices = optional_formula(element, "num-choices", diagnostics, mode).ok()?;
    set.random_order = optional_formula(element, "random-order", diagnostics, mode).ok()?;

    if let Some(text) = element.attr("choice-order") {
        let order = parse_index_list(text).and_then(|order| {
            set.validate_order(&order).ok()?;
            Some(order)
        });
        let Some(order) = order else {
            diagnostics.report_error(
                mode,
                format!("Invalid 'choice-order' value '{}'.", text),
                Some(&element.location),
            );
            return None;
        };
        set.set_choice_order(Some(order));
    }
    Some(set)
}

fn parse_index_list(text: &str) -> Option<Vec<usize>> {
    text.split(',')
        .map(|entry| entry.trim().parse::<usize>().ok())
        .collect()
}

fn parse_embedded(
    element: &XmlElementNode,
    diagnostics: &mut Diagnostics,
    mode: ParserMode,
) -> Option<EmbeddedInputProblem> {
    let Some(correctness) = optional_formula(element, "correct", diagnostics, mode).ok()? else {
        diagnostics.report_error(
            mode,
            "Embedded input problem has no correctness formula.",
            Some(&element.location),
        );
        return None;
    };
    let answer = parse_single_doc(element, "answer", diagnostics, mode)?;
    Some(EmbeddedInputProblem {
        correctness: Some(correctness),
        answer,
    })
}

/// Restores a response from the attributes older documents used instead of
/// `<student-response>`.
fn restore_legacy_response(
    element: &XmlElementNode,
    template: &mut ProblemTemplate,
    diagnostics: &mut Diagnostics,
    mode: ParserMode,
) -> Option<()> {
    let span = Some(&element.location);
    match template.problem_type() {
        ProblemType::Numeric => {
            if let Some(text) = element.attr("student-string-answer") {
                template.set_response(Some(vec![ResponseValue::Text(text.to_string())]));
            }
        }
        ProblemType::MultipleChoice | ProblemType::MultipleSelection => {
            let Some(text) = element
                .attr("student-choices")
                .filter(|text| !text.trim().is_empty())
            else {
                return Some(());
            };
            let parsed: Option<Vec<ResponseValue>> = text
                .split(',')
                .map(|entry| entry.trim().parse::<i64>().ok().map(ResponseValue::Long))
                .collect();
            let Some(values) = parsed else {
                diagnostics.report_error(
                    mode,
                    format!("Invalid 'student-choices' value '{}'.", text),
                    span,
                );
                return None;
            };
            if let Err(error) = template.record_answer(&values) {
                diagnostics.report_error(mode, error.message, span);
                return None;
            }
        }
        _ => {}
    }
    Some(())
}
