use std::collections::BTreeSet;

use mp_core::{Diagnostics, ParserMode, ProblemError, ResponseValue, Value};
use mp_formula::{parse_formula_element, EvalContext, Formula, RandomSource};
use mp_parser::{XmlBuilder, XmlElementNode, XmlNode};
use tracing::{debug, error, warn};

use crate::document::DocColumn;
use crate::html::splice_before;
use crate::instance::ChoiceInstance;
use crate::options::RealizeOptions;
use crate::ParamMap;

/// One selectable answer option.
#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    pub choice_id: i64,
    pub correct: Formula,
    pub content: DocColumn,
    /// Fixed 1-based presentation slot.
    pub pos: Option<usize>,
}

impl Choice {
    pub fn new(choice_id: i64, correct: Formula, content: DocColumn) -> Self {
        Self {
            choice_id,
            correct,
            content,
            pos: None,
        }
    }

    pub fn with_pos(mut self, pos: usize) -> Self {
        self.pos = Some(pos);
        self
    }

    /// Evaluates the correctness formula, which must produce a boolean.
    pub fn is_correct(&self, context: &EvalContext) -> Result<bool, ProblemError> {
        match self.correct.evaluate(context) {
            Value::Boolean(value) => Ok(value),
            Value::Error(message) => Err(ProblemError::new(
                "REALIZE_CHOICE_ERROR",
                format!("Choice {} correctness failed: {}", self.choice_id, message),
            )),
            other => Err(ProblemError::new(
                "REALIZE_CHOICE_NOT_BOOLEAN",
                format!(
                    "Choice {} correctness evaluated to {} ({}).",
                    self.choice_id,
                    other,
                    other.type_name()
                ),
            )),
        }
    }

    pub fn parse(
        element: &XmlElementNode,
        diagnostics: &mut Diagnostics,
        mode: ParserMode,
    ) -> Option<Self> {
        let span = Some(&element.location);
        let Some(choice_id) = element.attr("id").and_then(|id| id.trim().parse::<i64>().ok())
        else {
            diagnostics.report_error(mode, "<choice> needs an integer 'id' attribute.", span);
            return None;
        };

        let pos = match element.attr("position") {
            None => None,
            Some(text) => match text.trim().parse::<i64>() {
                Ok(value) if value > 0 => usize::try_from(value).ok(),
                Ok(_) => None,
                Err(_) => {
                    diagnostics.report_error(
                        mode,
                        format!("Invalid 'position' on choice {}.", choice_id),
                        span,
                    );
                    return None;
                }
            },
        };

        let correct = match (element.attr("correct"), element.first_child("correct")) {
            (Some(_), Some(_)) => {
                diagnostics.report_error(
                    mode,
                    format!(
                        "Choice {} has both a 'correct' attribute and a <correct> element.",
                        choice_id
                    ),
                    span,
                );
                return None;
            }
            (None, Some(child)) => parse_formula_element(child, diagnostics, mode)?,
            (Some(text), None) => {
                let constant = text.trim();
                let source = if constant.eq_ignore_ascii_case("true") {
                    "true"
                } else if constant.eq_ignore_ascii_case("false") {
                    "false"
                } else {
                    diagnostics.report_deprecated(
                        mode,
                        "'correct' formula attribute on <choice> is deprecated, use a <correct> element.",
                        span,
                    );
                    constant
                };
                match Formula::parse(source) {
                    Ok(formula) => formula,
                    Err(error) => {
                        diagnostics.report_error(mode, error.message, span);
                        return None;
                    }
                }
            }
            (None, None) => {
                diagnostics.report_error(
                    mode,
                    format!("Choice {} has no correctness formula.", choice_id),
                    span,
                );
                return None;
            }
        };

        let content = if let Some(content) = element.first_child("content") {
            if let Some(other) = element
                .element_children()
                .find(|child| child.name != "content" && child.name != "correct")
            {
                diagnostics.report_error(
                    mode,
                    format!("Unexpected <{}> in choice {}.", other.name, choice_id),
                    Some(&other.location),
                );
                return None;
            }
            DocColumn::parse(content, diagnostics, mode)?
        } else {
            diagnostics.report_deprecated(
                mode,
                "Choice content directly under <choice> is deprecated, use <content>.",
                span,
            );
            let legacy = XmlElementNode {
                name: "content".to_string(),
                attributes: Default::default(),
                children: element
                    .children
                    .iter()
                    .filter(|node| {
                        !matches!(node, XmlNode::Element(child) if child.name == "correct")
                    })
                    .cloned()
                    .collect(),
                location: element.location.clone(),
            };
            DocColumn::parse(&legacy, diagnostics, mode)?
        };

        Some(Self {
            choice_id,
            correct,
            content,
            pos,
        })
    }

    pub fn append_xml(&self, builder: &mut XmlBuilder, level: usize) {
        builder
            .indent(level)
            .add("<choice")
            .attr("id", &self.choice_id.to_string());
        if let Some(pos) = self.pos {
            builder.attr("position", &pos.to_string());
        }
        builder.addln(">");
        self.correct.append_xml(builder, level + 1, "correct");
        self.content.append_xml(builder, level + 1);
        builder.close(level, "choice");
    }
}

/// Inclusive bounds on the number of correct choices presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrectRange {
    pub min: usize,
    pub max: usize,
}

impl CorrectRange {
    pub fn exactly_one() -> Self {
        Self { min: 1, max: 1 }
    }

    pub fn contains(&self, count: usize) -> bool {
        count >= self.min && count <= self.max
    }
}

/// How many presented choices must be correct.
#[derive(Debug, Clone, Copy)]
pub(crate) enum SelectionRule<'a> {
    SingleCorrect,
    CorrectBetween {
        min: Option<&'a Formula>,
        max: Option<&'a Formula>,
    },
}

/// Authored choices plus the formulas governing how many are shown and in which order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChoiceSet {
    pub choices: Vec<Choice>,
    pub num_choices: Option<Formula>,
    pub random_order: Option<Formula>,
    choice_order: Option<Vec<usize>>,
}

impl ChoiceSet {
    pub fn new(choices: Vec<Choice>) -> Self {
        Self {
            choices,
            ..Self::default()
        }
    }

    /// Indices into `choices` in presentation order, set by the last realization.
    pub fn choice_order(&self) -> Option<&[usize]> {
        self.choice_order.as_deref()
    }

    pub(crate) fn set_choice_order(&mut self, order: Option<Vec<usize>>) {
        self.choice_order = order;
    }

    /// Checks a persisted order against the authored choices.
    pub(crate) fn validate_order(&self, order: &[usize]) -> Result<(), ProblemError> {
        let mut seen = BTreeSet::new();
        for index in order {
            if *index >= self.choices.len() || !seen.insert(*index) {
                return Err(ProblemError::new(
                    "CHOICE_ORDER_INVALID",
                    format!("Choice order entry {} is out of range or repeated.", index),
                ));
            }
        }
        Ok(())
    }

    fn presented_size(&self, context: &EvalContext) -> Result<usize, ProblemError> {
        let Some(formula) = &self.num_choices else {
            return Ok(self.choices.len());
        };
        match formula.evaluate(context) {
            Value::Integer(count) if count >= 1 => {
                Ok(usize::try_from(count).map_or(self.choices.len(), |count| {
                    count.min(self.choices.len())
                }))
            }
            other => Err(ProblemError::new(
                "REALIZE_INVALID_NUM_CHOICES",
                format!(
                    "Number of choices evaluated to {} ({}), expected a positive integer.",
                    other,
                    other.type_name()
                ),
            )),
        }
    }

    fn is_random_order(&self, context: &EvalContext) -> Result<bool, ProblemError> {
        let Some(formula) = &self.random_order else {
            return Ok(false);
        };
        match formula.evaluate(context) {
            Value::Boolean(value) => Ok(value),
            other => Err(ProblemError::new(
                "REALIZE_INVALID_RANDOM_ORDER",
                format!(
                    "Random order evaluated to {} ({}), expected a boolean.",
                    other,
                    other.type_name()
                ),
            )),
        }
    }

    /// Chooses and orders the presented subset so the correct count satisfies `rule`.
    pub(crate) fn select_order(
        &self,
        context: &EvalContext,
        rule: SelectionRule<'_>,
        rng: &mut dyn RandomSource,
        options: &RealizeOptions,
        reference: &str,
    ) -> Result<Vec<usize>, ProblemError> {
        if self.choices.is_empty() {
            return Err(ProblemError::new(
                "REALIZE_NO_CHOICES",
                "Problem has no choices.",
            ));
        }
        let size = self.presented_size(context)?;
        let flags = self
            .choices
            .iter()
            .map(|choice| choice.is_correct(context))
            .collect::<Result<Vec<_>, _>>()?;
        let correct = flags.iter().filter(|flag| **flag).count();
        let incorrect = flags.len() - correct;

        if correct == 0 {
            return Err(ProblemError::new(
                "REALIZE_NO_CORRECT_CHOICE",
                "No choice evaluated as correct.",
            ));
        }

        let range = match rule {
            SelectionRule::SingleCorrect => {
                if correct > 1 && incorrect < size - 1 {
                    return Err(infeasible(format!(
                        "{} correct choices but only {} incorrect to fill {} slots.",
                        correct, incorrect, size
                    )));
                }
                CorrectRange::exactly_one()
            }
            SelectionRule::CorrectBetween { min, max } => {
                let min = evaluate_count(min, "minimum correct", 1, context)?;
                let max = evaluate_count(max, "maximum correct", size, context)?.min(size);
                if min > max {
                    return Err(infeasible(format!(
                        "Minimum correct {} exceeds maximum {}.",
                        min, max
                    )));
                }
                if correct < min {
                    return Err(infeasible(format!(
                        "Only {} correct choices, {} required.",
                        correct, min
                    )));
                }
                if incorrect < size - max {
                    return Err(infeasible(format!(
                        "Only {} incorrect choices to fill {} slots with at most {} correct.",
                        incorrect, size, max
                    )));
                }
                CorrectRange { min, max }
            }
        };

        if self.is_random_order(context)? {
            self.random_order_indices(&flags, size, range, rng, options, reference)
        } else {
            sequential_order(&flags, size, range)
        }
    }

    fn random_order_indices(
        &self,
        flags: &[bool],
        size: usize,
        range: CorrectRange,
        rng: &mut dyn RandomSource,
        options: &RealizeOptions,
        reference: &str,
    ) -> Result<Vec<usize>, ProblemError> {
        let mut fixed: Vec<Option<usize>> = vec![None; size];
        for (index, choice) in self.choices.iter().enumerate() {
            if let Some(pos) = choice.pos.filter(|pos| (1..=size).contains(pos)) {
                fixed[pos - 1] = Some(index);
            }
        }
        let free: Vec<usize> = (0..self.choices.len())
            .filter(|index| !fixed.contains(&Some(*index)))
            .collect();

        let attempts = options.max_order_attempts();
        for attempt in 1..=attempts {
            let mut pool = free.clone();
            let mut order = Vec::with_capacity(size);
            for slot in &fixed {
                match slot {
                    Some(index) => order.push(*index),
                    None => {
                        let pick = rng.next_below(pool.len() as u32) as usize;
                        order.push(pool.remove(pick));
                    }
                }
            }
            let count = order.iter().filter(|index| flags[**index]).count();
            if range.contains(count) {
                return Ok(order);
            }
            debug!(reference, attempt, count, "choice order rejected, resampling");
        }

        error!(
            reference,
            attempts,
            code = "REALIZE_ORDER_EXHAUSTED",
            "random choice ordering never met the correct-count constraint"
        );
        Err(ProblemError::new(
            "REALIZE_ORDER_EXHAUSTED",
            format!(
                "No acceptable random order found in {} attempts.",
                attempts
            ),
        ))
    }

    /// Instances of the presented choices, in order.
    pub(crate) fn presented_instances(
        &self,
        order: &[usize],
        context: &EvalContext,
    ) -> Vec<ChoiceInstance> {
        order
            .iter()
            .filter_map(|index| self.choices.get(*index))
            .map(|choice| {
                ChoiceInstance::new(choice.choice_id, choice.content.create_instance(context))
            })
            .collect()
    }

    fn presented(&self) -> Vec<&Choice> {
        match &self.choice_order {
            Some(order) => order
                .iter()
                .filter_map(|index| self.choices.get(*index))
                .collect(),
            None => self.choices.iter().collect(),
        }
    }

    fn presented_choice(&self, choice_id: i64) -> Option<&Choice> {
        self.presented()
            .into_iter()
            .find(|choice| choice.choice_id == choice_id)
    }

    /// Grades a single submitted choice id.
    pub(crate) fn grade_single(&self, context: &EvalContext, response: &[ResponseValue]) -> bool {
        let [ResponseValue::Long(choice_id)] = response else {
            return false;
        };
        self.presented_choice(*choice_id)
            .map(|choice| choice.is_correct(context).unwrap_or(false))
            .unwrap_or(false)
    }

    /// Grades a submitted set as an exact match against the presented correct subset.
    pub(crate) fn grade_multiple(&self, context: &EvalContext, response: &[ResponseValue]) -> bool {
        let mut submitted = BTreeSet::new();
        for value in response {
            let Some(choice_id) = value.as_long() else {
                return false;
            };
            let Some(choice) = self.presented_choice(choice_id) else {
                return false;
            };
            if !choice.is_correct(context).unwrap_or(false) {
                return false;
            }
            submitted.insert(choice_id);
        }
        self.presented()
            .into_iter()
            .filter(|choice| choice.is_correct(context).unwrap_or(false))
            .all(|choice| submitted.contains(&choice.choice_id))
    }

    /// Reads the `CHOICE` parameter. `None` clears the answer.
    pub(crate) fn extract_single(
        &self,
        params: &ParamMap,
    ) -> Result<Option<Vec<ResponseValue>>, ProblemError> {
        let Some(values) = params.get("CHOICE").filter(|values| !values.is_empty()) else {
            return Ok(None);
        };
        if values.len() > 1 {
            return Err(ProblemError::invalid_answer(
                "Multiple choice problems accept exactly one selection.",
            ));
        }
        match values[0].trim().parse::<i64>() {
            Ok(choice_id) => Ok(Some(vec![ResponseValue::Long(choice_id)])),
            Err(_) => {
                warn!(value = %values[0], "ignoring unparseable CHOICE parameter");
                Ok(None)
            }
        }
    }

    /// Reads `CHOICE_<id>` parameters; presence of one value marks a selection.
    pub(crate) fn extract_multiple(&self, params: &ParamMap) -> Option<Vec<ResponseValue>> {
        let selected: Vec<ResponseValue> = self
            .choices
            .iter()
            .filter(|choice| {
                params
                    .get(&format!("CHOICE_{}", choice.choice_id))
                    .is_some_and(|values| values.len() == 1)
            })
            .map(|choice| ResponseValue::Long(choice.choice_id))
            .collect();
        (!selected.is_empty()).then_some(selected)
    }

    /// Marks each selected choice `checked` in rendered form HTML.
    pub(crate) fn insert_checked(&self, html: &str, selected: &[ResponseValue]) -> String {
        let mut out = html.to_string();
        for choice_id in selected.iter().filter_map(ResponseValue::as_long) {
            let marker = format!("id='CHOICE_{}'", choice_id);
            match splice_before(&out, &marker, "checked ") {
                Some(updated) => out = updated,
                None => warn!(choice = choice_id, "selected choice not found in HTML"),
            }
        }
        out
    }

    pub(crate) fn append_formulas_xml(&self, builder: &mut XmlBuilder, level: usize) {
        if let Some(formula) = &self.num_choices {
            formula.append_xml(builder, level, "num-choices");
        }
        if let Some(formula) = &self.random_order {
            formula.append_xml(builder, level, "random-order");
        }
    }

    pub(crate) fn append_choices_xml(&self, builder: &mut XmlBuilder, level: usize) {
        for choice in &self.choices {
            choice.append_xml(builder, level);
        }
    }
}

fn infeasible(message: String) -> ProblemError {
    ProblemError::new("REALIZE_INFEASIBLE", message)
}

fn evaluate_count(
    formula: Option<&Formula>,
    label: &str,
    default: usize,
    context: &EvalContext,
) -> Result<usize, ProblemError> {
    let Some(formula) = formula else {
        return Ok(default);
    };
    match formula.evaluate(context) {
        Value::Integer(count) if count >= 0 => Ok(usize::try_from(count).unwrap_or(usize::MAX)),
        other => Err(ProblemError::new(
            "REALIZE_INVALID_CORRECT_COUNT",
            format!(
                "The {} count evaluated to {} ({}), expected a non-negative integer.",
                label,
                other,
                other.type_name()
            ),
        )),
    }
}

/// Declaration-order selection that stops taking correct choices at the cap and skips
/// incorrect ones when the remaining slots are needed for the minimum.
fn sequential_order(
    flags: &[bool],
    size: usize,
    range: CorrectRange,
) -> Result<Vec<usize>, ProblemError> {
    let mut order = Vec::with_capacity(size);
    let mut correct = 0;
    for (index, flag) in flags.iter().enumerate() {
        if order.len() == size {
            break;
        }
        if *flag {
            if correct >= range.max {
                continue;
            }
            correct += 1;
        } else if range.min.saturating_sub(correct) >= size - order.len() {
            continue;
        }
        order.push(index);
    }

    if order.len() != size || !range.contains(correct) {
        return Err(infeasible(format!(
            "Declaration order cannot fill {} slots with {}..={} correct choices.",
            size, range.min, range.max
        )));
    }
    Ok(order)
}
