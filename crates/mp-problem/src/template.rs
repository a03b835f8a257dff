use chrono::Utc;
use mp_core::{CalculatorType, Diagnostics, ProblemError, ProblemType, ResponseValue};
use mp_formula::{EvalContext, Formula, RandomSource};
use mp_parser::{escape_attr, XmlBuilder};
use tracing::{debug, warn};

use crate::choice::{ChoiceSet, SelectionRule};
use crate::document::DocColumn;
use crate::embedded::{
    extract_embedded_answers, insert_embedded_answers, is_embedded_answered, EmbeddedInputProblem,
};
use crate::html::splice_before;
use crate::instance::{InstanceKind, ProblemInstance};
use crate::numeric::{sanitize, AcceptNumber};
use crate::options::RealizeOptions;
use crate::ParamMap;

const ITERATION_ID_LEN: usize = 9;
const ITERATION_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const AUTO_CORRECT_REF: &str = "autocorrect";
const AUTO_CORRECT_TEXT: &str = "This problem is automatically marked correct.";
const DUMMY_TEXT: &str = "This problem could not be loaded.";
const NUMERIC_ANSWER_MARKER: &str = "name='ANSWER' id='ANSWER'";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumericProblem {
    pub accept_number: Option<AcceptNumber>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipleChoiceProblem {
    pub choices: ChoiceSet,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipleSelectionProblem {
    pub choices: ChoiceSet,
    pub min_correct: Option<Formula>,
    pub max_correct: Option<Formula>,
}

/// Placeholder produced when a document fails to load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DummyProblem {
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProblemKind {
    Numeric(NumericProblem),
    MultipleChoice(MultipleChoiceProblem),
    MultipleSelection(MultipleSelectionProblem),
    EmbeddedInput(EmbeddedInputProblem),
    AutoCorrect,
    Dummy(DummyProblem),
}

impl ProblemKind {
    pub fn problem_type(&self) -> ProblemType {
        match self {
            Self::Numeric(_) => ProblemType::Numeric,
            Self::MultipleChoice(_) => ProblemType::MultipleChoice,
            Self::MultipleSelection(_) => ProblemType::MultipleSelection,
            Self::EmbeddedInput(_) => ProblemType::EmbeddedInput,
            Self::AutoCorrect => ProblemType::AutoCorrect,
            Self::Dummy(_) => ProblemType::Dummy,
        }
    }

    pub fn choices(&self) -> Option<&ChoiceSet> {
        match self {
            Self::MultipleChoice(problem) => Some(&problem.choices),
            Self::MultipleSelection(problem) => Some(&problem.choices),
            _ => None,
        }
    }

    pub(crate) fn choices_mut(&mut self) -> Option<&mut ChoiceSet> {
        match self {
            Self::MultipleChoice(problem) => Some(&mut problem.choices),
            Self::MultipleSelection(problem) => Some(&mut problem.choices),
            _ => None,
        }
    }
}

/// Outcome of a successful realization, computed without touching the template.
#[derive(Debug, Clone, PartialEq)]
pub struct Realization {
    pub context: EvalContext,
    pub choice_order: Option<Vec<usize>>,
    pub instance: ProblemInstance,
}

/// An authored problem plus the state of the attempt it is serving.
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemTemplate {
    pub ref_base: String,
    pub eval_context: EvalContext,
    pub question: Option<DocColumn>,
    pub solution: Option<DocColumn>,
    pub calculator: CalculatorType,
    pub score: f64,
    pub kind: ProblemKind,
    completion_time: i64,
    response: Option<Vec<ResponseValue>>,
}

impl ProblemTemplate {
    pub fn new(ref_base: impl Into<String>, kind: ProblemKind) -> Self {
        Self {
            ref_base: ref_base.into(),
            eval_context: EvalContext::new(),
            question: None,
            solution: None,
            calculator: CalculatorType::default(),
            score: 0.0,
            kind,
            completion_time: 0,
            response: None,
        }
    }

    /// A problem that needs no input and is always correct.
    pub fn auto_correct() -> Self {
        let mut template = Self::new(AUTO_CORRECT_REF, ProblemKind::AutoCorrect);
        template.question = Some(DocColumn::from_text("question", AUTO_CORRECT_TEXT));
        template
    }

    /// Placeholder carrying the diagnostics that prevented loading.
    pub fn dummy(ref_base: impl Into<String>, diagnostics: Diagnostics) -> Self {
        let mut template = Self::new(ref_base, ProblemKind::Dummy(DummyProblem { diagnostics }));
        template.question = Some(DocColumn::from_text("question", DUMMY_TEXT));
        template
    }

    pub fn problem_type(&self) -> ProblemType {
        self.kind.problem_type()
    }

    pub fn is_dummy(&self) -> bool {
        matches!(self.kind, ProblemKind::Dummy(_))
    }

    /// Load diagnostics of a placeholder template.
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match &self.kind {
            ProblemKind::Dummy(problem) => Some(&problem.diagnostics),
            _ => None,
        }
    }

    /// Milliseconds since the epoch at which the answer was recorded, or zero.
    pub fn completion_time(&self) -> i64 {
        self.completion_time
    }

    pub(crate) fn set_completion_time(&mut self, millis: i64) {
        self.completion_time = millis;
    }

    pub(crate) fn set_response(&mut self, response: Option<Vec<ResponseValue>>) {
        self.response = response;
    }

    pub fn choice_order(&self) -> Option<&[usize]> {
        self.kind.choices().and_then(ChoiceSet::choice_order)
    }

    /// Structural copy for a new attempt, with no recorded answer.
    pub fn deep_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.completion_time = 0;
        copy.response = None;
        copy
    }

    /// Computes a fresh realization from this template without modifying it.
    pub fn try_realize(
        &self,
        rng: &mut dyn RandomSource,
        options: &RealizeOptions,
    ) -> Result<Realization, ProblemError> {
        let mut context = self.eval_context.clone();
        context.clear_inputs();
        if !context.generate(&self.ref_base, rng) {
            return Err(ProblemError::new(
                "REALIZE_GENERATE_FAILED",
                format!("Unable to generate variables for {}.", self.ref_base),
            ));
        }

        let (choice_order, kind) = match &self.kind {
            ProblemKind::Numeric(problem) => {
                let accept_number = problem.accept_number.as_ref().ok_or_else(|| {
                    ProblemError::new(
                        "REALIZE_NO_ACCEPT_NUMBER",
                        "Numeric problem has no acceptance rule.",
                    )
                })?;
                (
                    None,
                    InstanceKind::Numeric {
                        accept_number: accept_number.realize(&context)?,
                    },
                )
            }
            ProblemKind::MultipleChoice(problem) => {
                let order = problem.choices.select_order(
                    &context,
                    SelectionRule::SingleCorrect,
                    rng,
                    options,
                    &self.ref_base,
                )?;
                let choices = problem.choices.presented_instances(&order, &context);
                (Some(order), InstanceKind::MultipleChoice { choices })
            }
            ProblemKind::MultipleSelection(problem) => {
                let rule = SelectionRule::CorrectBetween {
                    min: problem.min_correct.as_ref(),
                    max: problem.max_correct.as_ref(),
                };
                let order =
                    problem
                        .choices
                        .select_order(&context, rule, rng, options, &self.ref_base)?;
                let choices = problem.choices.presented_instances(&order, &context);
                (Some(order), InstanceKind::MultipleSelection { choices })
            }
            ProblemKind::EmbeddedInput(problem) => (
                None,
                InstanceKind::EmbeddedInput {
                    answer: problem
                        .answer
                        .as_ref()
                        .map(|answer| answer.create_instance(&context)),
                },
            ),
            ProblemKind::AutoCorrect => (None, InstanceKind::AutoCorrect),
            ProblemKind::Dummy(_) => (None, InstanceKind::Dummy),
        };

        let question = self
            .question
            .as_ref()
            .map(|question| question.create_instance(&context))
            .unwrap_or_default();
        let solution = self
            .solution
            .as_ref()
            .map(|solution| solution.create_instance(&context));
        let instance = ProblemInstance::new(
            self.ref_base.clone(),
            new_iteration_id(rng),
            self.calculator,
            question,
            solution,
            kind,
        );

        Ok(Realization {
            context,
            choice_order,
            instance,
        })
    }

    /// Replaces the realization state with `realization` and returns its instance.
    pub fn install(&mut self, realization: Realization) -> ProblemInstance {
        self.eval_context = realization.context;
        if let Some(choices) = self.kind.choices_mut() {
            choices.set_choice_order(realization.choice_order);
        }
        realization.instance
    }

    pub fn realize(&mut self, rng: &mut dyn RandomSource) -> bool {
        self.realize_with(rng, &RealizeOptions::default())
    }

    /// Regenerates variables and choice order, discarding any recorded answer.
    ///
    /// A failure leaves the previous realization in place and is logged.
    pub fn realize_with(&mut self, rng: &mut dyn RandomSource, options: &RealizeOptions) -> bool {
        self.create_iteration_with(rng, options).is_some()
    }

    pub fn create_iteration(&mut self, rng: &mut dyn RandomSource) -> Option<ProblemInstance> {
        self.create_iteration_with(rng, &RealizeOptions::default())
    }

    pub fn create_iteration_with(
        &mut self,
        rng: &mut dyn RandomSource,
        options: &RealizeOptions,
    ) -> Option<ProblemInstance> {
        self.clear_answer();
        match self.try_realize(rng, options) {
            Ok(realization) => {
                debug!(reference = %self.ref_base, "problem realized");
                Some(self.install(realization))
            }
            Err(error) => {
                warn!(
                    reference = %self.ref_base,
                    code = %error.code,
                    "unable to realize problem: {}",
                    error.message
                );
                None
            }
        }
    }

    /// Stores a response after checking its shape for this kind of problem.
    pub fn record_answer(&mut self, values: &[ResponseValue]) -> Result<(), ProblemError> {
        let stored = match &self.kind {
            ProblemKind::Numeric(_) => {
                if values.len() != 1 {
                    return Err(ProblemError::invalid_answer(
                        "Numeric problems take exactly one answer.",
                    ));
                }
                values.to_vec()
            }
            ProblemKind::MultipleChoice(_) => match values {
                [ResponseValue::Long(_)] => values.to_vec(),
                _ => {
                    return Err(ProblemError::invalid_answer(
                        "Multiple choice problems take exactly one integer choice id.",
                    ))
                }
            },
            ProblemKind::MultipleSelection(_) => {
                if values.is_empty() || values.iter().any(|value| value.as_long().is_none()) {
                    return Err(ProblemError::invalid_answer(
                        "Multiple selection answers must be integer choice ids.",
                    ));
                }
                values.to_vec()
            }
            ProblemKind::EmbeddedInput(_) => {
                if values.iter().any(|value| value.as_text().is_none()) {
                    return Err(ProblemError::invalid_answer(
                        "Embedded input answers must be strings.",
                    ));
                }
                values.to_vec()
            }
            ProblemKind::AutoCorrect => vec![ResponseValue::Text("Y".to_string())],
            ProblemKind::Dummy(_) => values.to_vec(),
        };
        self.response = Some(stored);
        self.completion_time = Utc::now().timestamp_millis();
        Ok(())
    }

    pub fn clear_answer(&mut self) {
        self.response = None;
        self.completion_time = 0;
    }

    pub fn answer(&self) -> Option<Vec<ResponseValue>> {
        self.response.clone()
    }

    pub fn is_answered(&self) -> bool {
        match &self.kind {
            ProblemKind::AutoCorrect => true,
            ProblemKind::Dummy(_) => false,
            ProblemKind::EmbeddedInput(_) => self
                .response
                .as_deref()
                .is_some_and(is_embedded_answered),
            _ => self.response.is_some(),
        }
    }

    /// Grades `response` against the current realization.
    pub fn is_correct(&self, response: &[ResponseValue]) -> bool {
        let context = &self.eval_context;
        match &self.kind {
            ProblemKind::Numeric(problem) => match (&problem.accept_number, response) {
                (Some(accept_number), [answer]) => accept_number.accepts(context, answer),
                _ => false,
            },
            ProblemKind::MultipleChoice(problem) => problem.choices.grade_single(context, response),
            ProblemKind::MultipleSelection(problem) => {
                !response.is_empty() && problem.choices.grade_multiple(context, response)
            }
            ProblemKind::EmbeddedInput(problem) => {
                problem.is_correct(context, self.question.as_ref(), response)
            }
            ProblemKind::AutoCorrect => true,
            ProblemKind::Dummy(_) => false,
        }
    }

    /// Grades the recorded response, if any.
    pub fn is_answer_correct(&self) -> bool {
        self.response
            .as_deref()
            .is_some_and(|response| self.is_correct(response))
    }

    /// Records the answer carried by submitted form parameters, or clears it when none
    /// is present.
    pub fn extract_answers(&mut self, params: &ParamMap) -> Result<(), ProblemError> {
        let extracted = match &self.kind {
            ProblemKind::Numeric(_) => match params.get("ANSWER").map(Vec::as_slice) {
                Some([value]) if !value.is_empty() => {
                    Some(vec![ResponseValue::Text(value.clone())])
                }
                _ => None,
            },
            ProblemKind::MultipleChoice(problem) => problem.choices.extract_single(params)?,
            ProblemKind::MultipleSelection(problem) => problem.choices.extract_multiple(params),
            ProblemKind::EmbeddedInput(_) => self
                .question
                .as_ref()
                .and_then(|question| extract_embedded_answers(question, params)),
            ProblemKind::AutoCorrect | ProblemKind::Dummy(_) => return Ok(()),
        };

        match extracted {
            Some(values) => self.record_answer(&values),
            None => {
                self.clear_answer();
                Ok(())
            }
        }
    }

    /// Rewrites form HTML so it shows the recorded answer.
    pub fn insert_answers(&self, html: &str) -> String {
        let Some(response) = &self.response else {
            return html.to_string();
        };
        match &self.kind {
            ProblemKind::Numeric(_) => {
                let Some(text) = numeric_answer_text(response) else {
                    return html.to_string();
                };
                let attribute = format!("value='{}' ", escape_attr(&text));
                splice_before(html, NUMERIC_ANSWER_MARKER, &attribute).unwrap_or_else(|| {
                    warn!(reference = %self.ref_base, "unable to locate numeric answer field");
                    html.to_string()
                })
            }
            ProblemKind::MultipleChoice(problem) => problem.choices.insert_checked(html, response),
            ProblemKind::MultipleSelection(problem) => {
                problem.choices.insert_checked(html, response)
            }
            ProblemKind::EmbeddedInput(_) => match &self.question {
                Some(question) => insert_embedded_answers(question, response, html),
                None => html.to_string(),
            },
            ProblemKind::AutoCorrect | ProblemKind::Dummy(_) => html.to_string(),
        }
    }

    fn subclass_attributes(&self, builder: &mut XmlBuilder) {
        if self.calculator != CalculatorType::Full {
            builder.attr("calculator", self.calculator.label());
        }
        if self.completion_time != 0 {
            builder.attr("completed", &self.completion_time.to_string());
        }
        match &self.kind {
            ProblemKind::Numeric(_) => {
                if let Some(text) = self.response.as_deref().and_then(numeric_answer_text) {
                    builder.attr("student-string-answer", &text);
                }
            }
            ProblemKind::MultipleChoice(MultipleChoiceProblem { choices })
            | ProblemKind::MultipleSelection(MultipleSelectionProblem { choices, .. }) => {
                if let Some(order) = choices.choice_order() {
                    builder.attr("choice-order", &join(order.iter()));
                }
                if let Some(response) = &self.response {
                    let selected = response.iter().filter_map(ResponseValue::as_long);
                    builder.attr("student-choices", &join(selected));
                }
            }
            _ => {}
        }
    }

    fn subclass_xml_begin(&self, builder: &mut XmlBuilder, level: usize) {
        match &self.kind {
            ProblemKind::Numeric(problem) => {
                if let Some(accept_number) = &problem.accept_number {
                    accept_number.append_xml(builder, level);
                }
            }
            ProblemKind::MultipleChoice(problem) => {
                problem.choices.append_formulas_xml(builder, level)
            }
            ProblemKind::MultipleSelection(problem) => {
                problem.choices.append_formulas_xml(builder, level);
                if let Some(formula) = &problem.min_correct {
                    formula.append_xml(builder, level, "min-correct");
                }
                if let Some(formula) = &problem.max_correct {
                    formula.append_xml(builder, level, "max-correct");
                }
            }
            ProblemKind::EmbeddedInput(problem) => problem.append_begin_xml(builder, level),
            ProblemKind::AutoCorrect | ProblemKind::Dummy(_) => {}
        }
    }

    fn subclass_xml_end(&self, builder: &mut XmlBuilder, level: usize) {
        match &self.kind {
            ProblemKind::MultipleChoice(problem) => {
                problem.choices.append_choices_xml(builder, level)
            }
            ProblemKind::MultipleSelection(problem) => {
                problem.choices.append_choices_xml(builder, level)
            }
            ProblemKind::EmbeddedInput(problem) => problem.append_end_xml(builder, level),
            _ => {}
        }
    }

    pub fn append_xml(&self, builder: &mut XmlBuilder, level: usize) {
        builder
            .indent(level)
            .add("<problem")
            .attr("type", self.problem_type().label());
        self.subclass_attributes(builder);
        builder.addln(">");

        let inner = level + 1;
        self.subclass_xml_begin(builder, inner);
        builder.text_element(inner, "ref-base", &self.ref_base);
        self.eval_context.append_xml(builder, inner);
        if let Some(question) = &self.question {
            question.append_xml(builder, inner);
        }
        if let Some(solution) = &self.solution {
            solution.append_xml(builder, inner);
        }
        if let Some(response) = &self.response {
            builder.open(inner, "student-response");
            for value in response {
                builder.text_element(inner + 1, value.xml_tag(), &value.to_string());
            }
            builder.close(inner, "student-response");
        }
        if self.score != 0.0 {
            builder.text_element(inner, "score", &format!("{:?}", self.score));
        }
        self.subclass_xml_end(builder, inner);

        builder.close(level, "problem");
    }

    pub fn to_xml(&self) -> String {
        let mut builder = XmlBuilder::new();
        self.append_xml(&mut builder, 0);
        builder.into_string()
    }
}

/// Text form of a numeric answer as persisted in `student-string-answer`.
fn numeric_answer_text(response: &[ResponseValue]) -> Option<String> {
    match response.first()? {
        ResponseValue::Text(text) => Some(sanitize(text)),
        other => Some(other.to_string()),
    }
}

fn join<T: ToString>(values: impl Iterator<Item = T>) -> String {
    values
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn new_iteration_id(rng: &mut dyn RandomSource) -> String {
    (0..ITERATION_ID_LEN)
        .map(|_| {
            let index = rng.next_below(ITERATION_ID_ALPHABET.len() as u32) as usize;
            char::from(ITERATION_ID_ALPHABET[index])
        })
        .collect()
}

#[cfg(test)]
mod template_tests {
    use super::*;
    use crate::choice::Choice;
    use crate::numeric::Variance;
    use mp_core::Value;
    use mp_formula::{SeededRandom, Variable};

    fn numeric_template() -> ProblemTemplate {
        let mut template = ProblemTemplate::new(
            "unit.numeric",
            ProblemKind::Numeric(NumericProblem {
                accept_number: Some(
                    AcceptNumber::new(true, Formula::parse("{c}").expect("formula"))
                        .with_variance(Variance::Constant(Value::Integer(2))),
                ),
            }),
        );
        template
            .eval_context
            .add_variable(Variable::constant("c", Value::Integer(10)))
            .expect("add c");
        template.question = Some(DocColumn::from_text("question", "What is {c}?"));
        template
    }

    fn choice_template() -> ProblemTemplate {
        let choices = (1..=4)
            .map(|id| {
                Choice::new(
                    id,
                    Formula::parse(if id == 3 { "true" } else { "false" }).expect("formula"),
                    DocColumn::from_text("content", &format!("option {}", id)),
                )
            })
            .collect();
        ProblemTemplate::new(
            "unit.choice",
            ProblemKind::MultipleChoice(MultipleChoiceProblem {
                choices: ChoiceSet::new(choices),
            }),
        )
    }

    #[test]
    fn record_answer_validates_shape() {
        let mut template = numeric_template();
        assert_eq!(
            template.record_answer(&[]).expect_err("empty").code,
            "ANSWER_INVALID"
        );
        template
            .record_answer(&[ResponseValue::Text("10".to_string())])
            .expect("record");
        assert!(template.is_answered());
        assert!(template.completion_time() > 0);
        assert!(template.is_answer_correct());
        template.clear_answer();
        assert!(!template.is_answered());
        assert_eq!(template.completion_time(), 0);

        let mut choice = choice_template();
        assert!(choice
            .record_answer(&[ResponseValue::Text("3".to_string())])
            .is_err());
        choice
            .record_answer(&[ResponseValue::Long(3)])
            .expect("record");
    }

    #[test]
    fn failed_realization_keeps_previous_state() {
        let mut template = choice_template();
        assert!(template.realize(&mut SeededRandom::default()));
        let order = template.choice_order().map(<[usize]>::to_vec);
        if let ProblemKind::MultipleChoice(problem) = &mut template.kind {
            for choice in &mut problem.choices.choices {
                choice.correct = Formula::parse("false").expect("formula");
            }
        }
        assert!(!template.realize(&mut SeededRandom::default()));
        assert_eq!(template.choice_order().map(<[usize]>::to_vec), order);
    }

    #[test]
    fn try_realize_leaves_template_untouched() {
        let template = choice_template();
        let before = template.clone();
        let realization = template
            .try_realize(&mut SeededRandom::default(), &RealizeOptions::default())
            .expect("realization");
        assert_eq!(template, before);
        assert_eq!(realization.choice_order, Some(vec![0, 1, 2, 3]));
        assert_eq!(realization.instance.iteration_id().len(), ITERATION_ID_LEN);
        assert_eq!(realization.instance.choices().len(), 4);
    }

    #[test]
    fn numeric_answers_round_trip_through_form_html() {
        let mut template = numeric_template();
        let instance = template
            .create_iteration(&mut SeededRandom::default())
            .expect("instance");
        assert_eq!(instance.question().as_str(), "<p>What is 10?</p>");

        let mut params = ParamMap::new();
        params.insert("ANSWER".to_string(), vec!["1,1".to_string()]);
        template.extract_answers(&params).expect("extract");
        assert!(template.is_answer_correct());

        let html = crate::render_problem_html(&instance);
        let filled = template.insert_answers(&html);
        assert!(filled.contains("value='11' name='ANSWER' id='ANSWER'"));

        params.insert("ANSWER".to_string(), vec![String::new()]);
        template.extract_answers(&params).expect("extract");
        assert!(!template.is_answered());
    }

    #[test]
    fn xml_lists_attributes_and_response() {
        let mut template = choice_template();
        template.calculator = CalculatorType::Basic;
        template.score = 1.0;
        assert!(template.realize(&mut SeededRandom::default()));
        template
            .record_answer(&[ResponseValue::Long(3)])
            .expect("record");
        template.set_completion_time(42);

        let xml = template.to_xml();
        assert!(xml.starts_with(
            "<problem type=\"multiplechoice\" calculator=\"basic\" completed=\"42\" choice-order=\"0,1,2,3\" student-choices=\"3\">\n"
        ));
        assert!(xml.contains("  <ref-base>unit.choice</ref-base>\n"));
        assert!(xml.contains("  <student-response>\n    <long>3</long>\n  </student-response>\n"));
        assert!(xml.contains("  <score>1.0</score>\n"));
        assert!(xml.contains("  <choice id=\"3\">\n    <correct><expr>true</expr></correct>\n"));
        assert!(xml.ends_with("</problem>\n"));
    }

    #[test]
    fn auto_correct_is_always_answered_and_correct() {
        let mut template = ProblemTemplate::auto_correct();
        assert!(template.is_answered());
        assert!(template.is_correct(&[]));
        template
            .record_answer(&[ResponseValue::Long(7)])
            .expect("record");
        assert_eq!(
            template.answer(),
            Some(vec![ResponseValue::Text("Y".to_string())])
        );
        let instance = template
            .create_iteration(&mut SeededRandom::default())
            .expect("instance");
        assert_eq!(instance.kind(), &InstanceKind::AutoCorrect);
    }

    #[test]
    fn dummy_is_never_correct() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.error("broken", None);
        let template = ProblemTemplate::dummy("unit.bad", diagnostics);
        assert!(template.is_dummy());
        assert!(!template.is_correct(&[ResponseValue::Long(1)]));
        assert!(template.diagnostics().is_some_and(Diagnostics::has_errors));
    }
}
