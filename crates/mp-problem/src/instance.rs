use mp_core::CalculatorType;
use serde::Serialize;

use crate::document::RenderedDoc;

/// Evaluated acceptance rule carried by a numeric instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AcceptNumberInstance {
    force_integer: bool,
    correct_answer: f64,
    variance: f64,
}

impl AcceptNumberInstance {
    pub(crate) fn new(force_integer: bool, correct_answer: f64, variance: f64) -> Self {
        Self {
            force_integer,
            correct_answer,
            variance,
        }
    }

    pub fn force_integer(&self) -> bool {
        self.force_integer
    }

    pub fn correct_answer(&self) -> f64 {
        self.correct_answer
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }
}

/// One presented choice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChoiceInstance {
    choice_id: i64,
    content: RenderedDoc,
}

impl ChoiceInstance {
    pub(crate) fn new(choice_id: i64, content: RenderedDoc) -> Self {
        Self { choice_id, content }
    }

    pub fn choice_id(&self) -> i64 {
        self.choice_id
    }

    pub fn content(&self) -> &RenderedDoc {
        &self.content
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InstanceKind {
    Numeric {
        accept_number: AcceptNumberInstance,
    },
    MultipleChoice {
        choices: Vec<ChoiceInstance>,
    },
    MultipleSelection {
        choices: Vec<ChoiceInstance>,
    },
    EmbeddedInput {
        answer: Option<RenderedDoc>,
    },
    AutoCorrect,
    Dummy,
}

/// Immutable snapshot of one realization, handed to the delivery layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProblemInstance {
    ref_base: String,
    iteration_id: String,
    calculator: CalculatorType,
    question: RenderedDoc,
    solution: Option<RenderedDoc>,
    #[serde(flatten)]
    kind: InstanceKind,
}

impl ProblemInstance {
    pub(crate) fn new(
        ref_base: String,
        iteration_id: String,
        calculator: CalculatorType,
        question: RenderedDoc,
        solution: Option<RenderedDoc>,
        kind: InstanceKind,
    ) -> Self {
        Self {
            ref_base,
            iteration_id,
            calculator,
            question,
            solution,
            kind,
        }
    }

    pub fn ref_base(&self) -> &str {
        &self.ref_base
    }

    pub fn iteration_id(&self) -> &str {
        &self.iteration_id
    }

    pub fn calculator(&self) -> CalculatorType {
        self.calculator
    }

    pub fn question(&self) -> &RenderedDoc {
        &self.question
    }

    pub fn solution(&self) -> Option<&RenderedDoc> {
        self.solution.as_ref()
    }

    pub fn kind(&self) -> &InstanceKind {
        &self.kind
    }

    /// Presented choices in display order; empty for non-choice problems.
    pub fn choices(&self) -> &[ChoiceInstance] {
        match &self.kind {
            InstanceKind::MultipleChoice { choices }
            | InstanceKind::MultipleSelection { choices } => choices,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod instance_tests {
    use super::*;

    #[test]
    fn serializes_kind_inline() {
        let instance = ProblemInstance::new(
            "unit.q1".to_string(),
            "abcdefghi".to_string(),
            CalculatorType::Basic,
            RenderedDoc::new("<p>Pick one</p>"),
            None,
            InstanceKind::MultipleChoice {
                choices: vec![ChoiceInstance::new(2, RenderedDoc::new("two"))],
            },
        );
        let json = serde_json::to_value(&instance).expect("instance should serialize");
        assert_eq!(json["type"], "multiple-choice");
        assert_eq!(json["calculator"], "basic");
        assert_eq!(json["question"], "<p>Pick one</p>");
        assert_eq!(json["choices"][0]["choice_id"], 2);
        assert_eq!(instance.choices().len(), 1);
    }
}
