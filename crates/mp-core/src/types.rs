use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: SourceLocation,
    pub end: SourceLocation,
}

impl SourceSpan {
    pub fn synthetic() -> Self {
        Self {
            start: SourceLocation { line: 1, column: 1 },
            end: SourceLocation { line: 1, column: 1 },
        }
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start.line, self.start.column)
    }
}

/// The kind of problem a template describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemType {
    Numeric,
    MultipleChoice,
    MultipleSelection,
    EmbeddedInput,
    AutoCorrect,
    Dummy,
}

impl ProblemType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::MultipleChoice => "multiplechoice",
            Self::MultipleSelection => "multipleselection",
            Self::EmbeddedInput => "embeddedinput",
            Self::AutoCorrect => "autocorrect",
            Self::Dummy => "dummy",
        }
    }

    /// Matches the `type` attribute of a `<problem>` element, ignoring case.
    pub fn for_label(label: &str) -> Option<Self> {
        let lowered = label.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "numeric" => Some(Self::Numeric),
            "multiplechoice" => Some(Self::MultipleChoice),
            "multipleselection" => Some(Self::MultipleSelection),
            "embeddedinput" => Some(Self::EmbeddedInput),
            "autocorrect" => Some(Self::AutoCorrect),
            _ => None,
        }
    }

    /// Matches the dedicated top-level element names (`<problem-numeric>` and friends).
    pub fn for_tag(tag: &str) -> Option<Self> {
        match tag {
            "problem-numeric" => Some(Self::Numeric),
            "problem-multiple-choice" => Some(Self::MultipleChoice),
            "problem-multiple-selection" => Some(Self::MultipleSelection),
            "problem-embedded-input" => Some(Self::EmbeddedInput),
            "problem-auto-correct" => Some(Self::AutoCorrect),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalculatorType {
    None,
    Basic,
    Scientific,
    Graphing,
    #[default]
    Full,
}

impl CalculatorType {
    pub fn label(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Basic => "basic",
            Self::Scientific => "scientific",
            Self::Graphing => "graphing",
            Self::Full => "full",
        }
    }

    pub fn for_label(label: &str) -> Option<Self> {
        match label.trim() {
            "none" => Some(Self::None),
            "basic" => Some(Self::Basic),
            "scientific" => Some(Self::Scientific),
            "graphing" => Some(Self::Graphing),
            "full" => Some(Self::Full),
            _ => None,
        }
    }
}

/// Controls which findings the XML loaders record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserMode {
    pub report_any: bool,
    pub report_deprecated: bool,
}

impl ParserMode {
    pub const NORMAL: Self = Self {
        report_any: true,
        report_deprecated: false,
    };
    pub const STRICT: Self = Self {
        report_any: true,
        report_deprecated: true,
    };
    pub const SILENT: Self = Self {
        report_any: false,
        report_deprecated: false,
    };
}

impl Default for ParserMode {
    fn default() -> Self {
        Self::NORMAL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Deprecated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Option<SourceSpan>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Deprecated => "deprecated",
        };
        match &self.span {
            Some(span) => write!(f, "{} at {}: {}", label, span, self.message),
            None => write!(f, "{}: {}", label, self.message),
        }
    }
}

/// Findings accumulated while loading one XML document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, message: impl Into<String>, span: Option<&SourceSpan>) {
        self.entries.push(Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            span: span.cloned(),
        });
    }

    pub fn deprecated(&mut self, message: impl Into<String>, span: Option<&SourceSpan>) {
        self.entries.push(Diagnostic {
            severity: Severity::Deprecated,
            message: message.into(),
            span: span.cloned(),
        });
    }

    /// Records an error unless the mode silences reporting.
    pub fn report_error(
        &mut self,
        mode: ParserMode,
        message: impl Into<String>,
        span: Option<&SourceSpan>,
    ) {
        if mode.report_any {
            self.error(message, span);
        }
    }

    pub fn report_deprecated(
        &mut self,
        mode: ParserMode,
        message: impl Into<String>,
        span: Option<&SourceSpan>,
    ) {
        if mode.report_deprecated {
            self.deprecated(message, span);
        }
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }
}

#[cfg(test)]
mod types_tests {
    use super::*;

    #[test]
    fn problem_type_labels_round_trip_case_insensitively() {
        for ty in [
            ProblemType::Numeric,
            ProblemType::MultipleChoice,
            ProblemType::MultipleSelection,
            ProblemType::EmbeddedInput,
            ProblemType::AutoCorrect,
        ] {
            assert_eq!(ProblemType::for_label(ty.label()), Some(ty));
        }
        assert_eq!(
            ProblemType::for_label("MultipleChoice"),
            Some(ProblemType::MultipleChoice)
        );
        assert_eq!(ProblemType::for_label("dummy"), None);
        assert_eq!(
            ProblemType::for_tag("problem-embedded-input"),
            Some(ProblemType::EmbeddedInput)
        );
    }

    #[test]
    fn calculator_defaults_to_full() {
        assert_eq!(CalculatorType::default(), CalculatorType::Full);
        assert_eq!(CalculatorType::for_label("graphing"), Some(CalculatorType::Graphing));
        assert_eq!(CalculatorType::for_label("abacus"), None);
    }

    #[test]
    fn diagnostics_distinguish_errors_from_deprecations() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.deprecated("old form", None);
        assert!(!diagnostics.has_errors());
        diagnostics.error("broken", Some(&SourceSpan::synthetic()));
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.entries().len(), 2);
        assert_eq!(
            diagnostics.entries()[1].to_string(),
            "error at 1:1: broken"
        );
    }

    #[test]
    fn reporting_respects_parser_mode() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.report_deprecated(ParserMode::NORMAL, "old", None);
        diagnostics.report_error(ParserMode::SILENT, "hidden", None);
        assert!(diagnostics.is_empty());
        diagnostics.report_deprecated(ParserMode::STRICT, "old", None);
        diagnostics.report_error(ParserMode::NORMAL, "shown", None);
        assert_eq!(diagnostics.entries().len(), 2);
        assert_eq!(diagnostics.entries()[0].to_string(), "deprecated: old");
    }
}
