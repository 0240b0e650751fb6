use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum RemediationKind {
    UseCase,
    Poll,
    Quiz,
}

impl RemediationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemediationKind::UseCase => "use-case",
            RemediationKind::Poll => "polls",
            RemediationKind::Quiz => "quiz",
        }
    }

    /// Button label shown in the remediation chooser.
    pub fn label(&self) -> &'static str {
        match self {
            RemediationKind::UseCase => "Show me a simple use-case",
            RemediationKind::Poll => "Give me a quick poll",
            RemediationKind::Quiz => "Test me with a quiz",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollQuestion {
    pub question: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    /// Index into `options`; `None` when the model named an answer that is
    /// not among the options.
    pub correct_answer: Option<usize>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RemediationContent {
    UseCase { points: Vec<String> },
    Poll { questions: Vec<PollQuestion> },
    Quiz { questions: Vec<QuizQuestion> },
}

impl RemediationContent {
    pub fn kind(&self) -> RemediationKind {
        match self {
            RemediationContent::UseCase { .. } => RemediationKind::UseCase,
            RemediationContent::Poll { .. } => RemediationKind::Poll,
            RemediationContent::Quiz { .. } => RemediationKind::Quiz,
        }
    }

    /// Number of answerable questions; use-cases have none.
    pub fn question_count(&self) -> usize {
        match self {
            RemediationContent::UseCase { .. } => 0,
            RemediationContent::Poll { questions } => questions.len(),
            RemediationContent::Quiz { questions } => questions.len(),
        }
    }
}

/// Quiz entry as language models actually return it: the correct answer is
/// sometimes an index and sometimes the answer text.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawQuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_answer: Value,
}

impl RawQuizQuestion {
    pub(crate) fn into_question(self) -> QuizQuestion {
        let correct_answer = resolve_correct_answer(&self.correct_answer, &self.options);
        QuizQuestion {
            question: self.question,
            options: self.options,
            correct_answer,
        }
    }
}

fn resolve_correct_answer(marker: &Value, options: &[String]) -> Option<usize> {
    match marker {
        Value::Number(number) => number
            .as_u64()
            .and_then(|index| usize::try_from(index).ok())
            .filter(|index| *index < options.len()),
        Value::String(text) => {
            let wanted = text.trim();
            options
                .iter()
                .position(|option| option.trim().eq_ignore_ascii_case(wanted))
                .or_else(|| {
                    // "B" / "b" style letter markers
                    let mut chars = wanted.chars();
                    match (chars.next(), chars.next()) {
                        (Some(letter), None) if letter.is_ascii_alphabetic() => {
                            let index = (letter.to_ascii_uppercase() as u8 - b'A') as usize;
                            (index < options.len()).then_some(index)
                        }
                        _ => None,
                    }
                })
        }
        _ => None,
    }
}
