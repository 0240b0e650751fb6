use serde::Serialize;

use super::types::RemediationKind;

/// Fixed sampling seed so the same topic yields the same material.
pub const COMPLETION_SEED: u64 = 1200;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant",
            content: content.into(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn instruction(kind: RemediationKind) -> &'static str {
    match kind {
        RemediationKind::UseCase => {
            "Using provided topic please generate use cases of this topic 4 points"
        }
        RemediationKind::Poll => {
            "Using provided topic please generate poll which assess the understanding of the provided topic. Generate 3 questions."
        }
        RemediationKind::Quiz => {
            "Using provided topic please generate quiz based on the topic provided. Generate 3 question"
        }
    }
}

fn response_format(kind: RemediationKind) -> &'static str {
    match kind {
        RemediationKind::UseCase => {
            r#"Generate the result in this format, as JSON only: {"topic": "topic", "points": ["first point", "second point"]}"#
        }
        RemediationKind::Poll => {
            r#"Generate the result in this format, as JSON only: {"topic": "topic", "polls": [{"question": "here is the question.", "options": ["...", "..."]}]}"#
        }
        RemediationKind::Quiz => {
            r#"Generate the result in this format, as JSON only: {"topic": "topic", "quiz": [{"question": "here is the question.", "options": ["...", "..."], "correctAnswer": 0}]}"#
        }
    }
}

/// Conversation for one remediation request. The topic travels as an
/// assistant turn between the instruction and the output format.
pub fn remediation_messages(kind: RemediationKind, topic: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(instruction(kind)),
        ChatMessage::assistant(topic),
        ChatMessage::user(response_format(kind)),
    ]
}

pub fn hint_messages(query: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system("Provide some hint to the question in single line, be concise"),
        ChatMessage::user(query),
    ]
}
