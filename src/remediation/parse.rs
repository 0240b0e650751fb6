use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use serde_json::Value;

use super::client::RemediationError;
use super::types::{PollQuestion, RawQuizQuestion, RemediationContent, RemediationKind};

/// At most this many use-case points are shown.
pub const MAX_USE_CASE_POINTS: usize = 4;

#[derive(Debug, Deserialize)]
struct UseCasePayload {
    points: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PollPayload {
    polls: Vec<PollQuestion>,
}

#[derive(Debug, Deserialize)]
struct QuizPayload {
    quiz: Vec<RawQuizQuestion>,
}

/// Pulls `choices[0].message.content` (or the Ollama-style `message.content`)
/// out of a chat completion response.
pub fn extract_completion_text(value: &Value) -> Option<String> {
    value
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .or_else(|| value.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|content| !content.trim().is_empty())
}

/// Removes a single surrounding Markdown code fence, if present.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(body) = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return trimmed;
    };
    let body = body.strip_prefix("json").unwrap_or(body);
    body.trim()
}

/// Parses completion text strictly as JSON. Anything other than a JSON
/// document, optionally inside one code fence, is a hard failure.
pub fn parse_completion_json(text: &str) -> Result<Value, RemediationError> {
    serde_json::from_str(strip_code_fence(text))
        .map_err(|err| RemediationError::Malformed(format!("completion is not valid JSON: {err}")))
}

/// Turns the decoded JSON for `kind` into content ready for the learner.
pub fn content_from_value<R: Rng + ?Sized>(
    kind: RemediationKind,
    value: Value,
    rng: &mut R,
) -> Result<RemediationContent, RemediationError> {
    let malformed =
        |err: serde_json::Error| RemediationError::Malformed(format!("{} payload: {err}", kind.as_str()));

    match kind {
        RemediationKind::UseCase => {
            let payload: UseCasePayload = serde_json::from_value(value).map_err(malformed)?;
            let mut points: Vec<String> = payload
                .points
                .into_iter()
                .map(|point| point.trim().to_string())
                .filter(|point| !point.is_empty())
                .collect();
            if points.is_empty() {
                return Err(RemediationError::Malformed("no use-case points returned".into()));
            }
            points.shuffle(rng);
            points.truncate(MAX_USE_CASE_POINTS);
            Ok(RemediationContent::UseCase { points })
        }
        RemediationKind::Poll => {
            let payload: PollPayload = serde_json::from_value(value).map_err(malformed)?;
            if payload.polls.is_empty() {
                return Err(RemediationError::Malformed("no poll questions returned".into()));
            }
            if payload.polls.iter().any(|poll| poll.options.is_empty()) {
                return Err(RemediationError::Malformed("poll question without options".into()));
            }
            Ok(RemediationContent::Poll {
                questions: payload.polls,
            })
        }
        RemediationKind::Quiz => {
            let payload: QuizPayload = serde_json::from_value(value).map_err(malformed)?;
            if payload.quiz.is_empty() {
                return Err(RemediationError::Malformed("no quiz questions returned".into()));
            }
            if payload.quiz.iter().any(|question| question.options.is_empty()) {
                return Err(RemediationError::Malformed("quiz question without options".into()));
            }
            let questions = payload
                .quiz
                .into_iter()
                .map(RawQuizQuestion::into_question)
                .collect();
            Ok(RemediationContent::Quiz { questions })
        }
    }
}
