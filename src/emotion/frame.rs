use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{DetectionChannel, EmotionScore};

/// What a single inbound provider message carried for the active channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderFrame {
    Scores(Vec<EmotionScore>),
    /// e.g. "No faces detected."
    Warning(String),
    /// Provider-level failure (bad key, quota, unsupported payload).
    Error(String),
    Empty,
}

#[derive(Debug, Deserialize)]
struct ChannelPayload {
    #[serde(default)]
    predictions: Vec<Prediction>,
    #[serde(default)]
    warning: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    #[serde(default)]
    emotions: Vec<EmotionScore>,
}

/// Parses one provider message for `channel`. Other channels in the same
/// message are ignored.
pub fn parse_provider_frame(
    raw: &str,
    channel: DetectionChannel,
) -> Result<ProviderFrame, serde_json::Error> {
    let value: Value = serde_json::from_str(raw)?;

    if let Some(message) = value.get("error").and_then(Value::as_str) {
        return Ok(ProviderFrame::Error(message.to_string()));
    }

    let Some(channel_value) = value.get(channel.as_str()) else {
        return Ok(ProviderFrame::Empty);
    };

    let payload = ChannelPayload::deserialize(channel_value)?;
    if let Some(first) = payload.predictions.into_iter().next() {
        let scores: Vec<EmotionScore> = first
            .emotions
            .into_iter()
            .filter(|entry| entry.score.is_finite())
            .collect();
        if !scores.is_empty() {
            return Ok(ProviderFrame::Scores(scores));
        }
    }

    match payload.warning {
        Some(warning) if !warning.is_empty() => Ok(ProviderFrame::Warning(warning)),
        _ => Ok(ProviderFrame::Empty),
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FaceModelConfig {}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestedModels {
    pub face: FaceModelConfig,
}

/// Outbound frame: `{ "data": <base64 jpeg>, "models": { "face": {} } }`.
#[derive(Debug, Clone, Serialize)]
pub struct FrameSubmission {
    pub data: String,
    pub models: RequestedModels,
}

impl FrameSubmission {
    pub fn face(data: String) -> Self {
        Self {
            data,
            models: RequestedModels::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_face_predictions() {
        let raw = r#"{
            "face": {
                "predictions": [
                    {"emotions": [{"name": "Boredom", "score": 0.61}, {"name": "Joy", "score": 0.1}]},
                    {"emotions": [{"name": "Anger", "score": 0.9}]}
                ]
            },
            "payload_id": "abc"
        }"#;

        let frame = parse_provider_frame(raw, DetectionChannel::Face).unwrap();
        let ProviderFrame::Scores(scores) = frame else {
            panic!("expected scores, got {frame:?}");
        };
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].name, "Boredom");
    }

    #[test]
    fn warning_without_predictions() {
        let raw = r#"{"face": {"warning": "No faces detected.", "code": "W0105"}}"#;
        assert_eq!(
            parse_provider_frame(raw, DetectionChannel::Face).unwrap(),
            ProviderFrame::Warning("No faces detected.".into())
        );
    }

    #[test]
    fn other_channels_are_ignored() {
        let raw = r#"{"prosody": {"predictions": [{"emotions": [{"name": "Joy", "score": 0.8}]}]}}"#;
        assert_eq!(
            parse_provider_frame(raw, DetectionChannel::Face).unwrap(),
            ProviderFrame::Empty
        );
    }

    #[test]
    fn provider_error_is_surfaced() {
        let raw = r#"{"error": "Invalid API key", "code": "E0101"}"#;
        assert_eq!(
            parse_provider_frame(raw, DetectionChannel::Face).unwrap(),
            ProviderFrame::Error("Invalid API key".into())
        );
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(parse_provider_frame("not json", DetectionChannel::Face).is_err());
        assert!(parse_provider_frame(r#"{"face": {"predictions": 4}}"#, DetectionChannel::Face).is_err());
    }

    #[test]
    fn submission_shape_requests_face_model_only() {
        let json = serde_json::to_value(FrameSubmission::face("AAAA".into())).unwrap();
        assert_eq!(json, serde_json::json!({"data": "AAAA", "models": {"face": {}}}));
    }
}
