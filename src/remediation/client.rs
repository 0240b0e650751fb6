use std::time::Duration;

use futures_util::future::BoxFuture;
use log::{info, warn};
use serde_json::{json, Value};
use thiserror::Error;

use super::parse::{content_from_value, extract_completion_text, parse_completion_json};
use super::prompts::{hint_messages, remediation_messages, ChatRequest, COMPLETION_SEED};
use super::types::{RemediationContent, RemediationKind};

const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum RemediationError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("content service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("language model returned no content")]
    EmptyCompletion,

    #[error("malformed content: {0}")]
    Malformed(String),
}

/// Produces remediation material and hints for a lesson topic.
pub trait RemediationSource: Send + Sync {
    fn fetch<'a>(
        &'a self,
        kind: RemediationKind,
        topic: &'a str,
    ) -> BoxFuture<'a, Result<RemediationContent, RemediationError>>;

    fn hint<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<String, RemediationError>>;
}

fn build_http_client() -> Result<reqwest::Client, RemediationError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(RemediationError::from)
}

async fn read_json(response: reqwest::Response) -> Result<Value, RemediationError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(RemediationError::Status {
            status: status.as_u16(),
            message,
        });
    }
    let text = response.text().await?;
    serde_json::from_str(&text)
        .map_err(|err| RemediationError::Malformed(format!("response is not JSON: {err}")))
}

/// Talks to an OpenAI-compatible `/chat/completions` endpoint directly.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl CompletionClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, RemediationError> {
        Ok(Self {
            http: build_http_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        })
    }

    async fn complete(&self, request: &ChatRequest<'_>) -> Result<String, RemediationError> {
        let mut builder = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let value = read_json(builder.send().await?).await?;
        extract_completion_text(&value).ok_or(RemediationError::EmptyCompletion)
    }

    async fn fetch_content(
        &self,
        kind: RemediationKind,
        topic: &str,
    ) -> Result<RemediationContent, RemediationError> {
        let request = ChatRequest {
            model: &self.model,
            messages: remediation_messages(kind, topic),
            seed: Some(COMPLETION_SEED),
        };
        let text = self.complete(&request).await?;
        let value = parse_completion_json(&text)?;
        let content = content_from_value(kind, value, &mut rand::thread_rng())?;
        info!("Generated {} content for topic '{topic}'", kind.as_str());
        Ok(content)
    }

    async fn fetch_hint(&self, query: &str) -> Result<String, RemediationError> {
        let request = ChatRequest {
            model: &self.model,
            messages: hint_messages(query),
            seed: None,
        };
        let text = self.complete(&request).await?;
        Ok(text.trim().to_string())
    }
}

impl RemediationSource for CompletionClient {
    fn fetch<'a>(
        &'a self,
        kind: RemediationKind,
        topic: &'a str,
    ) -> BoxFuture<'a, Result<RemediationContent, RemediationError>> {
        Box::pin(self.fetch_content(kind, topic))
    }

    fn hint<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<String, RemediationError>> {
        Box::pin(self.fetch_hint(query))
    }
}

/// Talks to the web app's content routes (`/api/quiz`, `/api/polls`,
/// `/api/use-case`, `/api/hints`), which answer `{ "res": ... }`.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    http: reqwest::Client,
    base_url: String,
}

impl ProxyClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, RemediationError> {
        Ok(Self {
            http: build_http_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post(&self, route: &str, body: Value) -> Result<Value, RemediationError> {
        let response = self
            .http
            .post(format!("{}/api/{route}", self.base_url))
            .json(&body)
            .send()
            .await?;
        let mut value = read_json(response).await?;

        if let Some(error) = value.get("error").and_then(Value::as_str) {
            warn!("Content route /api/{route} reported: {error}");
            return Err(RemediationError::Malformed(error.to_string()));
        }
        match value.get_mut("res") {
            Some(res) => Ok(res.take()),
            None => Err(RemediationError::Malformed("response has no `res` field".into())),
        }
    }

    async fn fetch_content(
        &self,
        kind: RemediationKind,
        topic: &str,
    ) -> Result<RemediationContent, RemediationError> {
        let res = self.post(kind.as_str(), json!({ "topic": topic })).await?;
        content_from_value(kind, res, &mut rand::thread_rng())
    }

    async fn fetch_hint(&self, query: &str) -> Result<String, RemediationError> {
        let res = self.post("hints", json!({ "query": query })).await?;
        res.as_str()
            .map(|hint| hint.trim().to_string())
            .ok_or_else(|| RemediationError::Malformed("hint is not a string".into()))
    }
}

impl RemediationSource for ProxyClient {
    fn fetch<'a>(
        &'a self,
        kind: RemediationKind,
        topic: &'a str,
    ) -> BoxFuture<'a, Result<RemediationContent, RemediationError>> {
        Box::pin(self.fetch_content(kind, topic))
    }

    fn hint<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<String, RemediationError>> {
        Box::pin(self.fetch_hint(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned HTTP response and hands back the request it saw.
    async fn serve_once(
        status: &'static str,
        body: String,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let content_length = text[..head_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + content_length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
            String::from_utf8_lossy(&request).to_string()
        });
        (format!("http://{addr}"), handle)
    }

    #[tokio::test]
    async fn completion_client_parses_quiz() {
        let content = r#"{"topic": "Transformers", "quiz": [{"question": "Q", "options": ["A", "B"], "correctAnswer": "B"}]}"#;
        let body = json!({"choices": [{"message": {"role": "assistant", "content": content}}]}).to_string();
        let (base, server) = serve_once("200 OK", body).await;

        let client = CompletionClient::new(base, "gpt-4", Some("sk-test".into())).unwrap();
        let result = client.fetch(RemediationKind::Quiz, "Transformers").await.unwrap();
        let RemediationContent::Quiz { questions } = result else {
            panic!("expected quiz");
        };
        assert_eq!(questions[0].correct_answer, Some(1));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /chat/completions"));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer sk-test"));
        assert!(request.contains("\"seed\":1200"));
    }

    #[tokio::test]
    async fn completion_client_rejects_prose() {
        let body = json!({"choices": [{"message": {"content": "I cannot do that."}}]}).to_string();
        let (base, _server) = serve_once("200 OK", body).await;

        let client = CompletionClient::new(base, "gpt-4", None).unwrap();
        let err = client.fetch(RemediationKind::Poll, "Transformers").await.unwrap_err();
        assert!(matches!(err, RemediationError::Malformed(_)));
    }

    #[tokio::test]
    async fn proxy_client_reads_res_envelope() {
        let body = json!({"message": "Success", "res": {"topic": "t", "polls": [{"question": "Q", "options": ["x", "y"]}]}}).to_string();
        let (base, server) = serve_once("200 OK", body).await;

        let client = ProxyClient::new(base).unwrap();
        let content = client.fetch(RemediationKind::Poll, "Transformers").await.unwrap();
        assert_eq!(content.question_count(), 1);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/polls"));
        assert!(request.contains("\"topic\":\"Transformers\""));
    }

    #[tokio::test]
    async fn proxy_client_surfaces_http_status() {
        let body = json!({"error": "Internal server error"}).to_string();
        let (base, _server) = serve_once("400 Bad Request", body).await;

        let client = ProxyClient::new(base).unwrap();
        let err = client.hint("What is attention?").await.unwrap_err();
        assert!(matches!(err, RemediationError::Status { status: 400, .. }));
    }
}
