use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AppConfig;

/// Fixed notice appended when the model stops at the output-token limit.
pub const TRUNCATION_NOTICE: &str = "\n\n(ملاحظة: تم اختصار الإجابة لطولها الزائد).";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// One role-tagged turn in the generateContent payload.
#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Part {
    pub text: String,
}

impl Content {
    pub fn new(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![Part { text: text.into() }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Failure classes of the gateway. Each maps to a distinct fixed
/// user-facing apology so operators can tell connectivity problems,
/// malformed replies and unexpected errors apart in the logs.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gemini API returned status {0}")]
    Connection(StatusCode),
    #[error("unexpected response structure from gemini API")]
    Malformed,
    #[error("transport error: {0}")]
    Unexpected(#[from] reqwest::Error),
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    primary_url: String,
    fallback_url: String,
}

impl GeminiClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.gemini_api_key.clone(),
            primary_url: config.gemini_primary_url.clone(),
            fallback_url: config.gemini_fallback_url.clone(),
        }
    }

    /// Send the assembled turns to the primary model. A rate-limit reply
    /// (HTTP 429) triggers exactly one retry against the fallback tier with
    /// the identical payload; there are no further retries.
    pub async fn generate(&self, contents: &[Content]) -> Result<String, GatewayError> {
        let payload = serde_json::json!({
            "contents": contents,
            "generationConfig": {
                "temperature": 0.2,
                "topK": 40,
                "topP": 0.95,
                "maxOutputTokens": 2048
            }
        });

        let mut resp = self.post(&self.primary_url, &payload).await?;

        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!("primary model rate-limited, switching to fallback tier");
            resp = self.post(&self.fallback_url, &payload).await?;
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(%status, %body, "gemini API error");
            return Err(GatewayError::Connection(status));
        }

        let result: GenerateResponse = resp.json().await?;

        let text = result
            .candidates
            .first()
            .and_then(|c| {
                let part = c.content.as_ref()?.parts.first()?;
                let text = part.text.as_deref()?.trim().to_string();
                Some((text, c.finish_reason.as_deref()))
            })
            .map(|(mut text, finish_reason)| {
                if finish_reason == Some("MAX_TOKENS") {
                    text.push_str(TRUNCATION_NOTICE);
                }
                text
            });

        match text {
            Some(text) => Ok(text),
            None => {
                tracing::error!("unexpected gemini response structure");
                Err(GatewayError::Malformed)
            }
        }
    }

    async fn post(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<reqwest::Response, GatewayError> {
        let resp = self
            .client
            .post(url)
            .query(&[("key", &self.api_key)])
            .json(payload)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        Ok(resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(primary: &MockServer, fallback: &MockServer) -> GeminiClient {
        GeminiClient {
            client: Client::new(),
            api_key: "test-key".to_string(),
            primary_url: format!("{}/primary", primary.uri()),
            fallback_url: format!("{}/fallback", fallback.uri()),
        }
    }

    fn reply_body(text: &str, finish_reason: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": text }] },
                "finishReason": finish_reason
            }]
        })
    }

    fn turns() -> Vec<Content> {
        vec![Content::new("user", "ما هي خدماتكم؟")]
    }

    #[tokio::test]
    async fn returns_candidate_text_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/primary"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("  أهلاً بك  ", "STOP")))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server, &server);
        let text = client.generate(&turns()).await.unwrap();
        assert_eq!(text, "أهلاً بك");
    }

    #[tokio::test]
    async fn rate_limit_falls_back_exactly_once() {
        let primary = MockServer::start().await;
        let fallback = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/primary"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&primary)
            .await;
        Mock::given(method("POST"))
            .and(path("/fallback"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("جواب", "STOP")))
            .expect(1)
            .mount(&fallback)
            .await;

        let client = test_client(&primary, &fallback);
        let text = client.generate(&turns()).await.unwrap();
        assert_eq!(text, "جواب");
    }

    #[tokio::test]
    async fn non_success_after_fallback_is_connection_error() {
        let primary = MockServer::start().await;
        let fallback = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/primary"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&primary)
            .await;
        Mock::given(method("POST"))
            .and(path("/fallback"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&fallback)
            .await;

        let client = test_client(&primary, &fallback);
        let err = client.generate(&turns()).await.unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Connection(StatusCode::INTERNAL_SERVER_ERROR)
        ));
    }

    #[tokio::test]
    async fn max_tokens_appends_truncation_notice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/primary"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(reply_body("إجابة طويلة", "MAX_TOKENS")),
            )
            .mount(&server)
            .await;

        let client = test_client(&server, &server);
        let text = client.generate(&turns()).await.unwrap();
        assert!(text.starts_with("إجابة طويلة"));
        assert!(text.ends_with(TRUNCATION_NOTICE));
    }

    #[tokio::test]
    async fn empty_candidates_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/primary"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"candidates": []})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server, &server);
        let err = client.generate(&turns()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Malformed));
    }

    #[tokio::test]
    async fn invalid_json_body_is_unexpected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/primary"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = test_client(&server, &server);
        let err = client.generate(&turns()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unexpected(_)));
    }
}
