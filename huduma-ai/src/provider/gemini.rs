//! Google Gemini backend.
//!
//! Speaks the `generateContent` / `streamGenerateContent` REST API.
//! Supports enforced JSON output (`responseSchema`), web grounding
//! (`google_search` tool), inline binary parts, and SSE streaming.

use super::{FragmentStream, GenerateRequest, GenerateResponse, GenerativeBackend, PartData};
use crate::error::AiError;
use async_trait::async_trait;
use futures_util::StreamExt;
use huduma_common::config::AiConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// Gemini REST client.
pub struct GeminiClient {
    config: AiConfig,
    api_key: Option<String>,
    client: Client,
}

// ══════════════════════════════════════════════════════════════════════════════
// API REQUEST/RESPONSE TYPES
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f64,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: i64,
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(rename = "responseSchema", skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
}

#[derive(Debug, Serialize)]
struct Tool {
    google_search: Value,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct UsageMetadata {
    #[serde(rename = "totalTokenCount")]
    total_token_count: Option<i64>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate's parts.
    fn text(&self) -> String {
        self.candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.as_ref())
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

impl GeminiClient {
    /// Create a new Gemini client.
    ///
    /// API key resolution priority:
    /// 1. `api_key` in the supplied configuration
    /// 2. `GEMINI_API_KEY` environment variable
    /// 3. `GOOGLE_API_KEY` environment variable
    pub fn new(config: AiConfig) -> Self {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok());

        Self {
            config,
            api_key,
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn api_key(&self) -> Result<&str, AiError> {
        self.api_key.as_deref().ok_or_else(|| {
            AiError::remote("Gemini API key not found. Set GEMINI_API_KEY or GOOGLE_API_KEY.")
        })
    }

    fn endpoint(&self, model: &str, verb: &str, key: &str, sse: bool) -> String {
        let alt = if sse { "alt=sse&" } else { "" };
        format!(
            "{}/v1beta/models/{}:{}?{}key={}",
            self.config.base_url.trim_end_matches('/'),
            model,
            verb,
            alt,
            key
        )
    }

    fn build_body(&self, request: &GenerateRequest) -> GenerateContentRequest {
        let system_instruction = request.system.as_ref().map(|sys| Content {
            role: None,
            parts: vec![Part {
                text: Some(sys.clone()),
                inline_data: None,
            }],
        });

        let contents: Vec<Content> = request
            .turns
            .iter()
            .map(|turn| Content {
                role: Some(turn.role.as_str().to_string()),
                parts: turn
                    .parts
                    .iter()
                    .map(|part| match part {
                        PartData::Text(text) => Part {
                            text: Some(text.clone()),
                            inline_data: None,
                        },
                        PartData::InlineData { mime_type, data } => Part {
                            text: None,
                            inline_data: Some(InlineData {
                                mime_type: mime_type.clone(),
                                data: data.clone(),
                            }),
                        },
                    })
                    .collect(),
            })
            .collect();

        let tools = if request.grounding {
            vec![Tool {
                google_search: serde_json::json!({}),
            }]
        } else {
            Vec::new()
        };

        GenerateContentRequest {
            contents,
            system_instruction,
            generation_config: GenerationConfig {
                temperature: request.temperature.unwrap_or(self.config.temperature),
                max_output_tokens: request
                    .max_output_tokens
                    .unwrap_or(self.config.max_output_tokens),
                response_mime_type: request
                    .response_schema
                    .as_ref()
                    .map(|_| "application/json".to_string()),
                response_schema: request.response_schema.clone(),
            },
            tools,
        }
    }

    async fn post(
        &self,
        url: &str,
        body: &GenerateContentRequest,
    ) -> Result<reqwest::Response, AiError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| AiError::remote(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AiError::Remote {
                message: format!("API error ({}): {}", status.as_u16(), error_text),
                status_code: Some(status.as_u16()),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, AiError> {
        let key = self.api_key()?.to_string();
        let url = self.endpoint(&request.model, "generateContent", &key, false);
        let body = self.build_body(&request);

        let response = self.post(&url, &body).await?;

        let result: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AiError::remote(format!("Failed to parse response: {e}")))?;

        if let Some(err) = &result.error {
            return Err(AiError::remote(format!("API error: {}", err.message)));
        }

        if result.candidates.as_ref().map_or(true, |c| c.is_empty()) {
            return Err(AiError::remote("No response candidates from Gemini"));
        }

        let text = result.text();
        tracing::debug!(
            model = %request.model,
            total_tokens = result.usage_metadata.as_ref().and_then(|u| u.total_token_count).unwrap_or(0),
            response_len = text.len(),
            "generation complete"
        );

        // Schema-enforced responses are JSON text end to end; parse once
        // here so callers can trust the payload without re-extraction.
        let structured = if request.response_schema.is_some() {
            serde_json::from_str(&text).ok()
        } else {
            None
        };

        Ok(GenerateResponse { text, structured })
    }

    async fn generate_stream(&self, request: GenerateRequest) -> Result<FragmentStream, AiError> {
        let key = self.api_key()?.to_string();
        let url = self.endpoint(&request.model, "streamGenerateContent", &key, true);
        let body = self.build_body(&request);

        let response = self.post(&url, &body).await?;

        let (tx, rx) = mpsc::channel(32);
        let model = request.model.clone();

        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx
                            .send(Err(AiError::remote(format!("Stream error: {e}"))))
                            .await;
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // Process complete lines; SSE data lines carry one JSON
                // chunk each.
                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer.drain(..=line_end);

                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim();
                    if data.is_empty() {
                        continue;
                    }

                    match serde_json::from_str::<GenerateContentResponse>(data) {
                        Ok(parsed) => {
                            let fragment = parsed.text();
                            if fragment.is_empty() {
                                continue;
                            }
                            if tx.send(Ok(fragment)).await.is_err() {
                                tracing::debug!(model = %model, "fragment receiver dropped");
                                return;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(
                                model = %model,
                                data = %data,
                                error = %e,
                                "Failed to parse SSE chunk"
                            );
                        }
                    }
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Turn;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> AiConfig {
        AiConfig {
            api_key: Some("test-key".into()),
            base_url: base_url.into(),
            ..AiConfig::default()
        }
    }

    fn candidate_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{
                "content": {"parts": [{"text": text}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 6, "totalTokenCount": 10}
        })
    }

    #[tokio::test]
    async fn generate_returns_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body("Karibu!")))
            .mount(&server)
            .await;

        let client = GeminiClient::new(test_config(&server.uri()));
        let response = client
            .generate(GenerateRequest::prompt("gemini-2.0-flash", "greet me"))
            .await
            .unwrap();

        assert_eq!(response.text, "Karibu!");
        assert!(response.structured.is_none());
    }

    #[tokio::test]
    async fn generate_populates_structured_when_schema_requested() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .and(body_string_contains("responseSchema"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(candidate_body(r#"{"rating": 5}"#)),
            )
            .mount(&server)
            .await;

        let client = GeminiClient::new(test_config(&server.uri()));
        let mut request = GenerateRequest::prompt("gemini-2.0-flash", "rate this");
        request.response_schema = Some(serde_json::json!({
            "type": "object",
            "properties": {"rating": {"type": "integer"}}
        }));

        let response = client.generate(request).await.unwrap();
        assert_eq!(
            response.structured,
            Some(serde_json::json!({"rating": 5}))
        );
    }

    #[tokio::test]
    async fn generate_surfaces_api_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exhausted"))
            .mount(&server)
            .await;

        let client = GeminiClient::new(test_config(&server.uri()));
        let err = client
            .generate(GenerateRequest::prompt("gemini-2.0-flash", "hi"))
            .await
            .unwrap_err();

        match err {
            AiError::Remote { status_code, message } => {
                assert_eq!(status_code, Some(429));
                assert!(message.contains("quota exhausted"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn generate_rejects_empty_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"candidates": []})),
            )
            .mount(&server)
            .await;

        let client = GeminiClient::new(test_config(&server.uri()));
        let err = client
            .generate(GenerateRequest::prompt("gemini-2.0-flash", "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Remote { .. }));
    }

    #[tokio::test]
    async fn generate_stream_yields_fragments_in_order() {
        let server = MockServer::start().await;
        let sse_body = format!(
            "data: {}\n\ndata: {}\n\ndata: {}\n\n",
            candidate_body("Jambo"),
            candidate_body(", "),
            candidate_body("rafiki!")
        );
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:streamGenerateContent"))
            .and(query_param("alt", "sse"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse_body),
            )
            .mount(&server)
            .await;

        let client = GeminiClient::new(test_config(&server.uri()));
        let mut rx = client
            .generate_stream(GenerateRequest::prompt("gemini-2.0-flash", "greet"))
            .await
            .unwrap();

        let mut fragments = Vec::new();
        while let Some(fragment) = rx.recv().await {
            fragments.push(fragment.unwrap());
        }
        assert_eq!(fragments, vec!["Jambo", ", ", "rafiki!"]);
    }

    #[tokio::test]
    async fn generate_stream_skips_unparseable_chunks() {
        let server = MockServer::start().await;
        let sse_body = format!(
            "data: not json\n\ndata: {}\n\n",
            candidate_body("still here")
        );
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse_body),
            )
            .mount(&server)
            .await;

        let client = GeminiClient::new(test_config(&server.uri()));
        let mut rx = client
            .generate_stream(GenerateRequest::prompt("gemini-2.0-flash", "greet"))
            .await
            .unwrap();

        let mut fragments = Vec::new();
        while let Some(fragment) = rx.recv().await {
            fragments.push(fragment.unwrap());
        }
        assert_eq!(fragments, vec!["still here"]);
    }

    #[tokio::test]
    async fn missing_api_key_is_a_remote_error() {
        let config = AiConfig {
            api_key: None,
            ..AiConfig::default()
        };
        // Only meaningful when the environment has no key either
        if std::env::var("GEMINI_API_KEY").is_ok() || std::env::var("GOOGLE_API_KEY").is_ok() {
            return;
        }
        let client = GeminiClient::new(config);
        let err = client
            .generate(GenerateRequest::prompt("gemini-2.0-flash", "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Remote { .. }));
    }

    #[test]
    fn body_includes_grounding_tool() {
        let client = GeminiClient::new(test_config("http://localhost"));
        let mut request = GenerateRequest::prompt("gemini-2.0-flash", "local news");
        request.grounding = true;

        let body = client.build_body(&request);
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("tools").is_some());
    }

    #[test]
    fn body_maps_roles_and_inline_data() {
        let client = GeminiClient::new(test_config("http://localhost"));
        let mut request = GenerateRequest::prompt("gemini-2.0-flash", "check this photo");
        request.turns.push(Turn {
            role: crate::provider::Role::Model,
            parts: vec![PartData::InlineData {
                mime_type: "image/jpeg".into(),
                data: "aGVsbG8=".into(),
            }],
        });

        let body = client.build_body(&request);
        let json = serde_json::to_value(&body).unwrap();
        let contents = json["contents"].as_array().unwrap();
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0]["inlineData"]["mimeType"], "image/jpeg");
    }
}
