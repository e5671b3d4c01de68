//! Streaming chat-completion client (OpenAI wire shape).

pub mod streaming;

pub use streaming::ChunkStream;
pub use streaming::StreamingResponse;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::AppConfig;
use crate::errors::MinervaError;
use crate::errors::Result;

/// Seam for the text generation step, so the pipeline and relay can be
/// tested against synthetic chunk streams.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Start a streaming completion for the assembled prompt.
    async fn stream_chat(&self, prompt: &str) -> Result<StreamingResponse>;
}

/// Client for a streaming chat-completions endpoint.
pub struct LlmService {
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: Client,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

impl LlmService {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api_key = config.generation_key()?;
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        Ok(Self {
            endpoint: config.generation.endpoint.clone(),
            api_key,
            model: config.generation.model.clone(),
            temperature: config.generation.temperature,
            max_tokens: config.generation.max_tokens,
            client,
        })
    }
}

struct SseState {
    response: reqwest::Response,
    buffer: String,
    done: bool,
}

#[async_trait]
impl GenerationBackend for LlmService {
    async fn stream_chat(&self, prompt: &str) -> Result<StreamingResponse> {
        let url = format!(
            "{}/v1/chat/completions",
            self.endpoint.trim_end_matches('/')
        );
        debug!("Starting streaming completion ({})", self.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&ChatCompletionRequest {
                model: &self.model,
                messages: vec![WireMessage {
                    role: "user",
                    content: prompt,
                }],
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                stream: true,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MinervaError::Generation(format!(
                "completion request failed with status {status}: {body}"
            )));
        }

        let state = SseState {
            response,
            buffer: String::new(),
            done: false,
        };

        let stream = futures::stream::unfold(state, |mut state| async move {
            if state.done {
                return None;
            }
            loop {
                // Drain complete lines already buffered before pulling
                // the next network chunk.
                while let Some(pos) = state.buffer.find('\n') {
                    let line: String = state.buffer.drain(..=pos).collect();
                    let line = line.trim_end_matches(['\n', '\r']);
                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }
                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    let data = data.trim();
                    if data == "[DONE]" {
                        state.done = true;
                        return None;
                    }
                    if let Some(delta) = extract_delta(data) {
                        return Some((Ok(delta), state));
                    }
                }

                match state.response.chunk().await {
                    Ok(Some(bytes)) => {
                        state.buffer.push_str(&String::from_utf8_lossy(&bytes));
                    }
                    Ok(None) => {
                        state.done = true;
                        return None;
                    }
                    Err(e) => {
                        // Early termination: caller treats what arrived
                        // so far as the whole response.
                        state.done = true;
                        return Some((
                            Err(MinervaError::Generation(format!(
                                "stream interrupted: {e}"
                            ))),
                            state,
                        ));
                    }
                }
            }
        });

        Ok(StreamingResponse::new(Box::pin(stream)))
    }
}

/// Pull `choices[0].delta.content` out of one SSE data payload.
fn extract_delta(data: &str) -> Option<String> {
    let value: Value = serde_json::from_str(data).ok()?;
    value
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_delta() {
        let data = r#"{"choices":[{"delta":{"content":"Hi"}}]}"#;
        assert_eq!(extract_delta(data), Some("Hi".to_string()));
    }

    #[test]
    fn test_extract_delta_role_only_chunk() {
        let data = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(extract_delta(data), None);
    }

    #[test]
    fn test_extract_delta_malformed() {
        assert_eq!(extract_delta("not json"), None);
    }
}
