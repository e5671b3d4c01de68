//! Transport for the chat client: how a conversation reaches the
//! server and comes back as a stream of buffer snapshots.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::errors::MinervaError;
use crate::errors::Result;
use crate::models::Message;

/// Stream of full-buffer snapshots; each item replaces the previous
/// view of the assistant message.
pub type SnapshotStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Seam between the chat session driver and the wire, so retry and
/// cancellation logic is testable against scripted transports.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Start one chat turn; the stream ends when the server signals done.
    async fn stream_chat(
        &self,
        messages: &[Message],
        user_id: Option<&str>,
    ) -> Result<SnapshotStream>;
}

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct SnapshotPayload {
    text: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    details: String,
    #[serde(default)]
    r#type: Option<String>,
}

/// HTTP transport consuming the server's `/api/chat` SSE endpoint.
pub struct HttpChatTransport {
    endpoint: String,
    client: Client,
}

impl HttpChatTransport {
    pub fn new(endpoint: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()?;
        Ok(Self { endpoint, client })
    }
}

struct SseState {
    response: reqwest::Response,
    buffer: String,
    event_name: String,
    data: String,
    done: bool,
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn stream_chat(
        &self,
        messages: &[Message],
        user_id: Option<&str>,
    ) -> Result<SnapshotStream> {
        let url = format!("{}/api/chat", self.endpoint.trim_end_matches('/'));
        debug!("POST {} ({} messages)", url, messages.len());

        let response = self
            .client
            .post(&url)
            .json(&ChatRequestBody { messages, user_id })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: ErrorBody = response.json().await.unwrap_or(ErrorBody {
                error: format!("request failed with status {status}"),
                details: String::new(),
                r#type: None,
            });
            let detail = if body.details.is_empty() {
                body.error
            } else {
                format!("{}: {}", body.error, body.details)
            };
            return Err(match (status.as_u16(), body.r#type.as_deref()) {
                (_, Some("config")) => MinervaError::Config(detail),
                (429, _) => MinervaError::RateLimited(detail),
                _ => MinervaError::Generation(detail),
            });
        }

        let state = SseState {
            response,
            buffer: String::new(),
            event_name: String::new(),
            data: String::new(),
            done: false,
        };

        let stream = futures::stream::unfold(state, |mut state| async move {
            if state.done {
                return None;
            }
            loop {
                while let Some(pos) = state.buffer.find('\n') {
                    let line: String = state.buffer.drain(..=pos).collect();
                    let line = line.trim_end_matches(['\n', '\r']);

                    if let Some(rest) = line.strip_prefix("event:") {
                        state.event_name = rest.trim().to_string();
                    } else if let Some(rest) = line.strip_prefix("data:") {
                        if !state.data.is_empty() {
                            state.data.push('\n');
                        }
                        state.data.push_str(rest.trim_start());
                    } else if line.is_empty() {
                        // Blank line dispatches the pending event.
                        let event = std::mem::take(&mut state.event_name);
                        let data = std::mem::take(&mut state.data);
                        if event == "done" {
                            state.done = true;
                            return None;
                        }
                        if !data.is_empty() {
                            if let Ok(payload) =
                                serde_json::from_str::<SnapshotPayload>(&data)
                            {
                                return Some((Ok(payload.text), state));
                            }
                        }
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

        Ok(Box::pin(stream))
    }
}
