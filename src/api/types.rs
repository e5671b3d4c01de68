//! API request and response types

use serde::Deserialize;
use serde::Serialize;

use crate::models::Message;

/// Chat request body: the full conversation so far, newest last.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// JSON error body for non-streaming failures.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
