//! API request handlers

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::Event;
use axum::response::sse::KeepAlive;
use axum::response::sse::Sse;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use futures::future::Either;
use futures::StreamExt;
use serde_json::json;
use tracing::error;
use tracing::info;

use crate::api::rate_limit::RateLimiter;
use crate::api::types::ChatRequest;
use crate::api::types::ErrorBody;
use crate::api::types::HealthResponse;
use crate::config::AppConfig;
use crate::errors::MinervaError;
use crate::rag::ChatService;
use crate::relay;
use crate::relay::RelayConfig;
use crate::relay::RelayEvent;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub rate_limiter: Arc<RateLimiter>,
}

/// Health check handler
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Chat handler: one conversation turn, answered as an SSE stream of
/// buffer snapshots terminated by a single `done` event.
///
/// Non-streaming failures (bad request, missing keys, rate limit) are
/// plain JSON; once the stream has started, failures arrive inside it
/// as fixed apology text.
pub async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Response {
    if request.messages.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Invalid request",
            "messages must not be empty",
            None,
        );
    }

    let user_id = request.user_id.as_deref().unwrap_or("anonymous");
    info!(
        "POST /api/chat ({} messages, user {})",
        request.messages.len(),
        user_id
    );

    if !state.rate_limiter.check(user_id) {
        return error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded",
            "too many requests, please slow down",
            None,
        );
    }

    // Keys are validated here, per request: a misconfigured deployment
    // answers with a descriptive 500 instead of crashing at startup.
    let service = match ChatService::from_config(&state.config) {
        Ok(service) => service,
        Err(MinervaError::Config(details)) => {
            error!("Configuration error: {}", details);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Configuration error",
                &details,
                Some("config"),
            );
        }
        Err(e) => {
            error!("Failed to build chat service: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error",
                &e.to_string(),
                None,
            );
        }
    };

    let relay_config = RelayConfig {
        timeout: state.config.stream_timeout(),
        min_update_interval: state.config.update_interval(),
    };

    // Failures before generation starts still read as an assistant
    // message, so the conversation never dead-ends silently.
    let events = match service.respond(&request.messages).await {
        Ok(response) => Either::Left(relay::relay(response, relay_config)),
        Err(e) => {
            error!("Chat turn failed before generation: {}", e);
            Either::Right(relay::single_message(relay::user_facing_message(
                &e.to_string(),
            )))
        }
    };

    let sse = events.map(|event| {
        Ok::<Event, Infallible>(match event {
            RelayEvent::Update(text) => Event::default()
                .event("message")
                .data(json!({ "text": text }).to_string()),
            RelayEvent::Done => Event::default().event("done").data("{}"),
        })
    });

    Sse::new(sse).keep_alive(KeepAlive::default()).into_response()
}

fn error_response(
    status: StatusCode,
    error: &str,
    details: &str,
    kind: Option<&str>,
) -> Response {
    (
        status,
        Json(ErrorBody {
            error: error.to_string(),
            details: details.to_string(),
            r#type: kind.map(str::to_string),
        }),
    )
        .into_response()
}
