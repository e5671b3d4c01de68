//! HTTP API: the chat SSE endpoint, health check, and per-user rate
//! limiting.

pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod server;
pub mod types;

pub use handlers::AppState;
pub use rate_limit::RateLimiter;
pub use server::serve_api;
