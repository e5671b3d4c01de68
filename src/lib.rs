pub mod api;
pub mod classifier;
pub mod client;
pub mod config;
pub mod errors;
pub mod llm;
pub mod logging;
pub mod models;
pub mod rag;
pub mod relay;
pub mod render;
pub mod retrieval;

#[cfg(test)]
pub mod tests;

pub use config::AppConfig;
pub use errors::MinervaError;
pub use errors::Result;
