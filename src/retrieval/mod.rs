//! Retrieval: query embedding plus vector index search.
//!
//! Both backends are external HTTP services; this module owns no state
//! beyond the HTTP clients. The one policy decision lives here: a
//! failed retrieval returns an empty document set so the conversation
//! turn proceeds with "no specific results found" instead of an error.

pub mod client;
pub mod embedding;

pub use client::DocumentRetriever;
pub use client::Retriever;
pub use client::VectorIndexClient;
pub use client::MAX_TOP_K;
pub use client::MIN_TOP_K;
pub use embedding::EmbeddingClient;

use crate::config::AppConfig;
use crate::errors::Result;

impl Retriever {
    /// Build a retriever from application config. Key presence is
    /// checked here, at request time.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let retrieval_key = config.retrieval_key()?;
        let generation_key = config.generation_key()?;
        let index_host = config.index_host()?.to_string();

        let embedding = EmbeddingClient::new(
            config.retrieval.embedding_endpoint.clone(),
            config.retrieval.embedding_model.clone(),
            generation_key,
        )?;
        let index = VectorIndexClient::new(index_host, retrieval_key)?;

        Ok(Self::new(embedding, index))
    }
}
