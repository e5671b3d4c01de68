//! Vector index client and the retriever that fronts it.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing::error;

use crate::errors::MinervaError;
use crate::errors::Result;
use crate::models::RetrievedDocument;
use crate::models::ReviewMetadata;
use crate::retrieval::EmbeddingClient;

/// Bounds on the number of documents one retrieval may request.
pub const MIN_TOP_K: usize = 1;
pub const MAX_TOP_K: usize = 10;

/// Seam for the document retrieval step, so the chat pipeline can be
/// exercised against fixture documents in tests.
#[async_trait]
pub trait DocumentRetriever: Send + Sync {
    /// Return up to `k` scored documents for a free-text query.
    ///
    /// Never fails the turn: backend errors are logged and degrade to an
    /// empty result so the caller proceeds with "no context".
    async fn retrieve(&self, query: &str, k: usize) -> Vec<RetrievedDocument>;
}

/// Client for a Pinecone-style vector index `/query` endpoint.
pub struct VectorIndexClient {
    index_host: String,
    api_key: String,
    client: Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    vector: Vec<f32>,
    top_k: usize,
    include_metadata: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Value,
}

impl VectorIndexClient {
    pub fn new(index_host: String, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            index_host,
            api_key,
            client,
        })
    }

    /// Query the index with a pre-computed embedding.
    pub async fn query(&self, vector: Vec<f32>, top_k: usize) -> Result<Vec<RetrievedDocument>> {
        let url = if self.index_host.starts_with("http") {
            format!("{}/query", self.index_host.trim_end_matches('/'))
        } else {
            format!("https://{}/query", self.index_host)
        };

        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(&QueryRequest {
                vector,
                top_k,
                include_metadata: true,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MinervaError::Retrieval(format!(
                "index query failed with status {status}: {body}"
            )));
        }

        let parsed: QueryResponse = response.json().await?;
        let documents = parsed
            .matches
            .into_iter()
            .map(|m| {
                // Metadata shapes drift across index generations; anything
                // that fails to deserialize becomes an empty record rather
                // than sinking the whole result set.
                let metadata: ReviewMetadata =
                    serde_json::from_value(m.metadata.clone()).unwrap_or_default();
                let content = metadata.text.clone().unwrap_or_default();
                RetrievedDocument {
                    content,
                    score: m.score,
                    metadata,
                }
            })
            .collect();

        Ok(documents)
    }
}

/// Retriever: embeds the query, searches the index, and absorbs backend
/// failures into an empty result set.
pub struct Retriever {
    embedding: EmbeddingClient,
    index: VectorIndexClient,
}

impl Retriever {
    pub fn new(embedding: EmbeddingClient, index: VectorIndexClient) -> Self {
        Self { embedding, index }
    }

    async fn retrieve_inner(&self, query: &str, k: usize) -> Result<Vec<RetrievedDocument>> {
        let k = k.clamp(MIN_TOP_K, MAX_TOP_K);
        debug!("Retrieving top {} documents for query", k);

        let vector = self.embedding.generate(query).await?;
        let documents = self.index.query(vector, k).await?;

        debug!("Retrieved {} documents", documents.len());
        Ok(documents)
    }
}

#[async_trait]
impl DocumentRetriever for Retriever {
    async fn retrieve(&self, query: &str, k: usize) -> Vec<RetrievedDocument> {
        match self.retrieve_inner(query, k).await {
            Ok(documents) => documents,
            Err(e) => {
                // Degrade to "no context" rather than failing the turn.
                error!("Retrieval failed, proceeding without context: {}", e);
                Vec::new()
            }
        }
    }
}
