//! Shared test fixtures: scripted retrieval and generation backends so
//! pipeline scenarios run without network access.


use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::GenerationBackend;
use crate::llm::StreamingResponse;
use crate::models::RetrievedDocument;
use crate::models::ReviewMetadata;
use crate::retrieval::DocumentRetriever;
use crate::Result;

/// Retriever returning a fixed document set, recording the requested k.
pub struct FixtureRetriever {
    pub documents: Vec<RetrievedDocument>,
    pub last_k: Arc<Mutex<Option<usize>>>,
}

impl FixtureRetriever {
    pub fn with_documents(documents: Vec<RetrievedDocument>) -> Self {
        Self {
            documents,
            last_k: Arc::new(Mutex::new(None)),
        }
    }

    pub fn empty() -> Self {
        Self::with_documents(Vec::new())
    }
}

#[async_trait]
impl DocumentRetriever for FixtureRetriever {
    async fn retrieve(&self, _query: &str, k: usize) -> Vec<RetrievedDocument> {
        *self.last_k.lock().unwrap() = Some(k);
        self.documents.iter().take(k).cloned().collect()
    }
}

/// Backend that captures the assembled prompt and replays fixed chunks.
pub struct CapturingBackend {
    pub prompt: Arc<Mutex<Option<String>>>,
    pub chunks: Vec<String>,
}

impl CapturingBackend {
    pub fn replaying(chunks: Vec<&str>) -> Self {
        Self {
            prompt: Arc::new(Mutex::new(None)),
            chunks: chunks.into_iter().map(str::to_string).collect(),
        }
    }
}

#[async_trait]
impl GenerationBackend for CapturingBackend {
    async fn stream_chat(&self, prompt: &str) -> Result<StreamingResponse> {
        *self.prompt.lock().unwrap() = Some(prompt.to_string());
        let chunks: Vec<Result<String>> = self.chunks.iter().cloned().map(Ok).collect();
        Ok(StreamingResponse::new(Box::pin(futures::stream::iter(
            chunks,
        ))))
    }
}

/// One retrieved review document with enough metadata to survive
/// normalization.
pub fn review_document(title: &str, author: &str, grade: &str, text: &str) -> RetrievedDocument {
    RetrievedDocument {
        content: text.to_string(),
        score: 0.9,
        metadata: ReviewMetadata {
            book_title: Some(title.to_string()),
            author_name: Some(author.to_string()),
            grade: Some(grade.to_string()),
            sensuality: Some("Warm".to_string()),
            book_types: vec!["Contemporary Romance".to_string()],
            url: Some(format!(
                "https://example.com/reviews/{}",
                title.to_lowercase().replace(' ', "-")
            )),
            text: Some(text.to_string()),
            ..ReviewMetadata::default()
        },
    }
}
