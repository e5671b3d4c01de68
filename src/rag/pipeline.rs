//! Chat pipeline: classify -> retrieve -> normalize -> assemble -> stream.

use std::collections::HashMap;

use tracing::debug;
use tracing::info;

use crate::classifier;
use crate::classifier::QueryType;
use crate::config::AppConfig;
use crate::errors::MinervaError;
use crate::errors::Result;
use crate::llm::GenerationBackend;
use crate::llm::LlmService;
use crate::llm::StreamingResponse;
use crate::models::Message;
use crate::models::Role;
use crate::rag::context;
use crate::rag::normalize;
use crate::rag::prompts;
use crate::rag::ContextAssembler;
use crate::retrieval::DocumentRetriever;
use crate::retrieval::Retriever;

/// End-to-end chat service for one conversation turn.
pub struct ChatService {
    retriever: Box<dyn DocumentRetriever>,
    assembler: ContextAssembler,
    backend: Box<dyn GenerationBackend>,
    history_window: usize,
}

impl ChatService {
    /// Build the full service from application config.
    ///
    /// # Errors
    /// - Missing API keys or index host (per-request configuration error)
    /// - HTTP client construction errors
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let retriever = Retriever::from_config(config)?;
        let backend = LlmService::from_config(config)?;

        Ok(Self::from_services(
            Box::new(retriever),
            Box::new(backend),
            config.chat.history_window,
        ))
    }

    /// Create from existing services (used by tests to inject fixtures).
    pub fn from_services(
        retriever: Box<dyn DocumentRetriever>,
        backend: Box<dyn GenerationBackend>,
        history_window: usize,
    ) -> Self {
        Self {
            retriever,
            assembler: ContextAssembler::default(),
            backend,
            history_window,
        }
    }

    /// Process one conversation turn and return the token stream.
    ///
    /// Retrieval failures degrade to an empty context inside the
    /// retriever; errors surfacing from here are generation or
    /// configuration problems.
    pub async fn respond(&self, messages: &[Message]) -> Result<StreamingResponse> {
        let question = latest_user_message(messages)?;
        info!("Processing chat turn: {}", question);

        let query_type = classifier::classify(question);
        let limit = query_type.retrieval_limit();
        debug!("Classified as {:?}, retrieving up to {}", query_type, limit);

        let documents = self.retriever.retrieve(question, limit).await;
        let books = normalize::normalize(&documents);
        debug!(
            "Retrieved {} documents, {} normalized books",
            documents.len(),
            books.len()
        );

        let prompt = self.build_prompt(question, messages, &books, &documents, query_type)?;
        self.backend.stream_chat(&prompt).await
    }

    fn build_prompt(
        &self,
        question: &str,
        messages: &[Message],
        books: &std::collections::BTreeMap<String, crate::models::NormalizedBook>,
        documents: &[crate::models::RetrievedDocument],
        query_type: QueryType,
    ) -> Result<String> {
        let metadata_json = serde_json::to_string_pretty(books)?;
        let context_text = self.assembler.assemble(documents);
        let history = context::format_chat_history(messages, self.history_window);

        let mut values = HashMap::new();
        values.insert("metadata".to_string(), metadata_json);
        values.insert("context".to_string(), context_text);
        values.insert("chat_history".to_string(), history);
        values.insert("question".to_string(), question.to_string());
        values.insert(
            "max_books".to_string(),
            query_type.max_books().to_string(),
        );

        Ok(prompts::system_template().render(&values))
    }
}

/// The message the turn answers: the most recent user message.
fn latest_user_message(messages: &[Message]) -> Result<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .ok_or_else(|| {
            MinervaError::Custom("conversation contains no user message".to_string())
        })
}
