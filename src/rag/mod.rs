//! RAG core: metadata normalization, context assembly, prompt
//! templating, and the end-to-end chat pipeline.
//!
//! Data flow for one turn: classify the question, retrieve scored
//! review documents, normalize their metadata into deduplicated book
//! records, assemble the system prompt, and hand it to the generation
//! backend for streaming.

pub mod context;
pub mod normalize;
pub mod pipeline;
pub mod prompts;

pub use context::ContextAssembler;
pub use context::NO_RESULTS_CONTEXT;
pub use pipeline::ChatService;
pub use prompts::PromptTemplate;
