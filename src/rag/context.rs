//! Context assembly from retrieved documents.

use crate::models::Message;
use crate::models::RetrievedDocument;
use crate::models::Role;

/// Sentinel interpolated into the prompt when retrieval came back empty,
/// so the model states what it does not know instead of inventing it.
pub const NO_RESULTS_CONTEXT: &str = "No specific results found.";

/// Line prefix stripped from document text before interpolation; tag
/// lists are ingestion artifacts and only burn prompt budget.
const TAGS_PREFIX: &str = "Tags:";

/// Assembler for the free-text context section of the prompt.
pub struct ContextAssembler {
    max_context_length: usize,
}

impl ContextAssembler {
    pub const fn new(max_context_length: usize) -> Self {
        Self { max_context_length }
    }

    /// Join document contents, drop `Tags:` lines, and cap total length
    /// at a document boundary.
    pub fn assemble(&self, docs: &[RetrievedDocument]) -> String {
        let mut context = String::new();
        let mut total_length = 0;

        for doc in docs {
            let cleaned = clean_document_text(&doc.content);
            if cleaned.is_empty() {
                continue;
            }

            let entry_len = cleaned.len() + 2;
            if total_length + entry_len > self.max_context_length {
                break;
            }

            if !context.is_empty() {
                context.push_str("\n\n");
            }
            context.push_str(&cleaned);
            total_length += entry_len;
        }

        if context.is_empty() {
            NO_RESULTS_CONTEXT.to_string()
        } else {
            context
        }
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(6000)
    }
}

/// Trim a document and remove `Tags:`-prefixed lines.
fn clean_document_text(text: &str) -> String {
    text.trim()
        .lines()
        .filter(|line| !line.is_empty() && !line.starts_with(TAGS_PREFIX))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format the last `window` messages of history for the prompt,
/// chronological order preserved.
pub fn format_chat_history(messages: &[Message], window: usize) -> String {
    let start = messages.len().saturating_sub(window);
    messages[start..]
        .iter()
        .map(|m| {
            let speaker = match m.role {
                Role::User => "Human",
                Role::Assistant | Role::System => "Assistant",
            };
            format!("{speaker}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
