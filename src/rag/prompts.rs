//! Prompt templates for the chat pipeline.
//!
//! Templates use `{{name}}` placeholders. Literal braces (the embedded
//! book-data JSON skeleton) are written doubled and collapse to single
//! braces at render time; the client-side parser knows how to repair
//! output where the model echoes the doubled form back.

use std::collections::HashMap;

/// Template for generating prompts
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    variables: Vec<String>,
}

impl PromptTemplate {
    /// Create a new prompt template
    pub fn new(template: impl Into<String>) -> Self {
        let template = template.into();
        let variables = extract_variables(&template);
        Self {
            template,
            variables,
        }
    }

    /// Fill in the template with variables, then collapse doubled
    /// braces into literal single braces.
    pub fn render(&self, values: &HashMap<String, String>) -> String {
        let mut result = self.template.clone();
        for var in &self.variables {
            if let Some(value) = values.get(var) {
                result = result.replace(&format!("{{{{{var}}}}}"), value);
            }
        }
        result.replace("{{", "{").replace("}}", "}")
    }

    /// Get required variables
    pub fn variables(&self) -> &[String] {
        &self.variables
    }
}

/// Extract variable names from the template. Only identifier-shaped
/// `{{name}}` sequences count; `{{` followed by anything else is a
/// literal-brace escape.
fn extract_variables(template: &str) -> Vec<String> {
    let mut variables = Vec::new();
    let bytes = template.as_bytes();
    let mut i = 0;

    while i + 1 < bytes.len() {
        if bytes[i] == b'{' && bytes[i + 1] == b'{' {
            let start = i + 2;
            let mut end = start;
            while end < bytes.len()
                && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
            {
                end += 1;
            }
            if end > start && end + 1 < bytes.len() && &bytes[end..end + 2] == b"}}" {
                let name = template[start..end].to_string();
                if !variables.contains(&name) {
                    variables.push(name);
                }
                i = end + 2;
                continue;
            }
        }
        i += 1;
    }

    variables
}

/// JSON skeleton the model must emit ahead of its prose. Doubled braces
/// are literal; `(field)` markers show which metadata value goes where.
pub const BOOK_DATA_TEMPLATE: &str = r#"<book-data>
{{
  "books": [
    {{
      "title": "(title)",
      "author": "(author)",
      "grade": "(grade)",
      "sensuality": "(sensuality)",
      "bookTypes": ["(bookTypes)"],
      "asin": "(asin)",
      "reviewUrl": "(reviewUrl)",
      "postId": "(postId)",
      "featuredImage": "(featuredImage)"
    }}
  ]
}}
</book-data>"#;

// Assembled by concatenation, never `format!`: a format literal would
// collapse the `{{var}}` placeholders before `extract_variables` sees
// them.
const SYSTEM_TEMPLATE_HEAD: &str = r#"You are Minerva, an AI assistant for All About Romance (AAR). You help users discover and discuss romance books based on AAR's reviews. You must only provide information from the review metadata and context provided.

First, output any mentioned book's data using this exact format (include full metadata, no placeholders):

"#;

const SYSTEM_TEMPLATE_TAIL: &str = r#"

Then, format your response based on the query type:

FOR BOOK REVIEWS:
# Review of [Title] by [Author]

## Overview
[2-3 sentences summarizing the book and review]

## Review Details
• Grade: [grade] from [reviewer name]
• Published: [date]
• Sensuality: [rating]
• Genre: [book types]

## Key Points
• [Point 1 about the book/review]
• [Point 2 about the book/review]
• [Point 3 about the book/review]

[ONLY if the book has reader comments:]
## Reader Comments
• [Reader name]: "[exact quote]"

FOR RECOMMENDATIONS:
# Books Similar to [Title]

For each recommendation:
1. Insert book data block
2. Add:

## Why You Might Like [Title]:
• [2-3 specific similarities based on review]
• [Notable themes or elements]
• [Grade and reviewer perspective]

STRICT RULES:
1. Output MUST start with the book data block - no text before it
2. Only discuss books present in the provided metadata
3. Present at most {{max_books}} books in one response
4. Only include reader comments when the metadata contains them
5. Use bullet points (•) not asterisks (*) or dashes (-)
6. Always validate data exists before mentioning it
7. Maintain consistent spacing and formatting

Available metadata: {{metadata}}
Context: {{context}}
History: {{chat_history}}
Question: {{question}}"#;

/// System template for the review-chat assistant.
pub fn system_template() -> PromptTemplate {
    PromptTemplate::new(
        [SYSTEM_TEMPLATE_HEAD, BOOK_DATA_TEMPLATE, SYSTEM_TEMPLATE_TAIL].concat(),
    )
}
