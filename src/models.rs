//! Core data model: conversation messages, raw review metadata as it
//! lives in the vector index, and the normalized per-book records the
//! rest of the pipeline works with.

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Role of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A single conversation message. The client treats the conversation as
/// an append-only ordered sequence of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(default = "new_message_id")]
    pub id: String,
    pub role: Role,
    pub content: String,
}

fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Raw per-document metadata as stored in the vector index.
///
/// The index schema has drifted over time: `bookTypes` may be an array
/// or a bare string, comment authors/contents are parallel arrays, and
/// any scalar may be absent. Everything is optional here; nothing past
/// the normalizer ever sees this shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewMetadata {
    #[serde(default)]
    pub book_title: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub sensuality: Option<String>,
    #[serde(default, deserialize_with = "string_or_seq")]
    pub book_types: Vec<String>,
    #[serde(default)]
    pub asin: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(default)]
    pub featured_image: Option<String>,
    #[serde(default)]
    pub reviewer_name: Option<String>,
    #[serde(default)]
    pub publish_date: Option<String>,
    #[serde(default)]
    pub comment_authors: Vec<String>,
    #[serde(default)]
    pub comment_contents: Vec<String>,
    /// Review body text stored alongside the embedding.
    #[serde(default)]
    pub text: Option<String>,
}

/// Accept either `"Contemporary Romance"` or `["Contemporary Romance"]`.
fn string_or_seq<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct StringOrSeq;

    impl<'de> Visitor<'de> for StringOrSeq {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string, array of strings, or null")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                Ok(vec![])
            } else {
                Ok(vec![trimmed.to_string()])
            }
        }

        fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            self.visit_str(&value)
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: de::SeqAccess<'de>,
        {
            let mut types = Vec::new();
            while let Some(value) = seq.next_element::<String>()? {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    types.push(trimmed.to_string());
                }
            }
            Ok(types)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![])
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![])
        }
    }

    deserializer.deserialize_any(StringOrSeq)
}

/// A scored document returned by the vector index for one query.
/// Ephemeral: produced per request and discarded after prompt assembly.
#[derive(Debug, Clone, Default)]
pub struct RetrievedDocument {
    pub content: String,
    pub score: f32,
    pub metadata: ReviewMetadata,
}

/// A validated reader comment on a review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub content: String,
}

/// Canonical per-book record derived from raw retrieved metadata.
///
/// Invariant: `title` and `author` are both non-empty; records failing
/// that are dropped during normalization, never constructed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NormalizedBook {
    pub title: String,
    pub author: String,
    pub grade: String,
    pub sensuality: String,
    pub book_types: Vec<String>,
    pub asin: String,
    pub review_url: String,
    pub post_id: String,
    pub featured_image: String,
    pub reviewer_name: String,
    pub publish_date: String,
    pub comments: Vec<Comment>,
}

impl NormalizedBook {
    /// Dedup key for the normalized book map.
    pub fn key(&self) -> String {
        format!("{}-{}", self.title, self.author)
    }
}

/// The result of running a streamed assistant message through the
/// client-side parser: extracted book cards plus the remaining prose.
#[derive(Debug, Clone, Default)]
pub struct ProcessedContent {
    pub books: Vec<NormalizedBook>,
    pub content: String,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_types_accepts_array() {
        let meta: ReviewMetadata =
            serde_json::from_str(r#"{"bookTypes": [" Contemporary ", "", "Historical"]}"#)
                .unwrap();
        assert_eq!(meta.book_types, vec!["Contemporary", "Historical"]);
    }

    #[test]
    fn test_book_types_accepts_bare_string() {
        let meta: ReviewMetadata =
            serde_json::from_str(r#"{"bookTypes": " Romantic Suspense "}"#).unwrap();
        assert_eq!(meta.book_types, vec!["Romantic Suspense"]);
    }

    #[test]
    fn test_book_types_defaults_empty() {
        let meta: ReviewMetadata = serde_json::from_str("{}").unwrap();
        assert!(meta.book_types.is_empty());
        assert!(meta.book_title.is_none());
    }

    #[test]
    fn test_message_roles_roundtrip() {
        let msg = Message::user("hello");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""role":"user""#));
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.role, Role::User);
    }

    #[test]
    fn test_message_id_defaulted_when_absent() {
        let msg: Message =
            serde_json::from_str(r#"{"role": "user", "content": "hi"}"#).unwrap();
        assert!(!msg.id.is_empty());
    }
}
