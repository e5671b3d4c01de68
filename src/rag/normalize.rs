//! Metadata normalization: raw index metadata → canonical book records.
//!
//! The vector index carries whatever shape the ingestion pipeline of the
//! day produced. This module is the single place that untangles it; no
//! raw `ReviewMetadata` escapes past here.

use std::collections::BTreeMap;

use tracing::debug;

use crate::models::Comment;
use crate::models::NormalizedBook;
use crate::models::RetrievedDocument;

/// Normalize retrieved documents into a deduplicated book map keyed by
/// `"{title}-{author}"`.
///
/// Books missing a title or author are invalid and dropped. Books that
/// carry no grade, no sensuality rating, and no book types are dropped
/// too (see [`is_substantive`]); those are usually noise matches that
/// would invite the model to improvise details.
pub fn normalize(docs: &[RetrievedDocument]) -> BTreeMap<String, NormalizedBook> {
    let mut books = BTreeMap::new();

    for doc in docs {
        let Some(book) = normalize_one(doc) else {
            continue;
        };
        if !is_substantive(&book) {
            debug!("Dropping low-signal match: {}", book.key());
            continue;
        }
        books.entry(book.key()).or_insert(book);
    }

    books
}

fn normalize_one(doc: &RetrievedDocument) -> Option<NormalizedBook> {
    let meta = &doc.metadata;

    let title = trimmed(meta.book_title.as_deref())?;
    let author = trimmed(meta.author_name.as_deref())?;

    // Comment authors and contents arrive as parallel arrays; zip them
    // and keep only pairs where both halves are non-empty.
    let comments = meta
        .comment_contents
        .iter()
        .enumerate()
        .filter_map(|(idx, content)| {
            let author = meta.comment_authors.get(idx)?.trim();
            let content = content.trim();
            if author.is_empty() || content.is_empty() {
                return None;
            }
            Some(Comment {
                author: author.to_string(),
                content: content.to_string(),
            })
        })
        .collect();

    Some(NormalizedBook {
        title,
        author,
        grade: trimmed_or_empty(meta.grade.as_deref()),
        sensuality: trimmed_or_empty(meta.sensuality.as_deref()),
        book_types: meta
            .book_types
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        asin: trimmed_or_empty(meta.asin.as_deref()),
        review_url: trimmed_or_empty(meta.url.as_deref()),
        post_id: trimmed_or_empty(meta.post_id.as_deref()),
        featured_image: trimmed_or_empty(meta.featured_image.as_deref()),
        reviewer_name: trimmed_or_empty(meta.reviewer_name.as_deref()),
        publish_date: trimmed_or_empty(meta.publish_date.as_deref()),
        comments,
    })
}

/// Quality gate: besides title and author, a book must carry at least
/// one of grade, sensuality, or book types to be worth surfacing.
/// Tunable threshold, not a hard law.
pub fn is_substantive(book: &NormalizedBook) -> bool {
    !book.grade.is_empty() || !book.sensuality.is_empty() || !book.book_types.is_empty()
}

fn trimmed(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn trimmed_or_empty(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReviewMetadata;

    fn doc(meta: ReviewMetadata) -> RetrievedDocument {
        RetrievedDocument {
            content: String::new(),
            score: 0.9,
            metadata: meta,
        }
    }

    fn full_meta() -> ReviewMetadata {
        ReviewMetadata {
            book_title: Some(" Lord of Scoundrels ".to_string()),
            author_name: Some("Loretta Chase".to_string()),
            grade: Some("A+ ".to_string()),
            sensuality: Some("Warm".to_string()),
            book_types: vec!["European Historical Romance".to_string()],
            asin: Some("B00A2DK4YE".to_string()),
            url: Some("https://example.com/review".to_string()),
            comment_authors: vec!["Kay".to_string(), "  ".to_string()],
            comment_contents: vec!["A classic.".to_string(), "orphaned".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_fields_trimmed_and_defaulted() {
        let books = normalize(&[doc(full_meta())]);
        let book = books.values().next().unwrap();
        assert_eq!(book.title, "Lord of Scoundrels");
        assert_eq!(book.grade, "A+");
        assert_eq!(book.post_id, "");
    }

    #[test]
    fn test_missing_title_dropped() {
        let mut meta = full_meta();
        meta.book_title = Some("   ".to_string());
        assert!(normalize(&[doc(meta)]).is_empty());
    }

    #[test]
    fn test_missing_author_dropped() {
        let mut meta = full_meta();
        meta.author_name = None;
        assert!(normalize(&[doc(meta)]).is_empty());
    }

    #[test]
    fn test_low_signal_match_dropped() {
        let meta = ReviewMetadata {
            book_title: Some("Some Book".to_string()),
            author_name: Some("Some Author".to_string()),
            ..Default::default()
        };
        assert!(normalize(&[doc(meta)]).is_empty());
    }

    #[test]
    fn test_comment_with_empty_author_dropped() {
        let books = normalize(&[doc(full_meta())]);
        let book = books.values().next().unwrap();
        assert_eq!(book.comments.len(), 1);
        assert_eq!(book.comments[0].author, "Kay");
    }

    #[test]
    fn test_duplicate_title_author_deduplicated() {
        let books = normalize(&[doc(full_meta()), doc(full_meta())]);
        assert_eq!(books.len(), 1);
    }

    #[test]
    fn test_scenario_grade_preserved() {
        let mut meta = full_meta();
        meta.grade = Some("A-".to_string());
        let books = normalize(&[doc(meta)]);
        assert_eq!(books.len(), 1);
        assert_eq!(books.values().next().unwrap().grade, "A-");
    }
}
