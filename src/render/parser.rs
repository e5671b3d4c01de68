//! Incremental parser for streamed assistant output.
//!
//! The generation backend embeds zero or more `<book-data>` JSON blocks
//! inside free prose. The client re-runs this parser over the full
//! buffer on every snapshot, so it has to tolerate half-arrived blocks:
//! until a closing delimiter shows up, the message is "not ready" and
//! nothing is rendered. Partial JSON must never reach the user.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::NormalizedBook;
use crate::models::ProcessedContent;
use crate::render::markdown;

/// Optional prefix contract: everything before and including the first
/// marker is leading chatter and gets discarded.
pub const RESPONSE_MARKER: &str = "---RESPONSE-START---";

const BLOCK_OPEN: &str = "<book-data>";
const BLOCK_CLOSE: &str = "</book-data>";

static BOOK_DATA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<book-data>\s*(.*?)\s*</book-data>").unwrap());

static EXCESS_NEWLINES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Extraction result before markup conversion: book records plus the
/// prose with all matched blocks removed.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub books: Vec<NormalizedBook>,
    pub prose: String,
}

/// Run the full parse over the current buffer. `None` means the buffer
/// is mid-block and nothing should be rendered yet.
pub fn process(raw: &str) -> Option<ProcessedContent> {
    // The parser must never take the whole message down; anything
    // unexpected degrades to the raw text.
    let result = std::panic::catch_unwind(|| {
        extract(raw).map(|extraction| ProcessedContent {
            content: markdown::to_html(&extraction.prose),
            books: extraction.books,
            error: None,
        })
    });
    match result {
        Ok(processed) => processed,
        Err(_) => Some(ProcessedContent {
            books: Vec::new(),
            content: raw.to_string(),
            error: Some("processing failed".to_string()),
        }),
    }
}

/// Extract book blocks and cleaned prose without markup conversion.
/// Used by terminal clients that render plain text.
pub fn extract(raw: &str) -> Option<Extraction> {
    let text = strip_marker(raw);

    if !is_ready(text) {
        return None;
    }

    let mut books = Vec::new();
    let cleaned = BOOK_DATA_RE.replace_all(text, |caps: &regex::Captures<'_>| {
        if let Some(parsed) = parse_block(&caps[1]) {
            books.extend(parsed);
        }
        // Malformed blocks are dropped from the prose either way; the
        // surrounding text still renders.
        ""
    });

    let safe = hold_back_partial(cleaned.as_ref());
    let prose = EXCESS_NEWLINES_RE
        .replace_all(safe, "\n\n")
        .trim()
        .to_string();

    Some(Extraction { books, prose })
}

/// Truncate the prose at any still-arriving block tail. Complete blocks
/// are already removed, so a remaining opener is unmatched by
/// construction; the opener tag itself and a bare JSON object can also
/// be cut mid-stream, so both tail shapes are held back too.
fn hold_back_partial(text: &str) -> &str {
    if let Some(pos) = text.find(BLOCK_OPEN) {
        return &text[..pos];
    }

    let trimmed = text.trim_end();

    // Opener tag arriving character by character.
    for len in (1..BLOCK_OPEN.len()).rev() {
        if trimmed.ends_with(&BLOCK_OPEN[..len]) {
            return &trimmed[..trimmed.len() - len];
        }
    }

    // Final line opening a bare JSON object.
    if let Some(pos) = trimmed.rfind('\n') {
        if trimmed[pos + 1..].trim_start().starts_with('{') {
            return &trimmed[..pos];
        }
    }

    text
}

/// Drop everything up to and including the first marker occurrence.
fn strip_marker(raw: &str) -> &str {
    match raw.find(RESPONSE_MARKER) {
        Some(pos) => &raw[pos + RESPONSE_MARKER.len()..],
        None => raw,
    }
}

/// Streaming-UX guard: a buffer that opens with raw JSON or an unclosed
/// book-data tag is still arriving. Rendering it would flash structured
/// payload at the user.
fn is_ready(text: &str) -> bool {
    let trimmed = text.trim_start();
    let opens_structured = trimmed.starts_with('{') || trimmed.starts_with(BLOCK_OPEN);
    !(opens_structured && !text.contains(BLOCK_CLOSE))
}

/// Parse one block payload into validated book records. Returns `None`
/// when the JSON is beyond repair; the block is skipped, not fatal.
fn parse_block(payload: &str) -> Option<Vec<NormalizedBook>> {
    let repaired = repair_braces(payload);
    let value: serde_json::Value = serde_json::from_str(&repaired).ok()?;
    let entries = value.get("books")?.as_array()?;

    let books = entries
        .iter()
        .filter_map(|entry| {
            // Unrecognized fields are ignored, missing ones default to
            // empty; entries without both title and author are invalid.
            let mut book: NormalizedBook = serde_json::from_value(entry.clone()).ok()?;
            book.title = book.title.trim().to_string();
            book.author = book.author.trim().to_string();
            if book.title.is_empty() || book.author.is_empty() {
                return None;
            }
            Some(book)
        })
        .collect();

    Some(books)
}

/// The prompt escapes literal braces by doubling them; a buggy backend
/// occasionally leaks that doubling into its output. Collapse it before
/// parsing.
fn repair_braces(payload: &str) -> String {
    payload.replace("{{", "{").replace("}}", "}")
}
