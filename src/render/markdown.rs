//! Constrained markdown-to-HTML conversion for assistant prose.
//!
//! Supports exactly what the prompt instructs the model to emit:
//! headers levels 1-3, bold, italic, bullet lines, blockquote lines,
//! and link syntax. Pure text-to-text. Single-pass: safe to re-run on
//! the same raw source, NOT on its own output.

use once_cell::sync::Lazy;
use regex::Regex;

static BOLD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static ITALIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*]+)\*").unwrap());
static LINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").unwrap());

/// Convert one message's prose to presentational markup.
pub fn to_html(text: &str) -> String {
    let mut out = String::new();
    let mut in_list = false;

    for line in text.lines() {
        let line = line.trim_end();
        let trimmed = line.trim_start();

        let is_bullet = trimmed.starts_with("• ")
            || trimmed.starts_with("- ")
            || trimmed.starts_with("* ");

        if in_list && !is_bullet {
            out.push_str("</ul>\n");
            in_list = false;
        }

        if trimmed.is_empty() {
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("### ") {
            out.push_str(&format!("<h3>{}</h3>\n", inline(rest)));
        } else if let Some(rest) = trimmed.strip_prefix("## ") {
            out.push_str(&format!("<h2>{}</h2>\n", inline(rest)));
        } else if let Some(rest) = trimmed.strip_prefix("# ") {
            out.push_str(&format!("<h1>{}</h1>\n", inline(rest)));
        } else if is_bullet {
            if !in_list {
                out.push_str("<ul>\n");
                in_list = true;
            }
            let rest = trimmed
                .trim_start_matches("• ")
                .trim_start_matches("- ")
                .trim_start_matches("* ");
            out.push_str(&format!("<li>{}</li>\n", inline(rest)));
        } else if let Some(rest) = trimmed.strip_prefix("> ") {
            out.push_str(&format!("<blockquote>{}</blockquote>\n", inline(rest)));
        } else {
            out.push_str(&format!("<p>{}</p>\n", inline(trimmed)));
        }
    }

    if in_list {
        out.push_str("</ul>\n");
    }

    out.trim_end().to_string()
}

/// Inline conversion: escape, then links, bold, italic. Italic runs
/// last so `**` pairs are already consumed.
fn inline(text: &str) -> String {
    let escaped = escape(text);
    let linked = LINK_RE.replace_all(&escaped, r#"<a href="$2">$1</a>"#);
    let bolded = BOLD_RE.replace_all(&linked, "<strong>$1</strong>");
    ITALIC_RE.replace_all(&bolded, "<em>$1</em>").to_string()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
