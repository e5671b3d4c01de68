//! Client-side rendering: structured-block extraction from streamed
//! text plus constrained markdown conversion.
//!
//! All the fragility of pattern-matching over free-text model output is
//! isolated here; anything unexpected degrades to raw text instead of
//! cascading.

pub mod markdown;
pub mod parser;

pub use parser::process;
pub use parser::Extraction;
pub use parser::RESPONSE_MARKER;
