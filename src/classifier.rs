//! Query intent classification.
//!
//! The label controls how wide retrieval casts its net and how many
//! books one answer may present. Pure keyword matching: deterministic,
//! no external calls, first matching label in a fixed priority order
//! wins.

/// Intent label for the user's latest message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Recommendation,
    LatestReviews,
    ReaderFeedback,
    BookAnalysis,
    TrendAnalysis,
    General,
}

const RECOMMENDATION_KEYWORDS: &[&str] = &[
    "recommend",
    "suggestion",
    "suggest",
    "similar to",
    "like this",
    "books like",
    "what should i read",
    "looking for",
];

const LATEST_KEYWORDS: &[&str] = &[
    "latest",
    "newest",
    "recent",
    "new review",
    "just reviewed",
    "this month",
    "this week",
];

const FEEDBACK_KEYWORDS: &[&str] = &[
    "comment",
    "reader",
    "what did people",
    "what do people",
    "reaction",
    "discussion",
];

const ANALYSIS_KEYWORDS: &[&str] = &[
    "analyze",
    "analysis",
    "compare",
    "difference between",
    "why did",
    "what grade",
    "how was",
];

const TREND_KEYWORDS: &[&str] = &[
    "trend",
    "popular",
    "most reviewed",
    "best rated",
    "highest grade",
    "top books",
    "over time",
];

impl QueryType {
    /// How many documents to pull from the index for this intent.
    /// Trend and recommendation queries need breadth; feedback queries
    /// are usually about one book. Always within 1..=10.
    pub fn retrieval_limit(self) -> usize {
        match self {
            Self::TrendAnalysis => 10,
            Self::Recommendation => 8,
            Self::LatestReviews => 6,
            Self::BookAnalysis => 5,
            Self::ReaderFeedback | Self::General => 4,
        }
    }

    /// Cap on the number of books a single response should present.
    pub fn max_books(self) -> usize {
        match self {
            Self::TrendAnalysis => 8,
            Self::Recommendation => 5,
            Self::LatestReviews => 5,
            Self::BookAnalysis => 2,
            Self::ReaderFeedback => 1,
            Self::General => 3,
        }
    }
}

/// Classify the latest user message into exactly one intent.
///
/// Priority: recommendation > latest reviews > reader feedback >
/// book analysis > trend analysis > general fallback.
pub fn classify(message: &str) -> QueryType {
    let text = message.to_lowercase();

    let matches_any = |keywords: &[&str]| keywords.iter().any(|k| text.contains(k));

    if matches_any(RECOMMENDATION_KEYWORDS) {
        QueryType::Recommendation
    } else if matches_any(LATEST_KEYWORDS) {
        QueryType::LatestReviews
    } else if matches_any(FEEDBACK_KEYWORDS) {
        QueryType::ReaderFeedback
    } else if matches_any(ANALYSIS_KEYWORDS) {
        QueryType::BookAnalysis
    } else if matches_any(TREND_KEYWORDS) {
        QueryType::TrendAnalysis
    } else {
        QueryType::General
    }
}
