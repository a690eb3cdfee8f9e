//! Parsers map raw oracle responses to typed values.
//!
//! Every parser runs decline detection before its type-specific grammar: a
//! response containing a decline keyword is a decline even when the rest of
//! it would parse. The keyword set is parser-scoped so different question
//! types may widen it.

pub mod boolean;
pub mod float;
pub mod literal;
pub mod optional_bounded;

pub use boolean::BooleanParser;
pub use float::FloatParser;
pub use literal::LiteralParser;
pub use optional_bounded::OptionalBoundedIntParser;

/// Decline keywords matched against every response before parsing.
///
/// Matching is case-insensitive substring over the trimmed response, so
/// "I don't know, UNKNOWN" is still a decline.
#[derive(Debug, Clone)]
pub struct DeclineKeywords {
    keywords: Vec<String>,
}

impl Default for DeclineKeywords {
    fn default() -> Self {
        Self::new(["UNKNOWN", "INSUFFICIENT_DATA"])
    }
}

impl DeclineKeywords {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.into().to_uppercase())
                .collect(),
        }
    }

    pub fn matches(&self, response: &str) -> bool {
        let normalised = response.trim().to_uppercase();
        self.keywords.iter().any(|k| normalised.contains(k))
    }
}

/// Outcome of running a parser against one oracle response.
#[derive(Debug, Clone)]
pub enum ParseOutcome<T> {
    /// The response parsed to a typed value.
    Value(T),
    /// The oracle refused to answer.
    Declined,
    /// The response was neither a decline nor parseable.
    Failed(ParseError),
}

/// A response the parser could not interpret. Recorded on the question's
/// state, never propagated out of the engine.
#[derive(Debug, Clone, thiserror::Error)]
#[error("could not parse response {response:?}: {reason}")]
pub struct ParseError {
    pub response: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(response: &str, reason: impl Into<String>) -> Self {
        Self {
            response: response.to_string(),
            reason: reason.into(),
        }
    }
}

/// Converts a raw response string into a typed value, a decline, or a parse
/// failure.
pub trait Parser<T>: Send + Sync {
    /// The decline keyword set consulted before type-specific parsing.
    fn decline_keywords(&self) -> &DeclineKeywords;

    /// Type-specific grammar, applied only to non-decline responses.
    fn parse_value(&self, response: &str) -> Result<T, ParseError>;

    /// Full parse: decline detection first, then the grammar.
    fn parse(&self, response: &str) -> ParseOutcome<T> {
        if self.decline_keywords().matches(response) {
            return ParseOutcome::Declined;
        }
        match self.parse_value(response) {
            Ok(value) => ParseOutcome::Value(value),
            Err(err) => ParseOutcome::Failed(err),
        }
    }
}
