//! Closed-set option matching.

use std::collections::HashMap;
use std::fmt;

use super::{DeclineKeywords, ParseError, Parser};

/// Accepts only the string form of one of a known set of options and
/// returns the canonical option value.
///
/// Matching is case-insensitive unless configured otherwise.
#[derive(Debug, Clone)]
pub struct LiteralParser<T> {
    lookup: HashMap<String, T>,
    options_label: String,
    case_sensitive: bool,
    decline_keywords: DeclineKeywords,
}

impl<T> LiteralParser<T>
where
    T: ToString + Clone + Send + Sync,
{
    pub fn new<I>(options: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self::with_case_sensitivity(options, false)
    }

    pub fn case_sensitive<I>(options: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self::with_case_sensitivity(options, true)
    }

    fn with_case_sensitivity<I>(options: I, case_sensitive: bool) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let mut lookup = HashMap::new();
        let mut labels = Vec::new();
        for option in options {
            let form = option.to_string();
            labels.push(form.clone());
            let key = if case_sensitive {
                form
            } else {
                form.to_lowercase()
            };
            lookup.insert(key, option);
        }
        Self {
            lookup,
            options_label: labels.join(", "),
            case_sensitive,
            decline_keywords: DeclineKeywords::default(),
        }
    }

    pub fn with_decline_keywords(mut self, keywords: DeclineKeywords) -> Self {
        self.decline_keywords = keywords;
        self
    }
}

impl<T> Parser<T> for LiteralParser<T>
where
    T: ToString + Clone + fmt::Debug + Send + Sync,
{
    fn decline_keywords(&self) -> &DeclineKeywords {
        &self.decline_keywords
    }

    fn parse_value(&self, response: &str) -> Result<T, ParseError> {
        let trimmed = response.trim();
        let key = if self.case_sensitive {
            trimmed.to_string()
        } else {
            trimmed.to_lowercase()
        };
        self.lookup.get(&key).cloned().ok_or_else(|| {
            ParseError::new(
                response,
                format!("not one of the expected options: {}", self.options_label),
            )
        })
    }
}
