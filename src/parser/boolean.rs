//! Yes/no response mapping.

use std::collections::HashSet;

use super::{DeclineKeywords, ParseError, Parser};

/// Maps a trimmed, case-folded response to a boolean through configurable
/// truthy and falsy sets.
#[derive(Debug, Clone)]
pub struct BooleanParser {
    truthy: HashSet<String>,
    falsy: HashSet<String>,
    decline_keywords: DeclineKeywords,
}

impl Default for BooleanParser {
    fn default() -> Self {
        Self {
            truthy: ["yes", "true", "1", "y"].map(String::from).into(),
            falsy: ["no", "false", "0", "n"].map(String::from).into(),
            decline_keywords: DeclineKeywords::default(),
        }
    }
}

impl BooleanParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sets<I, J, S>(truthy: I, falsy: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            truthy: truthy.into_iter().map(|s| s.into().to_lowercase()).collect(),
            falsy: falsy.into_iter().map(|s| s.into().to_lowercase()).collect(),
            decline_keywords: DeclineKeywords::default(),
        }
    }

    pub fn with_decline_keywords(mut self, keywords: DeclineKeywords) -> Self {
        self.decline_keywords = keywords;
        self
    }
}

impl Parser<bool> for BooleanParser {
    fn decline_keywords(&self) -> &DeclineKeywords {
        &self.decline_keywords
    }

    fn parse_value(&self, response: &str) -> Result<bool, ParseError> {
        let normalised = response.trim().to_lowercase();
        if self.truthy.contains(&normalised) {
            return Ok(true);
        }
        if self.falsy.contains(&normalised) {
            return Ok(false);
        }
        Err(ParseError::new(response, "not a recognisable boolean"))
    }
}
