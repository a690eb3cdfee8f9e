//! Decimal number extraction with optional unit conversion.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{DeclineKeywords, ParseError, Parser};

/// First decimal number (optional sign, optional decimal point), plus an
/// optional alphabetic unit token immediately after it.
static NUMBER_WITH_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([-+]?(?:\d+(?:\.\d+)?|\.\d+))\s*([A-Za-z]+)?").expect("valid number regex")
});

/// Extracts the first decimal number from a response.
///
/// With a unit table declared, a unit token after the number is looked up
/// and the value multiplied; an unknown token is a parse failure. Without a
/// table, trailing tokens are ignored.
#[derive(Debug, Clone, Default)]
pub struct FloatParser {
    units: Option<HashMap<String, f64>>,
    decline_keywords: DeclineKeywords,
}

impl FloatParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the accepted unit tokens and their multipliers. Lookup is
    /// case-insensitive.
    pub fn with_units<I, S>(mut self, units: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        self.units = Some(
            units
                .into_iter()
                .map(|(unit, multiplier)| (unit.into().to_lowercase(), multiplier))
                .collect(),
        );
        self
    }

    pub fn with_decline_keywords(mut self, keywords: DeclineKeywords) -> Self {
        self.decline_keywords = keywords;
        self
    }
}

impl Parser<f64> for FloatParser {
    fn decline_keywords(&self) -> &DeclineKeywords {
        &self.decline_keywords
    }

    fn parse_value(&self, response: &str) -> Result<f64, ParseError> {
        let captures = NUMBER_WITH_UNIT
            .captures(response)
            .ok_or_else(|| ParseError::new(response, "no decimal number found"))?;

        let number = captures
            .get(1)
            .expect("capture 1 is non-optional in the number regex")
            .as_str();
        let value: f64 = number
            .parse()
            .map_err(|_| ParseError::new(response, format!("not a number: {number:?}")))?;
        if !value.is_finite() {
            return Err(ParseError::new(response, "number out of range"));
        }

        let unit = captures.get(2).map(|m| m.as_str().to_lowercase());
        match (&self.units, unit) {
            (Some(table), Some(unit)) => match table.get(&unit) {
                Some(multiplier) => Ok(value * multiplier),
                None => Err(ParseError::new(response, format!("unknown unit {unit:?}"))),
            },
            // No table declared: trailing tokens carry no meaning.
            _ => Ok(value),
        }
    }
}
