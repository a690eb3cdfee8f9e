//! Bounded integer extraction with an explicit not-applicable form.

use super::{DeclineKeywords, ParseError, Parser};

/// Parses an integer within inclusive bounds, or `None` for a "none"
/// response.
///
/// Some fields apply to one subject and not another (a glycemic index for
/// bread but not for salt); the "none" form lets the oracle say so without
/// declining outright, so it counts as a sample rather than a refusal.
#[derive(Debug, Clone)]
pub struct OptionalBoundedIntParser {
    min_value: i64,
    max_value: i64,
    decline_keywords: DeclineKeywords,
}

impl OptionalBoundedIntParser {
    pub fn new(min_value: i64, max_value: i64) -> Self {
        Self {
            min_value,
            max_value,
            decline_keywords: DeclineKeywords::default(),
        }
    }

    pub fn with_decline_keywords(mut self, keywords: DeclineKeywords) -> Self {
        self.decline_keywords = keywords;
        self
    }
}

impl Parser<Option<i64>> for OptionalBoundedIntParser {
    fn decline_keywords(&self) -> &DeclineKeywords {
        &self.decline_keywords
    }

    fn parse_value(&self, response: &str) -> Result<Option<i64>, ParseError> {
        let normalised = response.trim().to_lowercase();
        if normalised == "none" {
            return Ok(None);
        }

        let value: i64 = normalised
            .parse()
            .map_err(|_| ParseError::new(response, "not an integer"))?;
        if value < self.min_value || value > self.max_value {
            return Err(ParseError::new(
                response,
                format!(
                    "integer {value} outside [{}, {}]",
                    self.min_value, self.max_value
                ),
            ));
        }
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::super::ParseOutcome;
    use super::*;

    fn value(parser: &OptionalBoundedIntParser, response: &str) -> Option<i64> {
        match parser.parse(response) {
            ParseOutcome::Value(v) => v,
            other => panic!("expected value for {response:?}, got {other:?}"),
        }
    }

    #[test]
    fn none_in_any_casing_is_a_sample_not_a_decline() {
        let parser = OptionalBoundedIntParser::new(0, 100);
        assert_eq!(value(&parser, "none"), None);
        assert_eq!(value(&parser, " None "), None);
        assert_eq!(value(&parser, "NONE"), None);
    }

    #[test]
    fn integers_within_bounds_parse() {
        let parser = OptionalBoundedIntParser::new(0, 100);
        assert_eq!(value(&parser, "55"), Some(55));
        assert_eq!(value(&parser, " 0 "), Some(0));
        assert_eq!(value(&parser, "100"), Some(100));

        let signed = OptionalBoundedIntParser::new(-10, 10);
        assert_eq!(value(&signed, "-3"), Some(-3));
    }

    #[test]
    fn out_of_bounds_integers_fail() {
        let parser = OptionalBoundedIntParser::new(0, 100);
        assert!(matches!(parser.parse("-1"), ParseOutcome::Failed(_)));
        assert!(matches!(parser.parse("101"), ParseOutcome::Failed(_)));
    }

    #[test]
    fn non_integers_fail() {
        let parser = OptionalBoundedIntParser::new(0, 100);
        assert!(matches!(parser.parse("3.5"), ParseOutcome::Failed(_)));
        assert!(matches!(parser.parse("fifty"), ParseOutcome::Failed(_)));
        assert!(matches!(parser.parse(""), ParseOutcome::Failed(_)));
    }

    #[test]
    fn declines_still_take_precedence() {
        let parser = OptionalBoundedIntParser::new(0, 100);
        assert!(matches!(parser.parse("UNKNOWN"), ParseOutcome::Declined));
        assert!(matches!(
            parser.parse("unknown, maybe 55"),
            ParseOutcome::Declined
        ));
    }
}
