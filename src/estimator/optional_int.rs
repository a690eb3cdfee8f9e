//! Consensus for integers that may not apply at all.

use super::numerical::{mad, median};
use super::Estimator;

/// Consensus estimation for optional integer values.
///
/// When the `None` answers outnumber the numeric ones the estimate is
/// `None`; otherwise it is the median of the numeric samples, rounded to
/// the nearest integer (ties to even). Confidence combines how settled the
/// applicability question is with how settled the numeric value is.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptionalIntEstimator;

impl OptionalIntEstimator {
    pub fn new() -> Self {
        Self
    }
}

impl Estimator<Option<i64>> for OptionalIntEstimator {
    fn estimate(&self, samples: &[Option<i64>]) -> Option<i64> {
        let numeric: Vec<f64> = samples.iter().flatten().map(|v| *v as f64).collect();
        let none_count = samples.len() - numeric.len();

        if numeric.is_empty() || none_count > numeric.len() {
            return None;
        }
        Some(median(numeric).round_ties_even() as i64)
    }

    fn confidence(&self, samples: &[Option<i64>], estimate: &Option<i64>) -> f64 {
        if samples.len() < 2 {
            return 0.0;
        }

        let numeric: Vec<i64> = samples.iter().flatten().copied().collect();
        let none_count = samples.len() - numeric.len();

        let Some(value) = estimate else {
            // Agreement on "does not apply", normalised against the binary
            // baseline.
            let agreement = none_count as f64 / samples.len() as f64;
            return ((agreement - 0.5) / 0.5).max(0.0);
        };

        if numeric.len() < 2 {
            return 0.0;
        }

        let applicability = numeric.len() as f64 / samples.len() as f64;
        let applicability_confidence = ((applicability - 0.5) / 0.5).max(0.0);

        let value_confidence = if *value == 0 {
            if numeric.iter().any(|s| *s != 0) {
                0.0
            } else {
                1.0
            }
        } else if numeric.iter().all(|s| s == value) {
            1.0
        } else {
            let center = *value as f64;
            let values: Vec<f64> = numeric.iter().map(|s| *s as f64).collect();
            let robust_cv = 1.4826 * mad(&values, center) / center.abs();
            1.0 / (1.0 + robust_cv)
        };

        applicability_confidence * value_confidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn majority_none_estimates_none() {
        let est = OptionalIntEstimator::new();
        assert_eq!(est.estimate(&[None, None, Some(3)]), None);
        assert_eq!(est.estimate(&[None, None]), None);
    }

    #[test]
    fn ties_between_none_and_numeric_go_numeric() {
        let est = OptionalIntEstimator::new();
        assert_eq!(est.estimate(&[None, Some(3)]), Some(3));
        assert_eq!(est.estimate(&[None, None, Some(3), Some(5)]), Some(4));
    }

    #[test]
    fn numeric_estimate_is_the_rounded_median() {
        let est = OptionalIntEstimator::new();
        assert_eq!(est.estimate(&[Some(3), Some(4), Some(5)]), Some(4));
        // Even-length median 2.5 rounds to the even neighbour.
        assert_eq!(est.estimate(&[Some(2), Some(3)]), Some(2));
        assert_eq!(est.estimate(&[Some(55), Some(55), Some(56), Some(57)]), Some(56));
    }

    #[test]
    fn fewer_than_two_samples_give_no_confidence() {
        let est = OptionalIntEstimator::new();
        assert_eq!(est.confidence(&[Some(5)], &Some(5)), 0.0);
        assert_eq!(est.confidence(&[None], &None), 0.0);
    }

    #[test]
    fn none_confidence_is_normalised_none_agreement() {
        let est = OptionalIntEstimator::new();
        let samples = [None, None, None, Some(1)];
        let confidence = est.confidence(&samples, &None);
        assert!((confidence - 0.5).abs() < EPS);

        // An even split carries no information either way.
        assert_eq!(est.confidence(&[None, Some(1)], &None), 0.0);
    }

    #[test]
    fn unanimous_numeric_samples_give_full_confidence() {
        let est = OptionalIntEstimator::new();
        let samples = [Some(5), Some(5), Some(5), Some(5)];
        assert!((est.confidence(&samples, &Some(5)) - 1.0).abs() < EPS);
    }

    #[test]
    fn none_answers_dilute_numeric_confidence() {
        let est = OptionalIntEstimator::new();
        let samples = [Some(5), Some(5), Some(5), None];
        // Applicability 0.75 normalises to 0.5; the value itself is settled.
        assert!((est.confidence(&samples, &Some(5)) - 0.5).abs() < EPS);
    }

    #[test]
    fn zero_estimate_with_disagreeing_samples_has_no_confidence() {
        let est = OptionalIntEstimator::new();
        let samples = [Some(0), Some(0), Some(1)];
        assert_eq!(est.estimate(&samples), Some(0));
        assert_eq!(est.confidence(&samples, &Some(0)), 0.0);

        let all_zero = [Some(0), Some(0), Some(0)];
        assert!((est.confidence(&all_zero, &Some(0)) - 1.0).abs() < EPS);
    }

    #[test]
    fn spread_numeric_samples_use_the_robust_ratio() {
        let est = OptionalIntEstimator::new();
        let samples = [Some(10), Some(12), Some(14)];
        assert_eq!(est.estimate(&samples), Some(12));
        // MAD around 12 is 2: 1 / (1 + 1.4826 * 2 / 12).
        let expected = 1.0 / (1.0 + 1.4826 * 2.0 / 12.0);
        assert!((est.confidence(&samples, &Some(12)) - expected).abs() < EPS);
    }
}
