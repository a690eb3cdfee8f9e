//! Robust consensus for continuous values.

use std::cmp::Ordering;

use super::Estimator;

/// Consensus estimation for continuous numerical values.
///
/// The point estimate is the median; confidence is `1 / (1 + r)` where
/// `r = 1.4826 * MAD / |median|` is the robust coefficient of variation.
/// The 1.4826 factor scales MAD to the standard deviation of a Gaussian.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericalEstimator;

impl NumericalEstimator {
    pub fn new() -> Self {
        Self
    }
}

impl Estimator<f64> for NumericalEstimator {
    fn estimate(&self, samples: &[f64]) -> f64 {
        assert!(!samples.is_empty(), "estimate requires at least one sample");
        median(samples.to_vec())
    }

    fn confidence(&self, samples: &[f64], estimate: &f64) -> f64 {
        if samples.len() < 2 {
            return 0.0;
        }
        if samples.iter().all(|s| *s == 0.0) {
            return 1.0;
        }
        // Zero median with non-zero samples: spread dwarfs magnitude.
        if *estimate == 0.0 {
            return 0.0;
        }

        let robust_cv = 1.4826 * mad(samples, *estimate) / estimate.abs();
        1.0 / (1.0 + robust_cv)
    }
}

/// Median with the even-length tie broken by the mean of the two central
/// order statistics.
pub(crate) fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        0.5 * (values[n / 2 - 1] + values[n / 2])
    }
}

/// Median absolute deviation around a given center.
pub(crate) fn mad(values: &[f64], center: f64) -> f64 {
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median(deviations)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn median_odd_and_even() {
        let est = NumericalEstimator::new();
        assert!((est.estimate(&[3.0, 1.0, 2.0]) - 2.0).abs() < EPS);
        assert!((est.estimate(&[4.0, 1.0, 2.0, 3.0]) - 2.5).abs() < EPS);
        assert!((est.estimate(&[7.0]) - 7.0).abs() < EPS);
    }

    #[test]
    fn outlier_does_not_drag_the_estimate() {
        let est = NumericalEstimator::new();
        let samples = [31.0, 31.0, 29.0, 31.0, 280.0, 30.0, 31.0, 32.0, 31.0, 30.0];
        let value = est.estimate(&samples);
        assert!((value - 31.0).abs() < EPS);
        // Specifically not the arithmetic mean.
        let mean: f64 = samples.iter().sum::<f64>() / samples.len() as f64;
        assert!((mean - 80.6).abs() < 1e-6);
        assert!((value - mean).abs() > 10.0);
    }

    #[test]
    fn confidence_stays_high_despite_one_outlier() {
        let est = NumericalEstimator::new();
        let samples = [31.0, 31.0, 29.0, 31.0, 280.0, 30.0, 31.0, 32.0, 31.0, 30.0];
        let value = est.estimate(&samples);
        let confidence = est.confidence(&samples, &value);
        // MAD of the deviations is 0.5, so r = 1.4826 * 0.5 / 31.
        assert!(confidence > 0.97);
        assert!(confidence <= 1.0);
    }

    #[test]
    fn single_outlier_moves_median_within_original_range() {
        let est = NumericalEstimator::new();
        let original = [29.0, 30.0, 31.0];
        let before = est.estimate(&original);
        let with_outlier = [29.0, 30.0, 31.0, 1e9];
        let after = est.estimate(&with_outlier);
        let range = 31.0 - 29.0;
        assert!((after - before).abs() <= range + EPS);
    }

    #[test]
    fn confidence_edge_cases() {
        let est = NumericalEstimator::new();
        assert_eq!(est.confidence(&[5.0], &5.0), 0.0);
        assert_eq!(est.confidence(&[0.0, 0.0, 0.0], &0.0), 1.0);
        assert_eq!(est.confidence(&[-1.0, 0.0, 1.0], &0.0), 0.0);
    }

    #[test]
    fn identical_samples_give_full_confidence() {
        let est = NumericalEstimator::new();
        let samples = [31.0, 31.0, 31.0, 31.0];
        let value = est.estimate(&samples);
        assert!((est.confidence(&samples, &value) - 1.0).abs() < EPS);
    }
}
