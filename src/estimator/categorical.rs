//! Consensus for values drawn from a known finite set.

use super::Estimator;
use crate::state::SampleValue;

/// Consensus estimation for categorical values.
///
/// The point estimate is the mode (ties broken by first appearance among
/// the samples); confidence is agreement normalised against random guessing
/// over the `n` valid options: `(p - 1/n) / (1 - 1/n)`.
#[derive(Debug, Clone)]
pub struct CategoricalEstimator<T> {
    options: Vec<T>,
}

impl<T: SampleValue> CategoricalEstimator<T> {
    pub fn new<I>(options: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self {
            options: options.into_iter().collect(),
        }
    }

    pub fn option_count(&self) -> usize {
        self.options.len()
    }
}

impl<T: SampleValue> Estimator<T> for CategoricalEstimator<T> {
    fn estimate(&self, samples: &[T]) -> T {
        let mut best: Option<(usize, &T)> = None;
        for (index, candidate) in samples.iter().enumerate() {
            // Count from the first occurrence only, so ties resolve to the
            // earliest-seen value.
            if samples[..index].contains(candidate) {
                continue;
            }
            let count = samples.iter().filter(|s| *s == candidate).count();
            match best {
                Some((best_count, _)) if best_count >= count => {}
                _ => best = Some((count, candidate)),
            }
        }
        best.expect("estimate requires at least one sample").1.clone()
    }

    fn confidence(&self, samples: &[T], estimate: &T) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let n = self.options.len();
        if n <= 1 {
            return 1.0;
        }

        let agreement =
            samples.iter().filter(|s| *s == estimate).count() as f64 / samples.len() as f64;
        let baseline = 1.0 / n as f64;
        ((agreement - baseline) / (1.0 - baseline)).clamp(0.0, 1.0)
    }
}
