//! Composable stopping rules for the sampling loop.
//!
//! A rule is a small tagged tree: five primitives plus `All`/`Any`
//! combinators, evaluated as a post-order fold over the question's current
//! state. `ConfidenceReached` consults the raw estimator confidence; the
//! decline penalty applies only at finalisation.

use crate::estimator::Estimator;
use crate::state::{SampleState, SampleValue};

// =============================================================================
// Defaults
// =============================================================================

pub const STANDARD_MIN_SAMPLES: usize = 5;
pub const STANDARD_CONFIDENCE: f64 = 0.90;
pub const STANDARD_MAX_QUERIES: usize = 20;
pub const STANDARD_MAX_CONSECUTIVE_DECLINES: usize = 5;

pub const CATEGORICAL_UNANIMOUS_AFTER: usize = 3;
pub const CATEGORICAL_MIN_SAMPLES: usize = 5;
pub const CATEGORICAL_CONFIDENCE: f64 = 0.85;
pub const CATEGORICAL_MAX_QUERIES: usize = 15;

pub const RELAXED_MIN_SAMPLES: usize = 4;
pub const RELAXED_CONFIDENCE: f64 = 0.75;
pub const RELAXED_MAX_QUERIES: usize = 12;
pub const RELAXED_MAX_CONSECUTIVE_DECLINES: usize = 4;

// =============================================================================
// Rule tree
// =============================================================================

/// Decides, from a question's state and estimator, whether sampling is done.
#[derive(Debug, Clone, PartialEq)]
pub enum StoppingRule {
    /// Stop only once at least `n` successful samples exist.
    MinSamples(usize),
    /// Stop after `n` total queries, counting declines and parse failures.
    MaxQueries(usize),
    /// Stop once the raw estimator confidence reaches the threshold.
    /// Requires at least two samples.
    ConfidenceReached(f64),
    /// Stop after `n` declines in a row.
    ConsecutiveDeclines(usize),
    /// Stop once at least `n` samples exist and all of them agree.
    UnanimousAgreement(usize),
    /// Stop only when every child wants to stop.
    All(Vec<StoppingRule>),
    /// Stop as soon as any child wants to stop.
    Any(Vec<StoppingRule>),
}

/// A rule that cannot be evaluated meaningfully. Surfaced eagerly when the
/// question bank is built.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuleError {
    #[error("combinator has no children")]
    EmptyCombinator,
    #[error("confidence threshold {0} is not within [0, 1]")]
    ThresholdOutOfRange(f64),
}

impl StoppingRule {
    /// Evaluate the tree against the current state.
    pub fn should_stop<T, E>(&self, state: &SampleState<T>, estimator: &E) -> bool
    where
        T: SampleValue,
        E: Estimator<T>,
    {
        match self {
            Self::MinSamples(n) => state.sample_count() >= *n,
            Self::MaxQueries(n) => state.query_count() >= *n,
            Self::ConfidenceReached(threshold) => {
                if state.sample_count() < 2 {
                    return false;
                }
                let estimate = estimator.estimate(&state.samples);
                estimator.confidence(&state.samples, &estimate) >= *threshold
            }
            Self::ConsecutiveDeclines(n) => state.consecutive_declines >= *n,
            Self::UnanimousAgreement(n) => {
                state.sample_count() >= *n
                    && state.samples.windows(2).all(|pair| pair[0] == pair[1])
            }
            Self::All(children) => children.iter().all(|c| c.should_stop(state, estimator)),
            Self::Any(children) => children.iter().any(|c| c.should_stop(state, estimator)),
        }
    }

    /// Conjunction: both rules must agree to stop. Flattens nested `All`.
    pub fn and(self, other: StoppingRule) -> StoppingRule {
        match self {
            Self::All(mut children) => {
                children.push(other);
                Self::All(children)
            }
            rule => Self::All(vec![rule, other]),
        }
    }

    /// Disjunction: either rule can trigger a stop. Flattens nested `Any`.
    pub fn or(self, other: StoppingRule) -> StoppingRule {
        match self {
            Self::Any(mut children) => {
                children.push(other);
                Self::Any(children)
            }
            rule => Self::Any(vec![rule, other]),
        }
    }

    /// The largest confidence threshold anywhere in the tree.
    pub fn confidence_threshold(&self) -> Option<f64> {
        match self {
            Self::ConfidenceReached(threshold) => Some(*threshold),
            Self::All(children) | Self::Any(children) => children
                .iter()
                .filter_map(StoppingRule::confidence_threshold)
                .fold(None, |acc, t| Some(acc.map_or(t, |a: f64| a.max(t)))),
            _ => None,
        }
    }

    /// The largest `MaxQueries` bound anywhere in the tree.
    pub fn query_budget(&self) -> Option<usize> {
        match self {
            Self::MaxQueries(n) => Some(*n),
            Self::All(children) | Self::Any(children) => children
                .iter()
                .filter_map(StoppingRule::query_budget)
                .max(),
            _ => None,
        }
    }

    /// Reject malformed compositions before any sampling starts.
    pub fn validate(&self) -> Result<(), RuleError> {
        match self {
            Self::ConfidenceReached(threshold) => {
                if !threshold.is_finite() || !(0.0..=1.0).contains(threshold) {
                    return Err(RuleError::ThresholdOutOfRange(*threshold));
                }
                Ok(())
            }
            Self::All(children) | Self::Any(children) => {
                if children.is_empty() {
                    return Err(RuleError::EmptyCombinator);
                }
                children.iter().try_for_each(StoppingRule::validate)
            }
            _ => Ok(()),
        }
    }
}

// =============================================================================
// Factories
// =============================================================================

/// Standard rule for numerical fields:
/// `(MinSamples ∧ ConfidenceReached) ∨ MaxQueries ∨ ConsecutiveDeclines`.
pub fn standard_stopping() -> StoppingRule {
    standard_stopping_with(
        STANDARD_MIN_SAMPLES,
        STANDARD_CONFIDENCE,
        STANDARD_MAX_QUERIES,
        STANDARD_MAX_CONSECUTIVE_DECLINES,
    )
}

pub fn standard_stopping_with(
    min_samples: usize,
    confidence: f64,
    max_queries: usize,
    max_consecutive_declines: usize,
) -> StoppingRule {
    StoppingRule::MinSamples(min_samples)
        .and(StoppingRule::ConfidenceReached(confidence))
        .or(StoppingRule::MaxQueries(max_queries))
        .or(StoppingRule::ConsecutiveDeclines(max_consecutive_declines))
}

/// Rule for categorical fields, with an early unanimous exit:
/// `Unanimous ∨ (MinSamples ∧ ConfidenceReached) ∨ MaxQueries`.
pub fn categorical_stopping() -> StoppingRule {
    categorical_stopping_with(
        CATEGORICAL_UNANIMOUS_AFTER,
        CATEGORICAL_MIN_SAMPLES,
        CATEGORICAL_CONFIDENCE,
        CATEGORICAL_MAX_QUERIES,
    )
}

pub fn categorical_stopping_with(
    unanimous_after: usize,
    min_samples: usize,
    confidence: f64,
    max_queries: usize,
) -> StoppingRule {
    StoppingRule::UnanimousAgreement(unanimous_after)
        .or(StoppingRule::MinSamples(min_samples)
            .and(StoppingRule::ConfidenceReached(confidence)))
        .or(StoppingRule::MaxQueries(max_queries))
}

/// Relaxed rule for inherently variable data: the standard shape with a
/// lower threshold and tighter budgets.
pub fn relaxed_stopping() -> StoppingRule {
    standard_stopping_with(
        RELAXED_MIN_SAMPLES,
        RELAXED_CONFIDENCE,
        RELAXED_MAX_QUERIES,
        RELAXED_MAX_CONSECUTIVE_DECLINES,
    )
}
