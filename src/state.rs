//! Per-question sampling state, snapshots, and finalised estimates.
//!
//! `SampleState<T>` is the typed record the engine mutates between oracle
//! completions. `StateSnapshot` is the erased, serialisable view handed to
//! progress callbacks. `Estimate` is the finalised output record with a
//! type-erased value so one battery can mix value types.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

/// Reference confidence threshold used to classify archetypes when a
/// stopping rule carries no explicit `ConfidenceReached` leaf.
pub const REFERENCE_THRESHOLD: f64 = 0.80;

/// Fraction of the query budget under which a threshold-meeting outcome
/// counts as an early stop.
const EARLY_STOP_BUDGET_FRACTION: f64 = 0.75;

// =============================================================================
// Archetype
// =============================================================================

/// Classification of how sampling terminated for a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Archetype {
    /// Confidence threshold met well inside the query budget.
    Confident,
    /// Confidence threshold met within budget.
    Acceptable,
    /// Budget exhausted without meeting the threshold, but samples exist.
    Uncertain,
    /// No successful samples at all.
    InsufficientData,
}

// =============================================================================
// Value bound
// =============================================================================

/// Bound satisfied by every sample value type.
///
/// Blanket-implemented; callers never implement it by hand.
pub trait SampleValue: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {}

impl<T> SampleValue for T where T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {}

// =============================================================================
// Typed sampling state
// =============================================================================

/// Sampling state for a single question.
///
/// Invariants: `consecutive_declines <= decline_count`; a successful sample
/// or a parse failure resets the streak to zero, a decline increments it.
#[derive(Debug, Clone)]
pub struct SampleState<T> {
    /// Successfully parsed samples in arrival order.
    pub samples: Vec<T>,
    pub decline_count: usize,
    pub parse_failure_count: usize,
    pub consecutive_declines: usize,
}

impl<T> Default for SampleState<T> {
    fn default() -> Self {
        Self {
            samples: Vec::new(),
            decline_count: 0,
            parse_failure_count: 0,
            consecutive_declines: 0,
        }
    }
}

impl<T> SampleState<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Total queries made: successful + declined + failed.
    pub fn query_count(&self) -> usize {
        self.samples.len() + self.decline_count + self.parse_failure_count
    }

    pub fn record_sample(&mut self, value: T) {
        self.samples.push(value);
        self.consecutive_declines = 0;
    }

    pub fn record_decline(&mut self) {
        self.decline_count += 1;
        self.consecutive_declines += 1;
    }

    /// A parse failure consumes a query but is not a refusal, so it resets
    /// the decline streak rather than extending it.
    pub fn record_parse_failure(&mut self) {
        self.parse_failure_count += 1;
        self.consecutive_declines = 0;
    }
}

// =============================================================================
// Erased snapshot for progress callbacks
// =============================================================================

/// Read-only view of a question's state, rendered for observers.
///
/// Sample values and the running estimate are carried as their `Debug`
/// renderings so the snapshot stays serialisable across value types.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub samples: Vec<String>,
    pub decline_count: usize,
    pub parse_failure_count: usize,
    pub consecutive_declines: usize,
    /// Running point estimate, present once at least one sample exists.
    pub estimate: Option<String>,
    /// Raw estimator confidence for the running estimate.
    pub confidence: f64,
}

impl StateSnapshot {
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn query_count(&self) -> usize {
        self.samples.len() + self.decline_count + self.parse_failure_count
    }
}

// =============================================================================
// Type-erased values
// =============================================================================

/// A cheaply clonable, type-erased sample or estimate value.
///
/// Holds the typed value behind `Arc<dyn Any>` together with its `Debug`
/// rendering captured at erasure time.
#[derive(Clone)]
pub struct ValueCell {
    inner: Arc<dyn Any + Send + Sync>,
    repr: String,
}

impl ValueCell {
    pub fn new<T: SampleValue>(value: T) -> Self {
        let repr = format!("{value:?}");
        Self {
            inner: Arc::new(value),
            repr,
        }
    }

    /// Downcast to the concrete value type. Returns `None` on a type
    /// mismatch.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// The `Debug` rendering of the underlying value.
    pub fn repr(&self) -> &str {
        &self.repr
    }
}

impl fmt::Debug for ValueCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr)
    }
}

// =============================================================================
// Estimate
// =============================================================================

/// A value estimated from repeated oracle queries, with its calibrated
/// confidence and termination archetype.
#[derive(Debug, Clone)]
pub struct Estimate {
    value: Option<ValueCell>,
    /// Final confidence after the decline penalty, in [0, 1].
    pub confidence: f64,
    pub archetype: Archetype,
    pub sample_count: usize,
    pub decline_count: usize,
    samples: Vec<ValueCell>,
}

impl Estimate {
    pub(crate) fn new(
        value: Option<ValueCell>,
        confidence: f64,
        archetype: Archetype,
        decline_count: usize,
        samples: Vec<ValueCell>,
    ) -> Self {
        Self {
            value,
            confidence,
            archetype,
            sample_count: samples.len(),
            decline_count,
            samples,
        }
    }

    /// The estimated value, downcast to its concrete type.
    ///
    /// `None` when no estimate exists (`INSUFFICIENT_DATA`) or when `T` is
    /// not the question's value type.
    pub fn value<T: 'static>(&self) -> Option<&T> {
        self.value.as_ref().and_then(ValueCell::get::<T>)
    }

    pub fn value_cell(&self) -> Option<&ValueCell> {
        self.value.as_ref()
    }

    /// The raw samples behind the estimate, downcast to their concrete type.
    pub fn samples<T: 'static>(&self) -> impl Iterator<Item = &T> {
        self.samples.iter().filter_map(ValueCell::get::<T>)
    }

    pub fn sample_cells(&self) -> &[ValueCell] {
        &self.samples
    }
}

/// Output of a full `collect` run: one estimate per question uid.
pub type EstimateMap = HashMap<String, Estimate>;

// =============================================================================
// Finalisation math
// =============================================================================

/// Multiplier in [0, 1] that discounts confidence by the decline rate:
/// `1 - declines / (declines + samples)`.
pub(crate) fn decline_penalty(sample_count: usize, decline_count: usize) -> f64 {
    let total = sample_count + decline_count;
    if total == 0 {
        return 0.0;
    }
    1.0 - decline_count as f64 / total as f64
}

/// Classify the termination archetype from the final (penalised) confidence.
///
/// `threshold` and `query_budget` come from walking the question's stopping
/// rule; with no explicit budget the early-stop distinction collapses and
/// threshold-meeting outcomes are `Acceptable`.
pub(crate) fn classify_archetype(
    sample_count: usize,
    final_confidence: f64,
    query_count: usize,
    threshold: Option<f64>,
    query_budget: Option<usize>,
) -> Archetype {
    if sample_count == 0 {
        return Archetype::InsufficientData;
    }

    let theta = threshold.unwrap_or(REFERENCE_THRESHOLD);
    if final_confidence < theta {
        return Archetype::Uncertain;
    }

    match query_budget {
        Some(budget) if (query_count as f64) < EARLY_STOP_BUDGET_FRACTION * budget as f64 => {
            Archetype::Confident
        }
        _ => Archetype::Acceptable,
    }
}
