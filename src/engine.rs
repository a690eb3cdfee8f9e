//! The sampling engine: interleaves questions, drives the oracle, and
//! finalises estimates.
//!
//! Core loop:
//! 1. Ask the bank for an incomplete question (uniformly at random).
//! 2. Send its prompt through the injected oracle.
//! 3. Feed the response to the question's parser and apply the state
//!    transition (sample / decline / parse failure).
//! 4. Notify the progress callback with a snapshot of all states.
//! 5. Once every question's stopping rule fires, finalise each state into
//!    an `Estimate`.
//!
//! Up to `concurrency` oracle calls may be in flight at once, but never
//! more than one per question, so each question's state machine stays
//! well-defined. Results apply in completion order.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, warn};

use crate::question::{QuestionBank, QuestionState, ResponseEvent};
use crate::state::{Estimate, EstimateMap, StateSnapshot};

// =============================================================================
// Oracle
// =============================================================================

/// The stochastic oracle: a prompt in, a raw response out.
///
/// Transport concerns (HTTP, rate limiting, retries, authentication) live
/// inside implementations; the engine treats a failure here as fatal and
/// propagates it unretried. Implementations must tolerate concurrent
/// invocation up to the engine's configured in-flight limit.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn query(&self, prompt: &str) -> Result<String, OracleError>;
}

/// Async closures are oracles, which keeps mock oracles in tests to a
/// one-liner.
#[async_trait]
impl<F, Fut> Oracle for F
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, OracleError>> + Send + 'static,
{
    async fn query(&self, prompt: &str) -> Result<String, OracleError> {
        (self)(prompt.to_string()).await
    }
}

/// Failure of the oracle function itself, as opposed to an unparseable or
/// declined response.
#[derive(Debug, Clone, thiserror::Error)]
#[error("oracle transport failure: {message}")]
pub struct OracleError {
    message: String,
}

impl OracleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// =============================================================================
// Options & errors
// =============================================================================

/// Synchronous observer invoked after every state update with a snapshot of
/// all question states, keyed by uid.
pub type ProgressFn = Box<dyn FnMut(&HashMap<String, StateSnapshot>) + Send>;

/// Knobs for a single `collect` run.
pub struct CollectOptions {
    /// Maximum oracle calls in flight at once. Clamped to at least 1.
    pub concurrency: usize,
    /// Seed for the question-selection RNG; entropy-seeded when absent.
    pub rng_seed: Option<u64>,
    pub progress: Option<ProgressFn>,
    /// Cooperative cancellation: set the flag and the loop aborts at its
    /// next suspension point without finalising.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            rng_seed: None,
            progress: None,
            cancel: None,
        }
    }
}

impl CollectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn on_progress(
        mut self,
        callback: impl FnMut(&HashMap<String, StateSnapshot>) + Send + 'static,
    ) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error("collection cancelled")]
    Cancelled,
}

// =============================================================================
// Collect
// =============================================================================

/// Collect estimates for every question in the bank.
///
/// Returns one entry per question, keyed by uid. Oracle failures and
/// cancellation propagate without finalising; declines and parse failures
/// are recorded on the per-question state and never escape.
pub async fn collect(
    bank: &QuestionBank,
    oracle: &dyn Oracle,
    options: CollectOptions,
) -> Result<EstimateMap, CollectError> {
    let CollectOptions {
        concurrency,
        rng_seed,
        mut progress,
        cancel,
    } = options;
    let concurrency = concurrency.max(1);
    let mut rng = match rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let cancelled = || {
        cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    };

    let mut states = bank.initial_states();
    let mut busy: HashSet<usize> = HashSet::new();
    let mut in_flight = FuturesUnordered::new();

    loop {
        if cancelled() {
            return Err(CollectError::Cancelled);
        }

        // Refill free slots, at most one in-flight query per question.
        while in_flight.len() < concurrency {
            match bank.select_next_excluding(&states, &busy, &mut rng) {
                Some(index) => {
                    busy.insert(index);
                    let prompt = bank.questions()[index].prompt().to_string();
                    in_flight.push(dispatch(oracle, index, prompt));
                }
                None => break,
            }
        }

        // Nothing in flight and nothing selectable: every question is done.
        let Some((index, result)) = in_flight.next().await else {
            break;
        };
        busy.remove(&index);

        // A reply landing after cancellation is discarded.
        if cancelled() {
            return Err(CollectError::Cancelled);
        }

        let response = result?;
        let question = &bank.questions()[index];
        match question.absorb(&mut states[index], &response) {
            ResponseEvent::Sample => {
                debug!(uid = question.uid(), "recorded sample");
            }
            ResponseEvent::Decline => {
                debug!(uid = question.uid(), "oracle declined");
            }
            ResponseEvent::ParseFailure(err) => {
                warn!(uid = question.uid(), error = %err, "unparseable response");
            }
        }
        if question.is_complete(&states[index]) {
            debug!(uid = question.uid(), "question complete");
        }

        if let Some(callback) = progress.as_mut() {
            let snapshots = snapshot_map(bank, &states);
            callback(&snapshots);
        }
    }

    Ok(bank
        .questions()
        .iter()
        .zip(states.iter())
        .map(|(question, state)| (question.uid().to_string(), question.finalize(state)))
        .collect::<HashMap<String, Estimate>>())
}

async fn dispatch(
    oracle: &dyn Oracle,
    index: usize,
    prompt: String,
) -> (usize, Result<String, OracleError>) {
    let result = oracle.query(&prompt).await;
    (index, result)
}

fn snapshot_map(bank: &QuestionBank, states: &[QuestionState]) -> HashMap<String, StateSnapshot> {
    bank.questions()
        .iter()
        .zip(states.iter())
        .map(|(question, state)| (question.uid().to_string(), question.snapshot(state)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::NumericalEstimator;
    use crate::parser::FloatParser;
    use crate::question::Question;
    use crate::stopping::StoppingRule;

    fn single_question_bank(max_queries: usize) -> QuestionBank {
        QuestionBank::new(vec![Question::new(
            "protein",
            "How many grams of protein?",
            FloatParser::new(),
            NumericalEstimator::new(),
            StoppingRule::MaxQueries(max_queries),
        )])
        .unwrap()
    }

    #[tokio::test]
    async fn closure_oracles_drive_a_run() {
        let bank = single_question_bank(3);
        let oracle = |_prompt: String| async { Ok::<_, OracleError>("31".to_string()) };

        let estimates = collect(&bank, &oracle, CollectOptions::new().rng_seed(1))
            .await
            .unwrap();
        let estimate = &estimates["protein"];
        assert_eq!(estimate.sample_count, 3);
        assert_eq!(estimate.value::<f64>(), Some(&31.0));
    }

    #[tokio::test]
    async fn progress_fires_after_every_update() {
        let bank = single_question_bank(4);
        let oracle = |_prompt: String| async { Ok::<_, OracleError>("31".to_string()) };

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let options = CollectOptions::new()
            .rng_seed(1)
            .on_progress(move |snapshots| {
                sink.lock()
                    .unwrap()
                    .push(snapshots["protein"].query_count());
            });

        collect(&bank, &oracle, options).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn zero_concurrency_is_clamped_to_one() {
        let bank = single_question_bank(2);
        let oracle = |_prompt: String| async { Ok::<_, OracleError>("31".to_string()) };

        let estimates = collect(&bank, &oracle, CollectOptions::new().concurrency(0))
            .await
            .unwrap();
        assert_eq!(estimates["protein"].sample_count, 2);
    }
}
