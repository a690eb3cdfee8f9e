//! Questions bind a prompt to its parsing, estimation, and stopping
//! strategy; the bank selects which question to ask next.
//!
//! A `Question` is built from a typed (parser, estimator, rule) triple and
//! immediately erased behind an object-safe core, so one bank can mix value
//! types. The engine only ever talks to the erased surface.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;

use rand::rngs::StdRng;
use rand::Rng;

use crate::estimator::Estimator;
use crate::parser::{ParseError, ParseOutcome, Parser};
use crate::state::{
    classify_archetype, decline_penalty, Archetype, Estimate, SampleState, SampleValue,
    StateSnapshot, ValueCell,
};
use crate::stopping::{RuleError, StoppingRule};

// =============================================================================
// Erased core
// =============================================================================

/// What a single oracle response turned into.
#[derive(Debug, Clone)]
pub(crate) enum ResponseEvent {
    Sample,
    Decline,
    ParseFailure(ParseError),
}

/// Opaque per-question sampling state, owned by the engine.
pub struct QuestionState(Box<dyn Any + Send>);

/// Object-safe view of a typed question.
trait QuestionCore: Send + Sync {
    fn uid(&self) -> &str;
    fn prompt(&self) -> &str;
    fn stopping(&self) -> &StoppingRule;
    fn new_state(&self) -> QuestionState;
    fn absorb(&self, state: &mut QuestionState, response: &str) -> ResponseEvent;
    fn is_complete(&self, state: &QuestionState) -> bool;
    fn snapshot(&self, state: &QuestionState) -> StateSnapshot;
    fn finalize(&self, state: &QuestionState) -> Estimate;
}

struct TypedQuestion<T, P, E> {
    uid: String,
    prompt: String,
    parser: P,
    estimator: E,
    stopping: StoppingRule,
    _value: PhantomData<fn() -> T>,
}

impl<T, P, E> TypedQuestion<T, P, E>
where
    T: SampleValue,
{
    fn state<'a>(&self, state: &'a QuestionState) -> &'a SampleState<T> {
        state
            .0
            .downcast_ref::<SampleState<T>>()
            .expect("question state matches its question's value type")
    }
}

impl<T, P, E> QuestionCore for TypedQuestion<T, P, E>
where
    T: SampleValue,
    P: Parser<T>,
    E: Estimator<T>,
{
    fn uid(&self) -> &str {
        &self.uid
    }

    fn prompt(&self) -> &str {
        &self.prompt
    }

    fn stopping(&self) -> &StoppingRule {
        &self.stopping
    }

    fn new_state(&self) -> QuestionState {
        QuestionState(Box::new(SampleState::<T>::new()))
    }

    fn absorb(&self, state: &mut QuestionState, response: &str) -> ResponseEvent {
        let state = state
            .0
            .downcast_mut::<SampleState<T>>()
            .expect("question state matches its question's value type");
        match self.parser.parse(response) {
            ParseOutcome::Value(value) => {
                state.record_sample(value);
                ResponseEvent::Sample
            }
            ParseOutcome::Declined => {
                state.record_decline();
                ResponseEvent::Decline
            }
            ParseOutcome::Failed(err) => {
                state.record_parse_failure();
                ResponseEvent::ParseFailure(err)
            }
        }
    }

    fn is_complete(&self, state: &QuestionState) -> bool {
        self.stopping.should_stop(self.state(state), &self.estimator)
    }

    fn snapshot(&self, state: &QuestionState) -> StateSnapshot {
        let state = self.state(state);
        let (estimate, confidence) = if state.samples.is_empty() {
            (None, 0.0)
        } else {
            let estimate = self.estimator.estimate(&state.samples);
            let confidence = self.estimator.confidence(&state.samples, &estimate);
            (Some(format!("{estimate:?}")), confidence)
        };
        StateSnapshot {
            samples: state.samples.iter().map(|s| format!("{s:?}")).collect(),
            decline_count: state.decline_count,
            parse_failure_count: state.parse_failure_count,
            consecutive_declines: state.consecutive_declines,
            estimate,
            confidence,
        }
    }

    fn finalize(&self, state: &QuestionState) -> Estimate {
        let state = self.state(state);
        if state.samples.is_empty() {
            return Estimate::new(
                None,
                0.0,
                Archetype::InsufficientData,
                state.decline_count,
                Vec::new(),
            );
        }

        let value = self.estimator.estimate(&state.samples);
        let raw = self.estimator.confidence(&state.samples, &value);
        let penalty = decline_penalty(state.sample_count(), state.decline_count);
        let confidence = (raw * penalty).clamp(0.0, 1.0);
        let archetype = classify_archetype(
            state.sample_count(),
            confidence,
            state.query_count(),
            self.stopping.confidence_threshold(),
            self.stopping.query_budget(),
        );
        let samples = state.samples.iter().cloned().map(ValueCell::new).collect();
        Estimate::new(
            Some(ValueCell::new(value)),
            confidence,
            archetype,
            state.decline_count,
            samples,
        )
    }
}

// =============================================================================
// Public question
// =============================================================================

/// A prompt paired with its parsing, estimation, and stopping strategy.
/// Immutable once constructed.
pub struct Question {
    core: Box<dyn QuestionCore>,
}

impl Question {
    pub fn new<T, P, E>(
        uid: impl Into<String>,
        prompt: impl Into<String>,
        parser: P,
        estimator: E,
        stopping: StoppingRule,
    ) -> Self
    where
        T: SampleValue,
        P: Parser<T> + 'static,
        E: Estimator<T> + 'static,
    {
        Self {
            core: Box::new(TypedQuestion {
                uid: uid.into(),
                prompt: prompt.into(),
                parser,
                estimator,
                stopping,
                _value: PhantomData,
            }),
        }
    }

    pub fn uid(&self) -> &str {
        self.core.uid()
    }

    pub fn prompt(&self) -> &str {
        self.core.prompt()
    }

    pub fn stopping(&self) -> &StoppingRule {
        self.core.stopping()
    }

    pub(crate) fn new_state(&self) -> QuestionState {
        self.core.new_state()
    }

    pub(crate) fn absorb(&self, state: &mut QuestionState, response: &str) -> ResponseEvent {
        self.core.absorb(state, response)
    }

    pub(crate) fn is_complete(&self, state: &QuestionState) -> bool {
        self.core.is_complete(state)
    }

    pub(crate) fn snapshot(&self, state: &QuestionState) -> StateSnapshot {
        self.core.snapshot(state)
    }

    pub(crate) fn finalize(&self, state: &QuestionState) -> Estimate {
        self.core.finalize(state)
    }
}

impl fmt::Debug for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Question")
            .field("uid", &self.uid())
            .field("prompt", &self.prompt())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Bank
// =============================================================================

/// A programmer error in the battery, surfaced before any sampling starts.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BankError {
    #[error("question bank is empty")]
    Empty,
    #[error("question id must not be blank")]
    BlankId,
    #[error("duplicate question id: {0}")]
    DuplicateId(String),
    #[error("invalid stopping rule for question {uid:?}: {source}")]
    InvalidRule {
        uid: String,
        #[source]
        source: RuleError,
    },
}

/// A finite ordered battery of questions with pairwise distinct ids.
#[derive(Debug)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    /// Build a bank, validating ids and stopping rules eagerly.
    pub fn new(questions: Vec<Question>) -> Result<Self, BankError> {
        if questions.is_empty() {
            return Err(BankError::Empty);
        }
        let mut seen: HashSet<&str> = HashSet::new();
        for question in &questions {
            let uid = question.uid();
            if uid.trim().is_empty() {
                return Err(BankError::BlankId);
            }
            if !seen.insert(uid) {
                return Err(BankError::DuplicateId(uid.to_string()));
            }
            question
                .stopping()
                .validate()
                .map_err(|source| BankError::InvalidRule {
                    uid: uid.to_string(),
                    source,
                })?;
        }
        Ok(Self { questions })
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Fresh states for a new collection run, one per question.
    pub fn initial_states(&self) -> Vec<QuestionState> {
        self.questions.iter().map(Question::new_state).collect()
    }

    /// Pick an incomplete question uniformly at random, or `None` when all
    /// are complete.
    ///
    /// Random interleaving keeps the oracle from anchoring on its most
    /// recent answer to a repeated prompt.
    pub fn select_next(&self, states: &[QuestionState], rng: &mut StdRng) -> Option<usize> {
        self.select_next_excluding(states, &HashSet::new(), rng)
    }

    /// As `select_next`, skipping questions that already have a query in
    /// flight.
    pub(crate) fn select_next_excluding(
        &self,
        states: &[QuestionState],
        busy: &HashSet<usize>,
        rng: &mut StdRng,
    ) -> Option<usize> {
        let candidates: Vec<usize> = self
            .questions
            .iter()
            .enumerate()
            .filter(|(index, question)| {
                !busy.contains(index) && !question.is_complete(&states[*index])
            })
            .map(|(index, _)| index)
            .collect();

        if candidates.is_empty() {
            return None;
        }
        Some(candidates[rng.gen_range(0..candidates.len())])
    }
}
