#![forbid(unsafe_code)]

//! # consensus-harness
//!
//! Statistically robust typed extraction from stochastic LLM oracles.
//!
//! Asking an LLM once gives you a guess; asking it many times gives you a
//! distribution. consensus-harness drives a battery of independent
//! questions against an injected oracle function, parses each response into
//! a typed value (or a decline, or a parse failure), and aggregates the
//! samples with robust estimators (median + MAD for numbers, stable mode
//! for categories, majority for booleans, applicability-weighted medians
//! for integers that may not apply). Composable stopping rules halt
//! each question as soon as the answer is settled, and every returned value
//! carries a calibrated confidence and a termination archetype.
//!
//! The oracle transport, prompt templating, and result persistence are the
//! caller's business; this crate is the sampling loop and the statistics.

pub mod engine;
pub mod estimator;
pub mod parser;
pub mod question;
pub mod state;
pub mod stopping;

pub use engine::{collect, CollectError, CollectOptions, Oracle, OracleError, ProgressFn};
pub use estimator::{
    BooleanEstimator, CategoricalEstimator, Estimator, NumericalEstimator, OptionalIntEstimator,
};
pub use parser::{
    BooleanParser, DeclineKeywords, FloatParser, LiteralParser, OptionalBoundedIntParser,
    ParseError, ParseOutcome, Parser,
};
pub use question::{BankError, Question, QuestionBank, QuestionState};
pub use state::{
    Archetype, Estimate, EstimateMap, SampleState, SampleValue, StateSnapshot, ValueCell,
};
pub use stopping::{
    categorical_stopping, categorical_stopping_with, relaxed_stopping, standard_stopping,
    standard_stopping_with, RuleError, StoppingRule,
};
