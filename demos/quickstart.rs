//! Minimal end-to-end example for `consensus-harness`.
//!
//! Runs a three-question battery against a scripted mock oracle so it works
//! offline. Swap `mock_oracle` for a closure that calls your LLM provider.
//!
//! To run: `cargo run --example quickstart`

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use consensus_harness::{
    categorical_stopping, collect, standard_stopping, BooleanEstimator, BooleanParser,
    CategoricalEstimator, CollectOptions, FloatParser, LiteralParser, NumericalEstimator,
    OracleError, Question, QuestionBank,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let unit_options = ["gram", "piece", "breast", "cup"].map(String::from);
    let bank = QuestionBank::new(vec![
        Question::new(
            "protein",
            "How many grams of protein are in 100g of chicken breast?",
            FloatParser::new().with_units([("g", 1.0), ("mg", 0.001)]),
            NumericalEstimator::new(),
            standard_stopping(),
        ),
        Question::new(
            "is_vegan",
            "Is chicken breast vegan?",
            BooleanParser::new(),
            BooleanEstimator::new(),
            categorical_stopping(),
        ),
        Question::new(
            "unit",
            "What is the natural serving unit for chicken breast?",
            LiteralParser::new(unit_options.clone()),
            CategoricalEstimator::new(unit_options),
            categorical_stopping(),
        ),
    ])?;

    let oracle = mock_oracle();
    let options = CollectOptions::new()
        .rng_seed(42)
        .concurrency(2)
        .on_progress(|snapshots| {
            let queries: usize = snapshots.values().map(|s| s.query_count()).sum();
            eprintln!("progress: {queries} queries so far");
        });

    let estimates = collect(&bank, &oracle, options).await?;

    for question in bank.questions() {
        let estimate = &estimates[question.uid()];
        println!(
            "{}: {:?} (confidence {:.2}, {:?}, {} samples, {} declines)",
            question.uid(),
            estimate.value_cell(),
            estimate.confidence,
            estimate.archetype,
            estimate.sample_count,
            estimate.decline_count,
        );
    }
    Ok(())
}

/// Replays canned responses per question, cycling when a script runs out.
fn mock_oracle(
) -> impl Fn(String) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<String, OracleError>> + Send>>
{
    let scripts: HashMap<&'static str, Vec<&'static str>> = HashMap::from([
        ("protein", vec!["31 g", "31 g", "30 g", "UNKNOWN", "32 g", "31 g"]),
        ("vegan", vec!["no", "no", "no"]),
        ("unit", vec!["breast", "breast", "gram", "breast", "breast"]),
    ]);
    let cursors: Arc<Mutex<HashMap<&'static str, usize>>> = Arc::new(Mutex::new(HashMap::new()));

    move |prompt: String| {
        let scripts = scripts.clone();
        let cursors = cursors.clone();
        Box::pin(async move {
            let (key, responses) = scripts
                .iter()
                .find(|(key, _)| prompt.to_lowercase().contains(**key))
                .map(|(key, responses)| (*key, responses))
                .expect("a script exists for every demo prompt");
            let mut cursors = cursors.lock().unwrap();
            let cursor = cursors.entry(key).or_insert(0);
            let response = responses[*cursor % responses.len()].to_string();
            *cursor += 1;
            Ok(response)
        })
    }
}
