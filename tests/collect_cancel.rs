//! Cancellation and transport-failure behaviour of `collect`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use consensus_harness::{
    collect, standard_stopping, CollectError, CollectOptions, FloatParser, NumericalEstimator,
    OracleError, Question, QuestionBank, StoppingRule,
};

fn protein_bank() -> QuestionBank {
    QuestionBank::new(vec![Question::new(
        "protein",
        "How many grams of protein per 100g?",
        FloatParser::new(),
        NumericalEstimator::new(),
        standard_stopping(),
    )])
    .unwrap()
}

#[tokio::test]
async fn collect_honours_cancel_flag_before_any_queries() {
    let bank = protein_bank();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_handle = calls.clone();
    let oracle = move |_prompt: String| {
        let calls = calls_handle.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, OracleError>("31".to_string())
        }
    };

    let cancel = Arc::new(AtomicBool::new(true));
    let result = collect(
        &bank,
        &oracle,
        CollectOptions::new().rng_seed(1).cancel_flag(cancel),
    )
    .await;

    assert!(matches!(result, Err(CollectError::Cancelled)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancel_mid_run_discards_partial_results() {
    let bank = protein_bank();
    let oracle = |_prompt: String| async { Ok::<_, OracleError>("31".to_string()) };

    let cancel = Arc::new(AtomicBool::new(false));
    let trip = cancel.clone();
    let options = CollectOptions::new()
        .rng_seed(1)
        .cancel_flag(cancel)
        .on_progress(move |snapshots| {
            if snapshots["protein"].query_count() >= 2 {
                trip.store(true, Ordering::SeqCst);
            }
        });

    let result = collect(&bank, &oracle, options).await;
    assert!(matches!(result, Err(CollectError::Cancelled)));
}

#[tokio::test]
async fn transport_failure_propagates_unretried() {
    let bank = protein_bank();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_handle = calls.clone();
    let oracle = move |_prompt: String| {
        let calls = calls_handle.clone();
        async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Ok("31".to_string())
            } else {
                Err(OracleError::new("connection reset"))
            }
        }
    };

    let result = collect(&bank, &oracle, CollectOptions::new().rng_seed(1)).await;

    assert!(matches!(result, Err(CollectError::Oracle(_))));
    // The failing call was the third and last; the engine never retried it.
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn declines_and_parse_failures_are_not_transport_errors() {
    let bank = QuestionBank::new(vec![Question::new(
        "protein",
        "How many grams of protein per 100g?",
        FloatParser::new(),
        NumericalEstimator::new(),
        StoppingRule::MaxQueries(3),
    )])
    .unwrap();
    let responses = Arc::new(AtomicUsize::new(0));
    let responses_handle = responses.clone();
    let oracle = move |_prompt: String| {
        let responses = responses_handle.clone();
        async move {
            let reply = match responses.fetch_add(1, Ordering::SeqCst) {
                0 => "UNKNOWN",
                1 => "garbage",
                _ => "31",
            };
            Ok::<_, OracleError>(reply.to_string())
        }
    };

    let estimates = collect(&bank, &oracle, CollectOptions::new().rng_seed(1))
        .await
        .unwrap();
    let estimate = &estimates["protein"];
    assert_eq!(estimate.sample_count, 1);
    assert_eq!(estimate.decline_count, 1);
}
