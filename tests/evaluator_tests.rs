use gapmentor::evaluator::{
    aggregate_score, evaluate_mcq, keyword_fallback_score, AnswerEvaluator, PASS_THRESHOLD,
};
use gapmentor::{LlmClient, ProviderKind};

fn dead_llm() -> LlmClient {
    LlmClient::new(
        ProviderKind::OpenAi,
        "test-key".to_string(),
        Some("http://127.0.0.1:1".to_string()),
        None,
        1,
    )
    .unwrap()
}

#[test]
fn test_mcq_paris_scenario() {
    let evaluation = evaluate_mcq("Paris", "Paris");
    assert!(evaluation.is_correct);
    assert_eq!(evaluation.score, 100.0);

    let evaluation = evaluate_mcq("Paris", "Berlin");
    assert!(!evaluation.is_correct);
    assert_eq!(evaluation.score, 0.0);
}

#[tokio::test]
async fn test_empty_descriptive_answer_scores_zero() {
    let evaluator = AnswerEvaluator::new(dead_llm());

    for blank in ["", "   ", "\n\t"] {
        let evaluation = evaluator
            .evaluate_descriptive("Biology", "Explain osmosis.", "diffusion membrane", blank)
            .await;
        assert!(!evaluation.is_correct);
        assert_eq!(evaluation.score, 0.0);
    }
}

#[tokio::test]
async fn test_fallback_holds_correctness_invariant() {
    let evaluator = AnswerEvaluator::new(dead_llm());

    // 3 of 4 reference keywords: 75, correct.
    let evaluation = evaluator
        .evaluate_descriptive(
            "Chemistry",
            "Name the states of matter.",
            "solid liquid gas plasma",
            "solid, then liquid and gas",
        )
        .await;
    assert_eq!(evaluation.is_correct, evaluation.score >= PASS_THRESHOLD);
    assert!(evaluation.is_correct);

    // 1 of 4: 25, incorrect.
    let evaluation = evaluator
        .evaluate_descriptive(
            "Chemistry",
            "Name the states of matter.",
            "solid liquid gas plasma",
            "only solid",
        )
        .await;
    assert_eq!(evaluation.is_correct, evaluation.score >= PASS_THRESHOLD);
    assert!(!evaluation.is_correct);
}

#[test]
fn test_fallback_score_stays_in_bounds() {
    let cases = [
        ("", ""),
        ("", "an answer"),
        ("reference words here", ""),
        ("a a a a a", "a"),
        ("one two three", "one two three four five"),
        ("repeated repeated repeated", "repeated"),
    ];

    for (reference, answer) in cases {
        let score = keyword_fallback_score(reference, answer);
        assert!(
            (0.0..=100.0).contains(&score),
            "score {} out of bounds for ({:?}, {:?})",
            score,
            reference,
            answer
        );
    }
}

#[test]
fn test_repeated_reference_tokens_count_individually() {
    // Every occurrence of a matched token counts toward the overlap.
    assert_eq!(keyword_fallback_score("a a b b", "a b"), 100.0);
    assert_eq!(keyword_fallback_score("a a b b", "a"), 50.0);
}

#[test]
fn test_aggregate_matches_simple_average() {
    assert_eq!(aggregate_score(&[100.0, 0.0, 100.0, 40.0]), 60.0);
    assert_eq!(aggregate_score(&[0.0]), 0.0);
    assert_eq!(aggregate_score(&[100.0]), 100.0);
    assert_eq!(aggregate_score(&[55.5, 44.5]), 50.0);

    // Bounds hold for arbitrary in-range inputs.
    let scores = [13.0, 87.0, 42.0, 99.9, 0.1];
    let aggregate = aggregate_score(&scores);
    assert!((0.0..=100.0).contains(&aggregate));
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    assert!((aggregate - mean).abs() <= 0.05);
}
