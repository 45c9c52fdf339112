use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::llm_client::{parse_json_response, LlmClient};

/// Outcome of evaluating a single answer. `score` is in [0, 100] and
/// `is_correct` always equals `score >= PASS_THRESHOLD`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerEvaluation {
    pub is_correct: bool,
    pub score: f64,
    pub feedback: Option<String>,
}

/// Score at or above which an answer counts as correct.
pub const PASS_THRESHOLD: f64 = 60.0;

/// Raw scoring record as the model returns it. The boolean is a hint only;
/// correctness is recomputed from the numeric score.
#[derive(Debug, Deserialize)]
struct RemoteScore {
    score: f64,
    #[allow(dead_code)]
    is_correct: bool,
    feedback: Option<String>,
}

/// Exact string equality against the stored correct option. Options are
/// generator-controlled literals, so the comparison is case-sensitive.
pub fn evaluate_mcq(correct_answer: &str, user_answer: &str) -> AnswerEvaluation {
    let is_correct = user_answer == correct_answer;
    AnswerEvaluation {
        is_correct,
        score: if is_correct { 100.0 } else { 0.0 },
        feedback: None,
    }
}

/// Deterministic keyword-overlap score used when the remote scoring call is
/// unavailable or unparseable. Never fails.
pub fn keyword_fallback_score(reference_answer: &str, user_answer: &str) -> f64 {
    let reference_tokens: Vec<String> = reference_answer
        .split_whitespace()
        .map(|token| token.to_lowercase())
        .collect();

    if reference_tokens.is_empty() {
        return 0.0;
    }

    let user_tokens: std::collections::HashSet<String> = user_answer
        .split_whitespace()
        .map(|token| token.to_lowercase())
        .collect();

    let matches = reference_tokens
        .iter()
        .filter(|token| user_tokens.contains(*token))
        .count();

    let score = (matches as f64 / reference_tokens.len() as f64) * 100.0;
    score.min(100.0)
}

/// Normalize a parsed remote score into the evaluator's invariants:
/// clamp into [0, 100] and recompute correctness from the number.
fn normalize_remote_score(raw: RemoteScore) -> AnswerEvaluation {
    let score = raw.score.clamp(0.0, 100.0);
    AnswerEvaluation {
        is_correct: score >= PASS_THRESHOLD,
        score,
        feedback: raw.feedback,
    }
}

fn fallback_evaluation(reference_answer: &str, user_answer: &str) -> AnswerEvaluation {
    let score = keyword_fallback_score(reference_answer, user_answer);
    AnswerEvaluation {
        is_correct: score >= PASS_THRESHOLD,
        score,
        feedback: Some("Automated scoring based on keyword matching".to_string()),
    }
}

/// Aggregate test score: arithmetic mean of per-question scores, rounded
/// to one decimal. Empty input scores 0.
pub fn aggregate_score(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    (mean * 10.0).round() / 10.0
}

/// Scores answers: exact match for MCQ, model-assisted scoring with a
/// keyword-overlap fallback for free text.
#[derive(Clone)]
pub struct AnswerEvaluator {
    llm: LlmClient,
}

impl AnswerEvaluator {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    /// Evaluate a descriptive answer. Blank answers score 0 without any
    /// remote call; remote failures land on the keyword fallback. This
    /// method is the evaluator's guaranteed terminal path - it never fails.
    pub async fn evaluate_descriptive(
        &self,
        topic: &str,
        question: &str,
        reference_answer: &str,
        user_answer: &str,
    ) -> AnswerEvaluation {
        if user_answer.trim().is_empty() {
            return AnswerEvaluation {
                is_correct: false,
                score: 0.0,
                feedback: Some("No answer provided".to_string()),
            };
        }

        let prompt = format!(
            r#"Evaluate this student's answer for the topic "{topic}":

Question: {question}
Expected Answer: {reference}
Student's Answer: {answer}

Evaluate based on:
1. Correctness - Are the key concepts correct?
2. Completeness - Does it cover the main points?
3. Understanding - Does it show comprehension?

Scoring Guide:
- 90-100: Excellent, complete understanding with all key points
- 70-89: Good, covers most points with minor gaps
- 50-69: Adequate, basic understanding but missing important details
- 30-49: Insufficient, major gaps in understanding
- 0-29: Incorrect or minimal understanding

Return ONLY a JSON object (no markdown, no code blocks):
{{
  "score": 85,
  "is_correct": true,
  "feedback": "Brief constructive feedback (1-2 sentences)"
}}

Note: is_correct should be true if score >= 60, false otherwise."#,
            topic = topic,
            question = question,
            reference = reference_answer,
            answer = user_answer,
        );

        let system_message = "You are an expert teacher grading short answers. \
                              Always respond with valid JSON in the requested format.";

        match self.llm.generate(Some(system_message), &prompt).await {
            Ok(response_text) => {
                debug!(
                    response_length = response_text.len(),
                    "Raw model response for answer scoring"
                );

                match parse_json_response::<RemoteScore>(&response_text) {
                    Ok(raw) => {
                        let evaluation = normalize_remote_score(raw);
                        info!(
                            score = evaluation.score,
                            is_correct = evaluation.is_correct,
                            "Descriptive answer scored by model"
                        );
                        evaluation
                    }
                    Err(e) => {
                        warn!(
                            error = %e,
                            "Unparseable scoring response, using keyword fallback"
                        );
                        fallback_evaluation(reference_answer, user_answer)
                    }
                }
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "Scoring call failed, using keyword fallback"
                );
                fallback_evaluation(reference_answer, user_answer)
            }
        }
    }
}
