use std::collections::HashSet;

use anyhow::Result;
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::database::Database;
use crate::llm_client::{extract_json, LlmClient};
use crate::models::{normalize_topic, Difficulty, QuestionType};

/// Failure modes of a generation attempt. None of these are retried here;
/// retry policy belongs to the caller.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Failed to parse model response: {0}")]
    ParseFailed(String),

    #[error("Expected {expected} questions, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Duplicate questions detected in generated batch")]
    DuplicateQuestions,

    #[error("Upstream model call failed: {0}")]
    Upstream(String),
}

/// A question as produced by the generator, before it is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedQuestion {
    pub prompt: String,
    pub kind: QuestionKind,
    /// Correct option for MCQ, reference answer for Descriptive.
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuestionKind {
    Mcq { options: Vec<String> },
    Descriptive,
}

impl GeneratedQuestion {
    pub fn question_type(&self) -> QuestionType {
        match self.kind {
            QuestionKind::Mcq { .. } => QuestionType::Mcq,
            QuestionKind::Descriptive => QuestionType::Descriptive,
        }
    }

    pub fn options(&self) -> Option<&[String]> {
        match &self.kind {
            QuestionKind::Mcq { options } => Some(options),
            QuestionKind::Descriptive => None,
        }
    }
}

/// Loosely-typed record as the model returns it.
#[derive(Debug, Deserialize)]
struct RawQuestion {
    question: String,
    #[serde(rename = "type")]
    question_type: String,
    options: Option<Vec<String>>,
    correct_answer: String,
}

/// Compute the MCQ/Descriptive split for a request.
/// Returns `(mcq_count, descriptive_count)`.
pub fn question_split(count: u32, descriptive_fraction: f64) -> (u32, u32) {
    let descriptive = ((count as f64) * descriptive_fraction).round() as u32;
    let descriptive = descriptive.min(count);
    (count - descriptive, descriptive)
}

fn difficulty_guidance(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Easy => {
            "Focus on basic concepts, definitions, and fundamental understanding. \
             Questions should test recall and comprehension."
        }
        Difficulty::Medium => {
            "Include application-based questions, problem-solving, and conceptual \
             understanding. Mix of recall and analytical thinking."
        }
        Difficulty::Hard => {
            "Focus on complex scenarios, advanced concepts, analysis, and synthesis. \
             Require deep understanding and critical thinking."
        }
    }
}

fn build_generation_prompt(
    topic: &str,
    difficulty: Difficulty,
    count: u32,
    mcq_count: u32,
    descriptive_count: u32,
) -> String {
    format!(
        r#"Generate {count} unique, high-quality test questions for the topic: "{topic}" at {difficulty} difficulty level.

IMPORTANT RULES:
1. All questions must be UNIQUE - no repetition or similar questions
2. Questions must be appropriate for {difficulty} level: {guidance}
3. NO overly simple or trivial questions (avoid "What is X?" unless absolutely necessary)
4. Ensure variety in question types and subtopics

Question Distribution:
- MCQ (Multiple Choice): {mcq_count} questions
- Descriptive (Short Answer): {descriptive_count} questions

For MCQ questions:
- Provide 4 distinct options
- Options should be plausible, not obviously wrong
- Only ONE correct answer
- Avoid "All of the above" or "None of the above" unless genuinely testing understanding

For Descriptive questions:
- Clear, specific questions that require 2-3 sentence answers
- Include expected key points in the correct_answer field

Return ONLY a JSON array in this EXACT format (no markdown, no code blocks):
[
  {{
    "question": "Question text here?",
    "type": "MCQ",
    "options": ["Option A", "Option B", "Option C", "Option D"],
    "correct_answer": "Option A"
  }},
  {{
    "question": "Descriptive question here?",
    "type": "Descriptive",
    "options": null,
    "correct_answer": "Expected answer with key points"
  }}
]

Topic: {topic}
Difficulty: {difficulty}
Total Questions: {count}"#,
        count = count,
        topic = topic,
        difficulty = difficulty.as_str(),
        guidance = difficulty_guidance(difficulty),
        mcq_count = mcq_count,
        descriptive_count = descriptive_count,
    )
}

/// Parse and validate a raw model response into exactly `expected` unique
/// questions. Rejects short/long batches and case-insensitive duplicates.
pub fn parse_generated_questions(
    raw_response: &str,
    expected: usize,
) -> Result<Vec<GeneratedQuestion>, GenerationError> {
    let json_content = extract_json(raw_response);

    let raw_questions: Vec<RawQuestion> = serde_json::from_str(&json_content)
        .map_err(|e| GenerationError::ParseFailed(e.to_string()))?;

    if raw_questions.len() != expected {
        return Err(GenerationError::CountMismatch {
            expected,
            actual: raw_questions.len(),
        });
    }

    let mut questions = Vec::with_capacity(raw_questions.len());
    for raw in raw_questions {
        let question_type = QuestionType::parse(&raw.question_type).ok_or_else(|| {
            GenerationError::ParseFailed(format!("Unknown question type '{}'", raw.question_type))
        })?;

        let kind = match question_type {
            QuestionType::Mcq => {
                let options = raw.options.unwrap_or_default();
                if options.is_empty() {
                    return Err(GenerationError::ParseFailed(
                        "MCQ question without options".to_string(),
                    ));
                }
                QuestionKind::Mcq { options }
            }
            QuestionType::Descriptive => QuestionKind::Descriptive,
        };

        questions.push(GeneratedQuestion {
            prompt: raw.question.trim().to_string(),
            kind,
            answer: raw.correct_answer,
        });
    }

    let mut seen = HashSet::new();
    for question in &questions {
        if !seen.insert(question.prompt.to_lowercase()) {
            return Err(GenerationError::DuplicateQuestions);
        }
    }

    Ok(questions)
}

/// AI-powered question generation plus history-based deduplication.
#[derive(Clone)]
pub struct QuestionGenerator {
    llm: LlmClient,
    db: Database,
}

impl QuestionGenerator {
    pub fn new(llm: LlmClient, db: Database) -> Self {
        Self { llm, db }
    }

    /// Produce exactly `count` unique questions for the topic, or fail.
    pub async fn generate(
        &self,
        topic: &str,
        difficulty: Difficulty,
        count: u32,
        descriptive_fraction: f64,
    ) -> Result<Vec<GeneratedQuestion>, GenerationError> {
        let (mcq_count, descriptive_count) = question_split(count, descriptive_fraction);

        info!(
            topic = %topic,
            difficulty = %difficulty.as_str(),
            count = count,
            mcq_count = mcq_count,
            descriptive_count = descriptive_count,
            "Generating test questions"
        );

        let prompt = build_generation_prompt(topic, difficulty, count, mcq_count, descriptive_count);
        let system_message =
            "You are an expert examiner. Always respond with valid JSON in the requested format.";

        let response_text = self
            .llm
            .generate(Some(system_message), &prompt)
            .await
            .map_err(|e| GenerationError::Upstream(e.to_string()))?;

        debug!(
            topic = %topic,
            response_length = response_text.len(),
            "Raw model response for question generation"
        );

        let questions = parse_generated_questions(&response_text, count as usize)?;

        info!(
            topic = %topic,
            question_count = questions.len(),
            "Successfully generated questions"
        );

        Ok(questions)
    }

    /// Drop candidates the user has already been asked on this topic.
    ///
    /// Exact case-insensitive match against historical prompts; read-only
    /// and idempotent. An empty result means the topic's question space is
    /// exhausted for this user - a terminal condition the caller surfaces.
    pub async fn filter_seen(
        &self,
        user_id: Uuid,
        topic: &str,
        candidates: Vec<GeneratedQuestion>,
    ) -> Result<Vec<GeneratedQuestion>> {
        let topic_normalized = normalize_topic(topic);
        let seen: HashSet<String> = self
            .db
            .seen_question_prompts(user_id, &topic_normalized)
            .await?
            .into_iter()
            .collect();

        let before = candidates.len();
        let unique: Vec<GeneratedQuestion> = candidates
            .into_iter()
            .filter(|q| !seen.contains(&q.prompt.to_lowercase()))
            .collect();

        if unique.len() < before {
            warn!(
                user_id = %user_id,
                topic = %topic,
                removed = before - unique.len(),
                remaining = unique.len(),
                "Filtered previously seen questions"
            );
        }

        Ok(unique)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mcq_json(question: &str) -> String {
        format!(
            r#"{{"question": "{}", "type": "MCQ", "options": ["A", "B", "C", "D"], "correct_answer": "A"}}"#,
            question
        )
    }

    #[test]
    fn test_question_split() {
        assert_eq!(question_split(10, 0.4), (6, 4));
        assert_eq!(question_split(10, 0.0), (10, 0));
        assert_eq!(question_split(10, 1.0), (0, 10));
        assert_eq!(question_split(5, 0.5), (2, 3)); // 2.5 rounds up
        assert_eq!(question_split(7, 0.4), (4, 3));
    }

    #[test]
    fn test_parse_valid_batch() {
        let response = format!(
            r#"[{}, {{"question": "Explain X.", "type": "Descriptive", "options": null, "correct_answer": "Key points"}}]"#,
            mcq_json("Pick one?")
        );

        let questions = parse_generated_questions(&response, 2).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].question_type(), QuestionType::Mcq);
        assert_eq!(questions[0].options().unwrap().len(), 4);
        assert_eq!(questions[1].question_type(), QuestionType::Descriptive);
        assert!(questions[1].options().is_none());
    }

    #[test]
    fn test_parse_strips_code_fences() {
        let response = format!("```json\n[{}]\n```", mcq_json("Fenced?"));
        let questions = parse_generated_questions(&response, 1).unwrap();
        assert_eq!(questions[0].prompt, "Fenced?");
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let response = format!("[{}, {}]", mcq_json("One?"), mcq_json("Two?"));
        let err = parse_generated_questions(&response, 10).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::CountMismatch {
                expected: 10,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_case_insensitive_duplicates_rejected() {
        let response = format!(
            "[{}, {}]",
            mcq_json("What is recursion?"),
            mcq_json("  WHAT IS RECURSION? ")
        );
        let err = parse_generated_questions(&response, 2).unwrap_err();
        assert!(matches!(err, GenerationError::DuplicateQuestions));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let err = parse_generated_questions("this is not json", 3).unwrap_err();
        assert!(matches!(err, GenerationError::ParseFailed(_)));
    }

    #[test]
    fn test_mcq_without_options_rejected() {
        let response =
            r#"[{"question": "Pick?", "type": "MCQ", "options": null, "correct_answer": "A"}]"#;
        let err = parse_generated_questions(response, 1).unwrap_err();
        assert!(matches!(err, GenerationError::ParseFailed(_)));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let response =
            r#"[{"question": "Q?", "type": "essay", "options": null, "correct_answer": "A"}]"#;
        let err = parse_generated_questions(response, 1).unwrap_err();
        assert!(matches!(err, GenerationError::ParseFailed(_)));
    }
}
