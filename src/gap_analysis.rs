use std::collections::BTreeMap;

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::database::Database;
use crate::llm_client::{parse_json_response, LlmClient};
use crate::models::{Gap, GapPriority, Question, Test};

/// Number of generic gaps written when the model cannot be consulted.
const FALLBACK_GAP_CAP: usize = 3;

/// Gap record as the model returns it, before priority coercion.
#[derive(Debug, Deserialize)]
struct RawGap {
    subtopic: String,
    priority: String,
    description: Option<String>,
}

/// Learning context consumed by the mentor chat and study planner.
#[derive(Debug, Clone, Serialize)]
pub struct UserContext {
    pub recent_tests: Vec<Test>,
    pub gaps: Vec<Gap>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GapReport {
    pub total_gaps: i64,
    pub gaps_by_topic: BTreeMap<String, Vec<Gap>>,
    pub high_priority_count: i64,
    pub medium_priority_count: i64,
    pub low_priority_count: i64,
}

/// Derives prioritized learning gaps from incorrect test answers.
#[derive(Clone)]
pub struct GapAnalyzer {
    llm: LlmClient,
    db: Database,
}

/// Parse the model's gap list, coercing unknown priorities to `medium`.
pub fn parse_gap_response(response_text: &str) -> Result<Vec<(String, GapPriority, String)>> {
    let raw_gaps: Vec<RawGap> = parse_json_response(response_text)?;

    Ok(raw_gaps
        .into_iter()
        .map(|raw| {
            (
                raw.subtopic,
                GapPriority::parse_lenient(&raw.priority),
                raw.description.unwrap_or_default(),
            )
        })
        .collect())
}

/// The deterministic substitute when the model call fails: one generic gap
/// per missed question, capped at three.
pub fn fallback_gap_specs(
    topic: &str,
    missed_count: usize,
) -> Vec<(String, GapPriority, String)> {
    (0..missed_count.min(FALLBACK_GAP_CAP))
        .map(|_| {
            (
                topic.to_string(),
                GapPriority::Medium,
                "Needs review".to_string(),
            )
        })
        .collect()
}

fn build_analysis_prompt(test: &Test, missed: &[Question]) -> String {
    let questions_str = missed
        .iter()
        .map(|q| format!("- {}", q.prompt))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Analyze these incorrect answers from a test on "{topic}" at {difficulty} difficulty.

Incorrect Questions:
{questions}

Identify 3-5 specific learning gaps or subtopics the student needs to work on.

Return ONLY a JSON array with no markdown formatting:
[
  {{
    "subtopic": "Specific concept or subtopic",
    "priority": "high",
    "description": "Brief description of what needs improvement"
  }}
]

Important: Return valid JSON only, no code blocks or markdown."#,
        topic = test.topic,
        difficulty = test.difficulty.as_str(),
        questions = questions_str,
    )
}

impl GapAnalyzer {
    pub fn new(llm: LlmClient, db: Database) -> Self {
        Self { llm, db }
    }

    /// Analyze a completed test and persist the resulting gaps.
    ///
    /// No incorrect answers means an empty result and zero rows written.
    /// A model failure degrades to generic fallback gaps; persistence is
    /// never skipped while qualifying wrong answers exist.
    pub async fn analyze_test(&self, test_id: Uuid) -> Result<Vec<Gap>> {
        let test = self
            .db
            .get_test(test_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Test '{}' not found for gap analysis", test_id))?;

        let missed = self.db.get_incorrect_questions(test_id).await?;

        if missed.is_empty() {
            info!(test_id = %test_id, "No incorrect answers, no gaps to extract");
            return Ok(Vec::new());
        }

        let specs = match self.request_gap_analysis(&test, &missed).await {
            Ok(specs) if !specs.is_empty() => specs,
            Ok(_) => {
                warn!(test_id = %test_id, "Model returned no gaps, using fallback");
                fallback_gap_specs(&test.topic, missed.len())
            }
            Err(e) => {
                warn!(
                    test_id = %test_id,
                    error = %e,
                    "Gap analysis call failed, using fallback"
                );
                fallback_gap_specs(&test.topic, missed.len())
            }
        };

        let mut gaps = Vec::with_capacity(specs.len());
        for (subtopic, priority, description) in specs {
            let gap = Gap {
                id: Uuid::new_v4(),
                user_id: test.user_id,
                topic: test.topic.clone(),
                topic_normalized: test.topic_normalized.clone(),
                subtopic: Some(subtopic),
                priority,
                description,
                resolved: false,
                test_id: Some(test.id),
                identified_at: Utc::now(),
            };
            self.db.create_gap(&gap).await?;
            gaps.push(gap);
        }

        info!(
            test_id = %test_id,
            user_id = %test.user_id,
            gap_count = gaps.len(),
            "Learning gaps persisted"
        );

        Ok(gaps)
    }

    async fn request_gap_analysis(
        &self,
        test: &Test,
        missed: &[Question],
    ) -> Result<Vec<(String, GapPriority, String)>> {
        let prompt = build_analysis_prompt(test, missed);
        let response_text = self.llm.generate(None, &prompt).await?;

        debug!(
            test_id = %test.id,
            response_length = response_text.len(),
            "Raw model response for gap analysis"
        );

        parse_gap_response(&response_text)
    }

    /// Recent completed tests and top unresolved gaps, for downstream
    /// prompt grounding.
    pub async fn user_context(&self, user_id: Uuid) -> Result<UserContext> {
        let recent_tests = self.db.get_recent_completed_tests(user_id, 5).await?;
        let mut gaps = self.db.get_user_gaps(user_id, true).await?;
        gaps.truncate(10);

        Ok(UserContext { recent_tests, gaps })
    }

    /// Suggested conversation starters based on high-priority gaps and
    /// recent poor performance.
    pub async fn chat_suggestions(&self, user_id: Uuid) -> Result<Vec<String>> {
        let context = self.user_context(user_id).await?;

        let mut suggestions = Vec::new();

        for gap in context.gaps.iter().take(3) {
            if gap.priority == GapPriority::High {
                match &gap.subtopic {
                    Some(subtopic) => suggestions
                        .push(format!("Help me understand {} in {}", subtopic, gap.topic)),
                    None => suggestions.push(format!("Explain {} concepts", gap.topic)),
                }
            }
        }

        for test in context.recent_tests.iter().take(2) {
            if test.score.unwrap_or(100.0) < 60.0 {
                suggestions.push(format!("I need help with {}", test.topic));
            }
        }

        if suggestions.is_empty() {
            suggestions = vec![
                "What should I focus on improving?".to_string(),
                "Can you give me practice problems?".to_string(),
                "Explain a difficult concept to me".to_string(),
                "How can I improve my study habits?".to_string(),
            ];
        }

        suggestions.truncate(4);
        Ok(suggestions)
    }

    pub async fn list_gaps(&self, user_id: Uuid, unresolved_only: bool) -> Result<Vec<Gap>> {
        self.db.get_user_gaps(user_id, unresolved_only).await
    }

    /// Resolution is driven externally (study plans, user action), not by
    /// the analyzer itself.
    pub async fn mark_resolved(&self, gap_id: Uuid) -> Result<bool> {
        self.db.resolve_gap(gap_id).await
    }

    /// Unresolved gaps grouped by topic with per-priority counts.
    pub async fn gap_report(&self, user_id: Uuid) -> Result<GapReport> {
        let gaps = self.db.get_user_gaps(user_id, true).await?;

        let mut high = 0;
        let mut medium = 0;
        let mut low = 0;
        let mut by_topic: BTreeMap<String, Vec<Gap>> = BTreeMap::new();

        for gap in gaps {
            match gap.priority {
                GapPriority::High => high += 1,
                GapPriority::Medium => medium += 1,
                GapPriority::Low => low += 1,
            }
            by_topic.entry(gap.topic.clone()).or_default().push(gap);
        }

        Ok(GapReport {
            total_gaps: high + medium + low,
            gaps_by_topic: by_topic,
            high_priority_count: high,
            medium_priority_count: medium,
            low_priority_count: low,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gap_response_valid() {
        let response = r#"[
            {"subtopic": "Recursion base cases", "priority": "high", "description": "Misses termination"},
            {"subtopic": "Stack frames", "priority": "sideways", "description": null}
        ]"#;

        let specs = parse_gap_response(response).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].0, "Recursion base cases");
        assert_eq!(specs[0].1, GapPriority::High);
        // Unknown priority coerces to medium, missing description to empty.
        assert_eq!(specs[1].1, GapPriority::Medium);
        assert_eq!(specs[1].2, "");
    }

    #[test]
    fn test_parse_gap_response_fenced() {
        let response = "```json\n[{\"subtopic\": \"X\", \"priority\": \"low\", \"description\": \"d\"}]\n```";
        let specs = parse_gap_response(response).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].1, GapPriority::Low);
    }

    #[test]
    fn test_parse_gap_response_malformed() {
        assert!(parse_gap_response("no json here").is_err());
    }

    #[test]
    fn test_fallback_specs_capped_at_three() {
        let specs = fallback_gap_specs("Geometry", 7);
        assert_eq!(specs.len(), 3);
        for (subtopic, priority, description) in &specs {
            assert_eq!(subtopic, "Geometry");
            assert_eq!(*priority, GapPriority::Medium);
            assert_eq!(description, "Needs review");
        }

        assert_eq!(fallback_gap_specs("Geometry", 2).len(), 2);
        assert!(fallback_gap_specs("Geometry", 0).is_empty());
    }
}
