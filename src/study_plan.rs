use anyhow::Result;
use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::Database;
use crate::llm_client::{parse_json_response, LlmClient};
use crate::models::{Gap, GapPriority, PlanTask, StudyPlan, StudyPlanWithTasks};

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("No unresolved learning gaps to plan around")]
    NoGaps,

    #[error("Upstream model call failed: {0}")]
    Upstream(String),

    #[error("Failed to parse model response: {0}")]
    ParseFailed(String),

    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    plan_name: String,
    description: Option<String>,
    tasks: Vec<RawTask>,
}

#[derive(Debug, Deserialize)]
struct RawTask {
    task_name: String,
    description: Option<String>,
    topic: String,
    priority: String,
    estimated_time: i64,
    day: i64,
}

/// Parse the model's study plan, coercing priorities and clamping day
/// offsets into the requested window.
fn parse_plan_response(
    response_text: &str,
    target_days: i64,
) -> Result<(String, Option<String>, Vec<(String, Option<String>, String, GapPriority, i64, i64)>), PlanError>
{
    let raw: RawPlan =
        parse_json_response(response_text).map_err(|e| PlanError::ParseFailed(e.to_string()))?;

    let tasks = raw
        .tasks
        .into_iter()
        .map(|task| {
            (
                task.task_name,
                task.description,
                task.topic,
                GapPriority::parse_lenient(&task.priority),
                task.estimated_time.max(0),
                task.day.clamp(1, target_days.max(1)),
            )
        })
        .collect();

    Ok((raw.plan_name, raw.description, tasks))
}

fn build_plan_prompt(gaps: &[Gap], target_days: u32) -> String {
    let gaps_str = gaps
        .iter()
        .map(|gap| {
            let mut line = format!("- {}", gap.topic);
            if let Some(subtopic) = &gap.subtopic {
                line.push_str(&format!(": {}", subtopic));
            }
            line.push_str(&format!(" (Priority: {})", gap.priority.as_str()));
            line
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Create a {days}-day personalized study plan for a student with these learning gaps:

{gaps}

Create a structured plan that:
1. Prioritizes high-priority gaps first
2. Breaks down topics into manageable daily tasks
3. Includes variety (reading, practice, revision)
4. Has realistic time estimates (30-120 minutes per task)
5. Builds progressively (easier to harder)

Return ONLY a JSON object (no markdown, no code blocks):
{{
  "plan_name": "Descriptive plan name",
  "description": "Brief overview of the plan",
  "tasks": [
    {{
      "task_name": "Task title",
      "description": "What to do",
      "topic": "Related topic",
      "priority": "high/medium/low",
      "estimated_time": 60,
      "day": 1
    }}
  ]
}}

Create {days} days worth of tasks (1-3 tasks per day)."#,
        days = target_days,
        gaps = gaps_str,
    )
}

/// Generates personalized study plans from unresolved learning gaps.
#[derive(Clone)]
pub struct StudyPlanner {
    llm: LlmClient,
    db: Database,
}

impl StudyPlanner {
    pub fn new(llm: LlmClient, db: Database) -> Self {
        Self { llm, db }
    }

    pub async fn generate_plan(
        &self,
        user_id: Uuid,
        target_days: u32,
    ) -> Result<StudyPlanWithTasks, PlanError> {
        let gaps = self.db.get_user_gaps(user_id, true).await?;
        if gaps.is_empty() {
            return Err(PlanError::NoGaps);
        }

        let prompt = build_plan_prompt(&gaps, target_days);
        let response_text = self
            .llm
            .generate(None, &prompt)
            .await
            .map_err(|e| PlanError::Upstream(e.to_string()))?;

        debug!(
            user_id = %user_id,
            response_length = response_text.len(),
            "Raw model response for study plan generation"
        );

        let (name, description, task_specs) =
            parse_plan_response(&response_text, target_days as i64)?;

        let now = Utc::now();
        let plan = StudyPlan {
            id: Uuid::new_v4(),
            user_id,
            name,
            description,
            target_date: now + Duration::days(target_days as i64),
            status: "active".to_string(),
            created_at: now,
        };

        let tasks: Vec<PlanTask> = task_specs
            .into_iter()
            .map(
                |(name, description, topic, priority, estimated_minutes, day_offset)| PlanTask {
                    id: Uuid::new_v4(),
                    plan_id: plan.id,
                    name,
                    description,
                    topic,
                    priority,
                    estimated_minutes,
                    day_offset,
                    completed: false,
                },
            )
            .collect();

        self.db.create_study_plan(&plan, &tasks).await?;

        info!(
            user_id = %user_id,
            plan_id = %plan.id,
            task_count = tasks.len(),
            "Study plan created"
        );

        let total = tasks.len() as i64;
        Ok(StudyPlanWithTasks {
            plan,
            tasks,
            total_tasks: total,
            completed_tasks: 0,
            progress_percent: 0,
        })
    }

    pub async fn active_plan(&self, user_id: Uuid) -> Result<Option<StudyPlanWithTasks>> {
        let plan = match self.db.get_active_study_plan(user_id).await? {
            Some(plan) => plan,
            None => return Ok(None),
        };

        let tasks = self.db.get_plan_tasks(plan.id).await?;
        let total = tasks.len() as i64;
        let completed = tasks.iter().filter(|task| task.completed).count() as i64;
        let progress = if total > 0 { completed * 100 / total } else { 0 };

        Ok(Some(StudyPlanWithTasks {
            plan,
            tasks,
            total_tasks: total,
            completed_tasks: completed,
            progress_percent: progress,
        }))
    }

    pub async fn complete_task(&self, task_id: Uuid) -> Result<bool> {
        self.db.complete_plan_task(task_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plan_response() {
        let response = r#"{
            "plan_name": "Algebra catch-up",
            "description": "Two weeks of drills",
            "tasks": [
                {"task_name": "Factor polynomials", "description": "Practice set", "topic": "Algebra", "priority": "high", "estimated_time": 60, "day": 1},
                {"task_name": "Review", "description": null, "topic": "Algebra", "priority": "someday", "estimated_time": -5, "day": 99}
            ]
        }"#;

        let (name, description, tasks) = parse_plan_response(response, 14).unwrap();
        assert_eq!(name, "Algebra catch-up");
        assert_eq!(description.as_deref(), Some("Two weeks of drills"));
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].3, GapPriority::High);
        // Unknown priority coerces, negative time and out-of-range day clamp.
        assert_eq!(tasks[1].3, GapPriority::Medium);
        assert_eq!(tasks[1].4, 0);
        assert_eq!(tasks[1].5, 14);
    }

    #[test]
    fn test_parse_plan_response_fenced() {
        let response = "```json\n{\"plan_name\": \"P\", \"description\": null, \"tasks\": []}\n```";
        let (name, _, tasks) = parse_plan_response(response, 7).unwrap();
        assert_eq!(name, "P");
        assert!(tasks.is_empty());
    }

    #[test]
    fn test_parse_plan_response_malformed() {
        assert!(matches!(
            parse_plan_response("nope", 7),
            Err(PlanError::ParseFailed(_))
        ));
    }
}
