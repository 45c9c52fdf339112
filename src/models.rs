use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lower-cases and trims a topic so equivalent spellings compare equal
/// for deduplication and gap grouping.
pub fn normalize_topic(topic: &str) -> String {
    topic.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
    #[serde(rename = "MCQ")]
    Mcq,
    Descriptive,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Mcq => "MCQ",
            QuestionType::Descriptive => "Descriptive",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "mcq" | "multiple_choice" => Some(QuestionType::Mcq),
            "descriptive" | "short_answer" => Some(QuestionType::Descriptive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapPriority {
    High,
    Medium,
    Low,
}

impl GapPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            GapPriority::High => "high",
            GapPriority::Medium => "medium",
            GapPriority::Low => "low",
        }
    }

    /// Model output is untrusted; anything unrecognized lands on `medium`
    /// so the priority invariant holds without discarding the gap.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "high" => GapPriority::High,
            "low" => GapPriority::Low,
            _ => GapPriority::Medium,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Test {
    pub id: Uuid,
    pub user_id: Uuid,
    pub topic: String,
    pub topic_normalized: String,
    pub difficulty: Difficulty,
    pub total_questions: i64,
    pub completed: bool,
    /// Defined only once `completed` is set.
    pub score: Option<f64>,
    pub time_limit_secs: Option<i64>,
    pub time_taken_secs: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub test_id: Uuid,
    pub position: i64,
    pub prompt: String,
    pub question_type: QuestionType,
    /// Present only for MCQ questions.
    pub options: Option<Vec<String>>,
    /// Correct option for MCQ, reference answer for Descriptive.
    pub correct_answer: String,
    pub user_answer: Option<String>,
    pub is_correct: Option<bool>,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gap {
    pub id: Uuid,
    pub user_id: Uuid,
    pub topic: String,
    pub topic_normalized: String,
    pub subtopic: Option<String>,
    pub priority: GapPriority,
    pub description: String,
    pub resolved: bool,
    pub test_id: Option<Uuid>,
    pub identified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyPlan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub target_date: DateTime<Utc>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanTask {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub topic: String,
    pub priority: GapPriority,
    pub estimated_minutes: i64,
    pub day_offset: i64,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStats {
    pub total_tests: i64,
    pub average_score: f64,
    pub topics_covered: i64,
    pub unresolved_gaps: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicPerformance {
    pub topic: String,
    pub average_score: f64,
    pub test_count: i64,
}

// Request/response shapes for the HTTP surface.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Username or email address.
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartTestRequest {
    pub user_id: Uuid,
    pub topic: String,
    pub difficulty: Difficulty,
    pub num_questions: u32,
    /// Share of descriptive questions in [0, 1]. Defaults to 0.4.
    pub descriptive_fraction: Option<f64>,
    pub time_limit_secs: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyPlanRequest {
    pub target_days: Option<u32>,
}

/// Final result of a completed test, returned by the completion handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestOutcome {
    pub test_id: Uuid,
    pub score: f64,
    pub correct_count: i64,
    pub total_questions: i64,
    pub gaps: Vec<Gap>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyPlanWithTasks {
    pub plan: StudyPlan,
    pub tasks: Vec<PlanTask>,
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub progress_percent: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_topic() {
        assert_eq!(normalize_topic("  Python Programming "), "python programming");
        assert_eq!(normalize_topic("PHYSICS"), "physics");
    }

    #[test]
    fn test_difficulty_parse() {
        assert_eq!(Difficulty::parse("Easy"), Some(Difficulty::Easy));
        assert_eq!(Difficulty::parse(" MEDIUM "), Some(Difficulty::Medium));
        assert_eq!(Difficulty::parse("brutal"), None);
    }

    #[test]
    fn test_question_type_parse() {
        assert_eq!(QuestionType::parse("MCQ"), Some(QuestionType::Mcq));
        assert_eq!(QuestionType::parse("multiple_choice"), Some(QuestionType::Mcq));
        assert_eq!(QuestionType::parse("descriptive"), Some(QuestionType::Descriptive));
        assert_eq!(QuestionType::parse("essay"), None);
    }

    #[test]
    fn test_gap_priority_lenient_parse() {
        assert_eq!(GapPriority::parse_lenient("HIGH"), GapPriority::High);
        assert_eq!(GapPriority::parse_lenient("low"), GapPriority::Low);
        assert_eq!(GapPriority::parse_lenient("urgent"), GapPriority::Medium);
        assert_eq!(GapPriority::parse_lenient(""), GapPriority::Medium);
    }

    #[test]
    fn test_question_type_serialization() {
        let json = serde_json::to_string(&QuestionType::Mcq).unwrap();
        assert_eq!(json, "\"MCQ\"");
        let back: QuestionType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, QuestionType::Mcq);
    }
}
