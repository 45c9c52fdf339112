use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Difficulty, QuestionType};

/// Linear session lifecycle: Setup -> Generating -> InProgress -> Completed.
/// The only loops back are "start over" from Completed and the generation
/// failure path from Generating back to Setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Setup,
    Generating,
    InProgress,
    Completed,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Setup => "setup",
            SessionPhase::Generating => "generating",
            SessionPhase::InProgress => "in_progress",
            SessionPhase::Completed => "completed",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Operation '{action}' is not valid in the '{phase}' phase")]
    InvalidPhase {
        action: &'static str,
        phase: &'static str,
    },

    #[error("A test can only be submitted from its last question")]
    NotAtLastQuestion,
}

/// Test parameters collected during Setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfig {
    pub topic: String,
    pub difficulty: Difficulty,
    pub num_questions: u32,
    pub descriptive_fraction: f64,
    pub time_limit_secs: Option<u32>,
}

/// What the test taker sees: the question without its correct answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionQuestion {
    pub id: Uuid,
    pub position: i64,
    pub prompt: String,
    pub question_type: QuestionType,
    pub options: Option<Vec<String>>,
}

/// One user's active test interaction. Owned by a single user-device
/// interaction at a time; the surrounding map mutex serializes access.
#[derive(Debug, Clone)]
pub struct TestSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub config: TestConfig,
    pub phase: SessionPhase,
    pub test_id: Option<Uuid>,
    pub questions: Vec<SessionQuestion>,
    pub current_index: usize,
    /// Question id -> recorded answer, last write wins.
    pub answers: HashMap<Uuid, String>,
    pub started_at: Option<DateTime<Utc>>,
}

impl TestSession {
    pub fn new(user_id: Uuid, config: TestConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            config,
            phase: SessionPhase::Setup,
            test_id: None,
            questions: Vec::new(),
            current_index: 0,
            answers: HashMap::new(),
            started_at: None,
        }
    }

    fn require_phase(
        &self,
        expected: SessionPhase,
        action: &'static str,
    ) -> Result<(), SessionError> {
        if self.phase != expected {
            return Err(SessionError::InvalidPhase {
                action,
                phase: self.phase.as_str(),
            });
        }
        Ok(())
    }

    /// Setup -> Generating. Validates the collected configuration.
    pub fn begin_generation(&mut self) -> Result<(), SessionError> {
        self.require_phase(SessionPhase::Setup, "begin_generation")?;

        if self.config.topic.trim().is_empty() {
            return Err(SessionError::Validation("Topic must not be empty".to_string()));
        }
        if self.config.num_questions == 0 {
            return Err(SessionError::Validation(
                "Question count must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.config.descriptive_fraction) {
            return Err(SessionError::Validation(
                "Descriptive fraction must be between 0 and 1".to_string(),
            ));
        }

        self.phase = SessionPhase::Generating;
        Ok(())
    }

    /// Generating -> Setup, after a failed generation attempt. The user can
    /// retry from the configuration step.
    pub fn generation_failed(&mut self) {
        if self.phase == SessionPhase::Generating {
            self.phase = SessionPhase::Setup;
        }
    }

    /// Generating -> InProgress, once questions are persisted.
    pub fn questions_ready(
        &mut self,
        test_id: Uuid,
        questions: Vec<SessionQuestion>,
        now: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        self.require_phase(SessionPhase::Generating, "questions_ready")?;

        self.test_id = Some(test_id);
        self.questions = questions;
        self.current_index = 0;
        self.answers.clear();
        self.started_at = Some(now);
        self.phase = SessionPhase::InProgress;
        Ok(())
    }

    pub fn current_question(&self) -> Option<&SessionQuestion> {
        self.questions.get(self.current_index)
    }

    pub fn at_last_question(&self) -> bool {
        !self.questions.is_empty() && self.current_index == self.questions.len() - 1
    }

    /// Move back one question; blocked at index 0.
    pub fn previous(&mut self) -> Result<(), SessionError> {
        self.require_phase(SessionPhase::InProgress, "previous")?;
        self.current_index = self.current_index.saturating_sub(1);
        Ok(())
    }

    /// Advance without requiring an answer; blocked at the last index.
    pub fn skip(&mut self) -> Result<(), SessionError> {
        self.require_phase(SessionPhase::InProgress, "skip")?;
        if self.current_index + 1 < self.questions.len() {
            self.current_index += 1;
        }
        Ok(())
    }

    /// Record an answer for the current question and advance.
    pub fn record_answer(&mut self, answer: String) -> Result<(), SessionError> {
        self.require_phase(SessionPhase::InProgress, "record_answer")?;

        let question_id = self
            .current_question()
            .map(|q| q.id)
            .ok_or(SessionError::Validation("No current question".to_string()))?;

        self.answers.insert(question_id, answer);

        if self.current_index + 1 < self.questions.len() {
            self.current_index += 1;
        }
        Ok(())
    }

    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        self.started_at
            .map(|started| (now - started).num_seconds().max(0))
    }

    /// Whether the configured wall-clock limit has been reached.
    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        match (self.config.time_limit_secs, self.elapsed_secs(now)) {
            (Some(limit), Some(elapsed)) => elapsed >= limit as i64,
            _ => false,
        }
    }

    /// InProgress -> Completed. Without `force`, only allowed from the last
    /// question; `force` models timer expiry and preserves whatever answers
    /// were recorded.
    pub fn complete(&mut self, force: bool) -> Result<(), SessionError> {
        self.require_phase(SessionPhase::InProgress, "complete")?;
        if !force && !self.at_last_question() {
            return Err(SessionError::NotAtLastQuestion);
        }
        self.phase = SessionPhase::Completed;
        Ok(())
    }

    /// Completed -> Setup, keeping the configuration for another run.
    pub fn start_over(&mut self) -> Result<(), SessionError> {
        self.require_phase(SessionPhase::Completed, "start_over")?;
        self.test_id = None;
        self.questions.clear();
        self.answers.clear();
        self.current_index = 0;
        self.started_at = None;
        self.phase = SessionPhase::Setup;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(topic: &str) -> TestConfig {
        TestConfig {
            topic: topic.to_string(),
            difficulty: Difficulty::Medium,
            num_questions: 3,
            descriptive_fraction: 0.4,
            time_limit_secs: None,
        }
    }

    fn question(position: i64) -> SessionQuestion {
        SessionQuestion {
            id: Uuid::new_v4(),
            position,
            prompt: format!("Question {}?", position),
            question_type: QuestionType::Mcq,
            options: Some(vec!["A".to_string(), "B".to_string()]),
        }
    }

    fn in_progress_session() -> TestSession {
        let mut session = TestSession::new(Uuid::new_v4(), config("Algebra"));
        session.begin_generation().unwrap();
        session
            .questions_ready(
                Uuid::new_v4(),
                vec![question(1), question(2), question(3)],
                Utc::now(),
            )
            .unwrap();
        session
    }

    #[test]
    fn test_linear_phase_walk() {
        let mut session = TestSession::new(Uuid::new_v4(), config("Algebra"));
        assert_eq!(session.phase, SessionPhase::Setup);

        session.begin_generation().unwrap();
        assert_eq!(session.phase, SessionPhase::Generating);

        session
            .questions_ready(Uuid::new_v4(), vec![question(1)], Utc::now())
            .unwrap();
        assert_eq!(session.phase, SessionPhase::InProgress);

        session.complete(false).unwrap();
        assert_eq!(session.phase, SessionPhase::Completed);

        session.start_over().unwrap();
        assert_eq!(session.phase, SessionPhase::Setup);
        assert!(session.test_id.is_none());
        assert!(session.questions.is_empty());
    }

    #[test]
    fn test_empty_topic_blocks_generation() {
        let mut session = TestSession::new(Uuid::new_v4(), config("   "));
        let err = session.begin_generation().unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));
        assert_eq!(session.phase, SessionPhase::Setup);
    }

    #[test]
    fn test_generation_failure_returns_to_setup() {
        let mut session = TestSession::new(Uuid::new_v4(), config("Algebra"));
        session.begin_generation().unwrap();
        session.generation_failed();
        assert_eq!(session.phase, SessionPhase::Setup);
        // Retry is allowed.
        session.begin_generation().unwrap();
        assert_eq!(session.phase, SessionPhase::Generating);
    }

    #[test]
    fn test_previous_blocked_at_first_index() {
        let mut session = in_progress_session();
        assert_eq!(session.current_index, 0);
        session.previous().unwrap();
        assert_eq!(session.current_index, 0);
    }

    #[test]
    fn test_skip_clamped_at_last_index() {
        let mut session = in_progress_session();
        session.skip().unwrap();
        session.skip().unwrap();
        assert!(session.at_last_question());
        session.skip().unwrap();
        assert_eq!(session.current_index, 2);
    }

    #[test]
    fn test_record_answer_advances_and_last_write_wins() {
        let mut session = in_progress_session();
        let first_id = session.questions[0].id;

        session.record_answer("A".to_string()).unwrap();
        assert_eq!(session.current_index, 1);

        session.previous().unwrap();
        session.record_answer("B".to_string()).unwrap();
        assert_eq!(session.answers.get(&first_id).unwrap(), "B");
        assert_eq!(session.answers.len(), 1);
    }

    #[test]
    fn test_complete_requires_last_question_unless_forced() {
        let mut session = in_progress_session();
        let err = session.complete(false).unwrap_err();
        assert!(matches!(err, SessionError::NotAtLastQuestion));
        assert_eq!(session.phase, SessionPhase::InProgress);

        session.complete(true).unwrap();
        assert_eq!(session.phase, SessionPhase::Completed);
    }

    #[test]
    fn test_expiry_against_time_limit() {
        let mut timed_config = config("Algebra");
        timed_config.time_limit_secs = Some(60);

        let mut session = TestSession::new(Uuid::new_v4(), timed_config);
        session.begin_generation().unwrap();
        let started = Utc::now();
        session
            .questions_ready(Uuid::new_v4(), vec![question(1)], started)
            .unwrap();

        assert!(!session.expired(started + chrono::Duration::seconds(59)));
        assert!(session.expired(started + chrono::Duration::seconds(60)));
        assert!(session.expired(started + chrono::Duration::seconds(3600)));
    }

    #[test]
    fn test_no_time_limit_never_expires() {
        let session = in_progress_session();
        assert!(!session.expired(Utc::now() + chrono::Duration::days(30)));
    }

    #[test]
    fn test_operations_rejected_in_wrong_phase() {
        let mut session = TestSession::new(Uuid::new_v4(), config("Algebra"));
        assert!(matches!(
            session.previous(),
            Err(SessionError::InvalidPhase { .. })
        ));
        assert!(matches!(
            session.record_answer("A".to_string()),
            Err(SessionError::InvalidPhase { .. })
        ));
        assert!(matches!(
            session.start_over(),
            Err(SessionError::InvalidPhase { .. })
        ));
    }
}
