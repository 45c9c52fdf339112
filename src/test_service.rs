use std::collections::HashMap;

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::Database;
use crate::evaluator::{aggregate_score, evaluate_mcq, AnswerEvaluator};
use crate::gap_analysis::GapAnalyzer;
use crate::llm_client::LlmClient;
use crate::models::{
    normalize_topic, Question, QuestionType, Test, TestOutcome, TopicPerformance, UserStats,
};
use crate::question_generator::{GenerationError, QuestionGenerator};
use crate::test_session::{SessionError, SessionQuestion, TestConfig, TestSession};

#[derive(Debug, thiserror::Error)]
pub enum TestError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("No new questions available for this topic. You may have been tested on all aspects of it - try a different topic or difficulty level.")]
    TopicExhausted,

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Test not found")]
    NotFound,

    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

/// Orchestrates the test lifecycle: generation, deduplication, persistence,
/// evaluation and gap extraction.
#[derive(Clone)]
pub struct TestService {
    db: Database,
    generator: QuestionGenerator,
    evaluator: AnswerEvaluator,
    gap_analyzer: GapAnalyzer,
}

impl TestService {
    pub fn new(db: Database, llm: LlmClient) -> Self {
        Self {
            generator: QuestionGenerator::new(llm.clone(), db.clone()),
            evaluator: AnswerEvaluator::new(llm.clone()),
            gap_analyzer: GapAnalyzer::new(llm, db.clone()),
            db,
        }
    }

    /// Run the Setup -> Generating -> InProgress path: generate questions,
    /// drop ones the user has seen, persist the test with its questions in
    /// one transaction, and hand back the in-progress session.
    ///
    /// On any failure the session falls back to Setup and nothing is
    /// persisted.
    pub async fn start_test(
        &self,
        user_id: Uuid,
        config: TestConfig,
    ) -> Result<TestSession, TestError> {
        let mut session = TestSession::new(user_id, config);
        session.begin_generation()?;

        let config = session.config.clone();
        let generated = match self
            .generator
            .generate(
                &config.topic,
                config.difficulty,
                config.num_questions,
                config.descriptive_fraction,
            )
            .await
        {
            Ok(questions) => questions,
            Err(e) => {
                session.generation_failed();
                return Err(e.into());
            }
        };

        let unique = match self
            .generator
            .filter_seen(user_id, &config.topic, generated)
            .await
        {
            Ok(questions) => questions,
            Err(e) => {
                session.generation_failed();
                return Err(e.into());
            }
        };

        if unique.is_empty() {
            session.generation_failed();
            return Err(TestError::TopicExhausted);
        }

        if (unique.len() as u32) < config.num_questions {
            warn!(
                user_id = %user_id,
                topic = %config.topic,
                requested = config.num_questions,
                remaining = unique.len(),
                "Administering shorter test after removing seen questions"
            );
        }

        let test = Test {
            id: Uuid::new_v4(),
            user_id,
            topic: config.topic.trim().to_string(),
            topic_normalized: normalize_topic(&config.topic),
            difficulty: config.difficulty,
            total_questions: unique.len() as i64,
            completed: false,
            score: None,
            time_limit_secs: config.time_limit_secs.map(|secs| secs as i64),
            time_taken_secs: None,
            created_at: Utc::now(),
        };

        let questions: Vec<Question> = unique
            .iter()
            .enumerate()
            .map(|(index, generated)| Question {
                id: Uuid::new_v4(),
                test_id: test.id,
                position: index as i64 + 1,
                prompt: generated.prompt.clone(),
                question_type: generated.question_type(),
                options: generated.options().map(|options| options.to_vec()),
                correct_answer: generated.answer.clone(),
                user_answer: None,
                is_correct: None,
                score: None,
            })
            .collect();

        if let Err(e) = self.db.create_test_with_questions(&test, &questions).await {
            session.generation_failed();
            return Err(TestError::Database(e));
        }

        let session_questions: Vec<SessionQuestion> = questions
            .iter()
            .map(|question| SessionQuestion {
                id: question.id,
                position: question.position,
                prompt: question.prompt.clone(),
                question_type: question.question_type,
                options: question.options.clone(),
            })
            .collect();

        session.questions_ready(test.id, session_questions, Utc::now())?;

        info!(
            user_id = %user_id,
            test_id = %test.id,
            session_id = %session.id,
            question_count = test.total_questions,
            "Test started"
        );

        Ok(session)
    }

    /// Score a finished test and extract learning gaps, exactly once per
    /// test id. Re-entry for an already-completed test returns the stored
    /// outcome without re-scoring or duplicating gap rows.
    pub async fn finalize_test(
        &self,
        test_id: Uuid,
        answers: &HashMap<Uuid, String>,
        time_taken_secs: Option<i64>,
    ) -> Result<TestOutcome, TestError> {
        let test = self
            .db
            .get_test(test_id)
            .await?
            .ok_or(TestError::NotFound)?;

        if test.completed {
            info!(test_id = %test_id, "Test already completed, returning stored outcome");
            return Ok(self.stored_outcome(&test).await?);
        }

        let questions = self.db.get_test_questions(test_id).await?;

        let mut scores = Vec::with_capacity(questions.len());
        let mut correct_count = 0i64;

        for question in &questions {
            let user_answer = answers
                .get(&question.id)
                .map(String::as_str)
                .unwrap_or("");

            let evaluation = match question.question_type {
                QuestionType::Mcq => evaluate_mcq(&question.correct_answer, user_answer),
                QuestionType::Descriptive => {
                    self.evaluator
                        .evaluate_descriptive(
                            &test.topic,
                            &question.prompt,
                            &question.correct_answer,
                            user_answer,
                        )
                        .await
                }
            };

            self.db
                .record_answer(question.id, user_answer, evaluation.is_correct, evaluation.score)
                .await?;

            if evaluation.is_correct {
                correct_count += 1;
            }
            scores.push(evaluation.score);
        }

        let final_score = aggregate_score(&scores);
        self.db
            .complete_test(test_id, final_score, time_taken_secs)
            .await?;

        let gaps = self.gap_analyzer.analyze_test(test_id).await?;

        info!(
            test_id = %test_id,
            user_id = %test.user_id,
            score = final_score,
            correct_count = correct_count,
            gap_count = gaps.len(),
            "Test completed"
        );

        Ok(TestOutcome {
            test_id,
            score: final_score,
            correct_count,
            total_questions: questions.len() as i64,
            gaps,
        })
    }

    async fn stored_outcome(&self, test: &Test) -> Result<TestOutcome> {
        let questions = self.db.get_test_questions(test.id).await?;
        let correct_count = questions
            .iter()
            .filter(|q| q.is_correct.unwrap_or(false))
            .count() as i64;
        let gaps = self.db.get_test_gaps(test.id).await?;

        Ok(TestOutcome {
            test_id: test.id,
            score: test.score.unwrap_or(0.0),
            correct_count,
            total_questions: questions.len() as i64,
            gaps,
        })
    }

    // Listing and statistics passthroughs.

    pub async fn get_test(&self, test_id: Uuid) -> Result<Option<Test>> {
        self.db.get_test(test_id).await
    }

    pub async fn get_test_questions(&self, test_id: Uuid) -> Result<Vec<Question>> {
        self.db.get_test_questions(test_id).await
    }

    pub async fn get_user_tests(&self, user_id: Uuid) -> Result<Vec<Test>> {
        self.db.get_user_tests(user_id).await
    }

    pub async fn get_user_stats(&self, user_id: Uuid) -> Result<UserStats> {
        self.db.get_user_stats(user_id).await
    }

    pub async fn get_topic_performance(&self, user_id: Uuid) -> Result<Vec<TopicPerformance>> {
        self.db.get_topic_performance(user_id).await
    }
}
