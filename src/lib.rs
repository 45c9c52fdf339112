pub mod api;
pub mod auth;
pub mod config;
pub mod database;
pub mod errors;
pub mod evaluator;
pub mod gap_analysis;
pub mod llm_client;
pub mod logging;
pub mod mentor;
pub mod models;
pub mod question_generator;
pub mod study_plan;
pub mod test_service;
pub mod test_session;

#[cfg(test)]
mod tests {
    mod session_flow_test;
}

pub use auth::AuthService;
pub use config::Config;
pub use database::Database;
pub use errors::*;
pub use evaluator::AnswerEvaluator;
pub use gap_analysis::GapAnalyzer;
pub use llm_client::{LlmClient, ProviderKind};
pub use mentor::MentorService;
pub use models::*;
pub use question_generator::{GenerationError, QuestionGenerator};
pub use study_plan::StudyPlanner;
pub use test_service::{TestError, TestService};
pub use test_session::{SessionPhase, TestConfig, TestSession};
