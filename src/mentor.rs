use anyhow::Result;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::database::Database;
use crate::gap_analysis::{GapAnalyzer, UserContext};
use crate::llm_client::LlmClient;
use crate::models::ChatMessage;

const HISTORY_LIMIT: i64 = 50;

/// AI mentor chat grounded in the user's tests and learning gaps.
#[derive(Clone)]
pub struct MentorService {
    llm: LlmClient,
    db: Database,
    gap_analyzer: GapAnalyzer,
}

fn build_context_block(context: &UserContext) -> String {
    let mut block = String::new();

    if !context.recent_tests.is_empty() {
        block.push_str("Recent test results:\n");
        for test in &context.recent_tests {
            block.push_str(&format!(
                "- {} ({}): {:.1}%\n",
                test.topic,
                test.difficulty.as_str(),
                test.score.unwrap_or(0.0)
            ));
        }
    }

    if !context.gaps.is_empty() {
        block.push_str("Current learning gaps:\n");
        for gap in &context.gaps {
            block.push_str(&format!(
                "- {}{} (priority: {})\n",
                gap.topic,
                gap.subtopic
                    .as_ref()
                    .map(|subtopic| format!(": {}", subtopic))
                    .unwrap_or_default(),
                gap.priority.as_str()
            ));
        }
    }

    if block.is_empty() {
        block.push_str("No test history yet.\n");
    }

    block
}

impl MentorService {
    pub fn new(llm: LlmClient, db: Database) -> Self {
        Self {
            gap_analyzer: GapAnalyzer::new(llm.clone(), db.clone()),
            llm,
            db,
        }
    }

    /// Persist the student's message, answer it with the model using their
    /// learning context, persist and return the reply.
    pub async fn send_message(&self, user_id: Uuid, content: &str) -> Result<ChatMessage> {
        let content = content.trim();
        if content.is_empty() {
            anyhow::bail!("Message must not be empty");
        }

        let user_message = ChatMessage {
            id: Uuid::new_v4(),
            user_id,
            role: "user".to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.db.create_chat_message(&user_message).await?;

        let context = self.gap_analyzer.user_context(user_id).await?;
        let prompt = format!(
            r#"You are a friendly, encouraging study mentor for a student.

Student context:
{context}

Student's message: {message}

Respond helpfully in 2-4 short paragraphs. Where the student's known learning
gaps are relevant, work them into your guidance."#,
            context = build_context_block(&context),
            message = content,
        );

        let reply_text = self.llm.generate(None, &prompt).await?;

        let reply = ChatMessage {
            id: Uuid::new_v4(),
            user_id,
            role: "assistant".to_string(),
            content: reply_text.trim().to_string(),
            created_at: Utc::now(),
        };
        self.db.create_chat_message(&reply).await?;

        info!(user_id = %user_id, "Mentor reply delivered");
        Ok(reply)
    }

    pub async fn history(&self, user_id: Uuid) -> Result<Vec<ChatMessage>> {
        self.db.get_chat_history(user_id, HISTORY_LIMIT).await
    }

    pub async fn suggestions(&self, user_id: Uuid) -> Result<Vec<String>> {
        self.gap_analyzer.chat_suggestions(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Difficulty, Gap, GapPriority, Test};

    #[test]
    fn test_context_block_empty() {
        let context = UserContext {
            recent_tests: vec![],
            gaps: vec![],
        };
        assert_eq!(build_context_block(&context), "No test history yet.\n");
    }

    #[test]
    fn test_context_block_includes_tests_and_gaps() {
        let user_id = Uuid::new_v4();
        let context = UserContext {
            recent_tests: vec![Test {
                id: Uuid::new_v4(),
                user_id,
                topic: "Algebra".to_string(),
                topic_normalized: "algebra".to_string(),
                difficulty: Difficulty::Hard,
                total_questions: 10,
                completed: true,
                score: Some(42.5),
                time_limit_secs: None,
                time_taken_secs: None,
                created_at: Utc::now(),
            }],
            gaps: vec![Gap {
                id: Uuid::new_v4(),
                user_id,
                topic: "Algebra".to_string(),
                topic_normalized: "algebra".to_string(),
                subtopic: Some("Factoring".to_string()),
                priority: GapPriority::High,
                description: "Needs review".to_string(),
                resolved: false,
                test_id: None,
                identified_at: Utc::now(),
            }],
        };

        let block = build_context_block(&context);
        assert!(block.contains("Algebra (hard): 42.5%"));
        assert!(block.contains("Algebra: Factoring (priority: high)"));
    }
}
