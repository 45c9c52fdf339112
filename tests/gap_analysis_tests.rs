use chrono::Utc;
use uuid::Uuid;

use gapmentor::{
    models::{normalize_topic, Difficulty, Gap, GapPriority, Question, QuestionType, Test, User},
    Database, GapAnalyzer, LlmClient, ProviderKind,
};

fn dead_llm() -> LlmClient {
    LlmClient::new(
        ProviderKind::Gemini,
        "test-key".to_string(),
        Some("http://127.0.0.1:1".to_string()),
        None,
        1,
    )
    .unwrap()
}

async fn seed_user(db: &Database) -> Uuid {
    let user = User {
        id: Uuid::new_v4(),
        username: "student".to_string(),
        email: "student@example.com".to_string(),
        password_hash: "hash".to_string(),
        full_name: None,
        created_at: Utc::now(),
    };
    db.create_user(&user).await.unwrap();
    user.id
}

/// Completed test with `wrong` incorrect questions and one correct one.
async fn seed_completed_test(db: &Database, user_id: Uuid, topic: &str, wrong: usize) -> Uuid {
    let test_id = Uuid::new_v4();
    let mut questions = Vec::new();

    for position in 0..wrong {
        questions.push(Question {
            id: Uuid::new_v4(),
            test_id,
            position: position as i64 + 1,
            prompt: format!("Missed question {}?", position + 1),
            question_type: QuestionType::Mcq,
            options: Some(vec!["A".to_string(), "B".to_string()]),
            correct_answer: "A".to_string(),
            user_answer: Some("B".to_string()),
            is_correct: Some(false),
            score: Some(0.0),
        });
    }
    questions.push(Question {
        id: Uuid::new_v4(),
        test_id,
        position: wrong as i64 + 1,
        prompt: "Correct question?".to_string(),
        question_type: QuestionType::Mcq,
        options: Some(vec!["A".to_string(), "B".to_string()]),
        correct_answer: "A".to_string(),
        user_answer: Some("A".to_string()),
        is_correct: Some(true),
        score: Some(100.0),
    });

    let test = Test {
        id: test_id,
        user_id,
        topic: topic.to_string(),
        topic_normalized: normalize_topic(topic),
        difficulty: Difficulty::Medium,
        total_questions: questions.len() as i64,
        completed: false,
        score: None,
        time_limit_secs: None,
        time_taken_secs: None,
        created_at: Utc::now(),
    };
    db.create_test_with_questions(&test, &questions).await.unwrap();

    let score = 100.0 * (1.0 / questions.len() as f64);
    db.complete_test(test_id, score, None).await.unwrap();

    test_id
}

#[tokio::test]
async fn test_model_failure_writes_capped_fallback_gaps() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let user_id = seed_user(&db).await;
    let analyzer = GapAnalyzer::new(dead_llm(), db.clone());

    // Two missed questions and an unreachable model: exactly min(2, 3) = 2
    // generic gaps must be written.
    let test_id = seed_completed_test(&db, user_id, "World History", 2).await;
    let gaps = analyzer.analyze_test(test_id).await.unwrap();

    assert_eq!(gaps.len(), 2);
    for gap in &gaps {
        assert_eq!(gap.subtopic.as_deref(), Some("World History"));
        assert_eq!(gap.priority, GapPriority::Medium);
        assert_eq!(gap.description, "Needs review");
        assert_eq!(gap.topic_normalized, "world history");
    }

    let persisted = db.get_test_gaps(test_id).await.unwrap();
    assert_eq!(persisted.len(), 2);
}

#[tokio::test]
async fn test_fallback_cap_applies_to_many_misses() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let user_id = seed_user(&db).await;
    let analyzer = GapAnalyzer::new(dead_llm(), db.clone());

    let test_id = seed_completed_test(&db, user_id, "Algebra", 7).await;
    let gaps = analyzer.analyze_test(test_id).await.unwrap();

    assert_eq!(gaps.len(), 3);
}

#[tokio::test]
async fn test_no_incorrect_answers_writes_nothing() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let user_id = seed_user(&db).await;
    let analyzer = GapAnalyzer::new(dead_llm(), db.clone());

    let test_id = seed_completed_test(&db, user_id, "Algebra", 0).await;
    let gaps = analyzer.analyze_test(test_id).await.unwrap();

    assert!(gaps.is_empty());
    assert!(db.get_test_gaps(test_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_user_context_collects_tests_and_gaps() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let user_id = seed_user(&db).await;
    let analyzer = GapAnalyzer::new(dead_llm(), db.clone());

    let test_id = seed_completed_test(&db, user_id, "Algebra", 2).await;
    analyzer.analyze_test(test_id).await.unwrap();

    let context = analyzer.user_context(user_id).await.unwrap();
    assert_eq!(context.recent_tests.len(), 1);
    assert_eq!(context.recent_tests[0].topic, "Algebra");
    assert_eq!(context.gaps.len(), 2);
}

#[tokio::test]
async fn test_suggestions_reflect_high_priority_gaps() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let user_id = seed_user(&db).await;
    let analyzer = GapAnalyzer::new(dead_llm(), db.clone());

    let gap = Gap {
        id: Uuid::new_v4(),
        user_id,
        topic: "Calculus".to_string(),
        topic_normalized: "calculus".to_string(),
        subtopic: Some("Integration by parts".to_string()),
        priority: GapPriority::High,
        description: "Weak area".to_string(),
        resolved: false,
        test_id: None,
        identified_at: Utc::now(),
    };
    db.create_gap(&gap).await.unwrap();

    let suggestions = analyzer.chat_suggestions(user_id).await.unwrap();
    assert!(suggestions
        .iter()
        .any(|s| s.contains("Integration by parts") && s.contains("Calculus")));
}

#[tokio::test]
async fn test_gap_report_groups_and_counts() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let user_id = seed_user(&db).await;
    let analyzer = GapAnalyzer::new(dead_llm(), db.clone());

    for (topic, priority) in [
        ("Algebra", GapPriority::High),
        ("Algebra", GapPriority::Medium),
        ("History", GapPriority::Low),
    ] {
        let gap = Gap {
            id: Uuid::new_v4(),
            user_id,
            topic: topic.to_string(),
            topic_normalized: normalize_topic(topic),
            subtopic: None,
            priority,
            description: "Needs review".to_string(),
            resolved: false,
            test_id: None,
            identified_at: Utc::now(),
        };
        db.create_gap(&gap).await.unwrap();
    }

    let report = analyzer.gap_report(user_id).await.unwrap();
    assert_eq!(report.total_gaps, 3);
    assert_eq!(report.high_priority_count, 1);
    assert_eq!(report.medium_priority_count, 1);
    assert_eq!(report.low_priority_count, 1);
    assert_eq!(report.gaps_by_topic.len(), 2);
    assert_eq!(report.gaps_by_topic["Algebra"].len(), 2);
}
