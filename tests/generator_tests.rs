use chrono::Utc;
use uuid::Uuid;

use gapmentor::{
    models::{normalize_topic, Difficulty, Question, QuestionType, Test, User},
    question_generator::{
        parse_generated_questions, GeneratedQuestion, QuestionKind, QuestionGenerator,
    },
    Database, GenerationError, LlmClient, ProviderKind,
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

fn candidate(prompt: &str) -> GeneratedQuestion {
    GeneratedQuestion {
        prompt: prompt.to_string(),
        kind: QuestionKind::Mcq {
            options: vec![
                "A".to_string(),
                "B".to_string(),
                "C".to_string(),
                "D".to_string(),
            ],
        },
        answer: "A".to_string(),
    }
}

async fn seed_history(db: &Database, topic: &str, prompts: &[&str]) -> Uuid {
    let user = User {
        id: Uuid::new_v4(),
        username: "student".to_string(),
        email: "student@example.com".to_string(),
        password_hash: "hash".to_string(),
        full_name: None,
        created_at: Utc::now(),
    };
    db.create_user(&user).await.unwrap();

    let test_id = Uuid::new_v4();
    let questions: Vec<Question> = prompts
        .iter()
        .enumerate()
        .map(|(index, prompt)| Question {
            id: Uuid::new_v4(),
            test_id,
            position: index as i64 + 1,
            prompt: prompt.to_string(),
            question_type: QuestionType::Mcq,
            options: Some(vec!["A".to_string(), "B".to_string()]),
            correct_answer: "A".to_string(),
            user_answer: None,
            is_correct: None,
            score: None,
        })
        .collect();

    let test = Test {
        id: test_id,
        user_id: user.id,
        topic: topic.to_string(),
        topic_normalized: normalize_topic(topic),
        difficulty: Difficulty::Easy,
        total_questions: questions.len() as i64,
        completed: true,
        score: Some(50.0),
        time_limit_secs: None,
        time_taken_secs: None,
        created_at: Utc::now(),
    };
    db.create_test_with_questions(&test, &questions).await.unwrap();

    user.id
}

#[tokio::test]
async fn test_filter_seen_drops_history_case_insensitively() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let user_id = seed_history(&db, "Computer Science", &["What is recursion?"]).await;
    let generator = QuestionGenerator::new(dead_llm(), db);

    let candidates = vec![
        candidate("WHAT IS RECURSION?"),
        candidate("Explain tail call optimization."),
    ];

    let unique = generator
        .filter_seen(user_id, "computer science", candidates)
        .await
        .unwrap();

    assert_eq!(unique.len(), 1);
    assert_eq!(unique[0].prompt, "Explain tail call optimization.");
}

#[tokio::test]
async fn test_filter_seen_is_idempotent() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let user_id = seed_history(&db, "Computer Science", &["What is recursion?"]).await;
    let generator = QuestionGenerator::new(dead_llm(), db);

    let candidates = vec![
        candidate("What is recursion?"),
        candidate("Explain tail call optimization."),
        candidate("Describe a stack overflow."),
    ];

    let once = generator
        .filter_seen(user_id, "Computer Science", candidates)
        .await
        .unwrap();
    let twice = generator
        .filter_seen(user_id, "Computer Science", once.clone())
        .await
        .unwrap();

    assert_eq!(once, twice);
    assert_eq!(twice.len(), 2);
}

#[tokio::test]
async fn test_filter_seen_ignores_other_topics() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let user_id = seed_history(&db, "Computer Science", &["What is recursion?"]).await;
    let generator = QuestionGenerator::new(dead_llm(), db);

    let unique = generator
        .filter_seen(user_id, "History", vec![candidate("What is recursion?")])
        .await
        .unwrap();

    // Same prompt, different topic: not a duplicate.
    assert_eq!(unique.len(), 1);
}

#[tokio::test]
async fn test_exhausted_topic_yields_empty_set() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let user_id = seed_history(
        &db,
        "Computer Science",
        &["What is recursion?", "Explain tail call optimization."],
    )
    .await;
    let generator = QuestionGenerator::new(dead_llm(), db);

    let unique = generator
        .filter_seen(
            user_id,
            "Computer Science",
            vec![
                candidate("What is recursion?"),
                candidate("explain tail call optimization."),
            ],
        )
        .await
        .unwrap();

    assert!(unique.is_empty());
}

#[tokio::test]
async fn test_unreachable_model_is_upstream_failure() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let generator = QuestionGenerator::new(dead_llm(), db);

    let result = generator
        .generate("Physics", Difficulty::Medium, 5, 0.4)
        .await;

    assert!(matches!(result, Err(GenerationError::Upstream(_))));
}

#[test]
fn test_short_batch_is_count_mismatch() {
    // The model returned 8 questions when 10 were requested.
    let batch: Vec<String> = (0..8)
        .map(|i| {
            format!(
                r#"{{"question": "Question {}?", "type": "MCQ", "options": ["A", "B", "C", "D"], "correct_answer": "A"}}"#,
                i
            )
        })
        .collect();
    let response = format!("[{}]", batch.join(","));

    let err = parse_generated_questions(&response, 10).unwrap_err();
    assert!(matches!(
        err,
        GenerationError::CountMismatch {
            expected: 10,
            actual: 8
        }
    ));
}
