use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::*;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url).await?;
        let db = Database { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                full_name TEXT,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tests (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                topic TEXT NOT NULL,
                topic_normalized TEXT NOT NULL,
                difficulty TEXT NOT NULL,
                total_questions INTEGER NOT NULL,
                completed INTEGER NOT NULL DEFAULT 0,
                score REAL,
                time_limit_secs INTEGER,
                time_taken_secs INTEGER,
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS questions (
                id TEXT PRIMARY KEY,
                test_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                prompt TEXT NOT NULL,
                question_type TEXT NOT NULL,
                options TEXT,
                correct_answer TEXT NOT NULL,
                user_answer TEXT,
                is_correct INTEGER,
                score REAL,
                FOREIGN KEY (test_id) REFERENCES tests(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS gaps (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                topic TEXT NOT NULL,
                topic_normalized TEXT NOT NULL,
                subtopic TEXT,
                priority TEXT NOT NULL,
                description TEXT NOT NULL,
                resolved INTEGER NOT NULL DEFAULT 0,
                test_id TEXT,
                identified_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (test_id) REFERENCES tests(id) ON DELETE SET NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS study_plans (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                target_date TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS plan_tasks (
                id TEXT PRIMARY KEY,
                plan_id TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                topic TEXT NOT NULL,
                priority TEXT NOT NULL,
                estimated_minutes INTEGER NOT NULL,
                day_offset INTEGER NOT NULL,
                completed INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (plan_id) REFERENCES study_plans(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_messages (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ==================== User operations ====================

    pub async fn create_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, full_name, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_user).transpose()
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE username = ?1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_user).transpose()
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_user).transpose()
    }

    // ==================== Test operations ====================

    /// Persist a test header together with its questions in one transaction.
    /// A failure anywhere leaves no partial test behind.
    pub async fn create_test_with_questions(
        &self,
        test: &Test,
        questions: &[Question],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO tests (id, user_id, topic, topic_normalized, difficulty,
                               total_questions, completed, score, time_limit_secs,
                               time_taken_secs, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(test.id.to_string())
        .bind(test.user_id.to_string())
        .bind(&test.topic)
        .bind(&test.topic_normalized)
        .bind(test.difficulty.as_str())
        .bind(test.total_questions)
        .bind(test.completed)
        .bind(test.score)
        .bind(test.time_limit_secs)
        .bind(test.time_taken_secs)
        .bind(test.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for question in questions {
            let options_json = question
                .options
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;

            sqlx::query(
                r#"
                INSERT INTO questions (id, test_id, position, prompt, question_type,
                                       options, correct_answer, user_answer, is_correct, score)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(question.id.to_string())
            .bind(question.test_id.to_string())
            .bind(question.position)
            .bind(&question.prompt)
            .bind(question.question_type.as_str())
            .bind(options_json)
            .bind(&question.correct_answer)
            .bind(&question.user_answer)
            .bind(question.is_correct)
            .bind(question.score)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_test(&self, id: Uuid) -> Result<Option<Test>> {
        let row = sqlx::query("SELECT * FROM tests WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_test).transpose()
    }

    /// All tests for a user, newest first. Tests whose question batch never
    /// made it to disk (header only) are treated as invalid and excluded.
    pub async fn get_user_tests(&self, user_id: Uuid) -> Result<Vec<Test>> {
        let rows = sqlx::query(
            r#"
            SELECT t.* FROM tests t
            WHERE t.user_id = ?1
              AND EXISTS (SELECT 1 FROM questions q WHERE q.test_id = t.id)
            ORDER BY t.created_at DESC
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_test).collect()
    }

    pub async fn get_test_questions(&self, test_id: Uuid) -> Result<Vec<Question>> {
        let rows = sqlx::query("SELECT * FROM questions WHERE test_id = ?1 ORDER BY position")
            .bind(test_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(row_to_question).collect()
    }

    pub async fn get_incorrect_questions(&self, test_id: Uuid) -> Result<Vec<Question>> {
        let rows = sqlx::query(
            "SELECT * FROM questions WHERE test_id = ?1 AND is_correct = 0 ORDER BY position",
        )
        .bind(test_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_question).collect()
    }

    pub async fn record_answer(
        &self,
        question_id: Uuid,
        user_answer: &str,
        is_correct: bool,
        score: f64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE questions
            SET user_answer = ?1, is_correct = ?2, score = ?3
            WHERE id = ?4
            "#,
        )
        .bind(user_answer)
        .bind(is_correct)
        .bind(score)
        .bind(question_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn complete_test(
        &self,
        test_id: Uuid,
        score: f64,
        time_taken_secs: Option<i64>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE tests
            SET completed = 1, score = ?1, time_taken_secs = ?2
            WHERE id = ?3
            "#,
        )
        .bind(score)
        .bind(time_taken_secs)
        .bind(test_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Lower-cased prompts of every question the user has been asked before
    /// on the given normalized topic. Read-only; feeds deduplication.
    pub async fn seen_question_prompts(
        &self,
        user_id: Uuid,
        topic_normalized: &str,
    ) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT LOWER(q.prompt) AS prompt
            FROM questions q
            JOIN tests t ON q.test_id = t.id
            WHERE t.user_id = ?1 AND t.topic_normalized = ?2
            "#,
        )
        .bind(user_id.to_string())
        .bind(topic_normalized)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| row.get::<String, _>("prompt"))
            .collect())
    }

    // ==================== Gap operations ====================

    pub async fn create_gap(&self, gap: &Gap) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO gaps (id, user_id, topic, topic_normalized, subtopic,
                              priority, description, resolved, test_id, identified_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(gap.id.to_string())
        .bind(gap.user_id.to_string())
        .bind(&gap.topic)
        .bind(&gap.topic_normalized)
        .bind(&gap.subtopic)
        .bind(gap.priority.as_str())
        .bind(&gap.description)
        .bind(gap.resolved)
        .bind(gap.test_id.map(|id| id.to_string()))
        .bind(gap.identified_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_user_gaps(&self, user_id: Uuid, unresolved_only: bool) -> Result<Vec<Gap>> {
        let query = if unresolved_only {
            r#"
            SELECT * FROM gaps WHERE user_id = ?1 AND resolved = 0
            ORDER BY CASE priority WHEN 'high' THEN 1 WHEN 'medium' THEN 2 ELSE 3 END,
                     identified_at DESC
            "#
        } else {
            r#"
            SELECT * FROM gaps WHERE user_id = ?1
            ORDER BY CASE priority WHEN 'high' THEN 1 WHEN 'medium' THEN 2 ELSE 3 END,
                     identified_at DESC
            "#
        };

        let rows = sqlx::query(query)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(row_to_gap).collect()
    }

    pub async fn get_test_gaps(&self, test_id: Uuid) -> Result<Vec<Gap>> {
        let rows = sqlx::query("SELECT * FROM gaps WHERE test_id = ?1 ORDER BY identified_at")
            .bind(test_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(row_to_gap).collect()
    }

    pub async fn resolve_gap(&self, gap_id: Uuid) -> Result<bool> {
        let result = sqlx::query("UPDATE gaps SET resolved = 1 WHERE id = ?1")
            .bind(gap_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ==================== Progress & analytics ====================

    pub async fn get_user_stats(&self, user_id: Uuid) -> Result<UserStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM tests WHERE user_id = ?1 AND completed = 1) AS total_tests,
                (SELECT COALESCE(AVG(score), 0.0) FROM tests WHERE user_id = ?1 AND completed = 1) AS average_score,
                (SELECT COUNT(DISTINCT topic_normalized) FROM tests WHERE user_id = ?1 AND completed = 1) AS topics_covered,
                (SELECT COUNT(*) FROM gaps WHERE user_id = ?1 AND resolved = 0) AS unresolved_gaps
            "#,
        )
        .bind(user_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        let average_score: f64 = row.get("average_score");

        Ok(UserStats {
            total_tests: row.get("total_tests"),
            average_score: (average_score * 100.0).round() / 100.0,
            topics_covered: row.get("topics_covered"),
            unresolved_gaps: row.get("unresolved_gaps"),
        })
    }

    pub async fn get_topic_performance(&self, user_id: Uuid) -> Result<Vec<TopicPerformance>> {
        let rows = sqlx::query(
            r#"
            SELECT topic, AVG(score) AS average_score, COUNT(*) AS test_count
            FROM tests
            WHERE user_id = ?1 AND completed = 1
            GROUP BY topic_normalized
            ORDER BY average_score DESC
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| TopicPerformance {
                topic: row.get("topic"),
                average_score: row.get("average_score"),
                test_count: row.get("test_count"),
            })
            .collect())
    }

    pub async fn get_recent_completed_tests(&self, user_id: Uuid, limit: i64) -> Result<Vec<Test>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM tests
            WHERE user_id = ?1 AND completed = 1
            ORDER BY created_at DESC
            LIMIT ?2
            "#,
        )
        .bind(user_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_test).collect()
    }

    // ==================== Study plan operations ====================

    pub async fn create_study_plan(&self, plan: &StudyPlan, tasks: &[PlanTask]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO study_plans (id, user_id, name, description, target_date, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(plan.id.to_string())
        .bind(plan.user_id.to_string())
        .bind(&plan.name)
        .bind(&plan.description)
        .bind(plan.target_date.to_rfc3339())
        .bind(&plan.status)
        .bind(plan.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for task in tasks {
            sqlx::query(
                r#"
                INSERT INTO plan_tasks (id, plan_id, name, description, topic, priority,
                                        estimated_minutes, day_offset, completed)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(task.id.to_string())
            .bind(task.plan_id.to_string())
            .bind(&task.name)
            .bind(&task.description)
            .bind(&task.topic)
            .bind(task.priority.as_str())
            .bind(task.estimated_minutes)
            .bind(task.day_offset)
            .bind(task.completed)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_active_study_plan(&self, user_id: Uuid) -> Result<Option<StudyPlan>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM study_plans
            WHERE user_id = ?1 AND status = 'active'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_study_plan).transpose()
    }

    pub async fn get_plan_tasks(&self, plan_id: Uuid) -> Result<Vec<PlanTask>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM plan_tasks
            WHERE plan_id = ?1
            ORDER BY day_offset,
                     CASE priority WHEN 'high' THEN 1 WHEN 'medium' THEN 2 ELSE 3 END
            "#,
        )
        .bind(plan_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_plan_task).collect()
    }

    pub async fn complete_plan_task(&self, task_id: Uuid) -> Result<bool> {
        let result = sqlx::query("UPDATE plan_tasks SET completed = 1 WHERE id = ?1")
            .bind(task_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ==================== Chat operations ====================

    pub async fn create_chat_message(&self, message: &ChatMessage) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chat_messages (id, user_id, role, content, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(message.id.to_string())
        .bind(message.user_id.to_string())
        .bind(&message.role)
        .bind(&message.content)
        .bind(message.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_chat_history(&self, user_id: Uuid, limit: i64) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM (
                SELECT * FROM chat_messages
                WHERE user_id = ?1
                ORDER BY created_at DESC
                LIMIT ?2
            ) ORDER BY created_at ASC
            "#,
        )
        .bind(user_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_chat_message).collect()
    }
}

// ==================== Row mapping helpers ====================

fn parse_uuid(value: String) -> Result<Uuid> {
    Ok(Uuid::parse_str(&value)?)
}

fn parse_timestamp(value: String) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(&value)?.with_timezone(&Utc))
}

fn row_to_user(row: sqlx::sqlite::SqliteRow) -> Result<User> {
    Ok(User {
        id: parse_uuid(row.get("id"))?,
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        full_name: row.get("full_name"),
        created_at: parse_timestamp(row.get("created_at"))?,
    })
}

fn row_to_test(row: sqlx::sqlite::SqliteRow) -> Result<Test> {
    let difficulty_str: String = row.get("difficulty");
    let difficulty = Difficulty::parse(&difficulty_str)
        .ok_or_else(|| anyhow::anyhow!("Unknown difficulty '{}' in tests row", difficulty_str))?;

    Ok(Test {
        id: parse_uuid(row.get("id"))?,
        user_id: parse_uuid(row.get("user_id"))?,
        topic: row.get("topic"),
        topic_normalized: row.get("topic_normalized"),
        difficulty,
        total_questions: row.get("total_questions"),
        completed: row.get("completed"),
        score: row.get("score"),
        time_limit_secs: row.get("time_limit_secs"),
        time_taken_secs: row.get("time_taken_secs"),
        created_at: parse_timestamp(row.get("created_at"))?,
    })
}

fn row_to_question(row: sqlx::sqlite::SqliteRow) -> Result<Question> {
    let type_str: String = row.get("question_type");
    let question_type = QuestionType::parse(&type_str)
        .ok_or_else(|| anyhow::anyhow!("Unknown question type '{}' in questions row", type_str))?;

    let options = row
        .get::<Option<String>, _>("options")
        .map(|json| serde_json::from_str::<Vec<String>>(&json))
        .transpose()?;

    Ok(Question {
        id: parse_uuid(row.get("id"))?,
        test_id: parse_uuid(row.get("test_id"))?,
        position: row.get("position"),
        prompt: row.get("prompt"),
        question_type,
        options,
        correct_answer: row.get("correct_answer"),
        user_answer: row.get("user_answer"),
        is_correct: row.get("is_correct"),
        score: row.get("score"),
    })
}

fn row_to_gap(row: sqlx::sqlite::SqliteRow) -> Result<Gap> {
    let priority_str: String = row.get("priority");

    Ok(Gap {
        id: parse_uuid(row.get("id"))?,
        user_id: parse_uuid(row.get("user_id"))?,
        topic: row.get("topic"),
        topic_normalized: row.get("topic_normalized"),
        subtopic: row.get("subtopic"),
        priority: GapPriority::parse_lenient(&priority_str),
        description: row.get("description"),
        resolved: row.get("resolved"),
        test_id: row
            .get::<Option<String>, _>("test_id")
            .map(parse_uuid)
            .transpose()?,
        identified_at: parse_timestamp(row.get("identified_at"))?,
    })
}

fn row_to_study_plan(row: sqlx::sqlite::SqliteRow) -> Result<StudyPlan> {
    Ok(StudyPlan {
        id: parse_uuid(row.get("id"))?,
        user_id: parse_uuid(row.get("user_id"))?,
        name: row.get("name"),
        description: row.get("description"),
        target_date: parse_timestamp(row.get("target_date"))?,
        status: row.get("status"),
        created_at: parse_timestamp(row.get("created_at"))?,
    })
}

fn row_to_plan_task(row: sqlx::sqlite::SqliteRow) -> Result<PlanTask> {
    let priority_str: String = row.get("priority");

    Ok(PlanTask {
        id: parse_uuid(row.get("id"))?,
        plan_id: parse_uuid(row.get("plan_id"))?,
        name: row.get("name"),
        description: row.get("description"),
        topic: row.get("topic"),
        priority: GapPriority::parse_lenient(&priority_str),
        estimated_minutes: row.get("estimated_minutes"),
        day_offset: row.get("day_offset"),
        completed: row.get("completed"),
    })
}

fn row_to_chat_message(row: sqlx::sqlite::SqliteRow) -> Result<ChatMessage> {
    Ok(ChatMessage {
        id: parse_uuid(row.get("id"))?,
        user_id: parse_uuid(row.get("user_id"))?,
        role: row.get("role"),
        content: row.get("content"),
        created_at: parse_timestamp(row.get("created_at"))?,
    })
}
