use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    auth::{AuthError, AuthService},
    errors::{classify_database_error, ApiError, ErrorContext},
    gap_analysis::{GapAnalyzer, GapReport},
    mentor::MentorService,
    models::*,
    study_plan::{PlanError, StudyPlanner},
    test_service::{TestError, TestService},
    test_session::{SessionError, SessionPhase, SessionQuestion, TestConfig, TestSession},
};

// Import logging macros
use crate::{log_api_error, log_api_start, log_api_success, log_api_warn};

const DEFAULT_DESCRIPTIVE_FRACTION: f64 = 0.4;
const DEFAULT_PLAN_DAYS: u32 = 14;

#[derive(Clone)]
pub struct AppState {
    pub auth_service: AuthService,
    pub test_service: TestService,
    pub gap_analyzer: GapAnalyzer,
    pub study_planner: StudyPlanner,
    pub mentor_service: MentorService,
    pub test_sessions: Arc<Mutex<HashMap<Uuid, TestSession>>>,
}

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<()>>)>;

/// Client-facing projection of a session. Never carries correct answers.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub test_id: Option<Uuid>,
    pub phase: SessionPhase,
    pub topic: String,
    pub difficulty: Difficulty,
    pub current_index: usize,
    pub total_questions: usize,
    pub answered_count: usize,
    pub time_limit_secs: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
    pub questions: Vec<SessionQuestion>,
}

impl SessionView {
    fn from_session(session: &TestSession) -> Self {
        Self {
            session_id: session.id,
            test_id: session.test_id,
            phase: session.phase,
            topic: session.config.topic.clone(),
            difficulty: session.config.difficulty,
            current_index: session.current_index,
            total_questions: session.questions.len(),
            answered_count: session.answers.len(),
            time_limit_secs: session.config.time_limit_secs,
            started_at: session.started_at,
            questions: session.questions.clone(),
        }
    }
}

fn map_auth_error(error: AuthError, operation: &str) -> (StatusCode, Json<ApiResponse<()>>) {
    let context = ErrorContext::new(operation, "user");
    let api_error = match error {
        AuthError::Validation(message) => ApiError::ValidationError(message),
        AuthError::UsernameTaken => ApiError::DuplicateResource("Username already exists".to_string()),
        AuthError::EmailTaken => ApiError::DuplicateResource("Email already exists".to_string()),
        AuthError::InvalidCredentials => {
            ApiError::Unauthorized("Invalid username or password".to_string())
        }
        AuthError::Database(e) => classify_database_error(&e),
    };
    api_error.to_response_with_context(context)
}

fn map_test_error(error: TestError, operation: &str) -> (StatusCode, Json<ApiResponse<()>>) {
    let context = ErrorContext::new(operation, "test");
    let api_error = match error {
        TestError::Session(SessionError::Validation(message)) => {
            ApiError::ValidationError(message)
        }
        TestError::Session(other) => ApiError::Conflict(other.to_string()),
        TestError::TopicExhausted => ApiError::Conflict(TestError::TopicExhausted.to_string()),
        TestError::Generation(e) => ApiError::LlmError(e.to_string()),
        TestError::NotFound => ApiError::NotFound("Test not found".to_string()),
        TestError::Database(e) => classify_database_error(&e),
    };
    api_error.to_response_with_context(context)
}

fn map_plan_error(error: PlanError, operation: &str) -> (StatusCode, Json<ApiResponse<()>>) {
    let context = ErrorContext::new(operation, "study_plan");
    let api_error = match error {
        PlanError::NoGaps => ApiError::Conflict(PlanError::NoGaps.to_string()),
        PlanError::Upstream(message) | PlanError::ParseFailed(message) => {
            ApiError::LlmError(message)
        }
        PlanError::Database(e) => classify_database_error(&e),
    };
    api_error.to_response_with_context(context)
}

fn session_not_found(session_id: Uuid, operation: &str) -> (StatusCode, Json<ApiResponse<()>>) {
    let error = ApiError::NotFound(format!("Session '{}' not found", session_id));
    let context = ErrorContext::new(operation, "session").with_id(&session_id.to_string());
    error.to_response_with_context(context)
}

// ==================== Auth endpoints ====================

pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> ApiResult<User> {
    log_api_start!("signup");

    match state.auth_service.signup(request).await {
        Ok(user) => {
            log_api_success!("signup", user_id = user.id, "user registered");
            Ok(Json(ApiResponse::success(user)))
        }
        Err(e) => Err(map_auth_error(e, "signup")),
    }
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<User> {
    log_api_start!("login");

    match state.auth_service.login(request).await {
        Ok(user) => {
            log_api_success!("login", user_id = user.id, "user authenticated");
            Ok(Json(ApiResponse::success(user)))
        }
        Err(e) => Err(map_auth_error(e, "login")),
    }
}

// ==================== Test lifecycle endpoints ====================

pub async fn start_test(
    State(state): State<AppState>,
    Json(request): Json<StartTestRequest>,
) -> ApiResult<SessionView> {
    log_api_start!("start_test", user_id = request.user_id);

    let config = TestConfig {
        topic: request.topic,
        difficulty: request.difficulty,
        num_questions: request.num_questions,
        descriptive_fraction: request
            .descriptive_fraction
            .unwrap_or(DEFAULT_DESCRIPTIVE_FRACTION),
        time_limit_secs: request.time_limit_secs,
    };

    match state.test_service.start_test(request.user_id, config).await {
        Ok(session) => {
            let view = SessionView::from_session(&session);
            {
                let mut sessions = state.test_sessions.lock().unwrap();
                sessions.insert(session.id, session);
            }
            log_api_success!("start_test", session_id = view.session_id, "test session started");
            Ok(Json(ApiResponse::success(view)))
        }
        Err(e) => Err(map_test_error(e, "start_test")),
    }
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    log_api_start!("get_session", session_id = session_id);
    session_step(&state, session_id, None, "get_session").await
}

pub async fn record_session_answer(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<AnswerRequest>,
) -> ApiResult<serde_json::Value> {
    log_api_start!("record_answer", session_id = session_id);
    session_step(
        &state,
        session_id,
        Some(SessionOp::Answer(request.answer)),
        "record_answer",
    )
    .await
}

pub async fn skip_session_question(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    log_api_start!("skip_question", session_id = session_id);
    session_step(&state, session_id, Some(SessionOp::Skip), "skip_question").await
}

pub async fn previous_session_question(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    log_api_start!("previous_question", session_id = session_id);
    session_step(&state, session_id, Some(SessionOp::Previous), "previous_question").await
}

enum SessionOp {
    Answer(String),
    Skip,
    Previous,
}

/// Context captured under the lock when a timer expiry forces completion.
struct ForcedCompletion {
    test_id: Uuid,
    answers: HashMap<Uuid, String>,
    time_taken_secs: Option<i64>,
}

/// Apply an in-progress navigation/answer operation, enforcing the
/// wall-clock limit first: an expired session completes with whatever
/// answers were recorded, regardless of the requested operation.
async fn session_step(
    state: &AppState,
    session_id: Uuid,
    op: Option<SessionOp>,
    operation: &'static str,
) -> ApiResult<serde_json::Value> {
    let forced: ForcedCompletion = {
        let mut sessions = state.test_sessions.lock().unwrap();
        let session = match sessions.get_mut(&session_id) {
            Some(session) => session,
            None => return Err(session_not_found(session_id, operation)),
        };

        if session.phase != SessionPhase::InProgress {
            // A bare view request is fine in any phase.
            if op.is_none() {
                return Ok(Json(ApiResponse::success(json!({
                    "expired": false,
                    "session": SessionView::from_session(session),
                }))));
            }
            let error = ApiError::Conflict("Test is not in progress".to_string());
            let context =
                ErrorContext::new(operation, "session").with_id(&session_id.to_string());
            return Err(error.to_response_with_context(context));
        }

        let now = Utc::now();
        if !session.expired(now) {
            let result = match op {
                None => Ok(()),
                Some(SessionOp::Answer(answer)) => session.record_answer(answer),
                Some(SessionOp::Skip) => session.skip(),
                Some(SessionOp::Previous) => session.previous(),
            };
            if let Err(e) = result {
                let error = match e {
                    SessionError::Validation(message) => ApiError::ValidationError(message),
                    other => ApiError::Conflict(other.to_string()),
                };
                let context =
                    ErrorContext::new(operation, "session").with_id(&session_id.to_string());
                return Err(error.to_response_with_context(context));
            }

            return Ok(Json(ApiResponse::success(json!({
                "expired": false,
                "session": SessionView::from_session(session),
            }))));
        }

        log_api_warn!(operation, session_id = session_id, "time limit reached, forcing completion");
        if let Err(e) = session.complete(true) {
            let error = ApiError::Conflict(e.to_string());
            let context =
                ErrorContext::new(operation, "session").with_id(&session_id.to_string());
            return Err(error.to_response_with_context(context));
        }
        match session.test_id {
            Some(test_id) => ForcedCompletion {
                test_id,
                answers: session.answers.clone(),
                time_taken_secs: session.config.time_limit_secs.map(|secs| secs as i64),
            },
            None => {
                let error = ApiError::Conflict("Session has no persisted test".to_string());
                let context =
                    ErrorContext::new(operation, "session").with_id(&session_id.to_string());
                return Err(error.to_response_with_context(context));
            }
        }
    };

    // Finalization runs outside the lock; it is idempotent per test id.
    let outcome = state
        .test_service
        .finalize_test(forced.test_id, &forced.answers, forced.time_taken_secs)
        .await
        .map_err(|e| map_test_error(e, operation))?;

    info!(
        session_id = %session_id,
        test_id = %forced.test_id,
        score = outcome.score,
        "Session force-completed after time limit"
    );

    Ok(Json(ApiResponse::success(json!({
        "expired": true,
        "outcome": outcome,
    }))))
}

pub async fn finalize_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<TestOutcome> {
    log_api_start!("finalize_test", session_id = session_id);

    let (test_id, answers, time_taken_secs) = {
        let mut sessions = state.test_sessions.lock().unwrap();
        let session = match sessions.get_mut(&session_id) {
            Some(session) => session,
            None => return Err(session_not_found(session_id, "finalize_test")),
        };

        match session.phase {
            SessionPhase::Completed => {
                // Idempotent re-entry (e.g. a page refresh): the service
                // returns the stored outcome without re-scoring.
                match session.test_id {
                    Some(test_id) => (test_id, session.answers.clone(), None),
                    None => {
                        let error =
                            ApiError::Conflict("Session has no persisted test".to_string());
                        let context = ErrorContext::new("finalize_test", "session")
                            .with_id(&session_id.to_string());
                        return Err(error.to_response_with_context(context));
                    }
                }
            }
            SessionPhase::InProgress => {
                let now = Utc::now();
                let expired = session.expired(now);
                if !expired && !session.at_last_question() {
                    let error = ApiError::BadRequest(
                        "A test can only be submitted from its last question".to_string(),
                    );
                    let context = ErrorContext::new("finalize_test", "session")
                        .with_id(&session_id.to_string());
                    return Err(error.to_response_with_context(context));
                }

                let time_taken = if expired {
                    session.config.time_limit_secs.map(|secs| secs as i64)
                } else {
                    session.elapsed_secs(now)
                };

                if let Err(e) = session.complete(true) {
                    let error = ApiError::Conflict(e.to_string());
                    let context = ErrorContext::new("finalize_test", "session")
                        .with_id(&session_id.to_string());
                    return Err(error.to_response_with_context(context));
                }

                match session.test_id {
                    Some(test_id) => (test_id, session.answers.clone(), time_taken),
                    None => {
                        let error =
                            ApiError::Conflict("Session has no persisted test".to_string());
                        let context = ErrorContext::new("finalize_test", "session")
                            .with_id(&session_id.to_string());
                        return Err(error.to_response_with_context(context));
                    }
                }
            }
            _ => {
                let error = ApiError::Conflict("Test is not in progress".to_string());
                let context = ErrorContext::new("finalize_test", "session")
                    .with_id(&session_id.to_string());
                return Err(error.to_response_with_context(context));
            }
        }
    };

    match state
        .test_service
        .finalize_test(test_id, &answers, time_taken_secs)
        .await
    {
        Ok(outcome) => {
            log_api_success!("finalize_test", test_id = test_id, "test scored");
            Ok(Json(ApiResponse::success(outcome)))
        }
        Err(e) => Err(map_test_error(e, "finalize_test")),
    }
}

pub async fn restart_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<SessionView> {
    log_api_start!("restart_session", session_id = session_id);

    let mut sessions = state.test_sessions.lock().unwrap();
    let session = match sessions.get_mut(&session_id) {
        Some(session) => session,
        None => return Err(session_not_found(session_id, "restart_session")),
    };

    match session.start_over() {
        Ok(()) => Ok(Json(ApiResponse::success(SessionView::from_session(session)))),
        Err(e) => {
            let error = ApiError::Conflict(e.to_string());
            let context =
                ErrorContext::new("restart_session", "session").with_id(&session_id.to_string());
            Err(error.to_response_with_context(context))
        }
    }
}

// ==================== Test listing endpoints ====================

pub async fn get_user_tests(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Vec<Test>> {
    debug!(user_id = %user_id, "Listing tests");

    match state.test_service.get_user_tests(user_id).await {
        Ok(tests) => Ok(Json(ApiResponse::success(tests))),
        Err(e) => {
            let error = ApiError::DatabaseError(e);
            let context = ErrorContext::new("get_user_tests", "test");
            Err(error.to_response_with_context(context))
        }
    }
}

pub async fn get_test_details(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    log_api_start!("get_test_details", test_id = test_id);

    let test = match state.test_service.get_test(test_id).await {
        Ok(Some(test)) => test,
        Ok(None) => {
            let error = ApiError::NotFound(format!("Test '{}' not found", test_id));
            let context =
                ErrorContext::new("get_test_details", "test").with_id(&test_id.to_string());
            return Err(error.to_response_with_context(context));
        }
        Err(e) => {
            let error = ApiError::DatabaseError(e);
            let context =
                ErrorContext::new("get_test_details", "test").with_id(&test_id.to_string());
            return Err(error.to_response_with_context(context));
        }
    };

    // Correct answers stay server-side until the test is done.
    if !test.completed {
        let error = ApiError::Conflict("Test is not completed yet".to_string());
        let context = ErrorContext::new("get_test_details", "test").with_id(&test_id.to_string());
        return Err(error.to_response_with_context(context));
    }

    match state.test_service.get_test_questions(test_id).await {
        Ok(questions) => Ok(Json(ApiResponse::success(json!({
            "test": test,
            "questions": questions,
        })))),
        Err(e) => {
            let error = ApiError::DatabaseError(e);
            let context =
                ErrorContext::new("get_test_details", "test").with_id(&test_id.to_string());
            Err(error.to_response_with_context(context))
        }
    }
}

// ==================== Progress & gap endpoints ====================

pub async fn get_user_stats(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<UserStats> {
    match state.test_service.get_user_stats(user_id).await {
        Ok(stats) => Ok(Json(ApiResponse::success(stats))),
        Err(e) => {
            let error = ApiError::DatabaseError(e);
            let context = ErrorContext::new("get_user_stats", "stats");
            Err(error.to_response_with_context(context))
        }
    }
}

pub async fn get_topic_performance(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Vec<TopicPerformance>> {
    match state.test_service.get_topic_performance(user_id).await {
        Ok(performance) => Ok(Json(ApiResponse::success(performance))),
        Err(e) => {
            let error = ApiError::DatabaseError(e);
            let context = ErrorContext::new("get_topic_performance", "stats");
            Err(error.to_response_with_context(context))
        }
    }
}

#[derive(Deserialize)]
pub struct GapListParams {
    /// Include resolved gaps when true; default is unresolved only.
    pub all: Option<bool>,
}

pub async fn get_user_gaps(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<GapListParams>,
) -> ApiResult<Vec<Gap>> {
    let unresolved_only = !params.all.unwrap_or(false);

    match state
        .gap_analyzer
        .list_gaps(user_id, unresolved_only)
        .await
    {
        Ok(gaps) => Ok(Json(ApiResponse::success(gaps))),
        Err(e) => {
            let error = ApiError::DatabaseError(e);
            let context = ErrorContext::new("get_user_gaps", "gap");
            Err(error.to_response_with_context(context))
        }
    }
}

pub async fn get_gap_report(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<GapReport> {
    match state.gap_analyzer.gap_report(user_id).await {
        Ok(report) => Ok(Json(ApiResponse::success(report))),
        Err(e) => {
            let error = ApiError::DatabaseError(e);
            let context = ErrorContext::new("get_gap_report", "gap");
            Err(error.to_response_with_context(context))
        }
    }
}

pub async fn resolve_gap(
    State(state): State<AppState>,
    Path(gap_id): Path<Uuid>,
) -> ApiResult<bool> {
    info!(gap_id = %gap_id, "Resolving gap");

    match state.gap_analyzer.mark_resolved(gap_id).await {
        Ok(true) => Ok(Json(ApiResponse::success(true))),
        Ok(false) => {
            let error = ApiError::NotFound(format!("Gap '{}' not found", gap_id));
            let context = ErrorContext::new("resolve_gap", "gap").with_id(&gap_id.to_string());
            Err(error.to_response_with_context(context))
        }
        Err(e) => {
            let error = ApiError::DatabaseError(e);
            let context = ErrorContext::new("resolve_gap", "gap").with_id(&gap_id.to_string());
            Err(error.to_response_with_context(context))
        }
    }
}

// ==================== Study plan endpoints ====================

pub async fn generate_study_plan(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<StudyPlanRequest>,
) -> ApiResult<StudyPlanWithTasks> {
    log_api_start!("generate_study_plan", user_id = user_id);

    let target_days = request.target_days.unwrap_or(DEFAULT_PLAN_DAYS);

    match state.study_planner.generate_plan(user_id, target_days).await {
        Ok(plan) => {
            log_api_success!("generate_study_plan", user_id = user_id, "study plan created");
            Ok(Json(ApiResponse::success(plan)))
        }
        Err(e) => Err(map_plan_error(e, "generate_study_plan")),
    }
}

pub async fn get_active_study_plan(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<StudyPlanWithTasks> {
    match state.study_planner.active_plan(user_id).await {
        Ok(Some(plan)) => Ok(Json(ApiResponse::success(plan))),
        Ok(None) => {
            let error = ApiError::NotFound("No active study plan".to_string());
            let context = ErrorContext::new("get_active_study_plan", "study_plan");
            Err(error.to_response_with_context(context))
        }
        Err(e) => {
            let error = ApiError::DatabaseError(e);
            let context = ErrorContext::new("get_active_study_plan", "study_plan");
            Err(error.to_response_with_context(context))
        }
    }
}

pub async fn complete_plan_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<bool> {
    match state.study_planner.complete_task(task_id).await {
        Ok(true) => Ok(Json(ApiResponse::success(true))),
        Ok(false) => {
            let error = ApiError::NotFound(format!("Task '{}' not found", task_id));
            let context =
                ErrorContext::new("complete_plan_task", "plan_task").with_id(&task_id.to_string());
            Err(error.to_response_with_context(context))
        }
        Err(e) => {
            let error = ApiError::DatabaseError(e);
            let context =
                ErrorContext::new("complete_plan_task", "plan_task").with_id(&task_id.to_string());
            Err(error.to_response_with_context(context))
        }
    }
}

// ==================== Mentor chat endpoints ====================

pub async fn send_chat_message(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<ChatMessage> {
    log_api_start!("send_chat_message", user_id = user_id);

    if request.message.trim().is_empty() {
        let error = ApiError::ValidationError("Message must not be empty".to_string());
        let context = ErrorContext::new("send_chat_message", "chat");
        return Err(error.to_response_with_context(context));
    }

    match state
        .mentor_service
        .send_message(user_id, &request.message)
        .await
    {
        Ok(reply) => Ok(Json(ApiResponse::success(reply))),
        Err(e) => {
            log_api_error!("send_chat_message", user_id = user_id, error = e, "mentor chat failed");
            let error = ApiError::LlmError(e.to_string());
            let context = ErrorContext::new("send_chat_message", "chat");
            Err(error.to_response_with_context(context))
        }
    }
}

pub async fn get_chat_history(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Vec<ChatMessage>> {
    match state.mentor_service.history(user_id).await {
        Ok(messages) => Ok(Json(ApiResponse::success(messages))),
        Err(e) => {
            let error = ApiError::DatabaseError(e);
            let context = ErrorContext::new("get_chat_history", "chat");
            Err(error.to_response_with_context(context))
        }
    }
}

pub async fn get_chat_suggestions(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Vec<String>> {
    match state.mentor_service.suggestions(user_id).await {
        Ok(suggestions) => Ok(Json(ApiResponse::success(suggestions))),
        Err(e) => {
            let error = ApiError::DatabaseError(e);
            let context = ErrorContext::new("get_chat_suggestions", "chat");
            Err(error.to_response_with_context(context))
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Auth routes
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        // Test lifecycle routes
        .route("/api/tests/start", post(start_test))
        .route("/api/tests/session/:id", get(get_session))
        .route("/api/tests/session/:id/answer", post(record_session_answer))
        .route("/api/tests/session/:id/skip", post(skip_session_question))
        .route("/api/tests/session/:id/previous", post(previous_session_question))
        .route("/api/tests/session/:id/finalize", post(finalize_session))
        .route("/api/tests/session/:id/restart", post(restart_session))
        // Test listing routes
        .route("/api/users/:id/tests", get(get_user_tests))
        .route("/api/tests/:id", get(get_test_details))
        // Progress & gap routes
        .route("/api/users/:id/stats", get(get_user_stats))
        .route("/api/users/:id/performance", get(get_topic_performance))
        .route("/api/users/:id/gaps", get(get_user_gaps))
        .route("/api/users/:id/gaps/report", get(get_gap_report))
        .route("/api/gaps/:id/resolve", post(resolve_gap))
        // Study plan routes
        .route("/api/users/:id/study-plan", post(generate_study_plan))
        .route("/api/users/:id/study-plan", get(get_active_study_plan))
        .route("/api/study-plan/tasks/:id/complete", post(complete_plan_task))
        // Mentor chat routes
        .route("/api/users/:id/chat", post(send_chat_message))
        .route("/api/users/:id/chat", get(get_chat_history))
        .route("/api/users/:id/chat/suggestions", get(get_chat_suggestions))
        .with_state(state)
}
