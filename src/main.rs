use std::collections::HashMap;
use std::env;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gapmentor::{
    api::{create_router, AppState},
    AuthService, Config, Database, GapAnalyzer, LlmClient, MentorService, StudyPlanner,
    TestService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Logging comes up first so configuration loading is captured too.
    let _guard = setup_logging()?;

    let config = Config::from_env()?;
    config.validate()?;

    info!("Starting GapMentor server...");

    let db = Database::new(&config.database.url).await?;
    info!("Database initialized successfully");

    let llm = LlmClient::new(
        config.llm.provider,
        config.llm.api_key.clone(),
        config.llm.base_url.clone(),
        config.llm.model.clone(),
        config.llm.timeout_secs,
    )?;
    info!(
        "Initialized LLM client with provider {} (model {})",
        llm.provider_name(),
        llm.model_name()
    );

    let state = AppState {
        auth_service: AuthService::new(db.clone()),
        test_service: TestService::new(db.clone(), llm.clone()),
        gap_analyzer: GapAnalyzer::new(llm.clone(), db.clone()),
        study_planner: StudyPlanner::new(llm.clone(), db.clone()),
        mentor_service: MentorService::new(llm, db),
        test_sessions: Arc::new(Mutex::new(HashMap::new())),
    };

    let app = create_router(state).layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn setup_logging() -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::fmt;

    let default_log_level = "info,gapmentor=debug";
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(true);

    let file_enabled = env::var("LOG_FILE_ENABLED")
        .unwrap_or_else(|_| "true".to_string())
        .parse::<bool>()
        .unwrap_or(true);

    if !file_enabled {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .init();
        return Ok(None);
    }

    let log_directory = env::var("LOG_DIRECTORY").unwrap_or_else(|_| "logs".to_string());
    std::fs::create_dir_all(&log_directory).unwrap_or_else(|e| {
        eprintln!("Warning: Could not create logs directory: {}", e);
    });

    // Daily-rotated file output without ANSI colors.
    let file_appender = tracing_appender::rolling::daily(&log_directory, "gapmentor.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(non_blocking_file);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!(
        "Logging initialized - writing to {}/gapmentor.log with daily rotation",
        log_directory
    );

    Ok(Some(guard))
}
