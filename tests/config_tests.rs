use gapmentor::Config;

/// All environment mutation lives in this single test so parallel test
/// threads in this binary never race on the process environment.
#[test]
fn test_config_from_env_roundtrip() {
    // Defaults with a clean environment.
    for key in [
        "DATABASE_URL",
        "LLM_API_KEY",
        "LLM_BASE_URL",
        "LLM_PROVIDER",
        "LLM_MODEL",
        "LLM_TIMEOUT_SECS",
        "PORT",
        "HOST",
    ] {
        std::env::remove_var(key);
    }

    let config = Config::from_env().unwrap();
    assert_eq!(config.database.url, "sqlite:gapmentor.db");
    assert_eq!(config.server.port, 3000);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.llm.timeout_secs, 60);

    // Explicit values override the defaults.
    std::env::set_var("DATABASE_URL", "sqlite:custom.db");
    std::env::set_var("LLM_PROVIDER", "openai");
    std::env::set_var("LLM_MODEL", "gpt-4o");
    std::env::set_var("LLM_TIMEOUT_SECS", "30");
    std::env::set_var("PORT", "8080");
    std::env::set_var("HOST", "127.0.0.1");

    let config = Config::from_env().unwrap();
    assert_eq!(config.database.url, "sqlite:custom.db");
    assert_eq!(config.llm.model.as_deref(), Some("gpt-4o"));
    assert_eq!(config.llm.timeout_secs, 30);
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.host, "127.0.0.1");
    assert!(config.validate().is_ok());

    // Unparseable port is an error, not a silent default.
    std::env::set_var("PORT", "not-a-number");
    assert!(Config::from_env().is_err());
    std::env::remove_var("PORT");

    // Unknown provider falls back rather than failing startup.
    std::env::set_var("LLM_PROVIDER", "mystery");
    let config = Config::from_env().unwrap();
    assert_eq!(config.llm.provider, gapmentor::ProviderKind::Gemini);
    std::env::remove_var("LLM_PROVIDER");
}
