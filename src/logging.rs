// Macros file - tracing macros are imported within the macro definitions

/// Standardized logging macros for consistent field names and message
/// patterns across the application.

// ============================================================================
// API Operation Logging Macros
// ============================================================================

/// Log the start of an API operation with consistent fields
#[macro_export]
macro_rules! log_api_start {
    ($operation:expr, user_id = $user_id:expr) => {
        tracing::debug!(
            operation = $operation,
            user_id = %$user_id,
            "API operation started"
        );
    };
    ($operation:expr, test_id = $test_id:expr) => {
        tracing::debug!(
            operation = $operation,
            test_id = %$test_id,
            "API operation started"
        );
    };
    ($operation:expr, session_id = $session_id:expr) => {
        tracing::debug!(
            operation = $operation,
            session_id = %$session_id,
            "API operation started"
        );
    };
    ($operation:expr) => {
        tracing::debug!(
            operation = $operation,
            "API operation started"
        );
    };
}

/// Log successful completion of an API operation
#[macro_export]
macro_rules! log_api_success {
    ($operation:expr, user_id = $user_id:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            user_id = %$user_id,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, test_id = $test_id:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            test_id = %$test_id,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, session_id = $session_id:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            session_id = %$session_id,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            "API operation completed: {}", $msg
        );
    };
}

/// Log API operation errors with consistent structure
#[macro_export]
macro_rules! log_api_error {
    ($operation:expr, user_id = $user_id:expr, error = $error:expr, $msg:expr) => {
        tracing::error!(
            operation = $operation,
            user_id = %$user_id,
            error = %$error,
            "API operation failed: {}", $msg
        );
    };
    ($operation:expr, test_id = $test_id:expr, error = $error:expr, $msg:expr) => {
        tracing::error!(
            operation = $operation,
            test_id = %$test_id,
            error = %$error,
            "API operation failed: {}", $msg
        );
    };
    ($operation:expr, session_id = $session_id:expr, error = $error:expr, $msg:expr) => {
        tracing::error!(
            operation = $operation,
            session_id = %$session_id,
            error = %$error,
            "API operation failed: {}", $msg
        );
    };
    ($operation:expr, error = $error:expr, $msg:expr) => {
        tracing::error!(
            operation = $operation,
            error = %$error,
            "API operation failed: {}", $msg
        );
    };
}

/// Log API warnings with context
#[macro_export]
macro_rules! log_api_warn {
    ($operation:expr, user_id = $user_id:expr, $msg:expr) => {
        tracing::warn!(
            operation = $operation,
            user_id = %$user_id,
            "API operation warning: {}", $msg
        );
    };
    ($operation:expr, session_id = $session_id:expr, $msg:expr) => {
        tracing::warn!(
            operation = $operation,
            session_id = %$session_id,
            "API operation warning: {}", $msg
        );
    };
    ($operation:expr, $msg:expr) => {
        tracing::warn!(
            operation = $operation,
            "API operation warning: {}", $msg
        );
    };
}

// ============================================================================
// System Event Logging Macros
// ============================================================================

/// Log system lifecycle events (startup, configuration, shutdown)
#[macro_export]
macro_rules! log_system_event {
    ($component:ident, $msg:expr) => {
        tracing::info!(
            component = stringify!($component),
            "System event: {}", $msg
        );
    };
}

/// Log validation outcomes with consistent structure
#[macro_export]
macro_rules! log_validation {
    (success, $target:expr, $msg:expr) => {
        tracing::debug!(
            validation_target = $target,
            "Validation passed: {}", $msg
        );
    };
    (failure, $target:expr, $msg:expr) => {
        tracing::warn!(
            validation_target = $target,
            "Validation failed: {}", $msg
        );
    };
}

// ============================================================================
// LLM Service Logging Macros
// ============================================================================

/// Log remote model operations with provider context
#[macro_export]
macro_rules! log_llm_operation {
    (start, $operation:expr, provider = $provider:expr) => {
        tracing::info!(
            component = "llm_client",
            operation = $operation,
            provider = %$provider,
            "LLM operation started"
        );
    };
    (success, $operation:expr, provider = $provider:expr, response_length = $len:expr) => {
        tracing::info!(
            component = "llm_client",
            operation = $operation,
            provider = %$provider,
            response_length = $len,
            "LLM operation completed successfully"
        );
    };
    (error, $operation:expr, provider = $provider:expr, error = $error:expr) => {
        tracing::error!(
            component = "llm_client",
            operation = $operation,
            provider = %$provider,
            error = %$error,
            "LLM operation failed"
        );
    };
}
