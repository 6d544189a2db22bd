use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failure on the client-facing receive path.
#[derive(Debug, Error)]
pub enum IngressError {
    #[error("failed to receive frame: {0}")]
    ReceiveFailed(String),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend initialization failed: {0}")]
    InitializationFailed(String),

    #[error("backend not found: {0}")]
    NotFound(String),

    #[error("failed to connect to backend: {0}")]
    Connect(String),

    #[error("backend stream failed: {0}")]
    Stream(String),

    #[error("backend rejected stream (code {code}): {message}")]
    Rejected { code: i32, message: String },

    #[error("backend task ended abnormally: {0}")]
    TaskFailed(String),
}

/// Failure delivering a transcript back to the client.
#[derive(Debug, Error)]
pub enum EgressSendError {
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("failed to encode transcript: {0}")]
    Encode(#[from] serde_json::Error),
}
