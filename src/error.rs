use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unknown {kind} profile: {name}")]
    ConfigNotFound { kind: &'static str, name: String },

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Stale element reference: {0}")]
    StaleReference(String),

    #[error("Interaction rejected: {0}")]
    Interaction(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Navigation error: {0}")]
    Navigation(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl AppError {
    pub fn config_not_found(kind: &'static str, name: impl Into<String>) -> Self {
        AppError::ConfigNotFound {
            kind,
            name: name.into(),
        }
    }

    /// Errors a session swallows (logs and falls back) instead of aborting the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::ElementNotFound(_)
                | AppError::StaleReference(_)
                | AppError::Interaction(_)
                | AppError::AuthenticationFailed(_)
        )
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, AppError::StaleReference(_))
    }
}

impl From<AppError> for String {
    fn from(error: AppError) -> Self {
        error.to_string()
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
