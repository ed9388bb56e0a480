use crate::error::{AppError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"***")
            .finish()
    }
}

/// Source of per-site login credentials.
pub trait CredentialStore: Send + Sync {
    fn credentials(&self, profile: &str) -> Result<Credentials>;
}

/// Credentials read from a `.secrets.toml` file:
///
/// ```toml
/// [chatgpt.DEEPSEEK]
/// login = "me@example.com"
/// password = "hunter2"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct FileSecrets {
    #[serde(default)]
    chatgpt: HashMap<String, Credentials>,
}

impl FileSecrets {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No secrets file at {}", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn insert(&mut self, profile: impl Into<String>, credentials: Credentials) {
        self.chatgpt.insert(profile.into(), credentials);
    }
}

impl CredentialStore for FileSecrets {
    fn credentials(&self, profile: &str) -> Result<Credentials> {
        self.chatgpt.get(profile).cloned().ok_or_else(|| {
            AppError::AuthenticationFailed(format!("no credentials stored for {}", profile))
        })
    }
}
