use serde::{Deserialize, Serialize};

/// Persona whose settings are injected ahead of every prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalizationProfile {
    pub name: String,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub user_role: Option<String>,
    #[serde(default)]
    pub max_reply_length: Option<u32>,
    #[serde(default)]
    pub assistant_tone: Option<String>,
    #[serde(default)]
    pub assistant_task: Option<String>,
}

impl PersonalizationProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            user_name: None,
            user_role: None,
            max_reply_length: None,
            assistant_tone: None,
            assistant_task: None,
        }
    }

    /// Bracketed preamble placed in front of the user's message.
    ///
    /// Fields that are not set are left out, the wording around them is fixed.
    pub fn prompt_prefix(&self) -> String {
        let mut prefix = String::from(
            "[Это настройки для диалога с тобой. \
             После закрывающейся квадратной скобки идет моё нормальное сообщение. \
             Отвечай на него естественно и на русском языке.",
        );

        if let Some(user_name) = &self.user_name {
            prefix.push_str(&format!(" Моё имя - {};", user_name));
        }
        if let Some(user_role) = &self.user_role {
            prefix.push_str(&format!(" Моя должность - {};", user_role));
        }
        if let Some(length) = self.max_reply_length {
            prefix.push_str(&format!(
                " Максимальная длина твоего сообщения - {} символов;",
                length
            ));
        }
        if let Some(tone) = &self.assistant_tone {
            prefix.push_str(&format!(" Твой характер общения со мной - {};", tone));
        }
        if let Some(task) = &self.assistant_task {
            prefix.push_str(&format!(" Твоя задача - {};", task));
        }

        if prefix.ends_with(';') {
            prefix.pop();
            prefix.push('.');
        }
        prefix.push(']');
        prefix
    }
}
