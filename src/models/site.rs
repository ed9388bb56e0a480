use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label of the link that declines the login offer in consent dialogs.
pub const DEFAULT_CONSENT_DECLINE_TEXT: &str = "Не входить";

/// Semantic role of an element on an assistant page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    TextInput,
    SendButton,
    StopButton,
    ReplyMessage,
    ReplyError,
    LoginField,
    PasswordField,
    LoginCheckbox,
    LoginButton,
    ConsentDialog,
    NewChatButton,
}

impl Role {
    pub const REQUIRED: [Role; 3] = [Role::TextInput, Role::SendButton, Role::ReplyMessage];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::TextInput => "text_input",
            Role::SendButton => "send_button",
            Role::StopButton => "stop_button",
            Role::ReplyMessage => "reply_message",
            Role::ReplyError => "reply_error",
            Role::LoginField => "login_field",
            Role::PasswordField => "password_field",
            Role::LoginCheckbox => "login_checkbox",
            Role::LoginButton => "login_button",
            Role::ConsentDialog => "consent_dialog",
            Role::NewChatButton => "new_chat_button",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// XPath locators keyed by role. `None` means the site has no such element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Locators {
    pub text_input: Option<String>,
    pub send_button: Option<String>,
    pub stop_button: Option<String>,
    pub reply_message: Option<String>,
    pub reply_error: Option<String>,
    pub login_field: Option<String>,
    pub password_field: Option<String>,
    pub login_checkbox: Option<String>,
    pub login_button: Option<String>,
    pub consent_dialog: Option<String>,
    pub new_chat_button: Option<String>,
}

impl Locators {
    pub fn get(&self, role: Role) -> Option<&str> {
        let slot = match role {
            Role::TextInput => &self.text_input,
            Role::SendButton => &self.send_button,
            Role::StopButton => &self.stop_button,
            Role::ReplyMessage => &self.reply_message,
            Role::ReplyError => &self.reply_error,
            Role::LoginField => &self.login_field,
            Role::PasswordField => &self.password_field,
            Role::LoginCheckbox => &self.login_checkbox,
            Role::LoginButton => &self.login_button,
            Role::ConsentDialog => &self.consent_dialog,
            Role::NewChatButton => &self.new_chat_button,
        };
        slot.as_deref()
    }

    /// Locator for a role the profile must define.
    pub fn require(&self, role: Role) -> Result<&str> {
        self.get(role)
            .ok_or_else(|| AppError::ElementNotFound(format!("no locator for {}", role)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteFlag {
    StartNewChatOnOpen,
    IncognitoSession,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteProfile {
    pub name: String,
    pub main_page_url: String,
    #[serde(default)]
    pub login_page_url: Option<String>,
    #[serde(default)]
    pub locators: Locators,
    #[serde(default = "default_consent_decline_text")]
    pub consent_decline_text: String,
    #[serde(default)]
    pub flags: Vec<SiteFlag>,
}

fn default_consent_decline_text() -> String {
    DEFAULT_CONSENT_DECLINE_TEXT.to_string()
}

impl SiteProfile {
    pub fn new(name: impl Into<String>, main_page_url: impl Into<String>, locators: Locators) -> Self {
        Self {
            name: name.into(),
            main_page_url: main_page_url.into(),
            login_page_url: None,
            locators,
            consent_decline_text: default_consent_decline_text(),
            flags: Vec::new(),
        }
    }

    pub fn with_login_page(mut self, url: impl Into<String>) -> Self {
        self.login_page_url = Some(url.into());
        self
    }

    pub fn with_flag(mut self, flag: SiteFlag) -> Self {
        if !self.flags.contains(&flag) {
            self.flags.push(flag);
        }
        self
    }

    pub fn has_flag(&self, flag: SiteFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn locator(&self, role: Role) -> Option<&str> {
        self.locators.get(role)
    }

    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.main_page_url.trim().is_empty() {
            missing.push("main_page_url".to_string());
        }
        for role in Role::REQUIRED {
            if self.locators.get(role).map_or(true, |l| l.trim().is_empty()) {
                missing.push(role.to_string());
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::Configuration(format!(
                "site profile {} is missing {}",
                self.name,
                missing.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> SiteProfile {
        SiteProfile::new(
            "MINI",
            "https://mini.example/",
            Locators {
                text_input: Some("//textarea".into()),
                send_button: Some("//button[@type='submit']".into()),
                reply_message: Some("//div[@class='reply']".into()),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_validate_accepts_required_roles() {
        assert!(minimal().validate().is_ok());
    }

    #[test]
    fn test_validate_lists_every_missing_role() {
        let mut site = minimal();
        site.locators.send_button = None;
        site.locators.reply_message = Some("  ".into());

        let message = site.validate().unwrap_err().to_string();
        assert!(message.contains("send_button"));
        assert!(message.contains("reply_message"));
        assert!(!message.contains("text_input"));
    }

    #[test]
    fn test_optional_locator_absent_is_none() {
        let site = minimal();
        assert_eq!(site.locator(Role::NewChatButton), None);
        assert!(site.locators.require(Role::StopButton).is_err());
        assert_eq!(site.locators.require(Role::TextInput).unwrap(), "//textarea");
    }

    #[test]
    fn test_flags_are_deduplicated() {
        let site = minimal()
            .with_flag(SiteFlag::StartNewChatOnOpen)
            .with_flag(SiteFlag::StartNewChatOnOpen);
        assert_eq!(site.flags.len(), 1);
        assert!(site.has_flag(SiteFlag::StartNewChatOnOpen));
        assert!(!site.has_flag(SiteFlag::IncognitoSession));
    }

    #[test]
    fn test_deserialize_from_toml_uses_defaults() {
        let site: SiteProfile = toml::from_str(
            r#"
            name = "TOMLSITE"
            main_page_url = "https://toml.example/"
            flags = ["incognito_session"]

            [locators]
            text_input = "//textarea"
            send_button = "//button"
            reply_message = "//p"
            "#,
        )
        .unwrap();

        assert_eq!(site.consent_decline_text, DEFAULT_CONSENT_DECLINE_TEXT);
        assert!(site.has_flag(SiteFlag::IncognitoSession));
        assert!(site.validate().is_ok());
    }
}
