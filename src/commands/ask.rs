use super::AppContext;
use crate::browser_ai::{AssistantSession, BrowserDriver};
use crate::config::TimingConfig;
use crate::error::Result;
use serde::Serialize;

/// Printed by `chatdriver ask`. `response` is null when no reply arrived.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AskOutcome {
    pub config: String,
    pub person: String,
    pub prompt: String,
    pub response: Option<String>,
}

pub async fn run(ctx: &AppContext, prompt: &str) -> Result<AskOutcome> {
    let mut session = ctx.start_session().await?;
    let outcome = ask(&mut session, &ctx.config.timing, prompt).await;

    if let Err(e) = session.close(ctx.config.browser.purge_profile_on_exit).await {
        tracing::warn!("Failed to close the browser: {}", e);
    }
    outcome
}

pub async fn ask<D: BrowserDriver>(
    session: &mut AssistantSession<D>,
    timing: &TimingConfig,
    prompt: &str,
) -> Result<AskOutcome> {
    let mut response = None;
    if session.open_main_session(timing.open_timeout_secs).await? {
        response = session
            .ask(prompt, timing.start_delay_secs, timing.max_polls)
            .await?;
    } else {
        tracing::error!("{}: main page is not available", session.site().name);
    }

    Ok(AskOutcome {
        config: session.site().name.clone(),
        person: session.person().name.clone(),
        prompt: prompt.to_string(),
        response,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser_ai::scripted::{Call, ScriptedDriver};
    use crate::models::Role;
    use crate::profiles::Catalog;
    use crate::secrets::FileSecrets;
    use std::sync::Arc;

    fn chatapp_session(driver: ScriptedDriver) -> AssistantSession<ScriptedDriver> {
        let catalog = Arc::new(Catalog::builtin().unwrap());
        let site = catalog.site("CHATAPP").unwrap();
        let person = catalog.person("PY_SENIOR").unwrap();
        AssistantSession::new(
            driver,
            catalog,
            Arc::new(FileSecrets::default()),
            site,
            person,
            true,
        )
    }

    fn locator(role: Role) -> String {
        Catalog::builtin()
            .unwrap()
            .site("CHATAPP")
            .unwrap()
            .locator(role)
            .unwrap()
            .to_string()
    }

    #[tokio::test(start_paused = true)]
    async fn test_ask_chatapp_with_personalization() {
        let mut driver = ScriptedDriver::new();
        driver.always(&locator(Role::TextInput), "");
        driver.always(&locator(Role::ReplyMessage), " Hi, how can I help? ");
        let mut session = chatapp_session(driver);

        let outcome = ask(&mut session, &TimingConfig::default(), "Hello")
            .await
            .unwrap();

        assert_eq!(
            outcome,
            AskOutcome {
                config: "CHATAPP".into(),
                person: "PY_SENIOR".into(),
                prompt: "Hello".into(),
                response: Some("Hi, how can I help?".into()),
            }
        );

        let expected = format!("{}Hello", session.person().prompt_prefix());
        let input = locator(Role::TextInput);
        let driver = session.driver();
        assert_eq!(
            driver.count(|c| matches!(c, Call::Type(x, t) if *x == input && *t == expected)),
            1
        );
        assert_eq!(
            driver.count(|c| matches!(c, Call::Click(x) if *x == locator(Role::SendButton))),
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ask_clicks_send_when_enter_ignored() {
        let mut driver = ScriptedDriver::new();
        driver.always(&locator(Role::TextInput), "");
        driver.always(&locator(Role::SendButton), "");
        driver.always(&locator(Role::ReplyMessage), "ok");
        driver.enter_consumed = false;
        let mut session = chatapp_session(driver);

        let outcome = ask(&mut session, &TimingConfig::default(), "Hello")
            .await
            .unwrap();

        assert_eq!(outcome.response.as_deref(), Some("ok"));
        assert_eq!(
            session
                .driver()
                .count(|c| matches!(c, Call::Click(x) if *x == locator(Role::SendButton))),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_site_yields_null_response() {
        let mut session = chatapp_session(ScriptedDriver::new());
        let timing = TimingConfig {
            open_timeout_secs: 2,
            ..TimingConfig::default()
        };

        let outcome = ask(&mut session, &timing, "Hello").await.unwrap();
        assert_eq!(outcome.response, None);

        let json = serde_json::to_string_pretty(&outcome).unwrap();
        assert!(json.contains("\"response\": null"));
        assert!(json.contains("\"config\": \"CHATAPP\""));
    }
}
