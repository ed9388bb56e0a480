//! Front-end commands. Each one owns its session for the duration of the
//! command and always closes the browser before returning.

pub mod ask;
pub mod chat;
pub mod profiles;

use crate::browser_ai::{AssistantSession, CdpClient, Timings};
use crate::config::Config;
use crate::error::Result;
use crate::models::SiteFlag;
use crate::profiles::Catalog;
use crate::secrets::CredentialStore;
use std::sync::Arc;

/// Everything a command needs, resolved once in `main`.
pub struct AppContext {
    pub config: Config,
    pub catalog: Arc<Catalog>,
    pub credentials: Arc<dyn CredentialStore>,
}

impl AppContext {
    pub fn new(config: Config, catalog: Arc<Catalog>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            config,
            catalog,
            credentials,
        }
    }

    /// Resolves the configured profiles, then launches the browser.
    ///
    /// Unknown profile names fail here, before any browser process exists.
    pub async fn start_session(&self) -> Result<AssistantSession<CdpClient>> {
        let site = self.catalog.site(&self.config.chatgpt.config.name)?;
        let person = self.catalog.person(&self.config.chatgpt.person.name)?;

        let driver = CdpClient::launch(
            &self.config.browser,
            site.has_flag(SiteFlag::IncognitoSession),
        )
        .await?;

        Ok(AssistantSession::new(
            driver,
            self.catalog.clone(),
            self.credentials.clone(),
            site,
            person,
            self.config.chatgpt.personalization.enabled,
        )
        .with_open_timeout(self.config.timing.open_timeout_secs)
        .with_timings(Timings::from(&self.config.timing)))
    }
}
