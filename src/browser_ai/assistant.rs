//! One chat-site session: navigation, prompt submission and the reply-wait
//! state machine, all parameterised by the current [`SiteProfile`].

use super::driver::{BrowserDriver, Lookup};
use crate::config::TimingConfig;
use crate::error::{AppError, Result};
use crate::models::{PersonalizationProfile, Role, SiteFlag, SiteProfile};
use crate::profiles::Catalog;
use crate::secrets::CredentialStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Fixed delays of the session. One poll of [`AssistantSession::await_reply`]
/// lasts roughly `poll_interval`.
#[derive(Debug, Clone)]
pub struct Timings {
    pub poll_interval: Duration,
    pub ready_settle: Duration,
    pub reply_settle: Duration,
    pub stop_probe: Duration,
    pub modal_probe: Duration,
    pub new_chat_pause: Duration,
    pub element_timeout: Duration,
    pub login_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            ready_settle: Duration::from_secs(1),
            reply_settle: Duration::from_millis(300),
            stop_probe: Duration::from_secs(1),
            modal_probe: Duration::from_secs(1),
            new_chat_pause: Duration::from_secs(1),
            element_timeout: Duration::from_secs(5),
            login_timeout: Duration::from_secs(15),
        }
    }
}

impl From<&TimingConfig> for Timings {
    fn from(config: &TimingConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            reply_settle: Duration::from_millis(config.reply_settle_ms),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PollState {
    WaitingToStart,
    Polling { remaining: u32 },
    Found(String),
    TimedOut,
}

pub struct AssistantSession<D: BrowserDriver> {
    driver: D,
    catalog: Arc<Catalog>,
    credentials: Arc<dyn CredentialStore>,
    site: SiteProfile,
    person: PersonalizationProfile,
    personalization_enabled: bool,
    authenticated: bool,
    open_timeout_secs: u32,
    timings: Timings,
}

impl<D: BrowserDriver> AssistantSession<D> {
    pub fn new(
        driver: D,
        catalog: Arc<Catalog>,
        credentials: Arc<dyn CredentialStore>,
        site: SiteProfile,
        person: PersonalizationProfile,
        personalization_enabled: bool,
    ) -> Self {
        Self {
            driver,
            catalog,
            credentials,
            site,
            person,
            personalization_enabled,
            authenticated: false,
            open_timeout_secs: 30,
            timings: Timings::default(),
        }
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    /// Countdown used when the readiness guard has to reopen the main page.
    pub fn with_open_timeout(mut self, timeout_secs: u32) -> Self {
        self.open_timeout_secs = timeout_secs;
        self
    }

    pub fn site(&self) -> &SiteProfile {
        &self.site
    }

    pub fn person(&self) -> &PersonalizationProfile {
        &self.person
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn is_personalization_enabled(&self) -> bool {
        self.personalization_enabled
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Selects another site. Login state does not carry over between sites.
    pub fn switch_profile(&mut self, name: &str) -> Result<()> {
        self.site = self.catalog.site(name)?;
        self.authenticated = false;
        tracing::info!("Switched site profile to {}", self.site.name);
        Ok(())
    }

    pub fn switch_personalization(&mut self, name: &str) -> Result<()> {
        self.person = self.catalog.person(name)?;
        tracing::info!("Switched person to {}", self.person.name);
        Ok(())
    }

    pub fn set_personalization_enabled(&mut self, enabled: bool) {
        self.personalization_enabled = enabled;
    }

    /// Text that will actually be typed for `text`.
    ///
    /// With personalization the prefix is prepended and every line break is
    /// removed, since the target inputs submit on Enter.
    pub fn compose_prompt(&self, text: &str) -> String {
        if !self.personalization_enabled {
            return text.to_string();
        }
        format!("{}{}", self.person.prompt_prefix(), text).replace(|c: char| c == '\n' || c == '\r', "")
    }

    /// Opens the main page until the text input shows up.
    ///
    /// Each miss refreshes the page and costs one of `timeout_secs` attempts;
    /// running out returns `Ok(false)`. Navigation failures are fatal.
    pub async fn open_main_session(&mut self, timeout_secs: u32) -> Result<bool> {
        let main_page = self.site.main_page_url.clone();
        let text_input = self.site.locators.require(Role::TextInput)?.to_string();
        let mut remaining = timeout_secs;

        while remaining > 0 {
            self.driver.navigate(&main_page).await?;

            if self.landed_on_login_page().await? {
                tracing::warn!("{}: redirected to the login page", self.site.name);
                self.authenticated = false;
                self.authorize().await;
                remaining -= 1;
                continue;
            }

            match self.driver.find_element(&text_input, Duration::ZERO).await {
                Ok(Lookup::Found(_)) => {
                    if self.site.has_flag(SiteFlag::StartNewChatOnOpen) {
                        self.start_new_conversation().await;
                    }
                    return Ok(true);
                }
                Ok(Lookup::NotFound) => {}
                Err(e) if e.is_recoverable() => tracing::debug!("Text input probe failed: {}", e),
                Err(e) => return Err(e),
            }

            tracing::warn!("{}: text input not found, refreshing the page", self.site.name);
            self.driver.refresh().await?;
            remaining -= 1;
            if remaining > 0 {
                sleep(self.timings.poll_interval).await;
            }
        }

        tracing::warn!("{}: main page did not become ready", self.site.name);
        Ok(false)
    }

    async fn landed_on_login_page(&mut self) -> Result<bool> {
        let Some(login_page) = self.site.login_page_url.as_deref() else {
            return Ok(false);
        };
        let current = self.driver.current_url().await?;
        Ok(same_page(&current, login_page))
    }

    /// Re-opens the main page when something navigated the tab away. Never fails.
    pub async fn ensure_ready(&mut self) {
        let current = match self.driver.current_url().await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Could not read the current URL: {}", e);
                String::new()
            }
        };
        if current.contains(&self.site.main_page_url) {
            return;
        }

        tracing::warn!(
            "Driver is not on the assistant page (current page: {:?})",
            current
        );
        match self.open_main_session(self.open_timeout_secs).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!("{}: could not reopen the main page", self.site.name),
            Err(e) => tracing::error!("{}: reopening the main page failed: {}", self.site.name, e),
        }
        sleep(self.timings.ready_settle).await;
    }

    /// Declines the login/consent dialog if the site shows one.
    pub async fn dismiss_modal(&mut self) {
        let Some(dialog) = self.site.locator(Role::ConsentDialog).map(str::to_string) else {
            return;
        };

        match self.driver.find_element(&dialog, self.timings.modal_probe).await {
            Ok(Lookup::Found(_)) => {}
            Ok(Lookup::NotFound) => return,
            Err(e) => {
                tracing::debug!("Consent dialog probe failed: {}", e);
                return;
            }
        }

        let decline = format!(
            "{}//a[text()={}]",
            dialog,
            xpath_literal(&self.site.consent_decline_text)
        );
        match self.driver.find_element(&decline, self.timings.modal_probe).await {
            Ok(Lookup::Found(link)) => {
                if let Err(e) = self.driver.click(&link).await {
                    tracing::warn!("Could not dismiss the consent dialog: {}", e);
                } else {
                    tracing::debug!("Consent dialog dismissed");
                }
            }
            Ok(Lookup::NotFound) => tracing::debug!("Consent dialog has no decline link"),
            Err(e) => tracing::debug!("Decline link probe failed: {}", e),
        }
    }

    /// Logs in with the stored credentials. Idempotent; failures only leave
    /// the session unauthenticated.
    pub async fn authorize(&mut self) -> bool {
        if self.authenticated {
            return true;
        }

        tracing::debug!("{}: attempting to log in", self.site.name);
        match self.try_authorize().await {
            Ok(()) => {
                self.authenticated = true;
                tracing::info!("{}: logged in", self.site.name);
            }
            Err(e) => {
                self.authenticated = false;
                tracing::error!("{}: login failed: {}", self.site.name, e);
            }
        }
        self.authenticated
    }

    async fn try_authorize(&mut self) -> Result<()> {
        let login_page = self.site.login_page_url.clone().ok_or_else(|| {
            AppError::AuthenticationFailed(format!("{} has no login page", self.site.name))
        })?;
        let login_xpath = self.login_locator(Role::LoginField)?;
        let password_xpath = self.login_locator(Role::PasswordField)?;
        let credentials = self.credentials.credentials(&self.site.name)?;

        self.driver.navigate(&login_page).await?;

        let login_field = self.require_element(&login_xpath).await?;
        self.driver.click(&login_field).await?;
        self.driver.type_text(&login_field, &credentials.login).await?;

        let password_field = self.require_element(&password_xpath).await?;
        self.driver.click(&password_field).await?;
        self.driver
            .type_text(&password_field, &credentials.password)
            .await?;

        if let Some(checkbox) = self.site.locator(Role::LoginCheckbox).map(str::to_string) {
            let checkbox = self.require_element(&checkbox).await?;
            self.driver.click(&checkbox).await?;
        }
        if let Some(button) = self.site.locator(Role::LoginButton).map(str::to_string) {
            let button = self.require_element(&button).await?;
            self.driver.click(&button).await?;
        }

        if self
            .driver
            .wait_detached(&login_field, self.timings.login_timeout)
            .await?
        {
            Ok(())
        } else {
            Err(AppError::AuthenticationFailed(
                "login form is still displayed".to_string(),
            ))
        }
    }

    fn login_locator(&self, role: Role) -> Result<String> {
        self.site.locator(role).map(str::to_string).ok_or_else(|| {
            AppError::AuthenticationFailed(format!("{} has no {} locator", self.site.name, role))
        })
    }

    /// Clicks the site's "new chat" control. False when the site has none.
    pub async fn start_new_conversation(&mut self) -> bool {
        let Some(xpath) = self.site.locator(Role::NewChatButton).map(str::to_string) else {
            return false;
        };

        match self.driver.find_element(&xpath, self.timings.element_timeout).await {
            Ok(Lookup::Found(button)) => match self.driver.click(&button).await {
                Ok(()) => {
                    sleep(self.timings.new_chat_pause).await;
                    true
                }
                Err(e) => {
                    tracing::warn!("Could not start a new chat: {}", e);
                    false
                }
            },
            Ok(Lookup::NotFound) => false,
            Err(e) => {
                tracing::warn!("New chat button probe failed: {}", e);
                false
            }
        }
    }

    /// Types the prompt and submits it. `Ok(false)` means the send failed and
    /// was logged; only browser-level failures are returned as errors.
    pub async fn send_prompt(&mut self, text: &str) -> Result<bool> {
        self.ensure_ready().await;
        self.dismiss_modal().await;

        let message = self.compose_prompt(text);
        match self.submit(&message).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_recoverable() => {
                tracing::error!("{}: failed to send the prompt: {}", self.site.name, e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn submit(&mut self, message: &str) -> Result<()> {
        let input_xpath = self.site.locators.require(Role::TextInput)?.to_string();
        let input = self.require_element(&input_xpath).await?;
        self.driver.type_text(&input, message).await?;

        if !self.driver.dispatch_key(&input, "Enter").await? {
            tracing::debug!("Enter was not consumed, clicking the send button");
            let button_xpath = self.site.locators.require(Role::SendButton)?.to_string();
            let button = self.require_element(&button_xpath).await?;
            self.driver.click(&button).await?;
        }
        Ok(())
    }

    /// Waits for generation to finish and returns the last reply on the page.
    ///
    /// After `start_delay_secs` the page is polled up to `max_polls` times.
    /// While the stop button is visible the budget is not consumed, so a
    /// reply that keeps streaming is waited for without limit. Stale element
    /// reads also retry for free.
    pub async fn await_reply(
        &mut self,
        start_delay_secs: u64,
        max_polls: u32,
    ) -> Result<Option<String>> {
        self.ensure_ready().await;
        self.dismiss_modal().await;

        let reply_xpath = self.site.locators.require(Role::ReplyMessage)?.to_string();
        let stop_xpath = self.site.locator(Role::StopButton).map(str::to_string);

        tracing::debug!("{}: reply is being generated", self.site.name);
        let mut state = PollState::WaitingToStart;
        loop {
            state = match state {
                PollState::WaitingToStart => {
                    sleep(Duration::from_secs(start_delay_secs)).await;
                    PollState::Polling {
                        remaining: max_polls,
                    }
                }
                PollState::Polling { remaining } => {
                    self.poll_reply(&reply_xpath, stop_xpath.as_deref(), remaining)
                        .await?
                }
                PollState::Found(text) => {
                    tracing::debug!("{}: reply received", self.site.name);
                    return Ok(Some(text));
                }
                PollState::TimedOut => {
                    tracing::debug!("{}: no reply received", self.site.name);
                    self.report_site_error().await;
                    return Ok(None);
                }
            };
        }
    }

    async fn poll_reply(
        &mut self,
        reply_xpath: &str,
        stop_xpath: Option<&str>,
        remaining: u32,
    ) -> Result<PollState> {
        if remaining == 0 {
            return Ok(PollState::TimedOut);
        }

        if let Some(stop_xpath) = stop_xpath {
            if self.is_generating(stop_xpath).await? {
                tracing::trace!("Stop button visible, still generating");
                sleep(self.timings.poll_interval).await;
                return Ok(PollState::Polling { remaining });
            }
        }

        sleep(self.timings.reply_settle).await;
        match self.last_reply(reply_xpath).await {
            Ok(Some(text)) => return Ok(PollState::Found(text)),
            Ok(None) => {}
            Err(e) if e.is_stale() => {
                tracing::debug!("Reply element went stale, polling again: {}", e);
                return Ok(PollState::Polling { remaining });
            }
            Err(e) if e.is_recoverable() => tracing::warn!("Could not read the reply: {}", e),
            Err(e) => return Err(e),
        }

        let remaining = remaining - 1;
        if remaining == 0 {
            return Ok(PollState::TimedOut);
        }
        sleep(self.timings.poll_interval).await;
        Ok(PollState::Polling { remaining })
    }

    async fn is_generating(&mut self, stop_xpath: &str) -> Result<bool> {
        let button = match self
            .driver
            .find_element(stop_xpath, self.timings.stop_probe)
            .await
        {
            Ok(Lookup::Found(button)) => button,
            Ok(Lookup::NotFound) => return Ok(false),
            Err(e) if e.is_recoverable() => return Ok(false),
            Err(e) => return Err(e),
        };

        match self.driver.is_visible(&button).await {
            Ok(visible) => Ok(visible),
            Err(e) if e.is_recoverable() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn last_reply(&mut self, reply_xpath: &str) -> Result<Option<String>> {
        let elements = self.driver.find_elements(reply_xpath, Duration::ZERO).await?;
        match elements.last() {
            Some(element) => Ok(Some(self.driver.text(element).await?.trim().to_string())),
            None => Ok(None),
        }
    }

    async fn report_site_error(&mut self) {
        let Some(error_xpath) = self.site.locator(Role::ReplyError).map(str::to_string) else {
            return;
        };
        let Ok(elements) = self.driver.find_elements(&error_xpath, Duration::ZERO).await else {
            return;
        };
        if let Some(element) = elements.last() {
            if let Ok(text) = self.driver.text(element).await {
                tracing::warn!("{}: site reported an error: {}", self.site.name, text.trim());
            }
        }
    }

    /// Sends `prompt` and waits for the answer.
    pub async fn ask(
        &mut self,
        prompt: &str,
        start_delay_secs: u64,
        max_polls: u32,
    ) -> Result<Option<String>> {
        if !self.send_prompt(prompt).await? {
            return Ok(None);
        }
        self.await_reply(start_delay_secs, max_polls).await
    }

    async fn require_element(&mut self, xpath: &str) -> Result<D::Element> {
        self.driver
            .find_element(xpath, self.timings.element_timeout)
            .await?
            .found()
            .ok_or_else(|| AppError::ElementNotFound(xpath.to_string()))
    }

    /// Releases the browser. Consumes the session so it can only happen once.
    pub async fn close(self, purge_profile: bool) -> Result<()> {
        let mut driver = self.driver;
        driver.quit(purge_profile).await
    }
}

/// Compares two URLs ignoring a trailing slash, query and fragment.
fn same_page(current: &str, expected: &str) -> bool {
    match (url::Url::parse(current), url::Url::parse(expected)) {
        (Ok(a), Ok(b)) => {
            a.scheme() == b.scheme()
                && a.host_str() == b.host_str()
                && a.port_or_known_default() == b.port_or_known_default()
                && a.path().trim_end_matches('/') == b.path().trim_end_matches('/')
        }
        _ => current.trim_end_matches('/') == expected.trim_end_matches('/'),
    }
}

/// Quotes `text` as an XPath string literal.
fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        format!("'{}'", text)
    } else if !text.contains('"') {
        format!("\"{}\"", text)
    } else {
        let parts: Vec<String> = text.split('\'').map(|p| format!("'{}'", p)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}
