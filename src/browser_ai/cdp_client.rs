use super::driver::{BrowserDriver, Lookup};
use crate::config::BrowserSettings;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

const FIND_POLL_INTERVAL: Duration = Duration::from_millis(100);
const STALE_LOCK_AGE_SECS: u64 = 300;

const VISIBILITY_JS: &str = r#"
    function() {
        const rect = this.getBoundingClientRect();
        const style = getComputedStyle(this);
        return rect.width > 0 && rect.height > 0 &&
               style.display !== 'none' &&
               style.visibility !== 'hidden';
    }
"#;

const IS_CONNECTED_JS: &str = "function() { return this.isConnected; }";

/// Chromium tab driven over the DevTools protocol.
pub struct CdpClient {
    browser: Option<Browser>,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
    user_data_dir: Option<PathBuf>,
}

impl CdpClient {
    pub async fn launch(settings: &BrowserSettings, incognito: bool) -> Result<Self> {
        let user_data_dir = settings.resolved_user_data_dir();
        tracing::info!(
            "Launching Chrome (headless={}, incognito={}) with profile {}",
            settings.headless,
            incognito,
            user_data_dir.display()
        );

        if !user_data_dir.exists() {
            fs::create_dir_all(&user_data_dir)?;
            tracing::debug!("Created profile directory at {}", user_data_dir.display());
        }
        Self::handle_singleton_lock(&user_data_dir).await?;

        let mut builder = BrowserConfig::builder()
            .window_size(1280, 1024)
            .user_data_dir(&user_data_dir)
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-timer-throttling")
            .arg("--disable-backgrounding-occluded-windows")
            .arg("--disable-renderer-backgrounding")
            // Reduce automation fingerprints; several chat sites refuse obvious bots.
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--exclude-switches=enable-automation")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage");

        for extension in &settings.extensions {
            builder = builder.extension(extension.to_string_lossy().to_string());
        }
        if incognito {
            builder = builder.incognito();
        }
        if !settings.headless {
            builder = builder.with_head();
        }

        let config = builder
            .build()
            .map_err(|e| AppError::Browser(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::Browser(format!("Failed to launch browser: {}", e)))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    let error_str = format!("{:?}", e);
                    // chromiumoxide does not know every CDP event variant
                    if !error_str.contains("data did not match any variant") {
                        tracing::warn!("Browser handler error: {}", e);
                    }
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| AppError::Browser(format!("Failed to create new page: {}", e)))?;

        tracing::info!("Chrome launched, page created");
        Ok(Self {
            browser: Some(browser),
            page: Some(page),
            handler: Some(handler),
            user_data_dir: Some(user_data_dir),
        })
    }

    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| AppError::Browser("No page available".into()))
    }

    async fn count_matches(&self, xpath: &str) -> Result<u64> {
        let script = format!(
            "document.evaluate({}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null).snapshotLength",
            serde_json::to_string(xpath)?
        );
        let result = self
            .page()?
            .evaluate(script)
            .await
            .map_err(|e| classify(e, xpath))?;
        let value: serde_json::Value = result
            .into_value()
            .map_err(|e| AppError::Browser(format!("Failed to read xpath count: {}", e)))?;
        Ok(value.as_u64().unwrap_or(0))
    }

    /// Counts first because fetching an empty search result fails in Chrome.
    /// The node can still vanish between the count and the fetch, in which
    /// case the search is reported as empty.
    async fn search(&self, xpath: &str) -> Result<Vec<Element>> {
        if self.count_matches(xpath).await? == 0 {
            return Ok(Vec::new());
        }
        match self.page()?.find_xpaths(xpath).await {
            Ok(elements) => Ok(elements),
            Err(e) if is_empty_search_message(&e.to_string()) => {
                tracing::debug!("{} vanished during lookup", xpath);
                Ok(Vec::new())
            }
            Err(e) => {
                if self.count_matches(xpath).await? == 0 {
                    tracing::debug!("{} vanished during lookup: {}", xpath, e);
                    return Ok(Vec::new());
                }
                Err(classify(e, xpath))
            }
        }
    }

    async fn call_bool(&self, element: &Element, function: &str) -> Result<bool> {
        let returns = element
            .call_js_fn(function, false)
            .await
            .map_err(|e| classify(e, "element"))?;
        Ok(returns
            .result
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    async fn handle_singleton_lock(profile_dir: &Path) -> Result<()> {
        let lock_path = profile_dir.join("SingletonLock");
        // SingletonLock is a dangling symlink on Linux, so `exists()` is not enough.
        if fs::symlink_metadata(&lock_path).is_err() {
            return Ok(());
        }

        tracing::debug!("SingletonLock exists at {}", lock_path.display());
        if let Ok(modified) = fs::symlink_metadata(&lock_path).and_then(|m| m.modified()) {
            if let Ok(elapsed) = modified.elapsed() {
                if elapsed.as_secs() > STALE_LOCK_AGE_SECS {
                    tracing::info!("Removing stale SingletonLock ({}s old)", elapsed.as_secs());
                    let _ = fs::remove_file(&lock_path);
                    return Ok(());
                }
            }
        }

        if !Self::is_chrome_running_with_profile(profile_dir) {
            tracing::info!("No Chrome process uses {}, removing lock", profile_dir.display());
            let _ = fs::remove_file(&lock_path);
            return Ok(());
        }

        Err(AppError::Browser(format!(
            "Chrome is already running with profile {}. Close it and try again.",
            profile_dir.display()
        )))
    }

    fn is_chrome_running_with_profile(profile_dir: &Path) -> bool {
        #[cfg(unix)]
        {
            let profile = profile_dir.to_string_lossy();
            if let Ok(output) = std::process::Command::new("ps").arg("aux").output() {
                let ps_output = String::from_utf8_lossy(&output.stdout);
                return ps_output.lines().any(|line| {
                    line.contains("chrom") && line.contains("--user-data-dir") && line.contains(profile.as_ref())
                });
            }
        }
        false
    }
}

/// Maps protocol failures onto the session's error taxonomy.
fn classify(error: CdpError, context: &str) -> AppError {
    let message = error.to_string();
    if is_stale_message(&message) {
        AppError::StaleReference(format!("{}: {}", context, message))
    } else {
        AppError::Browser(format!("{}: {}", context, message))
    }
}

fn is_stale_message(message: &str) -> bool {
    const MARKERS: [&str; 4] = [
        "Could not find node with given id",
        "No node with given id found",
        "Node with given id does not belong to the document",
        "Cannot find context with specified id",
    ];
    MARKERS.iter().any(|marker| message.contains(marker))
}

fn is_empty_search_message(message: &str) -> bool {
    message.contains("Invalid search result range") || message.contains("No search session with given id")
}

fn interaction(error: AppError, action: &str) -> AppError {
    match error {
        AppError::Browser(message) => AppError::Interaction(format!("{}: {}", action, message)),
        other => other,
    }
}

#[async_trait]
impl BrowserDriver for CdpClient {
    type Element = Element;

    async fn navigate(&mut self, url: &str) -> Result<()> {
        tracing::debug!("Navigating to: {}", url);
        let page = self.page()?;

        page.goto(url)
            .await
            .map_err(|e| AppError::Navigation(format!("Failed to navigate to {}: {}", url, e)))?;

        // Don't fail if the load event never arrives, SPAs keep streaming.
        match tokio::time::timeout(Duration::from_secs(5), page.wait_for_navigation()).await {
            Ok(Ok(_)) => tracing::debug!("Navigation complete"),
            Ok(Err(e)) => tracing::debug!("Navigation wait error (continuing anyway): {}", e),
            Err(_) => tracing::debug!("Navigation wait timed out (continuing anyway)"),
        }
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String> {
        let url = self
            .page()?
            .url()
            .await
            .map_err(|e| AppError::Browser(format!("Failed to get URL: {}", e)))?;
        Ok(url.unwrap_or_default())
    }

    async fn refresh(&mut self) -> Result<()> {
        self.page()?
            .reload()
            .await
            .map_err(|e| AppError::Navigation(format!("Failed to reload: {}", e)))?;
        Ok(())
    }

    async fn find_element(&mut self, xpath: &str, timeout: Duration) -> Result<Lookup<Element>> {
        let start = Instant::now();
        loop {
            if let Some(element) = self.search(xpath).await?.into_iter().next() {
                return Ok(Lookup::Found(element));
            }
            if start.elapsed() >= timeout {
                return Ok(Lookup::NotFound);
            }
            tokio::time::sleep(FIND_POLL_INTERVAL).await;
        }
    }

    async fn find_elements(&mut self, xpath: &str, timeout: Duration) -> Result<Vec<Element>> {
        let start = Instant::now();
        loop {
            let elements = self.search(xpath).await?;
            if !elements.is_empty() || start.elapsed() >= timeout {
                return Ok(elements);
            }
            tokio::time::sleep(FIND_POLL_INTERVAL).await;
        }
    }

    async fn click(&mut self, element: &Element) -> Result<()> {
        element
            .click()
            .await
            .map_err(|e| interaction(classify(e, "click"), "click"))?;
        Ok(())
    }

    async fn type_text(&mut self, element: &Element, text: &str) -> Result<()> {
        element
            .focus()
            .await
            .map_err(|e| interaction(classify(e, "focus"), "focus"))?;
        element
            .type_str(text)
            .await
            .map_err(|e| interaction(classify(e, "type"), "type"))?;
        Ok(())
    }

    async fn dispatch_key(&mut self, element: &Element, key: &str) -> Result<bool> {
        let key_code = if key == "Enter" { 13 } else { 0 };
        let key_json = serde_json::to_string(key)?;
        let function = format!(
            r#"function() {{
                const event = new KeyboardEvent('keydown', {{
                    key: {key}, code: {key}, keyCode: {code}, which: {code},
                    bubbles: true, cancelable: true
                }});
                this.dispatchEvent(event);
                return event.defaultPrevented;
            }}"#,
            key = key_json,
            code = key_code
        );
        self.call_bool(element, &function)
            .await
            .map_err(|e| interaction(e, "keydown"))
    }

    async fn is_visible(&mut self, element: &Element) -> Result<bool> {
        self.call_bool(element, VISIBILITY_JS).await
    }

    async fn text(&mut self, element: &Element) -> Result<String> {
        let text = element
            .inner_text()
            .await
            .map_err(|e| classify(e, "innerText"))?;
        Ok(text.unwrap_or_default())
    }

    async fn wait_detached(&mut self, element: &Element, timeout: Duration) -> Result<bool> {
        let start = Instant::now();
        loop {
            match self.call_bool(element, IS_CONNECTED_JS).await {
                Ok(false) | Err(AppError::StaleReference(_)) => return Ok(true),
                Ok(true) => {}
                Err(e) => return Err(e),
            }
            if start.elapsed() >= timeout {
                return Ok(false);
            }
            tokio::time::sleep(FIND_POLL_INTERVAL).await;
        }
    }

    async fn quit(&mut self, purge_profile: bool) -> Result<()> {
        tracing::info!("Closing browser");
        self.page = None;

        let closed = match self.browser.take() {
            Some(mut browser) => {
                let result = browser
                    .close()
                    .await
                    .map_err(|e| AppError::Browser(format!("Failed to close browser: {}", e)));
                let _ = browser.wait().await;
                result.map(|_| ())
            }
            None => Ok(()),
        };

        if let Some(handler) = self.handler.take() {
            handler.abort();
        }

        if let Some(dir) = self.user_data_dir.take() {
            if purge_profile {
                tracing::info!("Removing browser profile at {}", dir.display());
                if let Err(e) = fs::remove_dir_all(&dir) {
                    tracing::warn!("Failed to remove profile dir {}: {}", dir.display(), e);
                }
            } else {
                tracing::debug!("Keeping browser profile at {}", dir.display());
            }
        }

        closed
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        if let Some(mut browser) = self.browser.take() {
            let handler = self.handler.take();
            tracing::warn!("CdpClient dropped without quit, closing browser in background");
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                runtime.spawn(async move {
                    let _ = browser.close().await;
                    let _ = browser.wait().await;
                    if let Some(handler) = handler {
                        handler.abort();
                    }
                });
            }
        }
    }
}
