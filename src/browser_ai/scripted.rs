//! In-memory [`BrowserDriver`] whose page contents are scripted per XPath.

use super::driver::{BrowserDriver, Lookup};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Navigate(String),
    Refresh,
    Find(String),
    FindAll(String),
    Click(String),
    Type(String, String),
    Key(String, String),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub xpath: String,
    pub text: String,
    pub visible: bool,
}

pub struct ScriptedDriver {
    pub url: String,
    pub enter_consumed: bool,
    pub detach_on_wait: bool,
    pub fail_navigation: bool,
    pub fail_current_url: bool,
    pub reject_clicks: bool,
    pub stale_text_reads: u32,
    pub quits: Arc<Mutex<Vec<bool>>>,
    redirects: HashMap<String, String>,
    pages: HashMap<String, VecDeque<Vec<FakeElement>>>,
    calls: Vec<Call>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self {
            url: "about:blank".to_string(),
            enter_consumed: true,
            detach_on_wait: true,
            fail_navigation: false,
            fail_current_url: false,
            reject_clicks: false,
            stale_text_reads: 0,
            quits: Arc::new(Mutex::new(Vec::new())),
            redirects: HashMap::new(),
            pages: HashMap::new(),
            calls: Vec::new(),
        }
    }

    /// `xpath` always matches one visible element with `text`.
    pub fn always(&mut self, xpath: &str, text: &str) {
        self.sequence(xpath, vec![vec![text]]);
    }

    /// Successive lookups of `xpath` see successive answers; the last repeats.
    pub fn sequence(&mut self, xpath: &str, answers: Vec<Vec<&str>>) {
        let answers = answers
            .into_iter()
            .map(|texts| {
                texts
                    .into_iter()
                    .map(|text| FakeElement {
                        xpath: xpath.to_string(),
                        text: text.to_string(),
                        visible: true,
                    })
                    .collect()
            })
            .collect();
        self.pages.insert(xpath.to_string(), answers);
    }

    /// One element per lookup with the given visibility, then nothing.
    pub fn sequence_visible(&mut self, xpath: &str, visibility: Vec<bool>) {
        let mut answers: VecDeque<Vec<FakeElement>> = visibility
            .into_iter()
            .map(|visible| {
                vec![FakeElement {
                    xpath: xpath.to_string(),
                    text: String::new(),
                    visible,
                }]
            })
            .collect();
        answers.push_back(Vec::new());
        self.pages.insert(xpath.to_string(), answers);
    }

    pub fn redirect(&mut self, from: &str, to: &str) {
        self.redirects.insert(from.to_string(), to.to_string());
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    fn lookup(&mut self, xpath: &str) -> Vec<FakeElement> {
        match self.pages.get_mut(xpath) {
            Some(answers) if answers.len() > 1 => answers.pop_front().unwrap_or_default(),
            Some(answers) => answers.front().cloned().unwrap_or_default(),
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    type Element = FakeElement;

    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.calls.push(Call::Navigate(url.to_string()));
        if self.fail_navigation {
            return Err(AppError::Navigation(format!("{url}: net::ERR_NAME_NOT_RESOLVED")));
        }
        self.url = self
            .redirects
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.to_string());
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String> {
        if self.fail_current_url {
            return Err(AppError::Browser("Target.getTargetInfo timed out".into()));
        }
        Ok(self.url.clone())
    }

    async fn refresh(&mut self) -> Result<()> {
        self.calls.push(Call::Refresh);
        Ok(())
    }

    async fn find_element(&mut self, xpath: &str, _timeout: Duration) -> Result<Lookup<FakeElement>> {
        self.calls.push(Call::Find(xpath.to_string()));
        Ok(self.lookup(xpath).into_iter().next().into())
    }

    async fn find_elements(&mut self, xpath: &str, _timeout: Duration) -> Result<Vec<FakeElement>> {
        self.calls.push(Call::FindAll(xpath.to_string()));
        Ok(self.lookup(xpath))
    }

    async fn click(&mut self, element: &FakeElement) -> Result<()> {
        self.calls.push(Call::Click(element.xpath.clone()));
        if self.reject_clicks {
            return Err(AppError::Interaction(format!(
                "click: {} is covered by another element",
                element.xpath
            )));
        }
        Ok(())
    }

    async fn type_text(&mut self, element: &FakeElement, text: &str) -> Result<()> {
        self.calls
            .push(Call::Type(element.xpath.clone(), text.to_string()));
        Ok(())
    }

    async fn dispatch_key(&mut self, element: &FakeElement, key: &str) -> Result<bool> {
        self.calls.push(Call::Key(element.xpath.clone(), key.to_string()));
        Ok(self.enter_consumed)
    }

    async fn is_visible(&mut self, element: &FakeElement) -> Result<bool> {
        Ok(element.visible)
    }

    async fn text(&mut self, element: &FakeElement) -> Result<String> {
        self.calls.push(Call::Text(element.xpath.clone()));
        if self.stale_text_reads > 0 {
            self.stale_text_reads -= 1;
            return Err(AppError::StaleReference(element.xpath.clone()));
        }
        Ok(element.text.clone())
    }

    async fn wait_detached(&mut self, _element: &FakeElement, _timeout: Duration) -> Result<bool> {
        Ok(self.detach_on_wait)
    }

    async fn quit(&mut self, purge_profile: bool) -> Result<()> {
        if let Ok(mut quits) = self.quits.lock() {
            quits.push(purge_profile);
        }
        Ok(())
    }
}
