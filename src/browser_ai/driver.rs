use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Outcome of an element search. Absence is an ordinary answer, not an error.
#[derive(Debug)]
pub enum Lookup<E> {
    Found(E),
    NotFound,
}

impl<E> Lookup<E> {
    pub fn found(self) -> Option<E> {
        match self {
            Lookup::Found(element) => Some(element),
            Lookup::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

impl<E> From<Option<E>> for Lookup<E> {
    fn from(value: Option<E>) -> Self {
        match value {
            Some(element) => Lookup::Found(element),
            None => Lookup::NotFound,
        }
    }
}

/// One exclusive browser tab. All locators are XPath expressions.
///
/// Element handles may go stale when the page re-renders; operations on a
/// stale handle fail with [`crate::error::AppError::StaleReference`].
#[async_trait]
pub trait BrowserDriver: Send {
    type Element: Send + Sync;

    async fn navigate(&mut self, url: &str) -> Result<()>;

    async fn current_url(&mut self) -> Result<String>;

    async fn refresh(&mut self) -> Result<()>;

    /// First match in document order, polling until `timeout` elapses.
    /// A zero timeout probes exactly once.
    async fn find_element(
        &mut self,
        xpath: &str,
        timeout: Duration,
    ) -> Result<Lookup<Self::Element>>;

    /// All matches in document order; empty once `timeout` elapses without any.
    async fn find_elements(&mut self, xpath: &str, timeout: Duration) -> Result<Vec<Self::Element>>;

    async fn click(&mut self, element: &Self::Element) -> Result<()>;

    /// Types `text` as individual key events into the element.
    async fn type_text(&mut self, element: &Self::Element, text: &str) -> Result<()>;

    /// Dispatches a cancelable `keydown` for `key`; true when the page consumed it.
    async fn dispatch_key(&mut self, element: &Self::Element, key: &str) -> Result<bool>;

    async fn is_visible(&mut self, element: &Self::Element) -> Result<bool>;

    async fn text(&mut self, element: &Self::Element) -> Result<String>;

    /// Waits for the element to leave the DOM; false if it is still attached at `timeout`.
    async fn wait_detached(&mut self, element: &Self::Element, timeout: Duration) -> Result<bool>;

    /// Closes the browser. With `purge_profile` the on-disk profile is removed too.
    async fn quit(&mut self, purge_profile: bool) -> Result<()>;
}
