use crate::error::{AppError, Result};
use crate::models::Named;
use std::collections::HashMap;

pub const DEFAULT_ALIAS: &str = "DEFAULT";

/// Name-keyed profile table that remembers registration order.
#[derive(Debug, Clone)]
pub struct Registry<T> {
    kind: &'static str,
    entries: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T: Named + Clone> Registry<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Last write wins; an overwritten entry keeps its original position.
    pub fn register(&mut self, profile: T) {
        match self.index.get(profile.name()) {
            Some(&slot) => self.entries[slot] = profile,
            None => {
                self.index.insert(profile.name().to_string(), self.entries.len());
                self.entries.push(profile);
            }
        }
    }

    pub fn get(&self, name: &str) -> Result<&T> {
        self.index
            .get(name)
            .map(|&slot| &self.entries[slot])
            .ok_or_else(|| AppError::config_not_found(self.kind, name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn list_names(&self) -> Vec<String> {
        self.entries.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registers `DEFAULT` as a copy of `target` taken now. Re-registering
    /// `target` afterwards leaves the alias untouched.
    pub fn alias_default(&mut self, target: &str) -> Result<()> {
        let snapshot = self.get(target)?.renamed(DEFAULT_ALIAS);
        self.register(snapshot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Locators, SiteProfile};

    fn site(name: &str, url: &str) -> SiteProfile {
        SiteProfile::new(
            name,
            url,
            Locators {
                text_input: Some("//textarea".into()),
                send_button: Some("//button".into()),
                reply_message: Some("//p".into()),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_get_returns_profile_with_requested_name() {
        let mut registry = Registry::new("site");
        registry.register(site("A", "https://a.example/"));
        registry.register(site("B", "https://b.example/"));

        for name in registry.list_names() {
            assert_eq!(registry.get(&name).unwrap().name, name);
        }
    }

    #[test]
    fn test_unknown_name_is_config_not_found() {
        let registry: Registry<SiteProfile> = Registry::new("site");
        match registry.get("nonexistent") {
            Err(AppError::ConfigNotFound { kind, name }) => {
                assert_eq!(kind, "site");
                assert_eq!(name, "nonexistent");
            }
            other => panic!("unexpected lookup result: {other:?}"),
        }
    }

    #[test]
    fn test_last_write_wins_and_keeps_order() {
        let mut registry = Registry::new("site");
        registry.register(site("A", "https://a.example/"));
        registry.register(site("B", "https://b.example/"));
        registry.register(site("A", "https://a2.example/"));

        assert_eq!(registry.list_names(), vec!["A", "B"]);
        assert_eq!(registry.get("A").unwrap().main_page_url, "https://a2.example/");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_default_alias_is_a_snapshot() {
        let mut registry = Registry::new("site");
        registry.register(site("CHAT", "https://chat.example/"));
        registry.alias_default("CHAT").unwrap();

        let mut changed = site("CHAT", "https://moved.example/");
        changed.locators.text_input = Some("//input".into());
        registry.register(changed);

        let default = registry.get(DEFAULT_ALIAS).unwrap();
        assert_eq!(default.name, DEFAULT_ALIAS);
        assert_eq!(default.main_page_url, "https://chat.example/");
        assert_eq!(default.locators.text_input.as_deref(), Some("//textarea"));
        assert_eq!(registry.get("CHAT").unwrap().main_page_url, "https://moved.example/");
    }

    #[test]
    fn test_alias_to_unknown_target_fails() {
        let mut registry: Registry<SiteProfile> = Registry::new("site");
        assert!(registry.alias_default("MISSING").is_err());
        assert!(!registry.contains(DEFAULT_ALIAS));
    }
}
