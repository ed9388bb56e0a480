pub mod person;
pub mod site;

pub use person::*;
pub use site::*;

/// Anything stored in a [`crate::profiles::Registry`] is looked up by name.
pub trait Named {
    fn name(&self) -> &str;

    /// Copy of `self` registered under another name.
    fn renamed(&self, name: &str) -> Self;
}

impl Named for SiteProfile {
    fn name(&self) -> &str {
        &self.name
    }

    fn renamed(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..self.clone()
        }
    }
}

impl Named for PersonalizationProfile {
    fn name(&self) -> &str {
        &self.name
    }

    fn renamed(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..self.clone()
        }
    }
}
