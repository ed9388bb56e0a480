//! Site and persona registries resolved once at startup.
//!
//! Built-in profiles are registered first, then anything found in an optional
//! `profiles.toml`, and only then the `DEFAULT` aliases are taken so a file
//! override of the aliased profile is what `DEFAULT` snapshots.

mod builtin;
mod registry;

pub use builtin::{DEFAULT_PERSON, DEFAULT_SITE};
pub use registry::{Registry, DEFAULT_ALIAS};

use crate::error::{AppError, Result};
use crate::models::{PersonalizationProfile, SiteProfile};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
struct ProfilesFile {
    #[serde(default)]
    default_site: Option<String>,
    #[serde(default)]
    default_person: Option<String>,
    #[serde(default)]
    site: Vec<SiteProfile>,
    #[serde(default)]
    person: Vec<PersonalizationProfile>,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    pub sites: Registry<SiteProfile>,
    pub persons: Registry<PersonalizationProfile>,
}

impl Catalog {
    pub fn builtin() -> Result<Self> {
        Self::assemble(ProfilesFile::default())
    }

    /// Built-ins plus the profiles declared in `path`; a missing file is not an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No profiles file at {}, using built-in profiles", path.display());
            return Self::builtin();
        }

        let contents = std::fs::read_to_string(path)?;
        let file: ProfilesFile = toml::from_str(&contents)?;
        tracing::info!(
            "Loaded {} site and {} person profiles from {}",
            file.site.len(),
            file.person.len(),
            path.display()
        );
        Self::assemble(file)
    }

    fn assemble(file: ProfilesFile) -> Result<Self> {
        let mut sites = Registry::new("site");
        let mut persons = Registry::new("person");

        for site in builtin::sites().into_iter().chain(file.site) {
            site.validate()?;
            if site.name == DEFAULT_ALIAS {
                return Err(AppError::Configuration(format!(
                    "{} is reserved and cannot name a site profile",
                    DEFAULT_ALIAS
                )));
            }
            sites.register(site);
        }
        for person in builtin::persons().into_iter().chain(file.person) {
            if person.name == DEFAULT_ALIAS {
                return Err(AppError::Configuration(format!(
                    "{} is reserved and cannot name a person profile",
                    DEFAULT_ALIAS
                )));
            }
            persons.register(person);
        }

        sites.alias_default(file.default_site.as_deref().unwrap_or(DEFAULT_SITE))?;
        persons.alias_default(file.default_person.as_deref().unwrap_or(DEFAULT_PERSON))?;

        Ok(Self { sites, persons })
    }

    pub fn site(&self, name: &str) -> Result<SiteProfile> {
        self.sites.get(name).cloned()
    }

    pub fn person(&self, name: &str) -> Result<PersonalizationProfile> {
        self.persons.get(name).cloned()
    }
}
