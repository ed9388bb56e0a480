use crate::profiles::{Catalog, DEFAULT_ALIAS};
use std::fmt::Write;

/// Human-readable listing of the registered sites and persons.
pub fn render(catalog: &Catalog) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Sites:");
    for site in catalog.sites.iter() {
        let _ = writeln!(out, "  {:<10} {}", site.name, site.main_page_url);
    }

    let _ = writeln!(out, "Persons:");
    for person in catalog.persons.iter() {
        let _ = writeln!(
            out,
            "  {:<14} {}",
            person.name,
            person.assistant_tone.as_deref().unwrap_or("-")
        );
    }

    let _ = writeln!(
        out,
        "{} names a copy of the default site and person.",
        DEFAULT_ALIAS
    );
    out
}
