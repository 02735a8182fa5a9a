//! # Location Resolver
//!
//! Maps free-text locality phrases ("west side of rochester") to a
//! canonical 5-digit ZIP using a curated table. The table is data, not
//! code: it loads from a JSON file so new areas ship without a redeploy,
//! with a built-in default covering the Rochester NY service area.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

/// Default service-area table, used when no file is configured.
const DEFAULT_ENTRIES: &[(&str, &str)] = &[
    ("west side of rochester", "14606"),
    ("east side of rochester", "14609"),
    ("downtown rochester", "14604"),
    ("south wedge", "14620"),
    ("rochester", "14604"),
    ("brighton", "14618"),
    ("pittsford", "14534"),
    ("penfield", "14526"),
    ("webster", "14580"),
    ("greece", "14626"),
    ("gates", "14624"),
    ("irondequoit", "14617"),
    ("henrietta", "14467"),
    ("fairport", "14450"),
    ("charlotte", "14612"),
];

/// Curated phrase-to-ZIP lookup with longest-match resolution
pub struct LocationResolver {
    /// Normalized phrases sorted longest-first so the most specific
    /// phrase wins ("west side of rochester" before "rochester").
    entries: Vec<(String, String)>,
}

impl LocationResolver {
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut entries: Vec<(String, String)> = entries
            .into_iter()
            .map(|(phrase, zip)| (normalize(&phrase), zip))
            .filter(|(phrase, _)| !phrase.is_empty())
            .collect();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self { entries }
    }

    /// Built-in Rochester-area table.
    pub fn with_defaults() -> Self {
        Self::from_entries(
            DEFAULT_ENTRIES
                .iter()
                .map(|(p, z)| (p.to_string(), z.to_string())),
        )
    }

    /// Load a `{"phrase": "zip", ...}` JSON table from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read location table: {}", path.display()))?;
        let table: BTreeMap<String, String> = serde_json::from_str(&content)
            .with_context(|| format!("Invalid location table: {}", path.display()))?;

        info!("Location table loaded: {} phrases from {}", table.len(), path.display());
        Ok(Self::from_entries(table))
    }

    /// Resolve a locality description to a canonical ZIP.
    ///
    /// A bare 5-digit token passes through unchanged; otherwise the
    /// longest curated phrase contained in the input wins; no match
    /// resolves to `None`.
    pub fn resolve(&self, text: &str) -> Option<String> {
        let trimmed = text.trim();
        if trimmed.len() == 5 && trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Some(trimmed.to_string());
        }

        let normalized = normalize(text);
        if normalized.is_empty() {
            return None;
        }

        self.entries
            .iter()
            .find(|(phrase, _)| normalized.contains(phrase.as_str()))
            .map(|(_, zip)| zip.clone())
    }
}

fn normalize(text: &str) -> String {
    text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}
