//! Entry point normalization.
//!
//! Callers describe entries in one of three shapes: a single locator, an
//! ordered list of locators, or a name → locator mapping. The rest of the
//! orchestrator only ever sees the normalized form, an ordered sequence of
//! [`EntryRecord`]s, so every downstream component gets one build order and
//! one naming rule.

use std::path::Path;

use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use crate::{Error, Result};

/// Entry point(s) for a build operation.
#[derive(Debug, Clone)]
pub enum EntryPoints {
    /// Single entry point.
    Single(String),

    /// Multiple entry points with automatic naming.
    Multiple(Vec<String>),

    /// Named entry points with custom output names.
    ///
    /// Keys are the output names, values are the import locators. Iteration
    /// order is insertion order, which fixes the build order.
    Named(IndexMap<String, String>),
}

impl EntryPoints {
    /// Build a [`EntryPoints::Named`] set from `(name, locator)` pairs.
    pub fn named<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Named(
            pairs
                .into_iter()
                .map(|(name, locator)| (name.into(), locator.into()))
                .collect(),
        )
    }
}

impl From<&str> for EntryPoints {
    fn from(locator: &str) -> Self {
        Self::Single(locator.to_owned())
    }
}

impl From<String> for EntryPoints {
    fn from(locator: String) -> Self {
        Self::Single(locator)
    }
}

impl From<Vec<String>> for EntryPoints {
    fn from(locators: Vec<String>) -> Self {
        Self::Multiple(locators)
    }
}

impl From<Vec<&str>> for EntryPoints {
    fn from(locators: Vec<&str>) -> Self {
        Self::Multiple(locators.into_iter().map(str::to_owned).collect())
    }
}

impl<const N: usize> From<[&str; N]> for EntryPoints {
    fn from(locators: [&str; N]) -> Self {
        Self::Multiple(locators.iter().map(|l| (*l).to_owned()).collect())
    }
}

impl From<IndexMap<String, String>> for EntryPoints {
    fn from(map: IndexMap<String, String>) -> Self {
        Self::Named(map)
    }
}

/// One normalized entry: the output name plus the locator handed to the
/// engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    /// Output name, from the mapping key or derived from the locator.
    pub name: String,
    /// Where the engine finds the entry module (path, virtual id, URL).
    pub locator: String,
}

/// Derive an output name from a locator: the path stem when the locator is
/// path-like, otherwise the locator string itself.
pub(crate) fn entry_name(locator: &str) -> String {
    Path::new(locator)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_owned)
        .unwrap_or_else(|| locator.to_owned())
}

/// Flatten an entry specification into build order.
///
/// Pure: list order and mapping insertion order are preserved verbatim.
/// Empty locators and empty mapping keys are configuration errors.
pub(crate) fn normalize_entries(entry: &EntryPoints) -> Result<Vec<EntryRecord>> {
    match entry {
        EntryPoints::Single(locator) => Ok(vec![record_for(locator)?]),
        EntryPoints::Multiple(locators) => locators.iter().map(|l| record_for(l)).collect(),
        EntryPoints::Named(map) => map
            .iter()
            .map(|(name, locator)| {
                if name.is_empty() {
                    return Err(Error::InvalidConfig(format!(
                        "entry name for locator `{locator}` must not be empty"
                    )));
                }
                validate_locator(locator)?;
                Ok(EntryRecord {
                    name: name.clone(),
                    locator: locator.clone(),
                })
            })
            .collect(),
    }
}

fn record_for(locator: &str) -> Result<EntryRecord> {
    validate_locator(locator)?;
    Ok(EntryRecord {
        name: entry_name(locator),
        locator: locator.to_owned(),
    })
}

fn validate_locator(locator: &str) -> Result<()> {
    if locator.is_empty() {
        return Err(Error::InvalidConfig(
            "entry locator must not be empty".to_owned(),
        ));
    }
    Ok(())
}

/// Reject entry sets whose derived names collide.
///
/// Duplicate names are allowed by default (results simply share a name);
/// this check backs the opt-in strict mode.
pub(crate) fn check_unique_names(records: &[EntryRecord]) -> Result<()> {
    let mut seen = FxHashSet::default();
    for record in records {
        if !seen.insert(record.name.as_str()) {
            return Err(Error::DuplicateEntryName(record.name.clone()));
        }
    }
    Ok(())
}
