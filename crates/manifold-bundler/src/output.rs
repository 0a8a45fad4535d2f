//! Per-entry bundle results.
//!
//! The engine hands back a bundle that can emit artifact sets of several
//! kinds. The adapter narrows that to the shape callers consume: exactly
//! one primary chunk per output configuration, with uniform timing and
//! error semantics across entries.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;

use crate::engine::{ArtifactSet, EngineBundle, OutputChunk, OutputOptions};
use crate::entry::EntryRecord;
use crate::{Error, Result};

/// Output configuration for a result: one configuration, an ordered list,
/// or a function of the entry's name.
#[derive(Clone)]
pub enum OutputSpec {
    Single(OutputOptions),
    Multiple(Vec<OutputOptions>),
    PerEntry(Arc<dyn Fn(&str) -> OutputOptions + Send + Sync>),
}

impl OutputSpec {
    /// Configuration computed from each entry's name.
    pub fn per_entry(f: impl Fn(&str) -> OutputOptions + Send + Sync + 'static) -> Self {
        Self::PerEntry(Arc::new(f))
    }

    /// Resolve to the concrete configurations for one entry.
    pub fn resolve(&self, entry_name: &str) -> Vec<OutputOptions> {
        match self {
            Self::Single(options) => vec![options.clone()],
            Self::Multiple(options) => options.clone(),
            Self::PerEntry(f) => vec![f(entry_name)],
        }
    }
}

impl From<OutputOptions> for OutputSpec {
    fn from(options: OutputOptions) -> Self {
        Self::Single(options)
    }
}

impl From<Vec<OutputOptions>> for OutputSpec {
    fn from(options: Vec<OutputOptions>) -> Self {
        Self::Multiple(options)
    }
}

impl fmt::Debug for OutputSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(options) => f.debug_tuple("Single").field(options).finish(),
            Self::Multiple(options) => f.debug_tuple("Multiple").field(&options.len()).finish(),
            Self::PerEntry(_) => f.write_str("PerEntry"),
        }
    }
}

/// Timing gathered while an entry was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildStats {
    duration: Duration,
}

impl BuildStats {
    pub(crate) fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Wall-clock time of the engine build call.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn duration_ms(&self) -> u128 {
        self.duration.as_millis()
    }
}

/// Handle to one entry's completed build.
///
/// Independent of the sequence that produced it: consuming or discarding
/// one result never affects the others. Generate and write may be invoked
/// repeatedly and concurrently; equal configurations produce equal chunk
/// content.
#[derive(Clone)]
pub struct BundleResult {
    name: String,
    entrypoint: String,
    bundle: Arc<dyn EngineBundle>,
    stats: BuildStats,
}

impl BundleResult {
    pub(crate) fn new(
        record: EntryRecord,
        bundle: Arc<dyn EngineBundle>,
        duration: Duration,
    ) -> Self {
        Self {
            name: record.name,
            entrypoint: record.locator,
            bundle,
            stats: BuildStats::new(duration),
        }
    }

    /// Output name derived during normalization.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Locator of the entry module this bundle was built from.
    pub fn entrypoint(&self) -> &str {
        &self.entrypoint
    }

    pub fn stats(&self) -> BuildStats {
        self.stats
    }

    /// Produce the primary chunk for each resolved output configuration.
    ///
    /// Free of filesystem side effects. The per-configuration engine calls
    /// run concurrently; they are independent once the entry's own build
    /// has completed. A failure here is scoped to this call; the result
    /// stays usable.
    pub async fn generate(&self, output: impl Into<OutputSpec>) -> Result<Vec<OutputChunk>> {
        let spec = output.into();
        let configs = spec.resolve(&self.name);
        try_join_all(configs.iter().map(|options| self.generate_with(options))).await
    }

    /// Generate with one concrete configuration.
    pub async fn generate_with(&self, options: &OutputOptions) -> Result<OutputChunk> {
        let artifacts = self
            .bundle
            .generate(options)
            .await
            .map_err(|error| Error::Generate {
                entry: self.name.clone(),
                error,
            })?;
        self.primary_chunk(artifacts)
    }

    /// Like [`generate`](Self::generate), additionally persisting the
    /// artifacts through the engine.
    pub async fn write(&self, output: impl Into<OutputSpec>) -> Result<Vec<OutputChunk>> {
        let spec = output.into();
        let configs = spec.resolve(&self.name);
        try_join_all(configs.iter().map(|options| self.write_with(options))).await
    }

    /// Write with one concrete configuration.
    pub async fn write_with(&self, options: &OutputOptions) -> Result<OutputChunk> {
        let artifacts = self
            .bundle
            .write(options)
            .await
            .map_err(|error| Error::Write {
                entry: self.name.clone(),
                error,
            })?;
        self.primary_chunk(artifacts)
    }

    fn primary_chunk(&self, artifacts: ArtifactSet) -> Result<OutputChunk> {
        artifacts
            .into_primary_chunk()
            .ok_or_else(|| Error::MissingChunk {
                entry: self.name.clone(),
            })
    }
}

impl fmt::Debug for BundleResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleResult")
            .field("name", &self.name)
            .field("entrypoint", &self.entrypoint)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
