//! Interface boundary to the external bundling engine.
//!
//! The orchestrator does not resolve modules, shake trees, or generate
//! code; it drives an engine that does, one entry at a time. This module
//! pins down the shape of that collaboration: what a per-entry build call
//! receives, and what it hands back.

use std::any::Any;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::plugin::SharedPlugin;

/// One entry handed to the engine.
#[derive(Debug, Clone)]
pub struct InputItem {
    /// Output name for the entry's chunk, when the caller chose one.
    pub name: Option<String>,
    /// Locator of the entry module.
    pub import: String,
}

/// Opaque options passed through to every engine build call.
///
/// The orchestrator never interprets these; engines pick out what they
/// understand.
pub type EngineOptions = serde_json::Map<String, serde_json::Value>;

/// Engine-owned incremental state describing previously resolved, loaded
/// and transformed modules.
///
/// The orchestrator never looks inside. It only decides whether the state
/// returned by one build may seed the next, and threads the value through
/// the sequential loop explicitly; there is no ambient cache. Engines
/// store whatever they need via [`ModuleCache::new`] and get it back with
/// [`ModuleCache::downcast_ref`].
#[derive(Clone, Default)]
pub struct ModuleCache(Option<Arc<dyn Any + Send + Sync>>);

impl ModuleCache {
    /// Cache carrying no prior module state.
    pub fn empty() -> Self {
        Self(None)
    }

    /// Wrap engine-defined state.
    pub fn new<S: Any + Send + Sync>(state: S) -> Self {
        Self(Some(Arc::new(state)))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Borrow the carried state, if any exists and the type matches.
    pub fn downcast_ref<S: Any + Send + Sync>(&self) -> Option<&S> {
        self.0.as_deref().and_then(|state| state.downcast_ref())
    }
}

impl fmt::Debug for ModuleCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModuleCache")
            .field(if self.is_empty() { &"empty" } else { &"seeded" })
            .finish()
    }
}

/// Everything one per-entry build call receives.
pub struct EngineInput {
    pub input: InputItem,
    /// Hook-sets in execution order.
    pub plugins: Vec<SharedPlugin>,
    /// Module state from the previous entry's build, or empty.
    pub cache: ModuleCache,
    pub options: EngineOptions,
}

/// A successful per-entry build: the bundle handle plus updated module
/// state reflecting what this build resolved and loaded.
pub struct EngineBuild {
    pub bundle: Arc<dyn EngineBundle>,
    pub cache: ModuleCache,
}

/// The external single-entry bundling engine.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Build the dependency graph for one entry and prepare its bundle.
    async fn build(&self, input: EngineInput) -> anyhow::Result<EngineBuild>;
}

/// A bundle the engine produced for one entry.
///
/// `generate` must be free of filesystem side effects; `write` performs
/// the same computation and additionally persists the artifacts. Both may
/// be called repeatedly and concurrently against immutable bundle state,
/// and equal options must yield equal chunk content.
#[async_trait]
pub trait EngineBundle: Send + Sync {
    async fn generate(&self, options: &OutputOptions) -> anyhow::Result<ArtifactSet>;
    async fn write(&self, options: &OutputOptions) -> anyhow::Result<ArtifactSet>;
}

/// Output configuration for one generate/write call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputOptions {
    /// Output module format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Directory for emitted files.
    pub dir: Option<PathBuf>,

    /// Exact path for single-file output. Takes precedence over `dir`.
    pub file: Option<PathBuf>,

    /// Emit a source map alongside the chunk.
    #[serde(default)]
    pub sourcemap: bool,
}

/// Output module format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Esm,
    Cjs,
    Iife,
}

/// Everything one generate/write call produced.
#[derive(Debug, Clone, Default)]
pub struct ArtifactSet {
    pub artifacts: Vec<Artifact>,
}

impl ArtifactSet {
    /// The first chunk-kind artifact, the bundle's primary output.
    pub fn into_primary_chunk(self) -> Option<OutputChunk> {
        self.artifacts.into_iter().find_map(|artifact| match artifact {
            Artifact::Chunk(chunk) => Some(chunk),
            Artifact::Asset(_) => None,
        })
    }
}

/// One unit of engine output.
#[derive(Debug, Clone)]
pub enum Artifact {
    Chunk(OutputChunk),
    Asset(OutputAsset),
}

/// Generated code for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub name: String,
    pub filename: String,
    pub code: String,
    /// Source map contents, when requested.
    pub map: Option<String>,
}

/// Non-code output emitted alongside chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputAsset {
    pub filename: String,
    pub source: Vec<u8>,
}
