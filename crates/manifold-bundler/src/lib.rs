//! # manifold-bundler
//!
//! Multi-entry build orchestration over a pluggable single-entry bundling
//! engine.
//!
//! A bundling engine builds one entry at a time. Driving it across N
//! entries naively repeats most of the work: shared modules get resolved,
//! loaded and transformed once per entry. This crate runs the engine once
//! per entry in a fixed order, decides statically whether the plugin set
//! can answer differently per entry, and when it cannot, threads the
//! engine's module cache from each build into the next while serving
//! repeated loads from a run-wide table.
//!
//! The engine itself stays behind the [`Engine`] trait: parsing,
//! tree-shaking and code generation belong to it, not to this crate.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use manifold_bundler::{BuildOptions, Engine, OutputOptions};
//!
//! # async fn example(engine: Arc<dyn Engine>) -> manifold_bundler::Result<()> {
//! let mut sequence = BuildOptions::new(engine, ["./src/index.js", "./src/cli.js"])
//!     .build()?;
//!
//! while let Some(bundle) = sequence.next_bundle().await {
//!     let bundle = bundle?;
//!     let chunks = bundle.generate(OutputOptions::default()).await?;
//!     println!("{} -> {} chunk(s)", bundle.name(), chunks.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Caching model
//!
//! Two caches cooperate, both owned by the sequence for the run's
//! duration:
//!
//! - the engine's opaque [`ModuleCache`], threaded from build to build
//!   when the plugin set is [`Variance::Invariant`], discarded per entry
//!   when it is [`Variance::Variant`];
//! - the [`LoadCache`] table, a synthetic highest-priority loader that
//!   short-circuits repeated loads of the same module id across entries.
//!
//! A plugin whose resolution legitimately depends on the importing entry
//! declares it (or arrives as a factory), which routes the whole run to
//! the variant path. Correctness is never traded for cache hits.

pub mod build;
pub mod cache;
pub mod engine;
pub mod entry;
pub mod output;
pub mod pipeline;
pub mod plugin;
pub mod variance;

// Logging utilities (optional, enabled with "logging" feature)
#[cfg(feature = "logging")]
pub mod logging;

#[cfg(feature = "logging")]
pub use logging::{LogLevel, init_logging, init_logging_from_env};

pub use build::{BuildOptions, BundleSequence, CacheOptions};
pub use cache::LoadCache;
pub use engine::{
    Artifact, ArtifactSet, Engine, EngineBuild, EngineBundle, EngineInput, EngineOptions,
    InputItem, ModuleCache, OutputAsset, OutputChunk, OutputFormat, OutputOptions,
};
pub use entry::{EntryPoints, EntryRecord};
pub use output::{BuildStats, BundleResult, OutputSpec};
pub use pipeline::{PipelineReport, WrittenBundle, write_while_building};
pub use plugin::{Plugin, PluginDescriptor, PluginFactory, SharedPlugin};
pub use variance::{Variance, classify};

/// Crate version, for hosts that report it.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error types for orchestration operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid entry or option configuration, rejected before any engine
    /// work starts.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Two entries derived the same output name while strict naming was on.
    #[error("duplicate entry name: `{0}`")]
    DuplicateEntryName(String),

    /// The engine rejected an entry's build. The sequence halts here;
    /// results yielded earlier remain valid.
    #[error("build failed for entry `{entry}`: {error}")]
    Build {
        entry: String,
        error: anyhow::Error,
    },

    /// Artifact generation failed. Scoped to the call; the bundle result
    /// stays usable.
    #[error("generate failed for bundle `{entry}`: {error}")]
    Generate {
        entry: String,
        error: anyhow::Error,
    },

    /// Artifact write failed. Scoped to the call; the bundle result stays
    /// usable.
    #[error("write failed for bundle `{entry}`: {error}")]
    Write {
        entry: String,
        error: anyhow::Error,
    },

    /// The engine returned an artifact set without a chunk.
    #[error("no chunk emitted for bundle `{entry}`")]
    MissingChunk { entry: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for orchestration operations.
pub type Result<T> = std::result::Result<T, Error>;
