//! The sequential multi-entry build loop.
//!
//! This is the driver the rest of the crate exists for. Entries are built
//! strictly one after another: on the invariant path the module state
//! returned by build *i* is a precondition for build *i + 1*, so the loop
//! never pipelines engine calls. Results surface lazily: each call to
//! [`BundleSequence::next_bundle`] builds exactly one entry, and the
//! caller's consumption rate is the only scheduler.

use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::{LoadCache, wrap_with_load_cache};
use crate::engine::{Engine, EngineInput, EngineOptions, InputItem, ModuleCache};
use crate::entry::{EntryPoints, EntryRecord, check_unique_names, normalize_entries};
use crate::output::BundleResult;
use crate::plugin::{Plugin, PluginDescriptor, PluginFactory, SharedPlugin};
use crate::variance::{Variance, classify};
use crate::{Error, Result};

/// Cache behavior for one orchestration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheOptions {
    /// Install the run-wide load cache (default `true`).
    #[serde(default = "default_true")]
    pub load: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self { load: true }
    }
}

/// Configuration for a multi-entry build.
///
/// Construct with [`BuildOptions::new`], chain the builder methods, then
/// call [`build`](BuildOptions::build) to obtain the lazy sequence.
pub struct BuildOptions {
    engine: Arc<dyn Engine>,
    entry: EntryPoints,
    plugins: Vec<PluginDescriptor>,
    cache: CacheOptions,
    strict_entry_names: bool,
    engine_options: EngineOptions,
}

impl BuildOptions {
    pub fn new(engine: Arc<dyn Engine>, entry: impl Into<EntryPoints>) -> Self {
        Self {
            engine,
            entry: entry.into(),
            plugins: Vec::new(),
            cache: CacheOptions::default(),
            strict_entry_names: false,
            engine_options: EngineOptions::new(),
        }
    }

    /// Append a hook-set shared by every entry.
    pub fn plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(PluginDescriptor::from_plugin(plugin));
        self
    }

    /// Append a factory instantiated per entry with `(name, locator)`.
    ///
    /// Factories force the variant build path: no module state is carried
    /// between entries.
    pub fn plugin_factory(mut self, factory: impl PluginFactory + 'static) -> Self {
        self.plugins.push(PluginDescriptor::from_factory(factory));
        self
    }

    /// Append an already-built descriptor.
    pub fn descriptor(mut self, descriptor: PluginDescriptor) -> Self {
        self.plugins.push(descriptor);
        self
    }

    /// Enable or disable the run-wide load cache.
    pub fn load_cache(mut self, enabled: bool) -> Self {
        self.cache.load = enabled;
        self
    }

    pub fn cache(mut self, cache: CacheOptions) -> Self {
        self.cache = cache;
        self
    }

    /// Reject entry sets whose derived names collide.
    ///
    /// Off by default: duplicate names are legal and simply yield results
    /// sharing a name.
    pub fn strict_entry_names(mut self, strict: bool) -> Self {
        self.strict_entry_names = strict;
        self
    }

    /// Opaque option passed through to every engine build call.
    pub fn engine_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.engine_options.insert(key.into(), value);
        self
    }

    pub fn engine_options(mut self, options: EngineOptions) -> Self {
        self.engine_options = options;
        self
    }

    /// Normalize, classify and wrap, producing the lazy build sequence.
    ///
    /// Performs no engine work: entry validation and plugin classification
    /// fail here, before the first build starts.
    pub fn build(self) -> Result<BundleSequence> {
        let entries = normalize_entries(&self.entry)?;
        if self.strict_entry_names {
            check_unique_names(&entries)?;
        }

        let variance = classify(&self.plugins);

        // A single entry has no cross-entry reuse to win; skip the wrapper.
        let (descriptors, load_cache) = if self.cache.load && entries.len() > 1 {
            let (wrapped, cache) = wrap_with_load_cache(self.plugins);
            (wrapped, Some(cache))
        } else {
            (self.plugins, None)
        };

        let mode = match variance {
            Variance::Invariant => PluginMode::Invariant(materialize_static(&descriptors)),
            Variance::Variant => PluginMode::Variant(descriptors),
        };

        debug!(
            entries = entries.len(),
            variant = variance.is_variant(),
            load_cache = load_cache.is_some(),
            "build sequence prepared"
        );

        Ok(BundleSequence {
            engine: self.engine,
            entries: entries.into(),
            mode,
            module_cache: ModuleCache::empty(),
            engine_options: self.engine_options,
            load_cache,
            halted: false,
        })
    }
}

impl fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildOptions")
            .field("entry", &self.entry)
            .field("plugins", &self.plugins.len())
            .field("cache", &self.cache)
            .field("strict_entry_names", &self.strict_entry_names)
            .finish_non_exhaustive()
    }
}

/// Invariant runs materialize the hook-set once; variant runs keep the
/// descriptors and re-instantiate factories for every entry.
enum PluginMode {
    Invariant(Vec<SharedPlugin>),
    Variant(Vec<PluginDescriptor>),
}

fn materialize_static(descriptors: &[PluginDescriptor]) -> Vec<SharedPlugin> {
    descriptors
        .iter()
        .map(|descriptor| match descriptor {
            PluginDescriptor::Static(plugin) => Arc::clone(plugin),
            // classify() routes any factory to the variant path
            PluginDescriptor::Factory(_) => {
                unreachable!("factory descriptor in invariant plugin set")
            }
        })
        .collect()
}

/// Lazy ordered finite sequence of per-entry bundle results.
///
/// Obtained from [`BuildOptions::build`]. Entries build in normalized
/// order; the result for entry *i* is available only once its build
/// completes, and entry *i + 1* never starts before that.
pub struct BundleSequence {
    engine: Arc<dyn Engine>,
    entries: VecDeque<EntryRecord>,
    mode: PluginMode,
    module_cache: ModuleCache,
    engine_options: EngineOptions,
    load_cache: Option<LoadCache>,
    halted: bool,
}

impl BundleSequence {
    /// Entries not yet built.
    pub fn remaining(&self) -> usize {
        self.entries.len()
    }

    /// Variance verdict for this run's plugin set.
    pub fn variance(&self) -> Variance {
        match self.mode {
            PluginMode::Invariant(_) => Variance::Invariant,
            PluginMode::Variant(_) => Variance::Variant,
        }
    }

    /// The run-wide load cache, when one was installed.
    pub fn load_cache(&self) -> Option<&LoadCache> {
        self.load_cache.as_ref()
    }

    /// Build the next entry.
    ///
    /// Returns `None` once the sequence is exhausted, or after a build
    /// failure, which halts the sequence without invalidating results
    /// already yielded. The failed entry is not retried.
    pub async fn next_bundle(&mut self) -> Option<Result<BundleResult>> {
        if self.halted {
            return None;
        }
        let record = self.entries.pop_front()?;

        let plugins = match &self.mode {
            PluginMode::Invariant(plugins) => plugins.clone(),
            PluginMode::Variant(descriptors) => {
                // Per-entry hook state makes carried-over module state unsafe.
                self.module_cache = ModuleCache::empty();
                descriptors
                    .iter()
                    .map(|d| d.materialize(&record.name, &record.locator))
                    .collect()
            }
        };

        debug!(entry = %record.name, locator = %record.locator, "building entry");
        let started = Instant::now();
        let input = EngineInput {
            input: InputItem {
                name: Some(record.name.clone()),
                import: record.locator.clone(),
            },
            plugins,
            cache: mem::take(&mut self.module_cache),
            options: self.engine_options.clone(),
        };

        match self.engine.build(input).await {
            Ok(build) => {
                let duration = started.elapsed();
                if let PluginMode::Invariant(_) = self.mode {
                    self.module_cache = build.cache;
                }
                debug!(
                    entry = %record.name,
                    elapsed_ms = duration.as_millis() as u64,
                    "entry built"
                );
                Some(Ok(BundleResult::new(record, build.bundle, duration)))
            }
            Err(error) => {
                self.halted = true;
                Some(Err(Error::Build {
                    entry: record.locator,
                    error,
                }))
            }
        }
    }

    /// Drain the sequence, stopping at the first failed build.
    pub async fn try_collect(mut self) -> Result<Vec<BundleResult>> {
        let mut results = Vec::with_capacity(self.remaining());
        while let Some(bundle) = self.next_bundle().await {
            results.push(bundle?);
        }
        Ok(results)
    }

    /// Adapt into a [`futures::Stream`] of results.
    pub fn into_stream(self) -> impl futures::Stream<Item = Result<BundleResult>> {
        futures::stream::unfold(self, |mut sequence| async move {
            sequence.next_bundle().await.map(|item| (item, sequence))
        })
    }
}

impl fmt::Debug for BundleSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleSequence")
            .field("remaining", &self.entries.len())
            .field("variant", &self.variance().is_variant())
            .field("halted", &self.halted)
            .finish_non_exhaustive()
    }
}
