//! Cross-entry load caching.
//!
//! Loading a module's source is the most repeated unit of work in a
//! multi-entry run: every entry whose graph reaches a shared module would
//! ask the loaders for the same id again. The wrapper installs a run-wide
//! table in front of the caller's plugins so each id is loaded at most
//! once, however many entries reach it.

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::plugin::{Plugin, PluginDescriptor, SharedPlugin};

/// Run-wide table of previously loaded module sources, keyed by module id.
///
/// Entries accumulate for the lifetime of an orchestration run and are
/// never evicted; module ids are assumed content-stable within one run.
/// Only successful loads are recorded; a hook that does not recognize an
/// id leaves the table untouched, so the id still falls through to later
/// plugins on the next encounter.
#[derive(Clone, Default)]
pub struct LoadCache {
    entries: Arc<Mutex<FxHashMap<String, String>>>,
}

impl LoadCache {
    /// Previously loaded source for `id`, if any.
    pub fn get(&self, id: &str) -> Option<String> {
        self.entries.lock().get(id).cloned()
    }

    pub(crate) fn insert(&self, id: &str, code: &str) {
        self.entries
            .lock()
            .insert(id.to_owned(), code.to_owned());
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Synthetic loader inserted ahead of every caller plugin. A table hit
/// short-circuits all later loaders for that id.
struct CacheServePlugin {
    cache: LoadCache,
}

#[async_trait]
impl Plugin for CacheServePlugin {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("manifold:load-cache")
    }

    async fn load(&self, id: &str) -> anyhow::Result<Option<String>> {
        Ok(self.cache.get(id))
    }
}

/// Delegating wrapper that records successful loads into the table once the
/// inner hook settles.
struct CacheRecordPlugin {
    inner: SharedPlugin,
    cache: LoadCache,
}

#[async_trait]
impl Plugin for CacheRecordPlugin {
    fn name(&self) -> Cow<'static, str> {
        self.inner.name()
    }

    async fn resolve_id(
        &self,
        specifier: &str,
        importer: Option<&str>,
    ) -> anyhow::Result<Option<String>> {
        self.inner.resolve_id(specifier, importer).await
    }

    async fn load(&self, id: &str) -> anyhow::Result<Option<String>> {
        let loaded = self.inner.load(id).await?;
        if let Some(code) = &loaded {
            self.cache.insert(id, code);
        }
        Ok(loaded)
    }

    async fn transform(&self, code: &str, id: &str) -> anyhow::Result<Option<String>> {
        self.inner.transform(code, id).await
    }

    fn resolves_by_importer(&self) -> bool {
        self.inner.resolves_by_importer()
    }
}

/// Wrap a descriptor sequence with the run-wide load cache.
///
/// The serve plugin goes first so a cached id never reaches a real loader.
/// Static hook-sets are wrapped to record; factories pass through untouched
/// (their per-entry products are not recorded, since the ids they serve may
/// be entry-specific). Applied once per run, not per entry.
pub(crate) fn wrap_with_load_cache(
    descriptors: Vec<PluginDescriptor>,
) -> (Vec<PluginDescriptor>, LoadCache) {
    let cache = LoadCache::default();
    let mut wrapped = Vec::with_capacity(descriptors.len() + 1);
    wrapped.push(PluginDescriptor::Static(Arc::new(CacheServePlugin {
        cache: cache.clone(),
    })));
    for descriptor in descriptors {
        wrapped.push(match descriptor {
            PluginDescriptor::Static(plugin) => {
                PluginDescriptor::Static(Arc::new(CacheRecordPlugin {
                    inner: plugin,
                    cache: cache.clone(),
                }))
            }
            factory @ PluginDescriptor::Factory(_) => factory,
        });
    }
    (wrapped, cache)
}
