//! Plugin hook-sets and descriptors.
//!
//! A plugin is a capability bundle implementing some subset of the
//! resolve/load/transform hooks. Hooks run in plugin order; returning
//! `Ok(None)` from any hook defers to the next plugin in sequence.
//! Callers hand the orchestrator [`PluginDescriptor`]s: either a ready
//! hook-set shared by every entry, or a factory re-invoked per entry.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

/// A hook-set applied during module graph construction.
///
/// All hooks default to deferring, so implementors only override what they
/// participate in.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Plugin name for debugging and logging.
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("unnamed")
    }

    /// Map an import specifier to a module locator.
    ///
    /// `importer` is the id of the module containing the import, or `None`
    /// for entry points. Plugins that branch on `importer` must also
    /// override [`resolves_by_importer`](Plugin::resolves_by_importer).
    async fn resolve_id(
        &self,
        _specifier: &str,
        _importer: Option<&str>,
    ) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    /// Produce the source for a module id.
    async fn load(&self, _id: &str) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    /// Rewrite the source of a loaded module.
    async fn transform(&self, _code: &str, _id: &str) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    /// Declare that [`resolve_id`](Plugin::resolve_id) consults the importer.
    ///
    /// Importer-dependent resolution may legitimately answer differently per
    /// entry point, which disables cross-entry reuse of the engine's module
    /// cache. The declaration stands in for the hook-arity inspection a
    /// dynamic host would perform; a plugin that reads the importer without
    /// declaring it here evades classification, so output correctness rests
    /// on the declaration being honest.
    fn resolves_by_importer(&self) -> bool {
        false
    }
}

/// Shared handle to a plugin hook-set.
pub type SharedPlugin = Arc<dyn Plugin>;

/// Builds a fresh hook-set for one entry point.
///
/// Invoked once per entry with the entry's derived name and locator.
pub trait PluginFactory: Send + Sync {
    fn instantiate(&self, entry_name: &str, entry_locator: &str) -> SharedPlugin;
}

impl<F> PluginFactory for F
where
    F: Fn(&str, &str) -> SharedPlugin + Send + Sync,
{
    fn instantiate(&self, entry_name: &str, entry_locator: &str) -> SharedPlugin {
        self(entry_name, entry_locator)
    }
}

/// A plugin as supplied by the caller: a ready hook-set or a factory.
///
/// Factories are instantiated per entry and force the whole plugin set into
/// the variant build path.
#[derive(Clone)]
pub enum PluginDescriptor {
    /// One hook-set shared by every entry.
    Static(SharedPlugin),

    /// Instantiated per entry with the entry's `(name, locator)`.
    Factory(Arc<dyn PluginFactory>),
}

impl PluginDescriptor {
    /// Wrap a hook-set shared by every entry.
    pub fn from_plugin(plugin: impl Plugin + 'static) -> Self {
        Self::Static(Arc::new(plugin))
    }

    /// Wrap a factory re-invoked per entry.
    pub fn from_factory(factory: impl PluginFactory + 'static) -> Self {
        Self::Factory(Arc::new(factory))
    }

    /// Whether this descriptor produces a fresh hook-set per entry.
    pub fn is_factory(&self) -> bool {
        matches!(self, Self::Factory(_))
    }

    /// The hook-set to use for one entry.
    pub(crate) fn materialize(&self, entry_name: &str, entry_locator: &str) -> SharedPlugin {
        match self {
            Self::Static(plugin) => Arc::clone(plugin),
            Self::Factory(factory) => factory.instantiate(entry_name, entry_locator),
        }
    }
}

impl From<SharedPlugin> for PluginDescriptor {
    fn from(plugin: SharedPlugin) -> Self {
        Self::Static(plugin)
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(plugin) => f.debug_tuple("Static").field(&plugin.name()).finish(),
            Self::Factory(_) => f.write_str("Factory"),
        }
    }
}
