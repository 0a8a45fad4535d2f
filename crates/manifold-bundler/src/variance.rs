//! Plugin-set variance classification.
//!
//! Whether module state may be carried from one entry's build into the next
//! hinges on one question: can any hook answer differently depending on the
//! entry being built? The classifier answers it statically, once per run,
//! before the first engine call.

use crate::plugin::PluginDescriptor;

/// Whether a plugin set's observable behavior can depend on which entry is
/// currently being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variance {
    /// Hooks behave identically for every entry; engine module state is
    /// threaded across builds and repeated loads are served from the cache.
    Invariant,

    /// At least one hook may answer per-entry; every entry builds from an
    /// empty module cache with freshly instantiated factories.
    Variant,
}

impl Variance {
    pub fn is_variant(self) -> bool {
        matches!(self, Self::Variant)
    }
}

/// Classify a plugin set.
///
/// `Variant` iff any descriptor is a factory (its products have not been
/// observed yet), or any static hook-set declares importer-sensitive
/// resolution. The check is conservative in the safe direction: a set
/// classified `Variant` that happens to behave identically merely loses
/// cache reuse, while a truly entry-dependent set classified `Invariant`
/// would corrupt output. The verdict holds for the whole run and is never
/// re-evaluated mid-run.
pub fn classify(descriptors: &[PluginDescriptor]) -> Variance {
    let variant = descriptors.iter().any(|descriptor| match descriptor {
        PluginDescriptor::Factory(_) => true,
        PluginDescriptor::Static(plugin) => plugin.resolves_by_importer(),
    });
    if variant {
        Variance::Variant
    } else {
        Variance::Invariant
    }
}
