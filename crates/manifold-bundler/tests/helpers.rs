//! Shared test harness for manifold-bundler integration tests.
//!
//! Carries a small in-memory bundling engine honoring the full engine
//! contract: plugin-driven resolve/load/transform, a reusable module
//! cache, and chunk generation by concatenating module sources in
//! dependency-first order. Real engines do far more; the tests only need
//! faithful caching and hook-ordering semantics.

#![allow(dead_code)]

use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};

use manifold_bundler::{
    Artifact, ArtifactSet, Engine, EngineBuild, EngineBundle, EngineInput, ModuleCache,
    OutputChunk, OutputFormat, OutputOptions, Plugin, SharedPlugin,
};

static IMPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"from\s+['"]([^'"]+)['"]"#).unwrap());

/// Module record cached across builds: transformed source plus the raw
/// import specifiers found in it.
#[derive(Debug, Clone)]
struct ModuleRecord {
    code: String,
    imports: Vec<String>,
}

type ModuleState = FxHashMap<String, ModuleRecord>;

/// In-memory engine. Modules already present in the incoming cache are not
/// re-loaded or re-transformed; import edges are re-resolved every build.
#[derive(Default)]
pub struct MockEngine {
    build_calls: AtomicUsize,
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn build_count(&self) -> usize {
        self.build_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Engine for MockEngine {
    async fn build(&self, input: EngineInput) -> anyhow::Result<EngineBuild> {
        self.build_calls.fetch_add(1, Ordering::SeqCst);

        let mut state: ModuleState = input
            .cache
            .downcast_ref::<ModuleState>()
            .cloned()
            .unwrap_or_default();

        let entry_id = resolve(&input.plugins, &input.input.import, None)
            .await?
            .unwrap_or_else(|| input.input.import.clone());

        let mut visited = FxHashSet::default();
        let mut order = Vec::new();
        collect(&input.plugins, &mut state, &mut visited, &mut order, entry_id).await?;

        let modules = order.iter().map(|id| state[id].code.clone()).collect();
        let bundle = MockBundle {
            name: input.input.name.unwrap_or_else(|| "bundle".to_owned()),
            modules,
        };

        Ok(EngineBuild {
            bundle: Arc::new(bundle),
            cache: ModuleCache::new(state),
        })
    }
}

/// Depth-first graph walk; pushes ids dependency-first so the concatenated
/// chunk defines before use.
fn collect<'a>(
    plugins: &'a [SharedPlugin],
    state: &'a mut ModuleState,
    visited: &'a mut FxHashSet<String>,
    order: &'a mut Vec<String>,
    id: String,
) -> BoxFuture<'a, anyhow::Result<()>> {
    Box::pin(async move {
        if !visited.insert(id.clone()) {
            return Ok(());
        }
        if !state.contains_key(&id) {
            let source = load(plugins, &id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("could not load module `{id}`"))?;
            let code = transform(plugins, source, &id).await?;
            let imports = scan_imports(&code);
            state.insert(id.clone(), ModuleRecord { code, imports });
        }
        let imports = state[&id].imports.clone();
        for specifier in imports {
            let dep = resolve(plugins, &specifier, Some(&id))
                .await?
                .unwrap_or(specifier);
            collect(plugins, state, visited, order, dep).await?;
        }
        order.push(id);
        Ok(())
    })
}

async fn resolve(
    plugins: &[SharedPlugin],
    specifier: &str,
    importer: Option<&str>,
) -> anyhow::Result<Option<String>> {
    for plugin in plugins {
        if let Some(resolved) = plugin.resolve_id(specifier, importer).await? {
            return Ok(Some(resolved));
        }
    }
    Ok(None)
}

async fn load(plugins: &[SharedPlugin], id: &str) -> anyhow::Result<Option<String>> {
    for plugin in plugins {
        if let Some(code) = plugin.load(id).await? {
            return Ok(Some(code));
        }
    }
    Ok(None)
}

async fn transform(
    plugins: &[SharedPlugin],
    mut code: String,
    id: &str,
) -> anyhow::Result<String> {
    for plugin in plugins {
        if let Some(next) = plugin.transform(&code, id).await? {
            code = next;
        }
    }
    Ok(code)
}

fn scan_imports(code: &str) -> Vec<String> {
    IMPORT_RE
        .captures_iter(code)
        .map(|captures| captures[1].to_owned())
        .collect()
}

struct MockBundle {
    name: String,
    modules: Vec<String>,
}

impl MockBundle {
    fn chunk(&self, options: &OutputOptions) -> OutputChunk {
        let filename = options
            .file
            .as_ref()
            .and_then(|file| file.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.{}", self.name, extension(options.format)));
        OutputChunk {
            name: self.name.clone(),
            filename,
            code: self.modules.join("\n"),
            map: options
                .sourcemap
                .then(|| format!("{{\"file\":\"{}\"}}", self.name)),
        }
    }
}

#[async_trait]
impl EngineBundle for MockBundle {
    async fn generate(&self, options: &OutputOptions) -> anyhow::Result<ArtifactSet> {
        Ok(ArtifactSet {
            artifacts: vec![Artifact::Chunk(self.chunk(options))],
        })
    }

    async fn write(&self, options: &OutputOptions) -> anyhow::Result<ArtifactSet> {
        let chunk = self.chunk(options);
        let target = match (&options.file, &options.dir) {
            (Some(file), _) => file.clone(),
            (None, Some(dir)) => dir.join(&chunk.filename),
            (None, None) => anyhow::bail!("output options need `dir` or `file`"),
        };
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&target, &chunk.code)?;
        Ok(ArtifactSet {
            artifacts: vec![Artifact::Chunk(chunk)],
        })
    }
}

fn extension(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Esm => "js",
        OutputFormat::Cjs => "cjs",
        OutputFormat::Iife => "iife.js",
    }
}

/// Serves a fixed set of in-memory modules, resolving known ids verbatim
/// and counting loads per id.
pub struct VirtualModules {
    modules: FxHashMap<String, String>,
    load_counts: Mutex<FxHashMap<String, usize>>,
}

impl VirtualModules {
    pub fn new<I, K, V>(modules: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            modules: modules
                .into_iter()
                .map(|(id, code)| (id.into(), code.into()))
                .collect(),
            load_counts: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn shared<I, K, V>(modules: I) -> Arc<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Arc::new(Self::new(modules))
    }

    /// How many times the real loader ran for `id` (cache hits excluded).
    pub fn load_count(&self, id: &str) -> usize {
        self.load_counts.lock().get(id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Plugin for VirtualModules {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("virtual-modules")
    }

    async fn resolve_id(
        &self,
        specifier: &str,
        _importer: Option<&str>,
    ) -> anyhow::Result<Option<String>> {
        Ok(self
            .modules
            .contains_key(specifier)
            .then(|| specifier.to_owned()))
    }

    async fn load(&self, id: &str) -> anyhow::Result<Option<String>> {
        match self.modules.get(id) {
            Some(code) => {
                *self.load_counts.lock().entry(id.to_owned()).or_insert(0) += 1;
                Ok(Some(code.clone()))
            }
            None => Ok(None),
        }
    }
}

/// Transform that records every call and substitutes a needle in selected
/// modules, deferring for the rest.
pub struct RecordingTransform {
    needle: String,
    replacements: FxHashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl RecordingTransform {
    /// Pure call recorder; never rewrites anything.
    pub fn recorder() -> Arc<Self> {
        Arc::new(Self {
            needle: String::new(),
            replacements: FxHashMap::default(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn shared<I, K, V>(needle: &str, replacements: I) -> Arc<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Arc::new(Self {
            needle: needle.to_owned(),
            replacements: replacements
                .into_iter()
                .map(|(id, value)| (id.into(), value.into()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Ids passed to the transform hook, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, id: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == id).count()
    }
}

#[async_trait]
impl Plugin for RecordingTransform {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("recording-transform")
    }

    async fn transform(&self, code: &str, id: &str) -> anyhow::Result<Option<String>> {
        self.calls.lock().push(id.to_owned());
        Ok(self
            .replacements
            .get(id)
            .map(|value| code.replace(&self.needle, value)))
    }
}

/// Resolver routing a specifier to different ids depending on the
/// importing module. Declares its importer sensitivity.
pub struct ImporterRouter {
    routes: Vec<(String, String, String)>,
}

impl ImporterRouter {
    /// Routes as `(specifier, importer, target)` triples.
    pub fn shared<I, S>(routes: I) -> Arc<Self>
    where
        I: IntoIterator<Item = (S, S, S)>,
        S: Into<String>,
    {
        Arc::new(Self {
            routes: routes
                .into_iter()
                .map(|(specifier, importer, target)| {
                    (specifier.into(), importer.into(), target.into())
                })
                .collect(),
        })
    }
}

#[async_trait]
impl Plugin for ImporterRouter {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("importer-router")
    }

    async fn resolve_id(
        &self,
        specifier: &str,
        importer: Option<&str>,
    ) -> anyhow::Result<Option<String>> {
        for (candidate, from, target) in &self.routes {
            if candidate.as_str() == specifier && importer == Some(from.as_str()) {
                return Ok(Some(target.clone()));
            }
        }
        Ok(None)
    }

    fn resolves_by_importer(&self) -> bool {
        true
    }
}

/// Loader that errors for one id, deferring otherwise.
pub struct FailingLoad {
    id: String,
}

impl FailingLoad {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_owned() }
    }
}

#[async_trait]
impl Plugin for FailingLoad {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("failing-load")
    }

    async fn load(&self, id: &str) -> anyhow::Result<Option<String>> {
        if id == self.id.as_str() {
            anyhow::bail!("refusing to load `{id}`");
        }
        Ok(None)
    }
}

/// Records each `(name, locator)` pair a factory was instantiated with.
pub struct InstantiationLog(Mutex<Vec<(String, String)>>);

impl InstantiationLog {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self(Mutex::new(Vec::new())))
    }

    pub fn record(&self, name: &str, locator: &str) {
        self.0.lock().push((name.to_owned(), locator.to_owned()));
    }

    pub fn entries(&self) -> Vec<(String, String)> {
        self.0.lock().clone()
    }
}
