//! The engine port and its device-pinned singleton registry (spec §4.2,
//! §9 "Global singletons (engines) -> dependency-injected registry").
//!
//! Mirrors the port-trait-plus-adapter shape of `sem_os_core::ports` /
//! `sem_os_postgres`: callers depend on `Engine`, never on a concrete
//! backend type. Mutexes here protect *initialization*, not *invocation* —
//! `parse` calls run concurrently across distinct engine instances, one
//! per device, exactly as spec.md §5 requires.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use docforge_core::Result;

/// What an engine invocation produced on disk.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub markdown_file: PathBuf,
    pub json_file: Option<PathBuf>,
    /// Name of the directory the engine actually wrote images into, if
    /// any — consulted by `crate::images::normalize_image_dir`.
    pub image_dir_name: Option<String>,
}

#[async_trait]
pub trait Engine: Send + Sync {
    fn name(&self) -> &'static str;

    fn supported_formats(&self) -> &'static [&'static str];

    /// If present, used to join multi-chunk Markdown instead of the
    /// default `\n\n---\n\n` separator (spec §4.2 step 3).
    fn concat_markdown(&self, parts: &[String]) -> String {
        parts.join("\n\n---\n\n")
    }

    async fn parse(
        &self,
        input: &Path,
        output_dir: &Path,
        options: &serde_json::Value,
    ) -> Result<EngineOutput>;

    /// Clears device caches / runs local GC. Called after every
    /// invocation on both the success and failure paths (spec §4.2
    /// "Memory hygiene").
    async fn cleanup(&self);
}

type SingletonKey = (String, String);

/// Lazy, per-(backend, device) singleton registry. Device pinning is
/// part of the singleton key so two devices never share engine state.
pub struct EngineRegistry {
    factories: HashMap<String, fn() -> std::sync::Arc<dyn Engine>>,
    singletons: Mutex<HashMap<SingletonKey, std::sync::Arc<dyn Engine>>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        let mut factories: HashMap<String, fn() -> std::sync::Arc<dyn Engine>> = HashMap::new();
        factories.insert("pipeline".into(), || {
            std::sync::Arc::new(crate::engines::pipeline::PipelineEngine::default())
        });
        factories.insert("markitdown".into(), || {
            std::sync::Arc::new(crate::engines::markitdown::MarkItDownEngine::default())
        });
        factories.insert("sensevoice".into(), || {
            std::sync::Arc::new(crate::engines::sensevoice::SenseVoiceEngine::default())
        });
        factories.insert("video".into(), || {
            std::sync::Arc::new(crate::engines::video::VideoEngine::default())
        });
        factories.insert("specialized-format".into(), || {
            std::sync::Arc::new(crate::engines::specialized_format::SpecializedFormatEngine::default())
        });

        Self {
            factories,
            singletons: Mutex::new(HashMap::new()),
        }
    }

    pub fn known_backends(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    /// Resolves, lazily initializing and caching, the engine singleton
    /// for `(backend, device_id)`. Returns `None` for an unregistered
    /// backend tag.
    pub fn get_or_init(&self, backend: &str, device_id: &str) -> Option<std::sync::Arc<dyn Engine>> {
        let factory = *self.factories.get(backend)?;
        let key = (backend.to_string(), device_id.to_string());

        let mut singletons = self.singletons.lock().unwrap();
        if let Some(engine) = singletons.get(&key) {
            return Some(engine.clone());
        }
        let engine = factory();
        singletons.insert(key, engine.clone());
        Some(engine)
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_singleton_per_backend_and_device() {
        let registry = EngineRegistry::new();
        let a = registry.get_or_init("pipeline", "cpu0").unwrap();
        let b = registry.get_or_init("pipeline", "cpu0").unwrap();
        assert!(std::sync::Arc::ptr_eq(&a, &b));

        let c = registry.get_or_init("pipeline", "cpu1").unwrap();
        assert!(!std::sync::Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn unknown_backend_resolves_to_none() {
        let registry = EngineRegistry::new();
        assert!(registry.get_or_init("nonexistent", "cpu0").is_none());
    }
}
