//! LRU cache of compiled templates.

use super::{Template, TemplateSettings};
use crate::error::{Result, TemplateError};
use crate::types::Value;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use tracing::trace;

/// Compiles each (scope, source) pair once and keeps the most recently
/// used templates.
pub struct TemplateCache {
    settings: TemplateSettings,

    /// Keyed by scope name, then source.
    templates: Mutex<LruCache<(String, String), Template>>,
}

impl TemplateCache {
    /// Create a cache holding up to `capacity` templates (at least one).
    pub fn new(capacity: usize) -> Self {
        Self::with_settings(capacity, TemplateSettings::default())
    }

    pub fn with_settings(capacity: usize, settings: TemplateSettings) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            settings,
            templates: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn settings(&self) -> &TemplateSettings {
        &self.settings
    }

    /// Fetch the template for `source` under the default scope, compiling it
    /// on first use.
    pub fn get_or_compile(&self, source: &str) -> std::result::Result<Template, TemplateError> {
        self.lookup(source, &self.settings.scope)
    }

    pub fn get_or_compile_scoped(
        &self,
        source: &str,
        scope: &str,
    ) -> std::result::Result<Template, TemplateError> {
        self.lookup(source, scope)
    }

    /// Compile (or reuse) and render in one step.
    pub fn render(&self, source: &str, data: &Value) -> Result<String> {
        let template = self.get_or_compile(source)?;
        Ok(template.render(data)?)
    }

    fn lookup(&self, source: &str, scope: &str) -> std::result::Result<Template, TemplateError> {
        let key = (scope.to_string(), source.to_string());
        if let Some(template) = self.templates.lock().get(&key).cloned() {
            trace!(len = source.len(), scope, "template cache hit");
            return Ok(template);
        }

        trace!(len = source.len(), scope, "template cache miss");
        let settings = self.settings.clone().with_scope(scope);
        let template = Template::compile_with_settings(source, &settings)?;
        self.templates.lock().put(key, template.clone());
        Ok(template)
    }

    pub fn len(&self) -> usize {
        self.templates.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.lock().is_empty()
    }

    pub fn clear(&self) {
        self.templates.lock().clear();
    }
}
