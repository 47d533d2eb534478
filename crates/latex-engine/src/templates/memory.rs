//! In-memory template store
//!
//! Used for one-off compiles from a template file and in tests.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use super::embedded::default_template_body;
use super::registry::{Template, TemplateId, TemplateStore};
use crate::compiler::errors::TemplateError;

/// A template store kept entirely in memory
#[derive(Debug, Default)]
pub struct InMemoryTemplateStore {
    templates: RwLock<Vec<Template>>,
    last_id: AtomicI64,
}

impl InMemoryTemplateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the embedded default template as version 1
    pub fn with_default() -> Self {
        let store = Self::new();
        store.insert(default_template_body(), "system");
        store
    }

    /// Create a store holding a single template body
    pub fn from_body(body: impl Into<String>, created_by: &str) -> Self {
        let store = Self::new();
        store.insert(body, created_by);
        store
    }

    /// Add a new template version created now
    pub fn insert(&self, body: impl Into<String>, created_by: &str) -> TemplateId {
        self.insert_at(body, created_by, Utc::now())
    }

    /// Add a new template version with an explicit creation time
    pub fn insert_at(
        &self,
        body: impl Into<String>,
        created_by: &str,
        created_at: DateTime<Utc>,
    ) -> TemplateId {
        let mut templates = self
            .templates
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let id = TemplateId(self.last_id.fetch_add(1, Ordering::SeqCst) + 1);
        templates.push(Template {
            id,
            body: body.into(),
            created_at,
            created_by: created_by.to_string(),
        });
        id
    }

    /// Remove a template version, returning whether it existed
    pub fn remove(&self, id: TemplateId) -> bool {
        let mut templates = self
            .templates
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = templates.len();
        templates.retain(|t| t.id != id);
        templates.len() != before
    }

    fn sorted(&self) -> Result<Vec<Template>, TemplateError> {
        let templates = self
            .templates
            .read()
            .map_err(|_| TemplateError::Backend("template store lock poisoned".into()))?;
        let mut sorted = templates.clone();
        sorted.sort_by_key(|t| (t.created_at, t.id));
        Ok(sorted)
    }
}

impl TemplateStore for InMemoryTemplateStore {
    fn available_versions(&self) -> Result<Vec<TemplateId>, TemplateError> {
        Ok(self.sorted()?.into_iter().map(|t| t.id).collect())
    }

    fn template(&self, id: TemplateId) -> Result<Option<Template>, TemplateError> {
        Ok(self.sorted()?.into_iter().find(|t| t.id == id))
    }

    fn latest(&self) -> Result<Option<Template>, TemplateError> {
        Ok(self.sorted()?.pop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::PLACEHOLDER;

    #[test]
    fn test_with_default_seeds_version_one() {
        let store = InMemoryTemplateStore::with_default();
        let latest = store.latest().unwrap().unwrap();
        assert_eq!(latest.id, TemplateId(1));
        assert!(latest.body.contains(PLACEHOLDER));
    }

    #[test]
    fn test_ids_are_never_reused_after_remove() {
        let store = InMemoryTemplateStore::new();
        let a = store.insert("a %__REPLACEMENT__TEXT", "u");
        let b = store.insert("b %__REPLACEMENT__TEXT", "u");
        assert!(store.remove(b));
        assert!(!store.remove(b));
        let c = store.insert("c %__REPLACEMENT__TEXT", "u");
        assert_eq!(a, TemplateId(1));
        assert_eq!(c, TemplateId(3));
        assert_eq!(store.available_versions().unwrap().len(), 2);
    }

    #[test]
    fn test_ties_on_creation_time_prefer_higher_id() {
        let store = InMemoryTemplateStore::new();
        let now = Utc::now();
        store.insert_at("first", "u", now);
        let second = store.insert_at("second", "u", now);
        assert_eq!(store.latest().unwrap().unwrap().id, second);
    }
}
