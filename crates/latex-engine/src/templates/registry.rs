//! Template registry and version resolution

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::embedded::PLACEHOLDER;
use crate::compiler::errors::TemplateError;

/// Identifier of a stored template version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(pub i64);

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TemplateId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(TemplateId)
            .map_err(|_| format!("Invalid template id: {}", s))
    }
}

/// A LaTeX document skeleton with one substitution point
///
/// Templates are immutable. A new version is a new row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    /// The skeleton, containing [`PLACEHOLDER`]
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

impl Template {
    /// Whether the body contains the substitution token
    pub fn has_placeholder(&self) -> bool {
        self.body.contains(PLACEHOLDER)
    }
}

/// Read access to stored templates
pub trait TemplateStore {
    /// Template ids ordered by creation time, oldest first
    fn available_versions(&self) -> Result<Vec<TemplateId>, TemplateError>;

    /// Fetch one template, `None` if no such version exists
    fn template(&self, id: TemplateId) -> Result<Option<Template>, TemplateError>;

    /// The template with the greatest creation time
    fn latest(&self) -> Result<Option<Template>, TemplateError>;
}

impl<S: TemplateStore + ?Sized> TemplateStore for Arc<S> {
    fn available_versions(&self) -> Result<Vec<TemplateId>, TemplateError> {
        (**self).available_versions()
    }

    fn template(&self, id: TemplateId) -> Result<Option<Template>, TemplateError> {
        (**self).template(id)
    }

    fn latest(&self) -> Result<Option<Template>, TemplateError> {
        (**self).latest()
    }
}

impl<S: TemplateStore + ?Sized> TemplateStore for &S {
    fn available_versions(&self) -> Result<Vec<TemplateId>, TemplateError> {
        (**self).available_versions()
    }

    fn template(&self, id: TemplateId) -> Result<Option<Template>, TemplateError> {
        (**self).template(id)
    }

    fn latest(&self) -> Result<Option<Template>, TemplateError> {
        (**self).latest()
    }
}

/// How a template request was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    /// No version was requested, the latest was used
    Latest,
    /// The requested version was found
    Exact,
    /// The requested version does not exist, the latest was used instead
    FellBackToLatest { requested: TemplateId },
}

impl Resolution {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Resolution::FellBackToLatest { .. })
    }
}

/// A template together with how it was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub template: Template,
    pub resolution: Resolution,
}

/// Resolves template versions against a store
#[derive(Debug, Clone)]
pub struct TemplateResolver<S> {
    store: S,
}

impl<S: TemplateStore> TemplateResolver<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Template ids ordered by creation time, oldest first
    pub fn available_versions(&self) -> Result<Vec<TemplateId>, TemplateError> {
        self.store.available_versions()
    }

    /// Resolve a template version
    ///
    /// `None` yields the latest template. A version that does not exist also
    /// yields the latest, tagged [`Resolution::FellBackToLatest`].
    pub fn resolve(&self, version: Option<TemplateId>) -> Result<Resolved, TemplateError> {
        let Some(requested) = version else {
            return Ok(Resolved {
                template: self.latest()?,
                resolution: Resolution::Latest,
            });
        };

        match self.store.template(requested)? {
            Some(template) => Ok(Resolved {
                template,
                resolution: Resolution::Exact,
            }),
            None => {
                let template = self.latest()?;
                tracing::warn!(
                    "Template {} not found, falling back to latest template {}",
                    requested,
                    template.id
                );
                Ok(Resolved {
                    template,
                    resolution: Resolution::FellBackToLatest { requested },
                })
            }
        }
    }

    fn latest(&self) -> Result<Template, TemplateError> {
        self.store.latest()?.ok_or(TemplateError::NoTemplates)
    }
}
