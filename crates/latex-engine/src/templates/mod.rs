//! Template management and the embedded default template

pub mod embedded;
pub mod memory;
pub mod registry;

pub use embedded::{default_template_body, PLACEHOLDER};
pub use memory::InMemoryTemplateStore;
pub use registry::{
    Resolution, Resolved, Template, TemplateId, TemplateResolver, TemplateStore,
};

pub use crate::compiler::errors::TemplateError;
