//! Fragment compilation through the external TeX toolchain

pub mod errors;
pub mod output;
pub mod raster;
pub mod render;

pub use errors::{PipelineError, TemplateError};
pub use output::{Artifact, WorkArea};
pub use raster::{is_png, png_dimensions, PNG_SIGNATURE};
pub use render::{substitute, Pipeline};

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fragment::FragmentCompiler;
use crate::templates::{Resolution, TemplateId, TemplateResolver, TemplateStore};
use crate::toolchain::ToolchainConfig;

/// Per-call compile settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Base name of the intermediate files
    pub temp_fname: String,
    /// Keep the work area and its intermediate files
    pub keep_intermediate: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            temp_fname: "eq_db".to_string(),
            keep_intermediate: false,
        }
    }
}

/// PNG bytes produced by the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledImage {
    pub png: Vec<u8>,
    pub compiled_at: DateTime<Utc>,
    /// Work area left on disk when intermediate files were kept
    pub kept_dir: Option<PathBuf>,
}

/// A compiled image plus the template that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub image: CompiledImage,
    pub template_id: TemplateId,
    pub resolution: Resolution,
}

/// Resolves templates and runs the pipeline
#[derive(Debug)]
pub struct LatexCompiler<S> {
    resolver: TemplateResolver<S>,
    pipeline: Pipeline,
    options: CompileOptions,
}

impl<S: TemplateStore> LatexCompiler<S> {
    pub fn new(store: S, toolchain: ToolchainConfig) -> Self {
        Self {
            resolver: TemplateResolver::new(store),
            pipeline: Pipeline::new(toolchain),
            options: CompileOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn resolver(&self) -> &TemplateResolver<S> {
        &self.resolver
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Render a fragment on the calling thread
    pub fn render_sync(
        &self,
        fragment: &str,
        template: Option<TemplateId>,
    ) -> Result<Rendered, PipelineError> {
        let resolved = self.resolver.resolve(template)?;
        let image = self
            .pipeline
            .compile_sync(fragment, &resolved.template.body, &self.options)?;

        Ok(Rendered {
            image,
            template_id: resolved.template.id,
            resolution: resolved.resolution,
        })
    }

    /// Render a fragment; dropping the future cancels the compile
    #[cfg(feature = "async")]
    pub async fn render(
        &self,
        fragment: &str,
        template: Option<TemplateId>,
    ) -> Result<Rendered, PipelineError> {
        let resolved = self.resolver.resolve(template)?;
        let image = self
            .pipeline
            .compile(fragment, &resolved.template.body, &self.options)
            .await?;

        Ok(Rendered {
            image,
            template_id: resolved.template.id,
            resolution: resolved.resolution,
        })
    }
}

impl<S: TemplateStore> FragmentCompiler for LatexCompiler<S> {
    fn compile(
        &self,
        source: &str,
        template: Option<TemplateId>,
    ) -> Result<Rendered, PipelineError> {
        self.render_sync(source, template)
    }
}
