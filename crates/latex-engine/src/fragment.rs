//! A LaTeX fragment kept consistent with its compiled image
//!
//! A [`CompiledFragment`] is either `Clean` (the image was produced from the
//! current source and template) or `Dirty` (no trustworthy image exists).
//! Edits go through `Compiling` and either land in `Clean` or leave the
//! fragment exactly as it was.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compiler::{PipelineError, Rendered};
use crate::templates::{Resolution, TemplateId};

/// Produces images for fragments
pub trait FragmentCompiler {
    /// Compile `source` with the given template (`None` means latest)
    fn compile(&self, source: &str, template: Option<TemplateId>)
        -> Result<Rendered, PipelineError>;
}

impl<C: FragmentCompiler + ?Sized> FragmentCompiler for &C {
    fn compile(
        &self,
        source: &str,
        template: Option<TemplateId>,
    ) -> Result<Rendered, PipelineError> {
        (**self).compile(source, template)
    }
}

impl<C: FragmentCompiler + ?Sized> FragmentCompiler for Arc<C> {
    fn compile(
        &self,
        source: &str,
        template: Option<TemplateId>,
    ) -> Result<Rendered, PipelineError> {
        (**self).compile(source, template)
    }
}

#[derive(Error, Debug)]
pub enum FragmentError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("An image was supplied without the template id that produced it")]
    ImageWithoutTemplate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentState {
    Clean,
    Dirty,
    Compiling,
}

/// A combined edit applied by [`CompiledFragment::update`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentUpdate {
    pub latex: Option<String>,
    pub template_id: Option<TemplateId>,
    /// A precompiled image; requires `template_id`
    pub image: Option<Vec<u8>>,
    /// Whether `image` must be recompiled rather than trusted
    pub image_is_dirty: bool,
}

impl FragmentUpdate {
    pub fn is_empty(&self) -> bool {
        self.latex.is_none() && self.template_id.is_none() && self.image.is_none()
    }
}

/// Fragment source, template id and image, kept in agreement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFragment {
    source: String,
    template_id: Option<TemplateId>,
    image: Option<Vec<u8>>,
    compiled_at: Option<DateTime<Utc>>,
    resolution: Option<Resolution>,
    state: FragmentState,
}

impl CompiledFragment {
    /// Compile a new fragment
    pub fn compile<C: FragmentCompiler + ?Sized>(
        source: impl Into<String>,
        template: Option<TemplateId>,
        compiler: &C,
    ) -> Result<Self, FragmentError> {
        let mut fragment = Self::pending(source.into(), template);
        fragment.recompile(fragment.source.clone(), template, compiler)?;
        Ok(fragment)
    }

    /// Build a fragment from a precompiled image
    ///
    /// A clean image is trusted as-is. A dirty one is discarded and the
    /// fragment is compiled.
    pub fn with_image<C: FragmentCompiler + ?Sized>(
        source: impl Into<String>,
        template_id: TemplateId,
        image: Vec<u8>,
        compiled_at: DateTime<Utc>,
        dirty: bool,
        compiler: &C,
    ) -> Result<Self, FragmentError> {
        if dirty {
            return Self::compile(source, Some(template_id), compiler);
        }

        Ok(Self {
            source: source.into(),
            template_id: Some(template_id),
            image: Some(image),
            compiled_at: Some(compiled_at),
            resolution: Some(Resolution::Exact),
            state: FragmentState::Clean,
        })
    }

    /// Rebuild a fragment from stored columns without compiling
    ///
    /// Dirty rows, and rows without an image, load as `Dirty` and hold no
    /// image until [`refresh`](Self::refresh) is called.
    pub fn stored(
        source: impl Into<String>,
        template_id: Option<TemplateId>,
        image: Option<Vec<u8>>,
        compiled_at: Option<DateTime<Utc>>,
        dirty: bool,
    ) -> Result<Self, FragmentError> {
        let source = source.into();

        match (image, template_id) {
            (Some(image), Some(id)) if !dirty => Ok(Self {
                source,
                template_id: Some(id),
                image: Some(image),
                compiled_at,
                resolution: None,
                state: FragmentState::Clean,
            }),
            (Some(_), None) if !dirty => Err(FragmentError::ImageWithoutTemplate),
            _ => Ok(Self::pending(source, template_id)),
        }
    }

    /// A dirty fragment that has not been compiled yet
    pub fn pending(source: impl Into<String>, template_id: Option<TemplateId>) -> Self {
        Self {
            source: source.into(),
            template_id,
            image: None,
            compiled_at: None,
            resolution: None,
            state: FragmentState::Dirty,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn template_id(&self) -> Option<TemplateId> {
        self.template_id
    }

    /// PNG bytes, only when the fragment is clean
    pub fn image(&self) -> Option<&[u8]> {
        match self.state {
            FragmentState::Clean => self.image.as_deref(),
            _ => None,
        }
    }

    pub fn compiled_at(&self) -> Option<DateTime<Utc>> {
        self.compiled_at
    }

    /// How the template of the last compile was resolved
    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    pub fn state(&self) -> FragmentState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.state != FragmentState::Clean
    }

    /// Compile a dirty fragment; a clean one is left alone
    pub fn refresh<C: FragmentCompiler + ?Sized>(
        &mut self,
        compiler: &C,
    ) -> Result<(), FragmentError> {
        if self.state == FragmentState::Clean {
            return Ok(());
        }
        self.recompile(self.source.clone(), self.template_id, compiler)
    }

    /// Replace the source and recompile with the current template
    pub fn set_source<C: FragmentCompiler + ?Sized>(
        &mut self,
        source: impl Into<String>,
        compiler: &C,
    ) -> Result<(), FragmentError> {
        self.recompile(source.into(), self.template_id, compiler)
    }

    /// Switch template (`None` means latest) and recompile
    pub fn set_template<C: FragmentCompiler + ?Sized>(
        &mut self,
        template: Option<TemplateId>,
        compiler: &C,
    ) -> Result<(), FragmentError> {
        self.recompile(self.source.clone(), template, compiler)
    }

    /// Apply a combined edit
    ///
    /// A clean image supplied together with its template id is trusted.
    /// Anything else that changes the fragment recompiles it. On error the
    /// fragment is unchanged.
    pub fn update<C: FragmentCompiler + ?Sized>(
        &mut self,
        update: FragmentUpdate,
        compiler: &C,
    ) -> Result<(), FragmentError> {
        if update.is_empty() && self.state == FragmentState::Clean {
            return Ok(());
        }

        let FragmentUpdate {
            latex,
            template_id,
            image,
            image_is_dirty,
        } = update;
        let source = latex.unwrap_or_else(|| self.source.clone());

        match (image, template_id) {
            (Some(_), None) => Err(FragmentError::ImageWithoutTemplate),
            (Some(image), Some(id)) if !image_is_dirty => {
                self.source = source;
                self.template_id = Some(id);
                self.image = Some(image);
                self.compiled_at = Some(Utc::now());
                self.resolution = Some(Resolution::Exact);
                self.state = FragmentState::Clean;
                Ok(())
            }
            (_, template_id) => {
                let template = template_id.or(self.template_id);
                self.recompile(source, template, compiler)
            }
        }
    }

    /// Drop the image; the fragment must be refreshed before it has one again
    pub fn mark_dirty(&mut self) {
        self.image = None;
        self.compiled_at = None;
        self.state = FragmentState::Dirty;
    }

    fn recompile<C: FragmentCompiler + ?Sized>(
        &mut self,
        source: String,
        template: Option<TemplateId>,
        compiler: &C,
    ) -> Result<(), FragmentError> {
        let previous = self.state;
        self.state = FragmentState::Compiling;

        match compiler.compile(&source, template) {
            Ok(rendered) => {
                self.source = source;
                self.template_id = Some(rendered.template_id);
                self.image = Some(rendered.image.png);
                self.compiled_at = Some(rendered.image.compiled_at);
                self.resolution = Some(rendered.resolution);
                self.state = FragmentState::Clean;
                Ok(())
            }
            Err(e) => {
                tracing::debug!("Fragment compile failed, keeping previous state: {}", e);
                self.state = previous;
                Err(e.into())
            }
        }
    }
}
