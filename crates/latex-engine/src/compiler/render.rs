//! Core rendering logic
//!
//! This module runs one fragment through the external toolchain:
//! substitute into the template, compile to PDF, rasterize to PNG, read the
//! image back. Each stage checks its own outcome and aborts the rest on
//! failure.

use std::process::Output;
use std::time::Instant;

use chrono::Utc;

use super::errors::{tex_errors, PipelineError};
use super::output::{tail, Artifact, WorkArea};
use super::{CompileOptions, CompiledImage};
use crate::templates::PLACEHOLDER;
use crate::toolchain::{run_blocking, RunError, ToolchainConfig};

/// Lines of process output kept in error messages
const OUTPUT_TAIL_LINES: usize = 20;

/// Fill a template with a fragment
///
/// The fragment is trimmed and then inserted verbatim at every occurrence of
/// the placeholder.
pub fn substitute(template_body: &str, fragment: &str) -> Result<String, PipelineError> {
    if !template_body.contains(PLACEHOLDER) {
        return Err(PipelineError::TemplateSubstitution {
            placeholder: PLACEHOLDER,
        });
    }
    Ok(template_body.replace(PLACEHOLDER, fragment.trim()))
}

/// The fragment-to-PNG pipeline
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    toolchain: ToolchainConfig,
}

impl Pipeline {
    pub fn new(toolchain: ToolchainConfig) -> Self {
        Self { toolchain }
    }

    pub fn toolchain(&self) -> &ToolchainConfig {
        &self.toolchain
    }

    /// Compile a fragment, blocking the calling thread until the image is ready
    pub fn compile_sync(
        &self,
        fragment: &str,
        template_body: &str,
        options: &CompileOptions,
    ) -> Result<CompiledImage, PipelineError> {
        let started = Instant::now();
        let area = self.prepare(fragment, template_body, options)?;
        let timeout = self.toolchain.timeout();

        let result = run_blocking(self.tex_command(&area), timeout);
        self.check_tex(&area, result)?;

        let result = run_blocking(self.raster_command(&area), timeout);
        self.check_raster(&area, result)?;

        self.collect(area, started)
    }

    /// Compile a fragment without blocking the runtime
    ///
    /// Dropping the returned future kills any running subprocess and removes
    /// the work area.
    #[cfg(feature = "async")]
    pub async fn compile(
        &self,
        fragment: &str,
        template_body: &str,
        options: &CompileOptions,
    ) -> Result<CompiledImage, PipelineError> {
        use crate::toolchain::run_async;

        let started = Instant::now();
        let area = self.prepare(fragment, template_body, options)?;
        let timeout = self.toolchain.timeout();

        let result = run_async(self.tex_command(&area), timeout).await;
        self.check_tex(&area, result)?;

        let result = run_async(self.raster_command(&area), timeout).await;
        self.check_raster(&area, result)?;

        self.collect(area, started)
    }

    fn prepare(
        &self,
        fragment: &str,
        template_body: &str,
        options: &CompileOptions,
    ) -> Result<WorkArea, PipelineError> {
        let source = substitute(template_body, fragment)?;
        let area = WorkArea::create(
            &self.toolchain.working_dir,
            &options.temp_fname,
            options.keep_intermediate,
        )?;
        area.write_source(&source)?;
        Ok(area)
    }

    fn tex_command(&self, area: &WorkArea) -> std::process::Command {
        let args = self.toolchain.tex_args(&area.file_name(Artifact::Tex));
        tracing::debug!(
            "Running {} {} in {}",
            self.toolchain.tex_compiler.program,
            args.join(" "),
            area.dir().display()
        );
        self.toolchain.tex_compiler.command(&args, area.dir())
    }

    fn raster_command(&self, area: &WorkArea) -> std::process::Command {
        let args = self.toolchain.raster_args(
            &area.file_name(Artifact::Pdf),
            &area.file_name(Artifact::Png),
        );
        tracing::debug!(
            "Running {} {} in {}",
            self.toolchain.converter.program,
            args.join(" "),
            area.dir().display()
        );
        self.toolchain.converter.command(&args, area.dir())
    }

    fn check_tex(
        &self,
        area: &WorkArea,
        result: Result<Output, RunError>,
    ) -> Result<(), PipelineError> {
        let program = &self.toolchain.tex_compiler.program;

        let output = match result {
            Ok(output) => output,
            Err(RunError::Launch(e)) => {
                return Err(PipelineError::Compile {
                    message: format!("could not launch {}: {}", program, e),
                    log: String::new(),
                });
            }
            Err(RunError::TimedOut) => {
                return Err(PipelineError::Compile {
                    message: format!(
                        "{} timed out after {}ms",
                        program, self.toolchain.timeout_ms
                    ),
                    log: area.log_tail().unwrap_or_default(),
                });
            }
        };

        if !output.status.success() {
            let log = area.log_tail().unwrap_or_else(|| output_tail(&output));
            let message = match tex_errors(&log).into_iter().next() {
                Some(first) => format!("{} exited with {}: {}", program, output.status, first),
                None => format!("{} exited with {}", program, output.status),
            };
            return Err(PipelineError::Compile { message, log });
        }

        if !area.path(Artifact::Pdf).is_file() {
            return Err(PipelineError::Compile {
                message: format!("{} produced no PDF", program),
                log: area.log_tail().unwrap_or_else(|| output_tail(&output)),
            });
        }

        Ok(())
    }

    fn check_raster(
        &self,
        area: &WorkArea,
        result: Result<Output, RunError>,
    ) -> Result<(), PipelineError> {
        let program = &self.toolchain.converter.program;

        let output = match result {
            Ok(output) => output,
            Err(RunError::Launch(e)) => {
                return Err(PipelineError::Rasterize {
                    message: format!("could not launch {}: {}", program, e),
                    output: String::new(),
                });
            }
            Err(RunError::TimedOut) => {
                return Err(PipelineError::Rasterize {
                    message: format!(
                        "{} timed out after {}ms",
                        program, self.toolchain.timeout_ms
                    ),
                    output: String::new(),
                });
            }
        };

        if !output.status.success() {
            return Err(PipelineError::Rasterize {
                message: format!("{} exited with {}", program, output.status),
                output: output_tail(&output),
            });
        }

        if !area.path(Artifact::Png).is_file() {
            return Err(PipelineError::Rasterize {
                message: format!("{} produced no PNG", program),
                output: output_tail(&output),
            });
        }

        Ok(())
    }

    fn collect(&self, area: WorkArea, started: Instant) -> Result<CompiledImage, PipelineError> {
        let png = area.read_png()?;
        let kept_dir = area.finish();

        tracing::info!(
            "Compiled fragment to {} byte PNG in {:?}",
            png.len(),
            started.elapsed()
        );

        Ok(CompiledImage {
            png,
            compiled_at: Utc::now(),
            kept_dir,
        })
    }
}

fn output_tail(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&stderr);
    }
    tail(&text, OUTPUT_TAIL_LINES)
}
