//! `eqdb compile`

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::Context;
use latex_engine::compiler::png_dimensions;
use latex_engine::{
    CompileOptions, InMemoryTemplateStore, LatexCompiler, PipelineError, Rendered, Resolution,
    TemplateId, TemplateStore,
};
use serde::Serialize;

use super::{warn_on_fallback, Session};
use crate::cli::CompileArgs;

/// What `eqdb compile` reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileSummary {
    pub template_id: TemplateId,
    pub resolution: Resolution,
    pub bytes: usize,
    pub width: u32,
    pub height: u32,
    pub output: Option<PathBuf>,
    pub kept_dir: Option<PathBuf>,
}

pub async fn run(session: &Session, args: CompileArgs) -> anyhow::Result<()> {
    let options = CompileOptions {
        temp_fname: args.temp_fname.clone(),
        keep_intermediate: args.keep,
    };

    let rendered = match &args.template_file {
        Some(path) => {
            let body = fs::read_to_string(path)
                .with_context(|| format!("Failed to read template file {}", path.display()))?;
            let store = InMemoryTemplateStore::from_body(body, &session.user()?);
            let compiler = LatexCompiler::new(store, session.toolchain().clone()).with_options(options);
            render(&compiler, &args).await?
        }
        None => {
            let db = session.open_database()?;
            let compiler = LatexCompiler::new(&db, session.toolchain().clone()).with_options(options);
            render(&compiler, &args).await?
        }
    };

    warn_on_fallback(Some(rendered.resolution), Some(rendered.template_id));

    let png = &rendered.image.png;
    let (width, height) = png_dimensions(png).context("Compiled image is not a readable PNG")?;

    let output = match (&args.output, args.show) {
        (Some(path), _) => Some(path.clone()),
        (None, true) => Some(std::env::temp_dir().join(format!("{}.png", args.temp_fname))),
        (None, false) => None,
    };
    if let Some(path) = &output {
        fs::write(path, png).with_context(|| format!("Failed to write {}", path.display()))?;
    }

    let summary = CompileSummary {
        template_id: rendered.template_id,
        resolution: rendered.resolution,
        bytes: png.len(),
        width,
        height,
        output: output.clone(),
        kept_dir: rendered.image.kept_dir.clone(),
    };
    session.printer.emit(&summary, || summary_text(&summary))?;

    if args.show {
        if let Some(path) = &output {
            open_viewer(path)?;
        }
    }
    Ok(())
}

/// Render, cancelling on Ctrl-C
async fn render<S: TemplateStore>(
    compiler: &LatexCompiler<S>,
    args: &CompileArgs,
) -> anyhow::Result<Rendered> {
    tokio::select! {
        result = compiler.render(&args.pattern, args.version) => {
            Ok(result.context("Compilation failed")?)
        }
        _ = tokio::signal::ctrl_c() => {
            Err(PipelineError::Cancelled).context("Interrupted")
        }
    }
}

fn summary_text(summary: &CompileSummary) -> String {
    let mut lines = vec![format!(
        "{}x{} px, {} bytes, template version {}",
        summary.width, summary.height, summary.bytes, summary.template_id
    )];
    if let Some(path) = &summary.output {
        lines.push(format!("Wrote {}", path.display()));
    }
    if let Some(dir) = &summary.kept_dir {
        lines.push(format!("Intermediate files kept in {}", dir.display()));
    }
    lines.join("\n")
}

/// Open an image with the desktop's default viewer, without waiting for it
fn open_viewer(path: &Path) -> anyhow::Result<()> {
    let mut command = viewer_command();
    command
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("Failed to open {} in an image viewer", path.display()))?;
    Ok(())
}

#[cfg(target_os = "macos")]
fn viewer_command() -> Command {
    Command::new("open")
}

#[cfg(windows)]
fn viewer_command() -> Command {
    let mut command = Command::new("cmd");
    command.args(["/C", "start", ""]);
    command
}

#[cfg(all(unix, not(target_os = "macos")))]
fn viewer_command() -> Command {
    Command::new("xdg-open")
}
