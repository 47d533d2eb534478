//! External toolchain configuration and process execution
//!
//! The TeX compiler and the raster converter are plain subprocesses. They are
//! launched directly on POSIX and through `cmd /C` on Windows, always with the
//! per-call working directory as cwd and always under a timeout.
//!
//! A timeout or a dropped async run kills the whole process tree, not only the
//! direct child: on POSIX every stage runs in its own process group, on Windows
//! the tree is torn down with `taskkill /T`.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// An external program plus leading arguments placed before the stage arguments
///
/// Deserializes from either a bare program name (`"xelatex"`) or a table
/// (`{ program = "latexmk", args = ["-xelatex"] }`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ToolSpec")]
pub struct Tool {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ToolSpec {
    Program(String),
    Full {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl From<ToolSpec> for Tool {
    fn from(spec: ToolSpec) -> Self {
        match spec {
            ToolSpec::Program(program) => Tool::new(program),
            ToolSpec::Full { program, args } => Tool { program, args },
        }
    }
}

impl Tool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add leading arguments
    pub fn with_args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Build the command for one stage, run from `cwd`
    pub fn command(&self, stage_args: &[String], cwd: &Path) -> Command {
        let mut command = platform_command(&self.program);
        command
            .args(&self.args)
            .args(stage_args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}

#[cfg(windows)]
fn platform_command(program: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(program);
    command
}

#[cfg(unix)]
fn platform_command(program: &str) -> Command {
    use std::os::unix::process::CommandExt;

    // Leader of a fresh group, so the group id equals the child's pid
    let mut command = Command::new(program);
    command.process_group(0);
    command
}

#[cfg(not(any(unix, windows)))]
fn platform_command(program: &str) -> Command {
    Command::new(program)
}

/// Kills every process started by a stage when dropped, unless disarmed
///
/// Launchers (`cmd /C`, `sh -c`, `latexmk`) leave the real work to
/// grandchildren, so killing the direct child alone would leave them running.
struct ProcessTree {
    pid: Option<u32>,
}

impl ProcessTree {
    fn new(pid: Option<u32>) -> Self {
        Self { pid }
    }

    /// The stage exited on its own; leave its group alone
    fn disarm(mut self) {
        self.pid = None;
    }
}

impl Drop for ProcessTree {
    fn drop(&mut self) {
        if let Some(pid) = self.pid.take() {
            kill_tree(pid);
        }
    }
}

#[cfg(unix)]
fn kill_tree(pid: u32) {
    // A negative pid addresses the whole group
    let status = Command::new("sh")
        .arg("-c")
        .arg(format!("kill -s KILL -- -{}", pid))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if let Err(e) = status {
        tracing::warn!("Failed to kill process group {}: {}", pid, e);
    }
}

#[cfg(windows)]
fn kill_tree(pid: u32) {
    let pid = pid.to_string();
    let status = Command::new("taskkill")
        .args(["/T", "/F", "/PID", pid.as_str()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if let Err(e) = status {
        tracing::warn!("Failed to kill process tree {}: {}", pid, e);
    }
}

#[cfg(not(any(unix, windows)))]
fn kill_tree(_pid: u32) {}

/// Settings for the TeX compiler and raster converter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Root under which every compile gets its own unique directory
    pub working_dir: PathBuf,
    pub tex_compiler: Tool,
    pub converter: Tool,
    /// Rasterization density in DPI
    pub density: u32,
    /// Bits per channel
    pub depth: u32,
    pub quality: u32,
    /// Upper bound for each subprocess
    pub timeout_ms: u64,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("LaTeX"),
            tex_compiler: Tool::new("xelatex"),
            converter: Tool::new("convert"),
            density: 300,
            depth: 8,
            quality: 85,
            timeout_ms: 60_000,
        }
    }
}

impl ToolchainConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// `<file>.tex -interaction=batchmode`
    pub fn tex_args(&self, tex_file: &str) -> Vec<String> {
        vec![tex_file.to_string(), "-interaction=batchmode".to_string()]
    }

    /// `-density 300 -depth 8 -quality 85 <file>.pdf png32:<file>.png`
    pub fn raster_args(&self, pdf_file: &str, png_file: &str) -> Vec<String> {
        vec![
            "-density".to_string(),
            self.density.to_string(),
            "-depth".to_string(),
            self.depth.to_string(),
            "-quality".to_string(),
            self.quality.to_string(),
            pdf_file.to_string(),
            format!("png32:{}", png_file),
        ]
    }
}

/// Why a subprocess produced no exit status
#[derive(Debug)]
pub(crate) enum RunError {
    Launch(std::io::Error),
    TimedOut,
}

/// Run a command to completion, killing it once `timeout` elapses
///
/// stdout and stderr are drained on helper threads so a chatty child cannot
/// block on a full pipe while we poll for its exit.
pub(crate) fn run_blocking(mut command: Command, timeout: Duration) -> Result<Output, RunError> {
    let mut child = command.spawn().map_err(RunError::Launch)?;
    let tree = ProcessTree::new(Some(child.id()));

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait().map_err(RunError::Launch)? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                drop(tree);
                let _ = child.kill();
                let _ = child.wait();
                return Err(RunError::TimedOut);
            }
            None => std::thread::sleep(POLL_INTERVAL),
        }
    };
    tree.disarm();

    Ok(Output {
        status,
        stdout: stdout.map(collect).unwrap_or_default(),
        stderr: stderr.map(collect).unwrap_or_default(),
    })
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> std::thread::JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: std::thread::JoinHandle<Vec<u8>>) -> Vec<u8> {
    handle.join().unwrap_or_default()
}

/// Async variant of [`run_blocking`]; dropping the future kills the process tree
#[cfg(feature = "async")]
pub(crate) async fn run_async(command: Command, timeout: Duration) -> Result<Output, RunError> {
    let mut command = tokio::process::Command::from(command);
    command.kill_on_drop(true);

    // Declared before `tree` so the tree is torn down while the leader still exists
    let mut child = command.spawn().map_err(RunError::Launch)?;
    let tree = ProcessTree::new(child.id());
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let run = async {
        let (status, stdout, stderr) =
            tokio::try_join!(child.wait(), read_pipe(stdout), read_pipe(stderr))?;
        Ok::<_, std::io::Error>(Output {
            status,
            stdout,
            stderr,
        })
    };

    let outcome = tokio::time::timeout(timeout, run).await;
    match outcome {
        Ok(result) => {
            tree.disarm();
            result.map_err(RunError::Launch)
        }
        Err(_elapsed) => Err(RunError::TimedOut),
    }
}

#[cfg(feature = "async")]
async fn read_pipe<R>(pipe: Option<R>) -> std::io::Result<Vec<u8>>
where
    R: tokio::io::AsyncRead + Unpin,
{
    use tokio::io::AsyncReadExt;

    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}
