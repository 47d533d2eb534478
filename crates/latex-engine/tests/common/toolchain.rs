//! Fake TeX toolchain for integration tests
//!
//! The scripts are run as `sh <script> ...` so they need no exec bit.
//! The fake compiler fails on unbalanced braces, sleeps when the source
//! contains `SLOW`, leaves a background job behind when it contains `LINGER`,
//! and otherwise copies the source to the PDF. The fake
//! converter writes the PNG signature followed by the PDF bytes, so every
//! image carries the fragment it was made from.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use latex_engine::{Tool, ToolchainConfig};
use tempfile::TempDir;

pub const TEST_TEMPLATE: &str = "BEGIN %__REPLACEMENT__TEXT END\n";

const FAKE_TEX: &str = r#"tex="$1"
base="${tex%.tex}"
case "$(cat "$tex")" in
  *SLOW*) sleep 5 ;;
  *LINGER*) (sleep 1; touch "$(dirname "$0")/survived") & wait ;;
esac
echo "This is FakeTeX, Version 3.14" > "$base.log"
: > "$base.aux"
open=$(tr -cd '{' < "$tex" | wc -c)
close=$(tr -cd '}' < "$tex" | wc -c)
if [ $open -ne $close ]; then
  echo "! Missing } inserted." >> "$base.log"
  echo "l.1 $(head -n 1 "$tex")" >> "$base.log"
  exit 1
fi
cp "$tex" "$base.pdf"
echo "Output written on $base.pdf (1 page)." >> "$base.log"
"#;

const FAKE_CONVERT: &str = r#"in="$7"
out="${8#png32:}"
printf '\211PNG\r\n\032\n' > "$out"
cat "$in" >> "$out"
"#;

const FAILING_CONVERT: &str = r#"echo "convert: no images defined" >&2
exit 2
"#;

const NON_PNG_CONVERT: &str = r#"out="${8#png32:}"
cp "$7" "$out"
"#;

/// Scratch directories plus a toolchain pointing at the fake scripts
pub struct FakeToolchain {
    pub scripts: TempDir,
    pub work: TempDir,
    pub config: ToolchainConfig,
}

impl FakeToolchain {
    pub fn new() -> Self {
        Self::with_converter(FAKE_CONVERT)
    }

    pub fn failing_converter() -> Self {
        Self::with_converter(FAILING_CONVERT)
    }

    pub fn non_png_converter() -> Self {
        Self::with_converter(NON_PNG_CONVERT)
    }

    fn with_converter(convert: &str) -> Self {
        let scripts = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();

        let tex = write_script(scripts.path(), "fake_tex.sh", FAKE_TEX);
        let converter = write_script(scripts.path(), "fake_convert.sh", convert);

        let config = ToolchainConfig {
            working_dir: work.path().to_path_buf(),
            tex_compiler: Tool::new("sh").with_args([tex.display().to_string()]),
            converter: Tool::new("sh").with_args([converter.display().to_string()]),
            timeout_ms: 10_000,
            ..Default::default()
        };

        Self {
            scripts,
            work,
            config,
        }
    }

    /// Whether a `LINGER` compile's background job ran to completion
    pub fn lingering_job_survived(&self) -> bool {
        self.scripts.path().join("survived").exists()
    }

    /// Entries left in the working directory
    pub fn leftovers(&self) -> Vec<PathBuf> {
        fs::read_dir(self.work.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

/// The image the fake toolchain produces for `fragment` in [`TEST_TEMPLATE`]
pub fn expected_png(fragment: &str) -> Vec<u8> {
    let mut png = latex_engine::compiler::PNG_SIGNATURE.to_vec();
    png.extend_from_slice(TEST_TEMPLATE.replace("%__REPLACEMENT__TEXT", fragment.trim()).as_bytes());
    png
}
