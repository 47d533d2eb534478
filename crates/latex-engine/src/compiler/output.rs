//! Intermediate artifacts and the per-compile work area

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::PipelineError;

/// Lines of the TeX log kept in compile errors
const LOG_TAIL_LINES: usize = 40;

/// Files produced by one compile, all sharing the same base name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Artifact {
    Tex,
    Aux,
    Log,
    Pdf,
    Png,
}

impl Artifact {
    pub const ALL: [Artifact; 5] = [
        Artifact::Tex,
        Artifact::Aux,
        Artifact::Log,
        Artifact::Pdf,
        Artifact::Png,
    ];

    /// Get the file extension for this artifact
    pub fn extension(&self) -> &'static str {
        match self {
            Artifact::Tex => "tex",
            Artifact::Aux => "aux",
            Artifact::Log => "log",
            Artifact::Pdf => "pdf",
            Artifact::Png => "png",
        }
    }

    pub fn file_name(&self, stem: &str) -> String {
        format!("{}.{}", stem, self.extension())
    }
}

impl std::fmt::Display for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl std::str::FromStr for Artifact {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_lowercase().as_str() {
            "tex" => Ok(Artifact::Tex),
            "aux" => Ok(Artifact::Aux),
            "log" => Ok(Artifact::Log),
            "pdf" => Ok(Artifact::Pdf),
            "png" => Ok(Artifact::Png),
            other => Err(format!("Unknown artifact: {}", other)),
        }
    }
}

/// A unique directory holding the artifacts of a single compile
///
/// Concurrent compiles never share a directory. Unless the area is kept,
/// dropping it removes the artifacts and the directory, on success and
/// failure alike.
#[derive(Debug)]
pub struct WorkArea {
    dir: PathBuf,
    stem: String,
    keep: bool,
}

impl WorkArea {
    /// Create `<root>/<stem>-<uuid>/`
    pub fn create(root: &Path, stem: &str, keep: bool) -> Result<Self, PipelineError> {
        if stem.is_empty() || stem.contains(['/', '\\']) || stem == "." || stem == ".." {
            return Err(PipelineError::Workspace {
                path: root.join(stem),
                source: std::io::Error::new(
                    ErrorKind::InvalidInput,
                    format!("invalid base file name '{}'", stem),
                ),
            });
        }

        let dir = root.join(format!("{}-{}", stem, Uuid::new_v4().simple()));
        fs::create_dir_all(&dir).map_err(|source| PipelineError::Workspace {
            path: dir.clone(),
            source,
        })?;

        tracing::debug!("Created work area {}", dir.display());

        Ok(Self {
            dir,
            stem: stem.to_string(),
            keep,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name of an artifact, relative to the work area
    pub fn file_name(&self, artifact: Artifact) -> String {
        artifact.file_name(&self.stem)
    }

    pub fn path(&self, artifact: Artifact) -> PathBuf {
        self.dir.join(self.file_name(artifact))
    }

    /// Write the filled-in TeX source
    pub fn write_source(&self, source: &str) -> Result<(), PipelineError> {
        let path = self.path(Artifact::Tex);
        fs::write(&path, source).map_err(|source| PipelineError::Workspace { path, source })
    }

    /// Read the final image back into memory
    pub fn read_png(&self) -> Result<Vec<u8>, PipelineError> {
        let path = self.path(Artifact::Png);
        let bytes = fs::read(&path).map_err(|e| PipelineError::ArtifactRead {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        if bytes.is_empty() {
            return Err(PipelineError::ArtifactRead {
                path,
                reason: "file is empty".to_string(),
            });
        }
        if !super::raster::is_png(&bytes) {
            return Err(PipelineError::ArtifactRead {
                path,
                reason: "missing PNG signature".to_string(),
            });
        }

        Ok(bytes)
    }

    /// Last lines of the TeX log, if one was written
    pub fn log_tail(&self) -> Option<String> {
        let bytes = fs::read(self.path(Artifact::Log)).ok()?;
        Some(tail(&String::from_utf8_lossy(&bytes), LOG_TAIL_LINES))
    }

    /// Finish the compile, returning the directory if it is being kept
    pub fn finish(self) -> Option<PathBuf> {
        self.keep.then(|| self.dir.clone())
    }

    fn cleanup(&self) {
        for artifact in Artifact::ALL {
            let path = self.path(artifact);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
            }
        }

        // The toolchain may leave extra files behind; the directory is ours alone
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove {}: {}", self.dir.display(), e),
        }
    }
}

impl Drop for WorkArea {
    fn drop(&mut self) {
        if self.keep {
            tracing::debug!("Keeping intermediate files in {}", self.dir.display());
        } else {
            self.cleanup();
        }
    }
}

/// Last `lines` lines of `text`
pub(crate) fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_artifact_file_names() {
        let names: Vec<String> = Artifact::ALL.iter().map(|a| a.file_name("eq_db")).collect();
        assert_eq!(
            names,
            vec!["eq_db.tex", "eq_db.aux", "eq_db.log", "eq_db.pdf", "eq_db.png"]
        );
    }

    #[test]
    fn test_artifact_from_str() {
        assert_eq!(".PNG".parse::<Artifact>().unwrap(), Artifact::Png);
        assert!("svg".parse::<Artifact>().is_err());
    }

    #[test]
    fn test_work_areas_are_unique() {
        let root = tempfile::tempdir().unwrap();
        let a = WorkArea::create(root.path(), "eq_db", false).unwrap();
        let b = WorkArea::create(root.path(), "eq_db", false).unwrap();
        assert_ne!(a.dir(), b.dir());
        assert_eq!(a.path(Artifact::Tex).file_name().unwrap(), "eq_db.tex");
    }

    #[test]
    fn test_drop_removes_artifacts_and_directory() {
        let root = tempfile::tempdir().unwrap();
        let area = WorkArea::create(root.path(), "eq_db", false).unwrap();
        let dir = area.dir().to_path_buf();
        area.write_source("\\[x\\]").unwrap();
        fs::write(area.path(Artifact::Log), "log").unwrap();
        drop(area);

        assert!(!dir.exists());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_kept_area_survives_finish() {
        let root = tempfile::tempdir().unwrap();
        let area = WorkArea::create(root.path(), "eq_db", true).unwrap();
        area.write_source("\\[x\\]").unwrap();
        let tex = area.path(Artifact::Tex);

        let kept = area.finish().unwrap();
        assert!(kept.exists());
        assert!(tex.exists());
    }

    #[test]
    fn test_rejects_path_like_stem() {
        let root = tempfile::tempdir().unwrap();
        assert!(matches!(
            WorkArea::create(root.path(), "../escape", false),
            Err(PipelineError::Workspace { .. })
        ));
        assert!(WorkArea::create(root.path(), "", false).is_err());
    }

    #[test]
    fn test_read_png_rejects_non_png() {
        let root = tempfile::tempdir().unwrap();
        let area = WorkArea::create(root.path(), "eq_db", false).unwrap();

        assert!(matches!(area.read_png(), Err(PipelineError::ArtifactRead { .. })));

        fs::write(area.path(Artifact::Png), b"").unwrap();
        let err = area.read_png().unwrap_err();
        assert!(err.to_string().contains("empty"));

        fs::write(area.path(Artifact::Png), b"%PDF-1.5").unwrap();
        let err = area.read_png().unwrap_err();
        assert!(err.to_string().contains("signature"));
    }

    #[test]
    fn test_tail() {
        assert_eq!(tail("a\nb\nc\nd", 2), "c\nd");
        assert_eq!(tail("a", 5), "a");
    }
}
