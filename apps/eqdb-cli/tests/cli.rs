//! End-to-end tests of the `eqdb` commands against a fake TeX toolchain
//!
//! Run with: cargo test -p eqdb-cli --test cli

#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use eqdb_cli::config::DatabaseConfig;
use eqdb_cli::{execute, Cli, Config, Session};
use equation_store::{Database, Link, MathKind};
use latex_engine::compiler::{is_png, png_dimensions};
use latex_engine::{TemplateId, Tool, ToolchainConfig};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const FAKE_TEX: &str = r#"tex="$1"
base="${tex%.tex}"
echo "This is FakeTeX" > "$base.log"
open=$(tr -cd '{' < "$tex" | wc -c)
close=$(tr -cd '}' < "$tex" | wc -c)
if [ $open -ne $close ]; then
  echo "! Missing } inserted." >> "$base.log"
  exit 1
fi
cp "$tex" "$base.pdf"
"#;

// A 3x2 greyscale PNG followed by the PDF bytes
const FAKE_CONVERT: &str = r#"in="$7"
out="${8#png32:}"
printf '\211\120\116\107\015\012\032\012\000\000\000\015\111\110\104\122\000\000\000\003\000\000\000\002\010\000\000\000\000\270\037\071\306\000\000\000\017\111\104\101\124\170\234\143\370\377\377\077\003\020\003\000\027\360\005\373\203\224\056\103\000\000\000\000\111\105\116\104\256\102\140\202' > "$out"
cat "$in" >> "$out"
"#;

struct Fixture {
    dir: TempDir,
    session: Session,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let tex = write(dir.path(), "fake_tex.sh", FAKE_TEX);
        let convert = write(dir.path(), "fake_convert.sh", FAKE_CONVERT);
        let work = dir.path().join("work");
        fs::create_dir_all(&work).unwrap();

        let config = Config {
            database: DatabaseConfig {
                path: Some(dir.path().join("equations.db")),
                user: Some("razor".to_string()),
            },
            latex: ToolchainConfig {
                working_dir: work,
                tex_compiler: Tool::new("sh").with_args([tex.display().to_string()]),
                converter: Tool::new("sh").with_args([convert.display().to_string()]),
                timeout_ms: 10_000,
                ..Default::default()
            },
        };

        Self {
            session: Session::new(config, None, false),
            dir,
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    async fn run(&self, args: &[&str]) -> anyhow::Result<()> {
        let cli = Cli::try_parse_from(std::iter::once("eqdb").chain(args.iter().copied()))?;
        execute(&self.session, cli.command).await
    }

    fn db(&self) -> Database {
        Database::open(self.path("equations.db"), "inspector").unwrap()
    }

    fn work_leftovers(&self) -> usize {
        fs::read_dir(self.path("work")).unwrap().count()
    }
}

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

// ============================================================================
// compile
// ============================================================================

#[tokio::test]
async fn test_compile_writes_png() {
    let fx = Fixture::new();
    let out = fx.path("m3.png");

    fx.run(&["compile", "--output", out.to_str().unwrap()])
        .await
        .unwrap();

    let png = fs::read(&out).unwrap();
    assert!(is_png(&png));
    assert_eq!(png_dimensions(&png).unwrap(), (3, 2));
    assert!(String::from_utf8_lossy(&png).contains("m^3"));
    assert_eq!(fx.work_leftovers(), 0);
}

#[tokio::test]
async fn test_compile_with_template_file_skips_database() {
    let fx = Fixture::new();
    let template = write(fx.dir.path(), "inline.tex", "<<%__REPLACEMENT__TEXT>>");
    let out = fx.path("inline.png");

    fx.run(&[
        "compile",
        "--pattern",
        "x_1",
        "--template_file",
        template.to_str().unwrap(),
        "--output",
        out.to_str().unwrap(),
    ])
    .await
    .unwrap();

    assert!(String::from_utf8_lossy(&fs::read(&out).unwrap()).contains("<<x_1>>"));
    assert!(!fx.path("equations.db").exists());
}

#[tokio::test]
async fn test_compile_missing_version_falls_back() {
    let fx = Fixture::new();
    fx.run(&["compile", "--version", "99"]).await.unwrap();
}

#[tokio::test]
async fn test_compile_keep_leaves_work_area() {
    let fx = Fixture::new();
    fx.run(&["compile", "--keep", "--temp_fname", "kept"]).await.unwrap();

    let entries: Vec<_> = fs::read_dir(fx.path("work"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].join("kept.tex").is_file());
    assert!(entries[0].join("kept.pdf").is_file());
}

#[tokio::test]
async fn test_compile_error_reports_cause() {
    let fx = Fixture::new();

    let err = fx.run(&["compile", "--pattern", "\\frac{1"]).await.unwrap_err();

    assert_eq!(err.to_string(), "Compilation failed");
    assert!(format!("{:#}", err).contains("Missing } inserted"));
    assert_eq!(fx.work_leftovers(), 0);
}

// ============================================================================
// Records
// ============================================================================

#[tokio::test]
async fn test_equation_lifecycle() {
    let fx = Fixture::new();

    fx.run(&["equation", "add", "--name", "Energy", "--latex", "E = mc^2", "--compile"])
        .await
        .unwrap();
    let eq = fx.db().object(MathKind::Equation, 1).unwrap();
    assert_eq!(eq.name, "Energy");
    assert!(!eq.image_is_dirty);
    assert_eq!(eq.provenance.created_by, "razor");

    fx.run(&["equation", "set-latex", "1", "E = m c^2"]).await.unwrap();
    let eq = fx.db().object(MathKind::Equation, 1).unwrap();
    assert_eq!(eq.latex, "E = m c^2");
    assert!(String::from_utf8_lossy(eq.image.as_deref().unwrap()).contains("E = m c^2"));
    assert_eq!(eq.provenance.modified_by.as_deref(), Some("razor"));

    let out = fx.path("energy.png");
    fx.run(&["equation", "show", "1", "--output", out.to_str().unwrap()])
        .await
        .unwrap();
    assert_eq!(fs::read(&out).unwrap(), eq.image.unwrap());

    fx.run(&["equation", "delete", "1"]).await.unwrap();
    assert_eq!(fx.db().object_count(MathKind::Equation).unwrap(), 0);
}

#[tokio::test]
async fn test_set_latex_failure_keeps_row() {
    let fx = Fixture::new();
    fx.run(&["variable", "add", "--latex", "\\alpha", "--compile"]).await.unwrap();
    let before = fx.db().object(MathKind::Variable, 1).unwrap();

    assert!(fx.run(&["variable", "set-latex", "1", "{"]).await.is_err());

    assert_eq!(fx.db().object(MathKind::Variable, 1).unwrap(), before);
}

#[tokio::test]
async fn test_set_latex_missing_version_falls_back() {
    let fx = Fixture::new();
    fx.run(&["equation", "add", "--latex", "x", "--compile"]).await.unwrap();

    fx.run(&["equation", "set-latex", "1", "y^2", "--version", "99"])
        .await
        .unwrap();

    let eq = fx.db().object(MathKind::Equation, 1).unwrap();
    assert_eq!(eq.latex, "y^2");
    assert_eq!(eq.template_id, Some(TemplateId(1)));
    assert!(!eq.image_is_dirty);
}

#[tokio::test]
async fn test_add_compile_missing_version_falls_back() {
    let fx = Fixture::new();

    fx.run(&["variable", "add", "--latex", "\\beta", "--compile", "--version", "99"])
        .await
        .unwrap();

    let var = fx.db().object(MathKind::Variable, 1).unwrap();
    assert_eq!(var.template_id, Some(TemplateId(1)));
    assert!(!var.image_is_dirty);
}

#[tokio::test]
async fn test_refresh_compiles_pending_rows() {
    let fx = Fixture::new();
    fx.run(&["unit", "add", "--latex", "\\si{m}"]).await.unwrap();
    fx.run(&["unit", "add", "--latex", "\\si{kg"]).await.unwrap();

    fx.run(&["refresh", "unit"]).await.unwrap();

    let db = fx.db();
    assert!(!db.object(MathKind::Unit, 1).unwrap().image_is_dirty);
    assert!(db.object(MathKind::Unit, 2).unwrap().image_is_dirty);
}

#[tokio::test]
async fn test_groups_and_links() {
    let fx = Fixture::new();
    fx.run(&["group", "add", "--name", "Mechanics"]).await.unwrap();
    fx.run(&["equation", "add", "--parent", "1"]).await.unwrap();
    fx.run(&["equation", "add"]).await.unwrap();
    fx.run(&["attach", "group", "1", "2", "--code-file", "src/kinetics.rs"])
        .await
        .unwrap();
    fx.run(&["move", "group", "1", "2", "up"]).await.unwrap();

    let children = fx.db().children(Link::EquationGroup, 1).unwrap();
    assert_eq!(
        children.iter().map(|c| c.object.id).collect::<Vec<_>>(),
        vec![2, 1]
    );
    assert_eq!(children[0].association.code_file_path.as_deref(), Some("src/kinetics.rs"));

    fx.run(&["reorder", "group", "1", "1", "2"]).await.unwrap();
    fx.run(&["detach", "group", "1", "2"]).await.unwrap();
    assert_eq!(fx.db().child_count(Link::EquationGroup, 1).unwrap(), 1);

    fx.run(&["group", "rename", "1", "Dynamics"]).await.unwrap();
    assert_eq!(fx.db().group(1).unwrap().name, "Dynamics");
}

#[tokio::test]
async fn test_unit_cannot_take_parent() {
    let fx = Fixture::new();
    let err = fx.run(&["unit", "add", "--parent", "1"]).await.unwrap_err();
    assert!(err.to_string().contains("units cannot be attached"));
    assert_eq!(fx.db().object_count(MathKind::Unit).unwrap(), 0);
}

#[tokio::test]
async fn test_templates_and_types() {
    let fx = Fixture::new();
    let file = write(fx.dir.path(), "display.tex", "$$%__REPLACEMENT__TEXT$$");

    fx.run(&["template", "import", file.to_str().unwrap()]).await.unwrap();
    fx.run(&["template", "add", "no placeholder"]).await.unwrap_err();
    assert_eq!(fx.db().templates().unwrap().len(), 2);

    fx.run(&["types", "add", "variable", "Vector", "Scalar"]).await.unwrap();
    fx.run(&["types", "delete", "variable", "Scalar"]).await.unwrap();
    assert_eq!(
        fx.db().types(MathKind::Variable).unwrap(),
        vec!["Constant", "Unassigned", "Vector"]
    );
}

#[tokio::test]
async fn test_missing_rows_are_errors() {
    let fx = Fixture::new();
    assert!(fx.run(&["equation", "show", "7"]).await.is_err());
    assert!(fx.run(&["group", "delete", "7"]).await.is_err());
    assert!(fx.run(&["template", "show", "7"]).await.is_err());
}
