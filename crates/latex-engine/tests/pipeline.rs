//! Pipeline integration tests against the fake toolchain
//!
//! Run with: cargo test -p latex-engine --test pipeline

#![cfg(unix)]

#[path = "common/toolchain.rs"]
mod toolchain;

use std::fs;

use latex_engine::compiler::{is_png, Artifact};
use latex_engine::{
    CompileOptions, InMemoryTemplateStore, LatexCompiler, Pipeline, PipelineError, Resolution,
    TemplateId,
};
use pretty_assertions::assert_eq;
use toolchain::{expected_png, FakeToolchain, TEST_TEMPLATE};

// ============================================================================
// Blocking pipeline
// ============================================================================

#[test]
fn test_compile_produces_png_and_cleans_up() {
    let fake = FakeToolchain::new();
    let pipeline = Pipeline::new(fake.config.clone());

    let image = pipeline
        .compile_sync("a^2 + b^2 = c^2", TEST_TEMPLATE, &CompileOptions::default())
        .unwrap();

    assert!(is_png(&image.png));
    assert_eq!(image.png, expected_png("a^2 + b^2 = c^2"));
    assert_eq!(image.kept_dir, None);
    assert!(fake.leftovers().is_empty());
}

#[test]
fn test_compile_is_deterministic() {
    let fake = FakeToolchain::new();
    let pipeline = Pipeline::new(fake.config.clone());
    let options = CompileOptions::default();

    let first = pipeline.compile_sync("\\frac{1}{2}", TEST_TEMPLATE, &options).unwrap();
    let second = pipeline.compile_sync("\\frac{1}{2}", TEST_TEMPLATE, &options).unwrap();

    assert_eq!(first.png, second.png);
}

#[test]
fn test_unbalanced_braces_fail_to_compile() {
    let fake = FakeToolchain::new();
    let pipeline = Pipeline::new(fake.config.clone());

    let err = pipeline
        .compile_sync("\\frac{1}{2", TEST_TEMPLATE, &CompileOptions::default())
        .unwrap_err();

    match &err {
        PipelineError::Compile { message, log } => {
            assert!(message.contains("Missing } inserted."), "{}", message);
            assert!(log.contains("FakeTeX"));
        }
        other => panic!("expected compile error, got {:?}", other),
    }
    assert_eq!(err.tex_errors().len(), 1);
    assert!(fake.leftovers().is_empty());
}

#[test]
fn test_keep_intermediate_files() {
    let fake = FakeToolchain::new();
    let pipeline = Pipeline::new(fake.config.clone());
    let options = CompileOptions {
        temp_fname: "kept".to_string(),
        keep_intermediate: true,
    };

    let image = pipeline.compile_sync("x", TEST_TEMPLATE, &options).unwrap();
    let dir = image.kept_dir.expect("work area should be kept");

    for artifact in Artifact::ALL {
        assert!(
            dir.join(artifact.file_name("kept")).is_file(),
            "missing {}",
            artifact
        );
    }
    assert_eq!(fs::read(dir.join("kept.png")).unwrap(), image.png);
}

#[test]
fn test_concurrent_compiles_with_same_base_name() {
    let fake = FakeToolchain::new();
    let pipeline = Pipeline::new(fake.config.clone());
    let options = CompileOptions::default();
    let fragments: Vec<String> = (0..6).map(|i| format!("x_{{{}}}", i)).collect();

    let images: Vec<Vec<u8>> = std::thread::scope(|scope| {
        let handles: Vec<_> = fragments
            .iter()
            .map(|fragment| {
                let pipeline = &pipeline;
                let options = &options;
                scope.spawn(move || {
                    pipeline
                        .compile_sync(fragment, TEST_TEMPLATE, options)
                        .unwrap()
                        .png
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for (fragment, image) in fragments.iter().zip(&images) {
        assert_eq!(image, &expected_png(fragment));
    }
    assert!(fake.leftovers().is_empty());
}

#[test]
fn test_missing_placeholder_creates_nothing() {
    let fake = FakeToolchain::new();
    let pipeline = Pipeline::new(fake.config.clone());

    let result = pipeline.compile_sync("x", "no placeholder here", &CompileOptions::default());

    assert!(matches!(
        result,
        Err(PipelineError::TemplateSubstitution { .. })
    ));
    assert!(fake.leftovers().is_empty());
}

#[test]
fn test_converter_failure_is_rasterize_error() {
    let fake = FakeToolchain::failing_converter();
    let pipeline = Pipeline::new(fake.config.clone());

    let err = pipeline
        .compile_sync("x", TEST_TEMPLATE, &CompileOptions::default())
        .unwrap_err();

    match err {
        PipelineError::Rasterize { output, .. } => {
            assert!(output.contains("no images defined"))
        }
        other => panic!("expected rasterize error, got {:?}", other),
    }
    assert!(fake.leftovers().is_empty());
}

#[test]
fn test_non_png_output_is_artifact_error() {
    let fake = FakeToolchain::non_png_converter();
    let pipeline = Pipeline::new(fake.config.clone());

    let result = pipeline.compile_sync("x", TEST_TEMPLATE, &CompileOptions::default());

    assert!(matches!(result, Err(PipelineError::ArtifactRead { .. })));
    assert!(fake.leftovers().is_empty());
}

#[test]
fn test_tex_timeout_kills_compiler() {
    let mut fake = FakeToolchain::new();
    fake.config.timeout_ms = 200;
    let pipeline = Pipeline::new(fake.config.clone());
    let started = std::time::Instant::now();

    let err = pipeline
        .compile_sync("SLOW", TEST_TEMPLATE, &CompileOptions::default())
        .unwrap_err();

    assert!(err.to_string().contains("timed out"), "{}", err);
    assert!(started.elapsed() < std::time::Duration::from_secs(4));
    assert!(fake.leftovers().is_empty());
}

#[test]
fn test_tex_timeout_kills_background_jobs() {
    let mut fake = FakeToolchain::new();
    fake.config.timeout_ms = 200;
    let pipeline = Pipeline::new(fake.config.clone());

    let err = pipeline
        .compile_sync("LINGER", TEST_TEMPLATE, &CompileOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains("timed out"), "{}", err);

    std::thread::sleep(std::time::Duration::from_millis(1500));
    assert!(!fake.lingering_job_survived());
}

// ============================================================================
// Template resolution through LatexCompiler
// ============================================================================

#[test]
fn test_compiler_falls_back_to_latest_template() {
    let fake = FakeToolchain::new();
    let store = InMemoryTemplateStore::from_body(TEST_TEMPLATE, "razor");
    let compiler = LatexCompiler::new(store, fake.config.clone());

    let rendered = compiler.render_sync("y", Some(TemplateId(42))).unwrap();

    assert_eq!(rendered.template_id, TemplateId(1));
    assert_eq!(
        rendered.resolution,
        Resolution::FellBackToLatest {
            requested: TemplateId(42)
        }
    );
    assert_eq!(rendered.image.png, expected_png("y"));
}

#[test]
fn test_compiler_with_empty_store() {
    let fake = FakeToolchain::new();
    let compiler = LatexCompiler::new(InMemoryTemplateStore::new(), fake.config.clone());

    assert!(matches!(
        compiler.render_sync("y", None),
        Err(PipelineError::Template(_))
    ));
}

// ============================================================================
// Async pipeline
// ============================================================================

#[tokio::test]
async fn test_async_compile_matches_blocking() {
    let fake = FakeToolchain::new();
    let pipeline = Pipeline::new(fake.config.clone());
    let options = CompileOptions::default();

    let async_image = pipeline.compile("e^{i\\pi}", TEST_TEMPLATE, &options).await.unwrap();
    let sync_image = pipeline.compile_sync("e^{i\\pi}", TEST_TEMPLATE, &options).unwrap();

    assert_eq!(async_image.png, sync_image.png);
    assert!(fake.leftovers().is_empty());
}

#[tokio::test]
async fn test_async_timeout() {
    let mut fake = FakeToolchain::new();
    fake.config.timeout_ms = 200;
    let pipeline = Pipeline::new(fake.config.clone());

    let result = pipeline
        .compile("SLOW", TEST_TEMPLATE, &CompileOptions::default())
        .await;

    assert!(matches!(result, Err(PipelineError::Compile { .. })));
    assert!(fake.leftovers().is_empty());
}
