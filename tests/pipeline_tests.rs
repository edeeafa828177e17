//! Pipeline integration tests
//!
//! Each test lays out a small project in a temporary directory using the
//! default path layout and drives the standard step graph over it.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use image::{Rgba, RgbaImage};
use tempfile::TempDir;

use frontpipe::build::{BuildContext, Pipeline, PipelineError, StepError, StepId};
use frontpipe::config::default_config;

// ============================================================================
// Test Utilities
// ============================================================================

fn create_project() -> (TempDir, BuildContext) {
    let temp = TempDir::new().unwrap();
    let ctx = BuildContext::new(default_config(), temp.path().to_path_buf());
    (temp, ctx)
}

fn create_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

fn create_icon(dir: &Path, name: &str, size: u32) {
    fs::create_dir_all(dir).unwrap();
    RgbaImage::from_pixel(size, size, Rgba([200, 40, 40, 255])).save(dir.join(name)).unwrap();
}

fn touch_later(path: &Path) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(5)).unwrap();
}

fn mtime(path: &Path) -> SystemTime {
    fs::metadata(path).unwrap().modified().unwrap()
}

// ============================================================================
// Build
// ============================================================================

#[test]
fn test_empty_project_builds_nothing() {
    let (temp, ctx) = create_project();
    let pipeline = Pipeline::new(ctx).unwrap();

    let result = pipeline.build().unwrap();

    assert!(result.is_success());
    assert_eq!(result.processed_count(), 0);
    assert!(result.all_outputs().is_empty());
    assert!(!temp.path().join("dist/html").exists());
}

#[test]
fn test_build_writes_every_category() {
    let (_temp, ctx) = create_project();
    create_file(&ctx.source_root(), "index.html", "<html><body>entry</body></html>");
    create_file(&ctx.shared_src(), "fonts/readme.txt", "fonts");
    create_file(&ctx.html_src(), "main/list.html", "<ul></ul>");
    create_file(&ctx.css_src(), "main.scss", "$c: #333;\n.box { color: $c; }\n");
    create_file(&ctx.js_src(), "ui.js", "// comment\nvar open = true;\n");

    let pipeline = Pipeline::new(ctx.clone()).unwrap();
    let result = pipeline.build().unwrap();

    assert!(result.is_success(), "{}", result.summary());
    assert!(ctx.output_root().join("index.html").exists());
    assert!(ctx.shared_out().join("fonts/readme.txt").exists());
    assert!(ctx.html_out().join("main/list.html").exists());
    assert_eq!(fs::read_to_string(ctx.js_out().join("ui.js")).unwrap(), "var open=true;");

    let css = fs::read_to_string(ctx.css_out().join("main.css")).unwrap();
    assert!(css.contains(".box"));
    assert!(css.contains("#333"));
    assert!(css.contains("/*# sourceMappingURL=data:application/json;base64,"));
}

#[test]
fn test_compile_error_does_not_stop_other_files() {
    let (_temp, ctx) = create_project();
    create_file(&ctx.css_src(), "broken.scss", ".a { color: ");
    create_file(&ctx.css_src(), "good.scss", ".b { margin: 0; }");

    let pipeline = Pipeline::new(ctx.clone()).unwrap();
    let result = pipeline.build().unwrap();

    assert!(!result.is_success());
    assert_eq!(result.error_count(), 1);
    assert!(result.all_errors()[0].file.ends_with("broken.scss"));
    assert!(ctx.css_out().join("good.css").exists());
    assert!(!ctx.css_out().join("broken.css").exists());
}

#[test]
fn test_html_partials_are_not_written() {
    let (_temp, ctx) = create_project();
    create_file(&ctx.html_src(), "__include/header.html", "<h1>@@title</h1>");
    create_file(
        &ctx.html_src(),
        "index.html",
        "<body>@@include(\"__include/header.html\", {\"title\": \"Home\"})</body>",
    );

    let pipeline = Pipeline::new(ctx.clone()).unwrap();
    pipeline.build().unwrap();

    let page = fs::read_to_string(ctx.html_out().join("index.html")).unwrap();
    assert_eq!(page, "<body><h1>Home</h1></body>");
    assert!(!ctx.html_out().join("__include").exists());
}

#[test]
fn test_write_failure_stops_later_levels() {
    let temp = TempDir::new().unwrap();
    let mut config = default_config();
    // The common step writes a regular file where the js step needs a directory
    config.paths.js_out = PathBuf::from("dist/resources/common/app.js");
    config.build.jobs = Some(1);
    let ctx = BuildContext::new(config, temp.path().to_path_buf());

    create_file(&ctx.shared_src(), "app.js", "shared");
    create_file(&ctx.js_src(), "ui.js", "var open = true;");
    create_file(&ctx.css_src(), "main.scss", ".box { color: red; }");

    let pipeline = Pipeline::new(ctx.clone()).unwrap();
    let result = pipeline.build();

    assert!(
        matches!(result, Err(PipelineError::Step(StepError::Io { step: StepId::Js, .. }))),
        "{:?}",
        result
    );
    assert!(ctx.js_out().is_file());
    assert!(!ctx.css_out().join("main.css").exists());
}

// ============================================================================
// Incremental
// ============================================================================

#[test]
fn test_js_step_is_incremental() {
    let (_temp, ctx) = create_project();
    let a = create_file(&ctx.js_src(), "a.js", "var a = 1;");
    create_file(&ctx.js_src(), "b.js", "var b = 2;");

    let pipeline = Pipeline::new(ctx.clone()).unwrap();
    let first = pipeline.run_step(StepId::Js).unwrap();
    assert_eq!(first.processed, 2);

    let second = pipeline.run_step(StepId::Js).unwrap();
    assert_eq!(second.processed, 0);
    assert!(second.is_noop());

    touch_later(&a);
    let third = pipeline.run_step(StepId::Js).unwrap();
    assert_eq!(third.processed, 1);
    assert_eq!(third.outputs, vec![ctx.js_out().join("a.js")]);
}

#[test]
fn test_clean_twice_is_noop() {
    let (_temp, ctx) = create_project();
    create_file(&ctx.js_src(), "a.js", "var a = 1;");

    let pipeline = Pipeline::new(ctx.clone()).unwrap();
    pipeline.build().unwrap();
    assert!(ctx.output_root().exists());

    assert!(pipeline.clean().unwrap());
    assert!(!pipeline.clean().unwrap());
    assert!(!ctx.output_root().exists());
}

// ============================================================================
// Sprites
// ============================================================================

#[test]
fn test_sprite_without_retina_inputs() {
    let (_temp, ctx) = create_project();
    create_icon(&ctx.sprite_input_src(), "home.png", 16);
    create_icon(&ctx.sprite_input_src(), "search.png", 24);

    let pipeline = Pipeline::new(ctx.clone()).unwrap();
    let result = pipeline.run_step(StepId::SpriteGenerate).unwrap();

    assert!(!result.has_errors());
    assert!(ctx.sprite_sheet_out().join("sprite.png").exists());
    assert!(!ctx.sprite_sheet_out().join("sprite@2x.png").exists());

    let fragment = fs::read_to_string(ctx.sprite_layout_src().join("_sprite.css")).unwrap();
    assert!(fragment.contains(".icon-home"));
    assert!(fragment.contains(".icon-search"));
    assert!(!fragment.contains("@media"));
}

#[test]
fn test_sprite_with_retina_inputs() {
    let (_temp, ctx) = create_project();
    create_icon(&ctx.sprite_input_src(), "home.png", 16);
    create_icon(&ctx.sprite_input_src(), "home@2x.png", 32);

    let pipeline = Pipeline::new(ctx.clone()).unwrap();
    pipeline.run_step(StepId::SpriteGenerate).unwrap();

    let retina = ctx.sprite_sheet_out().join("sprite@2x.png");
    assert!(retina.exists());
    assert_eq!(image::image_dimensions(&retina).unwrap(), (32, 32));

    let fragment = fs::read_to_string(ctx.sprite_layout_src().join("_sprite.css")).unwrap();
    assert!(fragment.contains("@media"));
    assert!(fragment.contains("sprite@2x.png"));
}

#[test]
fn test_no_icons_no_sheet() {
    let (_temp, ctx) = create_project();
    fs::create_dir_all(ctx.sprite_input_src()).unwrap();

    let pipeline = Pipeline::new(ctx.clone()).unwrap();
    let result = pipeline.run_step(StepId::SpriteGenerate).unwrap();

    assert!(result.outputs.is_empty());
    assert!(!ctx.sprite_sheet_out().exists());
}

#[test]
fn test_sprite_fragment_precedes_css() {
    let (_temp, ctx) = create_project();
    create_icon(&ctx.sprite_input_src(), "home.png", 16);
    create_file(&ctx.css_src(), "main.scss", "body { margin: 0; }");

    let pipeline = Pipeline::new(ctx.clone()).unwrap();
    let result = pipeline.build().unwrap();
    assert!(result.is_success(), "{}", result.summary());

    let fragment = ctx.sprite_layout_src().join("_sprite.css");
    let css = ctx.css_out().join("main.css");
    assert!(mtime(&fragment) <= mtime(&css));
    assert!(ctx.sprite_out().join("_sprite.css").exists());
}
