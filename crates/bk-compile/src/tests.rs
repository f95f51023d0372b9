use crate::*;
use bk_core::config::ExportConfig;
use bk_core::error::BkError;
use bk_core::metadata::{self, Metadata, DEFAULT_TAB_WIDTH, ID, TITLE};
use bk_outline::{Node, Project};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_node(path: &Path, title: &str, id: i64, body: &str) {
    let mut m = Metadata::default_template();
    m.insert(TITLE, title);
    m.insert(ID, id.to_string());
    fs::write(path, metadata::compose_document(&m, body, DEFAULT_TAB_WIDTH)).unwrap();
}

fn read_body(path: &Path) -> String {
    let raw = fs::read_to_string(path).unwrap();
    metadata::split_document(&raw).1.to_string()
}

/// Root (empty body), chapter "Intro" with "Intro text", one scene
/// "Hello world" inside it.
fn intro_fixture() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("outline");
    fs::create_dir_all(root.join("1-intro")).unwrap();
    write_node(&root.join("novel.md"), "Novel", 1, "");
    write_node(&root.join("1-intro/folder.txt"), "Intro", 2, "Intro text");
    write_node(&root.join("1-intro/1-hello.md"), "Hello", 3, "Hello world");
    (tmp, root)
}

// ========== Compile ==========

#[test]
fn test_compile_chapter_then_scene() {
    let (_tmp, root) = intro_fixture();
    let text = Compiler::new().compile(&Node::root(&root));
    assert_eq!(text, "\n\n## Intro\n\nIntro textHello world");
    assert!(!text.contains("\n\n\n"));
}

#[test]
fn test_compile_collapses_blank_runs() {
    let (_tmp, root) = intro_fixture();
    write_node(&root.join("novel.md"), "Novel", 1, "Preface\n\n\n\n");
    write_node(&root.join("2-outro.md"), "Outro", 4, "\n\n\nThe end.\n");
    let text = Compiler::new().compile(&Node::root(&root));
    assert!(!text.contains("\n\n\n"));
    assert!(text.starts_with("Preface\n\n## Intro\n\n"));
    assert!(text.ends_with("Hello world\n\nThe end.\n"));
}

#[test]
fn test_compile_preorder_across_chapters() {
    let (_tmp, root) = intro_fixture();
    fs::create_dir_all(root.join("2-second")).unwrap();
    write_node(&root.join("2-second/folder.txt"), "Second", 4, "");
    write_node(&root.join("2-second/1-s.md"), "S", 5, "More words.");
    let text = Compiler::new().compile(&Node::root(&root));
    let intro = text.find("## Intro").unwrap();
    let hello = text.find("Hello world").unwrap();
    let second = text.find("## Second").unwrap();
    let more = text.find("More words.").unwrap();
    assert!(intro < hello && hello < second && second < more);
}

#[test]
fn test_compile_scene_never_gets_heading() {
    let (_tmp, root) = intro_fixture();
    write_node(&root.join("2-loose.md"), "Loose", 4, "text");
    let text = Compiler::new().compile(&Node::root(&root));
    assert!(!text.contains("## Loose"));
    assert!(!text.contains("## Hello"));
    assert!(!text.contains("## Novel"));
}

#[test]
fn test_compile_front_and_back_matter() {
    let (_tmp, root) = intro_fixture();
    let text = Compiler::new()
        .with_frontmatter("# The Book\n\n\n")
        .with_backmatter("\n\n\nColophon")
        .compile(&Node::root(&root));
    assert!(text.starts_with("# The Book\n\n## Intro"));
    assert!(text.ends_with("Hello world\n\nColophon"));
}

#[test]
fn test_compile_only_compiled_skips_subtree() {
    let (_tmp, root) = intro_fixture();
    fs::create_dir_all(root.join("2-draft")).unwrap();
    let mut m = Metadata::default_template();
    m.insert(TITLE, "Draft");
    m.insert(metadata::COMPILE, "0");
    fs::write(root.join("2-draft/folder.txt"), metadata::compose_document(&m, "", DEFAULT_TAB_WIDTH)).unwrap();
    write_node(&root.join("2-draft/1-wip.md"), "Wip", 5, "unfinished");

    let all = Compiler::new().compile(&Node::root(&root));
    assert!(all.contains("unfinished"));

    let compiled = Compiler::new().only_compiled(true).compile(&Node::root(&root));
    assert!(!compiled.contains("unfinished"));
    assert!(!compiled.contains("## Draft"));
    assert!(compiled.contains("Hello world"));
}

#[test]
fn test_compile_project() {
    let tmp = TempDir::new().unwrap();
    let project = Project::create(tmp.path().join("book"), false).unwrap();
    let outline = project.outline_path();
    let folder = project.new_folder(outline.join("1-Opening"), false).unwrap();
    folder.rewrite(None, Some("It began.")).unwrap();
    let scene = project.new_scene(outline.join("1-Opening/1-dawn.md"), false).unwrap();
    scene.rewrite(None, Some(" At dawn.")).unwrap();
    project.outline().invalidate();

    let text = Compiler::new().compile_project(&project);
    assert_eq!(text, "\n\n## Opening\n\nIt began. At dawn.");
}

#[test]
fn test_clean_compile() {
    assert_eq!(clean_compile("a\n\n\n\nb\n\n\nc\nd"), "a\n\nb\n\nc\nd");
    assert_eq!(clean_compile("a\n\nb"), "a\n\nb");
}

// ========== Transform ==========

#[test]
fn test_hard_crlf() {
    assert_eq!(Transform::HardCrlf.apply("a\n\nb"), "a\nb");
    assert_eq!(Transform::HardCrlf.apply("a\n\n\n\nb\nc"), "a\nb\nc");
}

#[test]
fn test_soft_crlf() {
    assert_eq!(Transform::SoftCrlf.apply("a\nb"), "a\n\nb");
    assert_eq!(Transform::SoftCrlf.apply("a\nb\n"), "a\n\nb\n\n");
}

#[test]
fn test_transforms_are_not_inverse() {
    let original = "a\n\nb";
    let round = Transform::HardCrlf.apply(&Transform::SoftCrlf.apply(original));
    assert_ne!(round, original);
    assert_eq!(round, "a\nb");

    let mixed = "a\nb\n\nc";
    let back = Transform::SoftCrlf.apply(&Transform::HardCrlf.apply(mixed));
    assert_ne!(back, mixed);
    assert_eq!(back, "a\n\nb\n\nc");
}

#[test]
fn test_transform_tree_rewrites_changed_only() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("outline");
    fs::create_dir_all(root.join("1-part")).unwrap();
    write_node(&root.join("novel.md"), "Novel", 1, "");
    write_node(&root.join("1-part/1-a.md"), "A", 2, "one\n\ntwo");
    write_node(&root.join("2-b.md"), "B", 3, "single line");

    let report = transform_tree(&Node::root(&root), Transform::HardCrlf).unwrap();
    assert_eq!(report.visited, 4);
    assert_eq!(report.rewritten, vec![root.join("1-part/1-a.md")]);
    assert_eq!(report.skipped, vec![root.join("1-part/folder.txt")]);
    assert_eq!(read_body(&root.join("1-part/1-a.md")), "one\ntwo");
    assert_eq!(read_body(&root.join("2-b.md")), "single line");
}

#[test]
fn test_transform_keeps_header() {
    let (_tmp, root) = intro_fixture();
    write_node(&root.join("1-intro/1-hello.md"), "Hello", 3, "Hello\nworld");
    transform_tree(&Node::root(&root), Transform::SoftCrlf).unwrap();
    let scene = Node::scene(root.join("1-intro/1-hello.md"));
    assert_eq!(scene.body(), "Hello\n\nworld");
    assert_eq!(scene.title(), "Hello");
    assert_eq!(scene.primary_key(), 3);
}

#[test]
fn test_transform_reads_fresh_body() {
    let (_tmp, root) = intro_fixture();
    let path = root.join("1-intro/1-hello.md");
    let scene = Node::scene(&path);
    assert_eq!(scene.body(), "Hello world");

    write_node(&path, "Hello", 3, "edited\n\nelsewhere");
    transform_tree(&scene, Transform::HardCrlf).unwrap();
    assert_eq!(read_body(&path), "edited\nelsewhere");
}

// ========== Export ==========

#[test]
fn test_export_command_args() {
    let export = EbookExport::default();
    let cmd = export.command(Path::new("build/single_file.md"), Path::new("build/book.epub"));
    assert_eq!(cmd.get_program(), OsStr::new("pandoc"));
    let args: Vec<&OsStr> = cmd.get_args().collect();
    let expected: Vec<&OsStr> = [
        "-o",
        "build/book.epub",
        "build/single_file.md",
        "--toc",
        "--toc-depth",
        "2",
        "--epub-chapter-level",
        "2",
        "--number-sections",
    ]
    .into_iter()
    .map(OsStr::new)
    .collect();
    assert_eq!(args, expected);
}

#[test]
fn test_export_command_from_config() {
    let config = ExportConfig {
        toc_depth: 3,
        chapter_level: 1,
        number_sections: false,
        ..ExportConfig::default()
    };
    let cmd = EbookExport::from_config(&config).command(Path::new("in.md"), Path::new("out.epub"));
    let args: Vec<String> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
    assert!(args.windows(2).any(|w| w == ["--toc-depth", "3"]));
    assert!(args.windows(2).any(|w| w == ["--epub-chapter-level", "1"]));
    assert!(!args.iter().any(|a| a == "--number-sections"));
}

#[test]
fn test_build_dir_resolution() {
    let project = Path::new("/books/novel");
    assert_eq!(EbookExport::default().build_dir(project), project.join("build"));
    assert_eq!(
        EbookExport::default().with_build_dir("out").build_dir(project),
        project.join("out")
    );
    assert_eq!(
        EbookExport::default().with_build_dir("/tmp/x").build_dir(project),
        PathBuf::from("/tmp/x")
    );
}

#[test]
fn test_write_manuscript_creates_dir() {
    let tmp = TempDir::new().unwrap();
    let build = tmp.path().join("deep/build");
    let path = EbookExport::default().write_manuscript(&build, "# Book").unwrap();
    assert_eq!(path, build.join("single_file.md"));
    assert_eq!(fs::read_to_string(path).unwrap(), "# Book");
}

#[test]
fn test_export_manuscript_only() {
    let tmp = TempDir::new().unwrap();
    let out = EbookExport::default()
        .export(tmp.path(), "text", true)
        .unwrap();
    assert_eq!(out, tmp.path().join("build/single_file.md"));
}

#[test]
fn test_run_missing_converter() {
    let tmp = TempDir::new().unwrap();
    let config = ExportConfig {
        converter: "bk-converter-that-does-not-exist".into(),
        ..ExportConfig::default()
    };
    let export = EbookExport::from_config(&config);
    let src = export.write_manuscript(tmp.path(), "x").unwrap();
    let err = export.run(&src, &tmp.path().join("book.epub")).unwrap_err();
    assert!(matches!(err, BkError::Export(_)));
}
