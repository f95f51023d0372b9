//! Filename conventions: order prefixes, titles, project discovery.

use std::path::{Path, PathBuf};

/// Directory inside a project that holds the outline tree.
pub const OUTLINE_DIR: &str = "outline";
/// Presence of this file marks a directory as a project.
pub const PROJECT_MARKER: &str = "MANUSKRIPT";
pub const ROOT_FILENAME: &str = "novel.md";
pub const FOLDER_FILENAME: &str = "folder.txt";
pub const SCENE_EXTENSIONS: &[&str] = &["md", "txt"];

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

/// Numeric prefix before the first `-` of a file or directory name.
///
/// `"3-foo"` is 3, `"3.5-foo"` is 3.5, `"foo"` has no order.
pub fn parse_order(name: &str) -> Option<f64> {
    let prefix = name.split('-').next()?;
    prefix.parse::<f64>().ok().filter(|n| n.is_finite())
}

pub fn order_of(path: &Path) -> Option<f64> {
    file_name(path).and_then(parse_order)
}

pub fn has_order_digit(path: &Path) -> bool {
    order_of(path).is_some()
}

/// Title embedded in a filename: the text after the order prefix, without
/// extension. `1-my_scene.md` gives `my_scene`.
pub fn title_from_path(path: &Path) -> Option<String> {
    let name = file_name(path)?;
    let (_, rest) = name.split_once('-')?;
    let title = match rest.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => rest,
    };
    (!title.is_empty()).then(|| title.to_string())
}

/// Filename-safe form of a title: letters and digits pass, whitespace
/// becomes `_`, anything else `-`.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else if c.is_whitespace() {
                '_'
            } else {
                '-'
            }
        })
        .collect()
}

pub fn is_scene_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SCENE_EXTENSIONS.contains(&ext))
}

pub fn is_project(path: &Path) -> bool {
    path.is_dir() && path.join(PROJECT_MARKER).is_file()
}

/// Walk up from `path` to the nearest project directory.
pub fn find_project(path: &Path) -> Option<PathBuf> {
    path.ancestors().find(|p| is_project(p)).map(Path::to_path_buf)
}

/// Nearest strict ancestor that is an outline container: it holds the
/// root document or is named like one.
pub fn find_outline_root(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .skip(1)
        .find(|p| p.join(ROOT_FILENAME).is_file() || file_name(p) == Some(OUTLINE_DIR))
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_order_integer() {
        assert_eq!(parse_order("3-foo"), Some(3.0));
        assert_eq!(parse_order("03-foo.md"), Some(3.0));
    }

    #[test]
    fn test_parse_order_fraction() {
        assert_eq!(parse_order("3.5-foo"), Some(3.5));
    }

    #[test]
    fn test_parse_order_missing() {
        assert_eq!(parse_order("foo"), None);
        assert_eq!(parse_order("folder.txt"), None);
        assert_eq!(parse_order("-foo"), None);
        assert_eq!(parse_order("inf-foo"), None);
    }

    #[test]
    fn test_parse_order_bare_number() {
        assert_eq!(parse_order("7"), Some(7.0));
        assert_eq!(parse_order("7.md"), None);
    }

    #[test]
    fn test_title_from_path() {
        assert_eq!(title_from_path(Path::new("/a/1-scene1.md")), Some("scene1".into()));
        assert_eq!(title_from_path(Path::new("/a/2-chapter2")), Some("chapter2".into()));
        assert_eq!(title_from_path(Path::new("/a/2-two-words.md")), Some("two-words".into()));
        assert_eq!(title_from_path(Path::new("/a/noprefix")), None);
        assert_eq!(title_from_path(Path::new("/a/3-")), None);
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("The Long Night"), "The_Long_Night");
        assert_eq!(sanitize_title("Who? Me!"), "Who-_Me-");
        assert_eq!(sanitize_title("Chapter 2: Übergang"), "Chapter_2-_Übergang");
    }

    #[test]
    fn test_is_scene_file() {
        assert!(is_scene_file(Path::new("1-a.md")));
        assert!(is_scene_file(Path::new("1-a.txt")));
        assert!(!is_scene_file(Path::new("1-a.png")));
        assert!(!is_scene_file(Path::new("1-a")));
    }

    #[test]
    fn test_find_project() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("outline/1-a/2-b");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_project(&nested), None);
        std::fs::write(tmp.path().join(PROJECT_MARKER), "1\n").unwrap();
        assert_eq!(find_project(&nested), Some(tmp.path().to_path_buf()));
        assert!(is_project(tmp.path()));
    }

    #[test]
    fn test_find_outline_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("manuscript");
        std::fs::create_dir_all(root.join("1-a")).unwrap();
        std::fs::write(root.join(ROOT_FILENAME), "").unwrap();
        assert_eq!(find_outline_root(&root.join("1-a/2-b.md")), Some(root.clone()));
        assert_eq!(
            find_outline_root(Path::new("/x/outline/1-a")),
            Some(PathBuf::from("/x/outline"))
        );
    }
}
