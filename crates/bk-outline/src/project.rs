//! A writing project: a directory with a marker file and an `outline`
//! container holding the node tree.

use crate::node::{CreateOptions, Node, NodeKind, NodeOptions};
use crate::paths::{self, OUTLINE_DIR, PROJECT_MARKER};
use bk_core::error::{BkError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::info;

const MARKER_CONTENT: &str = "1\n";
const ROOT_ID: i64 = 1;

#[derive(Debug)]
pub struct Project {
    path: PathBuf,
    outline: Node,
}

/// One line of `stats` output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsRow {
    pub order: Option<f64>,
    pub count: usize,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectStats {
    pub rows: Vec<StatsRow>,
    pub total: usize,
    pub max_primary_key: i64,
}

impl Project {
    pub fn create(path: impl Into<PathBuf>, convert: bool) -> Result<Self> {
        Self::create_with(path, convert, NodeOptions::default())
    }

    /// Create the project directory, marker file and outline root. With
    /// `convert`, an existing directory is adopted.
    pub fn create_with(path: impl Into<PathBuf>, convert: bool, options: NodeOptions) -> Result<Self> {
        let path = path.into();
        if path.exists() && !convert {
            return Err(BkError::AlreadyExists { path });
        }
        fs::create_dir_all(&path).map_err(|e| BkError::from_io(&path, e))?;
        let marker = path.join(PROJECT_MARKER);
        fs::write(&marker, MARKER_CONTENT).map_err(|e| BkError::from_io(&marker, e))?;

        let title = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let outline = Node::create(
            NodeKind::Root,
            path.join(OUTLINE_DIR),
            CreateOptions::new().convert(convert).title(title).id(ROOT_ID),
            options,
        )?;
        info!(path = %path.display(), "project created");
        Ok(Self { path, outline })
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with(path, NodeOptions::default())
    }

    pub fn open_with(path: impl Into<PathBuf>, options: NodeOptions) -> Result<Self> {
        let path = path.into();
        if !paths::is_project(&path) {
            return Err(BkError::NotAProject { path });
        }
        let outline = Node::open(NodeKind::Root, path.join(OUTLINE_DIR), options);
        Ok(Self { path, outline })
    }

    pub fn is_project(path: &Path) -> bool {
        paths::is_project(path)
    }

    /// Nearest project containing `path` (or `path` itself).
    pub fn find(path: &Path) -> Option<PathBuf> {
        paths::find_project(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn outline_path(&self) -> PathBuf {
        self.path.join(OUTLINE_DIR)
    }

    pub fn outline(&self) -> &Node {
        &self.outline
    }

    pub fn next_primary_key(&self) -> i64 {
        self.outline.max_primary_key() + 1
    }

    pub fn new_folder(&self, path: impl Into<PathBuf>, convert: bool) -> Result<Node> {
        self.new_node(NodeKind::Folder, path.into(), convert)
    }

    pub fn new_scene(&self, path: impl Into<PathBuf>, convert: bool) -> Result<Node> {
        self.new_node(NodeKind::Scene, path.into(), convert)
    }

    /// Scene for `.md`/`.txt` paths, folder otherwise.
    pub fn new_entry(&self, path: impl Into<PathBuf>, convert: bool) -> Result<Node> {
        let path = path.into();
        let kind = if paths::is_scene_file(&path) {
            NodeKind::Scene
        } else {
            NodeKind::Folder
        };
        self.new_node(kind, path, convert)
    }

    fn new_node(&self, kind: NodeKind, path: PathBuf, convert: bool) -> Result<Node> {
        if !paths::has_order_digit(&path) {
            return Err(BkError::MissingOrder { path });
        }
        let mut create = CreateOptions::new()
            .convert(convert)
            .id(self.next_primary_key());
        if let Some(title) = paths::title_from_path(&path) {
            create = create.title(title);
        }
        let node = Node::create(kind, &path, create, self.outline.options().clone())?;
        if let Some(parent) = path.parent() {
            self.invalidate_containing(parent);
        }
        info!(kind = %kind, path = %path.display(), "entry created");
        Ok(node)
    }

    fn invalidate_containing(&self, dir: &Path) {
        if dir == self.outline.path() {
            self.outline.invalidate();
            return;
        }
        if let Some(folder) = self
            .outline
            .folders(true)
            .into_iter()
            .find(|f| f.path() == dir)
        {
            folder.invalidate();
        }
    }

    /// Per-scene (or per-folder) word counts plus outline totals.
    pub fn stats(&self, folders: bool) -> ProjectStats {
        ProjectStats::collect(&self.outline, folders)
    }
}

impl ProjectStats {
    pub fn collect(outline: &Node, folders: bool) -> Self {
        let nodes: Vec<Rc<Node>> = if folders {
            outline.folders(true)
        } else {
            outline.scenes(true)
        };
        let rows = nodes
            .iter()
            .map(|n| StatsRow {
                order: n.order(),
                count: n.count(),
                title: n.title(),
            })
            .collect();
        Self {
            rows,
            total: outline.count(),
            max_primary_key: outline.max_primary_key(),
        }
    }
}
