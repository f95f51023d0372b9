//! Outline tree nodes.
//!
//! A [`Node`] is one of three kinds: the outline root (a directory holding
//! `novel.md`), a folder (a directory holding `folder.txt`) or a scene (a
//! single `.md`/`.txt` file). Directory listings and file contents are
//! cached separately and refreshed on access once older than the TTL.

use crate::paths::{self, FOLDER_FILENAME, ROOT_FILENAME};
use bk_core::clock::{Clock, SystemClock};
use bk_core::config::BookConfig;
use bk_core::error::{BkError, Result};
use bk_core::metadata::{self, Metadata, DEFAULT_TAB_WIDTH};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const CACHE_TTL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Root,
    Folder,
    Scene,
}

impl NodeKind {
    /// Name of the metadata file inside a container directory.
    pub fn default_filename(self) -> Option<&'static str> {
        match self {
            NodeKind::Root => Some(ROOT_FILENAME),
            NodeKind::Folder => Some(FOLDER_FILENAME),
            NodeKind::Scene => None,
        }
    }

    pub fn is_container(self) -> bool {
        !matches!(self, NodeKind::Scene)
    }

    pub fn default_role(self) -> StructuralRole {
        match self {
            NodeKind::Root => StructuralRole::Novel,
            NodeKind::Folder => StructuralRole::Chapter,
            NodeKind::Scene => StructuralRole::Scene,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Root => write!(f, "root"),
            NodeKind::Folder => write!(f, "folder"),
            NodeKind::Scene => write!(f, "scene"),
        }
    }
}

/// Semantic position of a node in the manuscript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructuralRole {
    Novel,
    Chapter,
    Scene,
}

impl StructuralRole {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "novel" => Some(StructuralRole::Novel),
            "chapter" => Some(StructuralRole::Chapter),
            "scene" => Some(StructuralRole::Scene),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StructuralRole::Novel => "novel",
            StructuralRole::Chapter => "chapter",
            StructuralRole::Scene => "scene",
        }
    }
}

/// Shared settings handed down from a node to the children it discovers.
#[derive(Debug, Clone)]
pub struct NodeOptions {
    pub clock: Arc<dyn Clock>,
    pub ttl: Duration,
    pub tab_width: usize,
}

impl NodeOptions {
    /// Cache TTL and header tab width from the `outline` config section.
    pub fn from_config(config: &BookConfig) -> Self {
        Self::default()
            .with_ttl(config.outline.cache_ttl())
            .with_tab_width(config.outline.tab_width)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_tab_width(mut self, tab_width: usize) -> Self {
        self.tab_width = tab_width;
        self
    }
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            ttl: CACHE_TTL,
            tab_width: DEFAULT_TAB_WIDTH,
        }
    }
}

/// Arguments for [`Node::create`].
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Adopt an existing path instead of failing with `AlreadyExists`.
    pub convert: bool,
    pub title: Option<String>,
    pub id: Option<i64>,
}

impl CreateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn convert(mut self, convert: bool) -> Self {
        self.convert = convert;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }
}

#[derive(Debug)]
struct DirCache {
    children: Vec<Rc<Node>>,
    other: Vec<PathBuf>,
    loaded_at: Instant,
}

#[derive(Debug)]
struct FileCache {
    metadata: Metadata,
    body: String,
    loaded_at: Instant,
}

#[derive(Debug)]
pub struct Node {
    kind: NodeKind,
    path: PathBuf,
    order: Option<f64>,
    options: NodeOptions,
    depth: Cell<Option<usize>>,
    parent_compiled: Cell<Option<bool>>,
    dir: RefCell<Option<DirCache>>,
    file: RefCell<Option<FileCache>>,
    cached_bytes: Cell<Option<u64>>,
}

impl Node {
    /// Wrap an existing path. Nothing is read until an accessor needs it.
    pub fn open(kind: NodeKind, path: impl Into<PathBuf>, options: NodeOptions) -> Self {
        let path = path.into();
        let order = match kind {
            NodeKind::Root => None,
            _ => paths::order_of(&path),
        };
        let depth = (kind == NodeKind::Root).then_some(0);
        Self {
            kind,
            path,
            order,
            options,
            depth: Cell::new(depth),
            parent_compiled: Cell::new(None),
            dir: RefCell::new(None),
            file: RefCell::new(None),
            cached_bytes: Cell::new(None),
        }
    }

    pub fn root(path: impl Into<PathBuf>) -> Self {
        Self::open(NodeKind::Root, path, NodeOptions::default())
    }

    pub fn folder(path: impl Into<PathBuf>) -> Self {
        Self::open(NodeKind::Folder, path, NodeOptions::default())
    }

    pub fn scene(path: impl Into<PathBuf>) -> Self {
        Self::open(NodeKind::Scene, path, NodeOptions::default())
    }

    fn child(&self, kind: NodeKind, path: PathBuf) -> Self {
        Self::open(kind, path, self.options.clone())
    }

    // ========== Identity ==========

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_root(&self) -> bool {
        self.kind == NodeKind::Root
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    pub fn is_scene(&self) -> bool {
        self.kind == NodeKind::Scene
    }

    /// Directory for roots and folders, the file itself for scenes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file holding this node's header and body.
    pub fn file_path(&self) -> PathBuf {
        match self.kind.default_filename() {
            Some(name) => self.path.join(name),
            None => self.path.clone(),
        }
    }

    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn order(&self) -> Option<f64> {
        self.order
    }

    pub fn options(&self) -> &NodeOptions {
        &self.options
    }

    // ========== File cache ==========

    fn is_expired(&self, loaded_at: Instant) -> bool {
        self.options.clock.now().saturating_duration_since(loaded_at) > self.options.ttl
    }

    fn file_fresh(&self) -> bool {
        self.file
            .borrow()
            .as_ref()
            .is_some_and(|c| !self.is_expired(c.loaded_at))
    }

    fn ensure_file(&self) {
        if !self.file_fresh() {
            if let Err(e) = self.reload_file(false) {
                warn!(path = %self.file_path().display(), error = %e, "reload failed");
            }
        }
    }

    /// Re-read the backing file. A missing or unreadable file yields empty
    /// metadata and body unless `strict`, in which case the error is returned
    /// and the cache is left untouched.
    pub fn reload_file(&self, strict: bool) -> Result<()> {
        let file_path = self.file_path();
        let (metadata, body) = match fs::read_to_string(&file_path) {
            Ok(raw) => {
                let raw = metadata::normalize_newlines(&raw);
                let (header, body) = metadata::split_document(&raw);
                (metadata::parse(header), body.to_string())
            }
            Err(e) if strict => return Err(BkError::from_io(file_path, e)),
            Err(e) => {
                debug!(path = %file_path.display(), error = %e, "unreadable file, using empty content");
                (Metadata::new(), String::new())
            }
        };
        debug!(path = %file_path.display(), "file cache reloaded");
        *self.file.borrow_mut() = Some(FileCache {
            metadata,
            body,
            loaded_at: self.options.clock.now(),
        });
        Ok(())
    }

    pub fn metadata(&self) -> Metadata {
        self.ensure_file();
        self.file
            .borrow()
            .as_ref()
            .map(|c| c.metadata.clone())
            .unwrap_or_default()
    }

    pub fn metadata_value(&self, key: &str) -> Option<String> {
        self.ensure_file();
        self.file
            .borrow()
            .as_ref()
            .and_then(|c| c.metadata.get(key).map(str::to_string))
    }

    pub fn body(&self) -> String {
        self.ensure_file();
        self.file
            .borrow()
            .as_ref()
            .map(|c| c.body.clone())
            .unwrap_or_default()
    }

    /// Edit the in-memory header. Persist with [`Node::rewrite`].
    pub fn update_metadata(&self, f: impl FnOnce(&mut Metadata)) {
        self.ensure_file();
        if let Some(cache) = self.file.borrow_mut().as_mut() {
            f(&mut cache.metadata);
        }
    }

    pub fn title(&self) -> String {
        self.metadata_value(metadata::TITLE)
            .unwrap_or_else(|| self.name())
    }

    pub fn safe_title(&self) -> String {
        paths::sanitize_title(&self.title())
    }

    pub fn primary_key(&self) -> i64 {
        self.ensure_file();
        self.file
            .borrow()
            .as_ref()
            .map(|c| c.metadata.primary_key())
            .unwrap_or(0)
    }

    /// Role override from metadata applies to roots and folders; scenes are
    /// always scenes.
    pub fn structural_role(&self) -> StructuralRole {
        if self.is_scene() {
            return StructuralRole::Scene;
        }
        self.metadata_value(metadata::STRUCTURE)
            .and_then(|v| StructuralRole::parse(&v))
            .unwrap_or_else(|| self.kind.default_role())
    }

    pub fn is_chapter(&self) -> bool {
        self.structural_role() == StructuralRole::Chapter
    }

    /// Own `compile` flag set and every ancestor compiled. The root is
    /// always compiled.
    pub fn is_compiled(&self) -> bool {
        if self.is_root() {
            return true;
        }
        if !self.metadata().compile_flag() {
            return false;
        }
        match self.parent_compiled.get() {
            Some(parent) => parent,
            None => {
                let parent = ancestors_compiled(&self.path);
                self.parent_compiled.set(Some(parent));
                parent
            }
        }
    }

    /// Depth below the outline root (root = 0). A `level` metadata value
    /// overrides the computed depth.
    pub fn level(&self) -> usize {
        if let Some(level) = self
            .metadata_value(metadata::LEVEL)
            .and_then(|v| v.trim().parse::<usize>().ok())
        {
            return level;
        }
        if let Some(depth) = self.depth.get() {
            return depth;
        }
        let depth = paths::find_outline_root(&self.path)
            .and_then(|root| self.path.strip_prefix(root).ok().map(|rel| rel.components().count()))
            .unwrap_or(0);
        self.depth.set(Some(depth));
        depth
    }

    // ========== Directory cache ==========

    fn dir_fresh(&self) -> bool {
        self.dir
            .borrow()
            .as_ref()
            .is_some_and(|c| !self.is_expired(c.loaded_at))
    }

    fn ensure_dir(&self) {
        if self.kind.is_container() && !self.dir_fresh() {
            if let Err(e) = self.reload_dir() {
                warn!(path = %self.path.display(), error = %e, "directory reload failed");
            }
        }
    }

    /// Re-list the directory and classify entries into ordered folders and
    /// scenes; anything without a parsable order goes to "other files".
    /// On a listing failure the cache is reset to empty and the error
    /// returned.
    pub fn reload_dir(&self) -> Result<()> {
        if !self.kind.is_container() {
            return Ok(());
        }
        let now = self.options.clock.now();
        let entries = match list_dir(&self.path) {
            Ok(entries) => entries,
            Err(e) => {
                *self.dir.borrow_mut() = Some(DirCache {
                    children: Vec::new(),
                    other: Vec::new(),
                    loaded_at: now,
                });
                return Err(e);
            }
        };

        let previous: Vec<Rc<Node>> = self
            .dir
            .borrow_mut()
            .take()
            .map(|c| c.children)
            .unwrap_or_default();
        let reuse = |kind: NodeKind, path: &Path| {
            previous
                .iter()
                .find(|n| n.kind == kind && n.path == path)
                .cloned()
        };

        let mut folders = Vec::new();
        let mut scenes = Vec::new();
        let mut other = Vec::new();
        for (path, is_dir) in entries {
            let ordered = paths::order_of(&path).is_some();
            if is_dir && ordered {
                folders.push(reuse(NodeKind::Folder, &path).unwrap_or_else(|| {
                    Rc::new(self.child(NodeKind::Folder, path))
                }));
            } else if !is_dir && ordered && paths::is_scene_file(&path) {
                scenes.push(reuse(NodeKind::Scene, &path).unwrap_or_else(|| {
                    Rc::new(self.child(NodeKind::Scene, path))
                }));
            } else {
                other.push(path);
            }
        }

        let mut children: Vec<Rc<Node>> = folders.into_iter().chain(scenes).collect();
        children.sort_by(|a, b| compare_order(a.order, b.order));

        let depth = self.level();
        let compiled = self.is_compiled();
        for child in &children {
            child.depth.set(Some(depth + 1));
            child.parent_compiled.set(Some(compiled));
        }

        debug!(path = %self.path.display(), children = children.len(), other = other.len(), "directory cache reloaded");
        *self.dir.borrow_mut() = Some(DirCache {
            children,
            other,
            loaded_at: self.options.clock.now(),
        });
        Ok(())
    }

    /// Ordered folders and scenes directly inside this node.
    pub fn children(&self) -> Vec<Rc<Node>> {
        self.ensure_dir();
        self.dir
            .borrow()
            .as_ref()
            .map(|c| c.children.clone())
            .unwrap_or_default()
    }

    pub fn folders(&self, recursive: bool) -> Vec<Rc<Node>> {
        let mut out = Vec::new();
        for child in self.children().into_iter().filter(|c| c.is_folder()) {
            let nested = if recursive { child.folders(true) } else { Vec::new() };
            out.push(child);
            out.extend(nested);
        }
        out
    }

    pub fn scenes(&self, recursive: bool) -> Vec<Rc<Node>> {
        let mut out = Vec::new();
        for child in self.children() {
            if child.is_scene() {
                out.push(child);
            } else if recursive {
                out.extend(child.scenes(true));
            }
        }
        out
    }

    /// Entries in this directory with no parsable order.
    pub fn other_files(&self) -> Vec<PathBuf> {
        self.ensure_dir();
        self.dir
            .borrow()
            .as_ref()
            .map(|c| c.other.clone())
            .unwrap_or_default()
    }

    /// Mark this node's caches, and those of every cached descendant, stale.
    pub fn invalidate(&self) {
        *self.file.borrow_mut() = None;
        let dir = self.dir.borrow_mut().take();
        if let Some(dir) = dir {
            for child in &dir.children {
                child.invalidate();
            }
        }
    }

    // ========== Aggregates ==========

    /// Whitespace-separated words in this body plus all descendants.
    pub fn count(&self) -> usize {
        let own = self.body().split_whitespace().count();
        own + self.children().iter().map(|c| c.count()).sum::<usize>()
    }

    pub fn max_primary_key(&self) -> i64 {
        self.children()
            .iter()
            .map(|c| c.max_primary_key())
            .fold(self.primary_key(), i64::max)
    }

    /// On-disk size of the backing file plus all descendants. Stores the
    /// total as the baseline for [`Node::is_changed`].
    pub fn byte_count(&self) -> u64 {
        let own = fs::metadata(self.file_path()).map(|m| m.len()).unwrap_or(0);
        let total = own + self.children().iter().map(|c| c.byte_count()).sum::<u64>();
        self.cached_bytes.set(Some(total));
        total
    }

    /// Compare the previous baseline against a fresh [`Node::byte_count`].
    /// Not idempotent: the call itself moves the baseline.
    pub fn is_changed(&self) -> bool {
        let previous = self.cached_bytes.get();
        previous != Some(self.byte_count())
    }

    // ========== Mutation ==========

    /// Create the backing directory/file with a fresh header and return the
    /// node wrapping it.
    pub fn create(
        kind: NodeKind,
        path: impl Into<PathBuf>,
        create: CreateOptions,
        options: NodeOptions,
    ) -> Result<Node> {
        let path = path.into();
        if path.exists() && !create.convert {
            return Err(BkError::AlreadyExists { path });
        }
        if kind.is_container() {
            fs::create_dir_all(&path).map_err(|e| BkError::from_io(&path, e))?;
        } else {
            let parent = path.parent().unwrap_or_else(|| Path::new("."));
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(BkError::NotFound {
                    path: parent.to_path_buf(),
                });
            }
        }

        let node = Node::open(kind, path, options);
        let file_path = node.file_path();
        let body = if create.convert {
            existing_body(&file_path)?
        } else {
            String::new()
        };

        let mut header = Metadata::default_template();
        let title = create
            .title
            .or_else(|| paths::title_from_path(&node.path));
        if let Some(title) = title {
            header.insert(metadata::TITLE, title);
        }
        let id = create
            .id
            .unwrap_or(if kind == NodeKind::Root { 1 } else { 0 });
        header.insert(metadata::ID, id.to_string());

        node.write(&header, &body)?;
        debug!(kind = %kind, path = %node.path.display(), "node created");
        Ok(node)
    }

    /// Overwrite the backing file with `header` and `body`, defaulting to the
    /// in-memory values for whichever is omitted.
    pub fn rewrite(&self, header: Option<&Metadata>, body: Option<&str>) -> Result<()> {
        let header = header.cloned().unwrap_or_else(|| self.metadata());
        let body = body.map(str::to_string).unwrap_or_else(|| self.body());
        self.write(&header, &body)
    }

    fn write(&self, header: &Metadata, body: &str) -> Result<()> {
        let file_path = self.file_path();
        let text = metadata::compose_document(header, body, self.options.tab_width);
        fs::write(&file_path, text).map_err(|e| {
            tracing::error!(path = %file_path.display(), error = %e, "rewrite failed");
            BkError::Io {
                path: file_path.clone(),
                source: e,
            }
        })?;
        *self.file.borrow_mut() = Some(FileCache {
            metadata: header.clone(),
            body: body.to_string(),
            loaded_at: self.options.clock.now(),
        });
        Ok(())
    }
}

/// Sort key: ascending order; unordered nodes never reach a listing.
fn compare_order(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Directory entries in file-name order, flagged as directory or not.
fn list_dir(path: &Path) -> Result<Vec<(PathBuf, bool)>> {
    let mut entries = Vec::new();
    let rd = fs::read_dir(path).map_err(|e| BkError::from_io(path, e))?;
    for entry in rd {
        let entry = entry.map_err(|e| BkError::from_io(path, e))?;
        let entry_path = entry.path();
        let is_dir = entry_path.is_dir();
        entries.push((entry_path, is_dir));
    }
    entries.sort_by(|a, b| a.0.file_name().cmp(&b.0.file_name()));
    Ok(entries)
}

/// Body of an existing file being converted. A file that already carries
/// a header keeps only its body; a plain file becomes the body whole.
fn existing_body(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(raw) => {
            let raw = metadata::normalize_newlines(&raw).into_owned();
            let (header, body) = metadata::split_document(&raw);
            let known = metadata::parse_strict(header)
                .map(|m| m.contains_key(metadata::TITLE) || m.contains_key(metadata::ID))
                .unwrap_or(false);
            Ok(if known { body.to_string() } else { raw })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(BkError::from_io(file_path, e)),
    }
}

/// Walk the containing folders of `path` up to the outline root, requiring
/// each folder's `compile` flag.
fn ancestors_compiled(path: &Path) -> bool {
    for dir in path.ancestors().skip(1) {
        let is_root = dir.join(ROOT_FILENAME).is_file()
            || dir.file_name().and_then(|n| n.to_str()) == Some(paths::OUTLINE_DIR);
        if is_root {
            return true;
        }
        let folder_file = dir.join(FOLDER_FILENAME);
        if !folder_file.is_file() {
            return true;
        }
        let raw = fs::read_to_string(&folder_file).unwrap_or_default();
        let raw = metadata::normalize_newlines(&raw);
        let (header, _) = metadata::split_document(&raw);
        if !metadata::parse(header).compile_flag() {
            return false;
        }
    }
    true
}
