//! Filename normalization: contiguous zero-padded order prefixes and titles
//! that follow the metadata.

use crate::node::Node;
use bk_core::error::{BkError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameOp {
    pub from: PathBuf,
    pub to: PathBuf,
}

impl RenameOp {
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

/// Digits needed to write the largest sibling index.
pub fn pad_width(siblings: usize) -> usize {
    siblings.to_string().len()
}

/// Compute (and unless `dry_run`, apply) renames for `node`'s subtree.
///
/// Folder subtrees are handled first, so the returned list is ordered
/// children-first and must be applied in that order. Application is not
/// atomic: the first failure is returned and earlier renames stay.
pub fn auto_rename(node: &Node, dry_run: bool) -> Result<Vec<RenameOp>> {
    let mut ops = Vec::new();
    for folder in node.folders(false) {
        ops.extend(auto_rename(&folder, dry_run)?);
    }

    let children = node.children();
    let width = pad_width(children.len());
    let mut level = Vec::with_capacity(children.len());
    for (idx, child) in children.iter().enumerate() {
        let ext = if child.is_scene() { ".md" } else { "" };
        let stem = format!("{idx:0width$}-{}", child.safe_title());
        let mut to = node.path().join(format!("{stem}{ext}"));
        if to != child.path() && to.exists() {
            to = free_path(node.path(), &format!("{stem}-{}", child.primary_key()), ext);
        }
        level.push(RenameOp {
            from: child.path().to_path_buf(),
            to,
        });
    }

    if !dry_run {
        for op in level.iter().filter(|op| !op.is_noop()) {
            if op.to.exists() {
                return Err(BkError::AlreadyExists { path: op.to.clone() });
            }
            info!(from = %op.from.display(), to = %op.to.display(), "renaming");
            fs::rename(&op.from, &op.to).map_err(|e| BkError::from_io(&op.from, e))?;
        }
        node.invalidate();
    }

    ops.extend(level);
    Ok(ops)
}

/// First of `{stem}{ext}`, `{stem}-2{ext}`, `{stem}-3{ext}`, ... not on disk.
fn free_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let mut candidate = dir.join(format!("{stem}{ext}"));
    let mut n = 2;
    while candidate.exists() {
        candidate = dir.join(format!("{stem}-{n}{ext}"));
        n += 1;
    }
    candidate
}
