//! Paragraph density rewrites applied to every body in a subtree.

use bk_core::error::Result;
use bk_outline::Node;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::{info, warn};

static RE_NEWLINE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n+").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// Every run of newlines becomes one newline.
    HardCrlf,
    /// Every newline is doubled.
    SoftCrlf,
}

impl Transform {
    pub fn apply(self, body: &str) -> String {
        match self {
            Transform::HardCrlf => RE_NEWLINE_RUN.replace_all(body, "\n").into_owned(),
            Transform::SoftCrlf => body.replace('\n', "\n\n"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformReport {
    pub visited: usize,
    pub rewritten: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

/// Apply `transform` to `node` and every descendant, pre-order.
///
/// Each node is re-read from disk first so an in-memory body never
/// overwrites a newer file. Missing files are skipped with a warning; any
/// other failure stops the walk with earlier rewrites left in place.
pub fn transform_tree(node: &Node, transform: Transform) -> Result<TransformReport> {
    let mut report = TransformReport::default();
    walk(node, transform, &mut report)?;
    Ok(report)
}

fn walk(node: &Node, transform: Transform, report: &mut TransformReport) -> Result<()> {
    report.visited += 1;
    match node.reload_file(true) {
        Ok(()) => {
            let body = node.body();
            let changed = transform.apply(&body);
            if changed != body {
                node.rewrite(None, Some(&changed))?;
                info!(path = %node.file_path().display(), ?transform, "body rewritten");
                report.rewritten.push(node.file_path());
            }
        }
        Err(e) if e.is_not_found() => {
            warn!(path = %node.file_path().display(), "file missing, skipping transform");
            report.skipped.push(node.file_path());
        }
        Err(e) => return Err(e),
    }
    for child in node.children() {
        walk(&child, transform, report)?;
    }
    Ok(())
}
