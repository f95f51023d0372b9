//! Flattening a node tree into one markdown string.

use bk_outline::{Node, Project};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static RE_MULTI_NEWLINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Collapse every run of three or more newlines to a single blank line.
pub fn clean_compile(text: &str) -> String {
    RE_MULTI_NEWLINE.replace_all(text, "\n\n").into_owned()
}

fn chapter_heading(title: &str) -> String {
    format!("\n\n## {title}\n\n")
}

/// Pre-order compiler. Chapter-role nodes get a level-2 heading before
/// their body.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    frontmatter: String,
    backmatter: String,
    only_compiled: bool,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frontmatter(mut self, text: impl Into<String>) -> Self {
        self.frontmatter = text.into();
        self
    }

    pub fn with_backmatter(mut self, text: impl Into<String>) -> Self {
        self.backmatter = text.into();
        self
    }

    /// Skip nodes (with their subtrees) whose compile flag chain is off.
    pub fn only_compiled(mut self, only_compiled: bool) -> Self {
        self.only_compiled = only_compiled;
        self
    }

    pub fn compile(&self, root: &Node) -> String {
        let mut out = self.frontmatter.clone();
        self.compile_node(root, &mut out);
        out.push_str(&self.backmatter);
        clean_compile(&out)
    }

    pub fn compile_project(&self, project: &Project) -> String {
        self.compile(project.outline())
    }

    fn compile_node(&self, node: &Node, out: &mut String) {
        if self.only_compiled && !node.is_compiled() {
            debug!(path = %node.path().display(), "excluded from compile");
            return;
        }
        if node.is_chapter() {
            out.push_str(&chapter_heading(&node.title()));
        }
        out.push_str(&node.body());
        for child in node.children() {
            self.compile_node(&child, out);
        }
    }
}
