//! The outline tree of a writing project: root, folders and scenes backed
//! by a directory of small text files, plus the project wrapper and the
//! filename normalizer.

pub mod node;
pub mod paths;
pub mod project;
pub mod rename;

pub use node::{CreateOptions, Node, NodeKind, NodeOptions, StructuralRole, CACHE_TTL};
pub use project::{Project, ProjectStats, StatsRow};
pub use rename::{auto_rename, RenameOp};
