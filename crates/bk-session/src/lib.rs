//! Writing-session tracking: words written against a goal, and periodic
//! version-control snapshots once the tree has been quiet for a while.

pub mod session;
pub mod snapshot;

pub use session::{Session, SessionStatus, SessionThresholds, DEFAULT_GOAL};
pub use snapshot::{snapshot_message, GitSnapshotter, Snapshotter};
