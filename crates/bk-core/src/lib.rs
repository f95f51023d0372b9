//! Shared building blocks for the bk outline tools: errors, clock,
//! configuration and the metadata header codec.

pub mod clock;
pub mod config;
pub mod error;
pub mod metadata;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::BookConfig;
pub use error::{BkError, Result};
pub use metadata::Metadata;
