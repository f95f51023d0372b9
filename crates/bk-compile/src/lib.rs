//! Turning an outline into a manuscript: the single-document compiler,
//! body whitespace transforms and the ebook converter invocation.

pub mod compiler;
pub mod export;
pub mod transform;

pub use compiler::{clean_compile, Compiler};
pub use export::EbookExport;
pub use transform::{transform_tree, Transform, TransformReport};

#[cfg(test)]
mod tests;
