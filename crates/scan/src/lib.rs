//! Directory scanning for codeprompt.
//!
//! This crate turns a codebase root into the structured scan output the
//! context assembler consumes: absolute root, printable source tree, and
//! an ordered `{path, code}` file list. It supports extension filters,
//! glob ignore patterns, a per-file byte ceiling, and pluggable viewers
//! for binary formats.

pub mod scanner;
pub mod tree;
pub mod viewer;

// Re-export main types
pub use scanner::{FileEntry, ScanOutput, Scanner};
pub use tree::tree_from_paths;
pub use viewer::{FileViewer, FnViewer};
