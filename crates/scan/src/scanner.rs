//! Directory scanner.
//!
//! Turns a codebase root into the structured input the context assembler
//! consumes: the absolute root, a printable source tree, and an ordered
//! `{path, code}` list. Traversal order is deterministic (sorted relative
//! paths).

use crate::tree::tree_from_paths;
use crate::viewer::FileViewer;
use codeprompt_core::{AppConfig, AppError, AppResult};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

/// One scanned file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the scan root, `/`-separated
    pub path: String,
    /// File content (possibly truncated, or a viewer surrogate)
    pub code: String,
}

/// Output of a directory scan.
#[derive(Debug, Clone)]
pub struct ScanOutput {
    /// Absolute scan root
    pub absolute_root: PathBuf,
    /// Printable directory tree
    pub tree_text: String,
    /// Scanned files in sorted path order
    pub files: Vec<FileEntry>,
}

/// Directory scanner with extension filtering, ignore patterns, a byte
/// ceiling, and pluggable per-extension viewers.
pub struct Scanner {
    extensions: Vec<String>,
    ignore: Vec<String>,
    max_bytes: Option<usize>,
    viewers: HashMap<String, Box<dyn FileViewer>>,
}

impl Scanner {
    /// Create a scanner from explicit settings.
    ///
    /// `extensions` are without the leading dot; an empty list includes
    /// every file. `max_bytes` of `None` disables truncation.
    pub fn new(extensions: Vec<String>, ignore: Vec<String>, max_bytes: Option<usize>) -> Self {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            ignore,
            max_bytes,
            viewers: HashMap::new(),
        }
    }

    /// Create a scanner from the application configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.extensions.clone(),
            config.ignore.clone(),
            config.max_bytes_per_file,
        )
    }

    /// Register a custom viewer for an extension (e.g. "pdf", "docx").
    ///
    /// The viewer substitutes a text surrogate for matching files, and
    /// ignore patterns that would exclude that extension are dropped.
    pub fn register_viewer(&mut self, extension: impl Into<String>, viewer: Box<dyn FileViewer>) {
        let ext = extension.into().trim_start_matches('.').to_lowercase();
        tracing::debug!("Viewer registered for .{}", ext);
        self.viewers.insert(ext, viewer);
    }

    /// Scan a directory root.
    pub fn scan(&self, root: &Path) -> AppResult<ScanOutput> {
        let absolute_root = root
            .canonicalize()
            .map_err(|e| AppError::Config(format!("Cannot resolve scan root {:?}: {}", root, e)))?;

        let ignore_set = self.build_ignore_set()?;

        let mut relative_paths = Vec::new();
        for entry in walkdir::WalkDir::new(&absolute_root)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&absolute_root)
                .unwrap_or(entry.path());
            let relative_str = relative.to_string_lossy().replace('\\', "/");

            if ignore_set.is_match(&relative_str) {
                continue;
            }

            let extension = extension_of(&relative_str);
            if !self.extensions.is_empty() && !self.extensions.contains(&extension) {
                continue;
            }

            relative_paths.push(relative_str);
        }

        // Deterministic traversal order
        relative_paths.sort();

        let mut files = Vec::with_capacity(relative_paths.len());
        for relative_str in &relative_paths {
            let full_path = absolute_root.join(relative_str);
            let extension = extension_of(relative_str);

            let code = if let Some(viewer) = self.viewers.get(&extension) {
                tracing::debug!("Using custom viewer for {}", relative_str);
                viewer.view(&full_path)?
            } else {
                read_content(&full_path, self.max_bytes)?
            };

            files.push(FileEntry {
                path: relative_str.clone(),
                code,
            });
        }

        let tree_text = tree_from_paths(&relative_paths);
        tracing::info!(
            "Scanned {:?}: {} file(s)",
            absolute_root,
            files.len()
        );

        Ok(ScanOutput {
            absolute_root,
            tree_text,
            files,
        })
    }

    /// Compile the ignore patterns, dropping extension patterns that a
    /// registered viewer should handle (`**/*.pdf` with a pdf viewer).
    fn build_ignore_set(&self) -> AppResult<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.ignore {
            if let Some(ext) = pattern.strip_prefix("**/*.") {
                if self.viewers.contains_key(&ext.to_lowercase()) {
                    tracing::debug!("Ignore pattern {} dropped: viewer registered", pattern);
                    continue;
                }
            }
            let glob = Glob::new(pattern).map_err(|e| {
                AppError::Config(format!("Invalid ignore pattern '{}': {}", pattern, e))
            })?;
            builder.add(glob);
        }
        builder
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build ignore set: {}", e)))
    }
}

fn extension_of(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Read file content, truncated to `max_bytes` when set. Invalid UTF-8
/// is replaced rather than failing the whole scan.
fn read_content(path: &Path, max_bytes: Option<usize>) -> AppResult<String> {
    let bytes = match max_bytes {
        Some(max) => {
            let file = std::fs::File::open(path)?;
            let mut buffer = Vec::with_capacity(max.min(64 * 1024));
            file.take(max as u64).read_to_end(&mut buffer)?;
            buffer
        }
        None => std::fs::read(path)?,
    };
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
