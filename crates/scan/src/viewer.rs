//! Pluggable file viewers.

use codeprompt_core::AppResult;
use std::path::Path;

/// A custom viewer that turns a file the scanner cannot read as text
/// (docx, xlsx, pdf, ...) into a text surrogate for the prompt.
pub trait FileViewer: Send + Sync {
    /// Produce the text surrogate for `path`.
    fn view(&self, path: &Path) -> AppResult<String>;
}

/// Viewer built from a plain function.
pub struct FnViewer<F>(pub F);

impl<F> FileViewer for FnViewer<F>
where
    F: Fn(&Path) -> AppResult<String> + Send + Sync,
{
    fn view(&self, path: &Path) -> AppResult<String> {
        (self.0)(path)
    }
}
