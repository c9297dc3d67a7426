//! Core domain entities, navigation rules, and collaborator traits for Pearl.

use std::path::Path;

use thiserror::Error;

pub mod events;
pub mod filter;
pub mod session;
pub mod tree;
pub mod viewport;

pub use events::{Subscriptions, Token};
pub use filter::{exact_filter, fuzzy_filter, Highlighter, Match, Piece, PieceKind};
pub use session::{Session, Tab, TabLine};
pub use tree::{command_tree, Action, Command, Dispatcher, Key, Node, Outcome, ScreenKind};
pub use viewport::{Viewport, RESERVED_ROWS};

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors returned by collaborators at the core boundary.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The editor control plane could not be reached.
    #[error("connection error: {0}")]
    Connection(String),
    /// The editor rejected a request.
    #[error("editor error: {0}")]
    Editor(String),
    /// An external tool failed to run.
    #[error("tool error: {0}")]
    Tool(String),
}

/// A window cursor: 1-based row, 0-based byte column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cursor {
    pub row: u64,
    pub col: u64,
}

impl Cursor {
    pub fn new(row: u64, col: u64) -> Self {
        Self { row, col }
    }
}

/// A file path plus an optional cursor position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    /// Absolute path of the buffer.
    pub name: String,
    /// Cursor to restore when the location is revisited.
    pub cursor: Option<Cursor>,
}

impl Location {
    pub fn new(name: impl Into<String>, cursor: Option<Cursor>) -> Self {
        Self {
            name: name.into(),
            cursor,
        }
    }

    /// Final path component, used for compact tab summaries.
    pub fn basename(&self) -> &str {
        Path::new(&self.name)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.name)
    }
}

/// Window geometry reported by the editor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowMetrics {
    /// Height of the current window in rows.
    pub height: u64,
    /// Screen row of the cursor inside the window, 1-based.
    pub winline: u64,
}

impl WindowMetrics {
    /// How far down the window the cursor sits, in `0.0..=1.0`.
    pub fn scroll_fraction(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let fraction = self.winline as f64 / self.height as f64;
        fraction.clamp(0.0, 1.0)
    }
}

/// One hit reported by the text-search tool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchHit {
    /// Absolute path of the file containing the hit.
    pub path: String,
    /// 1-based line number.
    pub row: u64,
    /// 0-based column of the match.
    pub col: u64,
    /// Full text of the matching line.
    pub line: String,
}

/// Control plane of the running editor.
pub trait EditorControl {
    /// Cursor of the current window.
    fn cursor(&mut self) -> CoreResult<Cursor>;
    /// Absolute name of the current buffer.
    fn buffer_name(&mut self) -> CoreResult<String>;
    /// All lines of the current buffer.
    fn buffer_lines(&mut self) -> CoreResult<Vec<String>>;
    /// Move the cursor of the current window.
    fn set_cursor(&mut self, cursor: Cursor) -> CoreResult<()>;
    /// Edit a file, discarding unsaved changes, optionally at a line.
    fn edit_file(&mut self, path: &str, line: Option<u64>) -> CoreResult<()>;
    /// Run an ex command.
    fn command(&mut self, command: &str) -> CoreResult<()>;
    /// Geometry of the current window.
    fn window_metrics(&mut self) -> CoreResult<WindowMetrics>;
    /// Set a global variable to a string value.
    fn set_var(&mut self, name: &str, value: &str) -> CoreResult<()>;
}

/// Version-control listing of a repository.
pub trait VersionControl {
    /// Files tracked by the repository, relative to `root`.
    fn tracked_files(&self, root: &Path) -> CoreResult<Vec<String>>;
    /// Files present in the work tree but not tracked, relative to `root`.
    fn untracked_files(&self, root: &Path) -> CoreResult<Vec<String>>;
}

/// Project-wide text search.
pub trait TextSearch {
    /// Search `root` for `query`, in tool order.
    fn search(&self, query: &str, root: &Path) -> CoreResult<Vec<SearchHit>>;
}

/// Untracked files first, then tracked ones, each path listed once.
pub fn project_files(vcs: &dyn VersionControl, root: &Path) -> CoreResult<Vec<String>> {
    let mut files = vcs.untracked_files(root)?;
    files.extend(vcs.tracked_files(root)?);
    let mut seen = std::collections::HashSet::new();
    files.retain(|file| seen.insert(file.clone()));
    Ok(files)
}
