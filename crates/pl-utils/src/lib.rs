//! Shared helpers and error types for Pearl.

use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use thiserror::Error;

/// Result type for shared helpers.
pub type UtilsResult<T> = Result<T, UtilsError>;

/// Shared error variants for cross-crate helpers.
#[derive(Debug, Error)]
pub enum UtilsError {
    /// A parsing error occurred.
    #[error("parse error: {0}")]
    Parse(String),
}

/// Hour of the day at which "today" rolls over for todo journals.
pub const TODO_DAY_STARTS_AT: i64 = 4;

const TODO_SUFFIX: &str = ".todo.md";

/// Nearest ancestor of `start` (inclusive) that contains a `.git` entry.
pub fn find_repo_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
}

/// Repository root for a buffer, or the buffer's own directory outside a repository.
pub fn project_root(buffer: &Path) -> PathBuf {
    let dir = buffer.parent().unwrap_or(buffer);
    find_repo_root(dir).unwrap_or_else(|| dir.to_path_buf())
}

/// `path` relative to `root` when it lies inside it, unchanged otherwise.
pub fn display_relative(root: &Path, path: &str) -> String {
    Path::new(path)
        .strip_prefix(root)
        .map_or_else(|_| path.to_string(), |rel| rel.to_string_lossy().into_owned())
}

/// Absolute path of a repository-relative file.
pub fn absolute(root: &Path, relative: &str) -> String {
    root.join(relative).to_string_lossy().into_owned()
}

/// Journal date for a moment, treating the small hours as the previous day.
pub fn todo_date(now: NaiveDateTime) -> NaiveDate {
    (now - Duration::hours(TODO_DAY_STARTS_AT)).date()
}

/// File name of the journal for `date`, e.g. `3-7-2024.todo.md`.
pub fn todo_file_name(date: NaiveDate) -> String {
    format!("{}{TODO_SUFFIX}", date.format("%-m-%-d-%Y"))
}

/// Date encoded in a journal path.
pub fn parse_todo_date(path: &str) -> UtilsResult<NaiveDate> {
    let name = Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path);
    let stem = name
        .strip_suffix(TODO_SUFFIX)
        .ok_or_else(|| UtilsError::Parse(format!("{path} is not a todo journal")))?;
    NaiveDate::parse_from_str(stem, "%m-%d-%Y")
        .map_err(|err| UtilsError::Parse(format!("{stem}: {err}")))
}

/// Journal `days` away from the one most recently visited, or from today.
pub fn step_todo_date(most_recent: Option<&str>, now: NaiveDateTime, days: i64) -> NaiveDate {
    let base = most_recent
        .and_then(|path| parse_todo_date(path).ok())
        .unwrap_or_else(|| todo_date(now));
    base + Duration::days(days)
}
