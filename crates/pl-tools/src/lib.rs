//! External command-line tools: version control listing and project text search.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use pl_core::{CoreError, CoreResult, SearchHit, TextSearch, VersionControl};
use thiserror::Error;
use tracing::{debug, warn};

/// Result type for tool invocations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Failures while running an external program.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with status {status}")]
    Status { program: String, status: String },
    #[error("{program} produced invalid UTF-8 output")]
    Utf8 { program: String },
    #[error("background task failed: {0}")]
    Join(String),
}

impl From<ToolError> for CoreError {
    fn from(err: ToolError) -> Self {
        CoreError::Tool(err.to_string())
    }
}

/// Lists repository files through the `git` executable.
#[derive(Debug, Default, Clone)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }

    fn ls_files(&self, root: &Path, extra: &[&str]) -> CoreResult<Vec<String>> {
        let root = root.to_string_lossy();
        let mut args = vec!["-C", &*root, "ls-files"];
        args.extend_from_slice(extra);
        let output = run_command("git", &args, &[])?;
        Ok(non_empty_lines(&output))
    }
}

impl VersionControl for GitCli {
    fn tracked_files(&self, root: &Path) -> CoreResult<Vec<String>> {
        self.ls_files(root, &[])
    }

    fn untracked_files(&self, root: &Path) -> CoreResult<Vec<String>> {
        self.ls_files(root, &["--others", "--exclude-standard"])
    }
}

/// Project search through a `--vimgrep` compatible program such as `ag`.
#[derive(Debug, Clone)]
pub struct SilverSearcher {
    program: String,
}

impl Default for SilverSearcher {
    fn default() -> Self {
        Self::new("ag")
    }
}

impl SilverSearcher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl TextSearch for SilverSearcher {
    fn search(&self, query: &str, root: &Path) -> CoreResult<Vec<SearchHit>> {
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let root = root.to_string_lossy();
        // Exit status 1 means "no matches".
        let output = run_command(&self.program, &["--vimgrep", query, &*root], &[1])?;
        let hits: Vec<SearchHit> = output.lines().filter_map(parse_vimgrep_line).collect();
        debug!(query, hits = hits.len(), "text search finished");
        Ok(dedupe_hits(hits))
    }
}

/// Parse one `path:row:col:text` line; `col` is 1-based in the input.
pub fn parse_vimgrep_line(line: &str) -> Option<SearchHit> {
    let mut parts = line.splitn(4, ':');
    let path = parts.next().filter(|path| !path.is_empty());
    let row = parts.next().and_then(|row| row.parse::<u64>().ok());
    let col = parts.next().and_then(|col| col.parse::<u64>().ok());
    let text = parts.next();
    match (path, row, col, text) {
        (Some(path), Some(row), Some(col), Some(text)) if row > 0 && col > 0 => Some(SearchHit {
            path: path.to_string(),
            row,
            col: col - 1,
            line: text.to_string(),
        }),
        _ => {
            debug!(line, "dropping malformed search output");
            None
        }
    }
}

/// Collapse consecutive hits on the same `path:row`, keeping the first.
pub fn dedupe_hits(mut hits: Vec<SearchHit>) -> Vec<SearchHit> {
    hits.dedup_by(|next, kept| next.path == kept.path && next.row == kept.row);
    hits
}

/// Run `search` on the blocking pool so the UI loop keeps polling keys.
pub async fn search_in_background(
    search: Arc<dyn TextSearch + Send + Sync>,
    query: String,
    root: PathBuf,
) -> CoreResult<Vec<SearchHit>> {
    tokio::task::spawn_blocking(move || search.search(&query, &root))
        .await
        .map_err(|err| ToolError::Join(err.to_string()))?
}

fn non_empty_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Run a program and capture stdout. A missing executable yields empty output.
fn run_command(program: &str, args: &[&str], quiet_codes: &[i32]) -> ToolResult<String> {
    let output = match Command::new(program).args(args).output() {
        Ok(output) => output,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!(program, "executable not found");
            return Ok(String::new());
        }
        Err(source) => {
            return Err(ToolError::Spawn {
                program: program.to_string(),
                source,
            })
        }
    };

    let quiet = output
        .status
        .code()
        .is_some_and(|code| quiet_codes.contains(&code));
    if !output.status.success() && !quiet {
        return Err(ToolError::Status {
            program: program.to_string(),
            status: output.status.to_string(),
        });
    }

    String::from_utf8(output.stdout).map_err(|_| ToolError::Utf8 {
        program: program.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(path: &str, row: u64, col: u64, line: &str) -> SearchHit {
        SearchHit {
            path: path.into(),
            row,
            col,
            line: line.into(),
        }
    }

    #[test]
    fn parses_vimgrep_lines_with_zero_based_columns() {
        assert_eq!(
            parse_vimgrep_line("/repo/src/main.rs:12:5:    let x = a:b;"),
            Some(hit("/repo/src/main.rs", 12, 4, "    let x = a:b;"))
        );
    }

    #[test]
    fn keeps_empty_match_text() {
        assert_eq!(parse_vimgrep_line("a.rs:1:1:"), Some(hit("a.rs", 1, 0, "")));
    }

    #[test]
    fn drops_malformed_lines() {
        for line in ["", "no colons here", "a.rs:x:1:text", "a.rs:3:text", "a.rs:0:1:t", ":1:1:t"] {
            assert_eq!(parse_vimgrep_line(line), None, "{line:?}");
        }
    }

    #[test]
    fn collapses_consecutive_hits_on_one_row() {
        let hits = vec![
            hit("a.rs", 1, 0, "foo foo"),
            hit("a.rs", 1, 4, "foo foo"),
            hit("a.rs", 2, 0, "foo"),
            hit("b.rs", 2, 0, "foo"),
            hit("a.rs", 1, 0, "foo foo"),
        ];
        let deduped = dedupe_hits(hits);
        assert_eq!(deduped.len(), 4);
        assert_eq!(deduped[0].col, 0);
        assert_eq!(deduped[1].row, 2);
    }

    #[test]
    fn missing_program_yields_no_hits() {
        let search = SilverSearcher::new("pearl-no-such-search-tool");
        let hits = search.search("needle", Path::new("/")).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn empty_query_does_not_spawn() {
        let search = SilverSearcher::new("pearl-no-such-search-tool");
        assert!(search.search("", Path::new("/")).unwrap().is_empty());
    }

    struct Canned;

    impl TextSearch for Canned {
        fn search(&self, query: &str, root: &Path) -> CoreResult<Vec<SearchHit>> {
            Ok(vec![hit(&root.join("x.rs").to_string_lossy(), 1, 0, query)])
        }
    }

    #[tokio::test]
    async fn background_search_returns_hits() {
        let hits = search_in_background(Arc::new(Canned), "needle".into(), PathBuf::from("/r"))
            .await
            .unwrap();
        assert_eq!(hits, vec![hit("/r/x.rs", 1, 0, "needle")]);
    }

    #[test]
    fn git_lists_files_of_a_fresh_repository() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let initialised = Command::new("git")
            .args(["init", "-q"])
            .current_dir(temp.path())
            .status()
            .map(|status| status.success())
            .unwrap_or(false);
        if !initialised {
            return;
        }
        std::fs::write(temp.path().join("notes.txt"), "hi").unwrap();

        let git = GitCli::new();
        assert!(git.tracked_files(temp.path()).unwrap().is_empty());
        assert_eq!(git.untracked_files(temp.path()).unwrap(), vec!["notes.txt"]);
    }
}
