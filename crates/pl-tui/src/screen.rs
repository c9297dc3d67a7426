//! State of an active search screen: query, candidates, filtered rows and viewport.

use std::path::{Path, PathBuf};

use pl_core::{
    exact_filter, fuzzy_filter, Cursor, Highlighter, Match, SearchHit, Viewport,
};
use pl_utils::{absolute, display_relative};

use crate::input::TextInput;

/// Where committing or previewing the highlighted row goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub path: String,
    pub cursor: Option<Cursor>,
    /// Whether the file has to be (re)loaded, as opposed to moving inside the current buffer.
    pub reload: bool,
}

#[derive(Debug, Clone)]
enum Source {
    /// Repository-relative file names.
    Files { root: PathBuf, files: Vec<String> },
    /// Lines of the buffer the palette was opened over.
    Lines {
        buffer: String,
        lines: Vec<String>,
        cursor_line: usize,
        scroll_fraction: f64,
    },
    /// Text-search hits for `query`.
    Hits {
        root: PathBuf,
        query: String,
        hits: Vec<SearchHit>,
    },
}

/// A search screen.
#[derive(Debug, Clone)]
pub struct Screen {
    input: TextInput,
    source: Source,
    results: Vec<Match>,
    view: Viewport,
}

impl Screen {
    /// File list screen over names relative to `root`.
    pub fn files(root: PathBuf, files: Vec<String>) -> Self {
        let mut screen = Self::with_source(Source::Files { root, files });
        screen.refilter(0, 0);
        screen
    }

    /// Recently visited absolute names, shown relative to `root`.
    pub fn recent(root: PathBuf, recent: &[String]) -> Self {
        let files = recent
            .iter()
            .skip(1)
            .map(|name| display_relative(&root, name))
            .collect();
        Self::files(root, files)
    }

    /// In-buffer line search. `cursor_line` is 0-based.
    pub fn lines(
        buffer: String,
        lines: Vec<String>,
        cursor_line: usize,
        scroll_fraction: f64,
    ) -> Self {
        Self::with_source(Source::Lines {
            buffer,
            lines,
            cursor_line,
            scroll_fraction,
        })
    }

    /// Project search, empty until the first results arrive.
    pub fn grep(root: PathBuf) -> Self {
        Self::with_source(Source::Hits {
            root,
            query: String::new(),
            hits: Vec::new(),
        })
    }

    fn with_source(source: Source) -> Self {
        Self {
            input: TextInput::default(),
            source,
            results: Vec::new(),
            view: Viewport::default(),
        }
    }

    /// Query being typed.
    pub fn input(&self) -> &TextInput {
        &self.input
    }

    /// Query for editing.
    pub fn input_mut(&mut self) -> &mut TextInput {
        &mut self.input
    }

    /// Rows matching the current query.
    pub fn results(&self) -> &[Match] {
        &self.results
    }

    /// Highlight and scroll position.
    pub fn view(&self) -> Viewport {
        self.view
    }

    /// Repository root the screen resolves names against.
    pub fn root(&self) -> Option<&Path> {
        match &self.source {
            Source::Files { root, .. } | Source::Hits { root, .. } => Some(root),
            Source::Lines { .. } => None,
        }
    }

    /// Result rows that fit in `available_rows`.
    pub fn visible(&self, available_rows: usize, reserved_rows: usize) -> usize {
        Viewport::visible_count(available_rows, reserved_rows, self.results.len())
    }

    /// Recompute rows for the current query and reposition the selection.
    pub fn refilter(&mut self, available_rows: usize, reserved_rows: usize) {
        let query = self.input.content().to_string();
        match &self.source {
            Source::Files { files, .. } => {
                self.results = fuzzy_filter(&query, files);
                self.view = Viewport::default();
            }
            Source::Lines {
                lines,
                cursor_line,
                scroll_fraction,
                ..
            } => {
                self.results = exact_filter(&query, lines, true);
                let indices: Vec<usize> = self.results.iter().map(|row| row.index).collect();
                let visible = Viewport::visible_count(available_rows, reserved_rows, indices.len());
                self.view = Viewport::anchored(
                    &indices,
                    *cursor_line,
                    *scroll_fraction,
                    available_rows,
                    visible,
                );
            }
            Source::Hits { .. } => {}
        }
    }

    /// Query the project search should run next; `None` for other screens.
    pub fn search_query(&self) -> Option<&str> {
        matches!(self.source, Source::Hits { .. }).then(|| self.input.content())
    }

    /// Install search results if they answer the latest query.
    ///
    /// Returns `false` when the results are stale and were dropped.
    pub fn accept_hits(&mut self, query: &str, hits: Vec<SearchHit>) -> bool {
        if query != self.input.content() {
            return false;
        }
        let Source::Hits {
            root,
            query: shown,
            hits: stored,
        } = &mut self.source
        else {
            return false;
        };
        let highlighter = Highlighter::new(query);
        self.results = hits
            .iter()
            .enumerate()
            .map(|(index, hit)| Match {
                index,
                offset: usize::try_from(hit.col).unwrap_or(0),
                pieces: highlighter.pieces(
                    &format!("{}:{} ", display_relative(root, &hit.path), hit.row),
                    &hit.line,
                ),
            })
            .collect();
        *shown = query.to_string();
        *stored = hits;
        self.view = Viewport::default();
        true
    }

    /// Drop all hits, used when the query is cleared.
    pub fn clear_hits(&mut self) {
        if let Source::Hits { query, hits, .. } = &mut self.source {
            query.clear();
            hits.clear();
            self.results.clear();
            self.view = Viewport::default();
        }
    }

    /// Highlight the next row.
    pub fn move_down(&mut self, visible: usize) {
        self.view.move_down(self.results.len(), visible);
    }

    /// Highlight the previous row.
    pub fn move_up(&mut self, visible: usize) {
        self.view.move_up(self.results.len(), visible);
    }

    /// Keep the selection on screen after the terminal was resized.
    pub fn clamp(&mut self, visible: usize) {
        self.view.clamp(self.results.len(), visible);
    }

    /// Buffer line under the highlight, 0-based; only for the in-buffer screen.
    pub fn highlighted_line(&self) -> Option<usize> {
        match self.source {
            Source::Lines { .. } => self.results.get(self.view.highlight).map(|row| row.index),
            _ => None,
        }
    }

    /// Target of the highlighted row.
    pub fn target(&self) -> Option<Target> {
        let row = self.results.get(self.view.highlight)?;
        let target = match &self.source {
            Source::Files { root, files } => Target {
                path: absolute(root, files.get(row.index)?),
                cursor: None,
                reload: true,
            },
            Source::Lines { buffer, .. } => Target {
                path: buffer.clone(),
                cursor: Some(Cursor::new(row.index as u64 + 1, row.offset as u64)),
                reload: false,
            },
            Source::Hits { hits, .. } => {
                let hit = hits.get(row.index)?;
                Target {
                    path: hit.path.clone(),
                    cursor: Some(Cursor::new(hit.row, hit.col)),
                    reload: true,
                }
            }
        };
        Some(target)
    }
}
