//! Palette state machine: routes keys through the command tree into screens and actions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use pl_core::{
    command_tree, project_files, Action, Command, CoreResult, Dispatcher, EditorControl, Key,
    Location, Outcome, ScreenKind, SearchHit, Session, Subscriptions, TextSearch, Token,
    VersionControl, RESERVED_ROWS,
};
use pl_utils::{project_root, step_todo_date, todo_date, todo_file_name};
use tracing::{debug, info, warn};

use crate::bridge::BridgeMessage;
use crate::screen::{Screen, Target};

/// Work finished off the UI thread.
#[derive(Debug)]
pub enum AppEvent {
    Bridge(BridgeMessage),
    SearchFinished {
        query: String,
        result: CoreResult<Vec<SearchHit>>,
    },
}

/// A project search the run loop should launch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub root: PathBuf,
}

/// Where the palette gets the current time for todo journals.
pub type Clock = fn() -> NaiveDateTime;

fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Collaborators and settings the palette runs with.
pub struct Services {
    pub vcs: Arc<dyn VersionControl + Send + Sync>,
    pub search: Arc<dyn TextSearch + Send + Sync>,
    pub todo_dir: PathBuf,
    pub reserved_rows: usize,
}

pub struct App<E> {
    editor: E,
    vcs: Arc<dyn VersionControl + Send + Sync>,
    search: Arc<dyn TextSearch + Send + Sync>,
    session: Session,
    dispatcher: Dispatcher,
    screen: Option<Screen>,
    outgoing: Subscriptions<BridgeMessage>,
    pending_search: Option<SearchRequest>,
    todo_dir: PathBuf,
    reserved_rows: usize,
    rows: usize,
    status: Option<String>,
    clock: Clock,
}

impl<E: EditorControl> App<E> {
    /// A palette at the root menu with an empty session.
    pub fn new(editor: E, services: Services) -> Self {
        Self {
            editor,
            vcs: services.vcs,
            search: services.search,
            session: Session::new(),
            dispatcher: Dispatcher::new(command_tree()),
            screen: None,
            outgoing: Subscriptions::new(),
            pending_search: None,
            todo_dir: services.todo_dir,
            reserved_rows: services.reserved_rows,
            rows: 0,
            status: None,
            clock: local_now,
        }
    }

    /// Replace the wall clock used for todo journal dates.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// The editor the palette drives.
    pub fn editor(&self) -> &E {
        &self.editor
    }

    /// Navigation state.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Position in the command tree.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The open search screen, if a screen leaf is active.
    pub fn screen(&self) -> Option<&Screen> {
        self.screen.as_ref()
    }

    /// Last error shown on the status line.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Rows kept for chrome around the result list.
    pub fn reserved_rows(&self) -> usize {
        self.reserved_rows
    }

    /// Text search used for the project grep screen.
    pub fn search_backend(&self) -> Arc<dyn TextSearch + Send + Sync> {
        Arc::clone(&self.search)
    }

    /// Subscribe to messages meant for the looking-glass launcher.
    pub fn on_outgoing(&mut self, handler: impl FnMut(&BridgeMessage) + Send + 'static) -> Token {
        self.outgoing.subscribe(handler)
    }

    /// Search queued by the last query change, if any.
    pub fn take_search_request(&mut self) -> Option<SearchRequest> {
        self.pending_search.take()
    }

    /// Rows available to the palette, including its chrome.
    pub fn resize(&mut self, rows: usize) {
        self.rows = rows;
        let visible = self.visible();
        if let Some(screen) = self.screen.as_mut() {
            screen.clamp(visible);
        }
    }

    fn visible(&self) -> usize {
        self.screen
            .as_ref()
            .map_or(0, |screen| screen.visible(self.rows, self.reserved_rows))
    }

    /// Feed one key; failures are logged and shown on the status line.
    pub fn handle_key(&mut self, key: Key) {
        if let Err(err) = self.dispatch_key(key) {
            warn!(error = %format!("{err:#}"), "command failed");
            self.status = Some(format!("{err:#}"));
        }
    }

    fn dispatch_key(&mut self, key: Key) -> Result<()> {
        match self.dispatcher.handle_key(key) {
            Outcome::Ignored | Outcome::Descended => Ok(()),
            Outcome::Activated(Command::Screen(kind)) => {
                self.status = None;
                let opened = self.open_screen(kind);
                if opened.is_err() {
                    self.dispatcher.unwind();
                }
                opened
            }
            Outcome::Activated(Command::Action(action)) => {
                self.status = None;
                match self.run_action(action) {
                    Ok(()) => {
                        self.reset();
                        Ok(())
                    }
                    Err(err) => {
                        self.dispatcher.unwind();
                        Err(err)
                    }
                }
            }
            Outcome::Forward(key) => self.screen_key(key),
            Outcome::Escaped(entry) => self.escape(entry),
        }
    }

    /// Apply an event produced by a background task. Returns `true` when the process should exit.
    pub fn handle_event(&mut self, event: AppEvent) -> bool {
        match event {
            AppEvent::Bridge(message) => match self.handle_bridge(message) {
                Ok(exit) => exit,
                Err(err) => {
                    warn!(error = %format!("{err:#}"), ?message, "bridge message failed");
                    false
                }
            },
            AppEvent::SearchFinished { query, result } => {
                self.finish_search(&query, result);
                false
            }
        }
    }

    fn handle_bridge(&mut self, message: BridgeMessage) -> Result<bool> {
        match message {
            BridgeMessage::Open => {
                self.outgoing.publish(&message);
                let name = self.editor.buffer_name()?;
                let cursor = self.editor.cursor()?;
                self.dispatcher.capture_entry(Location::new(name, Some(cursor)));
            }
            BridgeMessage::Enter => {
                if self.dispatcher.entry().is_none() {
                    let name = self.editor.buffer_name()?;
                    if !name.is_empty() && self.session.push_location(Some(name.as_str()), None) {
                        self.sync_tab_line()?;
                    }
                }
            }
            BridgeMessage::Close => debug!("editor wrapper closed"),
            BridgeMessage::Exit => {
                self.outgoing.publish(&message);
                info!("editor exited");
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn finish_search(&mut self, query: &str, result: CoreResult<Vec<SearchHit>>) {
        let Some(screen) = self.screen.as_mut() else {
            return;
        };
        match result {
            Ok(hits) => {
                let count = hits.len();
                if screen.accept_hits(query, hits) {
                    debug!(query, count, "search results applied");
                } else {
                    debug!(query, "discarding stale search results");
                }
            }
            Err(err) if screen.search_query() == Some(query) => {
                warn!(%err, query, "text search failed");
                self.status = Some(err.to_string());
            }
            Err(_) => {}
        }
    }

    fn open_screen(&mut self, kind: ScreenKind) -> Result<()> {
        let screen = match kind {
            ScreenKind::ProjectFiles => {
                let root = self.buffer_root()?;
                let files = project_files(self.vcs.as_ref(), &root)
                    .with_context(|| format!("failed to list files in {}", root.display()))?;
                Screen::files(root, files)
            }
            ScreenKind::Recent => Screen::recent(self.buffer_root()?, self.session.recent()),
            ScreenKind::BufferLines => {
                let buffer = self.editor.buffer_name()?;
                let lines = self.editor.buffer_lines()?;
                let metrics = self.editor.window_metrics()?;
                let cursor = self.editor.cursor()?;
                let cursor_line = usize::try_from(cursor.row.saturating_sub(1)).unwrap_or(0);
                let mut screen =
                    Screen::lines(buffer, lines, cursor_line, metrics.scroll_fraction());
                screen.refilter(self.rows, self.reserved_rows);
                screen
            }
            ScreenKind::ProjectSearch => Screen::grep(self.buffer_root()?),
        };
        debug!(?kind, rows = screen.results().len(), "opened screen");
        self.screen = Some(screen);
        Ok(())
    }

    fn buffer_root(&mut self) -> Result<PathBuf> {
        let buffer = self.editor.buffer_name()?;
        Ok(project_root(Path::new(&buffer)))
    }

    fn screen_key(&mut self, key: Key) -> Result<()> {
        let visible = self.visible();
        let Some(screen) = self.screen.as_mut() else {
            return Ok(());
        };
        let before = screen.highlighted_line();
        match key {
            Key::Up => screen.move_up(visible),
            Key::Down => screen.move_down(visible),
            Key::Enter => return self.commit(),
            Key::Tab => return self.preview(),
            Key::BackTab => return self.split(),
            Key::ShiftRight => return self.split_and_focus(),
            Key::Left => screen.input_mut().move_left(),
            Key::Right => screen.input_mut().move_right(),
            Key::Home => screen.input_mut().move_home(),
            Key::End => screen.input_mut().move_end(),
            Key::Backspace => {
                screen.input_mut().delete_back();
                self.query_changed();
            }
            Key::Space => {
                screen.input_mut().insert(' ');
                self.query_changed();
            }
            Key::Char(c) => {
                screen.input_mut().insert(c);
                self.query_changed();
            }
            Key::Escape => {}
        }
        self.preview_line_if_moved(before)
    }

    fn query_changed(&mut self) {
        let (rows, reserved) = (self.rows, self.reserved_rows);
        let Some(screen) = self.screen.as_mut() else {
            return;
        };
        match screen.search_query().map(str::to_string) {
            Some(query) if query.is_empty() => {
                screen.clear_hits();
                self.pending_search = None;
            }
            Some(query) => {
                if let Some(root) = screen.root().map(Path::to_path_buf) {
                    self.pending_search = Some(SearchRequest { query, root });
                }
            }
            None => screen.refilter(rows, reserved),
        }
    }

    /// Show the highlighted line in the editor when the in-buffer selection moved.
    fn preview_line_if_moved(&mut self, before: Option<usize>) -> Result<()> {
        let after = self.screen.as_ref().and_then(Screen::highlighted_line);
        match after {
            Some(line) if after != before => {
                self.editor.command(&(line + 1).to_string())?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn target(&self) -> Option<Target> {
        self.screen.as_ref().and_then(Screen::target)
    }

    fn commit(&mut self) -> Result<()> {
        let Some(target) = self.target() else {
            return Ok(());
        };
        self.go_to(&target)?;
        self.session.push_location(Some(target.path.as_str()), target.cursor);
        info!(path = %target.path, "committed");
        self.reset();
        Ok(())
    }

    fn preview(&mut self) -> Result<()> {
        let Some(target) = self.target() else {
            return Ok(());
        };
        self.go_to(&target)
    }

    fn go_to(&mut self, target: &Target) -> Result<()> {
        if target.reload {
            self.editor
                .edit_file(&target.path, target.cursor.map(|cursor| cursor.row))?;
        }
        if let Some(cursor) = target.cursor {
            self.editor.set_cursor(cursor)?;
        }
        Ok(())
    }

    fn split(&mut self) -> Result<()> {
        let Some(target) = self.target() else {
            return Ok(());
        };
        let current = self.editor.buffer_name()?;
        let before = self.session.clone();
        self.session.split(&current, &target.path, target.cursor);
        if let Err(err) = self.sync_tab_line() {
            self.session = before;
            return Err(err);
        }
        Ok(())
    }

    fn split_and_focus(&mut self) -> Result<()> {
        let Some(target) = self.target() else {
            return Ok(());
        };
        let current = self.editor.buffer_name()?;
        self.session
            .split_and_focus(&mut self.editor, &current, &target.path, target.cursor)?;
        self.reset();
        Ok(())
    }

    fn run_action(&mut self, action: Action) -> Result<()> {
        match action {
            Action::PrevHistory => self.session.move_history(&mut self.editor, -1).map(drop)?,
            Action::NextHistory => self.session.move_history(&mut self.editor, 1).map(drop)?,
            Action::Alternate => self.session.toggle_alternate(&mut self.editor).map(drop)?,
            Action::PrevTab => self.session.move_tab(&mut self.editor, -1, false).map(drop)?,
            Action::NextTab => self.session.move_tab(&mut self.editor, 1, false).map(drop)?,
            Action::KillTab => self.session.close_active_tab(&mut self.editor).map(drop)?,
            Action::Editor(command) => self
                .editor
                .command(command)
                .with_context(|| format!("`{command}` failed"))?,
            Action::TodayTodos => {
                let date = todo_date((self.clock)());
                self.open_todo(&todo_file_name(date))?;
            }
            Action::StepTodos(days) => {
                let most_recent = self.session.recent().first().map(String::as_str);
                let date = step_todo_date(most_recent, (self.clock)(), days);
                self.open_todo(&todo_file_name(date))?;
            }
        }
        debug!(?action, "action finished");
        Ok(())
    }

    fn open_todo(&mut self, file_name: &str) -> Result<()> {
        let path = self.todo_dir.join(file_name).to_string_lossy().into_owned();
        self.editor.edit_file(&path, None)?;
        self.session.push_location(Some(path.as_str()), None);
        Ok(())
    }

    fn escape(&mut self, entry: Option<Location>) -> Result<()> {
        let restored = match entry {
            Some(entry) if !entry.name.is_empty() => self.restore(&entry),
            _ => Ok(()),
        };
        self.reset();
        restored
    }

    fn restore(&mut self, entry: &Location) -> Result<()> {
        self.editor.edit_file(&entry.name, None)?;
        if let Some(cursor) = entry.cursor {
            self.editor.set_cursor(cursor)?;
        }
        Ok(())
    }

    /// Back to the root menu and hide the pane.
    fn reset(&mut self) {
        self.dispatcher.reset();
        self.screen = None;
        self.pending_search = None;
        self.outgoing.publish(&BridgeMessage::Close);
        if let Err(err) = self.sync_tab_line() {
            warn!(%err, "failed to publish tab line");
        }
    }

    fn sync_tab_line(&mut self) -> Result<()> {
        let line = self.session.tab_line();
        self.editor.set_var("tabs_left", &line.left)?;
        self.editor.set_var("tabs_hist", &line.history)?;
        self.editor.set_var("tabs_right", &line.right)?;
        Ok(())
    }
}

impl<E> std::fmt::Debug for App<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("session", &self.session)
            .field("path", &self.dispatcher.path())
            .field("rows", &self.rows)
            .finish_non_exhaustive()
    }
}

impl Services {
    pub fn new(
        vcs: Arc<dyn VersionControl + Send + Sync>,
        search: Arc<dyn TextSearch + Send + Sync>,
        todo_dir: PathBuf,
    ) -> Self {
        Self {
            vcs,
            search,
            todo_dir,
            reserved_rows: RESERVED_ROWS,
        }
    }
}
