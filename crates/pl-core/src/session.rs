//! Tabs, per-tab history, and the most-recently-used list.

use tracing::debug;

use crate::{CoreResult, Cursor, EditorControl, Location};

/// An independent navigation context with its own back/forward history.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tab {
    stack: Vec<Location>,
    pos: usize,
    last: usize,
}

impl Tab {
    /// A tab holding a single location.
    pub fn with_location(location: Location) -> Self {
        Self {
            stack: vec![location],
            pos: 0,
            last: 0,
        }
    }

    /// Visited locations, oldest first.
    pub fn stack(&self) -> &[Location] {
        &self.stack
    }

    /// Index of the current location in the stack.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Index the alternate toggle jumps to.
    pub fn last(&self) -> usize {
        self.last
    }

    /// The location at `pos`, if the tab has any history.
    pub fn current(&self) -> Option<&Location> {
        self.stack.get(self.pos)
    }
}

/// Status-line summary of the tab list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TabLine {
    /// Tabs before the active one.
    pub left: String,
    /// Position in the active tab's history, as `pos/len`.
    pub history: String,
    /// Tabs after the active one.
    pub right: String,
}

/// Process-wide navigation state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    tabs: Vec<Tab>,
    tab_id: usize,
    recent: Vec<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A session with one empty tab.
    pub fn new() -> Self {
        Self {
            tabs: vec![Tab::default()],
            tab_id: 0,
            recent: Vec::new(),
        }
    }

    /// All tabs, left to right.
    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    /// Index of the active tab.
    pub fn tab_id(&self) -> usize {
        self.tab_id
    }

    /// Visited names, most recent first.
    pub fn recent(&self) -> &[String] {
        &self.recent
    }

    /// The tab navigation currently applies to.
    pub fn active_tab(&self) -> &Tab {
        &self.tabs[self.tab_id]
    }

    /// Current location of the active tab.
    pub fn current(&self) -> Option<&Location> {
        self.active_tab().current()
    }

    /// Move `name` to the front of the recent list.
    pub fn push_recent(&mut self, name: &str) {
        self.recent.retain(|existing| existing != name);
        self.recent.insert(0, name.to_string());
    }

    /// Push a new location onto the active tab, discarding forward history.
    ///
    /// `name` defaults to the current location's name. Staying on the current
    /// name without a cursor is a no-op. Returns whether anything was pushed.
    pub fn push_location(&mut self, name: Option<&str>, cursor: Option<Cursor>) -> bool {
        let current = self.current().map(|location| location.name.clone());
        let Some(target) = name.map(str::to_string).or_else(|| current.clone()) else {
            return false;
        };
        if current.as_deref() == Some(target.as_str()) && cursor.is_none() {
            return false;
        }

        self.push_recent(&target);
        let tab = &mut self.tabs[self.tab_id];
        if tab.stack.is_empty() {
            tab.last = 0;
        } else {
            tab.stack.truncate(tab.pos + 1);
            tab.last = tab.pos;
        }
        tab.stack.push(Location::new(target, cursor));
        tab.pos = tab.stack.len() - 1;
        debug!(tab = self.tab_id, pos = tab.pos, "pushed location");
        true
    }

    /// Insert a single-entry tab right after the active one.
    pub fn split_tab(&mut self, name: &str, cursor: Option<Cursor>) {
        let tab = Tab::with_location(Location::new(name, cursor));
        self.tabs.insert(self.tab_id + 1, tab);
    }

    /// Open `name` in a new tab next to the active one, keeping focus.
    ///
    /// `name` and then `current` (the live buffer, if any) move to the front
    /// of the recent list.
    pub fn split(&mut self, current: &str, name: &str, cursor: Option<Cursor>) {
        self.push_recent(name);
        if !current.is_empty() {
            self.push_recent(current);
        }
        self.split_tab(name, cursor);
    }

    /// [`Session::split`] followed by a forced move into the new tab.
    ///
    /// Nothing changes unless the editor accepts the move.
    pub fn split_and_focus(
        &mut self,
        editor: &mut dyn EditorControl,
        current: &str,
        name: &str,
        cursor: Option<Cursor>,
    ) -> CoreResult<()> {
        self.transaction(|session| {
            session.split(current, name, cursor);
            session.move_tab(editor, 1, true).map(drop)
        })
    }

    /// Switch tabs by `delta`, clamped. Unchanged indices are ignored unless
    /// `force` is set.
    pub fn move_tab(
        &mut self,
        editor: &mut dyn EditorControl,
        delta: isize,
        force: bool,
    ) -> CoreResult<bool> {
        let next = clamp_index(self.tab_id, delta, self.tabs.len());
        if next == self.tab_id && !force {
            return Ok(false);
        }
        self.transaction(|session| {
            session.tab_id = next;
            if let Some(target) = session.current().cloned() {
                session.visit(editor, &target)?;
            }
            Ok(true)
        })
    }

    /// Step through the active tab's history by `delta`, clamped.
    pub fn move_history(&mut self, editor: &mut dyn EditorControl, delta: isize) -> CoreResult<bool> {
        let tab = self.active_tab();
        let next = clamp_index(tab.pos, delta, tab.stack.len());
        if next == tab.pos {
            return Ok(false);
        }
        self.transaction(|session| {
            session.tabs[session.tab_id].pos = next;
            if let Some(target) = session.current().cloned() {
                session.visit(editor, &target)?;
            }
            Ok(true)
        })
    }

    /// Swap `pos` and `last` in the active tab and go there.
    pub fn toggle_alternate(&mut self, editor: &mut dyn EditorControl) -> CoreResult<bool> {
        if self.active_tab().stack.is_empty() {
            return Ok(false);
        }
        self.transaction(|session| {
            let tab = &mut session.tabs[session.tab_id];
            std::mem::swap(&mut tab.pos, &mut tab.last);
            if let Some(target) = session.current().cloned() {
                session.visit(editor, &target)?;
            }
            Ok(true)
        })
    }

    /// Remove the active tab and focus its left neighbour. The last tab stays.
    pub fn close_active_tab(&mut self, editor: &mut dyn EditorControl) -> CoreResult<bool> {
        if self.tabs.len() < 2 {
            return Ok(false);
        }
        self.transaction(|session| {
            session.tabs.remove(session.tab_id);
            session.move_tab(editor, -1, true)
        })
    }

    /// Summary of the tab list for the editor status line.
    pub fn tab_line(&self) -> TabLine {
        let names = |tabs: &[Tab]| {
            tabs.iter()
                .map(|tab| tab.current().map_or("", Location::basename))
                .collect::<Vec<_>>()
                .join(" | ")
        };
        let active = self.active_tab();
        TabLine {
            left: names(&self.tabs[..self.tab_id]),
            history: format!("{}/{}", active.pos + 1, active.stack.len()),
            right: names(&self.tabs[self.tab_id + 1..]),
        }
    }

    fn visit(&mut self, editor: &mut dyn EditorControl, target: &Location) -> CoreResult<()> {
        if editor.buffer_name()? != target.name {
            editor.edit_file(&target.name, None)?;
            self.push_recent(&target.name);
        }
        if let Some(cursor) = target.cursor {
            editor.set_cursor(cursor)?;
        }
        Ok(())
    }

    /// Run `apply` on a scratch copy, committing only if it succeeds.
    fn transaction<T>(
        &mut self,
        apply: impl FnOnce(&mut Session) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let mut scratch = self.clone();
        let value = apply(&mut scratch)?;
        *self = scratch;
        Ok(value)
    }
}

fn clamp_index(current: usize, delta: isize, len: usize) -> usize {
    current
        .saturating_add_signed(delta)
        .min(len.saturating_sub(1))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{CoreError, WindowMetrics};

    #[derive(Default)]
    pub(crate) struct FakeEditor {
        pub buffer: String,
        pub cursor: Option<Cursor>,
        pub edits: Vec<String>,
        pub fail: bool,
        pub fail_edit: bool,
    }

    impl EditorControl for FakeEditor {
        fn cursor(&mut self) -> CoreResult<Cursor> {
            Ok(self.cursor.unwrap_or(Cursor::new(1, 0)))
        }

        fn buffer_name(&mut self) -> CoreResult<String> {
            if self.fail {
                return Err(CoreError::Connection("editor is gone".into()));
            }
            Ok(self.buffer.clone())
        }

        fn buffer_lines(&mut self) -> CoreResult<Vec<String>> {
            Ok(Vec::new())
        }

        fn set_cursor(&mut self, cursor: Cursor) -> CoreResult<()> {
            self.cursor = Some(cursor);
            Ok(())
        }

        fn edit_file(&mut self, path: &str, _line: Option<u64>) -> CoreResult<()> {
            if self.fail_edit {
                return Err(CoreError::Connection("edit refused".into()));
            }
            self.buffer = path.to_string();
            self.edits.push(path.to_string());
            Ok(())
        }

        fn command(&mut self, _command: &str) -> CoreResult<()> {
            Ok(())
        }

        fn window_metrics(&mut self) -> CoreResult<WindowMetrics> {
            Ok(WindowMetrics {
                height: 40,
                winline: 1,
            })
        }

        fn set_var(&mut self, _name: &str, _value: &str) -> CoreResult<()> {
            Ok(())
        }
    }

    fn session_with(names: &[&str]) -> Session {
        let mut session = Session::new();
        for name in names {
            session.push_location(Some(name), None);
        }
        session
    }

    #[test]
    fn distinct_pushes_grow_the_stack() {
        let session = session_with(&["/a", "/b", "/c"]);
        let tab = session.active_tab();
        assert_eq!(tab.stack().len(), 3);
        assert_eq!(tab.pos(), 2);
        assert_eq!(session.current().unwrap().name, "/c");
    }

    #[test]
    fn pushing_the_current_name_without_cursor_is_a_no_op() {
        let mut session = session_with(&["/a"]);
        assert!(!session.push_location(Some("/a"), None));
        assert!(!session.push_location(None, None));
        assert_eq!(session.active_tab().stack().len(), 1);

        assert!(session.push_location(None, Some(Cursor::new(4, 2))));
        let tab = session.active_tab();
        assert_eq!(tab.stack().len(), 2);
        assert_eq!(tab.current().unwrap().name, "/a");
        assert_eq!(tab.current().unwrap().cursor, Some(Cursor::new(4, 2)));
    }

    #[test]
    fn push_discards_forward_history() {
        let mut session = session_with(&["/a", "/b", "/c"]);
        let mut editor = FakeEditor {
            buffer: "/c".into(),
            ..FakeEditor::default()
        };
        session.move_history(&mut editor, -2).unwrap();
        assert_eq!(session.active_tab().pos(), 0);

        session.push_location(Some("/d"), None);
        let names: Vec<_> = session
            .active_tab()
            .stack()
            .iter()
            .map(|location| location.name.as_str())
            .collect();
        assert_eq!(names, vec!["/a", "/d"]);
        assert_eq!(session.active_tab().pos(), 1);
        assert_eq!(session.active_tab().last(), 0);
    }

    #[test]
    fn recent_is_deduplicated_move_to_front() {
        let mut session = session_with(&["/a", "/b", "/c"]);
        assert_eq!(session.recent(), ["/c", "/b", "/a"]);
        session.push_recent("/a");
        assert_eq!(session.recent(), ["/a", "/c", "/b"]);
    }

    #[test]
    fn history_moves_clamp_at_the_boundaries() {
        let mut session = session_with(&["/a", "/b", "/c"]);
        let mut editor = FakeEditor {
            buffer: "/c".into(),
            ..FakeEditor::default()
        };
        assert!(!session.move_history(&mut editor, 5).unwrap());
        assert!(!session.move_history(&mut editor, 5).unwrap());
        assert_eq!(session.active_tab().pos(), 2);

        assert!(session.move_history(&mut editor, -10).unwrap());
        assert!(!session.move_history(&mut editor, -10).unwrap());
        assert_eq!(session.active_tab().pos(), 0);
        assert_eq!(editor.buffer, "/a");
    }

    #[test]
    fn tab_moves_clamp_and_visit_the_target() {
        let mut session = session_with(&["/a"]);
        session.split_tab("/b", Some(Cursor::new(7, 1)));
        let mut editor = FakeEditor {
            buffer: "/a".into(),
            ..FakeEditor::default()
        };

        assert!(session.move_tab(&mut editor, 3, false).unwrap());
        assert_eq!(session.tab_id(), 1);
        assert_eq!(editor.buffer, "/b");
        assert_eq!(editor.cursor, Some(Cursor::new(7, 1)));
        assert_eq!(session.recent()[0], "/b");

        assert!(!session.move_tab(&mut editor, 3, false).unwrap());
        assert_eq!(session.tab_id(), 1);
    }

    #[test]
    fn forced_tab_move_resyncs_without_changing_index() {
        let mut session = session_with(&["/a"]);
        let mut editor = FakeEditor {
            buffer: "/elsewhere".into(),
            ..FakeEditor::default()
        };
        assert!(session.move_tab(&mut editor, 0, true).unwrap());
        assert_eq!(editor.edits, vec!["/a"]);
    }

    #[test]
    fn alternate_toggle_twice_returns_to_start() {
        let mut session = session_with(&["/a", "/b", "/c"]);
        let mut editor = FakeEditor {
            buffer: "/c".into(),
            ..FakeEditor::default()
        };
        let start = session.active_tab().pos();

        session.toggle_alternate(&mut editor).unwrap();
        assert_eq!(session.active_tab().pos(), 1);
        assert_eq!(editor.buffer, "/b");

        session.toggle_alternate(&mut editor).unwrap();
        assert_eq!(session.active_tab().pos(), start);
        assert_eq!(editor.buffer, "/c");
    }

    #[test]
    fn alternate_on_empty_tab_is_a_no_op() {
        let mut session = Session::new();
        let mut editor = FakeEditor::default();
        assert!(!session.toggle_alternate(&mut editor).unwrap());
    }

    #[test]
    fn closing_the_last_tab_is_refused() {
        let mut session = session_with(&["/a"]);
        let mut editor = FakeEditor::default();
        assert!(!session.close_active_tab(&mut editor).unwrap());
        assert_eq!(session.tabs().len(), 1);
    }

    #[test]
    fn closing_a_tab_focuses_the_left_neighbour() {
        let mut session = session_with(&["/a"]);
        session.split_tab("/b", None);
        let mut editor = FakeEditor {
            buffer: "/a".into(),
            ..FakeEditor::default()
        };
        session.move_tab(&mut editor, 1, false).unwrap();
        assert_eq!(session.tab_id(), 1);

        assert!(session.close_active_tab(&mut editor).unwrap());
        assert_eq!(session.tabs().len(), 1);
        assert_eq!(session.tab_id(), 0);
        assert_eq!(editor.buffer, "/a");
    }

    #[test]
    fn split_inserts_after_active_tab_without_focusing() {
        let mut session = session_with(&["/a"]);
        session.split_tab("/c", None);
        session.split_tab("/b", None);
        assert_eq!(session.tab_id(), 0);
        let names: Vec<_> = session
            .tabs()
            .iter()
            .map(|tab| tab.current().unwrap().name.as_str())
            .collect();
        assert_eq!(names, vec!["/a", "/b", "/c"]);
    }

    #[test]
    fn failed_editor_call_leaves_session_untouched() {
        let mut session = session_with(&["/a"]);
        session.split_tab("/b", None);
        let before = session.clone();
        let mut editor = FakeEditor {
            fail: true,
            ..FakeEditor::default()
        };
        assert!(session.move_tab(&mut editor, 1, false).is_err());
        assert!(session.close_active_tab(&mut editor).is_err());
        assert_eq!(session, before);
    }

    #[test]
    fn split_moves_target_then_current_to_front_of_recent() {
        let mut session = session_with(&["/a", "/b"]);
        session.split("/b", "/c", Some(Cursor::new(3, 1)));
        assert_eq!(session.recent(), ["/b", "/c", "/a"]);
        assert_eq!(session.tab_id(), 0);
        assert_eq!(
            session.tabs()[1].current(),
            Some(&Location::new("/c", Some(Cursor::new(3, 1))))
        );
    }

    #[test]
    fn split_and_focus_visits_the_new_tab() {
        let mut session = session_with(&["/a"]);
        let mut editor = FakeEditor {
            buffer: "/a".into(),
            ..FakeEditor::default()
        };
        session
            .split_and_focus(&mut editor, "/a", "/b", None)
            .unwrap();
        assert_eq!(session.tabs().len(), 2);
        assert_eq!(session.tab_id(), 1);
        assert_eq!(editor.buffer, "/b");
    }

    #[test]
    fn failed_split_and_focus_leaves_session_untouched() {
        let mut session = session_with(&["/a"]);
        let before = session.clone();
        let mut editor = FakeEditor {
            buffer: "/a".into(),
            fail_edit: true,
            ..FakeEditor::default()
        };
        assert!(session
            .split_and_focus(&mut editor, "/a", "/b", None)
            .is_err());
        assert_eq!(session, before);
    }

    #[test]
    fn tab_line_summarises_neighbours() {
        let mut session = session_with(&["/x/a.rs", "/x/b.rs"]);
        session.split_tab("/x/d.rs", None);
        session.split_tab("/x/c.rs", None);
        let line = session.tab_line();
        assert_eq!(line.left, "");
        assert_eq!(line.history, "2/2");
        assert_eq!(line.right, "c.rs | d.rs");
    }
}
