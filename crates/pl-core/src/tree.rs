//! The static command tree and the dispatcher that walks it.

use crate::Location;

/// A key name as seen by the command tree.
///
/// Shifted letters arrive as their uppercase `Char`, so `o` and `O` are distinct keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Space,
    Tab,
    BackTab,
    Enter,
    Escape,
    Backspace,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    ShiftRight,
}

impl Key {
    /// Display name used in menus.
    pub fn name(self) -> String {
        match self {
            Key::Char(c) => c.to_string(),
            Key::Space => "space".into(),
            Key::Tab => "tab".into(),
            Key::BackTab => "S-tab".into(),
            Key::Enter => "enter".into(),
            Key::Escape => "escape".into(),
            Key::Backspace => "backspace".into(),
            Key::Left => "left".into(),
            Key::Right => "right".into(),
            Key::Up => "up".into(),
            Key::Down => "down".into(),
            Key::Home => "home".into(),
            Key::End => "end".into(),
            Key::ShiftRight => "S-right".into(),
        }
    }
}

/// Search screens reachable from the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScreenKind {
    /// Files of the repository holding the current buffer.
    ProjectFiles,
    /// Recently visited files.
    Recent,
    /// Lines of the current buffer.
    BufferLines,
    /// Text-search hits across the repository.
    ProjectSearch,
}

/// One-shot commands that run as soon as their leaf is reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    PrevHistory,
    NextHistory,
    Alternate,
    PrevTab,
    NextTab,
    KillTab,
    /// Run an ex command in the editor.
    Editor(&'static str),
    /// Open today's todo journal.
    TodayTodos,
    /// Step the todo journal relative to the most recent one.
    StepTodos(i64),
}

/// What a leaf does when it is reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Screen(ScreenKind),
    Action(Action),
}

/// A labelled node of the command tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Leaf {
        label: &'static str,
        command: Command,
    },
    Branch {
        label: &'static str,
        children: Vec<(Key, Node)>,
    },
}

impl Node {
    pub fn label(&self) -> &'static str {
        match self {
            Node::Leaf { label, .. } | Node::Branch { label, .. } => *label,
        }
    }

    /// Children in menu order; empty for leaves.
    pub fn children(&self) -> &[(Key, Node)] {
        match self {
            Node::Leaf { .. } => &[],
            Node::Branch { children, .. } => children,
        }
    }

    pub fn child(&self, key: Key) -> Option<&Node> {
        self.children()
            .iter()
            .find(|(candidate, _)| *candidate == key)
            .map(|(_, node)| node)
    }

    pub fn is_branch(&self) -> bool {
        matches!(self, Node::Branch { .. })
    }
}

/// Result of feeding one key to the dispatcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The key matched nothing.
    Ignored,
    /// Moved into a submenu.
    Descended,
    /// Reached a leaf; the host should start its command.
    Activated(Command),
    /// A leaf is active and owns this key.
    Forward(Key),
    /// Back at the root; restore the captured entry point if any.
    Escaped(Option<Location>),
}

/// Walks the command tree one key at a time.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tree: Node,
    path: Vec<Key>,
    entry: Option<Location>,
}

impl Dispatcher {
    pub fn new(tree: Node) -> Self {
        Self {
            tree,
            path: Vec::new(),
            entry: None,
        }
    }

    /// Keys taken from the root.
    pub fn path(&self) -> &[Key] {
        &self.path
    }

    /// Node at the end of the current path.
    pub fn node(&self) -> &Node {
        self.path.iter().fold(&self.tree, |node, key| {
            node.child(*key).unwrap_or(node)
        })
    }

    /// Title of the current node, with the labels of every step.
    pub fn breadcrumb(&self) -> String {
        let mut node = &self.tree;
        let mut title = node.label().to_string();
        for key in &self.path {
            if let Some(next) = node.child(*key) {
                title.push_str(" > ");
                title.push_str(next.label());
                node = next;
            }
        }
        title
    }

    /// Whether a leaf currently owns the keyboard.
    pub fn leaf_active(&self) -> bool {
        !self.node().is_branch()
    }

    /// Remember where the editor was when the palette opened.
    pub fn capture_entry(&mut self, entry: Location) {
        self.entry = Some(entry);
    }

    pub fn entry(&self) -> Option<&Location> {
        self.entry.as_ref()
    }

    pub fn handle_key(&mut self, key: Key) -> Outcome {
        if key == Key::Escape {
            self.path.clear();
            return Outcome::Escaped(self.entry.take());
        }
        let node = self.node();
        if !node.is_branch() {
            return Outcome::Forward(key);
        }
        match node.child(key) {
            Some(Node::Leaf { command, .. }) => {
                let command = *command;
                self.path.push(key);
                Outcome::Activated(command)
            }
            Some(Node::Branch { .. }) => {
                self.path.push(key);
                Outcome::Descended
            }
            None => Outcome::Ignored,
        }
    }

    /// Back to the root while the palette stays open, keeping the entry point.
    pub fn unwind(&mut self) {
        self.path.clear();
    }

    /// Back to the root after a commit; the entry point is no longer needed.
    pub fn reset(&mut self) {
        self.path.clear();
        self.entry = None;
    }
}

fn leaf(key: Key, label: &'static str, command: Command) -> (Key, Node) {
    (key, Node::Leaf { label, command })
}

fn action(key: Key, label: &'static str, action: Action) -> (Key, Node) {
    leaf(key, label, Command::Action(action))
}

fn screen(key: Key, label: &'static str, kind: ScreenKind) -> (Key, Node) {
    leaf(key, label, Command::Screen(kind))
}

fn branch(key: Key, label: &'static str, children: Vec<(Key, Node)>) -> (Key, Node) {
    (key, Node::Branch { label, children })
}

/// The palette's command tree.
pub fn command_tree() -> Node {
    Node::Branch {
        label: "Commands",
        children: vec![
            action(Key::Left, "Prev History", Action::PrevHistory),
            action(Key::Right, "Next History", Action::NextHistory),
            action(Key::Tab, "Last Buffer", Action::Alternate),
            action(Key::Char('r'), "Reload Vimrc", Action::Editor("so $MYVIMRC")),
            branch(
                Key::Space,
                "Todos",
                vec![
                    action(Key::Space, "Toggle Todo", Action::Editor("VimTodoListsToggleItem")),
                    action(
                        Key::Char('O'),
                        "Insert Todo Above",
                        Action::Editor("VimTodoListsCreateNewItemAbove"),
                    ),
                    action(
                        Key::Char('o'),
                        "Insert Todo Below",
                        Action::Editor("VimTodoListsCreateNewItemBelow"),
                    ),
                    action(Key::Left, "Decrease Indent", Action::Editor("VimTodoListsDecreaseIndent")),
                    action(Key::Right, "Increase Indent", Action::Editor("VimTodoListsIncreaseIndent")),
                ],
            ),
            branch(
                Key::Char('t'),
                "Tabs",
                vec![
                    action(Key::Left, "Prev Tab", Action::PrevTab),
                    action(Key::Right, "Next Tab", Action::NextTab),
                    action(Key::Char('k'), "Kill Tab", Action::KillTab),
                ],
            ),
            branch(
                Key::Char('f'),
                "Files",
                vec![
                    action(Key::Char('v'), "Open Vimrc", Action::Editor("e! $MYVIMRC")),
                    action(Key::Space, "Open Today's Todos", Action::TodayTodos),
                    action(Key::Left, "Back 1 Day's Todos", Action::StepTodos(-1)),
                    action(Key::Right, "Forward 1 Day's Todos", Action::StepTodos(1)),
                    screen(Key::Char('p'), "Project", ScreenKind::ProjectFiles),
                    screen(Key::Char('r'), "Recent", ScreenKind::Recent),
                ],
            ),
            branch(
                Key::Char('s'),
                "Search",
                vec![
                    screen(Key::Char('f'), "File", ScreenKind::BufferLines),
                    screen(Key::Char('p'), "Project", ScreenKind::ProjectSearch),
                ],
            ),
        ],
    }
}
