//! Terminal command palette for a running Neovim session.

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use pl_config::Config;
use pl_core::{EditorControl, Key};
use pl_nvim::NvimClient;
use pl_tools::{search_in_background, GitCli, SilverSearcher};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{error, info, warn};

pub mod app;
pub mod bridge;
pub mod input;
pub mod screen;
pub mod ui;

pub use app::{App, AppEvent, SearchRequest, Services};
pub use bridge::BridgeMessage;

const TICK_RATE: Duration = Duration::from_millis(200);

/// Connect the bridge and the editor, then run the palette until the editor exits.
pub fn run(config: &Config) -> Result<()> {
    let endpoints = config.endpoints()?;
    let runtime = Runtime::new().context("failed to start async runtime")?;
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();

    let looking_glass =
        runtime.block_on(bridge::connect_looking_glass(endpoints.looking_glass_port))?;
    runtime.spawn(async move {
        if let Err(err) = bridge::forward(looking_glass, outgoing_rx).await {
            warn!(error = %format!("{err:#}"), "looking glass connection lost");
        }
    });
    let listener = runtime.block_on(bridge::bind(endpoints.bridge_port))?;
    runtime.spawn({
        let events = events_tx.clone();
        async move {
            if let Err(err) = bridge::serve(listener, events).await {
                error!(error = %format!("{err:#}"), "bridge stopped");
            }
        }
    });

    let services = Services {
        vcs: Arc::new(GitCli::new()),
        search: Arc::new(SilverSearcher::new(config.search_program.clone())),
        todo_dir: config.todo_dir(),
        reserved_rows: config.reserved_rows,
    };
    let mut app = App::new(NvimClient::new(&endpoints.nvim_address), services);
    app.on_outgoing(move |message| {
        if outgoing_tx.send(*message).is_err() {
            warn!(?message, "looking glass forwarder is gone");
        }
    });
    info!(address = %endpoints.nvim_address, "palette started");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = event_loop(&mut terminal, &mut app, &runtime, &events_tx, &mut events_rx);
    restore_terminal(terminal)?;
    result
}

fn event_loop<E: EditorControl>(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App<E>,
    runtime: &Runtime,
    events_tx: &UnboundedSender<AppEvent>,
    events_rx: &mut UnboundedReceiver<AppEvent>,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        app.resize(usize::from(terminal.size()?.height));
        terminal.draw(|frame| ui::render(frame, app))?;

        let timeout = TICK_RATE.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if is_interrupt(&key) {
                        return Ok(());
                    }
                    if let Some(key) = translate_key(&key) {
                        app.handle_key(key);
                    }
                }
            }
        }

        if let Some(request) = app.take_search_request() {
            spawn_search(runtime, app, request, events_tx.clone());
        }
        while let Ok(event) = events_rx.try_recv() {
            if app.handle_event(event) {
                return Ok(());
            }
        }

        if last_tick.elapsed() >= TICK_RATE {
            last_tick = Instant::now();
        }
    }
}

fn spawn_search<E: EditorControl>(
    runtime: &Runtime,
    app: &App<E>,
    request: SearchRequest,
    events: UnboundedSender<AppEvent>,
) {
    let search = app.search_backend();
    runtime.spawn(async move {
        let SearchRequest { query, root } = request;
        let result = search_in_background(search, query.clone(), root).await;
        // The receiver only goes away on shutdown.
        let _ = events.send(AppEvent::SearchFinished { query, result });
    });
}

fn is_interrupt(key: &KeyEvent) -> bool {
    key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
}

/// Map a terminal key to the palette's key names.
pub fn translate_key(key: &KeyEvent) -> Option<Key> {
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);
    let key = match key.code {
        KeyCode::Char(' ') => Key::Space,
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Tab if shift => Key::BackTab,
        KeyCode::Tab => Key::Tab,
        KeyCode::BackTab => Key::BackTab,
        KeyCode::Enter => Key::Enter,
        KeyCode::Esc => Key::Escape,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Right if shift => Key::ShiftRight,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        _ => return None,
    };
    Some(key)
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
