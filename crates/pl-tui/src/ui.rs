use pl_core::{EditorControl, Key, Node, Piece, PieceKind};
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::block::{Position, Title};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::app::App;
use crate::screen::Screen;

const PROMPT: &str = " > ";

pub fn render<E: EditorControl>(frame: &mut Frame, app: &App<E>) {
    let area = frame.size();
    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue))
        .title(Span::styled(
            format!(" {} ", app.dispatcher().breadcrumb()),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    if let Some(status) = app.status() {
        block = block.title(
            Title::from(Span::styled(
                format!(" {status} "),
                Style::default().fg(Color::Yellow),
            ))
            .position(Position::Bottom),
        );
    }
    let inner = block.inner(area);
    frame.render_widget(block, area);

    match app.screen() {
        Some(screen) => {
            let visible = screen.visible(usize::from(area.height), app.reserved_rows());
            render_screen(frame, inner, screen, visible);
        }
        None => render_menu(frame, inner, app.dispatcher().node()),
    }
}

fn render_menu(frame: &mut Frame, area: Rect, node: &Node) {
    let columns = menu_columns(node);
    let width = area.width / 3;
    for (i, column) in columns.into_iter().enumerate() {
        let offset = width * u16::try_from(i).unwrap_or(0);
        let rect = Rect {
            x: area.x + offset,
            y: area.y + 1.min(area.height),
            width,
            height: area.height.saturating_sub(1),
        };
        frame.render_widget(Paragraph::new(column), rect);
    }
}

/// Children of `node` split into three columns of `[key] →  label` rows.
pub fn menu_columns(node: &Node) -> Vec<Vec<Line<'static>>> {
    let children = node.children();
    if children.is_empty() {
        return Vec::new();
    }
    let per_column = children.len().div_ceil(3);
    let key_width = children
        .iter()
        .map(|(key, _)| key.name().chars().count())
        .max()
        .unwrap_or(0);
    children
        .chunks(per_column)
        .map(|chunk| {
            chunk
                .iter()
                .map(|(key, child)| menu_entry(*key, child, key_width))
                .collect()
        })
        .collect()
}

fn menu_entry(key: Key, child: &Node, key_width: usize) -> Line<'static> {
    let name = key.name();
    let label_color = if child.is_branch() {
        Color::LightMagenta
    } else {
        Color::LightYellow
    };
    Line::from(vec![
        Span::styled(
            format!("   {:>key_width$}", format!("[{name}]"), key_width = key_width + 2),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(" →  ", Style::default().fg(Color::White)),
        Span::styled(
            child.label(),
            Style::default().fg(label_color).add_modifier(Modifier::BOLD),
        ),
    ])
}

fn render_screen(frame: &mut Frame, area: Rect, screen: &Screen, visible: usize) {
    if area.height == 0 {
        return;
    }
    let input = screen.input();
    let mut lines = vec![
        Line::from(vec![
            Span::styled(
                PROMPT,
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                input.content().to_string(),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(Span::styled(
            "-".repeat(usize::from(area.width)),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )),
    ];

    let results = screen.results();
    let view = screen.view();
    for index in view.window(results.len(), visible) {
        let highlighted = index == view.highlight;
        lines.push(Line::from(
            results[index]
                .pieces
                .iter()
                .map(|piece| piece_span(piece, highlighted))
                .collect::<Vec<_>>(),
        ));
    }
    frame.render_widget(Paragraph::new(lines), area);

    let cursor = u16::try_from(input.cursor()).unwrap_or(u16::MAX);
    let prompt = u16::try_from(PROMPT.len()).unwrap_or(0);
    let x = area
        .x
        .saturating_add(prompt)
        .saturating_add(cursor)
        .min(area.right().saturating_sub(1));
    frame.set_cursor(x, area.y);
}

fn piece_span(piece: &Piece, highlighted: bool) -> Span<'static> {
    let fg = match (piece.kind, highlighted) {
        (PieceKind::Annotation, true) => Color::Blue,
        (PieceKind::Annotation, false) => Color::Green,
        (PieceKind::Match, _) => Color::White,
        (PieceKind::Plain, true) => Color::Black,
        (PieceKind::Plain, false) => Color::Gray,
    };
    let mut style = Style::default().fg(fg);
    if highlighted {
        style = style.bg(Color::LightMagenta);
    }
    if highlighted || piece.kind == PieceKind::Match {
        style = style.add_modifier(Modifier::BOLD);
    }
    Span::styled(piece.text.replace('\t', " "), style)
}
