use chrono::Local;
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use braincraft_core::{ConnectionStatus, Message, RenderState, Sender};

use crate::app::{AlertLevel, App, InputMode};

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("**") else {
            break;
        };
        if end == 0 {
            break;
        }
        if start > 0 {
            spans.push(Span::raw(rest[..start].to_string()));
        }
        spans.push(Span::styled(
            after[..end].to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        rest = &after[end + 2..];
    }

    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Lines for an assistant reply; fenced code is shown dimmed and unparsed
fn assistant_lines(content: &str) -> Vec<Line<'static>> {
    let code_style = Style::default().fg(Color::Green);
    let mut in_fence = false;

    content
        .lines()
        .map(|line| {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                Line::from(Span::styled(line.to_string(), Style::default().fg(Color::DarkGray)))
            } else if in_fence {
                Line::from(Span::styled(line.to_string(), code_style))
            } else {
                parse_markdown_line(line)
            }
        })
        .collect()
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    let [chat_area, diagram_area] = Layout::horizontal([
        Constraint::Percentage(50),
        Constraint::Percentage(50),
    ])
    .areas(body_area);

    render_chat_panel(app, frame, chat_area);
    render_diagram_panel(app, frame, diagram_area);

    render_footer(app, frame, footer_area);
}

fn render_header(app: &mut App, frame: &mut Frame, area: Rect) {
    let connection = app.page.connection();
    let (dot_color, label) = match connection.status() {
        ConnectionStatus::Connected => (Color::Green, connection.label()),
        ConnectionStatus::Disconnected => (Color::Red, connection.label()),
        ConnectionStatus::Checking => (Color::Yellow, connection.label()),
    };
    let checked = connection
        .last_checked()
        .map(|t| format!(" · checked {}", t.with_timezone(&Local).format("%H:%M:%S")))
        .unwrap_or_default();

    let status = Line::from(vec![
        Span::styled("● ", Style::default().fg(dot_color)),
        Span::styled(label, Style::default().fg(Color::White)),
        Span::styled(checked, Style::default().fg(Color::Gray)),
        Span::raw(" "),
    ]);
    let status_width = status.width() as u16;

    let [title_area, status_area] = Layout::horizontal([
        Constraint::Min(0),
        Constraint::Length(status_width),
    ])
    .areas(area);
    app.status_area = Some(status_area);

    let title = Line::from(vec![
        Span::styled(" BrainCraft ", Style::default().fg(Color::Cyan).bold()),
        Span::styled("AI diagram assistant ", Style::default().fg(Color::Gray)),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    frame.render_widget(Paragraph::new(title).style(Style::default().bg(Color::DarkGray)), title_area);
    frame.render_widget(Paragraph::new(status).style(Style::default().bg(Color::DarkGray)), status_area);
}

fn message_header(msg: &Message) -> Line<'static> {
    let (label, color) = match msg.sender {
        Sender::User => ("You:", Color::Cyan),
        Sender::Assistant => ("AI:", Color::Yellow),
    };
    Line::from(vec![
        Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::styled(
            format!(" {}", msg.timestamp.with_timezone(&Local).format("%H:%M")),
            Style::default().fg(Color::DarkGray),
        ),
    ])
}

fn render_chat_panel(app: &mut App, frame: &mut Frame, area: Rect) {
    let [history_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);

    // Store areas for mouse hit-testing
    app.chat_area = Some(history_area);
    app.input_area = Some(input_area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = history_area.height.saturating_sub(2);
    app.chat_width = history_area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Chat ");

    let mut lines: Vec<Line> = Vec::new();
    for msg in app.page.messages() {
        lines.push(message_header(msg));
        match msg.sender {
            Sender::User => {
                for line in msg.content.lines() {
                    lines.push(Line::from(line.to_string()));
                }
            }
            Sender::Assistant => lines.extend(assistant_lines(&msg.content)),
        }
        if msg.diagram_code.is_some() {
            lines.push(Line::from(Span::styled(
                "[diagram updated →]",
                Style::default().fg(Color::Magenta).add_modifier(Modifier::ITALIC),
            )));
        }
        lines.push(Line::default());
    }

    if app.page.is_loading() {
        lines.push(Line::from(Span::styled(
            "AI:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    let chat = Paragraph::new(Text::from(lines))
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, history_area);

    render_input(app, frame, input_area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if app.input_locked() {
        Color::DarkGray
    } else if editing {
        Color::Yellow
    } else {
        Color::Gray
    };

    let title = if app.voice.is_recording() {
        " Recording... (m to stop) ".to_string()
    } else if app.voice.is_transcribing() {
        format!(" Transcribing{} ", ".".repeat((app.animation_frame as usize) + 1))
    } else if app.page.is_loading() {
        " Waiting for reply ".to_string()
    } else {
        " Describe a diagram (Enter to send) ".to_string()
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app.input.chars().skip(scroll_offset).take(inner_width).collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);
    frame.render_widget(input, area);

    if editing && !app.input_locked() {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_diagram_panel(app: &mut App, frame: &mut Frame, area: Rect) {
    app.diagram_area = Some(area);

    let title = match app.diagram.data() {
        Some(data) => format!(" Diagram: {} ", data.kind.display_name()),
        None => " Diagram ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta))
        .title(title);

    let mut lines: Vec<Line> = Vec::new();

    let Some(prepared) = app.diagram.prepared() else {
        lines.push(Line::from(Span::styled(
            "Ask for a flowchart, sequence diagram, or any other type of diagram...",
            Style::default().fg(Color::DarkGray),
        )));
        let empty = Paragraph::new(Text::from(lines)).block(block).wrap(Wrap { trim: true });
        frame.render_widget(empty, area);
        return;
    };

    match app.diagram.state() {
        RenderState::Rendering { anchor } => {
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(vec![
                Span::styled(format!("Rendering{}", dots), Style::default().fg(Color::Yellow)),
                Span::styled(format!(" {}", anchor), Style::default().fg(Color::DarkGray)),
            ]));
        }
        RenderState::Rendered(rendered) => {
            lines.push(Line::from(vec![
                Span::styled("✓ Rendered ", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
                Span::styled(rendered.anchor.clone(), Style::default().fg(Color::DarkGray)),
            ]));
            lines.push(Line::from(vec![
                Span::styled(rendered.output.display().to_string(), Style::default().fg(Color::Gray)),
                Span::styled("  (o to open)", Style::default().fg(Color::DarkGray)),
            ]));
        }
        RenderState::Failed { anchor, message } => {
            lines.push(Line::from(vec![
                Span::styled("✗ Render failed ", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
                Span::styled(anchor.clone(), Style::default().fg(Color::DarkGray)),
            ]));
            for line in message.lines() {
                lines.push(Line::from(Span::styled(line.to_string(), Style::default().fg(Color::Red))));
            }
        }
        RenderState::Empty => {}
    }

    lines.push(Line::from(Span::styled(
        format!("theme {} · security {}", prepared.options.theme, prepared.options.security_level),
        Style::default().fg(Color::DarkGray),
    )));

    for warning in &prepared.warnings {
        lines.push(Line::from(Span::styled(
            format!("⚠ {}", warning),
            Style::default().fg(Color::Yellow),
        )));
    }

    lines.push(Line::default());

    for (i, line) in prepared.source.lines().enumerate() {
        lines.push(Line::from(vec![
            Span::styled(format!("{:>3} ", i + 1), Style::default().fg(Color::DarkGray)),
            Span::raw(line.to_string()),
        ]));
    }

    let panel = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.diagram_scroll, 0));
    frame.render_widget(panel, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " EDIT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = match app.input_mode {
        InputMode::Normal => vec![
            Span::styled(" i ", key_style),
            Span::styled(" type ", label_style),
            Span::styled(" j/k ", key_style),
            Span::styled(" chat ", label_style),
            Span::styled(" J/K ", key_style),
            Span::styled(" diagram ", label_style),
            Span::styled(" c ", key_style),
            Span::styled(" copy ", label_style),
            Span::styled(" o ", key_style),
            Span::styled(" open ", label_style),
            Span::styled(" r ", key_style),
            Span::styled(" recheck ", label_style),
            Span::styled(" m ", key_style),
            Span::styled(if app.voice.is_recording() { " stop " } else { " record " }, label_style),
            Span::styled(" v ", key_style),
            Span::styled(" voice ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
        InputMode::Editing => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" stop typing ", label_style),
        ],
    };

    if app.voice.is_recording() {
        hints.push(Span::styled(" ● REC ", Style::default().bg(Color::Red).fg(Color::White).bold()));
    } else if app.voice.voice_enabled() {
        let label = if app.voice.is_playing() { " ♪ speaking " } else { " ♪ voice on " };
        hints.push(Span::styled(label, Style::default().bg(Color::Magenta).fg(Color::White)));
    }

    if let Some(alert) = &app.alert {
        let style = match alert.level {
            AlertLevel::Info => Style::default().bg(Color::Black).fg(Color::Cyan),
            AlertLevel::Error => Style::default().bg(Color::Black).fg(Color::Red).bold(),
        };
        hints.push(Span::styled(format!(" {} ", alert.message), style));
    }

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}
