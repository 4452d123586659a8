use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use std::path::Path;
use std::process::{Command, Stdio};

use braincraft_core::RenderState;

use crate::app::{App, InputMode};
use crate::tui::AppEvent;

/// Lines moved per key press or wheel notch
const SCROLL_STEP: i32 = 3;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick(),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Char('i') | KeyCode::Tab => app.input_mode = InputMode::Editing,

        // Connection
        KeyCode::Char('r') => {
            app.request_health_check();
            app.info("Checking connection...");
        }

        // Voice
        KeyCode::Char('v') => app.toggle_voice(),
        KeyCode::Char('m') => app.toggle_recording(),

        // Scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_chat(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_chat(-1),
        KeyCode::Char('G') | KeyCode::End => app.scroll_chat_to_bottom(),
        KeyCode::Char('J') | KeyCode::PageDown => app.scroll_diagram(SCROLL_STEP),
        KeyCode::Char('K') | KeyCode::PageUp => app.scroll_diagram(-SCROLL_STEP),

        // Diagram actions
        KeyCode::Char('c') => copy_diagram(app),
        KeyCode::Char('o') => open_diagram(app),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            if app.voice.is_recording() {
                app.info("Stop recording first (m)");
            } else if app.input_locked() {
                app.info("Waiting for the assistant...");
            } else {
                app.submit_input();
            }
        }
        KeyCode::Backspace => {
            if app.cursor > 0 {
                app.cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.cursor = app.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.cursor = (app.cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.cursor = 0;
        }
        KeyCode::End => {
            app.cursor = app.input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.cursor);
            app.input.insert(byte_pos, c);
            app.cursor += 1;
        }
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    let hit = |area: Option<Rect>| area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let in_status = hit(app.status_area);
    let in_chat = hit(app.chat_area);
    let in_input = hit(app.input_area);
    let in_diagram = hit(app.diagram_area);

    match mouse.kind {
        MouseEventKind::ScrollDown => {
            if in_chat {
                app.scroll_chat(SCROLL_STEP);
            } else if in_diagram {
                app.scroll_diagram(SCROLL_STEP);
            }
        }
        MouseEventKind::ScrollUp => {
            if in_chat {
                app.scroll_chat(-SCROLL_STEP);
            } else if in_diagram {
                app.scroll_diagram(-SCROLL_STEP);
            }
        }
        MouseEventKind::Down(MouseButton::Left) => {
            if in_status {
                app.request_health_check();
            } else if in_input {
                app.input_mode = InputMode::Editing;
            }
        }
        _ => {}
    }
}

fn copy_diagram(app: &mut App) {
    let source = app
        .diagram
        .prepared()
        .map(|prepared| prepared.source.clone())
        .or_else(|| app.page.current_diagram().map(|data| data.code.clone()));
    let Some(source) = source else {
        app.info("No diagram to copy");
        return;
    };

    if copy_to_clipboard(&source) {
        app.info("Diagram source copied");
    } else {
        app.alert_error("No clipboard tool found");
    }
}

fn open_diagram(app: &mut App) {
    let output = match app.diagram.state() {
        RenderState::Rendered(rendered) => Ok(rendered.output.clone()),
        RenderState::Rendering { .. } => Err("Diagram is still rendering"),
        RenderState::Failed { .. } | RenderState::Empty => Err("No rendered diagram to open"),
    };

    match output {
        Ok(path) => match open_path(&path) {
            Ok(()) => app.info(format!("Opened {}", path.display())),
            Err(e) => app.alert_error(format!("Could not open diagram: {}", e)),
        },
        Err(reason) => app.info(reason),
    }
}

type ExternalCommand = (&'static str, &'static [&'static str]);

const MACOS_CLIPBOARD: &[ExternalCommand] = &[("pbcopy", &[])];
const WINDOWS_CLIPBOARD: &[ExternalCommand] = &[("clip", &[])];
const UNIX_CLIPBOARD: &[ExternalCommand] = &[
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
];

/// Clipboard commands to try, in order, for this platform
fn clipboard_commands() -> &'static [ExternalCommand] {
    if cfg!(target_os = "macos") {
        MACOS_CLIPBOARD
    } else if cfg!(target_os = "windows") {
        WINDOWS_CLIPBOARD
    } else {
        UNIX_CLIPBOARD
    }
}

fn copy_to_clipboard(text: &str) -> bool {
    use std::io::Write;

    for (program, args) in clipboard_commands() {
        let Ok(mut child) = Command::new(program)
            .args(*args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        else {
            continue;
        };

        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(text.as_bytes());
        }
        return child.wait().map(|status| status.success()).unwrap_or(false);
    }
    false
}

fn open_command() -> ExternalCommand {
    if cfg!(target_os = "macos") {
        ("open", &[])
    } else if cfg!(target_os = "windows") {
        ("cmd", &["/C", "start", ""])
    } else {
        ("xdg-open", &[])
    }
}

fn open_path(path: &Path) -> std::io::Result<()> {
    let (program, args) = open_command();
    Command::new(program)
        .args(args)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(())
}
