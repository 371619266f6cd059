use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use futures_util::StreamExt;
use tokio::sync::mpsc::UnboundedSender;

use crate::app::{App, InputMode};
use crate::config;
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent, tx: &UnboundedSender<AppEvent>) {
    match event {
        AppEvent::Key(key) => handle_key(app, key, tx),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Chunk(text) => app.apply_chunk(&text),
        AppEvent::StreamDone => app.finish_turn(),
        AppEvent::StreamFailed => app.fail_turn(),
    }
}

fn handle_key(app: &mut App, key: KeyEvent, tx: &UnboundedSender<AppEvent>) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key, tx),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        // Quit
        KeyCode::Char('q') => app.should_quit = true,

        // Start typing a question
        KeyCode::Char('i') | KeyCode::Char('/') | KeyCode::Enter => {
            app.input_mode = InputMode::Editing;
            app.cursor_end();
        }

        // Clear chat back to the greeting (ignored mid-turn)
        KeyCode::Char('c') => app.clear_chat(),

        // Scroll chat history
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(),
        KeyCode::Char('g') => app.scroll_to_top(),
        KeyCode::Char('G') => app.scroll_to_bottom(),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent, tx: &UnboundedSender<AppEvent>) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => submit(app, tx),
        KeyCode::Backspace => app.backspace(),
        KeyCode::Delete => app.delete_char(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),
        KeyCode::Char(c) => app.insert_char(c),
        _ => {}
    }
}

/// Start a turn: record the prompt, then drive the response stream from
/// a background task that reports progress over the event channel.
fn submit(app: &mut App, tx: &UnboundedSender<AppEvent>) {
    if app.input.trim().is_empty() || app.turn_in_flight() {
        return;
    }

    let prompt = app.take_input();
    // History excludes the prompt being submitted.
    let history = app.conversation.messages().to_vec();
    app.begin_turn(&prompt);
    app.input_mode = InputMode::Normal;

    let ollama = app.ollama.clone();
    let model = app.model.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        match ollama.respond(&model, &prompt, &history).await {
            Ok(mut stream) => {
                while let Some(chunk) = stream.next().await {
                    let text = chunk.text();
                    if !text.is_empty() {
                        if tx.send(AppEvent::Chunk(text.to_string())).is_err() {
                            return;
                        }
                        // Cosmetic pacing so the reply streams visibly
                        tokio::time::sleep(Duration::from_millis(config::STREAM_PACING_MS)).await;
                    }
                }
                let _ = tx.send(AppEvent::StreamDone);
            }
            Err(_) => {
                let _ = tx.send(AppEvent::StreamFailed);
            }
        }
    });
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollDown => {
            app.scroll_down();
            app.scroll_down();
            app.scroll_down();
        }
        MouseEventKind::ScrollUp => {
            app.scroll_up();
            app.scroll_up();
            app.scroll_up();
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ollama::OllamaClient;

    fn app() -> App {
        App::new(
            OllamaClient::new(config::OLLAMA_BASE_URL),
            config::MODEL_NAME.to_string(),
        )
    }

    #[tokio::test]
    async fn submit_refuses_blank_input() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let mut app = app();
        app.input = "   ".to_string();
        submit(&mut app, &tx);
        assert!(!app.turn_in_flight());
        assert_eq!(app.conversation.len(), 1);
    }

    #[tokio::test]
    async fn submit_refuses_while_turn_in_flight() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let mut app = app();
        app.begin_turn("first question");
        app.input = "second question".to_string();
        submit(&mut app, &tx);
        // The second prompt stays in the box; history gained nothing.
        assert_eq!(app.input, "second question");
        assert_eq!(app.conversation.len(), 2);
    }
}
