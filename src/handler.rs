use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crate::app::{App, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Ctrl-C quits from any mode
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
        // Quit
        KeyCode::Char('q') => app.should_quit = true,

        // Back to the input box
        KeyCode::Char('i') | KeyCode::Enter => {
            app.input_mode = InputMode::Editing;
        }

        // Transcript scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_half_page_down();
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_half_page_up();
        }
        KeyCode::Char('g') => app.transcript_scroll = 0,
        KeyCode::Char('G') => app.scroll_to_bottom(),

        // Clear transcript (only when the capability is enabled)
        KeyCode::Char('c') => {
            if app.enable_clear {
                app.clear_transcript();
            }
        }

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            app.submit();
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
        KeyCode::Up => app.scroll_up(),
        KeyCode::Down => app.scroll_down(),
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.cursor);
            app.input.insert(byte_pos, c);
            app.cursor += 1;
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{QueryOutcome, Sender};
    use crate::client::QueryClient;
    use tokio::sync::mpsc;

    fn test_app(enable_clear: bool) -> (App, mpsc::UnboundedReceiver<QueryOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = QueryClient::new("http://127.0.0.1:1");
        let app = App::new(client, tx, "http://127.0.0.1:1".to_string(), enable_clear);
        (app, rx)
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_typing_inserts_at_cursor() {
        let (mut app, _rx) = test_app(false);

        for c in "porosity".chars() {
            handle_key(&mut app, press(KeyCode::Char(c)));
        }
        assert_eq!(app.input, "porosity");
        assert_eq!(app.cursor, 8);

        handle_key(&mut app, press(KeyCode::Home));
        handle_key(&mut app, press(KeyCode::Char('é')));
        assert_eq!(app.input, "éporosity");
        assert_eq!(app.cursor, 1);
    }

    #[test]
    fn test_backspace_and_delete_are_utf8_safe() {
        let (mut app, _rx) = test_app(false);
        app.input = "né".to_string();
        app.cursor = 2;

        handle_key(&mut app, press(KeyCode::Backspace));
        assert_eq!(app.input, "n");
        assert_eq!(app.cursor, 1);

        handle_key(&mut app, press(KeyCode::Home));
        handle_key(&mut app, press(KeyCode::Delete));
        assert_eq!(app.input, "");
    }

    #[tokio::test]
    async fn test_enter_submits_input() {
        let (mut app, _rx) = test_app(false);
        app.input = "What is porosity?".to_string();
        app.cursor = app.input.chars().count();

        handle_key(&mut app, press(KeyCode::Enter));

        assert_eq!(app.transcript.last().unwrap().sender, Sender::User);
        assert!(app.input.is_empty());
        assert!(app.waiting());
    }

    #[test]
    fn test_clear_key_is_noop_when_disabled() {
        let (mut app, _rx) = test_app(false);
        app.input_mode = InputMode::Normal;
        app.push_message(Sender::User, "one".to_string());
        let len = app.transcript.len();

        handle_key(&mut app, press(KeyCode::Char('c')));
        assert_eq!(app.transcript.len(), len);
    }

    #[test]
    fn test_clear_key_clears_when_enabled() {
        let (mut app, _rx) = test_app(true);
        app.input_mode = InputMode::Normal;
        app.push_message(Sender::User, "one".to_string());

        handle_key(&mut app, press(KeyCode::Char('c')));
        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.transcript[0].sender, Sender::System);
    }

    #[test]
    fn test_ctrl_c_quits_in_any_mode() {
        let (mut app, _rx) = test_app(false);
        handle_key(
            &mut app,
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
        );
        assert!(app.should_quit);
    }

    #[test]
    fn test_esc_switches_to_normal_mode() {
        let (mut app, _rx) = test_app(false);
        assert_eq!(app.input_mode, InputMode::Editing);

        handle_key(&mut app, press(KeyCode::Esc));
        assert_eq!(app.input_mode, InputMode::Normal);

        handle_key(&mut app, press(KeyCode::Char('i')));
        assert_eq!(app.input_mode, InputMode::Editing);
    }
}
