use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::App;
use crate::tui::AppEvent;

const WHEEL_LINES: u16 = 3;

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => app.scroll_to_bottom(),
        AppEvent::Tick => app.tick(),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Keys that work whether or not a reply is pending
    match key.code {
        KeyCode::Char('c') if ctrl => {
            app.should_quit = true;
            return;
        }
        KeyCode::Esc => {
            app.should_quit = true;
            return;
        }
        KeyCode::PageUp => {
            app.scroll_up(app.page_height());
            return;
        }
        KeyCode::PageDown => {
            app.scroll_down(app.page_height());
            return;
        }
        KeyCode::Up => {
            app.scroll_up(1);
            return;
        }
        KeyCode::Down => {
            app.scroll_down(1);
            return;
        }
        _ => {}
    }

    // The input box is disabled until the pending reply lands
    if app.is_busy() {
        return;
    }

    match key.code {
        KeyCode::Enter => app.submit(),
        KeyCode::Char('u') if ctrl => app.clear_input(),
        KeyCode::Backspace => app.backspace(),
        KeyCode::Delete => app.delete(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),
        KeyCode::Char(c) if !ctrl => app.insert_char(c),
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(WHEEL_LINES),
        MouseEventKind::ScrollUp => app.scroll_up(WHEEL_LINES),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use textgen_chat::{
        Config, Generation, GenerationError, GenerationParameters, RequestController,
        RequestState, Role, Transport,
    };

    /// Never answers, so the controller stays pending.
    struct SilentTransport;

    #[async_trait]
    impl Transport for SilentTransport {
        async fn send(&self, _params: GenerationParameters) -> Result<Generation, GenerationError> {
            std::future::pending().await
        }
    }

    fn app() -> App {
        let controller = RequestController::new(Arc::new(SilentTransport), &Config::default());
        App::new(controller, "http://localhost:8000/generate")
    }

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_event(app, key(KeyCode::Char(c)));
        }
    }

    #[tokio::test]
    async fn typing_then_enter_submits_the_prompt() {
        let mut app = app();
        type_text(&mut app, "Hello");
        assert_eq!(app.input(), "Hello");

        handle_event(&mut app, key(KeyCode::Enter));

        let messages = app.controller.conversation().all();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role(), Role::User);
        assert_eq!(messages[0].text(), "Hello");
        assert_eq!(app.input(), "");
        assert_eq!(app.input_cursor, 0);
        assert_eq!(app.controller.state(), RequestState::Pending);
    }

    #[tokio::test]
    async fn input_is_locked_while_pending() {
        let mut app = app();
        type_text(&mut app, "First");
        handle_event(&mut app, key(KeyCode::Enter));

        type_text(&mut app, "Second");
        handle_event(&mut app, key(KeyCode::Enter));

        assert_eq!(app.input(), "");
        assert_eq!(app.controller.conversation().len(), 1);
        assert_eq!(app.controller.request_count(), 1);
    }

    #[tokio::test]
    async fn blank_enter_does_nothing() {
        let mut app = app();
        type_text(&mut app, "   ");
        handle_event(&mut app, key(KeyCode::Enter));

        assert!(app.controller.conversation().is_empty());
        assert_eq!(app.controller.state(), RequestState::Idle);
        assert_eq!(app.input(), "   ");
    }

    #[test]
    fn cursor_editing_is_utf8_safe() {
        let mut app = app();
        type_text(&mut app, "héllo");
        handle_event(&mut app, key(KeyCode::Left));
        handle_event(&mut app, key(KeyCode::Left));
        handle_event(&mut app, key(KeyCode::Backspace));
        assert_eq!(app.input(), "hélo");

        handle_event(&mut app, key(KeyCode::Home));
        handle_event(&mut app, key(KeyCode::Delete));
        assert_eq!(app.input(), "élo");

        handle_event(&mut app, key(KeyCode::End));
        type_text(&mut app, "!");
        assert_eq!(app.input(), "élo!");

        handle_event(
            &mut app,
            AppEvent::Key(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL)),
        );
        assert_eq!(app.input(), "");
    }

    #[test]
    fn ctrl_c_and_esc_quit() {
        let mut app = app();
        handle_event(
            &mut app,
            AppEvent::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
        );
        assert!(app.should_quit);

        let mut app = self::app();
        handle_event(&mut app, key(KeyCode::Esc));
        assert!(app.should_quit);
    }
}
