use ratatui::layout::Rect;
use textgen_chat::{HttpTransport, RequestController};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use futures_util::FutureExt;

/// What the startup health check found out about the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerStatus {
    Checking,
    Online(String),
    Offline(String),
}

pub struct App {
    pub should_quit: bool,
    pub controller: RequestController,
    pub endpoint: String,
    pub server_status: ServerStatus,

    // Input state (text lives in the controller, cursor is a char index)
    pub input_cursor: usize,

    // Chat view state
    pub chat_scroll: u16,
    pub chat_height: u16, // Inner height of the chat area, set on render
    pub chat_area: Option<Rect>,
    chat_lines: u16, // Wrapped line count from the last render
    follow_tail: bool,

    pub animation_frame: u8,

    health_task: Option<JoinHandle<anyhow::Result<String>>>,
}

impl App {
    pub fn new(controller: RequestController, endpoint: impl Into<String>) -> Self {
        Self {
            should_quit: false,
            controller,
            endpoint: endpoint.into(),
            server_status: ServerStatus::Checking,
            input_cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_area: None,
            chat_lines: 0,
            follow_tail: true,
            animation_frame: 0,
            health_task: None,
        }
    }

    /// Check the server root in the background; the result shows in the header.
    pub fn start_health_check(&mut self, transport: HttpTransport) {
        self.server_status = ServerStatus::Checking;
        self.health_task = Some(tokio::spawn(async move { transport.health().await }));
    }

    pub fn is_busy(&self) -> bool {
        self.controller.is_busy()
    }

    pub fn input(&self) -> &str {
        self.controller.input()
    }

    /// Called on every tick: fold finished background work into the state.
    pub fn tick(&mut self) {
        if self.controller.poll() {
            self.scroll_to_bottom();
        }
        self.poll_health();

        if self.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    fn poll_health(&mut self) {
        let Some(handle) = self.health_task.as_mut() else {
            return;
        };
        if !handle.is_finished() {
            return;
        }
        let Some(joined) = handle.now_or_never() else {
            return;
        };
        self.health_task = None;

        self.server_status = match joined {
            Ok(Ok(message)) => {
                info!(%message, "generation server is reachable");
                ServerStatus::Online(message)
            }
            Ok(Err(err)) => {
                warn!(error = %err, "health check failed");
                ServerStatus::Offline(err.to_string())
            }
            Err(err) => {
                warn!(error = %err, "health check task failed");
                ServerStatus::Offline(err.to_string())
            }
        };
    }

    pub fn submit(&mut self) {
        if self.controller.submit_input() {
            self.input_cursor = 0;
            self.animation_frame = 0;
            // Scroll to bottom so the new message and "Thinking..." are visible
            self.scroll_to_bottom();
        }
    }

    // Input editing helpers (cursor is in chars, the buffer is UTF-8)
    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(self.controller.input(), self.input_cursor);
        self.controller.input_mut().insert(byte_pos, c);
        self.input_cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.input_cursor > 0 {
            self.input_cursor -= 1;
            let byte_pos = char_to_byte_index(self.controller.input(), self.input_cursor);
            self.controller.input_mut().remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.input_cursor < self.input_len() {
            let byte_pos = char_to_byte_index(self.controller.input(), self.input_cursor);
            self.controller.input_mut().remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.input_cursor = self.input_cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.input_cursor = (self.input_cursor + 1).min(self.input_len());
    }

    pub fn cursor_home(&mut self) {
        self.input_cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.input_cursor = self.input_len();
    }

    pub fn clear_input(&mut self) {
        self.controller.input_mut().clear();
        self.input_cursor = 0;
    }

    fn input_len(&self) -> usize {
        self.controller.input().chars().count()
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_tail = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.max_scroll();
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max);
        if self.chat_scroll >= max {
            self.follow_tail = true;
        }
    }

    pub fn page_height(&self) -> u16 {
        if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        }
    }

    /// Pin the view to the newest line; stays pinned as the chat grows.
    pub fn scroll_to_bottom(&mut self) {
        self.follow_tail = true;
        self.chat_scroll = self.max_scroll();
    }

    /// Record the wrapped line count the chat pane rendered with.
    pub fn set_chat_lines(&mut self, total: u16) {
        self.chat_lines = total;
        let max = self.max_scroll();
        self.chat_scroll = if self.follow_tail {
            max
        } else {
            self.chat_scroll.min(max)
        };
    }

    fn max_scroll(&self) -> u16 {
        self.chat_lines.saturating_sub(self.page_height())
    }
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_index_maps_to_byte_boundaries() {
        assert_eq!(char_to_byte_index("héllo", 0), 0);
        assert_eq!(char_to_byte_index("héllo", 2), 3);
        assert_eq!(char_to_byte_index("héllo", 99), 6);
    }
}
