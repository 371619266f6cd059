use crate::chat::Conversation;
use crate::config;
use crate::ollama::OllamaClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Per-turn state. One turn is in flight at most; the handler refuses
/// new submissions until the current turn returns to `Idle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Turn {
    /// Waiting for user input.
    Idle,
    /// Prompt sent, no chunk received yet.
    Awaiting,
    /// Chunks arriving; the buffer accumulates the partial reply.
    Streaming { buffer: String },
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub turn: Turn,

    // Conversation
    pub conversation: Conversation,

    // Input box
    pub input: String,
    pub cursor: usize, // cursor position in chars

    // Inline status line (startup probe result or turn failure)
    pub status: Option<String>,

    // Chat viewport
    pub scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Backend
    pub ollama: OllamaClient,
    pub model: String,
}

impl App {
    pub fn new(ollama: OllamaClient, model: String) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            turn: Turn::Idle,
            conversation: Conversation::seeded(),
            input: String::new(),
            cursor: 0,
            status: None,
            scroll: 0,
            chat_height: 0,
            chat_width: 0,
            animation_frame: 0,
            ollama,
            model,
        }
    }

    pub fn turn_in_flight(&self) -> bool {
        self.turn != Turn::Idle
    }

    /// Record the user's prompt and move into the awaiting state. The
    /// caller spawns the backend task.
    pub fn begin_turn(&mut self, prompt: &str) {
        self.conversation.push_user(prompt);
        self.turn = Turn::Awaiting;
        self.status = None;
        self.scroll_to_bottom();
    }

    /// Fold one chunk's text into the streaming buffer.
    pub fn apply_chunk(&mut self, text: &str) {
        match &mut self.turn {
            Turn::Streaming { buffer } => buffer.push_str(text),
            Turn::Awaiting => {
                self.turn = Turn::Streaming {
                    buffer: text.to_string(),
                };
            }
            Turn::Idle => {} // stale chunk from a finished turn
        }
        self.scroll_to_bottom();
    }

    /// Stream exhausted: append the buffer as the assistant reply,
    /// unless it is empty.
    pub fn finish_turn(&mut self) {
        if let Turn::Streaming { buffer } = std::mem::replace(&mut self.turn, Turn::Idle) {
            if !buffer.is_empty() {
                self.conversation.push_assistant(buffer);
            }
        }
        self.scroll_to_bottom();
    }

    /// Both backend calls failed: show the fixed error inline and leave
    /// the conversation untouched.
    pub fn fail_turn(&mut self) {
        self.turn = Turn::Idle;
        self.status = Some(config::STREAM_FAILED_MESSAGE.to_string());
        self.scroll_to_bottom();
    }

    /// Reset the conversation to the seed greeting. Only meaningful
    /// from Idle; ignored while a turn is in flight.
    pub fn clear_chat(&mut self) {
        if self.turn_in_flight() {
            return;
        }
        self.conversation.reset();
        self.status = None;
        self.scroll = 0;
    }

    /// The partial reply currently visible, if any.
    pub fn streaming_text(&self) -> Option<&str> {
        match &self.turn {
            Turn::Streaming { buffer } => Some(buffer),
            _ => None,
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.turn_in_flight() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Chat viewport scrolling
    pub fn scroll_up(&mut self) {
        self.scroll = self.scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        let max_scroll = self.total_chat_lines().saturating_sub(self.chat_height);
        if self.scroll < max_scroll {
            self.scroll += 1;
        }
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll = 0;
    }

    /// Keep the tail of the conversation (and the streaming partial)
    /// in view.
    pub fn scroll_to_bottom(&mut self) {
        let total_lines = self.total_chat_lines();
        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.scroll = total_lines - visible_height;
        } else {
            self.scroll = 0;
        }
    }

    /// Estimate rendered line count for the chat viewport, accounting
    /// for wrapping.
    fn total_chat_lines(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in self.conversation.messages() {
            total_lines += 1; // Role line
            total_lines += wrapped_line_count(&msg.content, wrap_width);
            total_lines += 1; // Blank line after message
        }

        match &self.turn {
            Turn::Awaiting => total_lines += 2, // Role line + "Thinking..."
            Turn::Streaming { buffer } => {
                total_lines += 1 + wrapped_line_count(buffer, wrap_width);
            }
            Turn::Idle => {}
        }

        if self.status.is_some() {
            total_lines += 2;
        }

        total_lines
    }

    // Input editing (UTF-8 safe, cursor in chars)
    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete_char(&mut self) {
        let char_count = self.input.chars().count();
        if self.cursor < char_count {
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        let char_count = self.input.chars().count();
        self.cursor = (self.cursor + 1).min(char_count);
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.input.chars().count();
    }

    /// Take the pending input, leaving the box empty.
    pub fn take_input(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.input)
    }
}

/// Lines a string occupies when wrapped at `width`, counting chars for
/// proper UTF-8 handling.
fn wrapped_line_count(text: &str, width: usize) -> u16 {
    let mut lines: u16 = 0;
    for line in text.lines() {
        let char_count = line.chars().count();
        if char_count == 0 {
            lines += 1; // Empty line still takes one line
        } else {
            lines += ((char_count / width) + 1) as u16;
        }
    }
    lines.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatRole;

    fn app() -> App {
        App::new(OllamaClient::new(config::OLLAMA_BASE_URL), config::MODEL_NAME.to_string())
    }

    #[test]
    fn successful_turn_appends_user_then_assistant() {
        let mut app = app();
        let before = app.conversation.len();

        app.begin_turn("why is my laptop slow?");
        assert!(app.turn_in_flight());

        app.apply_chunk("Hel");
        app.apply_chunk("lo");
        app.finish_turn();

        assert!(!app.turn_in_flight());
        assert_eq!(app.conversation.len(), before + 2);
        let last = app.conversation.messages().last().unwrap();
        assert_eq!(last.role, ChatRole::Assistant);
        // The buffer is stored verbatim; the ▌ marker is render-only.
        assert_eq!(last.content, "Hello");
    }

    #[test]
    fn empty_stream_appends_only_the_user_message() {
        let mut app = app();
        let before = app.conversation.len();

        app.begin_turn("anyone there?");
        app.finish_turn();

        assert_eq!(app.conversation.len(), before + 1);
        assert_eq!(
            app.conversation.messages().last().unwrap().role,
            ChatRole::User
        );
    }

    #[test]
    fn failed_turn_shows_error_and_leaves_history_alone() {
        let mut app = app();
        let before = app.conversation.len();

        app.begin_turn("hello?");
        app.fail_turn();

        assert!(!app.turn_in_flight());
        assert_eq!(app.conversation.len(), before + 1);
        assert_eq!(app.status.as_deref(), Some(config::STREAM_FAILED_MESSAGE));
    }

    #[test]
    fn next_turn_clears_the_error() {
        let mut app = app();
        app.begin_turn("hello?");
        app.fail_turn();
        app.begin_turn("are you back?");
        assert!(app.status.is_none());
    }

    #[test]
    fn clear_chat_resets_to_seed() {
        let mut app = app();
        app.begin_turn("q1");
        app.apply_chunk("a1");
        app.finish_turn();

        app.clear_chat();
        assert_eq!(app.conversation.len(), 1);
        assert_eq!(
            app.conversation.messages()[0].content,
            config::INITIAL_MESSAGE
        );
    }

    #[test]
    fn clear_chat_is_ignored_mid_turn() {
        let mut app = app();
        app.begin_turn("q1");
        app.apply_chunk("partial");
        app.clear_chat();
        assert!(app.turn_in_flight());
        assert_eq!(app.conversation.len(), 2);
    }

    #[test]
    fn stale_chunk_after_idle_is_dropped() {
        let mut app = app();
        app.apply_chunk("late");
        assert_eq!(app.turn, Turn::Idle);
        assert_eq!(app.conversation.len(), 1);
    }

    #[test]
    fn input_editing_is_utf8_safe() {
        let mut app = app();
        app.insert_char('é');
        app.insert_char('🤖');
        app.insert_char('x');
        assert_eq!(app.input, "é🤖x");

        app.cursor_left();
        app.backspace(); // removes 🤖
        assert_eq!(app.input, "éx");

        app.cursor_home();
        app.delete_char(); // removes é
        assert_eq!(app.input, "x");
    }

    #[test]
    fn take_input_empties_the_box() {
        let mut app = app();
        for c in "help".chars() {
            app.insert_char(c);
        }
        assert_eq!(app.take_input(), "help");
        assert!(app.input.is_empty());
        assert_eq!(app.cursor, 0);
    }

    #[test]
    fn wrapped_line_count_counts_chars_not_bytes() {
        // 10 multi-byte chars at width 5 wrap to 3 lines ((10 / 5) + 1).
        let text = "éééééééééé";
        assert_eq!(wrapped_line_count(text, 5), 3);
        assert_eq!(wrapped_line_count("", 5), 1);
    }
}
