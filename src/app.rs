use anyhow::Result;
use tokio::sync::mpsc;

use crate::client::QueryClient;

/// Shown once at startup as the transcript's system greeting.
const GREETING: &str = "Hello! Ask me a question about your petroleum engineering documents.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Bot,
    System,
}

/// A transcript entry. Appended on submission or response arrival and
/// never mutated or removed afterwards; display order is arrival order.
#[derive(Debug, Clone)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Terminal outcome of one query round trip.
pub type QueryOutcome = Result<String>;

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Input state
    pub input: String,
    pub cursor: usize, // char position in input

    // Transcript state
    pub transcript: Vec<Message>,
    pub transcript_scroll: u16,
    pub chat_height: u16, // Inner height of chat area for scroll calculations
    pub chat_width: u16,  // Inner width of chat area for wrap calculations

    // Request state: count of queries in flight. The waiting indicator
    // is visible iff this is non-zero. Submissions while waiting are
    // allowed; outcomes render in completion order.
    in_flight: usize,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Capabilities
    pub enable_clear: bool,

    // Endpoint shown in the title bar
    pub endpoint: String,

    client: QueryClient,
    outcomes_tx: mpsc::UnboundedSender<QueryOutcome>,
}

impl App {
    pub fn new(
        client: QueryClient,
        outcomes_tx: mpsc::UnboundedSender<QueryOutcome>,
        endpoint: String,
        enable_clear: bool,
    ) -> Self {
        let mut app = Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            input: String::new(),
            cursor: 0,

            transcript: Vec::new(),
            transcript_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            in_flight: 0,

            animation_frame: 0,

            enable_clear,
            endpoint,

            client,
            outcomes_tx,
        };
        app.push_message(Sender::System, GREETING.to_string());
        app
    }

    /// Whether a query round trip is outstanding.
    pub fn waiting(&self) -> bool {
        self.in_flight > 0
    }

    /// Append a transcript entry and keep the newest entry visible.
    pub fn push_message(&mut self, sender: Sender, text: String) {
        self.transcript.push(Message { sender, text });
        self.scroll_to_bottom();
    }

    /// Submit the current input as a query.
    ///
    /// Trimmed-empty input is a no-op. Otherwise the user message is
    /// appended, the input cleared, and one background task spawned whose
    /// only effect is sending its outcome over the channel.
    pub fn submit(&mut self) {
        let query = self.input.trim().to_string();
        if query.is_empty() {
            return;
        }

        self.push_message(Sender::User, query.clone());

        self.input.clear();
        self.cursor = 0;

        self.in_flight += 1;
        self.scroll_to_bottom();

        tracing::info!(chars = query.chars().count(), "submitting query");

        let client = self.client.clone();
        let tx = self.outcomes_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(client.query(&query).await);
        });
    }

    /// Handle one query outcome arriving from the channel.
    pub fn resolve(&mut self, outcome: QueryOutcome) {
        self.in_flight = self.in_flight.saturating_sub(1);

        match outcome {
            Ok(answer) => self.push_message(Sender::Bot, answer),
            Err(err) => {
                tracing::warn!("query failed: {err}");
                self.push_message(Sender::Bot, format!("Error: {}", err));
            }
        }
    }

    /// Empty the transcript back to the greeting. Only reachable when the
    /// clear capability is enabled.
    pub fn clear_transcript(&mut self) {
        self.transcript.clear();
        self.transcript_scroll = 0;
        self.push_message(Sender::System, GREETING.to_string());
        tracing::info!("transcript cleared");
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.waiting() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Total rendered transcript lines at the current chat width,
    /// including the waiting indicator when shown.
    fn transcript_lines(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in &self.transcript {
            if msg.sender != Sender::System {
                total_lines += 1; // Label line ("You:" or "PetroRAG:")
            }
            for line in msg.text.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1; // Empty line still takes one line
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total_lines += 1; // Blank line after message
        }

        if self.waiting() {
            total_lines += 2; // "PetroRAG:" + "Thinking..."
        }

        total_lines
    }

    /// Scroll the transcript so the newest entry (or the waiting
    /// indicator) is visible.
    pub fn scroll_to_bottom(&mut self) {
        let total_lines = self.transcript_lines();

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.transcript_scroll = total_lines.saturating_sub(visible_height);
        } else {
            self.transcript_scroll = 0;
        }
    }

    // Transcript scrolling
    pub fn scroll_down(&mut self) {
        let max_scroll = self.transcript_lines().saturating_sub(self.chat_height);
        if self.transcript_scroll < max_scroll {
            self.transcript_scroll = self.transcript_scroll.saturating_add(1);
        }
    }

    pub fn scroll_up(&mut self) {
        self.transcript_scroll = self.transcript_scroll.saturating_sub(1);
    }

    pub fn scroll_half_page_down(&mut self) {
        let half_page = self.chat_height / 2;
        let max_scroll = self.transcript_lines().saturating_sub(self.chat_height);
        self.transcript_scroll = (self.transcript_scroll + half_page).min(max_scroll);
    }

    pub fn scroll_half_page_up(&mut self) {
        let half_page = self.chat_height / 2;
        self.transcript_scroll = self.transcript_scroll.saturating_sub(half_page);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn test_app() -> (App, mpsc::UnboundedReceiver<QueryOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        // Unroutable endpoint: submissions spawn a real task whose outcome
        // is a prompt connection error, delivered over the channel.
        let client = QueryClient::new("http://127.0.0.1:1");
        let app = App::new(client, tx, "http://127.0.0.1:1".to_string(), false);
        (app, rx)
    }

    #[test]
    fn test_starts_with_greeting() {
        let (app, _rx) = test_app();
        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.transcript[0].sender, Sender::System);
        assert!(!app.waiting());
    }

    #[test]
    fn test_submit_whitespace_is_noop() {
        let (mut app, _rx) = test_app();
        app.input = "   ".to_string();
        app.cursor = 3;

        app.submit();

        assert_eq!(app.transcript.len(), 1); // greeting only
        assert!(!app.waiting());
        // Input is left alone on a no-op
        assert_eq!(app.input, "   ");
    }

    #[tokio::test]
    async fn test_submit_appends_user_and_sets_waiting() {
        let (mut app, _rx) = test_app();
        app.input = "  What is porosity?  ".to_string();

        app.submit();

        assert_eq!(app.transcript.len(), 2);
        let last = app.transcript.last().unwrap();
        assert_eq!(last.sender, Sender::User);
        assert_eq!(last.text, "What is porosity?");
        assert!(app.input.is_empty());
        assert_eq!(app.cursor, 0);
        assert!(app.waiting());
    }

    #[test]
    fn test_resolve_success_appends_bot() {
        let (mut app, _rx) = test_app();
        app.in_flight = 1;

        app.resolve(Ok("Porosity is...".to_string()));

        let last = app.transcript.last().unwrap();
        assert_eq!(last.sender, Sender::Bot);
        assert_eq!(last.text, "Porosity is...");
        assert!(!app.waiting());
    }

    #[test]
    fn test_resolve_failure_renders_error_prefix() {
        let (mut app, _rx) = test_app();
        app.in_flight = 1;

        app.resolve(Err(anyhow!("Server error: 500")));

        let last = app.transcript.last().unwrap();
        assert_eq!(last.sender, Sender::Bot);
        assert_eq!(last.text, "Error: Server error: 500");
        assert!(!app.waiting());
    }

    #[tokio::test]
    async fn test_completed_cycle_grows_transcript_by_two() {
        let (mut app, mut rx) = test_app();
        app.input = "What is porosity?".to_string();

        app.submit();
        let outcome = rx.recv().await.unwrap();
        app.resolve(outcome);

        // greeting + user + bot
        assert_eq!(app.transcript.len(), 3);
        assert_eq!(app.transcript[1].sender, Sender::User);
        assert_eq!(app.transcript[2].sender, Sender::Bot);
        // The unroutable endpoint fails; failures render as bot errors.
        assert!(app.transcript[2].text.starts_with("Error: "));
        assert!(!app.waiting());
    }

    #[tokio::test]
    async fn test_overlapping_submissions_keep_indicator_until_last() {
        let (mut app, mut rx) = test_app();

        app.input = "first".to_string();
        app.submit();
        app.input = "second".to_string();
        app.submit();
        assert!(app.waiting());

        app.resolve(rx.recv().await.unwrap());
        assert!(app.waiting());

        app.resolve(rx.recv().await.unwrap());
        assert!(!app.waiting());
        // greeting + 2 user + 2 bot
        assert_eq!(app.transcript.len(), 5);
    }

    #[test]
    fn test_earlier_messages_never_mutated() {
        let (mut app, _rx) = test_app();
        app.push_message(Sender::User, "one".to_string());
        let snapshot: Vec<String> = app.transcript.iter().map(|m| m.text.clone()).collect();

        app.push_message(Sender::Bot, "two".to_string());
        app.push_message(Sender::Bot, "three".to_string());

        for (before, after) in snapshot.iter().zip(app.transcript.iter()) {
            assert_eq!(before, &after.text);
        }
        assert_eq!(app.transcript.len(), snapshot.len() + 2);
    }

    #[test]
    fn test_clear_resets_to_greeting() {
        let (mut app, _rx) = test_app();
        app.push_message(Sender::User, "one".to_string());
        app.push_message(Sender::Bot, "two".to_string());

        app.clear_transcript();

        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.transcript[0].sender, Sender::System);
    }

    #[test]
    fn test_scroll_to_bottom_with_long_transcript() {
        let (mut app, _rx) = test_app();
        app.chat_height = 5;
        app.chat_width = 20;
        for i in 0..10 {
            app.push_message(Sender::Bot, format!("message number {}", i));
        }
        assert!(app.transcript_scroll > 0);

        app.scroll_up();
        let scrolled = app.transcript_scroll;
        app.scroll_down();
        assert_eq!(app.transcript_scroll, scrolled + 1);
    }
}
