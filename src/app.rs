use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::dispatcher::{ChatService, Dispatcher, Outcome, SubmitError};
use crate::transcript::Transcript;

pub struct App {
    pub should_quit: bool,

    // Conversation state
    pub transcript: Transcript,
    pub dispatcher: Dispatcher,
    pub model_label: String,

    // Input state
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Modal warning (empty submission), dismissed with Enter/Esc
    pub warning: Option<String>,

    // Transcript viewport state (updated during render)
    pub transcript_scroll: u16,
    pub transcript_height: u16,
    pub transcript_width: u16,

    // Animation state: 0-2 for the ellipsis while a request is in flight
    pub animation_frame: u8,
}

impl App {
    pub fn new(
        service: Arc<dyn ChatService>,
        model_label: String,
        outcome_tx: UnboundedSender<Outcome>,
    ) -> Self {
        Self {
            should_quit: false,
            transcript: Transcript::new(),
            dispatcher: Dispatcher::new(service, outcome_tx),
            model_label,
            input: String::new(),
            cursor: 0,
            warning: None,
            transcript_scroll: 0,
            transcript_height: 0,
            transcript_width: 0,
            animation_frame: 0,
        }
    }

    /// Submit whatever is in the input box. While a request is in
    /// flight the send control is inert and the input stays put.
    pub fn submit_input(&mut self) {
        if self.dispatcher.is_busy() {
            return;
        }

        let text = self.input.clone();
        match self.dispatcher.submit(&mut self.transcript, &text) {
            Ok(()) => {
                self.input.clear();
                self.cursor = 0;
                self.scroll_to_bottom();
            }
            Err(SubmitError::EmptyInput) => {
                self.warning = Some("Please enter a message!".to_string());
            }
        }
    }

    /// Apply a completed exchange delivered by the event loop.
    pub fn apply_outcome(&mut self, outcome: Outcome) {
        self.dispatcher.finish(&mut self.transcript, outcome);
        self.scroll_to_bottom();
    }

    pub fn clear_transcript(&mut self) {
        self.dispatcher.clear(&mut self.transcript);
        self.transcript_scroll = 0;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.dispatcher.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self) {
        self.transcript_scroll = self.transcript_scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        let max_scroll = self
            .total_transcript_lines()
            .saturating_sub(self.transcript_height);
        if self.transcript_scroll < max_scroll {
            self.transcript_scroll += 1;
        }
    }

    pub fn scroll_half_page_up(&mut self) {
        self.transcript_scroll = self
            .transcript_scroll
            .saturating_sub(self.transcript_height / 2);
    }

    pub fn scroll_half_page_down(&mut self) {
        let max_scroll = self
            .total_transcript_lines()
            .saturating_sub(self.transcript_height);
        self.transcript_scroll =
            (self.transcript_scroll + self.transcript_height / 2).min(max_scroll);
    }

    /// Scroll so the newest entry (or the "Thinking..." indicator) is
    /// visible.
    pub fn scroll_to_bottom(&mut self) {
        let total_lines = self.total_transcript_lines();

        let visible_height = if self.transcript_height > 0 {
            self.transcript_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.transcript_scroll = total_lines.saturating_sub(visible_height);
        } else {
            self.transcript_scroll = 0;
        }
    }

    /// Wrapped line count of the rendered transcript, using the chat
    /// area width captured during the last render.
    fn total_transcript_lines(&self) -> u16 {
        let wrap_width = if self.transcript_width > 0 {
            self.transcript_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for entry in self.transcript.entries() {
            total_lines += 1; // Speaker line ("You:", "Gemini:", ...)
            for line in entry.body.lines() {
                // Character count, not byte length, for UTF-8 content
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1;
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total_lines += 1; // Blank line after entry
        }

        if self.dispatcher.is_busy() {
            total_lines += 2; // "Gemini:" + "Thinking..."
        }

        total_lines
    }
}
