/// Who produced a transcript entry. Drives the speaker label and the
/// color it is rendered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    User,
    Assistant,
    Error,
    System,
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub speaker: String,
    pub body: String,
    pub category: Category,
}

pub const WELCOME_MESSAGE: &str =
    "Hello! I'm Gemini, your AI assistant. How can I help you today?";
pub const CLEARED_MESSAGE: &str = "Chat cleared. How can I help you?";

/// The ordered, user-visible record of the conversation. Append-only in
/// normal operation; `reset` wipes it down to a single system entry.
/// Owned by the interactive surface and only ever mutated on the event
/// loop side.
#[derive(Debug)]
pub struct Transcript {
    entries: Vec<Entry>,
}

impl Transcript {
    pub fn new() -> Self {
        let mut transcript = Self {
            entries: Vec::new(),
        };
        transcript.push_system(WELCOME_MESSAGE);
        transcript
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn push(&mut self, speaker: &str, body: &str, category: Category) {
        self.entries.push(Entry {
            speaker: speaker.to_string(),
            body: body.to_string(),
            category,
        });
    }

    pub fn push_user(&mut self, body: &str) {
        self.push("You", body, Category::User);
    }

    pub fn push_assistant(&mut self, body: &str) {
        self.push("Gemini", body, Category::Assistant);
    }

    pub fn push_error(&mut self, body: &str) {
        self.push("Error", body, Category::Error);
    }

    pub fn push_system(&mut self, body: &str) {
        self.push("Gemini", body, Category::System);
    }

    /// Wipe everything and leave a single system entry behind.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.push_system(CLEARED_MESSAGE);
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}
