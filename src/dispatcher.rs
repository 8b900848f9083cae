use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::transcript::Transcript;

/// One remote conversation. Implemented by the Gemini session; tests
/// substitute a fake.
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn send(&self, text: &str) -> Result<String>;
}

/// Terminal result of one exchange, posted by the worker task. Failures
/// are folded into their description here so nothing unwinds past the
/// worker boundary.
#[derive(Debug)]
pub enum Outcome {
    Reply(String),
    Failure(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("message is empty")]
    EmptyInput,
}

/// Keeps the interactive surface responsive while a remote call is
/// outstanding. `submit` reflects the user's text in the transcript,
/// flips to Busy, and spawns one worker task; the worker posts an
/// `Outcome` on the channel, which the event loop hands back to
/// `finish`. Transcript mutation happens only on the event loop side.
///
/// At most one call is in flight at a time: `submit` while Busy is a
/// no-op, not a queue. There is no retry, timeout, or cancellation.
pub struct Dispatcher {
    service: Arc<dyn ChatService>,
    outcome_tx: mpsc::UnboundedSender<Outcome>,
    in_flight: bool,
}

impl Dispatcher {
    pub fn new(service: Arc<dyn ChatService>, outcome_tx: mpsc::UnboundedSender<Outcome>) -> Self {
        Self {
            service,
            outcome_tx,
            in_flight: false,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    /// Accept a user submission. Appends the user entry synchronously,
    /// before any asynchronous work runs. While Busy the submission is
    /// blocked outright and the empty-input check does not apply.
    pub fn submit(&mut self, transcript: &mut Transcript, text: &str) -> Result<(), SubmitError> {
        if self.in_flight {
            return Ok(());
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(SubmitError::EmptyInput);
        }

        transcript.push_user(text);
        self.in_flight = true;

        let service = Arc::clone(&self.service);
        let outcome_tx = self.outcome_tx.clone();
        let text = text.to_string();
        tokio::spawn(async move {
            // The call runs in its own task so even a panicking service
            // implementation still yields exactly one outcome.
            let result = tokio::spawn(async move { service.send(&text).await }).await;
            let outcome = match result {
                Ok(Ok(reply)) => Outcome::Reply(reply),
                Ok(Err(err)) => Outcome::Failure(err.to_string()),
                Err(join_err) => Outcome::Failure(join_err.to_string()),
            };
            // The receiver only goes away on shutdown; a late outcome
            // with no one to read it is simply abandoned.
            let _ = outcome_tx.send(outcome);
        });

        Ok(())
    }

    /// Apply a worker's outcome. Re-enabling submission is
    /// unconditional: it happens before and regardless of how the
    /// outcome renders.
    pub fn finish(&mut self, transcript: &mut Transcript, outcome: Outcome) {
        self.in_flight = false;
        match outcome {
            Outcome::Reply(reply) => transcript.push_assistant(&reply),
            Outcome::Failure(description) => transcript.push_error(&description),
        }
    }

    /// Wipe the transcript down to a fresh system entry. Does not touch
    /// an in-flight request; a reply arriving later lands on the
    /// cleared transcript.
    pub fn clear(&self, transcript: &mut Transcript) {
        transcript.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Category;
    use anyhow::anyhow;
    use tokio::sync::{mpsc::UnboundedReceiver, Notify};

    enum Canned {
        Reply(String),
        Fail(String),
    }

    struct CannedService(Canned);

    #[async_trait]
    impl ChatService for CannedService {
        async fn send(&self, _text: &str) -> Result<String> {
            match &self.0 {
                Canned::Reply(reply) => Ok(reply.clone()),
                Canned::Fail(description) => Err(anyhow!(description.clone())),
            }
        }
    }

    /// Blocks every send until the gate is released, so tests can
    /// observe the Busy state deterministically.
    struct GatedService {
        gate: Arc<Notify>,
        reply: String,
    }

    #[async_trait]
    impl ChatService for GatedService {
        async fn send(&self, _text: &str) -> Result<String> {
            self.gate.notified().await;
            Ok(self.reply.clone())
        }
    }

    fn dispatcher(service: impl ChatService + 'static) -> (Dispatcher, UnboundedReceiver<Outcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Dispatcher::new(Arc::new(service), tx), rx)
    }

    #[tokio::test]
    async fn empty_input_is_rejected_without_side_effects() {
        let (mut dispatcher, _rx) = dispatcher(CannedService(Canned::Reply("hi".into())));
        let mut transcript = Transcript::new();
        let before = transcript.entries().len();

        assert_eq!(
            dispatcher.submit(&mut transcript, ""),
            Err(SubmitError::EmptyInput)
        );
        assert_eq!(
            dispatcher.submit(&mut transcript, "  \n\t "),
            Err(SubmitError::EmptyInput)
        );
        assert_eq!(transcript.entries().len(), before);
        assert!(!dispatcher.is_busy());
    }

    #[tokio::test]
    async fn submit_appends_user_entry_synchronously() {
        let gate = Arc::new(Notify::new());
        let (mut dispatcher, _rx) = dispatcher(GatedService {
            gate: Arc::clone(&gate),
            reply: "hi".into(),
        });
        let mut transcript = Transcript::new();

        dispatcher.submit(&mut transcript, "hello").unwrap();

        // The gate is still closed, so no completion has run yet.
        let entries = transcript.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].category, Category::User);
        assert_eq!(entries[1].body, "hello");
        assert!(dispatcher.is_busy());
    }

    #[tokio::test]
    async fn reply_appends_assistant_entry_and_returns_to_idle() {
        let (mut dispatcher, mut rx) = dispatcher(CannedService(Canned::Reply("hi there".into())));
        let mut transcript = Transcript::new();

        dispatcher.submit(&mut transcript, "hello").unwrap();
        let outcome = rx.recv().await.unwrap();
        dispatcher.finish(&mut transcript, outcome);

        let entries = transcript.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].category, Category::User);
        assert_eq!(entries[1].body, "hello");
        assert_eq!(entries[2].category, Category::Assistant);
        assert_eq!(entries[2].body, "hi there");
        assert!(!dispatcher.is_busy());
    }

    #[tokio::test]
    async fn failure_appends_error_entry_and_returns_to_idle() {
        let (mut dispatcher, mut rx) = dispatcher(CannedService(Canned::Fail("timeout".into())));
        let mut transcript = Transcript::new();

        dispatcher.submit(&mut transcript, "ping").unwrap();
        let outcome = rx.recv().await.unwrap();
        dispatcher.finish(&mut transcript, outcome);

        let entries = transcript.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].body, "ping");
        assert_eq!(entries[2].category, Category::Error);
        assert_eq!(entries[2].body, "timeout");
        assert!(!dispatcher.is_busy());
    }

    #[tokio::test]
    async fn submission_while_busy_is_blocked() {
        let gate = Arc::new(Notify::new());
        let (mut dispatcher, mut rx) = dispatcher(GatedService {
            gate: Arc::clone(&gate),
            reply: "first".into(),
        });
        let mut transcript = Transcript::new();

        dispatcher.submit(&mut transcript, "a").unwrap();
        // Blocked, not queued: no transcript change, no error.
        assert_eq!(dispatcher.submit(&mut transcript, "b"), Ok(()));
        // The empty-input check does not apply while Busy.
        assert_eq!(dispatcher.submit(&mut transcript, ""), Ok(()));

        gate.notify_one();
        let outcome = rx.recv().await.unwrap();
        dispatcher.finish(&mut transcript, outcome);

        let entries = transcript.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].body, "a");
        assert_eq!(entries[2].body, "first");
        assert!(entries.iter().all(|entry| entry.body != "b"));
        assert!(!dispatcher.is_busy());

        // Exactly one outcome was produced for the exchange.
        assert!(rx.try_recv().is_err());
    }

    struct PanickyService;

    #[async_trait]
    impl ChatService for PanickyService {
        async fn send(&self, _text: &str) -> Result<String> {
            panic!("service blew up");
        }
    }

    #[tokio::test]
    async fn panicking_service_still_completes_the_exchange() {
        let (mut dispatcher, mut rx) = dispatcher(PanickyService);
        let mut transcript = Transcript::new();

        dispatcher.submit(&mut transcript, "hello").unwrap();
        let outcome = rx.recv().await.unwrap();
        dispatcher.finish(&mut transcript, outcome);

        let entries = transcript.entries();
        assert_eq!(entries.last().unwrap().category, Category::Error);
        assert!(!dispatcher.is_busy());
    }

    #[tokio::test]
    async fn submission_text_is_trimmed() {
        let (mut dispatcher, _rx) = dispatcher(CannedService(Canned::Reply("hi".into())));
        let mut transcript = Transcript::new();

        dispatcher.submit(&mut transcript, "  hello  ").unwrap();
        assert_eq!(transcript.entries()[1].body, "hello");
    }

    #[tokio::test]
    async fn clear_resets_to_a_single_system_entry() {
        let (mut dispatcher, mut rx) = dispatcher(CannedService(Canned::Reply("hi".into())));
        let mut transcript = Transcript::new();

        dispatcher.submit(&mut transcript, "hello").unwrap();
        let outcome = rx.recv().await.unwrap();
        dispatcher.finish(&mut transcript, outcome);

        dispatcher.clear(&mut transcript);
        assert_eq!(transcript.entries().len(), 1);
        assert_eq!(transcript.entries()[0].category, Category::System);
    }

    #[tokio::test]
    async fn late_reply_lands_on_cleared_transcript() {
        let gate = Arc::new(Notify::new());
        let (mut dispatcher, mut rx) = dispatcher(GatedService {
            gate: Arc::clone(&gate),
            reply: "late".into(),
        });
        let mut transcript = Transcript::new();

        dispatcher.submit(&mut transcript, "hello").unwrap();
        dispatcher.clear(&mut transcript);
        assert!(dispatcher.is_busy());

        gate.notify_one();
        let outcome = rx.recv().await.unwrap();
        dispatcher.finish(&mut transcript, outcome);

        let entries = transcript.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].category, Category::System);
        assert_eq!(entries[1].category, Category::Assistant);
        assert_eq!(entries[1].body, "late");
        assert!(!dispatcher.is_busy());
    }
}
