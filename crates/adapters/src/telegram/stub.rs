//! Stub chat sender for testing and dry runs

use async_trait::async_trait;
use newsroom_domain::{ChatSender, SendError, SentMessage};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

/// Records every send and hands out increasing message ids
pub struct StubChatSender {
    next_id: AtomicI64,
    sends: AtomicUsize,
    failures: Mutex<Vec<SendError>>,
    sent: Mutex<Vec<(String, String)>>,
}

impl StubChatSender {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            sends: AtomicUsize::new(0),
            failures: Mutex::new(vec![]),
            sent: Mutex::new(vec![]),
        }
    }

    /// Fail the next sends with these errors, in order
    pub fn failing_with(self, errors: Vec<SendError>) -> Self {
        let mut errors = errors;
        errors.reverse();
        if let Ok(mut failures) = self.failures.lock() {
            *failures = errors;
        }
        self
    }

    /// Number of send attempts, successful or not
    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    /// Successfully delivered `(chat_id, html)` pairs
    pub fn delivered(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

impl Default for StubChatSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatSender for StubChatSender {
    async fn send_message(&self, chat_id: &str, html: &str) -> Result<SentMessage, SendError> {
        self.sends.fetch_add(1, Ordering::SeqCst);

        let failure = self
            .failures
            .lock()
            .map_err(|e| SendError::Network(e.to_string()))?
            .pop();
        if let Some(error) = failure {
            return Err(error);
        }

        self.sent
            .lock()
            .map_err(|e| SendError::Network(e.to_string()))?
            .push((chat_id.to_string(), html.to_string()));

        Ok(SentMessage {
            message_id: self.next_id.fetch_add(1, Ordering::SeqCst),
        })
    }
}
