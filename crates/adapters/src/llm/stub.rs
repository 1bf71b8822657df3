//! Stub LLM backend for testing and offline mode

use async_trait::async_trait;
use newsroom_domain::{LlmBackend, LlmError};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Backend that replays configured replies
pub struct StubLlm {
    name: &'static str,
    replies: Mutex<Vec<Result<String, String>>>,
    fallback: Option<String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl StubLlm {
    /// Always answer with `reply`
    pub fn fixed(reply: impl Into<String>) -> Self {
        Self {
            name: "stub",
            replies: Mutex::new(vec![]),
            fallback: Some(reply.into()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fail
    pub fn failing() -> Self {
        Self {
            name: "stub",
            replies: Mutex::new(vec![]),
            fallback: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer with `replies` in order, then fail
    pub fn sequence<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut replies: Vec<Result<String, String>> =
            replies.into_iter().map(|r| Ok(r.into())).collect();
        replies.reverse();
        Self {
            name: "stub",
            replies: Mutex::new(replies),
            fallback: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Take `delay` before answering each completion
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of completions requested so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmBackend for StubLlm {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = self
            .replies
            .lock()
            .map_err(|e| LlmError::Api(e.to_string()))?
            .pop();

        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(error)) => Err(LlmError::Api(error)),
            None => self
                .fallback
                .clone()
                .ok_or_else(|| LlmError::Api("stub backend has no reply".to_string())),
        }
    }
}
