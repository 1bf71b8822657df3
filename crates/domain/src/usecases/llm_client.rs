//! LLM client use case - ordered failover across two backends

use std::sync::Arc;
use std::time::Duration;

use crate::ports::LlmBackend;

/// Outcome of a generation across all backends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generated {
    Text(String),
    Empty,
}

impl Generated {
    pub fn into_option(self) -> Option<String> {
        match self {
            Generated::Text(text) => Some(text),
            Generated::Empty => None,
        }
    }
}

/// Calls a primary backend, then a secondary one, each under its own timeout
///
/// Backend failures are never propagated; they only make the client move on.
pub struct LlmClient {
    primary: Option<Arc<dyn LlmBackend>>,
    secondary: Option<Arc<dyn LlmBackend>>,
    timeout: Duration,
}

impl LlmClient {
    /// Order `local` and `cloud` by preference
    pub fn new(
        local: Option<Arc<dyn LlmBackend>>,
        cloud: Option<Arc<dyn LlmBackend>>,
        prefer_local: bool,
        timeout: Duration,
    ) -> Self {
        let (primary, secondary) = if prefer_local {
            (local, cloud)
        } else {
            (cloud, local)
        };
        Self {
            primary,
            secondary,
            timeout,
        }
    }

    pub async fn generate(&self, system: &str, user: &str) -> Generated {
        for backend in [&self.primary, &self.secondary].into_iter().flatten() {
            if let Some(text) = self.try_backend(backend.as_ref(), system, user).await {
                return Generated::Text(text);
            }
        }
        Generated::Empty
    }

    async fn try_backend(&self, backend: &dyn LlmBackend, system: &str, user: &str) -> Option<String> {
        match tokio::time::timeout(self.timeout, backend.complete(system, user)).await {
            Ok(Ok(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    tracing::warn!(backend = backend.name(), "LLM returned empty response");
                    None
                } else {
                    Some(text.to_string())
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(backend = backend.name(), error = %e, "LLM backend failed");
                None
            }
            Err(_) => {
                tracing::warn!(
                    backend = backend.name(),
                    timeout_secs = self.timeout.as_secs_f64(),
                    "LLM backend timed out"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::LlmError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeBackend {
        name: &'static str,
        reply: Result<&'static str, ()>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FakeBackend {
        fn ok(name: &'static str, reply: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                reply: Ok(reply),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                reply: Err(()),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow(name: &'static str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                name,
                reply: Ok("late"),
                delay,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LlmBackend for FakeBackend {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.reply
                .map(str::to_string)
                .map_err(|_| LlmError::Api("HTTP 500".to_string()))
        }
    }

    #[tokio::test]
    async fn test_prefers_local_when_it_answers() {
        let local = FakeBackend::ok("local", "from local");
        let cloud = FakeBackend::ok("cloud", "from cloud");
        let client = LlmClient::new(
            Some(local.clone()),
            Some(cloud.clone()),
            true,
            Duration::from_secs(5),
        );

        assert_eq!(client.generate("s", "u").await, Generated::Text("from local".into()));
        assert_eq!(cloud.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fails_over_to_secondary() {
        let local = FakeBackend::failing("local");
        let cloud = FakeBackend::ok("cloud", "ok");
        let client = LlmClient::new(Some(local), Some(cloud), true, Duration::from_secs(5));

        assert_eq!(client.generate("s", "u").await, Generated::Text("ok".into()));
    }

    #[tokio::test]
    async fn test_cloud_first_when_local_not_preferred() {
        let local = FakeBackend::ok("local", "from local");
        let cloud = FakeBackend::ok("cloud", "from cloud");
        let client = LlmClient::new(Some(local.clone()), Some(cloud), false, Duration::from_secs(5));

        assert_eq!(client.generate("s", "u").await, Generated::Text("from cloud".into()));
        assert_eq!(local.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_reply_counts_as_failure() {
        let local = FakeBackend::ok("local", "   ");
        let cloud = FakeBackend::failing("cloud");
        let client = LlmClient::new(Some(local), Some(cloud), true, Duration::from_secs(5));

        assert_eq!(client.generate("s", "u").await, Generated::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_moves_to_secondary() {
        let local = FakeBackend::slow("local", Duration::from_secs(60));
        let cloud = FakeBackend::ok("cloud", "ok");
        let client = LlmClient::new(Some(local), Some(cloud), true, Duration::from_secs(1));

        assert_eq!(client.generate("s", "u").await, Generated::Text("ok".into()));
    }

    #[tokio::test]
    async fn test_no_backends_is_empty() {
        let client = LlmClient::new(None, None, true, Duration::from_secs(1));
        assert_eq!(client.generate("s", "u").await.into_option(), None);
    }
}
