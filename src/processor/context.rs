use crate::error::{GatewayError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Deadline and cancellation signal carried by one routing call
#[derive(Debug, Clone)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CallContext {
    /// A context with no deadline that is never cancelled
    pub fn new() -> Self {
        Self {
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancel: CancellationToken::new(),
        }
    }

    /// Tie this context to an external cancellation token (e.g. process shutdown)
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Context for the next of `attempts_left` sequential attempts.
    ///
    /// The remaining budget is divided evenly, so an attempt that runs to its
    /// own deadline still leaves time for the ones after it. The overall
    /// deadline is never extended. Cancellation is shared.
    pub fn for_attempt(&self, attempts_left: u32) -> CallContext {
        let deadline = self.remaining().map(|remaining| {
            Instant::now() + remaining / attempts_left.max(1)
        });
        Self {
            deadline,
            cancel: self.cancel.clone(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Drive `fut` until it finishes, the deadline passes or the context is cancelled
    pub async fn run<F, T>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, fut)
                    .await
                    .unwrap_or_else(|_| {
                        Err(GatewayError::Timeout(format!(
                            "{} exceeded the call deadline",
                            operation
                        )))
                    }),
                None => fut.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(GatewayError::Cancelled(operation.to_string())),
            result = bounded => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_passes_result_through() {
        let ctx = CallContext::with_timeout(Duration::from_secs(5));
        let value = ctx.run("op", async { Ok::<_, GatewayError>(42) }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_yields_timeout() {
        let ctx = CallContext::with_timeout(Duration::from_millis(100));
        let result = ctx
            .run("slow op", async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, GatewayError>(())
            })
            .await;

        assert!(matches!(result, Err(GatewayError::Timeout(_))));
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }

    #[tokio::test]
    async fn test_cancellation_aborts_promptly() {
        let token = CancellationToken::new();
        let ctx = CallContext::new().with_cancellation(token.clone());
        token.cancel();

        let result = ctx
            .run("op", std::future::pending::<Result<()>>())
            .await;

        assert!(matches!(result, Err(GatewayError::Cancelled(_))));
        assert!(ctx.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_budget_splits_remaining_time() {
        let ctx = CallContext::with_timeout(Duration::from_secs(2));

        let first = ctx.for_attempt(2);
        assert_eq!(first.remaining(), Some(Duration::from_secs(1)));

        tokio::time::advance(Duration::from_secs(1)).await;
        let last = ctx.for_attempt(1);
        assert_eq!(last.remaining(), Some(Duration::from_secs(1)));
        assert_eq!(last.deadline(), ctx.deadline());

        let unbounded = CallContext::new().for_attempt(2);
        assert!(unbounded.deadline().is_none());

        ctx.cancel();
        assert!(first.is_cancelled());
    }

    #[test]
    fn test_default_has_no_deadline() {
        let ctx = CallContext::default();
        assert!(ctx.deadline().is_none());
        assert!(ctx.remaining().is_none());
        assert!(!ctx.is_cancelled());
    }
}
