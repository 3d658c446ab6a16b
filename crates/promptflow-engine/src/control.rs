use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use promptflow_core::error::{FlowError, Result};

/// Cancellation and deadline for one flow execution.
///
/// Cloning shares the cancellation token, so a caller can keep a clone and
/// cancel an execution that is already running.
#[derive(Debug, Clone, Default)]
pub struct ExecutionControl {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl ExecutionControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deadline `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// True once cancelled or past the deadline.
    pub fn is_expired(&self) -> bool {
        self.check().is_err()
    }

    /// Error to report if the execution must stop now.
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(FlowError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(FlowError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drive `fut` to completion unless cancellation or the deadline fires
    /// first. An already-expired signal wins over a ready future.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;

        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(FlowError::Cancelled),
            _ = deadline => Err(FlowError::DeadlineExceeded),
            result = fut => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_result() {
        let control = ExecutionControl::new();
        assert_eq!(control.deadline(), None);
        let value = control.run(async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn cancelled_token_wins() {
        let control = ExecutionControl::new();
        assert!(!control.is_expired());
        control.cancel();
        assert!(control.is_expired());
        let err = control.run(async { Ok(()) }).await.unwrap_err();
        assert!(matches!(err, FlowError::Cancelled));
    }

    #[tokio::test]
    async fn expired_deadline_wins() {
        let control = ExecutionControl::new().with_deadline(Instant::now());
        let err = control.run(async { Ok(()) }).await.unwrap_err();
        assert!(matches!(err, FlowError::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_aborts_pending_call() {
        let control = ExecutionControl::new().with_timeout(Duration::from_secs(5));
        assert_eq!(control.deadline(), Some(Instant::now() + Duration::from_secs(5)));
        let slow = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("late")
        };
        let err = control.run(slow).await.unwrap_err();
        assert!(matches!(err, FlowError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn cancel_from_another_task() {
        let control = ExecutionControl::new();
        let token = control.cancel_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });
        let err = control
            .run(std::future::pending::<Result<()>>())
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Cancelled));
    }
}
