use std::future::Future;
use std::time::Duration;

use warden_core::{AppError, AppResult};

/// Per-call deadline applied to every remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CallBudget {
    limit: Duration,
}

impl CallBudget {
    pub(crate) fn new(limit: Duration) -> Self {
        Self { limit }
    }

    /// Bounds a membership platform call. A timeout becomes a transition error.
    pub(crate) async fn membership<T>(
        &self,
        operation: &str,
        call: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        match tokio::time::timeout(self.limit, call).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Transition(self.timed_out(operation))),
        }
    }

    /// Bounds a restriction store call. A timeout becomes a persistence error.
    pub(crate) async fn store<T>(
        &self,
        operation: &str,
        call: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        match tokio::time::timeout(self.limit, call).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Persistence(self.timed_out(operation))),
        }
    }

    fn timed_out(&self, operation: &str) -> String {
        format!("{operation} timed out after {}ms", self.limit.as_millis())
    }
}
