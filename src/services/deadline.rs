use std::future::Future;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Bounds a dependency call by `deadline`, failing with `Timeout`.
pub async fn with_deadline<T>(
    deadline: Duration,
    what: &str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("⏱️ {} did not answer within {:?}", what, deadline);
            Err(AppError::Timeout(format!(
                "{} did not answer within {:?}",
                what, deadline
            )))
        }
    }
}
