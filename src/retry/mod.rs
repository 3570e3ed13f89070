//! 重试策略模块
//!
//! 通知通道调用外部供应商时使用，等待期间响应调用方的取消信号。

pub mod exponential;

pub use exponential::ExponentialBackoffPolicy;

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::InfraResult;

/// 重试策略 trait
pub trait RetryPolicy: Send + Sync {
    /// 第 `attempt` 次（从 1 开始）失败后是否继续重试
    fn should_retry(&self, attempt: usize) -> bool;
    /// 第 `attempt` 次失败后的等待时间
    fn backoff_duration(&self, attempt: usize) -> Duration;
    fn max_attempts(&self) -> usize;
}

/// 重试被取消时返回的错误
#[derive(Debug, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// 按策略重试 `op`，直到成功、重试次数耗尽或被取消
///
/// 取消会同时中断正在进行的调用与退避等待，返回的错误可通过
/// `err.is::<Cancelled>()` 识别。
pub async fn retry_with_cancel<T, F, Fut>(
    policy: &dyn RetryPolicy,
    cancel: &CancellationToken,
    operation: &str,
    mut op: F,
) -> InfraResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = InfraResult<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Cancelled.into()),
            result = op() => result,
        };

        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !policy.should_retry(attempt) {
            return Err(err.context(format!("{operation} failed after {attempt} attempts")));
        }

        let backoff = policy.backoff_duration(attempt);
        warn!(
            operation,
            attempt,
            max_attempts = policy.max_attempts(),
            backoff_ms = backoff.as_millis() as u64,
            error = %err,
            "attempt failed, retrying"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Cancelled.into()),
            _ = tokio::time::sleep(backoff) => {}
        }
    }
}
