use std::sync::Arc;
use std::time::Duration;

use crate::cache::Cache;
use crate::error::InfraResult;

use super::OtpKind;

/// 验证码相关键的类型化封装
///
/// 三个键相互独立、TTL 各自管理：
/// - `otp:interval:{kind}:{scene}:{receiver}` 重发间隔标记
/// - `otp:code:{kind}:{scene}:{receiver}` 验证码
/// - `otp:fail:{kind}:{scene}:{receiver}` 失败计数（按尝试次数累加，成功后清除）
#[derive(Clone)]
pub struct OtpCache {
    cache: Arc<dyn Cache>,
}

impl OtpCache {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    pub fn interval_key(kind: OtpKind, scene: &str, receiver: &str) -> String {
        format!("otp:interval:{kind}:{scene}:{receiver}")
    }

    pub fn code_key(kind: OtpKind, scene: &str, receiver: &str) -> String {
        format!("otp:code:{kind}:{scene}:{receiver}")
    }

    pub fn fail_key(kind: OtpKind, scene: &str, receiver: &str) -> String {
        format!("otp:fail:{kind}:{scene}:{receiver}")
    }

    /// 抢占重发间隔标记，并发请求中只有一个会成功
    pub async fn try_acquire_interval(
        &self,
        kind: OtpKind,
        scene: &str,
        receiver: &str,
        interval: Duration,
    ) -> InfraResult<bool> {
        self.cache
            .set_nx(&Self::interval_key(kind, scene, receiver), "1", interval)
            .await
    }

    pub async fn store_code(
        &self,
        kind: OtpKind,
        scene: &str,
        receiver: &str,
        code: &str,
        expires_in: Duration,
    ) -> InfraResult<()> {
        self.cache
            .set(&Self::code_key(kind, scene, receiver), code, Some(expires_in))
            .await
    }

    pub async fn load_code(
        &self,
        kind: OtpKind,
        scene: &str,
        receiver: &str,
    ) -> InfraResult<Option<String>> {
        self.cache.get(&Self::code_key(kind, scene, receiver)).await
    }

    /// 仅当缓存中的验证码仍为 `code` 时删除
    ///
    /// 并发的正确提交中只有一个会返回 `true`。
    pub async fn consume_code(
        &self,
        kind: OtpKind,
        scene: &str,
        receiver: &str,
        code: &str,
    ) -> InfraResult<bool> {
        self.cache
            .del_if_eq(&Self::code_key(kind, scene, receiver), code)
            .await
    }

    /// 尝试次数加一并返回新值，计数器新建时以 `window` 作为过期时间
    ///
    /// 比较之前先计数，并发猜测无法越过阈值。
    pub async fn record_attempt(
        &self,
        kind: OtpKind,
        scene: &str,
        receiver: &str,
        window: Duration,
    ) -> InfraResult<i64> {
        self.cache
            .incr_with_ttl(&Self::fail_key(kind, scene, receiver), window)
            .await
    }

    pub async fn clear_failures(
        &self,
        kind: OtpKind,
        scene: &str,
        receiver: &str,
    ) -> InfraResult<()> {
        self.cache.del(&Self::fail_key(kind, scene, receiver)).await
    }
}
