//! 临时缓存抽象
//!
//! 令牌存储与验证码缓存共享同一个带 TTL 的键值存储。
//! 限流与防重放完全依赖这里的原子原语（`set_nx`、`incr_with_ttl`、`take`、`del_if_eq`），
//! 进程内不做任何加锁。

use std::time::Duration;

use async_trait::async_trait;

use crate::error::InfraResult;

pub mod memory;
pub mod redis;

pub use self::memory::MemoryCache;
pub use self::redis::RedisCache;

/// 带 TTL 的键值缓存
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> InfraResult<Option<String>>;

    /// 写入字符串值，`ttl` 为 `None` 时永不过期
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> InfraResult<()>;

    /// 仅当键不存在时写入，返回是否写入成功
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> InfraResult<bool>;

    async fn del(&self, key: &str) -> InfraResult<()>;

    /// 读取并删除，一次性凭据只会被一个调用方取走
    async fn take(&self, key: &str) -> InfraResult<Option<String>>;

    /// 仅当当前值等于 `expected` 时删除，返回是否由本次调用删除
    async fn del_if_eq(&self, key: &str, expected: &str) -> InfraResult<bool>;

    async fn del_many(&self, keys: &[String]) -> InfraResult<()>;

    async fn exists(&self, key: &str) -> InfraResult<bool>;

    /// 原子递增；仅在计数器新建时设置 TTL，返回递增后的值
    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> InfraResult<i64>;

    async fn sadd(&self, key: &str, member: &str) -> InfraResult<()>;

    async fn srem(&self, key: &str, member: &str) -> InfraResult<()>;

    async fn smembers(&self, key: &str) -> InfraResult<Vec<String>>;
}

/// TTL 以毫秒写入，不足 1ms 的按 1ms 处理
pub(crate) fn ttl_millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}
