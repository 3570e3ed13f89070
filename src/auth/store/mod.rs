use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::InfraResult;

pub mod cache;

pub use self::cache::CacheTokenStore;

/// 一次签发对应的有状态记录
///
/// 记录存在且未过期，令牌才被视为有效；删除记录即可提前撤销令牌。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub jti: String,
    pub user_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// 签名后的令牌原文
    pub token: String,
}

impl TokenRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// 令牌存储接口，记录活跃令牌并维护按用户的索引
///
/// 主记录与用户索引分两次写入，不做跨键事务；
/// 索引中的失效条目在读取时被顺带清理。
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// 写入主记录（TTL 为剩余有效期）并加入用户索引
    async fn save(&self, record: &TokenRecord) -> InfraResult<()>;

    async fn get(&self, jti: &str) -> InfraResult<Option<TokenRecord>>;

    /// 删除用户的单个令牌，重复调用不报错
    async fn delete_one(&self, user_id: &str, jti: &str) -> InfraResult<()>;

    /// 删除用户的全部令牌及其索引
    async fn delete_all(&self, user_id: &str) -> InfraResult<()>;

    /// 列出用户仍然存在的令牌，索引中的失效条目会被移除
    async fn get_all(&self, user_id: &str) -> InfraResult<Vec<TokenRecord>>;
}
