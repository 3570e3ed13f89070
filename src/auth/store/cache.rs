use std::sync::Arc;

use anyhow::{Context, bail};
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use super::{TokenRecord, TokenStore};
use crate::cache::Cache;
use crate::error::InfraResult;

/// 基于共享缓存的令牌存储
///
/// - `token:{jti}` 保存 JSON 形式的 [`TokenRecord`]，TTL 为剩余有效期
/// - `user:{user_id}:tokens` 为 jti 集合，不设 TTL，靠读取时清理
#[derive(Clone)]
pub struct CacheTokenStore {
    cache: Arc<dyn Cache>,
}

impl CacheTokenStore {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    fn token_key(jti: &str) -> String {
        format!("token:{jti}")
    }

    fn user_set_key(user_id: &str) -> String {
        format!("user:{user_id}:tokens")
    }
}

#[async_trait]
impl TokenStore for CacheTokenStore {
    async fn save(&self, record: &TokenRecord) -> InfraResult<()> {
        let ttl = (record.expires_at - Utc::now())
            .to_std()
            .ok()
            .filter(|ttl| !ttl.is_zero());
        let Some(ttl) = ttl else {
            bail!("token {} is already expired", record.jti);
        };

        let data = serde_json::to_string(record).context("failed to encode token record")?;
        let token_key = Self::token_key(&record.jti);
        self.cache.set(&token_key, &data, Some(ttl)).await?;

        if let Err(err) = self
            .cache
            .sadd(&Self::user_set_key(&record.user_id), &record.jti)
            .await
        {
            // 索引写入失败时回收主记录，避免出现无法批量撤销的令牌
            if let Err(cleanup) = self.cache.del(&token_key).await {
                warn!(jti = %record.jti, error = %cleanup, "failed to roll back token record");
            }
            return Err(err.context("failed to add token to user index"));
        }

        Ok(())
    }

    async fn get(&self, jti: &str) -> InfraResult<Option<TokenRecord>> {
        let Some(data) = self.cache.get(&Self::token_key(jti)).await? else {
            return Ok(None);
        };
        let record = serde_json::from_str(&data)
            .with_context(|| format!("corrupted token record {jti}"))?;
        Ok(Some(record))
    }

    async fn delete_one(&self, user_id: &str, jti: &str) -> InfraResult<()> {
        // 只删除属于该用户的记录
        if let Some(record) = self.get(jti).await? {
            if record.user_id != user_id {
                debug!(jti, "token belongs to another user, skip delete");
                return Ok(());
            }
            self.cache.del(&Self::token_key(jti)).await?;
        }
        self.cache.srem(&Self::user_set_key(user_id), jti).await
    }

    async fn delete_all(&self, user_id: &str) -> InfraResult<()> {
        let user_key = Self::user_set_key(user_id);
        let jtis = self.cache.smembers(&user_key).await?;
        let keys: Vec<String> = jtis.iter().map(|jti| Self::token_key(jti)).collect();
        self.cache.del_many(&keys).await?;
        self.cache.del(&user_key).await
    }

    async fn get_all(&self, user_id: &str) -> InfraResult<Vec<TokenRecord>> {
        let user_key = Self::user_set_key(user_id);
        let jtis = self.cache.smembers(&user_key).await?;
        let now = Utc::now();

        let mut records = Vec::with_capacity(jtis.len());
        for jti in jtis {
            match self.get(&jti).await {
                Ok(Some(record)) if !record.is_expired_at(now) => records.push(record),
                Ok(_) => {
                    debug!(user_id, jti = %jti, "pruning stale token index entry");
                    self.cache.srem(&user_key, &jti).await?;
                }
                Err(err) => {
                    warn!(user_id, jti = %jti, error = %err, "unreadable token record, pruning");
                    self.cache.del(&Self::token_key(&jti)).await?;
                    self.cache.srem(&user_key, &jti).await?;
                }
            }
        }
        records.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(records)
    }
}
