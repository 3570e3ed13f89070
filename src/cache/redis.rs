use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use tracing::info;

use super::{Cache, ttl_millis};
use crate::error::InfraResult;

/// 计数器首次创建时才设置过期时间，之后的递增保持原有窗口
const INCR_WITH_TTL_SCRIPT: &str = r"
local current = redis.call('INCR', KEYS[1])
if current == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return current
";

/// 值相等才删除，比较与删除在同一脚本内完成
const DEL_IF_EQ_SCRIPT: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
";

/// 基于 Redis 的缓存实现，连接由 ConnectionManager 自动重连
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: impl AsRef<str>) -> InfraResult<Self> {
        let client = redis::Client::open(url.as_ref())
            .map_err(|err| anyhow!("failed to open redis client: {err}"))?;
        let conn = ConnectionManager::new(client)
            .await
            .context("failed to connect to redis")?;
        info!("redis cache connected");
        Ok(Self { conn })
    }

    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> InfraResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key)
            .await
            .with_context(|| format!("redis GET {key} failed"))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> InfraResult<()> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        cmd.query_async::<()>(&mut conn)
            .await
            .with_context(|| format!("redis SET {key} failed"))
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> InfraResult<bool> {
        let mut conn = self.conn.clone();
        // SET NX PX 原子地完成“不存在才写入”并设置过期时间
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .with_context(|| format!("redis SET NX {key} failed"))?;
        Ok(result.is_some())
    }

    async fn del(&self, key: &str) -> InfraResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key)
            .await
            .with_context(|| format!("redis DEL {key} failed"))
    }

    async fn take(&self, key: &str) -> InfraResult<Option<String>> {
        let mut conn = self.conn.clone();
        // GETDEL 需要 Redis 6.2+
        redis::cmd("GETDEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .with_context(|| format!("redis GETDEL {key} failed"))
    }

    async fn del_if_eq(&self, key: &str, expected: &str) -> InfraResult<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = Script::new(DEL_IF_EQ_SCRIPT)
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .with_context(|| format!("redis compare-and-delete {key} failed"))?;
        Ok(removed == 1)
    }

    async fn del_many(&self, keys: &[String]) -> InfraResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(keys)
            .await
            .context("redis DEL (batch) failed")
    }

    async fn exists(&self, key: &str) -> InfraResult<bool> {
        let mut conn = self.conn.clone();
        conn.exists(key)
            .await
            .with_context(|| format!("redis EXISTS {key} failed"))
    }

    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> InfraResult<i64> {
        let mut conn = self.conn.clone();
        Script::new(INCR_WITH_TTL_SCRIPT)
            .key(key)
            .arg(ttl_millis(ttl))
            .invoke_async(&mut conn)
            .await
            .with_context(|| format!("redis INCR {key} failed"))
    }

    async fn sadd(&self, key: &str, member: &str) -> InfraResult<()> {
        let mut conn = self.conn.clone();
        conn.sadd::<_, _, ()>(key, member)
            .await
            .with_context(|| format!("redis SADD {key} failed"))
    }

    async fn srem(&self, key: &str, member: &str) -> InfraResult<()> {
        let mut conn = self.conn.clone();
        conn.srem::<_, _, ()>(key, member)
            .await
            .with_context(|| format!("redis SREM {key} failed"))
    }

    async fn smembers(&self, key: &str) -> InfraResult<Vec<String>> {
        let mut conn = self.conn.clone();
        conn.smembers(key)
            .await
            .with_context(|| format!("redis SMEMBERS {key} failed"))
    }
}
