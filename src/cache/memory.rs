use std::collections::{HashMap, HashSet};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::Cache;
use crate::error::InfraResult;

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// 进程内缓存，语义与 Redis 实现一致，用于测试与单机开发
///
/// 过期时间基于 `tokio::time::Instant`，测试中可配合 `tokio::time::pause` 推进时间。
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 剩余存活时间；键不存在或没有过期时间时返回 `None`
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    /// 当前存活的键数量
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.values().filter(|entry| entry.is_live(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// 取出未过期的条目，顺带清理已过期的
fn live_entry<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
    now: Instant,
) -> Option<&'a mut Entry> {
    if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
        entries.remove(key);
    }
    entries.get_mut(key)
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> InfraResult<Option<String>> {
        let mut entries = self.entries.lock().await;
        match live_entry(&mut entries, key, Instant::now()) {
            None => Ok(None),
            Some(Entry {
                value: Value::Str(value),
                ..
            }) => Ok(Some(value.clone())),
            Some(_) => Err(anyhow!("WRONGTYPE key {key} holds a set")),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> InfraResult<()> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at,
            },
        );
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> InfraResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        if live_entry(&mut entries, key, now).is_some() {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Some(now + ttl),
            },
        );
        Ok(true)
    }

    async fn del(&self, key: &str) -> InfraResult<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn take(&self, key: &str) -> InfraResult<Option<String>> {
        let mut entries = self.entries.lock().await;
        if live_entry(&mut entries, key, Instant::now()).is_none() {
            return Ok(None);
        }
        match entries.remove(key) {
            Some(Entry {
                value: Value::Str(value),
                ..
            }) => Ok(Some(value)),
            Some(entry) => {
                // 类型不符时保留原值
                entries.insert(key.to_string(), entry);
                Err(anyhow!("WRONGTYPE key {key} holds a set"))
            }
            None => Ok(None),
        }
    }

    async fn del_if_eq(&self, key: &str, expected: &str) -> InfraResult<bool> {
        let mut entries = self.entries.lock().await;
        let matched = match live_entry(&mut entries, key, Instant::now()) {
            Some(Entry {
                value: Value::Str(value),
                ..
            }) => value == expected,
            _ => false,
        };
        if matched {
            entries.remove(key);
        }
        Ok(matched)
    }

    async fn del_many(&self, keys: &[String]) -> InfraResult<()> {
        let mut entries = self.entries.lock().await;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> InfraResult<bool> {
        let mut entries = self.entries.lock().await;
        Ok(live_entry(&mut entries, key, Instant::now()).is_some())
    }

    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> InfraResult<i64> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match live_entry(&mut entries, key, now) {
            Some(Entry {
                value: Value::Str(value),
                ..
            }) => {
                let current: i64 = value
                    .parse()
                    .map_err(|_| anyhow!("value of {key} is not an integer"))?;
                let next = current + 1;
                *value = next.to_string();
                Ok(next)
            }
            Some(_) => Err(anyhow!("WRONGTYPE key {key} holds a set")),
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: Value::Str("1".to_string()),
                        expires_at: Some(now + ttl),
                    },
                );
                Ok(1)
            }
        }
    }

    async fn sadd(&self, key: &str, member: &str) -> InfraResult<()> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match live_entry(&mut entries, key, now) {
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => {
                members.insert(member.to_string());
                Ok(())
            }
            Some(_) => Err(anyhow!("WRONGTYPE key {key} holds a string")),
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: Value::Set(HashSet::from([member.to_string()])),
                        expires_at: None,
                    },
                );
                Ok(())
            }
        }
    }

    async fn srem(&self, key: &str, member: &str) -> InfraResult<()> {
        let mut entries = self.entries.lock().await;
        let now_empty = match live_entry(&mut entries, key, Instant::now()) {
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => {
                members.remove(member);
                members.is_empty()
            }
            Some(_) => return Err(anyhow!("WRONGTYPE key {key} holds a string")),
            None => false,
        };
        // 与 Redis 一致：集合为空时键随之消失
        if now_empty {
            entries.remove(key);
        }
        Ok(())
    }

    async fn smembers(&self, key: &str) -> InfraResult<Vec<String>> {
        let mut entries = self.entries.lock().await;
        match live_entry(&mut entries, key, Instant::now()) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => Ok(members.iter().cloned().collect()),
            Some(_) => Err(anyhow!("WRONGTYPE key {key} holds a string")),
        }
    }
}
