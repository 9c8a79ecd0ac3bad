use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::cache::CounterStore;
use crate::error::StoreError;
use crate::utils::Clock;

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: i64,
    /// 过期时间点 (Unix 秒)，`None` 表示永不过期
    expires_at: Option<i64>,
}

impl Entry {
    fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// 进程内的计数存储，语义与 Redis 的 INCR/EXPIRE/MGET 一致
///
/// 过期的键在访问时惰性清除。时间来自注入的时钟，便于测试中模拟时间流逝。
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    fn read(&self, key: &str, now: i64) -> Option<i64> {
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Some(entry.value),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }
        None
    }

    /// 自增并可选地刷新过期时间，在同一个分片锁内完成
    fn incr(&self, key: &str, now: i64, ttl_secs: Option<u64>) -> i64 {
        let mut entry = self.entries.entry(key.to_string()).or_insert(Entry {
            value: 0,
            expires_at: None,
        });
        if entry.is_expired(now) {
            *entry = Entry {
                value: 0,
                expires_at: None,
            };
        }
        entry.value += 1;
        if let Some(ttl) = ttl_secs {
            entry.expires_at = Some(now + ttl as i64);
        }
        entry.value
    }

    /// 当前未过期的键数量
    #[cfg(test)]
    fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries.iter().filter(|e| !e.is_expired(now)).count()
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        Ok(self.read(key, self.clock.now()))
    }

    async fn incr_with_expiry(&self, key: &str, ttl_secs: u64) -> Result<i64, StoreError> {
        let now = self.clock.now();
        Ok(self.incr(key, now, Some(ttl_secs)))
    }

    async fn incr_vote(
        &self,
        total_key: &str,
        bucket_key: &str,
        bucket_ttl_secs: u64,
    ) -> Result<i64, StoreError> {
        let now = self.clock.now();
        let total = self.incr(total_key, now, None);
        self.incr(bucket_key, now, Some(bucket_ttl_secs));
        Ok(total)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<i64>>, StoreError> {
        let now = self.clock.now();
        Ok(keys.iter().map(|key| self.read(key, now)).collect())
    }
}
