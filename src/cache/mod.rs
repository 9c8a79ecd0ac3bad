// 计数存储模块
// 包含键空间规则和存储实现

pub mod keys;
pub mod operations;

use async_trait::async_trait;

use crate::error::StoreError;

pub use operations::memory_store::MemoryStore;
pub use operations::redis_store::RedisStore;

/// 带过期时间的共享计数存储
///
/// 所有计数都放在这里，进程内不保存权威计数。
/// 缺失的键返回 `None`，由 [`normalize`] 统一归一化为 0。
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// 读取单个计数
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError>;

    /// INCR + EXPIRE，一次往返，返回自增后的值
    async fn incr_with_expiry(&self, key: &str, ttl_secs: u64) -> Result<i64, StoreError>;

    /// 总票数和分钟桶同时自增，并给分钟桶设置过期时间，返回新的总票数
    async fn incr_vote(
        &self,
        total_key: &str,
        bucket_key: &str,
        bucket_ttl_secs: u64,
    ) -> Result<i64, StoreError>;

    /// 批量读取，结果顺序与 `keys` 一致
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<i64>>, StoreError>;
}

/// 把缺失或异常的值归一化成非负整数
pub fn normalize(values: &[Option<i64>]) -> Vec<u64> {
    values
        .iter()
        .map(|v| v.map_or(0, |n| n.max(0) as u64))
        .collect()
}
