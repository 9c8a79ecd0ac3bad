use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, RedisResult, aio::MultiplexedConnection};

use crate::cache::CounterStore;
use crate::error::StoreError;

/// 基于 Redis 的计数存储
///
/// 每次操作都从客户端取一个多路复用连接，Redis 重启或网络抖动后下一个请求会重新建立连接。
/// 建连和命令都在同一个超时内完成，超时直接失败，不做重试。
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    timeout: Duration,
}

impl RedisStore {
    /// 只解析地址，不建立连接
    pub fn open(redis_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
            timeout,
        })
    }

    /// 解析地址并确认 Redis 可达
    pub async fn connect(redis_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let store = Self::open(redis_url, timeout)?;
        store.bounded(store.connection()).await?;
        tracing::info!("Connected to redis at {}", redis_url);
        Ok(store)
    }

    async fn connection(&self) -> RedisResult<MultiplexedConnection> {
        self.client.get_multiplexed_async_connection().await
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        self.bounded(async {
            let mut conn = self.connection().await?;
            conn.get(key).await
        })
        .await
    }

    async fn incr_with_expiry(&self, key: &str, ttl_secs: u64) -> Result<i64, StoreError> {
        let (count,): (i64,) = self
            .bounded(async {
                let mut conn = self.connection().await?;
                redis::pipe()
                    .atomic()
                    .incr(key, 1)
                    .expire(key, ttl_secs as i64)
                    .ignore()
                    .query_async(&mut conn)
                    .await
            })
            .await?;
        Ok(count)
    }

    async fn incr_vote(
        &self,
        total_key: &str,
        bucket_key: &str,
        bucket_ttl_secs: u64,
    ) -> Result<i64, StoreError> {
        // 三条命令放在同一个 MULTI/EXEC 里，尽量缩短读到半更新状态的窗口
        let (total,): (i64,) = self
            .bounded(async {
                let mut conn = self.connection().await?;
                redis::pipe()
                    .atomic()
                    .incr(total_key, 1)
                    .incr(bucket_key, 1)
                    .ignore()
                    .expire(bucket_key, bucket_ttl_secs as i64)
                    .ignore()
                    .query_async(&mut conn)
                    .await
            })
            .await?;
        Ok(total)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<i64>>, StoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        // 显式使用 MGET，单个键时也返回数组
        self.bounded(async {
            let mut conn = self.connection().await?;
            redis::cmd("MGET").arg(keys).query_async(&mut conn).await
        })
        .await
    }
}
