use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::FixedOffset;
use serde::Serialize;

use crate::{
    cache::{
        CounterStore,
        keys::{bucket_key, history_minutes, total_key},
        normalize,
    },
    config::Config,
    error::StoreError,
    middleware::{Admission, RateLimiter},
    utils::{format_minute, utc_offset, window_start},
};

use super::registry::CandidateRegistry;

/// 一次投票的结果，限流不算错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Counted(u64),
    RateLimited { retry_after_secs: u64 },
}

/// 计票
///
/// 一票做两件事: 总票数加一，当前分钟桶加一。
/// 分钟桶记录的是这一分钟内的增量，用来还原投票速度。
pub struct VoteRecorder {
    store: Arc<dyn CounterStore>,
    limiter: RateLimiter,
    registry: Arc<CandidateRegistry>,
    bucket_window_secs: u64,
    bucket_retention_secs: u64,
}

impl VoteRecorder {
    pub fn new(
        store: Arc<dyn CounterStore>,
        registry: Arc<CandidateRegistry>,
        config: &Config,
    ) -> Self {
        Self {
            limiter: RateLimiter::new(store.clone(), config),
            store,
            registry,
            bucket_window_secs: config.bucket_window_secs,
            bucket_retention_secs: config.bucket_retention_secs,
        }
    }

    pub async fn record_vote(
        &self,
        candidate: &str,
        origin: &str,
        now: i64,
    ) -> Result<VoteOutcome, StoreError> {
        if let Admission::Limited { retry_after_secs } =
            self.limiter.admit(origin, candidate, now).await?
        {
            return Ok(VoteOutcome::RateLimited { retry_after_secs });
        }

        let minute = window_start(now, self.bucket_window_secs);
        let total = self
            .store
            .incr_vote(
                &total_key(candidate),
                &bucket_key(candidate, minute),
                self.bucket_retention_secs,
            )
            .await?;

        self.registry.register(candidate);
        tracing::debug!("Vote counted for {} at minute {}: total {}", candidate, minute, total);

        Ok(VoteOutcome::Counted(total.max(0) as u64))
    }
}

/// `GET /candidates` 的返回体，未写入或已过期的键为 null
#[derive(Debug, Default, Serialize, PartialEq)]
pub struct VoteSnapshot {
    pub votes: BTreeMap<String, Option<i64>>,
    pub visualization: BTreeMap<String, Option<i64>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SeriesPoint {
    pub timestamp: i64,
    pub time: String,
    pub count: u64,
}

/// 最近若干分钟每个候选人的累计票数
#[derive(Debug, Default, Serialize, PartialEq)]
pub struct VoteHistory {
    pub totals: BTreeMap<String, u64>,
    pub series: BTreeMap<String, Vec<SeriesPoint>>,
}

/// 一次批量读取的原始结果
#[derive(Debug)]
pub struct WindowCounts {
    pub candidates: Vec<String>,
    /// 桶起始时间，升序
    pub minutes: Vec<i64>,
    totals: Vec<Option<i64>>,
    /// `buckets[c][m]` 对应 `candidates[c]` 在 `minutes[m]` 的增量
    buckets: Vec<Vec<Option<i64>>>,
}

impl WindowCounts {
    pub fn snapshot(&self) -> VoteSnapshot {
        let mut snapshot = VoteSnapshot::default();
        for (c, candidate) in self.candidates.iter().enumerate() {
            snapshot.votes.insert(candidate.clone(), self.totals[c]);
            for (m, minute) in self.minutes.iter().enumerate() {
                snapshot
                    .visualization
                    .insert(bucket_key(candidate, *minute), self.buckets[c][m]);
            }
        }
        snapshot
    }

    pub fn history(&self, offset: FixedOffset) -> VoteHistory {
        let totals = normalize(&self.totals);
        let mut history = VoteHistory::default();

        for (c, candidate) in self.candidates.iter().enumerate() {
            let mut deltas: Vec<(i64, u64)> = self
                .minutes
                .iter()
                .copied()
                .zip(normalize(&self.buckets[c]))
                .collect();
            deltas.sort_by_key(|(minute, _)| *minute);

            let counts = rebuild_series(
                totals[c],
                &deltas.iter().map(|(_, d)| *d).collect::<Vec<_>>(),
            );
            let points = deltas
                .iter()
                .zip(counts)
                .map(|((minute, _), count)| SeriesPoint {
                    timestamp: *minute,
                    time: format_minute(*minute, offset),
                    count,
                })
                .collect();

            history.totals.insert(candidate.clone(), totals[c]);
            history.series.insert(candidate.clone(), points);
        }
        history
    }
}

/// 由当前总票数和各分钟增量反推每个时间点的累计票数
///
/// 最后一个点直接取总票数，然后向前逐个减去后一个桶的增量:
/// `absolute[i] = absolute[i + 1] - delta[i + 1]`。
/// 读到的总票数和桶可能暂时不一致，结果出现负数时截断为 0。
pub fn rebuild_series(total: u64, deltas: &[u64]) -> Vec<u64> {
    let mut absolute = vec![0u64; deltas.len()];
    let Some(last) = deltas.len().checked_sub(1) else {
        return absolute;
    };

    absolute[last] = total;
    for i in (0..last).rev() {
        absolute[i] = match absolute[i + 1].checked_sub(deltas[i + 1]) {
            Some(count) => count,
            None => {
                tracing::warn!(
                    "Bucket deltas exceed running total ({} < {}), clamping to zero",
                    absolute[i + 1],
                    deltas[i + 1]
                );
                0
            }
        };
    }
    absolute
}

/// 按时间窗口读取并重建历史
pub struct HistoryReconstructor {
    store: Arc<dyn CounterStore>,
    bucket_window_secs: u64,
    history_buckets: u64,
    display_offset: FixedOffset,
}

impl HistoryReconstructor {
    pub fn new(store: Arc<dyn CounterStore>, config: &Config) -> Self {
        Self {
            store,
            bucket_window_secs: config.bucket_window_secs,
            history_buckets: config.history_buckets,
            display_offset: utc_offset(config.display_utc_offset_minutes),
        }
    }

    /// 一次 MGET 读出所有总票数和最近的分钟桶
    pub async fn read_window(
        &self,
        candidates: &[String],
        now: i64,
    ) -> Result<WindowCounts, StoreError> {
        let minutes = history_minutes(now, self.bucket_window_secs, self.history_buckets);

        // 先放总票数，再按候选人依次放分钟桶
        let mut keys: Vec<String> = candidates.iter().map(|c| total_key(c)).collect();
        for candidate in candidates {
            keys.extend(minutes.iter().map(|minute| bucket_key(candidate, *minute)));
        }

        let values = self.store.mget(&keys).await?;
        if values.len() != keys.len() {
            return Err(StoreError::Unavailable(format!(
                "expected {} values from MGET, got {}",
                keys.len(),
                values.len()
            )));
        }

        let (totals, rest) = values.split_at(candidates.len());
        let buckets = if minutes.is_empty() {
            vec![Vec::new(); candidates.len()]
        } else {
            rest.chunks(minutes.len()).map(<[_]>::to_vec).collect()
        };

        Ok(WindowCounts {
            candidates: candidates.to_vec(),
            minutes,
            totals: totals.to_vec(),
            buckets,
        })
    }

    pub async fn snapshot(
        &self,
        candidates: &[String],
        now: i64,
    ) -> Result<VoteSnapshot, StoreError> {
        Ok(self.read_window(candidates, now).await?.snapshot())
    }

    pub async fn reconstruct(
        &self,
        candidates: &[String],
        now: i64,
    ) -> Result<VoteHistory, StoreError> {
        Ok(self
            .read_window(candidates, now)
            .await?
            .history(self.display_offset))
    }
}
