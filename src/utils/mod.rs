use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, FixedOffset, Offset, Utc};

/// 时间来源，秒级 Unix 时间戳
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// 系统时钟
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// 手动推进的时钟，用于模拟时间
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// 计算 `now` 所在固定窗口的起始时间: floor(now / window) * window
///
/// 分钟桶和限流窗口共用这一个函数，保证取整规则一致。
pub fn window_start(now: i64, window_secs: u64) -> i64 {
    let window = window_secs.max(1) as i64;
    now.div_euclid(window) * window
}

/// 把分钟时间戳格式化成 HH:MM
pub fn format_minute(timestamp: i64, offset: FixedOffset) -> String {
    match DateTime::<Utc>::from_timestamp(timestamp, 0) {
        Some(dt) => dt.with_timezone(&offset).format("%H:%M").to_string(),
        None => timestamp.to_string(),
    }
}

/// 由分钟数构造 UTC 偏移，超出范围时退回 UTC
pub fn utc_offset(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or_else(|| {
        tracing::warn!("Invalid display offset {} minutes, using UTC", minutes);
        Utc.fix()
    })
}
