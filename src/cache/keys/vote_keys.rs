use crate::utils::window_start;

/// 总票数键，直接使用候选人ID
pub fn total_key(candidate: &str) -> String {
    candidate.to_string()
}

/// 分钟桶键: `<candidate>:<minuteEpoch>`
pub fn bucket_key(candidate: &str, minute: i64) -> String {
    format!("{}:{}", candidate, minute)
}

/// 限流键: `<origin>|<windowEpoch>|<candidate>`
pub fn rate_limit_key(origin: &str, window: i64, candidate: &str) -> String {
    format!("{}|{}|{}", origin, window, candidate)
}

/// 最近 `count` 个桶的起始时间，按时间升序
pub fn history_minutes(now: i64, bucket_secs: u64, count: u64) -> Vec<i64> {
    let current = window_start(now, bucket_secs);
    let step = bucket_secs.max(1) as i64;
    (0..count as i64)
        .rev()
        .map(|offset| current - offset * step)
        .collect()
}
