/// 缓存键模块
/// 提供投票相关的键生成函数

// 投票键模块
pub mod vote_keys;

pub use vote_keys::{bucket_key, history_minutes, rate_limit_key, total_key};
