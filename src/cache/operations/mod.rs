// 计数存储的具体实现
pub mod memory_store;
pub mod redis_store;
