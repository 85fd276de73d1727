//! 加速层：存在性过滤器、热缓存，以及它们（和限流器）共用的 KV 后端

pub mod existence_filter;
pub mod hot_cache;
pub mod kv;
pub mod traits;

pub use existence_filter::{BloomExistenceFilter, NullExistenceFilter, create_existence_filter};
pub use hot_cache::HotCache;
pub use kv::{MemoryKvBackend, RedisKvBackend, create_kv_backend};
pub use traits::{ExistenceFilter, KvBackend};
