pub mod hot;

pub use hot::{CacheStats, HotCache};
