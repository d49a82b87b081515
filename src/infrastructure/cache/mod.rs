//! Cache infrastructure - model artifact cache

mod model_cache;

pub use model_cache::{ModelCache, DEFAULT_CACHE_CAPACITY};
