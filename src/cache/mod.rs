pub mod job_cache;
pub mod models;

pub use job_cache::{CacheError, JobCache};
pub use models::{is_expired, CacheSnapshot};
