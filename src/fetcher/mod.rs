pub mod job_fetcher;
pub mod signing;

pub use job_fetcher::{FetchError, FetchOutcome, FetcherSettings, JobFetcher};
