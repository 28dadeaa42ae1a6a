use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::cache::{CacheError, CacheSnapshot, JobCache};
use crate::filter::filter_non_english;

#[derive(Parser)]
#[command(name = "go9ja-jobs")]
#[command(about = "Golang job board backend: fetches, filters and serves job postings")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server and the refresh scheduler (default)
    Serve,
    /// Fetch from the external API into the cache once and exit
    Fetch,
    /// Drop non-English postings from the existing cache file
    CleanCache,
}

/// Result of a `clean-cache` run
#[derive(Debug, PartialEq, Eq)]
pub enum CleanOutcome {
    NoCache,
    Cleaned { kept: usize, removed: usize },
}

/// Re-run the language filter over the cached postings.
///
/// The snapshot keeps its original fetch time so freshness is not reset.
pub async fn clean_cache(cache: &JobCache) -> Result<CleanOutcome, CacheError> {
    let Some(snapshot) = cache.read().await else {
        warn!("No cache file found at {:?}", cache.path());
        return Ok(CleanOutcome::NoCache);
    };

    let original = snapshot.jobs.len();
    let (jobs, removed) = filter_non_english(snapshot.jobs);
    info!("Original job count: {}, filtered job count: {}", original, jobs.len());

    let kept = jobs.len();
    if removed > 0 {
        cache.store(&CacheSnapshot::new(jobs, snapshot.fetched_at)).await?;
        info!("Cache updated, removed {} non-English jobs", removed);
    } else {
        info!("No non-English jobs found in cache");
    }

    Ok(CleanOutcome::Cleaned { kept, removed })
}
