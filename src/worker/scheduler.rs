use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, NaiveTime, Timelike, Utc};
use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::cache::is_expired;
use crate::fetcher::{FetchOutcome, JobFetcher};

/// A wall-clock run time, hour in 0..=23 and minute in 0..=59
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduleTime {
    hour: u32,
    minute: u32,
}

impl ScheduleTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        (hour <= 23 && minute <= 59).then_some(Self { hour, minute })
    }

    /// Parse `HH:MM`, hour may be a single digit
    pub fn parse(value: &str) -> Option<Self> {
        let time = NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()?;
        Self::new(time.hour(), time.minute())
    }

    fn as_naive_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for ScheduleTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Delay from `now` until the next occurrence of `time` in `now`'s offset.
///
/// Today's run time is used if it is still ahead, otherwise tomorrow's, so
/// the result is always strictly positive and at most 24 hours.
pub fn compute_delay(now: DateTime<FixedOffset>, time: ScheduleTime) -> Duration {
    let local_now = now.naive_local();
    let mut candidate = local_now.date().and_time(time.as_naive_time());
    if candidate <= local_now {
        candidate += ChronoDuration::days(1);
    }
    (candidate - local_now).to_std().unwrap_or(Duration::from_secs(24 * 60 * 60))
}

/// When the scheduled refresh runs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub times: Vec<ScheduleTime>,
    /// Reference timezone for run times and log output
    pub offset: FixedOffset,
}

impl Default for ScheduleConfig {
    /// 13:00 and 21:00 Lagos time (UTC+1)
    fn default() -> Self {
        Self {
            times: vec![ScheduleTime { hour: 13, minute: 0 }, ScheduleTime { hour: 21, minute: 0 }],
            offset: FixedOffset::east_opt(60 * 60).expect("UTC+1 is a valid offset"),
        }
    }
}

impl ScheduleConfig {
    /// Build from a comma-separated `HH:MM` list and a `±HH:MM` offset.
    ///
    /// Invalid entries are skipped with a warning. If nothing valid is left
    /// the default times are used; an invalid offset falls back to the
    /// default offset.
    pub fn parse(times: &str, offset: &str) -> Self {
        let default = Self::default();

        let mut parsed: Vec<ScheduleTime> = Vec::new();
        for entry in times.split(',').filter(|e| !e.trim().is_empty()) {
            match ScheduleTime::parse(entry) {
                Some(time) if !parsed.contains(&time) => parsed.push(time),
                Some(_) => {}
                None => warn!("Ignoring invalid schedule time {:?}", entry),
            }
        }
        if parsed.is_empty() {
            warn!("No valid schedule times in {:?}, using defaults", times);
            parsed = default.times.clone();
        }

        let offset = parse_offset(offset).unwrap_or_else(|| {
            warn!("Invalid schedule UTC offset {:?}, using {}", offset, default.offset);
            default.offset
        });

        Self { times: parsed, offset }
    }

    /// Delay until the soonest configured run time
    pub fn next_delay(&self, now: DateTime<Utc>) -> Duration {
        let local = now.with_timezone(&self.offset);
        self.times
            .iter()
            .map(|time| compute_delay(local, *time))
            .min()
            .unwrap_or(Duration::from_secs(24 * 60 * 60))
    }
}

/// Parse `+HH:MM`, `-HH:MM`, `Z` or `UTC`
pub fn parse_offset(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }
    value.parse().ok()
}

/// Background task that refreshes the job cache at the configured times
pub struct Scheduler {
    fetcher: Arc<JobFetcher>,
    config: ScheduleConfig,
    max_age: ChronoDuration,
}

impl Scheduler {
    pub fn new(fetcher: Arc<JobFetcher>, config: ScheduleConfig, max_age: ChronoDuration) -> Self {
        Self {
            fetcher,
            config,
            max_age,
        }
    }

    /// Run until the shutdown channel flips to `true` or its sender is dropped.
    ///
    /// # Lifecycle
    /// - Runs one fetch right away if the cache is missing or older than `max_age`
    /// - Computes the delay to the next run time and sleeps
    /// - Fires a fetch, then re-arms whatever the fetch outcome
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("Job scheduler initialized");

        let snapshot = self.fetcher.cache().read().await;
        if is_expired(snapshot.as_ref(), self.max_age, false) {
            info!("Job cache missing or expired at startup, fetching now");
            self.fire().await;
        }

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let delay = self.config.next_delay(Utc::now());
            let next_run = Utc::now().with_timezone(&self.config.offset)
                + ChronoDuration::from_std(delay).unwrap_or_else(|_| ChronoDuration::zero());
            info!("Next scheduled job fetch at: {}", next_run.format("%Y-%m-%d %H:%M:%S %:z"));

            tokio::select! {
                _ = sleep(delay) => {
                    info!(
                        "Executing scheduled job fetch at: {}",
                        Utc::now().with_timezone(&self.config.offset).format("%Y-%m-%d %H:%M:%S %:z")
                    );
                    self.fire().await;
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        warn!("Scheduler shutdown channel closed");
                    }
                    break;
                }
            }
        }

        info!("Job scheduler stopped");
    }

    /// Run one fetch and log how it went. Never fails.
    pub async fn fire(&self) {
        match self.fetcher.fetch_and_cache().await {
            Ok(FetchOutcome::Updated { fetched, removed, stored }) => info!(
                "Scheduled fetch: cache updated with {} jobs ({} fetched, {} filtered)",
                stored, fetched, removed
            ),
            Ok(FetchOutcome::Empty { .. }) => info!("Scheduled fetch: no jobs returned"),
            Ok(FetchOutcome::AlreadyRunning(_)) => {
                info!("Scheduled fetch skipped: a fetch is already in progress")
            }
            Err(e) => error!("Error during scheduled job fetch: {}", e),
        }
    }
}
