use std::collections::HashSet;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::api::job::JobPosting;

/// Durable representation of the job cache.
///
/// The field names match the `.job-cache.json` layout the site has always
/// used, so an existing cache file keeps working.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CacheSnapshot {
    pub jobs: Vec<JobPosting>,
    #[serde(rename = "lastFetchTime", with = "chrono::serde::ts_milliseconds")]
    pub fetched_at: DateTime<Utc>,
}

impl CacheSnapshot {
    /// Build a snapshot stamped with `fetched_at`, dropping postings whose
    /// `id` was already seen. Postings without an id are all kept.
    pub fn new(jobs: Vec<JobPosting>, fetched_at: DateTime<Utc>) -> Self {
        let mut seen = HashSet::new();
        let jobs = jobs
            .into_iter()
            .filter(|job| job.id.is_empty() || seen.insert(job.id.clone()))
            .collect();

        // Millisecond precision is all the file format keeps
        Self {
            jobs,
            fetched_at: fetched_at.trunc_subsecs(3),
        }
    }

    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now - self.fetched_at
    }
}

/// Whether the cache needs refreshing at `now`.
///
/// True when forced, when there is no snapshot, or when the snapshot is
/// strictly older than `max_age`.
pub fn is_expired_at(
    snapshot: Option<&CacheSnapshot>,
    max_age: Duration,
    force_refresh: bool,
    now: DateTime<Utc>,
) -> bool {
    if force_refresh {
        return true;
    }
    match snapshot {
        None => true,
        Some(snapshot) => snapshot.age_at(now) > max_age,
    }
}

pub fn is_expired(snapshot: Option<&CacheSnapshot>, max_age: Duration, force_refresh: bool) -> bool {
    is_expired_at(snapshot, max_age, force_refresh, Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn job(id: &str, title: &str) -> JobPosting {
        JobPosting {
            id: id.to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn new_drops_duplicate_ids_keeping_first() {
        let now = Utc::now();
        let snapshot = CacheSnapshot::new(
            vec![job("1", "first"), job("2", "other"), job("1", "second"), job("", "a"), job("", "b")],
            now,
        );

        let titles: Vec<_> = snapshot.jobs.iter().map(|j| j.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "other", "a", "b"]);
    }

    #[test]
    fn serializes_with_legacy_field_names() {
        let fetched_at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let snapshot = CacheSnapshot::new(vec![job("1", "Go")], fetched_at);

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["lastFetchTime"], 1_700_000_000_123i64);
        assert_eq!(value["jobs"][0]["id"], "1");

        let back: CacheSnapshot = serde_json::from_value(value).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn expiry_rules() {
        let max_age = Duration::hours(13);
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        assert!(is_expired_at(None, max_age, false, now));

        let fresh = CacheSnapshot::new(vec![], now - Duration::hours(1));
        assert!(!is_expired_at(Some(&fresh), max_age, false, now));
        assert!(is_expired_at(Some(&fresh), max_age, true, now));

        let boundary = CacheSnapshot::new(vec![], now - max_age);
        assert!(!is_expired_at(Some(&boundary), max_age, false, now));

        let old = CacheSnapshot::new(vec![], now - Duration::hours(14));
        assert!(is_expired_at(Some(&old), max_age, false, now));
    }
}
