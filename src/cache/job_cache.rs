use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::api::job::JobPosting;
use crate::cache::models::CacheSnapshot;

/// Cache persistence errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// File-backed job cache.
///
/// The whole snapshot lives in one JSON file. Updates are written to a
/// sibling temporary file and renamed over the original, so a reader sees
/// either the old snapshot or the new one.
pub struct JobCache {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JobCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| ".job-cache.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Read the current snapshot.
    ///
    /// Returns `None` when no cache has been written yet, when it was cleared,
    /// or when the file cannot be read or parsed (the error is logged).
    pub async fn read(&self) -> Option<CacheSnapshot> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No cache file at {:?}", self.path);
                return None;
            }
            Err(e) => {
                error!("Error reading cache file {:?}: {}", self.path, e);
                return None;
            }
        };

        match serde_json::from_str::<CacheSnapshot>(&contents) {
            Ok(snapshot) => {
                debug!(
                    "Server cache: {} jobs, last fetch {}",
                    snapshot.jobs.len(),
                    snapshot.fetched_at
                );
                Some(snapshot)
            }
            Err(e) => {
                error!("Error parsing cache file {:?}: {}", self.path, e);
                None
            }
        }
    }

    /// Replace the cache with `jobs`, stamped with the current time
    pub async fn write(&self, jobs: Vec<JobPosting>) -> Result<CacheSnapshot, CacheError> {
        let snapshot = CacheSnapshot::new(jobs, Utc::now());
        self.store(&snapshot).await?;
        info!(
            "Server cache updated with {} jobs at {}",
            snapshot.jobs.len(),
            snapshot.fetched_at
        );
        Ok(snapshot)
    }

    /// Persist `snapshot` as-is, keeping its timestamp
    pub async fn store(&self, snapshot: &CacheSnapshot) -> Result<(), CacheError> {
        let result = self.persist(snapshot).await;
        if let Err(e) = &result {
            error!("Error writing cache file {:?}: {}", self.path, e);
        }
        result
    }

    async fn persist(&self, snapshot: &CacheSnapshot) -> Result<(), CacheError> {
        let body = serde_json::to_vec(snapshot)?;

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let temp = self.temp_path();
        fs::write(&temp, &body).await?;
        if let Err(e) = fs::rename(&temp, &self.path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }

        Ok(())
    }

    /// Remove the cache entirely.
    ///
    /// Returns `Ok(false)` when there was nothing to remove.
    pub async fn clear(&self) -> Result<bool, CacheError> {
        let _guard = self.write_lock.lock().await;

        match fs::remove_file(&self.path).await {
            Ok(()) => {
                info!("Server cache file {:?} deleted", self.path);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No cache file found to clear");
                Ok(false)
            }
            Err(e) => {
                error!("Error clearing cache file {:?}: {}", self.path, e);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn job(id: &str) -> JobPosting {
        JobPosting {
            id: id.to_string(),
            job_id: format!("job-{}", id),
            title: format!("Go Engineer {}", id),
            tags: vec!["go".to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn read_without_file_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let cache = JobCache::new(temp_dir.path().join("cache.json"));

        assert!(cache.read().await.is_none());
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let cache = JobCache::new(temp_dir.path().join("cache.json"));
        let jobs = vec![job("1"), job("2"), job("3")];

        let before = Utc::now();
        let written = cache.write(jobs.clone()).await.unwrap();
        let snapshot = cache.read().await.unwrap();

        assert_eq!(snapshot.jobs, jobs);
        assert_eq!(snapshot, written);
        assert!(snapshot.fetched_at >= before - chrono::Duration::milliseconds(1));
    }

    #[tokio::test]
    async fn write_replaces_previous_snapshot_and_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let cache = JobCache::new(temp_dir.path().join("cache.json"));

        cache.write(vec![job("1"), job("2")]).await.unwrap();
        cache.write(vec![job("3")]).await.unwrap();

        let snapshot = cache.read().await.unwrap();
        assert_eq!(snapshot.jobs, vec![job("3")]);
        assert!(!cache.temp_path().exists());
    }

    #[tokio::test]
    async fn write_creates_missing_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let cache = JobCache::new(temp_dir.path().join("nested/dir/cache.json"));

        cache.write(vec![job("1")]).await.unwrap();
        assert_eq!(cache.read().await.unwrap().jobs.len(), 1);
    }

    #[tokio::test]
    async fn store_keeps_timestamp() {
        let temp_dir = TempDir::new().unwrap();
        let cache = JobCache::new(temp_dir.path().join("cache.json"));
        let fetched_at = Utc::now() - chrono::Duration::hours(5);
        let snapshot = CacheSnapshot::new(vec![job("1")], fetched_at);

        cache.store(&snapshot).await.unwrap();

        assert_eq!(cache.read().await.unwrap().fetched_at, snapshot.fetched_at);
    }

    #[tokio::test]
    async fn clear_removes_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let cache = JobCache::new(temp_dir.path().join("cache.json"));

        assert!(!cache.clear().await.unwrap());

        cache.write(vec![job("1")]).await.unwrap();
        assert!(cache.clear().await.unwrap());
        assert!(cache.read().await.is_none());
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_absent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cache.json");
        std::fs::write(&path, "{ this is not json").unwrap();

        let cache = JobCache::new(path);
        assert!(cache.read().await.is_none());
    }

    #[tokio::test]
    async fn reads_legacy_cache_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".job-cache.json");
        std::fs::write(
            &path,
            r#"{"jobs":[{"id":"a1","job_id":"j1","title":"Go Dev","company":"Acme","company_logo":null,"is_remote":true}],"lastFetchTime":1714564800000}"#,
        )
        .unwrap();

        let snapshot = JobCache::new(path).read().await.unwrap();
        assert_eq!(snapshot.jobs.len(), 1);
        assert_eq!(snapshot.jobs[0].company_logo, "");
        assert!(snapshot.jobs[0].is_remote);
        assert_eq!(snapshot.fetched_at.timestamp_millis(), 1_714_564_800_000);
    }
}
