//! Local view tally for playlist mode, where there is no portal to count views

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::AnalyticsError;
use crate::session::{TopWatchedSource, ViewCounter};

/// Per-slug view counts, persisted as a JSON object after every increment
pub struct LocalTally {
    path: Option<PathBuf>,
    counts: Mutex<HashMap<String, u64>>,
}

impl LocalTally {
    /// `views.json` under the app's config directory
    pub fn default_path() -> PathBuf {
        crate::config::config_dir().join("views.json")
    }

    /// Load counts from `path`; a missing or corrupt file starts empty
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let counts = read_counts(&path).unwrap_or_else(|e| {
            if path.exists() {
                log::warn!("Ignoring unreadable view tally {}: {}", path.display(), e);
            }
            HashMap::new()
        });
        Self {
            path: Some(path),
            counts: Mutex::new(counts),
        }
    }

    /// Tally that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            counts: Mutex::new(HashMap::new()),
        }
    }

}

fn read_counts(path: &Path) -> Result<HashMap<String, u64>, AnalyticsError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Replace `path` atomically so a crash never leaves half a file
fn write_counts(path: &Path, counts: &HashMap<String, u64>) -> Result<(), AnalyticsError> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(counts)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl ViewCounter for LocalTally {
    fn increment(&self, slug: &str) -> Result<(), AnalyticsError> {
        let mut counts = self
            .counts
            .lock()
            .map_err(|_| AnalyticsError::Request("view tally poisoned".to_string()))?;
        *counts.entry(slug.to_string()).or_insert(0) += 1;
        // Written under the lock so an older snapshot never lands last
        match &self.path {
            Some(path) => write_counts(path, &counts),
            None => Ok(()),
        }
    }
}

impl TopWatchedSource for LocalTally {
    /// Highest counts first; equal counts in slug order
    fn top(&self, n: usize) -> Result<Vec<String>, AnalyticsError> {
        let counts = self
            .counts
            .lock()
            .map_err(|_| AnalyticsError::Request("view tally poisoned".to_string()))?;
        let mut ranked: Vec<(&String, &u64)> = counts.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        Ok(ranked.into_iter().take(n).map(|(slug, _)| slug.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_orders_by_count_then_slug() {
        let tally = LocalTally::in_memory();
        for slug in ["tv5", "one-news", "tv5", "a2z", "one-news", "tv5", "kapamilya"] {
            tally.increment(slug).unwrap();
        }
        assert_eq!(tally.top(3).unwrap(), vec!["tv5", "one-news", "a2z"]);
        assert_eq!(tally.top(10).unwrap().len(), 4);
        assert!(tally.top(0).unwrap().is_empty());
    }

    #[test]
    fn test_counts_survive_reopen() {
        let path = std::env::temp_dir().join(format!("litestream-views-{}.json", std::process::id()));
        fs::remove_file(&path).ok();

        let tally = LocalTally::open(&path);
        tally.increment("tv5").unwrap();
        tally.increment("tv5").unwrap();
        drop(tally);

        let counts = read_counts(&path).unwrap();
        let reopened = LocalTally::open(&path);
        fs::remove_file(&path).ok();
        assert_eq!(counts.get("tv5"), Some(&2));
        assert_eq!(reopened.top(1).unwrap(), vec!["tv5"]);
    }

    #[test]
    fn test_concurrent_increments_all_persisted() {
        let path = std::env::temp_dir().join(format!("litestream-concurrent-{}.json", std::process::id()));
        fs::remove_file(&path).ok();

        let tally = std::sync::Arc::new(LocalTally::open(&path));
        let workers: Vec<_> = (0..16)
            .map(|_| {
                let tally = tally.clone();
                std::thread::spawn(move || tally.increment("tv5").unwrap())
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let counts = read_counts(&path).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(counts.get("tv5"), Some(&16));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let path = std::env::temp_dir().join(format!("litestream-corrupt-{}.json", std::process::id()));
        fs::write(&path, "not json").unwrap();
        let tally = LocalTally::open(&path);
        fs::remove_file(&path).ok();
        assert!(tally.top(5).unwrap().is_empty());
    }
}
