//! On-disk cache of annual economic series
//!
//! One JSON file per (series, year range). Entries older than the TTL are
//! never served: an expired entry means a fresh fetch, and a failed fetch is
//! surfaced rather than answered with stale values.

use directories::BaseDirs;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::PathBuf;

use crate::types::{EconomicSeries, HpiError, Result, SeriesKind};

#[derive(Debug, Serialize, Deserialize)]
pub struct CachedSeries {
    pub kind: SeriesKind,
    pub start_year: i32,
    pub end_year: i32,
    /// Unix timestamp of the upstream fetch
    pub fetched_at: i64,
    pub series: EconomicSeries,
}

impl CachedSeries {
    pub fn is_expired(&self, ttl_secs: i64) -> bool {
        chrono::Utc::now().timestamp() - self.fetched_at > ttl_secs
    }
}

pub struct SeriesDiskCache {
    cache_dir: PathBuf,
    ttl_secs: i64,
}

impl SeriesDiskCache {
    pub fn new(cache_dir: PathBuf, ttl_secs: i64) -> Self {
        Self {
            cache_dir,
            ttl_secs,
        }
    }

    /// `~/.hpitrack/series`
    pub fn default_dir() -> Result<PathBuf> {
        let base_dirs = BaseDirs::new()
            .ok_or_else(|| HpiError::Cache("Cannot determine home directory".into()))?;
        Ok(base_dirs.home_dir().join(".hpitrack").join("series"))
    }

    pub fn cache_path(&self, kind: SeriesKind, start_year: i32, end_year: i32) -> PathBuf {
        self.cache_dir
            .join(format!("{}_{}_{}.json", kind.slug(), start_year, end_year))
    }

    /// Fresh cached series for the exact key, if any. Unreadable, corrupt or
    /// expired files count as misses.
    pub fn load_fresh(&self, kind: SeriesKind, start_year: i32, end_year: i32) -> Option<EconomicSeries> {
        let path = self.cache_path(kind, start_year, end_year);
        if !path.exists() {
            return None;
        }

        let cached = match self.read_locked(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable series cache");
                return None;
            }
        };

        if cached.kind != kind || cached.start_year != start_year || cached.end_year != end_year {
            tracing::warn!(path = %path.display(), "series cache key mismatch");
            return None;
        }
        if cached.is_expired(self.ttl_secs) {
            tracing::debug!(series = %kind, start_year, end_year, "series cache expired");
            return None;
        }

        Some(cached.series)
    }

    /// Shared lock for concurrent read safety
    fn read_locked(&self, path: &PathBuf) -> Result<CachedSeries> {
        let file = File::open(path)?;
        file.lock_shared()
            .map_err(|e| HpiError::Cache(format!("Failed to acquire read lock: {}", e)))?;

        let mut content = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut content);
        let _ = file.unlock();
        read?;

        serde_json::from_str(&content)
            .map_err(|e| HpiError::Cache(format!("Corrupted cache file: {}", e)))
    }

    /// Save using atomic write (temp file + rename) with exclusive lock
    pub fn save(&self, series: &EconomicSeries, start_year: i32, end_year: i32) -> Result<()> {
        fs::create_dir_all(&self.cache_dir)?;

        let cached = CachedSeries {
            kind: series.kind,
            start_year,
            end_year,
            fetched_at: chrono::Utc::now().timestamp(),
            series: series.clone(),
        };
        let content = serde_json::to_string_pretty(&cached)
            .map_err(|e| HpiError::Cache(format!("Serialization failed: {}", e)))?;

        let path = self.cache_path(series.kind, start_year, end_year);
        let temp_path = path.with_extension("json.tmp");

        {
            let mut file = File::create(&temp_path)
                .map_err(|e| HpiError::Cache(format!("Failed to create temp file: {}", e)))?;
            file.write_all(content.as_bytes())
                .map_err(|e| HpiError::Cache(format!("Failed to write temp file: {}", e)))?;
            file.sync_all()
                .map_err(|e| HpiError::Cache(format!("Failed to sync temp file: {}", e)))?;
        }

        let target = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        target
            .lock_exclusive()
            .map_err(|e| HpiError::Cache(format!("Failed to acquire write lock: {}", e)))?;

        fs::rename(&temp_path, &path)
            .map_err(|e| HpiError::Cache(format!("Failed to rename temp file: {}", e)))?;

        let _ = target.unlock();
        Ok(())
    }

    /// Remove every cached series file
    pub fn clear(&self) -> Result<usize> {
        if !self.cache_dir.exists() {
            return Ok(0);
        }
        let mut removed = 0;
        for entry in fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
