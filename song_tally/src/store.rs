//! Per-user submission statistics and their line-oriented backing file.
//!
//! The file holds one `username count duration` record per line, duration
//! with two decimals. Two-field `username count` lines from older files are
//! still accepted and come back with a zero duration.
//!
//! Every store operation reloads the table from storage; mutations rewrite it
//! in full. [`StatStore::transact`] runs load, modify and save under one lock so
//! concurrent increments from the same process cannot interleave.

use std::{
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Statistics for a single submitter.
#[derive(Debug, Clone, PartialEq)]
pub struct UserStat {
    pub username: String,
    pub count: u64,
    /// Total seconds across accepted submissions.
    pub duration: f64,
}

impl UserStat {
    pub fn empty(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            count: 0,
            duration: 0.0,
        }
    }
}

/// A line of the backing file that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based line number.
    pub line: usize,
    pub reason: String,
}

/// Username → stats, iterated in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatTable {
    entries: Vec<UserStat>,
}

impl StatTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserStat> {
        self.entries.iter()
    }

    pub fn get(&self, username: &str) -> Option<&UserStat> {
        self.entries.iter().find(|s| s.username == username)
    }

    /// The stats for `username`, or a zeroed record when there are none.
    pub fn stats_or_default(&self, username: &str) -> UserStat {
        self.get(username)
            .cloned()
            .unwrap_or_else(|| UserStat::empty(username))
    }

    /// Mutable access to an entry, appending a zeroed one if absent.
    pub fn entry_mut(&mut self, username: &str) -> &mut UserStat {
        let idx = match self.entries.iter().position(|s| s.username == username) {
            Some(idx) => idx,
            None => {
                self.entries.push(UserStat::empty(username));
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx]
    }

    /// Insert a record. A record for an existing username replaces it in place.
    pub fn insert(&mut self, stat: UserStat) {
        match self.entries.iter_mut().find(|s| s.username == stat.username) {
            Some(existing) => *existing = stat,
            None => self.entries.push(stat),
        }
    }

    pub fn total_count(&self) -> u64 {
        self.entries.iter().map(|s| s.count).sum()
    }

    pub fn total_duration(&self) -> f64 {
        self.entries.iter().map(|s| s.duration).sum()
    }

    /// Entries by count, highest first. Equal counts keep insertion order.
    pub fn ranked_by_count(&self) -> Vec<&UserStat> {
        let mut ranked: Vec<&UserStat> = self.entries.iter().collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked
    }

    /// Entries by total duration, longest first. Ties keep insertion order.
    pub fn ranked_by_duration(&self) -> Vec<&UserStat> {
        let mut ranked: Vec<&UserStat> = self.entries.iter().collect();
        ranked.sort_by(|a, b| b.duration.total_cmp(&a.duration));
        ranked
    }

    /// Parse the backing-file format. Lines that do not parse are returned
    /// alongside the table instead of failing the whole load.
    pub fn parse(text: &str) -> (StatTable, Vec<SkippedLine>) {
        let mut table = StatTable::new();
        let mut skipped = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            match parse_line(line) {
                Ok(stat) => table.insert(stat),
                Err(reason) => skipped.push(SkippedLine {
                    line: idx + 1,
                    reason,
                }),
            }
        }

        (table, skipped)
    }

    /// Render in the backing-file format, one line per entry.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for stat in &self.entries {
            out.push_str(&format!(
                "{} {} {:.2}\n",
                stat.username, stat.count, stat.duration
            ));
        }
        out
    }
}

fn parse_line(line: &str) -> Result<UserStat, String> {
    let mut fields = line.split_whitespace();
    let (Some(username), Some(count)) = (fields.next(), fields.next()) else {
        return Err("expected `username count [duration]`".to_string());
    };
    let duration = fields.next();
    if fields.next().is_some() {
        return Err("too many fields".to_string());
    }

    let count = count
        .parse::<u64>()
        .map_err(|e| format!("bad count `{count}`: {e}"))?;
    let duration = match duration {
        None => 0.0,
        Some(raw) => {
            let value = raw
                .parse::<f64>()
                .map_err(|e| format!("bad duration `{raw}`: {e}"))?;
            if !value.is_finite() || value < 0.0 {
                return Err(format!("bad duration `{raw}`"));
            }
            value
        }
    };

    Ok(UserStat {
        username: username.to_string(),
        count,
        duration,
    })
}

/// Turn a platform identity into a record key: whitespace would split the
/// key across fields in the backing file, so it becomes `_`.
pub fn normalize_identity(raw: &str) -> String {
    let key: String = raw
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    if key.is_empty() {
        "unknown".to_string()
    } else {
        key
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Storage for the statistics table.
#[async_trait]
pub trait StatStore: Send + Sync {
    /// Load the full table. Missing storage is an empty table.
    async fn load(&self) -> Result<StatTable, StoreError>;

    /// Replace the stored table.
    async fn save(&self, table: &StatTable) -> Result<(), StoreError>;

    /// Drop every record.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Load, apply `change`, save, all under one lock.
    async fn transact(
        &self,
        change: &mut (dyn for<'t> FnMut(&'t mut StatTable) + Send),
    ) -> Result<(), StoreError>;

    async fn increment_count(&self, username: &str) -> Result<(), StoreError> {
        self.transact(&mut |table: &mut StatTable| table.entry_mut(username).count += 1)
            .await
    }

    async fn increment_duration(&self, username: &str, seconds: f64) -> Result<(), StoreError> {
        self.transact(&mut |table: &mut StatTable| table.entry_mut(username).duration += seconds)
            .await
    }

    /// Count one accepted submission: bumps count and duration together.
    async fn record_submission(&self, username: &str, seconds: f64) -> Result<(), StoreError> {
        self.transact(&mut |table: &mut StatTable| {
            let entry = table.entry_mut(username);
            entry.count += 1;
            entry.duration += seconds;
        })
        .await
    }
}

/// The production store: a text file replaced atomically on every write.
#[derive(Debug)]
pub struct FileStatStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStatStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_unlocked(&self) -> Result<StatTable, StoreError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no stats file yet; starting empty");
                return Ok(StatTable::new());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let (table, skipped) = StatTable::parse(&text);
        for bad in &skipped {
            warn!(
                path = %self.path.display(),
                line = bad.line,
                "skipping malformed stats line: {}",
                bad.reason
            );
        }
        Ok(table)
    }

    /// Write to a sibling temp file, then rename over the target.
    async fn write_unlocked(&self, contents: &str) -> Result<(), StoreError> {
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let mut tmp_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "stats".into());
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        tokio::fs::write(&tmp_path, contents)
            .await
            .map_err(write_err)?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(write_err)
    }
}

#[async_trait]
impl StatStore for FileStatStore {
    async fn load(&self) -> Result<StatTable, StoreError> {
        let _guard = self.lock.lock().await;
        self.read_unlocked().await
    }

    async fn save(&self, table: &StatTable) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        self.write_unlocked(&table.render()).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        self.write_unlocked("").await
    }

    async fn transact(
        &self,
        change: &mut (dyn for<'t> FnMut(&'t mut StatTable) + Send),
    ) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut table = self.read_unlocked().await?;
        change(&mut table);
        self.write_unlocked(&table.render()).await
    }
}

/// A store that keeps the table in memory. Useful for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStatStore {
    table: Mutex<StatTable>,
}

impl MemoryStatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(table: StatTable) -> Self {
        Self {
            table: Mutex::new(table),
        }
    }
}

#[async_trait]
impl StatStore for MemoryStatStore {
    async fn load(&self) -> Result<StatTable, StoreError> {
        Ok(self.table.lock().await.clone())
    }

    async fn save(&self, table: &StatTable) -> Result<(), StoreError> {
        *self.table.lock().await = table.clone();
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.table.lock().await = StatTable::new();
        Ok(())
    }

    async fn transact(
        &self,
        change: &mut (dyn for<'t> FnMut(&'t mut StatTable) + Send),
    ) -> Result<(), StoreError> {
        let mut guard = self.table.lock().await;
        change(&mut *guard);
        Ok(())
    }
}
