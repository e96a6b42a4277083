use anyhow::{Context, Result};
use directories::ProjectDirs;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::probe::TrackInfo;

pub const DB_FILE_NAME: &str = "history.sqlite3";

/// One recorded download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: i64,
    pub url: String,
    pub path: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub duration_seconds: Option<u64>,
    pub downloaded_at: i64,
}

pub struct DB {
    conn: Connection,
}

/// Default history location in the platform data directory.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "ytaudio").map(|dirs| dirs.data_dir().join(DB_FILE_NAME))
}

/// Database operations for the download history
impl DB {
    /// Open or create the database at the given path and run minimal migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS downloads (
                id INTEGER PRIMARY KEY,
                url TEXT NOT NULL,
                path TEXT UNIQUE NOT NULL,
                title TEXT,
                artist TEXT,
                duration_seconds INTEGER,
                downloaded_at INTEGER NOT NULL
            );",
        )?;
        Ok(Self { conn })
    }

    /// Record a downloaded file; a re-download of the same path replaces the row.
    pub fn record(&self, url: &str, track: &TrackInfo) -> Result<()> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        self.conn.execute(
            "INSERT INTO downloads (url, path, title, artist, duration_seconds, downloaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(path) DO UPDATE SET
                url = excluded.url,
                title = excluded.title,
                artist = excluded.artist,
                duration_seconds = excluded.duration_seconds,
                downloaded_at = excluded.downloaded_at",
            params![
                url,
                track.path.to_string_lossy().into_owned(),
                track.title,
                track.artist,
                track.duration_seconds.map(|d| d as i64),
                now,
            ],
        )?;
        Ok(())
    }

    /// Most recent downloads first.
    pub fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, url, path, title, artist, duration_seconds, downloaded_at
             FROM downloads ORDER BY downloaded_at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(HistoryEntry {
                id: row.get(0)?,
                url: row.get(1)?,
                path: row.get(2)?,
                title: row.get(3)?,
                artist: row.get(4)?,
                duration_seconds: row.get::<_, Option<i64>>(5)?.map(|d| d as u64),
                downloaded_at: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Get the total number of recorded downloads
    pub fn track_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM downloads",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
