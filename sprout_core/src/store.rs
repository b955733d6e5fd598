//! Durable per-card stats storage.
//!
//! [`FileStore`] keeps every record in a single JSON document keyed by deck
//! name and then card id. The file is locked for the lifetime of the handle
//! and each `put` is written through atomically (temp file, fsync, rename),
//! so a crash never leaves a half-written database behind.
//!
//! Every `put` rewrites the whole document, so a write costs time in
//! proportion to the number of stored records. That is fine for a learner's
//! decks; it is not a per-key storage engine.

use crate::{Error, Result};
use fs2::FileExt;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::NamedTempFile;

/// Keyed storage for serialized card stats
pub trait StatsStore: Send + Sync {
    /// Fetch the record for a card; `None` if it has never been stored
    fn get(&self, deck: &str, card_id: &str) -> Result<Option<String>>;

    /// Store the record for a card, replacing any previous one
    fn put(&self, deck: &str, card_id: &str, record: &str) -> Result<()>;
}

type Records = BTreeMap<String, BTreeMap<String, String>>;

/// Single-file embedded stats database
pub struct FileStore {
    path: PathBuf,
    lock: Option<File>,
    records: Mutex<Records>,
}

impl FileStore {
    /// Open (or create) the database at `path`.
    ///
    /// Fails if another handle already holds the database or if the existing
    /// file cannot be parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(Error::StoreIo)?;
        }

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(lock_path(&path))
            .map_err(Error::StoreIo)?;
        lock.try_lock_exclusive().map_err(|e| {
            Error::Store(format!("{:?} is already open elsewhere: {}", path, e))
        })?;

        let records = match read_records(&path) {
            Ok(records) => records,
            Err(e) => {
                let _ = lock.unlock();
                return Err(e);
            }
        };

        tracing::info!(
            "Opened stats store {:?} ({} decks)",
            path,
            records.len()
        );

        Ok(Self {
            path,
            lock: Some(lock),
            records: Mutex::new(records),
        })
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and release the database
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        let Some(lock) = self.lock.take() else {
            return Ok(());
        };

        // Every put already synced its own write; flush once more before unlocking
        if self.path.exists() {
            File::open(&self.path)
                .and_then(|f| f.sync_all())
                .map_err(Error::StoreIo)?;
        }
        lock.unlock().map_err(Error::StoreIo)?;
        tracing::debug!("Closed stats store {:?}", self.path);
        Ok(())
    }

    fn records(&self) -> Result<MutexGuard<'_, Records>> {
        self.records
            .lock()
            .map_err(|_| Error::Store("stats store lock poisoned".into()))
    }

    /// Serialize the whole document into `out`.
    ///
    /// Writer failures arrive wrapped in a `serde_json::Error` and are
    /// reported as store errors.
    fn encode<W: Write>(&self, out: W, records: &Records) -> Result<()> {
        let mut writer = BufWriter::new(out);
        serde_json::to_writer(&mut writer, records)
            .map_err(|e| Error::Store(format!("writing {:?}: {}", self.path, e)))?;
        writer.flush().map_err(Error::StoreIo)
    }

    fn write_records(&self, records: &Records) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let temp = NamedTempFile::new_in(dir).map_err(Error::StoreIo)?;
        self.encode(temp.as_file(), records)?;
        temp.as_file().sync_all().map_err(Error::StoreIo)?;
        temp.persist(&self.path)
            .map_err(|e| Error::StoreIo(e.error))?;

        // Make the rename itself durable
        File::open(dir)
            .and_then(|d| d.sync_all())
            .map_err(Error::StoreIo)?;
        Ok(())
    }
}

impl StatsStore for FileStore {
    fn get(&self, deck: &str, card_id: &str) -> Result<Option<String>> {
        let records = self.records()?;
        Ok(records.get(deck).and_then(|cards| cards.get(card_id)).cloned())
    }

    fn put(&self, deck: &str, card_id: &str, record: &str) -> Result<()> {
        let mut records = self.records()?;
        let previous = records
            .entry(deck.to_string())
            .or_default()
            .insert(card_id.to_string(), record.to_string());

        if let Err(e) = self.write_records(&records) {
            // Roll back so memory matches what is on disk
            let cards = records.entry(deck.to_string()).or_default();
            match previous {
                Some(old) => {
                    cards.insert(card_id.to_string(), old);
                }
                None => {
                    cards.remove(card_id);
                    if cards.is_empty() {
                        records.remove(deck);
                    }
                }
            }
            tracing::warn!("Failed to persist stats for {}/{}: {}", deck, card_id, e);
            return Err(e);
        }

        tracing::debug!("Stored stats for {}/{}", deck, card_id);
        Ok(())
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!("Failed to close stats store {:?}: {}", self.path, e);
        }
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

fn read_records(path: &Path) -> Result<Records> {
    if !path.exists() {
        tracing::info!("No stats database at {:?}, starting empty", path);
        return Ok(Records::new());
    }

    let contents = std::fs::read_to_string(path).map_err(Error::StoreIo)?;
    if contents.trim().is_empty() {
        return Ok(Records::new());
    }

    serde_json::from_str(&contents)
        .map_err(|e| Error::Store(format!("corrupted stats database {:?}: {}", path, e)))
}
