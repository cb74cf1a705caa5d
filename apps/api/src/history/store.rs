use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tracing::{info, warn};

use crate::models::history::HistoryEntry;

/// The analysis history: one JSON array file, read in full and rewritten in
/// full on every operation. Nothing is cached; the file is the source of truth.
///
/// Mutations work on the raw rows, so rows that do not look like entries
/// and keys this crate does not know are written back untouched. Typed
/// reads project each row through [`HistoryEntry::from_row`].
///
/// Clones share a lock that serialises read-modify-write cycles inside this
/// process. Other processes writing the same file are not coordinated.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: Arc<PathBuf>,
    write_lock: Arc<Mutex<()>>,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries in insertion order. A missing or unreadable file, or one
    /// that is not a JSON array, reads as an empty history.
    pub fn load_all(&self) -> Vec<HistoryEntry> {
        self.read_rows().iter().map(HistoryEntry::from_row).collect()
    }

    pub fn get(&self, id: &str) -> Option<HistoryEntry> {
        self.load_all().into_iter().find(|e| e.id == id)
    }

    pub fn append(&self, entry: HistoryEntry) -> io::Result<()> {
        let _guard = self.lock();
        let mut rows = self.read_rows();
        rows.push(serde_json::to_value(entry)?);
        self.write_rows(&rows)?;
        info!(
            "Appended history entry ({} total) to {}",
            rows.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Removes the entry with `id`. Returns whether one was found.
    pub fn remove(&self, id: &str) -> io::Result<bool> {
        let _guard = self.lock();
        let mut rows = self.read_rows();
        let Some(index) = rows
            .iter()
            .position(|row| HistoryEntry::from_row(row).id == id)
        else {
            return Ok(false);
        };
        rows.remove(index);
        self.write_rows(&rows)?;
        info!("Removed history entry {id}");
        Ok(true)
    }

    /// Positional removal, kept for callers that still address rows by index.
    pub fn remove_at(&self, index: usize) -> io::Result<Option<HistoryEntry>> {
        let _guard = self.lock();
        let mut rows = self.read_rows();
        if index >= rows.len() {
            return Ok(None);
        }
        let removed = rows.remove(index);
        self.write_rows(&rows)?;
        Ok(Some(HistoryEntry::from_row(&removed)))
    }

    pub fn replace_all(&self, entries: &[HistoryEntry]) -> io::Result<()> {
        let _guard = self.lock();
        let rows = entries
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<Value>, _>>()?;
        self.write_rows(&rows)
    }

    /// Deletes the backing file; a missing file is not an error.
    pub fn clear(&self) -> io::Result<()> {
        let _guard = self.lock();
        match std::fs::remove_file(self.path()) {
            Ok(()) => {
                info!("Cleared history {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_rows(&self) -> Vec<Value> {
        let raw = match std::fs::read_to_string(self.path()) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("Could not read history {}: {e}", self.path.display());
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Value>>(&raw) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(
                    "History {} is not a JSON array, treating as empty: {e}",
                    self.path.display()
                );
                Vec::new()
            }
        }
    }

    /// Pretty-printed, UTF-8, non-ASCII left unescaped. Written to a sibling
    /// temp file and renamed over the target.
    fn write_rows(&self, rows: &[Value]) -> io::Result<()> {
        let json = serde_json::to_string_pretty(rows)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.flush()?;
        tmp.persist(self.path()).map_err(|e| e.error)?;
        Ok(())
    }
}
