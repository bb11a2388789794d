//! Durable tracking store backed by a JSONL commit journal
//!
//! Every unit of work is written as one JSON object per line before it is
//! applied in memory:
//!
//! ```text
//! {"state":{...},"transitions":[{...},{...}]}
//! ```
//!
//! On open the journal is replayed into a [`MemoryStore`]. A torn final line
//! (crash mid-write) is skipped with a warning; corruption anywhere else is
//! an error.
//!
//! A failed write is cut back to the previous end of file. If that cut fails
//! too, the store refuses further commits until it is reopened.

use super::memory::MemoryStore;
use super::{
    Drafts, EntityStateStore, StoreCounts, StoreError, TrackingStore, TransitionLog, Transitions,
};
use crate::domain::{EntityState, RecordId, TransitionDraft, TransitionRecord, VehicleId};
use serde::{Deserialize, Serialize};
use smallvec::smallvec;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(test)]
use std::sync::atomic::AtomicUsize;
use tracing::{debug, error, info, warn};

#[derive(Serialize)]
struct EntryRef<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a EntityState>,
    #[serde(skip_serializing_if = "no_transitions")]
    transitions: &'a [TransitionRecord],
}

fn no_transitions(transitions: &&[TransitionRecord]) -> bool {
    transitions.is_empty()
}

#[derive(Deserialize)]
struct Entry {
    #[serde(default)]
    state: Option<EntityState>,
    #[serde(default)]
    transitions: Vec<TransitionRecord>,
}

/// Memory store whose commits are appended to a journal file first
pub struct JournalStore {
    memory: MemoryStore,
    file: File,
    path: PathBuf,
    /// Set when a failed write could not be rolled back
    failed: AtomicBool,
    /// Byte count after which the next write fails
    #[cfg(test)]
    short_write: AtomicUsize,
}

impl JournalStore {
    /// Open (or create) the journal at `path` and replay its contents
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let memory = MemoryStore::new();
        let replayed =
            if path.exists() { replay(&path, &memory)? } else { Replayed::default() };

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if file.metadata()?.len() > replayed.intact_len {
            file.set_len(replayed.intact_len)?;
        }
        if !replayed.newline_terminated {
            file.write_all(b"\n")?;
        }
        let counts = memory.counts();
        info!(
            path = %path.display(),
            entries = %replayed.applied,
            vehicles = %counts.vehicles,
            transitions = %counts.transitions,
            "journal_opened"
        );

        Ok(Self {
            memory,
            file,
            path,
            failed: AtomicBool::new(false),
            #[cfg(test)]
            short_write: AtomicUsize::new(usize::MAX),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_entry(
        &self,
        state: Option<&EntityState>,
        transitions: &[TransitionRecord],
    ) -> Result<(), StoreError> {
        if self.failed.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable(format!(
                "journal {} has a partial entry, reopen to recover",
                self.path.display()
            )));
        }

        let mut line = serde_json::to_string(&EntryRef { state, transitions })?;
        line.push('\n');

        // Callers hold the memory store's write lock, so the length is stable
        let start = self.file.metadata()?.len();
        if let Err(e) = self.write_line(line.as_bytes()) {
            self.rollback(start);
            return Err(e.into());
        }
        debug!(path = %self.path.display(), bytes = %line.len(), "journal_written");
        Ok(())
    }

    fn write_line(&self, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = &self.file;

        #[cfg(test)]
        {
            let limit = self.short_write.swap(usize::MAX, Ordering::Relaxed);
            if limit < bytes.len() {
                file.write_all(&bytes[..limit])?;
                return Err(std::io::Error::other("short write"));
            }
        }

        file.write_all(bytes)?;
        file.flush()
    }

    /// Cut the journal back to `len` after a failed write
    fn rollback(&self, len: u64) {
        match self.file.set_len(len) {
            Ok(()) => warn!(path = %self.path.display(), len = %len, "journal_write_rolled_back"),
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "journal_rollback_failed");
                self.failed.store(true, Ordering::Release);
            }
        }
    }
}

struct Replayed {
    applied: usize,
    /// Byte length of the prefix made of whole, parseable lines
    intact_len: u64,
    newline_terminated: bool,
}

impl Default for Replayed {
    fn default() -> Self {
        Self { applied: 0, intact_len: 0, newline_terminated: true }
    }
}

fn replay(path: &Path, memory: &MemoryStore) -> Result<Replayed, StoreError> {
    let content = std::fs::read_to_string(path)?;
    let total = content.split_inclusive('\n').count();
    let mut replayed = Replayed::default();

    for (idx, raw) in content.split_inclusive('\n').enumerate() {
        let line = raw.trim();
        if !line.is_empty() {
            match serde_json::from_str::<Entry>(line) {
                Ok(entry) => {
                    memory.restore(entry.state, entry.transitions);
                    replayed.applied += 1;
                }
                Err(e) if idx + 1 == total => {
                    warn!(path = %path.display(), line = %(idx + 1), error = %e, "journal_torn_tail_skipped");
                    break;
                }
                Err(e) => {
                    return Err(StoreError::Corrupt { line: idx + 1, reason: e.to_string() });
                }
            }
        }
        replayed.intact_len += raw.len() as u64;
        replayed.newline_terminated = raw.ends_with('\n');
    }
    Ok(replayed)
}

impl EntityStateStore for JournalStore {
    fn get(&self, vehicle_id: &VehicleId) -> Result<Option<EntityState>, StoreError> {
        self.memory.get(vehicle_id)
    }

    fn put(&self, state: EntityState) -> Result<(), StoreError> {
        self.memory
            .write_through(Some(state), Drafts::new(), |s, t| self.write_entry(s, t))
            .map(|_| ())
    }
}

impl TransitionLog for JournalStore {
    fn append(&self, draft: TransitionDraft) -> Result<RecordId, StoreError> {
        let records =
            self.memory.write_through(None, smallvec![draft], |s, t| self.write_entry(s, t))?;
        records
            .first()
            .map(|r| r.id)
            .ok_or_else(|| StoreError::Unavailable("append produced no record".to_string()))
    }

    fn list_by_entity(&self, vehicle_id: &VehicleId) -> Result<Vec<TransitionRecord>, StoreError> {
        self.memory.list_by_entity(vehicle_id)
    }
}

impl TrackingStore for JournalStore {
    fn commit(&self, state: EntityState, drafts: Drafts) -> Result<Transitions, StoreError> {
        self.memory.write_through(Some(state), drafts, |s, t| self.write_entry(s, t))
    }

    fn counts(&self) -> StoreCounts {
        self.memory.counts()
    }
}
