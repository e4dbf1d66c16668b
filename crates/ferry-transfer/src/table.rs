/// Per-connection transfer-state table.
///
/// The authoritative progress record for every file active on one
/// connection. One instance per connection, never shared across
/// connections; all operations serialize on the inner mutex so
/// collaborating threads never tear a read-modify-write on the byte
/// counters.

use std::collections::HashMap;
use std::sync::Mutex;

/// Per-file transfer lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// Name requested, size not yet announced.
    Requested,
    /// Size announced, no bytes moved yet.
    SizeKnown,
    /// At least one byte recorded.
    InProgress,
    /// All bytes moved (or zero-size from the start).
    Completed,
    /// Not found or source failure. Terminal, no retry.
    Failed,
}

#[derive(Debug)]
struct FileProgress {
    original_size: u64,
    remaining: u64,
    status: TransferStatus,
    last_percent: Option<u8>,
}

impl FileProgress {
    fn percent(&self) -> u8 {
        if self.original_size == 0 {
            return 100;
        }
        let done = self.original_size - self.remaining;
        (done * 100 / self.original_size) as u8
    }
}

/// Outcome of one `record_bytes` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    pub status: TransferStatus,
    /// True only for the single call that drove `remaining` to zero.
    pub just_completed: bool,
}

pub struct TransferTable {
    files: Mutex<HashMap<String, FileProgress>>,
}

impl Default for TransferTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferTable {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
        }
    }

    /// Register a name first seen on this connection. No-op if present.
    pub fn insert_requested(&self, name: &str) {
        let mut files = self.files.lock().unwrap();
        files.entry(name.to_string()).or_insert(FileProgress {
            original_size: 0,
            remaining: 0,
            status: TransferStatus::Requested,
            last_percent: None,
        });
    }

    /// Record the announced size. A zero size completes the transfer
    /// immediately: no chunk is ever read or sent for an empty file.
    /// Only meaningful while the entry is still `Requested`.
    pub fn set_size(&self, name: &str, size: u64) -> Option<TransferStatus> {
        let mut files = self.files.lock().unwrap();
        let entry = files.get_mut(name)?;
        if entry.status != TransferStatus::Requested {
            return Some(entry.status);
        }
        entry.original_size = size;
        entry.remaining = size;
        entry.status = if size == 0 {
            TransferStatus::Completed
        } else {
            TransferStatus::SizeKnown
        };
        Some(entry.status)
    }

    /// Terminal failure for one name. Sibling transfers are unaffected.
    pub fn mark_failed(&self, name: &str) {
        let mut files = self.files.lock().unwrap();
        if let Some(entry) = files.get_mut(name) {
            entry.status = TransferStatus::Failed;
        }
    }

    /// Account `n` transferred bytes against `name`.
    ///
    /// Clamped at zero remaining; a call after `Completed` (or on a failed
    /// or size-unknown entry) is an idempotent no-op rather than an
    /// under/overflow. Exactly one call observes `just_completed`.
    pub fn record_bytes(&self, name: &str, n: u64) -> Option<RecordOutcome> {
        let mut files = self.files.lock().unwrap();
        let entry = files.get_mut(name)?;
        match entry.status {
            TransferStatus::SizeKnown | TransferStatus::InProgress => {
                entry.remaining = entry.remaining.saturating_sub(n);
                if entry.remaining == 0 {
                    entry.status = TransferStatus::Completed;
                    Some(RecordOutcome {
                        status: TransferStatus::Completed,
                        just_completed: true,
                    })
                } else {
                    entry.status = TransferStatus::InProgress;
                    Some(RecordOutcome {
                        status: TransferStatus::InProgress,
                        just_completed: false,
                    })
                }
            }
            status => Some(RecordOutcome {
                status,
                just_completed: false,
            }),
        }
    }

    /// Whole percent complete: floor(100 * done / size), 100 for size 0.
    pub fn progress_percent(&self, name: &str) -> Option<u8> {
        let files = self.files.lock().unwrap();
        files.get(name).map(|e| e.percent())
    }

    /// Percent complete, reported only when it differs from the last
    /// reported value for this name. Keeps progress output free of
    /// duplicate identical lines.
    pub fn percent_if_changed(&self, name: &str) -> Option<u8> {
        let mut files = self.files.lock().unwrap();
        let entry = files.get_mut(name)?;
        let percent = entry.percent();
        if entry.last_percent == Some(percent) {
            return None;
        }
        entry.last_percent = Some(percent);
        Some(percent)
    }

    /// Resumption read offset: `original_size - remaining`.
    pub fn offset(&self, name: &str) -> Option<u64> {
        let files = self.files.lock().unwrap();
        files.get(name).map(|e| e.original_size - e.remaining)
    }

    pub fn remaining(&self, name: &str) -> Option<u64> {
        let files = self.files.lock().unwrap();
        files.get(name).map(|e| e.remaining)
    }

    pub fn status(&self, name: &str) -> Option<TransferStatus> {
        let files = self.files.lock().unwrap();
        files.get(name).map(|e| e.status)
    }

    /// True once the name has been seen on this connection.
    pub fn contains(&self, name: &str) -> bool {
        self.files.lock().unwrap().contains_key(name)
    }

    /// True when the scheduler may plan chunks for this name: size known,
    /// not failed, bytes left to move.
    pub fn is_schedulable(&self, name: &str) -> bool {
        let files = self.files.lock().unwrap();
        match files.get(name) {
            Some(entry) => {
                matches!(
                    entry.status,
                    TransferStatus::SizeKnown | TransferStatus::InProgress
                ) && entry.remaining > 0
            }
            None => false,
        }
    }
}
