/// Download queue shared between the producer and the round-driving
/// session within one connection's process.
///
/// Insertion order is kept for stable scheduling within a priority class;
/// it does not determine service order (priority does). Enqueueing wakes
/// an idle consumer through a bounded channel, with `wait_for_work`
/// falling back to a timed poll for robustness.

use std::sync::Mutex;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded};

use crate::ledger::CompletedLedger;
use crate::priority::PriorityClass;

/// One requested-but-not-completed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub name: String,
    pub priority: PriorityClass,
}

pub struct DownloadQueue {
    entries: Mutex<Vec<TransferRequest>>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl Default for DownloadQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadQueue {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            entries: Mutex::new(Vec::new()),
            wake_tx,
            wake_rx,
        }
    }

    /// Admit a new request. No-op when the name is already queued or
    /// already in the completed ledger. Safe to call while a round
    /// snapshot is held; the name joins the next round.
    pub fn enqueue(
        &self,
        name: &str,
        priority: PriorityClass,
        completed: &CompletedLedger,
    ) -> bool {
        {
            let mut entries = self.entries.lock().unwrap();
            // Ledger check under the entries lock: the completion path
            // records the ledger before removing from the queue, so a
            // name finishing concurrently cannot slip back in between
            // the check and the push.
            if completed.contains(name) || entries.iter().any(|r| r.name == name) {
                return false;
            }
            entries.push(TransferRequest {
                name: name.to_string(),
                priority,
            });
        }
        let _ = self.wake_tx.try_send(());
        true
    }

    /// Fixed membership for one scheduling round. Names enqueued after
    /// the snapshot is taken appear in the next round, not this one.
    pub fn snapshot(&self) -> Vec<TransferRequest> {
        self.entries.lock().unwrap().clone()
    }

    /// Drop a name whose transfer reached a terminal state.
    pub fn remove(&self, name: &str) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|r| r.name != name);
        entries.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Park until a producer wakes us or the fallback interval lapses.
    pub fn wait_for_work(&self, fallback: Duration) {
        let _ = self.wake_rx.recv_timeout(fallback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Instant;

    fn empty_ledger(tag: &str) -> CompletedLedger {
        let path: PathBuf = std::env::temp_dir().join(format!(
            "ferry-queue-{}-{}.log",
            tag,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        CompletedLedger::load(&path).unwrap()
    }

    #[test]
    fn test_enqueue_dedupes_by_name() {
        let ledger = empty_ledger("dedupe");
        let queue = DownloadQueue::new();
        assert!(queue.enqueue("a.txt", PriorityClass::Normal, &ledger));
        assert!(!queue.enqueue("a.txt", PriorityClass::Critical, &ledger));
        assert_eq!(queue.len(), 1);
        // The original priority wins; re-requests do not upgrade it.
        assert_eq!(queue.snapshot()[0].priority, PriorityClass::Normal);
    }

    #[test]
    fn test_enqueue_skips_completed_names() {
        let ledger = empty_ledger("completed");
        ledger.record("done.bin").unwrap();
        let queue = DownloadQueue::new();
        assert!(!queue.enqueue("done.bin", PriorityClass::High, &ledger));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_snapshot_membership_is_fixed() {
        let ledger = empty_ledger("snapshot");
        let queue = DownloadQueue::new();
        queue.enqueue("a.txt", PriorityClass::Normal, &ledger);

        let snapshot = queue.snapshot();
        queue.enqueue("b.txt", PriorityClass::Critical, &ledger);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(queue.snapshot().len(), 2);
    }

    #[test]
    fn test_remove() {
        let ledger = empty_ledger("remove");
        let queue = DownloadQueue::new();
        queue.enqueue("a.txt", PriorityClass::Normal, &ledger);
        assert!(queue.remove("a.txt"));
        assert!(!queue.remove("a.txt"));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_enqueue_wakes_waiter() {
        let ledger = empty_ledger("wake");
        let queue = DownloadQueue::new();
        queue.enqueue("a.txt", PriorityClass::Normal, &ledger);

        let start = Instant::now();
        queue.wait_for_work(Duration::from_secs(5));
        // The pending wake token returns immediately, well before the
        // fallback poll interval.
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
