/// Request-source rescanner.
///
/// Reads `<name> <priorityToken>` lines from the request file every
/// `RESCAN_INTERVAL`, feeding new names into the download queue. Names in
/// the completed ledger are filtered here before they reach the queue;
/// the queue dedupes the rest. Enqueueing wakes an idle session.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use ferry_transfer::{CompletedLedger, DownloadQueue, PriorityClass};

const RESCAN_INTERVAL: Duration = Duration::from_secs(2);

pub fn run(request_file: PathBuf, queue: Arc<DownloadQueue>, ledger: Arc<CompletedLedger>) {
    loop {
        match fs::read_to_string(&request_file) {
            Ok(contents) => scan(&contents, &queue, &ledger),
            Err(e) => {
                debug!(path = %request_file.display(), error = %e, "request file unreadable")
            }
        }
        thread::sleep(RESCAN_INTERVAL);
    }
}

fn scan(contents: &str, queue: &DownloadQueue, ledger: &CompletedLedger) {
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((name, token)) = line.split_once(' ') else {
            warn!(line, "malformed request line, skipping");
            continue;
        };
        let priority = PriorityClass::parse_token(token.trim());
        if ledger.contains(name) {
            continue;
        }
        if queue.enqueue(name, priority, ledger) {
            info!(file = name, priority = priority.token(), "queued");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn empty_ledger(tag: &str) -> CompletedLedger {
        let path: PathBuf = std::env::temp_dir().join(format!(
            "ferry-producer-{}-{}.log",
            tag,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        CompletedLedger::load(&path).unwrap()
    }

    #[test]
    fn test_scan_admits_new_names() {
        let ledger = empty_ledger("admit");
        let queue = DownloadQueue::new();
        scan(
            "a.txt CRITICAL\n\nb.txt NORMAL\nmalformed-line\n",
            &queue,
            &ledger,
        );
        let snapshot = queue.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].name, "a.txt");
        assert_eq!(snapshot[0].priority, PriorityClass::Critical);
        assert_eq!(snapshot[1].priority, PriorityClass::Normal);
    }

    #[test]
    fn test_rescan_is_idempotent_and_skips_completed() {
        let ledger = empty_ledger("rescan");
        ledger.record("done.bin").unwrap();
        let queue = DownloadQueue::new();
        let contents = "done.bin HIGH\nfresh.bin HIGH\n";
        scan(contents, &queue, &ledger);
        scan(contents, &queue, &ledger);
        let snapshot = queue.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name, "fresh.bin");
    }
}
