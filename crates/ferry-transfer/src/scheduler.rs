/// Priority-weighted round planner.
///
/// One round is a pass over the current snapshot of active transfers.
/// Each file gets up to `chunk_quota()` chunks per round, so a large
/// low-priority file cannot starve higher-priority ones and several files
/// make visible progress within the same round.
///
/// Both endpoints run `plan_round` against tables holding identical
/// remaining counts, which makes the chunk layout of the raw byte stream
/// derivable on each side without per-chunk headers.

use crate::priority::PriorityClass;
use crate::protocol::CHUNK_SIZE;
use crate::queue::TransferRequest;
use crate::table::TransferTable;

/// One file's turn within a round: the exact chunk lengths to move, in
/// order, starting at `offset` within the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTurn {
    pub name: String,
    pub priority: PriorityClass,
    /// First-chunk byte offset: original size minus remaining.
    pub offset: u64,
    pub chunk_lens: Vec<usize>,
}

impl FileTurn {
    /// Total bytes this turn moves.
    pub fn byte_len(&self) -> u64 {
        self.chunk_lens.iter().map(|&l| l as u64).sum()
    }
}

/// Plan one scheduling round over a snapshot.
///
/// Entries without a known size, failed entries, and drained entries are
/// skipped; the rest are served Critical first, stable within a class
/// (snapshot order), each with up to its quota of chunks bounded by
/// `min(CHUNK_SIZE, remaining)`.
pub fn plan_round(snapshot: &[TransferRequest], table: &TransferTable) -> Vec<FileTurn> {
    let mut order: Vec<&TransferRequest> = snapshot
        .iter()
        .filter(|r| table.is_schedulable(&r.name))
        .collect();
    // Stable sort keeps snapshot order within a priority class.
    order.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut turns = Vec::with_capacity(order.len());
    for request in order {
        let Some(offset) = table.offset(&request.name) else {
            continue;
        };
        let Some(mut remaining) = table.remaining(&request.name) else {
            continue;
        };
        let mut chunk_lens = Vec::new();
        for _ in 0..request.priority.chunk_quota() {
            if remaining == 0 {
                break;
            }
            let len = remaining.min(CHUNK_SIZE as u64) as usize;
            chunk_lens.push(len);
            remaining -= len as u64;
        }
        if !chunk_lens.is_empty() {
            turns.push(FileTurn {
                name: request.name.clone(),
                priority: request.priority,
                offset,
                chunk_lens,
            });
        }
    }
    turns
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, priority: PriorityClass) -> TransferRequest {
        TransferRequest {
            name: name.to_string(),
            priority,
        }
    }

    fn table_with(files: &[(&str, u64)]) -> TransferTable {
        let table = TransferTable::new();
        for (name, size) in files {
            table.insert_requested(name);
            table.set_size(name, *size);
        }
        table
    }

    #[test]
    fn test_priority_order_critical_first() {
        let table = table_with(&[("n", 100_000), ("c", 100_000), ("h", 100_000)]);
        let snapshot = vec![
            request("n", PriorityClass::Normal),
            request("c", PriorityClass::Critical),
            request("h", PriorityClass::High),
        ];
        let plan = plan_round(&snapshot, &table);
        let names: Vec<&str> = plan.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["c", "h", "n"]);
    }

    #[test]
    fn test_stable_within_class() {
        let table = table_with(&[("a", 10_000), ("b", 10_000), ("c", 10_000)]);
        let snapshot = vec![
            request("a", PriorityClass::High),
            request("b", PriorityClass::High),
            request("c", PriorityClass::High),
        ];
        let plan = plan_round(&snapshot, &table);
        let names: Vec<&str> = plan.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_quota_bounds_chunks() {
        let table = table_with(&[("c", 100_000), ("n", 100_000)]);
        let snapshot = vec![
            request("c", PriorityClass::Critical),
            request("n", PriorityClass::Normal),
        ];
        let plan = plan_round(&snapshot, &table);
        assert_eq!(plan[0].chunk_lens, vec![CHUNK_SIZE; 10]);
        assert_eq!(plan[1].chunk_lens, vec![CHUNK_SIZE; 1]);
        // With abundant data, the critical file moves strictly more bytes.
        assert!(plan[0].byte_len() > plan[1].byte_len());
    }

    #[test]
    fn test_short_tail_chunk() {
        let table = table_with(&[("a", CHUNK_SIZE as u64 * 2 + 100)]);
        let snapshot = vec![request("a", PriorityClass::Critical)];
        let plan = plan_round(&snapshot, &table);
        assert_eq!(plan[0].chunk_lens, vec![CHUNK_SIZE, CHUNK_SIZE, 100]);
    }

    #[test]
    fn test_quota_not_wasted_on_drained_file() {
        let table = table_with(&[("a", 100)]);
        let snapshot = vec![request("a", PriorityClass::Critical)];
        let plan = plan_round(&snapshot, &table);
        // 100 bytes < one chunk: the turn holds a single bounded chunk.
        assert_eq!(plan[0].chunk_lens, vec![100]);
    }

    #[test]
    fn test_skips_unschedulable_entries() {
        let table = table_with(&[("done", 100), ("failed", 100), ("ok", 100)]);
        table.record_bytes("done", 100);
        table.mark_failed("failed");
        let snapshot = vec![
            request("done", PriorityClass::Critical),
            request("failed", PriorityClass::Critical),
            request("unknown", PriorityClass::Critical),
            request("ok", PriorityClass::Normal),
        ];
        let plan = plan_round(&snapshot, &table);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].name, "ok");
    }

    #[test]
    fn test_resumption_offset() {
        let table = table_with(&[("a", 50_000)]);
        table.record_bytes("a", 12_288);
        let snapshot = vec![request("a", PriorityClass::High)];
        let plan = plan_round(&snapshot, &table);
        assert_eq!(plan[0].offset, 12_288);
        assert_eq!(plan[0].chunk_lens.len(), 4);
    }

    #[test]
    fn test_round_progression_drains_file() {
        // Simulate consecutive rounds by recording planned bytes between
        // plans: the offsets advance and the file eventually drains.
        let size = CHUNK_SIZE as u64 * 3 + 10;
        let table = table_with(&[("a", size)]);
        let snapshot = vec![request("a", PriorityClass::Normal)];

        let mut moved = 0u64;
        for _ in 0..4 {
            let plan = plan_round(&snapshot, &table);
            assert_eq!(plan.len(), 1);
            assert_eq!(plan[0].offset, moved);
            for &len in &plan[0].chunk_lens {
                table.record_bytes("a", len as u64);
                moved += len as u64;
            }
        }
        assert_eq!(moved, size);
        assert!(plan_round(&snapshot, &table).is_empty());
    }
}
