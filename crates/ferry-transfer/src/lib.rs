/// Ferry: priority-aware resumable chunked file transfer.
///
/// Core pieces shared by the server and client binaries:
/// - length-prefixed control framing with big-endian integer headers
/// - a per-connection transfer-state table with clamped, idempotent
///   progress accounting
/// - a deterministic priority-weighted round scheduler, run identically on
///   both endpoints so raw chunk payloads need no per-chunk headers
/// - a producer-fed download queue with wake-on-enqueue
/// - an idempotent completed-set ledger backed by an append-only log

pub mod catalog;
pub mod error;
pub mod ledger;
pub mod priority;
pub mod protocol;
pub mod queue;
pub mod receiver;
pub mod scheduler;
pub mod sender;
pub mod table;

// Re-export key types for convenience.
pub use catalog::{CatalogEntry, format_listing, load_catalog};
pub use error::TransferError;
pub use ledger::CompletedLedger;
pub use priority::PriorityClass;
pub use protocol::{CHUNK_SIZE, MAX_CONTROL_LEN, MAX_LISTING_LEN};
pub use queue::{DownloadQueue, TransferRequest};
pub use receiver::{IDLE_POLL, Receiver, ReceiverConfig, RoundOutcome};
pub use scheduler::{FileTurn, plan_round};
pub use sender::{SenderConfig, run_sender};
pub use table::{RecordOutcome, TransferStatus, TransferTable};
