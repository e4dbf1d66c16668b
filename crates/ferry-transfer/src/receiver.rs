/// Client-side receive session.
///
/// Drives the lockstep round loop: snapshot the queue, send the request
/// list, absorb size headers for newly named files, then read the round's
/// chunk layout (mirroring the server's plan) into per-file output
/// artifacts. A single loop drives cooperative per-file progress, so no
/// per-file thread ever races another for socket bytes. Completion side
/// effects are guarded by the ledger so they fire at most once per name.

use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::TransferError;
use crate::ledger::CompletedLedger;
use crate::protocol::{CHUNK_SIZE, encode_request, read_listing, read_u32, write_control, write_u32};
use crate::queue::DownloadQueue;
use crate::scheduler::{FileTurn, plan_round};
use crate::table::{TransferStatus, TransferTable};

/// Fallback poll interval while the queue is empty. Enqueues wake the
/// session early through the queue's wake channel.
pub const IDLE_POLL: Duration = Duration::from_secs(2);

pub struct ReceiverConfig {
    /// Directory receiving one artifact per downloaded file name.
    pub output_dir: PathBuf,
    /// Display name sent in the handshake.
    pub client_name: String,
}

/// What one `run_round` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Nothing queued; the caller should wait for work.
    Idle,
    /// A request round was exchanged (possibly only size headers).
    Transferred { files: usize, bytes: u64 },
}

pub struct Receiver {
    stream: TcpStream,
    config: ReceiverConfig,
    queue: Arc<DownloadQueue>,
    ledger: Arc<CompletedLedger>,
    table: TransferTable,
    chunk_buf: Vec<u8>,
}

impl Receiver {
    pub fn new(
        stream: TcpStream,
        config: ReceiverConfig,
        queue: Arc<DownloadQueue>,
        ledger: Arc<CompletedLedger>,
    ) -> Self {
        Self {
            stream,
            config,
            queue,
            ledger,
            table: TransferTable::new(),
            chunk_buf: vec![0u8; CHUNK_SIZE],
        }
    }

    /// Per-connection progress record, shared with progress reporters.
    pub fn table(&self) -> &TransferTable {
        &self.table
    }

    /// Send the display name, return the server's catalog listing.
    pub fn handshake(&mut self) -> Result<String, TransferError> {
        write_control(&mut self.stream, &self.config.client_name)?;
        read_listing(&mut self.stream)
    }

    /// Round loop: rounds run back-to-back while the active set is
    /// non-empty, otherwise the session parks on the queue's wake channel
    /// with `IDLE_POLL` as the bounded fallback. Returns only on error;
    /// a lost connection terminates the session.
    pub fn run(&mut self) -> Result<(), TransferError> {
        loop {
            if let RoundOutcome::Idle = self.run_round()? {
                self.queue.wait_for_work(IDLE_POLL);
            }
        }
    }

    /// Execute one scheduling round against the current queue snapshot.
    pub fn run_round(&mut self) -> Result<RoundOutcome, TransferError> {
        let mut snapshot = self.queue.snapshot();

        // Terminal names are terminal for the connection's lifetime. The
        // producer only filters the completed ledger, so a Failed name
        // comes back on every rescan; sweep it out here instead of
        // re-requesting it (the server would never re-send its size
        // header anyway).
        snapshot.retain(|request| match self.table.status(&request.name) {
            Some(TransferStatus::Completed) | Some(TransferStatus::Failed) => {
                self.queue.remove(&request.name);
                false
            }
            _ => true,
        });

        // Idle unless this round would learn a new size or move bytes.
        // After the sweep, every surviving known name is schedulable, so
        // an empty snapshot is exactly the empty active set.
        if snapshot.is_empty() {
            return Ok(RoundOutcome::Idle);
        }

        write_u32(&mut self.stream, snapshot.len() as u32)?;
        for request in &snapshot {
            write_control(
                &mut self.stream,
                &encode_request(&request.name, request.priority),
            )?;
        }

        // One size header arrives per name this connection has not seen
        // before, in request order. Size 0 is terminal: no retry.
        for request in &snapshot {
            if self.table.contains(&request.name) {
                continue;
            }
            self.table.insert_requested(&request.name);
            let size = read_u32(&mut self.stream)? as u64;
            if size == 0 {
                self.table.mark_failed(&request.name);
                let err = TransferError::NotFound(request.name.clone());
                warn!("{err}, giving up");
                self.queue.remove(&request.name);
            } else {
                self.table.set_size(&request.name, size);
                info!(file = %request.name, size, "transfer opened");
            }
        }

        let plan = plan_round(&snapshot, &self.table);
        let mut files = 0usize;
        let mut bytes = 0u64;
        for turn in &plan {
            self.receive_turn(turn)?;
            files += 1;
            bytes += turn.byte_len();
        }
        Ok(RoundOutcome::Transferred { files, bytes })
    }

    /// Read one file's turn off the stream into its output artifact.
    fn receive_turn(&mut self, turn: &FileTurn) -> Result<(), TransferError> {
        let path = self.config.output_dir.join(&turn.name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = OpenOptions::new().create(true).append(true).open(&path)?;

        for &len in &turn.chunk_lens {
            self.stream
                .read_exact(&mut self.chunk_buf[..len])
                .map_err(TransferError::lost)?;
            out.write_all(&self.chunk_buf[..len])?;
            debug!(file = %turn.name, len, "chunk received");

            let Some(outcome) = self.table.record_bytes(&turn.name, len as u64) else {
                continue;
            };
            if let Some(percent) = self.table.percent_if_changed(&turn.name) {
                info!(file = %turn.name, percent, "downloading");
            }
            if outcome.just_completed {
                if self.ledger.record(&turn.name)? {
                    info!(file = %turn.name, "completed");
                }
                self.queue.remove(&turn.name);
            }
        }
        Ok(())
    }
}
