use std::io;

use thiserror::Error;

/// Errors surfaced by the transfer core.
///
/// Transport failures abort the owning connection; per-file failures
/// (`NotFound`, `SourceIo`) stay isolated to that file's transfer state and
/// never touch sibling transfers in the same round.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The server offered no file by this name (size header 0).
    /// Terminal for that name, no retry.
    #[error("file not found: {0}")]
    NotFound(String),

    /// The peer went away mid-transfer (EOF, reset, or read timeout).
    #[error("connection lost: {0}")]
    ConnectionLost(#[source] io::Error),

    /// Server-side source open/read failed after the size was announced.
    #[error("source read failed for {name}: {source}")]
    SourceIo {
        name: String,
        #[source]
        source: io::Error,
    },

    /// The peer violated message framing.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Local file I/O (ledger appends, output artifacts).
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl TransferError {
    /// Map a stream error to `ConnectionLost`. `read_exact` reports a
    /// closed peer as `UnexpectedEof`, which is the disconnect case on
    /// this protocol.
    pub(crate) fn lost(err: io::Error) -> Self {
        TransferError::ConnectionLost(err)
    }

    /// True when the failure means the whole connection is unusable.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, TransferError::ConnectionLost(_))
    }

    pub(crate) fn source_io(name: &str) -> impl FnOnce(io::Error) -> Self {
        let name = name.to_string();
        move |source| TransferError::SourceIo { name, source }
    }
}
