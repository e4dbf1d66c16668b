/// Server-side connection loop.
///
/// One OS thread owns one accepted connection: receive the handshake,
/// publish the catalog listing, then serve request rounds until the client
/// goes away. All per-connection state lives in a `TransferTable` owned
/// here; nothing is shared across connections.

use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::catalog::{CatalogEntry, format_listing};
use crate::error::TransferError;
use crate::protocol::{CHUNK_SIZE, parse_request, read_control, read_u32, write_listing, write_u32};
use crate::queue::TransferRequest;
use crate::scheduler::{FileTurn, plan_round};
use crate::table::TransferTable;

pub struct SenderConfig {
    /// Directory holding the files named by the catalog.
    pub storage_dir: PathBuf,
    /// Offer list loaded once at server startup.
    pub catalog: Vec<CatalogEntry>,
}

/// Serve one client connection to completion. Returns `Ok` on a clean
/// disconnect (EOF while waiting for the next round request).
pub fn run_sender(mut stream: TcpStream, config: &SenderConfig) -> Result<(), TransferError> {
    let client_name = read_control(&mut stream)?;
    info!(client = %client_name, "client connected");
    write_listing(&mut stream, &format_listing(&config.catalog))?;

    let offered: HashSet<&str> = config.catalog.iter().map(|e| e.name.as_str()).collect();
    let table = TransferTable::new();
    let mut chunk_buf = vec![0u8; CHUNK_SIZE];

    loop {
        // A disconnect between rounds is the normal way a client leaves.
        let count = match read_u32(&mut stream) {
            Ok(count) => count,
            Err(TransferError::ConnectionLost(_)) => {
                info!(client = %client_name, "client disconnected");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let mut snapshot: Vec<TransferRequest> = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let entry = read_control(&mut stream)?;
            let (name, priority) = parse_request(&entry)?;
            // Tolerate duplicate entries within one round request.
            if snapshot.iter().any(|r| r.name == name) {
                continue;
            }
            snapshot.push(TransferRequest { name, priority });
        }

        // Size headers for names first seen on this connection, in
        // request order. Size 0 announces "not found".
        for request in &snapshot {
            if table.contains(&request.name) {
                continue;
            }
            table.insert_requested(&request.name);
            let size = resolve(&offered, &config.storage_dir, &request.name);
            write_u32(&mut stream, size as u32)?;
            if size == 0 {
                table.mark_failed(&request.name);
                warn!(client = %client_name, file = %request.name, "requested file not offered");
            } else {
                table.set_size(&request.name, size);
                info!(client = %client_name, file = %request.name, size, "transfer opened");
            }
        }

        for turn in plan_round(&snapshot, &table) {
            match send_turn(
                &mut stream,
                &config.storage_dir,
                &table,
                &turn,
                &client_name,
                &mut chunk_buf,
            ) {
                Ok(()) => {}
                Err(TransferError::SourceIo { name, source }) => {
                    // The chunk stream carries no per-chunk headers, so a
                    // turn that stops short would hand this file's planned
                    // bytes to the next file in the round. Dropping the
                    // connection is the only way to keep the siblings'
                    // artifacts intact; the client reconnects and resumes.
                    warn!(client = %client_name, file = %name, error = %source, "source read failed, closing connection");
                    table.mark_failed(&name);
                    return Err(TransferError::SourceIo { name, source });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Size announced for a requested name. Catalog membership gates the
/// offer; the on-disk size is the truth. 0 means not found, so names that
/// are unsafe, missing, empty, or too large for the 4-byte size header
/// all resolve to "not offered".
fn resolve(offered: &HashSet<&str>, storage_dir: &Path, name: &str) -> u64 {
    if !name_is_safe(name) || !offered.contains(name) {
        return 0;
    }
    match std::fs::metadata(storage_dir.join(name)) {
        Ok(meta) if meta.is_file() && meta.len() <= u32::MAX as u64 => meta.len(),
        Ok(_) | Err(_) => 0,
    }
}

/// Requested names must be plain file names, not paths.
fn name_is_safe(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['/', '\\'])
        && name != "."
        && name != ".."
}

fn send_turn(
    stream: &mut TcpStream,
    storage_dir: &Path,
    table: &TransferTable,
    turn: &FileTurn,
    client_name: &str,
    chunk_buf: &mut [u8],
) -> Result<(), TransferError> {
    let path = storage_dir.join(&turn.name);
    let mut file = File::open(&path).map_err(TransferError::source_io(&turn.name))?;
    file.seek(SeekFrom::Start(turn.offset))
        .map_err(TransferError::source_io(&turn.name))?;

    for &len in &turn.chunk_lens {
        file.read_exact(&mut chunk_buf[..len])
            .map_err(TransferError::source_io(&turn.name))?;
        stream.write_all(&chunk_buf[..len]).map_err(TransferError::lost)?;
        debug!(file = %turn.name, len, "chunk sent");
        if let Some(outcome) = table.record_bytes(&turn.name, len as u64) {
            if outcome.just_completed {
                info!(client = %client_name, file = %turn.name, "completed sending");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_safety() {
        assert!(name_is_safe("report.pdf"));
        assert!(name_is_safe("archive.tar.gz"));
        assert!(!name_is_safe(""));
        assert!(!name_is_safe(".."));
        assert!(!name_is_safe("../etc/passwd"));
        assert!(!name_is_safe("dir\\file"));
    }

    #[test]
    fn test_resolve_gates_on_catalog_and_disk() {
        let dir = std::env::temp_dir().join(format!("ferry-resolve-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("offered.bin"), b"hello").unwrap();
        std::fs::write(dir.join("unlisted.bin"), b"hello").unwrap();

        let offered: HashSet<&str> = ["offered.bin", "ghost.bin"].into_iter().collect();
        assert_eq!(resolve(&offered, &dir, "offered.bin"), 5);
        // In the catalog but not on disk.
        assert_eq!(resolve(&offered, &dir, "ghost.bin"), 0);
        // On disk but not in the catalog.
        assert_eq!(resolve(&offered, &dir, "unlisted.bin"), 0);
        assert_eq!(resolve(&offered, &dir, "../offered.bin"), 0);
    }
}
