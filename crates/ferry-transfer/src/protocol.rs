/// Wire codec for the transfer protocol.
///
/// ```text
/// handshake:  client  [u32 len][client name]
///             server  [u32 len][catalog listing]
/// round:      client  [u32 count] then per file [u32 len]["name|PRIORITY"]
///             server  [u32 size] per newly named file (0 = not found)
///             server  raw chunk payloads in the deterministic round order
/// ```
///
/// All integers are 4-byte big-endian. Textual control messages are
/// length-prefixed; chunk payloads carry no per-chunk header because both
/// endpoints derive the same round plan (see `scheduler`). Owns no state:
/// pure functions over readers and writers.

use std::io::{Read, Write};

use crate::error::TransferError;
use crate::priority::PriorityClass;

/// Maximum bytes moved by one chunk read/write.
pub const CHUNK_SIZE: usize = 1024;

/// Upper bound for one length-prefixed control message.
pub const MAX_CONTROL_LEN: usize = 4096;

/// Upper bound for the catalog listing, the one control message whose
/// size scales with server configuration rather than with a file name.
pub const MAX_LISTING_LEN: usize = 64 * 1024;

/// Separator between file name and priority token in a request entry.
pub const REQUEST_DELIMITER: char = '|';

pub fn write_u32(w: &mut impl Write, value: u32) -> Result<(), TransferError> {
    w.write_all(&value.to_be_bytes()).map_err(TransferError::lost)
}

pub fn read_u32(r: &mut impl Read) -> Result<u32, TransferError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(TransferError::lost)?;
    Ok(u32::from_be_bytes(buf))
}

fn write_text(w: &mut impl Write, text: &str, cap: usize) -> Result<(), TransferError> {
    if text.len() > cap {
        return Err(TransferError::Protocol(format!(
            "message of {} bytes exceeds {} byte cap",
            text.len(),
            cap
        )));
    }
    write_u32(w, text.len() as u32)?;
    w.write_all(text.as_bytes()).map_err(TransferError::lost)
}

fn read_text(r: &mut impl Read, cap: usize) -> Result<String, TransferError> {
    let len = read_u32(r)? as usize;
    if len > cap {
        return Err(TransferError::Protocol(format!(
            "message length {} exceeds {} byte cap",
            len, cap
        )));
    }
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).map_err(TransferError::lost)?;
    String::from_utf8(buf).map_err(|_| TransferError::Protocol("message is not UTF-8".into()))
}

/// Send one length-prefixed control message.
pub fn write_control(w: &mut impl Write, text: &str) -> Result<(), TransferError> {
    write_text(w, text, MAX_CONTROL_LEN)
}

/// Receive one length-prefixed control message.
pub fn read_control(r: &mut impl Read) -> Result<String, TransferError> {
    read_text(r, MAX_CONTROL_LEN)
}

/// Send the catalog listing. Same framing as a control message, larger
/// cap: a populated catalog outgrows `MAX_CONTROL_LEN` long before it
/// stops being a reasonable handshake payload.
pub fn write_listing(w: &mut impl Write, text: &str) -> Result<(), TransferError> {
    write_text(w, text, MAX_LISTING_LEN)
}

/// Receive the catalog listing.
pub fn read_listing(r: &mut impl Read) -> Result<String, TransferError> {
    read_text(r, MAX_LISTING_LEN)
}

/// Format a request entry: `<name>|<priorityToken>`.
pub fn encode_request(name: &str, priority: PriorityClass) -> String {
    format!("{}{}{}", name, REQUEST_DELIMITER, priority.token())
}

/// Parse a request entry. The name must be non-empty; an unrecognized
/// priority token degrades to `Normal`.
pub fn parse_request(entry: &str) -> Result<(String, PriorityClass), TransferError> {
    match entry.split_once(REQUEST_DELIMITER) {
        Some((name, token)) if !name.is_empty() => {
            Ok((name.to_string(), PriorityClass::parse_token(token)))
        }
        _ => Err(TransferError::Protocol(format!(
            "malformed request entry {:?}",
            entry
        ))),
    }
}
