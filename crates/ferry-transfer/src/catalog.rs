/// Server-side offer list, read once at startup from a plaintext file of
/// `<name> <sizeBytes>` lines.

use std::fs;
use std::io;
use std::path::Path;

use tracing::warn;

use crate::protocol::MAX_LISTING_LEN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub size_bytes: u64,
}

/// Parse the catalog file. Blank lines are skipped; malformed lines are
/// logged and skipped rather than failing startup.
pub fn load_catalog(path: &Path) -> io::Result<Vec<CatalogEntry>> {
    let contents = fs::read_to_string(path)?;
    let mut entries = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_line(line) {
            Some(entry) => entries.push(entry),
            None => warn!(line, "malformed catalog line, skipping"),
        }
    }
    Ok(entries)
}

fn parse_line(line: &str) -> Option<CatalogEntry> {
    let (name, size) = line.split_once(char::is_whitespace)?;
    let size_bytes = size.trim().parse().ok()?;
    Some(CatalogEntry {
        name: name.to_string(),
        size_bytes,
    })
}

/// Listing sent to clients after the handshake: `<name> <sizeMB>MB` per
/// line. Truncated to fit the listing frame; a catalog that large is
/// still browsable, just not in full.
pub fn format_listing(entries: &[CatalogEntry]) -> String {
    // Room for the truncation tail, which names how many entries fell off.
    const TAIL_RESERVE: usize = 40;

    let mut out = String::new();
    for (index, entry) in entries.iter().enumerate() {
        let line = format!("{} {}MB\n", entry.name, entry.size_bytes / (1024 * 1024));
        if out.len() + line.len() > MAX_LISTING_LEN - TAIL_RESERVE {
            out.push_str(&format!("... and {} more\n", entries.len() - index));
            break;
        }
        out.push_str(&line);
    }
    out
}
