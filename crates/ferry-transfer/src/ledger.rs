/// Completed-set ledger.
///
/// Names that have been fully received and durably logged at least once.
/// Seeded from the append-only completed log at startup; suppresses
/// duplicate completion side effects when more than one observer races to
/// see a transfer finish.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct CompletedLedger {
    names: Mutex<HashSet<String>>,
    log_path: PathBuf,
}

impl CompletedLedger {
    /// Load prior completions. A missing log file is an empty ledger.
    pub fn load(log_path: &Path) -> io::Result<Self> {
        let mut names = HashSet::new();
        match File::open(log_path) {
            Ok(file) => {
                for line in BufReader::new(file).lines() {
                    let line = line?;
                    let name = line.trim();
                    if !name.is_empty() {
                        names.insert(name.to_string());
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        Ok(Self {
            names: Mutex::new(names),
            log_path: log_path.to_path_buf(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.lock().unwrap().contains(name)
    }

    /// Record a completion. Returns false (and appends nothing) when the
    /// name was already recorded. Set insert and log append happen under
    /// one lock so racing observers cannot both win.
    pub fn record(&self, name: &str) -> io::Result<bool> {
        let mut names = self.names.lock().unwrap();
        if names.contains(name) {
            return Ok(false);
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        writeln!(file, "{}", name)?;
        names.insert(name.to_string());
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.names.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.lock().unwrap().is_empty()
    }
}
