// SPDX-License-Identifier: MIT

//! A generic append-only, line-delimited JSON log with fsync-before-return
//! durability and full-file replay on open. Backs the Event Log; the Queue
//! Store uses a separate snapshot file since its records mutate in place.

use serde::{de::DeserializeOwned, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

#[derive(serde::Serialize, serde::Deserialize)]
struct Record<T> {
    seq: u64,
    value: T,
}

/// One replayed row, tagged with its assigned sequence number.
pub struct WalEntry<T> {
    pub seq: u64,
    pub value: T,
}

/// Append-only log of `T`, one JSON object per line.
pub struct Wal<T> {
    path: PathBuf,
    file: File,
    next_seq: u64,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned> Wal<T> {
    /// Open (creating if absent) and replay the file to recover `next_seq`.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let max_seq = Self::replay_max_seq(&path)?;
        let file = OpenOptions::new().create(true).append(true).read(true).open(&path)?;
        Ok(Self { path, file, next_seq: max_seq + 1, _marker: std::marker::PhantomData })
    }

    fn replay_max_seq(path: &Path) -> io::Result<u64> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let mut max = 0u64;
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(record) = serde_json::from_str::<Record<serde_json::Value>>(&line) {
                max = max.max(record.seq);
            }
        }
        Ok(max)
    }

    /// Append `value`, assigning it the next sequence number. Durable
    /// (fsynced) before returning.
    pub fn append(&mut self, value: &T) -> io::Result<u64> {
        let seq = self.next_seq;
        let line = serde_json::to_string(&Record { seq, value })
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(self.file, "{line}")?;
        self.file.flush()?;
        self.file.sync_data()?;
        self.next_seq += 1;
        Ok(seq)
    }

    /// Replay the entire file in append order.
    pub fn replay(&self) -> io::Result<Vec<WalEntry<T>>> {
        let file = File::open(&self.path)?;
        let mut out = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: Record<T> =
                serde_json::from_str(&line).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            out.push(WalEntry { seq: record.seq, value: record.value });
        }
        Ok(out)
    }

    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_assigns_increasing_sequence_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let mut wal: Wal<String> = Wal::open(dir.path().join("log.jsonl")).unwrap();
        let a = wal.append(&"a".to_string()).unwrap();
        let b = wal.append(&"b".to_string()).unwrap();
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[test]
    fn reopening_resumes_sequence_after_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        {
            let mut wal: Wal<String> = Wal::open(&path).unwrap();
            wal.append(&"a".to_string()).unwrap();
            wal.append(&"b".to_string()).unwrap();
        }
        let mut wal: Wal<String> = Wal::open(&path).unwrap();
        assert_eq!(wal.next_seq(), 3);
        let entries = wal.replay().unwrap();
        assert_eq!(entries.len(), 2);
        let c = wal.append(&"c".to_string()).unwrap();
        assert_eq!(c, 3);
    }
}
