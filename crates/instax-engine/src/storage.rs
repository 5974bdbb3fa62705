// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print storage: where received image bytes go.
//
// The engine treats the payload as opaque.  Sinks are opened on print start,
// appended per data chunk and either finalized on execute or discarded.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use instax_core::error::{InstaxError, Result};

/// Per-sink cap used by [`DirectoryStorage`] unless overridden.
pub const DEFAULT_SINK_CAP: usize = 4 * 1024 * 1024;

/// Opaque handle to an open sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(u64);

/// A finalized print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPrint {
    pub name: String,
    /// Location on disk, if the storage is file-backed.
    pub path: Option<PathBuf>,
    pub bytes: u64,
    /// Lowercase hex SHA-256 of the stored bytes.
    pub sha256: String,
}

/// Destination for print payloads.
pub trait PrintStorage: Send {
    fn open_sink(&mut self, name: &str) -> Result<SinkId>;
    fn append(&mut self, sink: SinkId, bytes: &[u8]) -> Result<()>;
    fn finalize(&mut self, sink: SinkId) -> Result<StoredPrint>;
    /// Drop a sink and anything written to it.  Unknown ids are ignored.
    fn discard(&mut self, sink: SinkId);
}

/// Sink name for a print started at `unix_secs`.
pub fn sink_name(unix_secs: i64) -> String {
    format!("print_{unix_secs}.jpg")
}

fn unknown_sink(sink: SinkId) -> InstaxError {
    InstaxError::Storage(format!("unknown sink {}", sink.0))
}

// ---------------------------------------------------------------------------
// Directory storage
// ---------------------------------------------------------------------------

struct OpenFile {
    name: String,
    part_path: PathBuf,
    file: File,
    hasher: Sha256,
    written: usize,
}

/// Writes each print to `<dir>/<name>.part` and renames it on finalize.
pub struct DirectoryStorage {
    dir: PathBuf,
    cap: usize,
    next_id: u64,
    open: HashMap<SinkId, OpenFile>,
}

impl DirectoryStorage {
    /// Use `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        info!(dir = %dir.display(), "print storage ready");
        Ok(Self {
            dir,
            cap: DEFAULT_SINK_CAP,
            next_id: 0,
            open: HashMap::new(),
        })
    }

    pub fn with_cap(mut self, cap: usize) -> Self {
        self.cap = cap;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `name`, or `stem-N.ext` for the first N not already taken.
    fn free_name(&self, name: &str) -> String {
        if !self.dir.join(name).exists() {
            return name.to_owned();
        }
        let (stem, ext) = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
            _ => (name, None),
        };
        let candidate = |n: u32| match ext {
            Some(ext) => format!("{stem}-{n}.{ext}"),
            None => format!("{stem}-{n}"),
        };
        let mut n = 1;
        while self.dir.join(candidate(n)).exists() {
            n += 1;
        }
        let free = candidate(n);
        debug!(requested = name, stored = %free, "print name taken, using suffix");
        free
    }
}

impl PrintStorage for DirectoryStorage {
    fn open_sink(&mut self, name: &str) -> Result<SinkId> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(InstaxError::Storage(format!("invalid sink name {name:?}")));
        }
        let part_path = self.dir.join(format!("{name}.part"));
        let file = File::create(&part_path)
            .map_err(|e| InstaxError::Storage(format!("create {}: {e}", part_path.display())))?;

        let id = SinkId(self.next_id);
        self.next_id += 1;
        debug!(sink = id.0, path = %part_path.display(), "sink opened");
        self.open.insert(
            id,
            OpenFile {
                name: name.to_owned(),
                part_path,
                file,
                hasher: Sha256::new(),
                written: 0,
            },
        );
        Ok(id)
    }

    fn append(&mut self, sink: SinkId, bytes: &[u8]) -> Result<()> {
        let entry = self.open.get_mut(&sink).ok_or_else(|| unknown_sink(sink))?;
        if entry.written + bytes.len() > self.cap {
            return Err(InstaxError::Storage(format!(
                "sink {} would exceed {} bytes",
                entry.name, self.cap
            )));
        }
        entry.file.write_all(bytes)?;
        entry.hasher.update(bytes);
        entry.written += bytes.len();
        Ok(())
    }

    fn finalize(&mut self, sink: SinkId) -> Result<StoredPrint> {
        let mut entry = self.open.remove(&sink).ok_or_else(|| unknown_sink(sink))?;
        entry.file.flush()?;
        entry.file.sync_all()?;
        drop(entry.file);

        let name = self.free_name(&entry.name);
        let final_path = self.dir.join(&name);
        fs::rename(&entry.part_path, &final_path)?;
        let sha256 = hex::encode(entry.hasher.finalize());
        info!(
            name = %name,
            bytes = entry.written,
            sha256 = %sha256,
            "print stored"
        );
        Ok(StoredPrint {
            name,
            path: Some(final_path),
            bytes: entry.written as u64,
            sha256,
        })
    }

    fn discard(&mut self, sink: SinkId) {
        let Some(entry) = self.open.remove(&sink) else {
            return;
        };
        drop(entry.file);
        if let Err(e) = fs::remove_file(&entry.part_path) {
            warn!(path = %entry.part_path.display(), error = %e, "could not remove partial print");
        } else {
            debug!(name = %entry.name, bytes = entry.written, "partial print discarded");
        }
    }
}

// ---------------------------------------------------------------------------
// Memory storage
// ---------------------------------------------------------------------------

/// Keeps prints in memory.  Handy for tests and embedding.
#[derive(Default)]
pub struct MemoryStorage {
    next_id: u64,
    open: HashMap<SinkId, (String, Vec<u8>)>,
    finished: Vec<(String, Vec<u8>)>,
    discarded: usize,
    fail_next_open: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `open_sink` call fail.
    pub fn fail_next_open(&mut self) {
        self.fail_next_open = true;
    }

    /// Finalized prints in completion order.
    pub fn finished(&self) -> &[(String, Vec<u8>)] {
        &self.finished
    }

    pub fn open_sinks(&self) -> usize {
        self.open.len()
    }

    pub fn discarded(&self) -> usize {
        self.discarded
    }
}

impl PrintStorage for MemoryStorage {
    fn open_sink(&mut self, name: &str) -> Result<SinkId> {
        if std::mem::take(&mut self.fail_next_open) {
            return Err(InstaxError::Storage("allocation failed".into()));
        }
        let id = SinkId(self.next_id);
        self.next_id += 1;
        self.open.insert(id, (name.to_owned(), Vec::new()));
        Ok(id)
    }

    fn append(&mut self, sink: SinkId, bytes: &[u8]) -> Result<()> {
        let (_, buf) = self.open.get_mut(&sink).ok_or_else(|| unknown_sink(sink))?;
        buf.extend_from_slice(bytes);
        Ok(())
    }

    fn finalize(&mut self, sink: SinkId) -> Result<StoredPrint> {
        let (name, data) = self.open.remove(&sink).ok_or_else(|| unknown_sink(sink))?;
        let stored = StoredPrint {
            name: name.clone(),
            path: None,
            bytes: data.len() as u64,
            sha256: hex::encode(Sha256::digest(&data)),
        };
        self.finished.push((name, data));
        Ok(stored)
    }

    fn discard(&mut self, sink: SinkId) {
        if self.open.remove(&sink).is_some() {
            self.discarded += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    // -- Directory storage --

    #[test]
    fn directory_finalize_renames_and_hashes() {
        let tmp = tempfile::tempdir().unwrap();
        let mut storage = DirectoryStorage::new(tmp.path().join("prints")).unwrap();
        let sink = storage.open_sink("print_1.jpg").unwrap();
        assert!(tmp.path().join("prints/print_1.jpg.part").exists());

        storage.append(sink, b"hel").unwrap();
        storage.append(sink, b"lo").unwrap();
        let stored = storage.finalize(sink).unwrap();

        assert_eq!(stored.bytes, 5);
        assert_eq!(stored.sha256, HELLO_SHA256);
        let path = stored.path.unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"hello");
        assert!(!tmp.path().join("prints/print_1.jpg.part").exists());
    }

    #[test]
    fn directory_same_name_prints_do_not_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let mut storage = DirectoryStorage::new(tmp.path()).unwrap();

        let mut names = Vec::new();
        for body in [&b"first"[..], b"second", b"third"] {
            let sink = storage.open_sink("print_1718000000.jpg").unwrap();
            storage.append(sink, body).unwrap();
            names.push(storage.finalize(sink).unwrap().name);
        }

        assert_eq!(names, ["print_1718000000.jpg", "print_1718000000-1.jpg", "print_1718000000-2.jpg"]);
        assert_eq!(fs::read(tmp.path().join("print_1718000000.jpg")).unwrap(), b"first");
        assert_eq!(fs::read(tmp.path().join("print_1718000000-1.jpg")).unwrap(), b"second");
        assert_eq!(fs::read(tmp.path().join("print_1718000000-2.jpg")).unwrap(), b"third");
    }

    #[test]
    fn directory_discard_removes_partial_file() {
        let tmp = tempfile::tempdir().unwrap();
        let mut storage = DirectoryStorage::new(tmp.path()).unwrap();
        let sink = storage.open_sink("print_2.jpg").unwrap();
        storage.append(sink, &[1, 2, 3]).unwrap();
        storage.discard(sink);
        assert!(fs::read_dir(tmp.path()).unwrap().next().is_none());
        assert!(storage.finalize(sink).is_err());
    }

    #[test]
    fn directory_append_respects_cap() {
        let tmp = tempfile::tempdir().unwrap();
        let mut storage = DirectoryStorage::new(tmp.path()).unwrap().with_cap(4);
        let sink = storage.open_sink("print_3.jpg").unwrap();
        storage.append(sink, &[0; 4]).unwrap();
        assert!(matches!(storage.append(sink, &[0]), Err(InstaxError::Storage(_))));
        assert_eq!(storage.finalize(sink).unwrap().bytes, 4);
    }

    #[test]
    fn directory_rejects_path_like_names() {
        let tmp = tempfile::tempdir().unwrap();
        let mut storage = DirectoryStorage::new(tmp.path()).unwrap();
        assert!(storage.open_sink("../escape.jpg").is_err());
        assert!(storage.open_sink("").is_err());
    }

    #[test]
    fn directory_open_fails_when_dir_vanishes() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("gone");
        let mut storage = DirectoryStorage::new(&dir).unwrap();
        fs::remove_dir(&dir).unwrap();
        assert!(matches!(storage.open_sink("print_4.jpg"), Err(InstaxError::Storage(_))));
    }

    // -- Memory storage --

    #[test]
    fn memory_storage_tracks_lifecycle() {
        let mut storage = MemoryStorage::new();
        let a = storage.open_sink("a.jpg").unwrap();
        let b = storage.open_sink("b.jpg").unwrap();
        storage.append(a, b"hello").unwrap();
        storage.discard(b);

        let stored = storage.finalize(a).unwrap();
        assert_eq!(stored.sha256, HELLO_SHA256);
        assert_eq!(storage.finished().len(), 1);
        assert_eq!(storage.discarded(), 1);
        assert_eq!(storage.open_sinks(), 0);
    }

    #[test]
    fn memory_fail_next_open_is_one_shot() {
        let mut storage = MemoryStorage::new();
        storage.fail_next_open();
        assert!(storage.open_sink("x.jpg").is_err());
        assert!(storage.open_sink("x.jpg").is_ok());
    }

    #[test]
    fn sink_names_use_unix_seconds() {
        assert_eq!(sink_name(1_718_000_000), "print_1718000000.jpg");
    }
}
