//! File-backed tier
//!
//! Layout: `<root>/<fp[0..2]>/<fp>.body` holds the raw bytes and
//! `<fp>.meta.json` the serialized [`ResponseMetadata`]. Both files are written
//! through a temp file and renamed into place, so a crash never leaves a
//! half-written entry behind under its final name.
//!
//! The index lives in memory and is rebuilt from the directory on open.

use super::{CacheEntry, ResponseMetadata};
use crate::error::{Error, Result};
use bytes::Bytes;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const BODY_EXT: &str = "body";
const META_SUFFIX: &str = ".meta.json";
const TEMP_EXT: &str = "tmp";

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    size: u64,
    last_access: u64,
}

#[derive(Debug, Default)]
struct DiskIndex {
    entries: HashMap<String, IndexEntry>,
    total_bytes: u64,
    clock: u64,
}

impl DiskIndex {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn insert(&mut self, fingerprint: String, size: u64) {
        let last_access = self.tick();
        if let Some(old) = self
            .entries
            .insert(fingerprint, IndexEntry { size, last_access })
        {
            self.total_bytes -= old.size;
        }
        self.total_bytes += size;
    }

    fn remove(&mut self, fingerprint: &str) -> Option<IndexEntry> {
        let entry = self.entries.remove(fingerprint)?;
        self.total_bytes -= entry.size;
        Some(entry)
    }

    fn touch(&mut self, fingerprint: &str) -> bool {
        let tick = self.tick();
        match self.entries.get_mut(fingerprint) {
            Some(entry) => {
                entry.last_access = tick;
                true
            }
            None => false,
        }
    }

    /// Least recently used first, skipping `keep`
    fn eviction_order(&self, keep: &str) -> Vec<(String, u64)> {
        let mut candidates: Vec<_> = self
            .entries
            .iter()
            .filter(|(fp, _)| fp.as_str() != keep)
            .map(|(fp, e)| (fp.clone(), e.last_access, e.size))
            .collect();
        candidates.sort_by_key(|(_, last_access, _)| *last_access);
        candidates
            .into_iter()
            .map(|(fp, _, size)| (fp, size))
            .collect()
    }
}

/// Capacity-bounded persistent response store
#[derive(Debug)]
pub(crate) struct DiskTier {
    root: PathBuf,
    capacity: u64,
    index: Mutex<DiskIndex>,
}

impl DiskTier {
    /// Open (or create) a cache directory and rebuild its index
    pub(crate) fn open(root: impl Into<PathBuf>, capacity: u64) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            Error::Cache(format!(
                "failed to create cache directory {}: {e}",
                root.display()
            ))
        })?;

        let tier = Self {
            root,
            capacity,
            index: Mutex::new(DiskIndex::default()),
        };
        tier.rebuild_index()?;
        Ok(tier)
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn capacity(&self) -> u64 {
        self.capacity
    }

    /// `(entries, bytes)`
    pub(crate) fn usage(&self) -> (u64, u64) {
        let index = self.index.lock();
        (index.entries.len() as u64, index.total_bytes)
    }

    /// Read an entry; unreadable entries are dropped and reported as misses
    ///
    /// File reads run without the index lock. An entry removed or cleared
    /// while it was being read is reported as a miss.
    pub(crate) fn get(&self, fingerprint: &str) -> Option<CacheEntry> {
        let seen = self.index.lock().entries.get(fingerprint)?.last_access;

        let read = self.read_entry(fingerprint);

        let mut index = self.index.lock();
        let current = index.entries.get(fingerprint).map(|e| e.last_access);
        match read {
            Ok(entry) => {
                if current.is_none() {
                    return None;
                }
                index.touch(fingerprint);
                drop(index);
                // Persist recency so the LRU order survives a restart
                if let Ok(file) = fs::File::options()
                    .write(true)
                    .open(self.body_path(fingerprint))
                {
                    let _ = file.set_modified(SystemTime::now());
                }
                Some(entry)
            }
            Err(e) => {
                // Only discard the version that failed; a concurrent put may have replaced it
                if current == Some(seen) {
                    tracing::warn!(fingerprint, error = %e, "Discarding unreadable disk cache entry");
                    index.remove(fingerprint);
                    self.remove_files(fingerprint);
                }
                None
            }
        }
    }

    /// Drop a single entry
    pub(crate) fn remove(&self, fingerprint: &str) {
        let mut index = self.index.lock();
        if index.remove(fingerprint).is_some() {
            self.remove_files(fingerprint);
        }
    }

    /// Write an entry, evicting least recently used entries to make room
    ///
    /// Returns `Ok(false)` without touching the disk when the entry is larger
    /// than the whole tier.
    pub(crate) fn put(&self, fingerprint: &str, entry: &CacheEntry) -> Result<bool> {
        let meta = serde_json::to_vec(&entry.metadata)?;
        let size = (entry.body.len() + meta.len()) as u64;
        if size > self.capacity {
            return Ok(false);
        }

        let mut index = self.index.lock();
        let existing = index.entries.get(fingerprint).map_or(0, |e| e.size);
        let mut projected = index.total_bytes - existing + size;

        if projected > self.capacity {
            for (victim, victim_size) in index.eviction_order(fingerprint) {
                if projected <= self.capacity {
                    break;
                }
                tracing::debug!(fingerprint = %victim, size = victim_size, "Evicting disk cache entry");
                index.remove(&victim);
                self.remove_files(&victim);
                projected -= victim_size;
            }
        }

        let dir = self.shard_dir(fingerprint);
        fs::create_dir_all(&dir)?;
        // A failed body write leaves any previous entry intact
        write_atomic(&self.body_path(fingerprint), &entry.body)?;
        if let Err(e) = write_atomic(&self.meta_path(fingerprint), &meta) {
            index.remove(fingerprint);
            self.remove_files(fingerprint);
            return Err(e);
        }

        index.insert(fingerprint.to_string(), size);
        Ok(true)
    }

    /// Remove every entry
    pub(crate) fn clear(&self) -> Result<()> {
        let mut index = self.index.lock();
        for dir_entry in fs::read_dir(&self.root)? {
            let dir_entry = dir_entry?;
            if dir_entry.file_type()?.is_dir() && is_shard_name(&dir_entry.file_name()) {
                match fs::remove_dir_all(dir_entry.path()) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
        *index = DiskIndex::default();
        Ok(())
    }

    fn read_entry(&self, fingerprint: &str) -> Result<CacheEntry> {
        let meta = fs::read(self.meta_path(fingerprint))?;
        let metadata: ResponseMetadata = serde_json::from_slice(&meta)?;
        let body = fs::read(self.body_path(fingerprint))?;
        Ok(CacheEntry {
            metadata,
            body: Bytes::from(body),
        })
    }

    fn rebuild_index(&self) -> Result<()> {
        let mut found: Vec<(String, u64, SystemTime)> = Vec::new();

        for shard in fs::read_dir(&self.root)? {
            let shard = shard?;
            if !shard.file_type()?.is_dir() || !is_shard_name(&shard.file_name()) {
                continue;
            }

            for file in fs::read_dir(shard.path())? {
                let file = file?;
                let path = file.path();
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };

                if path.extension().is_some_and(|ext| ext == TEMP_EXT) {
                    tracing::debug!(path = %path.display(), "Removing orphaned temp file");
                    let _ = fs::remove_file(&path);
                    continue;
                }

                let Some(fingerprint) = name.strip_suffix(&format!(".{BODY_EXT}")) else {
                    continue;
                };

                let meta_path = self.meta_path(fingerprint);
                let meta_len = match fs::metadata(&meta_path) {
                    Ok(m) => m.len(),
                    Err(_) => {
                        tracing::debug!(fingerprint, "Removing body without metadata");
                        let _ = fs::remove_file(&path);
                        continue;
                    }
                };

                let body_meta = file.metadata()?;
                let modified = body_meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                found.push((fingerprint.to_string(), body_meta.len() + meta_len, modified));
            }

            // Metadata files whose body is gone
            for file in fs::read_dir(shard.path())? {
                let path = file?.path();
                if let Some(fingerprint) = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(|n| n.strip_suffix(META_SUFFIX))
                {
                    if !self.body_path(fingerprint).exists() {
                        let _ = fs::remove_file(&path);
                    }
                }
            }
        }

        found.sort_by_key(|(_, _, modified)| *modified);

        let mut index = self.index.lock();
        for (fingerprint, size, _) in found {
            index.insert(fingerprint, size);
        }

        // The directory may hold more than a smaller, newly configured capacity allows
        if index.total_bytes > self.capacity {
            for (victim, _) in index.eviction_order("") {
                if index.total_bytes <= self.capacity {
                    break;
                }
                index.remove(&victim);
                self.remove_files(&victim);
            }
        }

        tracing::debug!(
            root = %self.root.display(),
            entries = index.entries.len(),
            bytes = index.total_bytes,
            "Disk cache index rebuilt"
        );
        Ok(())
    }

    fn shard_dir(&self, fingerprint: &str) -> PathBuf {
        let shard = fingerprint.get(0..2).unwrap_or("00");
        self.root.join(shard)
    }

    fn body_path(&self, fingerprint: &str) -> PathBuf {
        self.shard_dir(fingerprint)
            .join(format!("{fingerprint}.{BODY_EXT}"))
    }

    fn meta_path(&self, fingerprint: &str) -> PathBuf {
        self.shard_dir(fingerprint)
            .join(format!("{fingerprint}{META_SUFFIX}"))
    }

    fn remove_files(&self, fingerprint: &str) {
        let _ = fs::remove_file(self.body_path(fingerprint));
        let _ = fs::remove_file(self.meta_path(fingerprint));
    }
}

/// Write `bytes` to a uniquely named temp file next to `path`, then rename it
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let suffix: u64 = rand::thread_rng().r#gen();
    let mut temp = path.as_os_str().to_owned();
    temp.push(format!(".{suffix:016x}.{TEMP_EXT}"));
    let temp = PathBuf::from(temp);

    fs::write(&temp, bytes)?;
    if let Err(e) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(e.into());
    }
    Ok(())
}

fn is_shard_name(name: &std::ffi::OsStr) -> bool {
    name.to_str()
        .is_some_and(|n| n.len() == 2 && n.bytes().all(|b| b.is_ascii_hexdigit()))
}
