//! World state and its JSON snapshot.
//!
//! The world is shared with signal handlers (a hangup saves it), so its state
//! lives in atomics and every method takes `&self`.

use crate::error::HostError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Persisted form of the world.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Ticks simulated since the world was created.
    pub tick: u64,
    /// Wall-clock time of the save, milliseconds since the Unix epoch.
    pub saved_at_ms: u64,
}

/// Live world state.
#[derive(Debug)]
pub struct World {
    path: PathBuf,
    tick: AtomicU64,
    dirty: AtomicBool,
    saves: AtomicU64,
    staged: AtomicU64,
}

impl World {
    /// Resume from `path` if a snapshot exists, else start a new world.
    pub fn load_or_new(path: &Path) -> Result<Self, HostError> {
        let tick = match fs::read_to_string(path) {
            Ok(content) => {
                let snapshot: WorldSnapshot = serde_json::from_str(&content)?;
                info!("Resuming world from {:?} at tick {}", path, snapshot.tick);
                snapshot.tick
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No world snapshot at {:?}, starting a new world", path);
                0
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: path.to_path_buf(),
            tick: AtomicU64::new(tick),
            dirty: AtomicBool::new(false),
            saves: AtomicU64::new(0),
            staged: AtomicU64::new(0),
        })
    }

    /// Advance one tick. Returns the new tick number.
    pub fn advance(&self) -> u64 {
        self.dirty.store(true, Ordering::Release);
        self.tick.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Current tick.
    pub fn tick(&self) -> u64 {
        self.tick.load(Ordering::Acquire)
    }

    /// Number of snapshots written by this process.
    pub fn saves(&self) -> u64 {
        self.saves.load(Ordering::Acquire)
    }

    /// Snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current state as a snapshot.
    pub fn snapshot(&self) -> WorldSnapshot {
        let saved_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        WorldSnapshot {
            tick: self.tick(),
            saved_at_ms,
        }
    }

    /// Write the snapshot. Unforced saves are skipped when nothing changed.
    ///
    /// Returns true if a snapshot was written.
    pub fn save(&self, forced: bool) -> Result<bool, HostError> {
        let dirty = self.dirty.swap(false, Ordering::AcqRel);
        if !dirty && !forced {
            return Ok(false);
        }

        let snapshot = self.snapshot();
        let encoded = serde_json::to_vec_pretty(&snapshot)?;
        let staging = self.staging_path();
        let written = fs::write(&staging, encoded).and_then(|()| fs::rename(&staging, &self.path));
        if let Err(e) = written {
            self.dirty.store(true, Ordering::Release);
            return Err(e.into());
        }

        self.saves.fetch_add(1, Ordering::AcqRel);
        debug!(tick = snapshot.tick, forced, "World saved to {:?}", self.path);
        Ok(true)
    }

    /// Fresh staging file next to the snapshot. A save interrupted by a
    /// handler-driven save never shares its staging file.
    fn staging_path(&self) -> PathBuf {
        let seq = self.staged.fetch_add(1, Ordering::AcqRel);
        self.path
            .with_extension(format!("json.{}-{seq}.tmp", std::process::id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn new_world_starts_at_zero() {
        let dir = TempDir::new().unwrap();
        let world = World::load_or_new(&dir.path().join("world.json")).unwrap();
        assert_eq!(world.tick(), 0);
        assert_eq!(world.advance(), 1);
        assert_eq!(world.advance(), 2);
    }

    #[test]
    fn staging_files_are_unique_and_cleaned_up() {
        let dir = TempDir::new().unwrap();
        let world = World::load_or_new(&dir.path().join("world.json")).unwrap();

        let first = world.staging_path();
        let second = world.staging_path();
        assert_ne!(first, second);
        assert_eq!(first.parent(), Some(dir.path()));

        world.save(true).unwrap();
        world.save(true).unwrap();
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .filter(|name| name != "world.json")
            .collect();
        assert!(leftovers.is_empty(), "staging files left: {leftovers:?}");
    }

    #[test]
    fn unforced_save_skips_clean_world() {
        let dir = TempDir::new().unwrap();
        let world = World::load_or_new(&dir.path().join("world.json")).unwrap();

        assert!(!world.save(false).unwrap());
        world.advance();
        assert!(world.save(false).unwrap());
        assert!(!world.save(false).unwrap());
        assert!(world.save(true).unwrap());
        assert_eq!(world.saves(), 2);
    }

    #[test]
    fn saved_world_resumes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("world.json");
        let world = World::load_or_new(&path).unwrap();
        for _ in 0..5 {
            world.advance();
        }
        world.save(true).unwrap();

        let resumed = World::load_or_new(&path).unwrap();
        assert_eq!(resumed.tick(), 5);
        assert!(!dir.path().join("world.json.tmp").exists());
    }

    #[test]
    fn corrupt_snapshot_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("world.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(World::load_or_new(&path), Err(HostError::Snapshot(_))));
    }

    #[test]
    fn failed_save_keeps_world_dirty() {
        let dir = TempDir::new().unwrap();
        let world = World::load_or_new(&dir.path().join("missing/world.json")).unwrap();
        world.advance();
        assert!(matches!(world.save(false), Err(HostError::Io(_))));
        assert!(matches!(world.save(false), Err(HostError::Io(_))));
    }
}
