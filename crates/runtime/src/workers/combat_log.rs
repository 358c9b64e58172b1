//! Append-only combat log.
//!
//! Every published event is written as one JSON object per line, in publish
//! order, so a fight can be replayed or diffed after the fact.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::api::{Result, RuntimeError};
use crate::events::Event;

pub struct CombatLog {
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl CombatLog {
    /// Opens `path` for appending, creating parent directories as needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(RuntimeError::CombatLog)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(RuntimeError::CombatLog)?;
        tracing::info!(path = %path.display(), "combat log opened");

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    /// Buffers one event line.
    pub fn append(&mut self, event: &Event) -> Result<()> {
        serde_json::to_writer(&mut self.writer, event)
            .map_err(|e| RuntimeError::CombatLog(e.into()))?;
        self.writer.write_all(b"\n").map_err(RuntimeError::CombatLog)?;
        self.written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(RuntimeError::CombatLog)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines written since the log was opened.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Reads back a log written by [`CombatLog`].
    pub fn read_all(path: &Path) -> Result<Vec<Event>> {
        let content = std::fs::read_to_string(path).map_err(RuntimeError::CombatLog)?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(|e| RuntimeError::CombatLog(e.into())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use combat_core::{GameTime, UnitId};

    use super::*;
    use crate::events::WorldEvent;

    #[test]
    fn writes_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("combat.jsonl");

        let mut log = CombatLog::open(&path).unwrap();
        log.append(&Event::World(WorldEvent::UnitSpawned {
            clock: GameTime::ZERO,
            unit: UnitId(1),
        }))
        .unwrap();
        log.append(&Event::World(WorldEvent::Tick {
            clock: GameTime(100),
            diff_ms: 100,
        }))
        .unwrap();
        log.flush().unwrap();

        assert_eq!(log.written(), 2);
        let events = CombatLog::read_all(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], Event::World(WorldEvent::Tick { diff_ms: 100, .. })));
    }
}
