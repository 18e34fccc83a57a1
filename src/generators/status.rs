// src/generators/status.rs
//! Read-only snapshot of a generator for status reports.

use std::fmt;
use std::time::Duration;

use super::clock::{SpawnClock, TimerStatus};
use super::core::{EntryFlags, LevelId, Position, SpawnCap};
use super::generator::ItemGenerator;

#[derive(Clone, Debug, PartialEq)]
pub struct EntryStatus {
    pub id: String,
    pub cooldown: Duration,
    pub max_items: SpawnCap,
    pub flags: EntryFlags,
    pub spawned: usize,
    pub position: Position,
    pub level: Option<LevelId>,
    /// Time left on the entry's timer; `None` while unbound.
    pub next_spawn: Option<Duration>,
    pub timer: Option<TimerStatus>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GeneratorStatus {
    pub id: String,
    pub bounds_min: Position,
    pub bounds_max: Position,
    pub initialized: bool,
    pub running: bool,
    pub level: Option<LevelId>,
    pub spawned: usize,
    pub entries: Vec<EntryStatus>,
}

impl GeneratorStatus {
    pub fn capture(generator: &ItemGenerator, clock: &SpawnClock) -> Self {
        let (bounds_min, bounds_max) = generator.bounds();
        let entries = generator
            .entries()
            .iter()
            .map(|e| EntryStatus {
                id: e.id().to_string(),
                cooldown: e.cooldown(),
                max_items: e.max_items(),
                flags: e.flags(),
                spawned: generator.spawned_count_for(e.id()),
                position: e.spawn_position(),
                level: e.level().cloned(),
                next_spawn: e.timer().and_then(|t| clock.remaining(t)),
                timer: e.timer().and_then(|t| clock.status(t)),
            })
            .collect();

        Self {
            id: generator.id().to_string(),
            bounds_min,
            bounds_max,
            initialized: generator.is_initialized(),
            running: generator.is_running(),
            level: generator.level().cloned(),
            spawned: generator.spawned_count(),
            entries,
        }
    }
}

/// `1h2m3s4ms`, zero components dropped; `0s` for zero.
pub fn format_duration(d: Duration) -> String {
    let total_ms = d.as_millis();
    if total_ms == 0 {
        return "0s".to_string();
    }
    let parts = [
        (total_ms / 3_600_000, "h"),
        (total_ms / 60_000 % 60, "m"),
        (total_ms / 1000 % 60, "s"),
        (total_ms % 1000, "ms"),
    ];
    parts.iter().filter(|(v, _)| *v > 0).map(|(v, unit)| format!("{v}{unit}")).collect()
}

fn level_name(level: &Option<LevelId>) -> &str {
    level.as_ref().map_or("None", LevelId::as_str)
}

impl fmt::Display for GeneratorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Information for Item Generator {}", self.id)?;
        writeln!(f, "Bounds:")?;
        writeln!(f, "  Min: {}", self.bounds_min)?;
        writeln!(f, "  Max: {}", self.bounds_max)?;
        writeln!(f, "Initialized: {}", self.initialized)?;
        writeln!(f, "Running: {}", self.running)?;
        writeln!(f, "Level: {}", level_name(&self.level))?;
        writeln!(f, "Spawned Items: {}", self.spawned)?;
        write!(f, "Entries:")?;
        for e in &self.entries {
            writeln!(f)?;
            writeln!(f, "  {}:", e.id)?;
            writeln!(f, "    Cooldown: {}", format_duration(e.cooldown))?;
            writeln!(f, "    Max items: {}", e.max_items)?;
            writeln!(f, "    Flags: {}", e.flags)?;
            writeln!(f, "    Spawned Items: {}", e.spawned)?;
            writeln!(f, "    Pos: {}", e.position)?;
            writeln!(f, "    Level: {}", level_name(&e.level))?;
            write!(f, "    Next Spawn: {}", format_duration(e.next_spawn.unwrap_or_default()))?;
        }
        Ok(())
    }
}
