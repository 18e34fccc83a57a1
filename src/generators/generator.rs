// src/generators/generator.rs
//! A bounded region holding item entries, the init/running state machine, and
//! the set of tokens its entries have spawned that are still alive.

use bevy::prelude::*;
use std::collections::HashMap;
use std::time::Duration;

use super::clock::{SpawnClock, TimerId};
use super::core::{Cuboid, InLevel, LevelId, Location, Position, SpawnCap, TokenSpawner};
use super::entry::{EntryHandle, ItemEntry};

/// A live token and the generator/entry that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpawnedItem {
    token: Entity,
    generator: String,
    entry: EntryHandle,
}

impl SpawnedItem {
    pub fn token(&self) -> Entity { self.token }
    pub fn generator(&self) -> &str { &self.generator }
    pub fn entry(&self) -> EntryHandle { self.entry }
}

/// Rejected state-machine or configuration requests. Nothing is mutated on error.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("generator '{0}' is already initialized")]
    AlreadyInitialized(String),
    #[error("generator '{0}' is not initialized")]
    NotInitialized(String),
    #[error("generator '{0}' is already running")]
    AlreadyRunning(String),
    #[error("generator '{0}' is not running")]
    NotRunning(String),
    #[error("generator '{generator}' already has an entry named '{entry}'")]
    DuplicateEntry { generator: String, entry: String },
    #[error("generator '{generator}' has no entry named '{entry}'")]
    UnknownEntry { generator: String, entry: String },
}

#[derive(Debug)]
pub struct ItemGenerator {
    id: String,
    /// Insertion order is kept and observable.
    entries: Vec<ItemEntry>,
    bounds_min: Position,
    bounds_max: Position,
    level: Option<LevelId>,
    /// Only materialized once a level is known.
    region: Option<Cuboid>,
    initialized: bool,
    running: bool,
    spawned: HashMap<Entity, SpawnedItem>,
}

impl ItemGenerator {
    pub fn new(id: impl Into<String>, bounds_min: Position, bounds_max: Position) -> Self {
        Self {
            id: id.into(),
            entries: Vec::new(),
            bounds_min,
            bounds_max,
            level: None,
            region: None,
            initialized: false,
            running: false,
            spawned: HashMap::new(),
        }
    }

    /// Builder form for an uninitialized generator.
    pub fn with_entry(mut self, entry: ItemEntry) -> Result<Self, GeneratorError> {
        self.check_unique(entry.id())?;
        self.entries.push(entry);
        Ok(self)
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn bounds(&self) -> (Position, Position) { (self.bounds_min, self.bounds_max) }
    pub fn level(&self) -> Option<&LevelId> { self.level.as_ref() }
    pub fn region(&self) -> Option<&Cuboid> { self.region.as_ref() }
    pub fn is_initialized(&self) -> bool { self.initialized }
    pub fn is_running(&self) -> bool { self.running }
    pub fn entries(&self) -> &[ItemEntry] { &self.entries }

    pub fn entry(&self, id: &str) -> Option<&ItemEntry> {
        self.entries.iter().find(|e| e.matches(id))
    }

    /// Mutable access for listener registration and cap changes. Binding and
    /// cooldown changes go through the generator so the clock stays in sync.
    pub fn entry_mut(&mut self, id: &str) -> Option<&mut ItemEntry> {
        self.entries.iter_mut().find(|e| e.matches(id))
    }

    pub fn has_entry(&self, id: &str) -> bool { self.entry(id).is_some() }

    fn check_unique(&self, id: &str) -> Result<(), GeneratorError> {
        if self.has_entry(id) {
            return Err(GeneratorError::DuplicateEntry { generator: self.id.clone(), entry: id.to_string() });
        }
        Ok(())
    }

    fn unknown_entry(&self, id: &str) -> GeneratorError {
        GeneratorError::UnknownEntry { generator: self.id.clone(), entry: id.to_string() }
    }

    // ---------- State machine ----------

    /// Uninitialized -> Initialized-Stopped: bind to `level`, build the region,
    /// bind every entry.
    pub fn init(&mut self, level: LevelId, clock: &mut SpawnClock) -> Result<(), GeneratorError> {
        if self.initialized {
            return Err(GeneratorError::AlreadyInitialized(self.id.clone()));
        }
        self.bind_all(level, clock);
        info!("generator '{}': initialized in level '{}'", self.id, self.level_name());
        Ok(())
    }

    /// Explicit re-init: rebind every entry (fresh timers) and replace the region.
    /// Running state and tracked tokens are kept.
    pub fn reconfigure(&mut self, level: LevelId, clock: &mut SpawnClock) -> Result<(), GeneratorError> {
        if !self.initialized {
            return Err(GeneratorError::NotInitialized(self.id.clone()));
        }
        self.bind_all(level, clock);
        info!("generator '{}': reconfigured for level '{}'", self.id, self.level_name());
        Ok(())
    }

    fn bind_all(&mut self, level: LevelId, clock: &mut SpawnClock) {
        self.region = Some(Cuboid::new(level.clone(), self.bounds_min, self.bounds_max));
        self.level = Some(level.clone());
        self.initialized = true;
        for entry in &mut self.entries {
            entry.bind(&self.id, level.clone(), clock);
        }
    }

    fn level_name(&self) -> &str {
        self.level.as_ref().map_or("", LevelId::as_str)
    }

    /// Initialized-Stopped -> Initialized-Running. Timers resume where they paused.
    pub fn start(&mut self, clock: &mut SpawnClock) -> Result<(), GeneratorError> {
        if !self.initialized {
            return Err(GeneratorError::NotInitialized(self.id.clone()));
        }
        if self.running {
            return Err(GeneratorError::AlreadyRunning(self.id.clone()));
        }
        self.running = true;
        for entry in &self.entries {
            entry.unpause(clock);
        }
        info!("generator '{}': started", self.id);
        Ok(())
    }

    /// Initialized-Running -> Initialized-Stopped. Timers freeze, lengths untouched.
    pub fn stop(&mut self, clock: &mut SpawnClock) -> Result<(), GeneratorError> {
        if !self.running {
            return Err(GeneratorError::NotRunning(self.id.clone()));
        }
        self.running = false;
        for entry in &self.entries {
            entry.pause(clock);
        }
        info!("generator '{}': stopped", self.id);
        Ok(())
    }

    /// Tear down: unbind every entry and forget tracked tokens.
    pub(crate) fn shutdown(&mut self, clock: &mut SpawnClock) {
        for entry in &mut self.entries {
            entry.unbind(clock);
        }
        self.spawned.clear();
        self.running = false;
        self.initialized = false;
    }

    // ---------- Entries ----------

    /// Append an entry; on an initialized generator it is bound immediately.
    pub fn add_entry(&mut self, mut entry: ItemEntry, clock: &mut SpawnClock) -> Result<(), GeneratorError> {
        self.check_unique(entry.id())?;
        if let (true, Some(level)) = (self.initialized, self.level.clone()) {
            entry.bind(&self.id, level, clock);
        }
        debug!("generator '{}': added entry '{}'", self.id, entry.id());
        self.entries.push(entry);
        Ok(())
    }

    /// Remove an entry, unbinding it and dropping the tokens it is tracked for.
    pub fn remove_entry(&mut self, id: &str, clock: &mut SpawnClock) -> Result<ItemEntry, GeneratorError> {
        let idx = self.entry_index(id)?;
        let mut entry = self.entries.remove(idx);
        entry.unbind(clock);
        let handle = entry.handle();
        self.spawned.retain(|_, s| s.entry != handle);
        debug!("generator '{}': removed entry '{}'", self.id, entry.id());
        Ok(entry)
    }

    fn entry_index(&self, id: &str) -> Result<usize, GeneratorError> {
        self.entries.iter().position(|e| e.matches(id)).ok_or_else(|| self.unknown_entry(id))
    }

    /// New cooldown for one entry; its live timer restarts with that length at once.
    pub fn set_cooldown(&mut self, id: &str, cooldown: Duration, clock: &mut SpawnClock) -> Result<(), GeneratorError> {
        let idx = self.entry_index(id)?;
        self.entries[idx].set_cooldown(cooldown, clock);
        Ok(())
    }

    // Per-entry timer control. Unbound entries have no timer and are left alone.

    pub fn start_entry(&self, id: &str, clock: &mut SpawnClock) -> Result<(), GeneratorError> {
        self.entries[self.entry_index(id)?].start(clock);
        Ok(())
    }

    /// Rewind the entry to a full cooldown and hold it there.
    pub fn stop_entry(&self, id: &str, clock: &mut SpawnClock) -> Result<(), GeneratorError> {
        self.entries[self.entry_index(id)?].stop(clock);
        Ok(())
    }

    pub fn pause_entry(&self, id: &str, clock: &mut SpawnClock) -> Result<(), GeneratorError> {
        self.entries[self.entry_index(id)?].pause(clock);
        Ok(())
    }

    pub fn unpause_entry(&self, id: &str, clock: &mut SpawnClock) -> Result<(), GeneratorError> {
        self.entries[self.entry_index(id)?].unpause(clock);
        Ok(())
    }

    pub fn set_max_items(&mut self, id: &str, max_items: SpawnCap) -> Result<(), GeneratorError> {
        match self.entry_mut(id) {
            Some(entry) => {
                entry.set_max_items(max_items);
                Ok(())
            }
            None => Err(self.unknown_entry(id)),
        }
    }

    // ---------- Region ----------

    /// False until initialized.
    pub fn contains(&self, location: &Location) -> bool {
        self.region.as_ref().is_some_and(|r| r.contains(location))
    }

    /// Entity form of `contains`. An entity without a `Transform` or an
    /// `InLevel` has no location and is never inside.
    pub fn contains_entity(&self, entity: Entity, placed: &Query<(&Transform, &InLevel)>) -> bool {
        placed
            .get(entity)
            .is_ok_and(|(transform, level)| self.contains(&Location::new(level.0.clone(), transform.translation)))
    }

    // ---------- Spawned tokens ----------

    /// Track `token` under the entry named `entry_id`. Unknown entries are ignored.
    pub fn add_spawned_item(&mut self, entry_id: &str, token: Entity) -> bool {
        let Some(handle) = self.entry(entry_id).map(ItemEntry::handle) else { return false };
        self.track(handle, token);
        true
    }

    fn track(&mut self, entry: EntryHandle, token: Entity) {
        self.spawned.insert(token, SpawnedItem { token, generator: self.id.clone(), entry });
    }

    /// Forget `token`. Untracked tokens are ignored.
    pub fn remove_spawned_item(&mut self, token: Entity) -> bool {
        self.spawned.remove(&token).is_some()
    }

    pub fn spawned_item(&self, token: Entity) -> Option<&SpawnedItem> { self.spawned.get(&token) }

    /// Snapshot; order is unspecified.
    pub fn spawned_items(&self) -> Vec<SpawnedItem> { self.spawned.values().cloned().collect() }

    pub fn spawned_count(&self) -> usize { self.spawned.len() }

    /// Live tokens of the entry currently named `entry_id`.
    pub fn spawned_count_for(&self, entry_id: &str) -> usize {
        self.entry(entry_id).map_or(0, |e| self.count_for(e.handle()))
    }

    fn count_for(&self, entry: EntryHandle) -> usize {
        self.spawned.values().filter(|s| s.entry == entry).count()
    }

    pub(crate) fn entry_by_handle(&self, handle: EntryHandle) -> Option<&ItemEntry> {
        self.entries.iter().find(|e| e.handle() == handle)
    }

    /// Run pickup listeners of the entry that owns `token`, if any.
    pub(crate) fn notify_pickup(&self, picker: Entity, token: Entity) {
        if let Some(entry) = self.spawned.get(&token).and_then(|s| self.entry_by_handle(s.entry)) {
            entry.notify_pickup(picker, token, self);
        }
    }

    // ---------- Spawn gate ----------

    /// Timer expiry for one entry: maybe spawn, then re-arm regardless.
    pub(crate) fn on_timer_expired(
        &mut self,
        entry: EntryHandle,
        timer: TimerId,
        clock: &mut SpawnClock,
        spawner: &mut dyn TokenSpawner,
    ) -> Option<(Entity, String)> {
        let idx = self.entries.iter().position(|e| e.handle() == entry)?;
        // Stale expiry from a timer that has since been replaced.
        if self.entries[idx].timer() != Some(timer) {
            return None;
        }

        let spawned = self.try_spawn(idx, spawner);
        clock.set_length_and_reset(timer, self.entries[idx].cooldown());
        spawned
    }

    fn try_spawn(&mut self, idx: usize, spawner: &mut dyn TokenSpawner) -> Option<(Entity, String)> {
        if !self.running {
            return None;
        }
        let entry = &self.entries[idx];
        let level = entry.level()?.clone();
        let handle = entry.handle();
        if !entry.max_items().admits(self.count_for(handle)) {
            return None;
        }

        let token = entry.spawn_item(spawner, &level);
        self.track(handle, token);

        let entry = &self.entries[idx];
        debug!("generator '{}': entry '{}' spawned {:?}", self.id, entry.id(), token);
        entry.notify_spawn(token, self);
        Some((token, entry.id().to_string()))
    }
}
