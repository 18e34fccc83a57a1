// src/generators/registry.rs
//! Keyed collection of generators plus the clock they all share.
//! The registry is the only place a clock is handed to generators: every
//! mutating call goes through a `GeneratorHandle` that pairs the two.

use bevy::prelude::*;
use std::collections::HashMap;
use std::ops::Deref;
use std::time::Duration;

use super::clock::SpawnClock;
use super::core::{LevelId, Position, SpawnCap, TokenSpawner};
use super::entry::ItemEntry;
use super::generator::{GeneratorError, ItemGenerator};
use super::removal::{RemovalCause, RemovalVerdict};
use super::settings::ItemGeneratorSettings;
use super::status::GeneratorStatus;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("a generator with id '{0}' already exists")]
    DuplicateGenerator(String),
    #[error("no generator with id '{0}'")]
    UnknownGenerator(String),
    #[error(transparent)]
    Generator(#[from] GeneratorError),
}

/// One token materialized during `GeneratorRegistry::tick`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpawnReport {
    pub token: Entity,
    pub generator: String,
    pub entry: String,
}

#[derive(Resource)]
pub struct GeneratorRegistry {
    clock: SpawnClock,
    /// Registration order; iteration follows it.
    generators: Vec<ItemGenerator>,
    /// Id -> index into `generators`.
    index: HashMap<String, usize>,
}

impl FromWorld for GeneratorRegistry {
    fn from_world(world: &mut World) -> Self {
        let quantum = world
            .get_resource::<ItemGeneratorSettings>()
            .map(ItemGeneratorSettings::tick_quantum)
            .unwrap_or(super::clock::DEFAULT_TICK_QUANTUM);
        Self::new(SpawnClock::new(quantum))
    }
}

impl GeneratorRegistry {
    pub fn new(clock: SpawnClock) -> Self {
        Self { clock, generators: Vec::new(), index: HashMap::new() }
    }

    pub fn clock(&self) -> &SpawnClock { &self.clock }
    pub fn len(&self) -> usize { self.generators.len() }
    pub fn is_empty(&self) -> bool { self.generators.is_empty() }
    pub fn contains_key(&self, id: &str) -> bool { self.index.contains_key(id) }

    pub fn get(&self, id: &str) -> Option<&ItemGenerator> {
        self.index.get(id).map(|&i| &self.generators[i])
    }

    /// Mutable access, paired with the shared clock.
    pub fn get_mut(&mut self, id: &str) -> Option<GeneratorHandle<'_>> {
        let i = *self.index.get(id)?;
        Some(GeneratorHandle { generator: &mut self.generators[i], clock: &mut self.clock })
    }

    /// Registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ItemGenerator> { self.generators.iter() }

    pub fn ids(&self) -> impl Iterator<Item = &str> { self.generators.iter().map(ItemGenerator::id) }

    /// Add a fresh generator. Fails, leaving everything untouched, if the id is
    /// taken or the generator was initialized against some other clock.
    pub fn register(&mut self, generator: ItemGenerator) -> Result<GeneratorHandle<'_>, RegistryError> {
        if self.index.contains_key(generator.id()) {
            return Err(RegistryError::DuplicateGenerator(generator.id().to_string()));
        }
        if generator.is_initialized() {
            return Err(GeneratorError::AlreadyInitialized(generator.id().to_string()).into());
        }

        let i = self.generators.len();
        info!("registered item generator '{}' ({} entries)", generator.id(), generator.entries().len());
        self.index.insert(generator.id().to_string(), i);
        self.generators.push(generator);
        Ok(GeneratorHandle { generator: &mut self.generators[i], clock: &mut self.clock })
    }

    /// Build and register an empty generator from two corners given in any order.
    pub fn create(&mut self, id: impl Into<String>, corner_a: Position, corner_b: Position) -> Result<GeneratorHandle<'_>, RegistryError> {
        let min = Position::new(corner_a.x.min(corner_b.x), corner_a.y.min(corner_b.y), corner_a.z.min(corner_b.z));
        let max = Position::new(corner_a.x.max(corner_b.x), corner_a.y.max(corner_b.y), corner_a.z.max(corner_b.z));
        self.register(ItemGenerator::new(id, min, max))
    }

    /// Remove a generator, cancelling every timer it owns.
    pub fn unregister(&mut self, id: &str) -> Result<ItemGenerator, RegistryError> {
        let i = self.index.remove(id).ok_or_else(|| RegistryError::UnknownGenerator(id.to_string()))?;
        let mut generator = self.generators.remove(i);
        generator.shutdown(&mut self.clock);
        for slot in self.index.values_mut() {
            if *slot > i { *slot -= 1; }
        }
        info!("unregistered item generator '{}'", id);
        Ok(generator)
    }

    /// Advance the shared clock one quantum and run the spawn gate of every
    /// entry whose timer ran out.
    pub fn tick(&mut self, spawner: &mut dyn TokenSpawner) -> Vec<SpawnReport> {
        let mut reports = Vec::new();
        for expired in self.clock.advance() {
            // Cancelled by an earlier expiry in this same tick.
            if !self.clock.contains(expired.timer) { continue; }
            let Some(&i) = self.index.get(&expired.owner.generator) else { continue };

            let generator = &mut self.generators[i];
            if let Some((token, entry)) = generator.on_timer_expired(expired.owner.entry, expired.timer, &mut self.clock, spawner) {
                reports.push(SpawnReport { token, generator: generator.id().to_string(), entry });
            }
        }
        reports
    }

    // ---------- Removal reconciliation ----------

    fn owner_of(&self, token: Entity) -> Option<usize> {
        self.generators.iter().position(|g| g.spawned_item(token).is_some())
    }

    /// Merging would break token identity: always vetoed for tracked tokens.
    pub fn on_merge_attempt(&self, token: Entity) -> RemovalVerdict {
        match self.owner_of(token) {
            Some(_) => RemovalVerdict::Veto,
            None => RemovalVerdict::Allow,
        }
    }

    /// Vetoed when the owning entry carries the guarding flag; otherwise the
    /// token is forgotten and the host may proceed.
    pub fn on_removal_attempt(&mut self, token: Entity, cause: RemovalCause) -> RemovalVerdict {
        let Some(i) = self.owner_of(token) else { return RemovalVerdict::Allow };
        let generator = &mut self.generators[i];

        let guarded = generator
            .spawned_item(token)
            .and_then(|s| generator.entry_by_handle(s.entry()))
            .is_some_and(|e| e.has_flag(cause.guarded_by()));
        if guarded {
            debug!("vetoed {:?} of {:?} (generator '{}')", cause, token, generator.id());
            return RemovalVerdict::Veto;
        }

        generator.remove_spawned_item(token);
        debug!("released {:?} after {:?} (generator '{}')", token, cause, generator.id());
        RemovalVerdict::Allow
    }

    /// A living entity consumed `token`. Pickup listeners of the owning entry
    /// run, then every generator drops the token.
    pub fn on_living_pickup(&mut self, picker: Entity, token: Entity, _remaining: u32) -> bool {
        let mut tracked = false;
        for generator in &mut self.generators {
            if generator.spawned_item(token).is_some() {
                generator.notify_pickup(picker, token);
            }
            tracked |= generator.remove_spawned_item(token);
        }
        tracked
    }
}

/// A registered generator together with the shared clock.
pub struct GeneratorHandle<'a> {
    generator: &'a mut ItemGenerator,
    clock: &'a mut SpawnClock,
}

impl<'a> GeneratorHandle<'a> {
    pub fn init(&mut self, level: LevelId) -> Result<(), GeneratorError> {
        self.generator.init(level, self.clock)
    }

    pub fn reconfigure(&mut self, level: LevelId) -> Result<(), GeneratorError> {
        self.generator.reconfigure(level, self.clock)
    }

    pub fn start(&mut self) -> Result<(), GeneratorError> {
        self.generator.start(self.clock)
    }

    pub fn stop(&mut self) -> Result<(), GeneratorError> {
        self.generator.stop(self.clock)
    }

    pub fn add_entry(&mut self, entry: ItemEntry) -> Result<(), GeneratorError> {
        self.generator.add_entry(entry, self.clock)
    }

    pub fn remove_entry(&mut self, id: &str) -> Result<ItemEntry, GeneratorError> {
        self.generator.remove_entry(id, self.clock)
    }

    pub fn set_cooldown(&mut self, entry_id: &str, cooldown: Duration) -> Result<(), GeneratorError> {
        self.generator.set_cooldown(entry_id, cooldown, self.clock)
    }

    pub fn set_max_items(&mut self, entry_id: &str, max_items: SpawnCap) -> Result<(), GeneratorError> {
        self.generator.set_max_items(entry_id, max_items)
    }

    pub fn start_entry(&mut self, entry_id: &str) -> Result<(), GeneratorError> {
        self.generator.start_entry(entry_id, self.clock)
    }

    pub fn stop_entry(&mut self, entry_id: &str) -> Result<(), GeneratorError> {
        self.generator.stop_entry(entry_id, self.clock)
    }

    pub fn pause_entry(&mut self, entry_id: &str) -> Result<(), GeneratorError> {
        self.generator.pause_entry(entry_id, self.clock)
    }

    pub fn unpause_entry(&mut self, entry_id: &str) -> Result<(), GeneratorError> {
        self.generator.unpause_entry(entry_id, self.clock)
    }

    /// Listener registration and cap changes; timer control goes through the handle.
    pub fn entry_mut(&mut self, entry_id: &str) -> Option<&mut ItemEntry> {
        self.generator.entry_mut(entry_id)
    }

    pub fn add_spawned_item(&mut self, entry_id: &str, token: Entity) -> bool {
        self.generator.add_spawned_item(entry_id, token)
    }

    pub fn remove_spawned_item(&mut self, token: Entity) -> bool {
        self.generator.remove_spawned_item(token)
    }

    pub fn status(&self) -> GeneratorStatus {
        GeneratorStatus::capture(&*self.generator, &*self.clock)
    }
}

impl Deref for GeneratorHandle<'_> {
    type Target = ItemGenerator;
    fn deref(&self) -> &ItemGenerator { &*self.generator }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::clock::TimerStatus;
    use crate::generators::core::{EntryFlag, EntryFlags, ItemTemplateDef};
    use crate::generators::test_support::RecordingSpawner;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn entry(id: &str, cooldown_ms: u64, cap: SpawnCap, flags: EntryFlags) -> ItemEntry {
        ItemEntry::new(id, ItemTemplateDef::of(id), Duration::from_millis(cooldown_ms), cap, Position::new(0, 64, 0), flags)
    }

    fn registry() -> GeneratorRegistry {
        GeneratorRegistry::new(SpawnClock::new(Duration::from_millis(50)))
    }

    fn running_generator(reg: &mut GeneratorRegistry, id: &str, entry: ItemEntry) {
        let mut gen = reg.create(id, Position::new(10, 70, 10), Position::new(-10, 60, -10)).unwrap();
        gen.add_entry(entry).unwrap();
        gen.init(LevelId::new("arena")).unwrap();
        gen.start().unwrap();
    }

    fn tick_n(reg: &mut GeneratorRegistry, spawner: &mut RecordingSpawner, n: usize) -> Vec<SpawnReport> {
        (0..n).flat_map(|_| reg.tick(&mut *spawner)).collect()
    }

    #[test]
    fn duplicate_registration_fails_and_keeps_original() {
        let mut reg = registry();
        running_generator(&mut reg, "gold", entry("gold_ingot", 1000, SpawnCap::Unlimited, EntryFlags::NONE));

        let dup = ItemGenerator::new("gold", Position::new(0, 0, 0), Position::new(1, 1, 1));
        assert_eq!(reg.register(dup).err(), Some(RegistryError::DuplicateGenerator("gold".into())));

        let original = reg.get("gold").unwrap();
        assert_eq!(reg.len(), 1);
        assert!(original.is_initialized() && original.is_running());
        assert!(original.has_entry("gold_ingot"));
        assert_eq!(original.bounds(), (Position::new(-10, 60, -10), Position::new(10, 70, 10)));
    }

    #[test]
    fn registering_an_initialized_generator_is_refused() {
        let mut reg = registry();
        let mut foreign = SpawnClock::default();
        let mut gen = ItemGenerator::new("iron", Position::new(0, 0, 0), Position::new(1, 1, 1));
        gen.init(LevelId::new("arena"), &mut foreign).unwrap();

        assert!(matches!(reg.register(gen), Err(RegistryError::Generator(GeneratorError::AlreadyInitialized(_)))));
        assert!(reg.is_empty());
    }

    #[test]
    fn iteration_follows_registration_order_across_unregister() {
        let mut reg = registry();
        for id in ["c", "a", "b"] {
            reg.create(id, Position::new(0, 0, 0), Position::new(1, 1, 1)).unwrap();
        }
        assert_eq!(reg.ids().collect::<Vec<_>>(), vec!["c", "a", "b"]);

        reg.unregister("a").unwrap();
        assert_eq!(reg.ids().collect::<Vec<_>>(), vec!["c", "b"]);
        assert!(reg.get("b").is_some());
        assert!(reg.get_mut("b").is_some());
        assert_eq!(reg.unregister("a").err(), Some(RegistryError::UnknownGenerator("a".into())));
    }

    #[test]
    fn unregister_cancels_timers() {
        let mut reg = registry();
        running_generator(&mut reg, "gold", entry("gold_ingot", 100, SpawnCap::Unlimited, EntryFlags::NONE));
        assert_eq!(reg.clock().len(), 1);

        let gen = reg.unregister("gold").unwrap();
        assert!(!gen.is_initialized());
        assert!(reg.clock().is_empty());
    }

    #[test]
    fn tick_spawns_on_cooldown_and_reports() {
        let mut reg = registry();
        running_generator(&mut reg, "gold", entry("gold_ingot", 1000, SpawnCap::Limited(1), EntryFlags::NONE));
        let mut spawner = RecordingSpawner::default();

        assert!(tick_n(&mut reg, &mut spawner, 19).is_empty());
        let reports = reg.tick(&mut spawner);
        assert_eq!(reports, vec![SpawnReport { token: spawner.spawned[0].token, generator: "gold".into(), entry: "gold_ingot".into() }]);
        assert_eq!(reg.get("gold").unwrap().spawned_count(), 1);
    }

    #[test]
    fn capacity_holds_across_cycles() {
        let mut reg = registry();
        running_generator(&mut reg, "gold", entry("gold_ingot", 100, SpawnCap::Limited(2), EntryFlags::NONE));
        let mut spawner = RecordingSpawner::default();

        tick_n(&mut reg, &mut spawner, 10);
        assert_eq!(reg.get("gold").unwrap().spawned_count_for("gold_ingot"), 2);
    }

    #[test]
    fn persistent_token_survives_age_despawn() {
        let mut reg = registry();
        running_generator(&mut reg, "gold", entry("gold_ingot", 1000, SpawnCap::Limited(1), EntryFlags::NONE.with(EntryFlag::Persistent)));
        let mut spawner = RecordingSpawner::default();
        tick_n(&mut reg, &mut spawner, 20);
        let token = spawner.spawned[0].token;

        assert_eq!(reg.on_removal_attempt(token, RemovalCause::AgeDespawn), RemovalVerdict::Veto);
        assert_eq!(reg.get("gold").unwrap().spawned_count(), 1);

        // Not guarded against damage.
        assert_eq!(reg.on_removal_attempt(token, RemovalCause::Damage), RemovalVerdict::Allow);
        assert_eq!(reg.get("gold").unwrap().spawned_count(), 0);
    }

    #[test]
    fn each_cause_is_guarded_by_its_flag() {
        for cause in [RemovalCause::ContainerPickup, RemovalCause::Damage, RemovalCause::AgeDespawn] {
            let mut reg = registry();
            running_generator(&mut reg, "gold", entry("guarded", 50, SpawnCap::Limited(1), EntryFlags::NONE.with(cause.guarded_by())));
            reg.get_mut("gold").unwrap().add_entry(entry("bare", 50, SpawnCap::Limited(1), EntryFlags::NONE)).unwrap();
            let mut spawner = RecordingSpawner::default();
            let reports = tick_n(&mut reg, &mut spawner, 1);
            let token_of = |id: &str| reports.iter().find(|r| r.entry == id).unwrap().token;

            assert!(reg.on_removal_attempt(token_of("guarded"), cause).is_veto(), "{cause:?}");
            assert!(!reg.on_removal_attempt(token_of("bare"), cause).is_veto(), "{cause:?}");
            assert_eq!(reg.get("gold").unwrap().spawned_count(), 1);
        }
    }

    #[test]
    fn merge_is_vetoed_only_for_tracked_tokens() {
        let mut reg = registry();
        running_generator(&mut reg, "gold", entry("gold_ingot", 50, SpawnCap::Limited(1), EntryFlags::NONE));
        let mut spawner = RecordingSpawner::default();
        tick_n(&mut reg, &mut spawner, 1);

        assert_eq!(reg.on_merge_attempt(spawner.spawned[0].token), RemovalVerdict::Veto);
        assert_eq!(reg.on_merge_attempt(Entity::from_raw(1)), RemovalVerdict::Allow);
        assert_eq!(reg.on_removal_attempt(Entity::from_raw(1), RemovalCause::Damage), RemovalVerdict::Allow);
        assert_eq!(reg.get("gold").unwrap().spawned_count(), 1);
    }

    #[test]
    fn living_pickup_notifies_owner_and_sweeps_every_generator() {
        let mut reg = registry();
        let hits = Arc::new(AtomicUsize::new(0));

        let mut gold = entry("gold_ingot", 50, SpawnCap::Limited(1), EntryFlags::NONE);
        let counter = hits.clone();
        gold.add_pickup_listener(move |picker, _, entry, gen| {
            assert_eq!(picker, Entity::from_raw(1));
            assert_eq!((entry.id(), gen.id()), ("gold_ingot", "gold"));
            counter.fetch_add(1, Ordering::SeqCst);
        });
        running_generator(&mut reg, "gold", gold);
        running_generator(&mut reg, "iron", entry("iron_ingot", 1000, SpawnCap::Unlimited, EntryFlags::NONE));

        let mut spawner = RecordingSpawner::default();
        tick_n(&mut reg, &mut spawner, 1);
        let token = spawner.spawned[0].token;
        // Same handle tracked by a second generator by hand.
        reg.get_mut("iron").unwrap().add_spawned_item("iron_ingot", token);

        assert!(reg.on_living_pickup(Entity::from_raw(1), token, 0));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(reg.get("gold").unwrap().spawned_count(), 0);
        assert_eq!(reg.get("iron").unwrap().spawned_count(), 0);

        assert!(!reg.on_living_pickup(Entity::from_raw(1), token, 0));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cooldown_change_through_handle_rearms_live_timer() {
        let mut reg = registry();
        running_generator(&mut reg, "gold", entry("gold_ingot", 1000, SpawnCap::Unlimited, EntryFlags::NONE));
        let mut spawner = RecordingSpawner::default();
        tick_n(&mut reg, &mut spawner, 5);

        reg.get_mut("gold").unwrap().set_cooldown("gold_ingot", Duration::from_millis(100)).unwrap();
        let gen = reg.get("gold").unwrap();
        let timer = gen.entry("gold_ingot").unwrap().timer().unwrap();
        assert_eq!(gen.entry("gold_ingot").unwrap().cooldown(), Duration::from_millis(100));
        assert_eq!(reg.clock().length(timer), Some(Duration::from_millis(100)));
        assert_eq!(reg.clock().remaining(timer), Some(Duration::from_millis(100)));

        assert!(reg.tick(&mut spawner).is_empty());
        assert_eq!(reg.tick(&mut spawner).len(), 1);
    }

    #[test]
    fn entry_timer_control_through_handle() {
        let mut reg = registry();
        running_generator(&mut reg, "gold", entry("gold_ingot", 200, SpawnCap::Unlimited, EntryFlags::NONE));
        let mut spawner = RecordingSpawner::default();
        tick_n(&mut reg, &mut spawner, 2);

        reg.get_mut("gold").unwrap().stop_entry("GOLD_INGOT").unwrap();
        let timer = reg.get("gold").unwrap().entries()[0].timer().unwrap();
        assert_eq!(reg.clock().remaining(timer), Some(Duration::from_millis(200)));
        assert_eq!(reg.clock().status(timer), Some(TimerStatus::Paused));
        assert!(tick_n(&mut reg, &mut spawner, 10).is_empty());

        reg.get_mut("gold").unwrap().start_entry("gold_ingot").unwrap();
        assert_eq!(tick_n(&mut reg, &mut spawner, 4).len(), 1);

        reg.get_mut("gold").unwrap().pause_entry("gold_ingot").unwrap();
        tick_n(&mut reg, &mut spawner, 2);
        reg.get_mut("gold").unwrap().unpause_entry("gold_ingot").unwrap();
        assert_eq!(tick_n(&mut reg, &mut spawner, 4).len(), 1);

        let mut gen = reg.get_mut("gold").unwrap();
        assert!(matches!(gen.stop_entry("iron_ingot"), Err(GeneratorError::UnknownEntry { .. })));
    }

    #[test]
    fn removed_tokens_free_capacity() {
        let mut reg = registry();
        running_generator(&mut reg, "gold", entry("gold_ingot", 50, SpawnCap::Limited(1), EntryFlags::NONE));
        let mut spawner = RecordingSpawner::default();
        tick_n(&mut reg, &mut spawner, 3);
        assert_eq!(spawner.spawned.len(), 1);

        assert!(reg.on_living_pickup(Entity::from_raw(1), spawner.spawned[0].token, 0));
        tick_n(&mut reg, &mut spawner, 1);
        assert_eq!(spawner.spawned.len(), 2);
    }
}
