// src/generators/entry.rs
//! One spawn policy inside a generator: what to drop, where, how often, how many.

use bevy::prelude::*;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::clock::{SpawnClock, TimerId, TimerOwner};
use super::core::{EntryFlag, EntryFlags, ItemStack, ItemTemplate, LevelId, Position, SpawnCap, TokenSpawner};
use super::generator::ItemGenerator;

static NEXT_ENTRY_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an entry object. Spawned items point back at
/// their entry through this, so counts survive rebinding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryHandle(u64);

impl EntryHandle {
    pub(crate) fn next() -> Self {
        Self(NEXT_ENTRY_HANDLE.fetch_add(1, Ordering::Relaxed))
    }
}

/// Called after a token spawned: (token, entry, generator).
pub type SpawnListener = Box<dyn Fn(Entity, &ItemEntry, &ItemGenerator) + Send + Sync>;
/// Called when a living entity picks a token up: (picker, token, entry, generator).
pub type PickupListener = Box<dyn Fn(Entity, Entity, &ItemEntry, &ItemGenerator) + Send + Sync>;

#[derive(Clone, Debug)]
struct Binding {
    generator: String,
    level: LevelId,
}

pub struct ItemEntry {
    /// Unique per generator, compared case-insensitively (Unicode lowercase,
    /// so `Äpfel` and `äpfel` are the same id).
    id: String,
    handle: EntryHandle,
    template: Box<dyn ItemTemplate>,
    cooldown: Duration,
    max_items: SpawnCap,
    spawn_position: Position,
    flags: EntryFlags,
    binding: Option<Binding>,
    timer: Option<TimerId>,
    spawn_listeners: Vec<SpawnListener>,
    pickup_listeners: Vec<PickupListener>,
}

impl ItemEntry {
    pub fn new(
        id: impl Into<String>,
        template: impl ItemTemplate,
        cooldown: Duration,
        max_items: SpawnCap,
        spawn_position: Position,
        flags: EntryFlags,
    ) -> Self {
        Self {
            id: id.into(),
            handle: EntryHandle::next(),
            template: Box::new(template),
            cooldown,
            max_items,
            spawn_position,
            flags,
            binding: None,
            timer: None,
            spawn_listeners: Vec::new(),
            pickup_listeners: Vec::new(),
        }
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn handle(&self) -> EntryHandle { self.handle }
    pub fn template(&self) -> &dyn ItemTemplate { self.template.as_ref() }
    pub fn create_item_stack(&self) -> ItemStack { self.template.build() }
    pub fn cooldown(&self) -> Duration { self.cooldown }
    pub fn max_items(&self) -> SpawnCap { self.max_items }
    pub fn set_max_items(&mut self, max_items: SpawnCap) { self.max_items = max_items; }
    pub fn spawn_position(&self) -> Position { self.spawn_position }
    pub fn flags(&self) -> EntryFlags { self.flags }
    pub fn has_flag(&self, flag: EntryFlag) -> bool { self.flags.contains(flag) }
    pub fn timer(&self) -> Option<TimerId> { self.timer }

    /// Level this entry spawns into; `None` while unbound.
    pub fn level(&self) -> Option<&LevelId> { self.binding.as_ref().map(|b| &b.level) }
    /// Id of the generator this entry is bound to.
    pub fn generator(&self) -> Option<&str> { self.binding.as_ref().map(|b| b.generator.as_str()) }
    pub fn is_bound(&self) -> bool { self.binding.is_some() }

    #[inline]
    pub(crate) fn matches(&self, id: &str) -> bool {
        self.id.chars().flat_map(char::to_lowercase).eq(id.chars().flat_map(char::to_lowercase))
    }

    /// Attach to a generator and level. Any previous timer is cancelled and a
    /// fresh one, `cooldown` long, starts counting right away.
    pub(crate) fn bind(&mut self, generator: &str, level: LevelId, clock: &mut SpawnClock) {
        if let Some(old) = self.timer.take() {
            clock.cancel(old);
        }
        self.binding = Some(Binding { generator: generator.to_string(), level });

        let owner = TimerOwner { generator: generator.to_string(), entry: self.handle };
        let timer = clock.create_timer(self.cooldown, owner);
        clock.start(timer);
        self.timer = Some(timer);
        debug!("entry '{}' bound to generator '{}' (timer {:?})", self.id, generator, timer);
    }

    /// Detach and cancel the timer.
    pub(crate) fn unbind(&mut self, clock: &mut SpawnClock) {
        self.binding = None;
        if let Some(timer) = self.timer.take() {
            clock.cancel(timer);
        }
    }

    /// Store a new cooldown. A live timer restarts with the new length at once.
    pub(crate) fn set_cooldown(&mut self, cooldown: Duration, clock: &mut SpawnClock) {
        self.cooldown = cooldown;
        if let Some(timer) = self.timer {
            clock.set_length_and_reset(timer, cooldown);
        }
    }

    pub(crate) fn start(&self, clock: &mut SpawnClock) {
        if let Some(timer) = self.timer { clock.start(timer); }
    }

    /// Rewind to a full cooldown and hold there.
    pub(crate) fn stop(&self, clock: &mut SpawnClock) {
        if let Some(timer) = self.timer {
            clock.set_length_and_reset(timer, self.cooldown);
            clock.pause(timer);
        }
    }

    pub(crate) fn pause(&self, clock: &mut SpawnClock) {
        if let Some(timer) = self.timer { clock.pause(timer); }
    }

    pub(crate) fn unpause(&self, clock: &mut SpawnClock) {
        if let Some(timer) = self.timer { clock.unpause(timer); }
    }

    /// Drop one token at the block-centered spawn position.
    pub(crate) fn spawn_item(&self, spawner: &mut dyn TokenSpawner, level: &LevelId) -> Entity {
        spawner.spawn_token(level, self.spawn_position.block_center(), self.create_item_stack())
    }

    pub fn add_spawn_listener(&mut self, listener: impl Fn(Entity, &ItemEntry, &ItemGenerator) + Send + Sync + 'static) {
        self.spawn_listeners.push(Box::new(listener));
    }

    pub fn add_pickup_listener(
        &mut self,
        listener: impl Fn(Entity, Entity, &ItemEntry, &ItemGenerator) + Send + Sync + 'static,
    ) {
        self.pickup_listeners.push(Box::new(listener));
    }

    /// Listeners run in registration order; a panicking listener is not caught.
    pub(crate) fn notify_spawn(&self, token: Entity, generator: &ItemGenerator) {
        for listener in &self.spawn_listeners {
            listener(token, self, generator);
        }
    }

    pub(crate) fn notify_pickup(&self, picker: Entity, token: Entity, generator: &ItemGenerator) {
        for listener in &self.pickup_listeners {
            listener(picker, token, self, generator);
        }
    }
}

impl fmt::Debug for ItemEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemEntry")
            .field("id", &self.id)
            .field("handle", &self.handle)
            .field("cooldown", &self.cooldown)
            .field("max_items", &self.max_items)
            .field("spawn_position", &self.spawn_position)
            .field("flags", &self.flags)
            .field("binding", &self.binding)
            .field("timer", &self.timer)
            .field("spawn_listeners", &self.spawn_listeners.len())
            .field("pickup_listeners", &self.pickup_listeners.len())
            .finish()
    }
}
