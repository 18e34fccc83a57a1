// src/generators/plugin.rs
//! Item generator plugin wiring (glue).
//! - Settings + registry resources
//! - Clock driver: whole quanta of frame time -> registry ticks -> spawned tokens
//! - Host removal events -> reconciliation -> veto events

use bevy::prelude::*;
use std::time::Duration;

use super::core::{InLevel, ItemStack, LevelId, TokenSpawner};
use super::registry::GeneratorRegistry;
use super::removal::RemovalCause;
use super::settings::ItemGeneratorSettings;

// ---------- Token components ----------

/// What a spawned token carries.
#[derive(Component, Clone, Debug, PartialEq, Eq)]
pub struct DroppedItem {
    pub stack: ItemStack,
}

/// Tokens are dropped at rest.
#[derive(Component, Clone, Copy, Debug, Default, PartialEq, Deref, DerefMut)]
pub struct ItemVelocity(pub Vec3);

// ---------- Events ----------

/// Written once per token the generators materialize.
#[derive(Event, Clone, Debug, PartialEq, Eq)]
pub struct ItemSpawned {
    pub token: Entity,
    pub generator: String,
    pub entry: String,
}

/// Host: `token` is about to merge with another stack.
#[derive(Event, Clone, Copy, Debug)]
pub struct ItemMergeAttempt {
    pub token: Entity,
}

/// Host: `token` is about to leave the world for `cause`.
#[derive(Event, Clone, Copy, Debug)]
pub struct ItemRemovalAttempt {
    pub token: Entity,
    pub cause: RemovalCause,
}

/// Answer to a merge (`cause: None`) or removal attempt: cancel it.
#[derive(Event, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ItemRemovalVetoed {
    pub token: Entity,
    pub cause: Option<RemovalCause>,
}

/// Host: a living entity picked `token` up.
#[derive(Event, Clone, Copy, Debug)]
pub struct ItemPickedUp {
    pub entity: Entity,
    pub token: Entity,
    /// Stack left on the ground; not used by the generators.
    pub remaining: u32,
}

// ---------- Plugin ----------

pub struct ItemGeneratorPlugin;

impl Plugin for ItemGeneratorPlugin {
    fn build(&self, app: &mut App) {
        // Settings first: the registry reads its quantum from them.
        app.init_resource::<ItemGeneratorSettings>()
            .init_resource::<GeneratorRegistry>()
            .add_event::<ItemSpawned>()
            .add_event::<ItemMergeAttempt>()
            .add_event::<ItemRemovalAttempt>()
            .add_event::<ItemRemovalVetoed>()
            .add_event::<ItemPickedUp>()
            .add_systems(
                Update,
                (
                    reconcile_merge_attempts,
                    reconcile_removal_attempts,
                    reconcile_pickups,
                    drive_spawn_clock,
                )
                    .chain(),
            );
    }
}

// ---------- Spawning through Commands ----------

/// `TokenSpawner` that drops tokens as ECS entities.
pub struct CommandsSpawner<'a, 'w, 's> {
    commands: &'a mut Commands<'w, 's>,
}

impl<'a, 'w, 's> CommandsSpawner<'a, 'w, 's> {
    pub fn new(commands: &'a mut Commands<'w, 's>) -> Self { Self { commands } }
}

impl TokenSpawner for CommandsSpawner<'_, '_, '_> {
    fn spawn_token(&mut self, level: &LevelId, at: Vec3, stack: ItemStack) -> Entity {
        let name = Name::new(format!("Dropped {} x{}", stack.material, stack.amount));
        self.commands
            .spawn((
                DroppedItem { stack },
                Transform::from_translation(at),
                ItemVelocity(Vec3::ZERO),
                InLevel(level.clone()),
                name,
            ))
            .id()
    }
}

// ---------- Systems ----------

/// Update: feed whole quanta of frame time into the shared clock.
pub fn drive_spawn_clock(
    time: Res<Time>,
    settings: Res<ItemGeneratorSettings>,
    mut registry: ResMut<GeneratorRegistry>,
    mut commands: Commands,
    mut spawned: EventWriter<ItemSpawned>,
    mut backlog: Local<Duration>,
) {
    let quantum = registry.clock().quantum();
    if quantum.is_zero() { return; }

    *backlog += time.delta();
    let mut ticks = 0u32;
    while *backlog >= quantum {
        if ticks >= settings.max_ticks_per_frame {
            warn!("Generators: dropping {:?} of clock backlog after {} ticks", *backlog, ticks);
            *backlog = Duration::ZERO;
            break;
        }
        *backlog -= quantum;
        ticks += 1;

        let reports = registry.tick(&mut CommandsSpawner::new(&mut commands));
        for r in reports {
            if settings.log_spawns {
                info!("Generators: '{}' / '{}' spawned {:?}", r.generator, r.entry, r.token);
            }
            spawned.write(ItemSpawned { token: r.token, generator: r.generator, entry: r.entry });
        }
    }
}

/// Update: tracked tokens never merge.
pub fn reconcile_merge_attempts(
    mut attempts: EventReader<ItemMergeAttempt>,
    registry: Res<GeneratorRegistry>,
    mut vetoes: EventWriter<ItemRemovalVetoed>,
) {
    for ev in attempts.read() {
        if registry.on_merge_attempt(ev.token).is_veto() {
            vetoes.write(ItemRemovalVetoed { token: ev.token, cause: None });
        }
    }
}

/// Update: flag-guarded removals are vetoed, the rest are forgotten.
pub fn reconcile_removal_attempts(
    mut attempts: EventReader<ItemRemovalAttempt>,
    mut registry: ResMut<GeneratorRegistry>,
    mut vetoes: EventWriter<ItemRemovalVetoed>,
) {
    for ev in attempts.read() {
        if registry.on_removal_attempt(ev.token, ev.cause).is_veto() {
            vetoes.write(ItemRemovalVetoed { token: ev.token, cause: Some(ev.cause) });
        }
    }
}

/// Update: living-entity pickups run pickup listeners and release the token.
pub fn reconcile_pickups(mut pickups: EventReader<ItemPickedUp>, mut registry: ResMut<GeneratorRegistry>) {
    for ev in pickups.read() {
        registry.on_living_pickup(ev.entity, ev.token, ev.remaining);
    }
}
