// src/generators/test_support.rs
//! Stand-in world for unit tests: hands out fresh entity handles and records every drop.

use bevy::prelude::*;

use super::core::{ItemStack, LevelId, TokenSpawner};

#[derive(Clone, Debug)]
pub struct SpawnRecord {
    pub token: Entity,
    pub level: LevelId,
    pub at: Vec3,
    pub stack: ItemStack,
}

#[derive(Default)]
pub struct RecordingSpawner {
    pub spawned: Vec<SpawnRecord>,
}

impl TokenSpawner for RecordingSpawner {
    fn spawn_token(&mut self, level: &LevelId, at: Vec3, stack: ItemStack) -> Entity {
        let token = Entity::from_raw(1000 + self.spawned.len() as u32);
        self.spawned.push(SpawnRecord { token, level: level.clone(), at, stack });
        token
    }
}
