// src/generators/core.rs
//! Value types shared by entries, generators and the registry.
//! Nothing here touches the ECS world; spawning goes through `TokenSpawner`.

use bevy::prelude::*; // Vec3, Entity, Component
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------- Positions, levels, regions ----------

/// Integer block position. Level-agnostic; pair with a `LevelId` to place it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32, z: i32) -> Self { Self { x, y, z } }

    /// Block containing a world-space point.
    pub fn from_world(p: Vec3) -> Self {
        Self::new(p.x.floor() as i32, p.y.floor() as i32, p.z.floor() as i32)
    }

    /// Center of the block's floor: +0.5 on X and Z, Y untouched.
    pub fn block_center(self) -> Vec3 {
        Vec3::new(self.x as f32 + 0.5, self.y as f32, self.z as f32 + 0.5)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Name of the level (world, dimension, arena) a generator is bound to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LevelId(pub String);

impl LevelId {
    pub fn new(name: impl Into<String>) -> Self { Self(name.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for LevelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// A world-space point inside a level.
#[derive(Clone, Debug, PartialEq)]
pub struct Location {
    pub level: LevelId,
    pub translation: Vec3,
}

impl Location {
    pub fn new(level: LevelId, translation: Vec3) -> Self { Self { level, translation } }

    #[inline]
    pub fn block(&self) -> Position { Position::from_world(self.translation) }
}

/// Level tag carried by spawned tokens (and anything else tested against a region).
#[derive(Component, Clone, Debug, PartialEq, Eq)]
pub struct InLevel(pub LevelId);

/// Axis-aligned block box inside one level. Both corners are inclusive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cuboid {
    level: LevelId,
    min: Position,
    max: Position,
}

impl Cuboid {
    /// Corners may be given in any order.
    pub fn new(level: LevelId, a: Position, b: Position) -> Self {
        let min = Position::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z));
        let max = Position::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z));
        Self { level, min, max }
    }

    pub fn level(&self) -> &LevelId { &self.level }
    pub fn min(&self) -> Position { self.min }
    pub fn max(&self) -> Position { self.max }

    pub fn contains_position(&self, p: Position) -> bool {
        p.x >= self.min.x && p.x <= self.max.x &&
        p.y >= self.min.y && p.y <= self.max.y &&
        p.z >= self.min.z && p.z <= self.max.z
    }

    /// Block-granular test; a point in another level is never contained.
    pub fn contains(&self, location: &Location) -> bool {
        location.level == self.level && self.contains_position(location.block())
    }
}

// ---------- Entry flags & caps ----------

/// Per-entry behavior toggles consulted when the host tries to remove a token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryFlag {
    /// Token never despawns from age.
    Persistent,
    /// Token cannot be damaged or destroyed.
    Invulnerable,
    /// Token cannot be sucked up by containers (hoppers and the like).
    InventoryPickup,
}

impl EntryFlag {
    pub const ALL: [EntryFlag; 3] = [EntryFlag::Persistent, EntryFlag::Invulnerable, EntryFlag::InventoryPickup];

    #[inline]
    const fn bit(self) -> u8 {
        match self {
            EntryFlag::Persistent => 1,
            EntryFlag::Invulnerable => 1 << 1,
            EntryFlag::InventoryPickup => 1 << 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EntryFlag::Persistent => "persistent",
            EntryFlag::Invulnerable => "invulnerable",
            EntryFlag::InventoryPickup => "inventory_pickup",
        }
    }
}

/// Bitmask of `EntryFlag`s.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryFlags(pub u8);

impl EntryFlags {
    pub const NONE: Self = Self(0);

    pub fn with(self, flag: EntryFlag) -> Self { Self(self.0 | flag.bit()) }
    pub fn contains(self, flag: EntryFlag) -> bool { (self.0 & flag.bit()) != 0 }
    pub fn is_empty(self) -> bool { self.0 == 0 }

    pub fn iter(self) -> impl Iterator<Item = EntryFlag> {
        EntryFlag::ALL.into_iter().filter(move |f| self.contains(*f))
    }
}

impl FromIterator<EntryFlag> for EntryFlags {
    fn from_iter<I: IntoIterator<Item = EntryFlag>>(iter: I) -> Self {
        iter.into_iter().fold(Self::NONE, EntryFlags::with)
    }
}

impl fmt::Display for EntryFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("None");
        }
        let names: Vec<&str> = self.iter().map(EntryFlag::name).collect();
        f.write_str(&names.join(", "))
    }
}

/// Maximum number of live tokens one entry may have at a time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpawnCap {
    Limited(u32),
    #[default]
    Unlimited,
}

impl SpawnCap {
    /// True when another token may spawn while `live` are tracked.
    #[inline]
    pub fn admits(self, live: usize) -> bool {
        match self {
            SpawnCap::Limited(n) => live < n as usize,
            SpawnCap::Unlimited => true,
        }
    }
}

impl fmt::Display for SpawnCap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnCap::Limited(n) => write!(f, "{n}"),
            SpawnCap::Unlimited => f.write_str("Infinite"),
        }
    }
}

// ---------- Item templates ----------

/// Concrete description of what a token carries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub material: String,
    pub amount: u32,
    pub display_name: Option<String>,
}

/// Builder consulted once per spawn.
pub trait ItemTemplate: Send + Sync + 'static {
    fn build(&self) -> ItemStack;
}

/// Data form of a template, e.g. straight out of a `.ron` file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTemplateDef {
    pub material: String,
    #[serde(default = "default_amount")]
    pub amount: u32,
    #[serde(default)]
    pub display_name: Option<String>,
}

fn default_amount() -> u32 {
    1
}

impl ItemTemplateDef {
    pub fn of(material: impl Into<String>) -> Self {
        Self { material: material.into(), amount: default_amount(), display_name: None }
    }
}

impl ItemTemplate for ItemTemplateDef {
    fn build(&self) -> ItemStack {
        ItemStack {
            material: self.material.clone(),
            amount: self.amount,
            display_name: self.display_name.clone(),
        }
    }
}

// ---------- World collaborator ----------

/// Materializes tokens in the host world.
pub trait TokenSpawner {
    /// Drop `stack` at `at` in `level` with zero velocity; return the live handle.
    fn spawn_token(&mut self, level: &LevelId, at: Vec3, stack: ItemStack) -> Entity;
}
