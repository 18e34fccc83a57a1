//! Item generators: timed, capped spawners of item tokens inside a level region.
//!
//! The registry owns every generator and the shared spawn clock; the plugin
//! drives the clock from frame time and feeds host removal events back in.

pub mod core;
pub mod clock;
pub mod entry;
pub mod generator;
pub mod registry;
pub mod removal;
pub mod status;
pub mod settings;
pub mod plugin;

#[cfg(test)]
pub(crate) mod test_support;

pub use self::core::{EntryFlag, EntryFlags, ItemStack, ItemTemplate, ItemTemplateDef, LevelId, Position, SpawnCap, TokenSpawner};
pub use entry::ItemEntry;
pub use generator::{GeneratorError, ItemGenerator, SpawnedItem};
pub use plugin::ItemGeneratorPlugin;
pub use registry::{GeneratorRegistry, RegistryError};
pub use removal::{RemovalCause, RemovalVerdict};
pub use settings::ItemGeneratorSettings;
pub use status::GeneratorStatus;
