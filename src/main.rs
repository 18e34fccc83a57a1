use bevy::log::LogPlugin;
use bevy::prelude::*;
use std::time::Duration;

use item_generators::generators::plugin::ItemSpawned;
use item_generators::generators::{
    EntryFlag, EntryFlags, GeneratorRegistry, ItemEntry, ItemGeneratorPlugin, ItemGeneratorSettings,
    ItemTemplateDef, LevelId, Position, RegistryError, SpawnCap,
};

const SETTINGS_PATH: &str = "assets/item_generators.ron";

fn main() {
    // Optional settings file; defaults otherwise. Reported once logging is up.
    let (settings, load_error) = ItemGeneratorSettings::load_or_default(SETTINGS_PATH);

    App::new()
        .add_plugins(MinimalPlugins)
        .add_plugins(LogPlugin::default())
        .insert_resource(settings)
        .add_plugins(ItemGeneratorPlugin)
        .add_systems(Startup, move || {
            if let Some(e) = &load_error {
                warn!("Using default generator settings ({SETTINGS_PATH}: {e})");
            }
        })
        .add_systems(Startup, setup_arena)
        .add_systems(Update, log_spawned_items)
        .run();
}

fn setup_arena(mut registry: ResMut<GeneratorRegistry>) {
    if let Err(e) = build_arena(&mut registry) {
        warn!("Demo arena generator not started: {e}");
        return;
    }
    if let Some(gen) = registry.get_mut("mid") {
        info!("{}", gen.status());
    }
}

fn build_arena(registry: &mut GeneratorRegistry) -> Result<(), RegistryError> {
    let mut gen = registry.create("mid", Position::new(-8, 60, -8), Position::new(8, 72, 8))?;
    gen.add_entry(ItemEntry::new(
        "iron",
        ItemTemplateDef::of("iron_ingot"),
        Duration::from_secs(2),
        SpawnCap::Limited(5),
        Position::new(0, 64, 0),
        EntryFlags::NONE.with(EntryFlag::Persistent),
    ))?;
    gen.add_entry(ItemEntry::new(
        "gold",
        ItemTemplateDef::of("gold_ingot"),
        Duration::from_secs(5),
        SpawnCap::Limited(2),
        Position::new(3, 64, 3),
        [EntryFlag::Persistent, EntryFlag::Invulnerable].into_iter().collect(),
    ))?;
    if let Some(entry) = gen.entry_mut("gold") {
        entry.add_spawn_listener(|token, entry, generator| {
            info!("{} dropped {} ({:?})", generator.id(), entry.id(), token);
        });
    }
    gen.init(LevelId::new("arena"))?;
    gen.start()?;
    Ok(())
}

fn log_spawned_items(mut events: EventReader<ItemSpawned>, registry: Res<GeneratorRegistry>) {
    for ev in events.read() {
        let live = registry.get(&ev.generator).map_or(0, |g| g.spawned_count());
        info!("Spawned {:?} from {}/{} ({} live)", ev.token, ev.generator, ev.entry, live);
    }
}
