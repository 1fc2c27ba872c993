pub mod combat;
pub mod config;
pub mod entities;
pub mod net;
pub mod path;
pub mod queue;
pub mod service;
pub mod sync;
pub mod telemetry;
pub mod world;

pub use net::packet::{PacketReader, PacketWriter};
pub use service::{spawn_tick_loop, ServerControl, ServerExit};
pub use world::state::World;

use std::sync::{Arc, Mutex};

pub fn run(args: &[String]) -> Result<(), String> {
    loop {
        let config = config::AppConfig::from_args(args)?;
        telemetry::logging::init(&config.root)?;
        let world_config = config::WorldConfig::load(&config.world_config)?;
        let world = World::load(&config.root, world_config)?;

        println!("tickworld: world loaded");
        println!("- root: {}", config.root.display());
        println!("- config: {}", config.world_config.display());
        println!("- tick length: {}ms", world.config.tick_length_ms);
        println!(
            "- path finding: {}",
            if world.is_multi_threaded() {
                format!("{} workers", world.config.path_workers)
            } else {
                "tick thread".to_string()
            }
        );
        println!(
            "- capacity: {} players, {} npcs",
            world.players.capacity(),
            world.npcs.capacity()
        );
        println!("- packet layouts: {}", world.layouts.len());
        println!("- cached region keys: {}", world.xteas.cached_len());
        if let Some(limit) = config.max_ticks {
            println!("- tick limit: {}", limit);
        }

        let world = Arc::new(Mutex::new(world));
        let control = Arc::new(ServerControl::new());
        let handle = spawn_tick_loop(Arc::clone(&world), Arc::clone(&control), config.max_ticks)?;
        let ticks = match handle.join() {
            Ok(Ok(ticks)) => ticks,
            Ok(Err(err)) => return Err(err),
            Err(_) => return Err("tick thread panicked".to_string()),
        };
        telemetry::logging::log_game(&format!("tick loop stopped after {} ticks", ticks));
        println!("tickworld: stopped after {} ticks", ticks);

        match control.exit_reason() {
            ServerExit::Shutdown => return Ok(()),
            ServerExit::Restart => {
                println!("tickworld: restart requested, relaunching");
            }
        }
    }
}
