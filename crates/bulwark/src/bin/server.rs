//! Headless arena server.
//!
//! Boots one instance with a handful of AI tanks and arena shapes, then
//! runs the fixed-tick loop until interrupted. With no transport wired
//! in, frames are produced and dropped; this binary exists to soak the
//! simulation and watch the log.
//!
//! ```text
//! bulwark_server [config.toml]
//! ```

use bulwark::directory::{InstanceDirectory, InstanceHandle, InstanceId};
use bulwark::{run_arena_loop, ArenaServer, ScheduledAction, ServerConfig};
use bulwark_shared::{defs, Vec2};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => match ServerConfig::from_toml(&path) {
            Ok(config) => config,
            Err(err) => {
                tracing::error!("failed to load {}: {}", path, err);
                std::process::exit(1);
            }
        },
        None => ServerConfig::default(),
    };

    tracing::info!(
        "booting arena: {} ticks/s, half extent {}, capacity {}",
        config.tick_rate,
        config.arena_half_extent,
        config.capacity
    );

    let mut server = ArenaServer::new(config);

    let directory = InstanceDirectory::new();
    directory.register(InstanceHandle {
        id: InstanceId(1),
        name: "sandbox".into(),
        commands: server.command_handle(),
    });

    // Seed the arena: a shape field now, AI tanks in staggered waves.
    for i in 0..24u32 {
        let angle = std::f32::consts::TAU * i as f32 / 24.0;
        let ring = if i % 3 == 0 { 650.0 } else { 400.0 };
        server.schedule_in(
            0,
            ScheduledAction::SpawnShape {
                position: Vec2::from_angle(angle) * ring,
                sides: 3 + i as u8 % 3,
                size: 30.0,
                health: 30.0,
            },
        );
    }
    for wave in 0..3u64 {
        server.schedule_in(
            wave * 50 + 25,
            ScheduledAction::SpawnWave {
                definition: Box::new(match wave {
                    0 => defs::standard_tank(),
                    1 => defs::scatter_gun(),
                    _ => defs::drone_carrier(),
                }),
                center: Vec2::ZERO,
                radius: 1200.0,
                count: 4,
            },
        );
    }

    run_arena_loop(&mut server, None);

    directory.unregister(InstanceId(1));
}
