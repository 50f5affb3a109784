//! Whole-pipeline behavior through the scheduler: deterministic fire
//! cadence, drone caps, AI engagements, and combat outcomes.

use bulwark::ai::{Controller, TargetState};
use bulwark::game_loop::{ArenaServer, ClientCommand};
use bulwark::ServerConfig;
use bulwark_core::EntityId;
use bulwark_shared::defs::{self, SpawnPoint};
use bulwark_shared::{ClientId, InputState, Vec2};

fn server() -> ArenaServer {
    ArenaServer::new(ServerConfig::default())
}

/// Oversized arena so projectiles never park on a wall inside the
/// observation window of the cadence tests.
fn open_range_server() -> ArenaServer {
    ArenaServer::new(ServerConfig {
        arena_half_extent: 20_000.0,
        cell_shift: 10,
        ..ServerConfig::default()
    })
}

#[test]
fn sustained_fire_cadence_is_deterministic() {
    let mut server = open_range_server();
    let client = ClientId(1);
    let handle = server.command_handle();
    handle
        .send(ClientCommand::Connect {
            client,
            name: "gunner".to_owned(),
            definition: Box::new(defs::standard_tank()),
        })
        .unwrap();

    // Base reload 15 ticks, definition multiplier 1.0, delay 0.2: the
    // cycle crosses the fire threshold at position 18.
    let mut spawn_ticks = Vec::new();
    let mut last_count = 0;
    for tick in 1..=60u64 {
        handle
            .send(ClientCommand::Input {
                client,
                input: InputState {
                    movement: Vec2::ZERO,
                    aim: Vec2::new(900.0, 0.0),
                    flags: InputState::FLAG_FIRE,
                },
            })
            .unwrap();
        server.tick();

        let count = server.world().registry.alive_count();
        if count > last_count.max(2) {
            spawn_ticks.push(tick);
        }
        last_count = count.max(2);
    }

    assert_eq!(spawn_ticks.first(), Some(&18), "first shot at tick 18");
    // Steady 15-tick cadence afterwards (bullet lifetime is longer than
    // the observation window, so counts only ever grow).
    for pair in spawn_ticks.windows(2) {
        assert_eq!(pair[1] - pair[0], 15, "cadence drifted: {spawn_ticks:?}");
    }
}

#[test]
fn reload_stat_change_rescales_live_cycles() {
    let mut server = open_range_server();
    let client = ClientId(1);
    let handle = server.command_handle();
    handle
        .send(ClientCommand::Connect {
            client,
            name: "gunner".to_owned(),
            definition: Box::new(defs::standard_tank()),
        })
        .unwrap();
    server.tick();
    let tank = server.client_entity(client).unwrap();

    let mut fired_counts = Vec::new();
    let mut last_count = 2;
    for tick in 2..=120u64 {
        handle
            .send(ClientCommand::Input {
                client,
                input: InputState {
                    movement: Vec2::ZERO,
                    aim: Vec2::new(900.0, 0.0),
                    flags: InputState::FLAG_FIRE,
                },
            })
            .unwrap();

        // Halve the reload stat mid-flight; the cycle must rescale, not
        // double-fire or stall.
        if tick == 25 {
            server.world_mut().stats_mut(tank).unwrap().reload_ticks = 7.5;
        }

        server.tick();
        let count = server.world().registry.alive_count();
        let fired = count.saturating_sub(last_count);
        assert!(fired <= 1, "no tick may yield two fire events");
        fired_counts.push(fired);
        last_count = count.max(last_count);
    }

    let total: usize = fired_counts.iter().sum();
    assert!(total >= 8, "the faster cycle must keep firing, got {total}");
}

#[test]
fn drone_cap_limits_live_projectiles() {
    let mut server = server();
    let world = server.world_mut();
    let carrier = world
        .spawn_tank(
            &defs::drone_carrier(),
            SpawnPoint {
                position: Vec2::ZERO,
                angle: 0.0,
            },
            EntityId::NULL,
            None,
        )
        .unwrap();
    // Team the carrier with itself so its drones share a team and leave
    // each other alone.
    world
        .registry
        .get_mut(carrier)
        .unwrap()
        .groups
        .relations
        .set_team(carrier);

    for _ in 0..200 {
        server.tick();
    }

    // Carrier + 2 barrels, plus 2 barrels x 4 drones at the cap.
    let drones = server.world().registry.alive_count() - 3;
    assert_eq!(drones, 8, "live count capped at max_count per barrel");

    // The cap holds over time.
    for _ in 0..50 {
        server.tick();
    }
    assert_eq!(server.world().registry.alive_count() - 3, 8);
}

#[test]
fn ai_tank_hunts_and_kills_a_shape() {
    let mut server = server();
    let world = server.world_mut();

    let hunter = world
        .spawn_tank(
            &defs::standard_tank(),
            SpawnPoint {
                position: Vec2::new(-300.0, 0.0),
                angle: 0.0,
            },
            EntityId::NULL,
            Some(Controller::Ai(TargetState::new(900.0))),
        )
        .unwrap();
    let prey = world.spawn_shape(Vec2::new(300.0, 0.0), 4, 35.0, 20.0, 0.0).unwrap();

    let mut killed_at = None;
    for tick in 1..=400u64 {
        server.tick();
        if !server.world().registry.is_alive(prey) {
            killed_at = Some(tick);
            break;
        }
    }

    assert!(killed_at.is_some(), "AI must close in and destroy the shape");
    assert!(server.world().registry.is_alive(hunter));
}

#[test]
fn dying_tank_cascades_its_barrels() {
    let mut server = server();
    let world = server.world_mut();
    let tank = world
        .spawn_tank(
            &defs::standard_tank(),
            SpawnPoint {
                position: Vec2::ZERO,
                angle: 0.0,
            },
            EntityId::NULL,
            None,
        )
        .unwrap();
    let barrel = world.registry.get(tank).unwrap().children[0];

    // Lethal contact: a heavy rammer on top of it.
    let rammer = world.spawn_shape(Vec2::new(20.0, 0.0), 4, 40.0, 1_000.0, 100.0).unwrap();
    let _ = rammer;

    let mut gone_at = None;
    for tick in 1..=40u64 {
        server.tick();
        if !server.world().registry.is_alive(tank) {
            gone_at = Some(tick);
            break;
        }
    }

    assert!(gone_at.is_some(), "lethal contact must destroy the tank");
    for _ in 0..10 {
        server.tick();
    }
    assert!(
        !server.world().registry.is_alive(barrel),
        "barrels die with their tank"
    );
}

#[test]
fn freed_id_not_reused_within_the_tick() {
    let mut server = server();
    let victim = server
        .world_mut()
        .spawn_shape(Vec2::new(500.0, 500.0), 4, 30.0, 5.0, 0.0)
        .unwrap();
    server.world_mut().destroy(victim, false).unwrap();

    // Scheduled for this tick's hook phase, which runs before the purge.
    server.schedule_in(
        1,
        bulwark::ScheduledAction::SpawnShape {
            position: Vec2::new(-500.0, -500.0),
            sides: 4,
            size: 30.0,
            health: 5.0,
        },
    );
    server.tick();

    let survivor = server
        .world()
        .registry
        .alive_ids()
        .pop()
        .expect("the scheduled spawn landed");
    assert_ne!(
        survivor.index, victim.index,
        "hook-phase spawns run before the purge frees the slot"
    );

    // Next tick the slot is genuinely free again.
    let reused = server
        .world_mut()
        .spawn_shape(Vec2::ZERO, 4, 30.0, 5.0, 0.0)
        .unwrap();
    assert_eq!(reused.index, victim.index);
    assert_ne!(reused.generation, victim.generation);
}
