//! # Tick Scheduler
//!
//! The fixed-interval loop that owns the world. Per tick, strict order:
//!
//! ```text
//! 1. drain buffered client commands
//! 2. AI / target selection
//! 3. movement integration
//! 4. broad-phase rebuild
//! 5. narrow-phase collision + damage (ascending ID order)
//! 6. per-entity hooks: weapons, behaviors, scheduled actions, lifecycle
//! 7. purge destroyed entities
//! 8. per-client delta encode + flush
//! 9. clear dirty bits
//! ```
//!
//! No step may be reordered or skipped: damage determinism hangs on 4-5,
//! network correctness on 8-9.
//!
//! Anything deferred - staggered spawn waves, timed despawns - is a
//! tick-counted scheduled action consumed at step 6, never a wall-clock
//! timer. Firing in-simulation effects from outside the tick would
//! corrupt ID allocation order and the spatial index.

use crate::ai::Controller;
use crate::behavior::run_entity_behaviors;
use crate::config::ServerConfig;
use crate::physics::resolve_collisions;
use crate::world::World;
use bulwark_core::EntityId;
use bulwark_net::{ClientView, UpdateFrame, WireEncoder};
use bulwark_shared::defs::{SpawnPoint, TankDefinition};
use bulwark_shared::{ClientId, InputState, Vec2};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Inbound message from the connection layer. Queued by the transport
/// thread, drained only at tick start.
pub enum ClientCommand {
    /// A client joined; spawn its tank from the given definition.
    Connect {
        /// The joining client.
        client: ClientId,
        /// Display name for the tank.
        name: String,
        /// Tank template to spawn.
        definition: Box<TankDefinition>,
    },
    /// Fresh input for the client's entity.
    Input {
        /// The sending client.
        client: ClientId,
        /// One tick of intent.
        input: InputState,
    },
    /// The client left; its entities go away at the tick boundary.
    Disconnect {
        /// The leaving client.
        client: ClientId,
    },
}

/// A deferred in-simulation effect, due at a tick.
pub enum ScheduledAction {
    /// Spawn a neutral arena shape.
    SpawnShape {
        /// Where.
        position: Vec2,
        /// Polygon sides.
        sides: u8,
        /// Body radius.
        size: f32,
        /// Hit points.
        health: f32,
    },
    /// Spawn one wave of AI tanks around a center point. Stagger a
    /// multi-wave event by scheduling one action per wave.
    SpawnWave {
        /// Tank template for every member of the wave.
        definition: Box<TankDefinition>,
        /// Wave center.
        center: Vec2,
        /// Spawn ring radius.
        radius: f32,
        /// Members in this wave.
        count: u32,
    },
    /// Destroy an entity if it is still alive.
    Despawn {
        /// The target.
        id: EntityId,
        /// Route through the deletion animation.
        animate: bool,
    },
}

struct ClientSlot {
    view: ClientView,
    entity: EntityId,
    input: InputState,
}

/// Aggregate tick statistics, for the server log line.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerStats {
    /// Ticks processed.
    pub ticks: u64,
    /// Commands drained over the lifetime of the server.
    pub commands: u64,
    /// Peak tick duration.
    pub max_tick_us: u64,
    /// Rolling average tick duration.
    pub avg_tick_us: u64,
}

/// One arena instance: the world plus its scheduler state.
pub struct ArenaServer {
    world: World,
    encoder: WireEncoder,
    clients: HashMap<ClientId, ClientSlot>,
    command_tx: Sender<ClientCommand>,
    command_rx: Receiver<ClientCommand>,
    scheduled: Vec<(u64, ScheduledAction)>,
    pending_disconnects: Vec<ClientId>,
    tick: u64,
    stats: ServerStats,
}

impl ArenaServer {
    /// Creates a server with an empty world.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        let (command_tx, command_rx) = unbounded();
        Self {
            world: World::new(config),
            encoder: WireEncoder::new(),
            clients: HashMap::new(),
            command_tx,
            command_rx,
            scheduled: Vec::new(),
            pending_disconnects: Vec::new(),
            tick: 0,
            stats: ServerStats::default(),
        }
    }

    /// A handle the connection layer uses to queue commands. Cloneable,
    /// thread-safe; the queue is drained at tick start.
    #[must_use]
    pub fn command_handle(&self) -> Sender<ClientCommand> {
        self.command_tx.clone()
    }

    /// The world, for setup and tests.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable world access, for setup and tests.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Completed tick count.
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Aggregate statistics.
    #[must_use]
    pub const fn stats(&self) -> &ServerStats {
        &self.stats
    }

    /// The entity a client currently controls, if any.
    #[must_use]
    pub fn client_entity(&self, client: ClientId) -> Option<EntityId> {
        self.clients.get(&client).map(|slot| slot.entity)
    }

    /// Schedules an action `delay` ticks from now (0 = this tick's hook
    /// phase if scheduling from outside the tick, next tick's otherwise).
    pub fn schedule_in(&mut self, delay: u64, action: ScheduledAction) {
        self.scheduled.push((self.tick + delay, action));
    }

    /// Runs one full simulation tick and returns the per-client frames
    /// to flush. The transport may send them asynchronously; the next
    /// tick does not wait.
    pub fn tick(&mut self) -> Vec<(ClientId, UpdateFrame)> {
        let started = Instant::now();
        self.tick += 1;

        // --- 1. drain buffered client input ----------------------------
        self.drain_commands();
        self.apply_disconnects();
        for slot in self.clients.values() {
            if self.world.registry.is_alive(slot.entity) {
                self.world.set_input(slot.entity, slot.input);
            }
        }

        // --- 2. AI / target selection ----------------------------------
        self.world.resolve_controllers();

        // --- 3. movement integration -----------------------------------
        self.world.integrate_movement();

        // --- 4. broad-phase rebuild ------------------------------------
        self.world.rebuild_spatial();

        // --- 5. narrow phase + damage, ascending ID order --------------
        resolve_collisions(&mut self.world);

        // --- 6. remaining per-entity hooks -----------------------------
        self.tick_weapons();
        self.tick_behaviors();
        self.run_due_actions();
        self.world.tick_lifecycle();

        // --- 7. purge ---------------------------------------------------
        let purged = self.world.purge_destroyed();
        if !purged.is_empty() {
            tracing::debug!("tick {}: purged {} entities", self.tick, purged.len());
        }

        // --- 8. per-client delta encode --------------------------------
        let frames = self.encode_frames();

        // --- 9. clear dirty bits ---------------------------------------
        self.world.clear_dirty();

        let elapsed = started.elapsed().as_micros() as u64;
        self.stats.ticks += 1;
        self.stats.max_tick_us = self.stats.max_tick_us.max(elapsed);
        self.stats.avg_tick_us = (self.stats.avg_tick_us * 15 + elapsed) / 16;

        frames
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.command_rx.try_recv() {
            self.stats.commands += 1;
            match command {
                ClientCommand::Connect {
                    client,
                    name,
                    definition,
                } => self.connect_client(client, &name, &definition),
                ClientCommand::Input { client, input } => {
                    if let Some(slot) = self.clients.get_mut(&client) {
                        slot.input = input;
                    } else {
                        tracing::debug!("input from unknown {}", client);
                    }
                }
                ClientCommand::Disconnect { client } => {
                    // Entity teardown happens at the tick boundary, which
                    // is exactly where we are.
                    self.pending_disconnects.push(client);
                }
            }
        }
    }

    fn connect_client(&mut self, client: ClientId, name: &str, definition: &TankDefinition) {
        if self.clients.contains_key(&client) {
            tracing::warn!("{} connected twice, ignoring", client);
            return;
        }

        let mut def = definition.clone();
        def.name = name.to_owned();
        let spawn = self.pick_spawn_point();
        match self
            .world
            .spawn_tank(&def, spawn, EntityId::NULL, Some(Controller::Client(client)))
        {
            Ok(entity) => {
                let view_half = self.world.config.view_half_extent;
                let mut view = ClientView::new(client, view_half);
                view.set_center(spawn.position);
                self.clients.insert(
                    client,
                    ClientSlot {
                        view,
                        entity,
                        input: InputState::idle(),
                    },
                );
                tracing::info!("{} connected as {}", client, entity);
            }
            Err(err) => {
                tracing::warn!("spawn for {} failed: {}", client, err);
            }
        }
    }

    fn apply_disconnects(&mut self) {
        let leaving = std::mem::take(&mut self.pending_disconnects);
        for client in leaving {
            let Some(slot) = self.clients.remove(&client) else {
                continue;
            };
            if self.world.registry.is_alive(slot.entity) {
                if let Err(err) = self.world.destroy_subtree(slot.entity, true) {
                    tracing::warn!("teardown for {} failed: {}", client, err);
                }
            }
            tracing::info!("{} disconnected", client);
        }
    }

    fn pick_spawn_point(&mut self) -> SpawnPoint {
        let half = self.world.config.arena_half_extent * 0.8;
        let x = (self.world.roll() - 0.5) * 2.0 * half;
        let y = (self.world.roll() - 0.5) * 2.0 * half;
        SpawnPoint {
            position: Vec2::new(x, y),
            angle: 0.0,
        }
    }

    fn tick_weapons(&mut self) {
        for id in self.world.registry.alive_ids() {
            let Some(mut armament) = self.world.take_armament(id.index) else {
                continue;
            };
            armament.tick(&mut self.world, id, self.tick);
            if self.world.registry.is_alive(id) {
                self.world.put_armament(id.index, armament);
            }
        }
    }

    fn tick_behaviors(&mut self) {
        for id in self.world.registry.alive_ids() {
            run_entity_behaviors(&mut self.world, id, self.tick);
        }
    }

    fn run_due_actions(&mut self) {
        let tick = self.tick;
        let mut due = Vec::new();
        self.scheduled.retain_mut(|(when, action)| {
            if *when <= tick {
                due.push(std::mem::replace(
                    action,
                    ScheduledAction::Despawn {
                        id: EntityId::NULL,
                        animate: false,
                    },
                ));
                false
            } else {
                true
            }
        });

        for action in due {
            self.run_action(action);
        }
    }

    fn run_action(&mut self, action: ScheduledAction) {
        match action {
            ScheduledAction::SpawnShape {
                position,
                sides,
                size,
                health,
            } => {
                if let Err(err) = self.world.spawn_shape(position, sides, size, health, 1.0) {
                    tracing::warn!("scheduled shape spawn failed: {}", err);
                }
            }
            ScheduledAction::SpawnWave {
                definition,
                center,
                radius,
                count,
            } => {
                for i in 0..count {
                    let angle = std::f32::consts::TAU * i as f32 / count.max(1) as f32;
                    let spawn = SpawnPoint {
                        position: center + Vec2::from_angle(angle) * radius,
                        angle,
                    };
                    let view_range = self.world.config.view_half_extent;
                    let controller = Controller::Ai(crate::ai::TargetState::new(view_range));
                    if let Err(err) =
                        self.world
                            .spawn_tank(&definition, spawn, EntityId::NULL, Some(controller))
                    {
                        tracing::warn!("wave spawn failed: {}", err);
                        break;
                    }
                }
            }
            ScheduledAction::Despawn { id, animate } => {
                if id.is_null() || !self.world.registry.is_alive(id) {
                    return;
                }
                if let Err(err) = self.world.destroy_subtree(id, animate) {
                    tracing::debug!("scheduled despawn of {} skipped: {}", id, err);
                }
            }
        }
    }

    fn encode_frames(&mut self) -> Vec<(ClientId, UpdateFrame)> {
        let mut frames = Vec::with_capacity(self.clients.len());
        for (&client, slot) in &mut self.clients {
            // Camera follows the client's tank while it lives.
            if let Some(entity) = self.world.registry.get(slot.entity) {
                let values = entity.groups.position.values();
                slot.view.set_center(Vec2::new(values.x, values.y));
            }

            let visible = self.world.query_ids(slot.view.view);
            let frame = self
                .encoder
                .encode(&mut slot.view, &self.world.registry, &visible, self.tick);
            if !frame.is_empty() {
                frames.push((client, frame));
            }
        }
        frames
    }
}

// =============================================================================
// Pacing
// =============================================================================

/// Fixed-timestep pacing for the blocking server loop.
pub struct TickLoop {
    tick_duration: Duration,
    next_tick: Instant,
}

impl TickLoop {
    /// Creates a pacer for the given rate.
    #[must_use]
    pub fn new(tick_rate: u32) -> Self {
        Self {
            tick_duration: Duration::from_micros(1_000_000 / u64::from(tick_rate.max(1))),
            next_tick: Instant::now(),
        }
    }

    /// Sleeps until the next tick is due. Overruns are absorbed by
    /// shortening the following sleep rather than bursting extra ticks.
    pub fn wait(&mut self) {
        let now = Instant::now();
        if now < self.next_tick {
            std::thread::sleep(self.next_tick - now);
        } else if now.duration_since(self.next_tick) > self.tick_duration {
            // More than a full tick behind: drop the debt instead of
            // bursting catch-up ticks.
            self.next_tick = now;
        }
        self.next_tick += self.tick_duration;
    }
}

/// Runs the blocking server loop for `duration` (forever if `None`).
pub fn run_arena_loop(server: &mut ArenaServer, duration: Option<Duration>) {
    let mut pacer = TickLoop::new(server.world().config.tick_rate);
    let started = Instant::now();

    loop {
        if let Some(limit) = duration {
            if started.elapsed() >= limit {
                break;
            }
        }
        pacer.wait();
        let frames = server.tick();
        // Hand frames to the transport; it flushes without blocking us.
        for (client, frame) in frames {
            tracing::trace!(
                "flush tick {} to {}: {} updates",
                frame.tick,
                client,
                frame.updates.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulwark_shared::defs;

    fn server() -> ArenaServer {
        ArenaServer::new(ServerConfig::default())
    }

    fn connect(server: &mut ArenaServer, id: u32) -> ClientId {
        let client = ClientId(id);
        server
            .command_handle()
            .send(ClientCommand::Connect {
                client,
                name: format!("player-{id}"),
                definition: Box::new(defs::standard_tank()),
            })
            .unwrap();
        client
    }

    #[test]
    fn test_connect_spawns_and_snapshots() {
        let mut server = server();
        let client = connect(&mut server, 1);

        let frames = server.tick();
        assert!(server.client_entity(client).is_some());

        let (to, frame) = &frames[0];
        assert_eq!(*to, client);
        // Tank plus its barrel, both full snapshots.
        assert_eq!(frame.updates.len(), 2);
    }

    #[test]
    fn test_idle_world_emits_no_frames() {
        let mut server = server();
        connect(&mut server, 1);
        server.tick();

        // No input, no motion: after the initial snapshot the world is
        // clean and frames are empty.
        // (The barrel group reload_time settles on the first weapon tick.)
        server.tick();
        let frames = server.tick();
        assert!(
            frames.is_empty(),
            "clean tick must not produce frames: {frames:?}"
        );
    }

    #[test]
    fn test_disconnect_removes_at_tick_boundary() {
        let mut server = server();
        let client = connect(&mut server, 1);
        server.tick();
        let entity = server.client_entity(client).unwrap();

        server
            .command_handle()
            .send(ClientCommand::Disconnect { client })
            .unwrap();
        // Still alive until the next tick runs.
        assert!(server.world().registry.is_alive(entity));

        server.tick();
        assert!(server.client_entity(client).is_none());
        // Deletion animation first, then gone.
        for _ in 0..=server.world().config.deletion_anim_ticks {
            server.tick();
        }
        assert!(!server.world().registry.is_alive(entity));
    }

    #[test]
    fn test_scheduled_action_fires_on_its_tick() {
        let mut server = server();
        server.schedule_in(
            3,
            ScheduledAction::SpawnShape {
                position: Vec2::ZERO,
                sides: 5,
                size: 40.0,
                health: 10.0,
            },
        );

        server.tick(); // tick 1
        server.tick(); // tick 2
        assert_eq!(server.world().registry.alive_count(), 0);

        server.tick(); // tick 3: due
        assert_eq!(server.world().registry.alive_count(), 1);
    }

    #[test]
    fn test_staggered_waves_spawn_in_order() {
        let mut server = server();
        // Unarmed template so the waves count tanks alone, and centers
        // far enough apart that waves never engage each other.
        let mut template = defs::standard_tank();
        template.weapons.clear();
        for wave in 0..3u64 {
            server.schedule_in(
                wave * 2 + 1,
                ScheduledAction::SpawnWave {
                    definition: Box::new(template.clone()),
                    center: Vec2::new(-1400.0 + wave as f32 * 1400.0, 1400.0),
                    radius: 100.0,
                    count: 2,
                },
            );
        }

        let mut counts = Vec::new();
        for _ in 0..6 {
            server.tick();
            counts.push(server.world().registry.alive_count());
        }
        assert_eq!(counts, vec![2, 2, 4, 4, 6, 6]);
    }

    #[test]
    fn test_firing_produces_projectiles_and_frames() {
        let mut server = server();
        let client = connect(&mut server, 1);
        server.tick();

        let handle = server.command_handle();
        let mut saw_projectile = false;
        for _ in 0..40 {
            handle
                .send(ClientCommand::Input {
                    client,
                    input: InputState {
                        movement: Vec2::ZERO,
                        aim: Vec2::new(400.0, 0.0),
                        flags: InputState::FLAG_FIRE,
                    },
                })
                .unwrap();
            server.tick();
            // Tank + barrel is 2; anything beyond is projectiles.
            if server.world().registry.alive_count() > 2 {
                saw_projectile = true;
                break;
            }
        }
        assert!(saw_projectile, "sustained fire must spawn projectiles");
    }
}
