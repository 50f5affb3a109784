//! # Weapons
//!
//! The per-barrel reload state machine and the fire path.
//!
//! ## The cycle
//!
//! Each barrel advances a position counter once per tick against a reload
//! interval recomputed every tick from the owner's reload stat and the
//! definition multiplier:
//!
//! ```text
//! Charging   pos <  reload
//! Delayed    reload <= pos < reload * (1 + delay)
//! Fire       pos crosses the delayed threshold:
//!            spawn, pos = reload * delay
//! ```
//!
//! If the interval changes mid-cycle the position rescales
//! proportionally, so a stat change can never double-fire a barrel or
//! swallow a cycle.

use crate::behavior::{DroneSteer, Lifetime, Propulsion};
use crate::error::SimResult;
use crate::world::{CombatStats, SimData, World};
use bulwark_core::fields::{HealthValues, PhysicsValues, PositionValues};
use bulwark_core::{EntityId, FieldGroups};
use bulwark_shared::constants::{BASE_PROJECTILE_ACCEL, BASE_TANK_SIZE, FRICTION};
use bulwark_shared::defs::{minion_weapon, ProjectileKind, WeaponDefinition};
use bulwark_shared::Vec2;

/// Reload/fire timing state machine for one barrel.
#[derive(Clone, Copy, Debug)]
pub struct ShootCycle {
    /// Position in the cycle, advanced once per tick.
    pos: f32,
    /// The reload interval the position was measured against.
    reload: f32,
}

impl ShootCycle {
    /// Creates a cycle at rest against the given initial interval.
    #[must_use]
    pub fn new(initial_reload: f32) -> Self {
        Self {
            pos: 0.0,
            reload: initial_reload.max(f32::MIN_POSITIVE),
        }
    }

    /// Current cycle position, for diagnostics and tests.
    #[must_use]
    pub const fn position(&self) -> f32 {
        self.pos
    }

    /// Advances one tick. Returns true exactly when the barrel fires.
    ///
    /// * `reload` - interval in ticks, recomputed by the caller this tick
    /// * `delay` - extra fire-window fraction from the definition
    /// * `wants_fire` - resolved intent (input flag, or always-fire class)
    /// * `at_capacity` - live-count cap reached (drones/minions)
    pub fn tick(&mut self, reload: f32, delay: f32, wants_fire: bool, at_capacity: bool) -> bool {
        let reload = reload.max(f32::MIN_POSITIVE);

        // A mid-cycle stat change rescales the position proportionally:
        // no double fire, no skipped cycle.
        if reload != self.reload {
            self.pos *= reload / self.reload;
            self.reload = reload;
        }

        self.pos += 1.0;

        if self.pos >= reload && (!wants_fire || at_capacity) {
            // Fully charged but not allowed to fire: hold at the ready.
            self.pos = reload;
            return false;
        }

        if self.pos >= reload * (1.0 + delay) {
            self.pos = reload * delay;
            return true;
        }

        false
    }
}

/// One barrel: its definition, its child entity, its cycle, and the
/// projectiles it is responsible for (weak handles, pruned every tick).
pub struct Mount {
    /// Geometry and timing.
    pub def: WeaponDefinition,
    /// The barrel's own entity (child of the owner).
    pub barrel: EntityId,
    cycle: ShootCycle,
    live: Vec<EntityId>,
}

impl Mount {
    /// Creates a mount for an already-spawned barrel entity.
    #[must_use]
    pub fn new(barrel: EntityId, def: WeaponDefinition) -> Self {
        let initial = bulwark_shared::constants::BASE_RELOAD_TICKS * def.reload;
        Self {
            def,
            barrel,
            cycle: ShootCycle::new(initial),
            live: Vec::new(),
        }
    }

    /// Live projectiles currently attributed to this mount.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

/// All weapon mounts of one entity.
pub struct Armament {
    mounts: Vec<Mount>,
}

impl Armament {
    /// Creates an armament from its mounts.
    #[must_use]
    pub fn new(mounts: Vec<Mount>) -> Self {
        Self { mounts }
    }

    /// Read access to the mounts.
    #[must_use]
    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    /// Runs one weapon tick for `owner`: prune dead projectiles, resize
    /// barrels to the owner's scale, advance every cycle, fire where due.
    pub fn tick(&mut self, world: &mut World, owner: EntityId, _tick: u64) {
        let Some(owner_entity) = world.registry.get(owner) else {
            return;
        };
        let owner_active = owner_entity.lifecycle.is_active();
        let owner_size = owner_entity.groups.physics.values().size;
        let size_factor = owner_size / BASE_TANK_SIZE;
        let input = world.input_of(owner);
        let stats = world.stats_of(owner);

        for mount in &mut self.mounts {
            mount.live.retain(|&p| world.registry.is_alive(p));

            let reload = stats.reload_ticks * mount.def.reload;
            if !resize_barrel(world, mount, size_factor, reload) {
                // Barrel entity was destroyed out from under the mount;
                // nothing to aim or fire from.
                continue;
            }

            // Entities in their deletion animation keep their shape but
            // stop cycling; a dying tank never fires.
            if !owner_active {
                continue;
            }

            let always = mount.def.force_fire || mount.def.projectile.kind.is_always_fire();
            let wants_fire = always
                || if mount.def.inverse_fire {
                    input.is_repelling()
                } else {
                    input.is_firing()
                };
            let at_capacity = mount
                .def
                .projectile
                .max_count
                .is_some_and(|cap| mount.live.len() as u32 >= cap);

            if mount
                .cycle
                .tick(reload, mount.def.delay, wants_fire, at_capacity)
            {
                fire(world, owner, mount, size_factor);
            }
        }
    }
}

/// Recomputes the barrel's derived fields from its parent's scale.
/// Returns false if the barrel entity no longer exists.
fn resize_barrel(world: &mut World, mount: &Mount, size_factor: f32, reload: f32) -> bool {
    let Some(entity) = world.registry.get_mut(mount.barrel) else {
        return false;
    };
    let def = &mount.def;
    let (sin, cos) = def.angle.sin_cos();
    let length = def.size * size_factor;

    entity.groups.physics.set_size(length);
    entity.groups.physics.set_width(def.width * size_factor);
    entity
        .groups
        .position
        .set_x(cos * (length / 2.0) - sin * def.offset * size_factor);
    entity
        .groups
        .position
        .set_y(sin * (length / 2.0) + cos * def.offset * size_factor);
    if let Some(barrel_group) = &mut entity.groups.barrel {
        barrel_group.set_reload_time(reload);
    }
    true
}

/// The fire path: scatter roll, projectile dispatch by kind, recoil to
/// the root of the ownership chain.
fn fire(world: &mut World, owner: EntityId, mount: &mut Mount, size_factor: f32) {
    let (barrel_pos, barrel_angle) = world.world_pose(mount.barrel);
    let barrel_len = mount.def.size * size_factor;
    let tip = barrel_pos + Vec2::from_angle(barrel_angle) * (barrel_len / 2.0);
    let radius = mount.def.projectile.size_ratio * mount.def.width * size_factor / 2.0;

    if let Some(entity) = world.registry.get_mut(mount.barrel) {
        if let Some(barrel_group) = &mut entity.groups.barrel {
            barrel_group.toggle_shot();
        }
    }

    let pellets = mount.def.projectile.pellet_count.unwrap_or(1).max(1);
    let mut recoil_angle = barrel_angle;
    for pellet in 0..pellets {
        let scatter = world.scatter_angle(mount.def.projectile.scatter_rate);
        let angle = barrel_angle + scatter;
        if pellet == 0 {
            recoil_angle = angle;
        }

        match spawn_projectile(world, owner, &mount.def, tip, angle, radius) {
            Ok(Some(projectile)) => mount.live.push(projectile),
            Ok(None) => {} // unknown kind, already logged
            Err(err) => {
                tracing::warn!("projectile spawn from {} failed: {}", owner, err);
            }
        }
    }

    // Reciprocal impulse to the topmost owner.
    if mount.def.recoil > 0.0 {
        let root = world.root_parent(owner);
        if let Some(entity) = world.registry.get_mut(root) {
            entity.add_impulse(recoil_angle + std::f32::consts::PI, mount.def.recoil);
        }
    }
}

/// Constructs one projectile entity, dispatching on the definition's kind
/// tag. Unknown kinds are skipped with a log line; the simulation
/// continues.
fn spawn_projectile(
    world: &mut World,
    owner: EntityId,
    def: &WeaponDefinition,
    position: Vec2,
    angle: f32,
    radius: f32,
) -> SimResult<Option<EntityId>> {
    let projectile = &def.projectile;
    if projectile.kind == ProjectileKind::Unknown {
        tracing::warn!("ignoring attempt to spawn projectile of unknown kind");
        return Ok(None);
    }

    let (team, color) = match world.registry.get(owner) {
        Some(entity) => (
            entity.groups.relations.values().team,
            entity.groups.style.values().color,
        ),
        None => (EntityId::NULL, 0),
    };

    let mut groups = FieldGroups::new().with_health(projectile.health);
    *groups.position.values_mut() = PositionValues {
        x: position.x,
        y: position.y,
        angle,
        flags: 0,
    };
    *groups.physics.values_mut() = PhysicsValues {
        size: radius,
        width: 0.0,
        sides: 1,
        push_factor: 1.0,
        absorption_factor: projectile.absorption_factor,
        flags: PhysicsValues::FLAG_NO_OWN_TEAM_COLLISION,
    };
    groups.style.values_mut().color = color;
    if let Some(health) = &mut groups.health {
        health.values_mut().flags = HealthValues::FLAG_HIDDEN_BAR;
    }
    groups.relations.values_mut().owner = owner;
    groups.relations.values_mut().team = team;

    let cruise = BASE_PROJECTILE_ACCEL * projectile.speed;
    let id = world.spawn_raw(
        groups,
        SimData {
            stats: CombatStats {
                body_damage: projectile.damage,
                move_accel: 0.0,
                max_speed: cruise,
                ..CombatStats::default()
            },
            ..SimData::default()
        },
    )?;

    let dir = Vec2::from_angle(angle);
    if let Some(entity) = world.registry.get_mut(id) {
        entity.velocity = dir * cruise;
    }

    match projectile.kind {
        ProjectileKind::Bullet => {
            // Thrust balances friction so the bullet holds cruise speed.
            world.push_behavior(
                id,
                Box::new(Propulsion {
                    accel: dir * cruise * (1.0 - FRICTION),
                }),
            );
        }
        ProjectileKind::Trap => {
            // No thrust: friction bleeds the launch speed off and the
            // trap lingers where it stops.
        }
        ProjectileKind::Drone | ProjectileKind::Minion => {
            world.push_behavior(id, Box::new(DroneSteer { accel: cruise * 0.15 }));
        }
        ProjectileKind::Unknown => unreachable!("filtered above"),
    }

    if projectile.lifetime != u32::MAX {
        world.push_behavior(
            id,
            Box::new(Lifetime {
                remaining: projectile.lifetime,
            }),
        );
    }

    // Minions carry their own gun.
    if projectile.kind == ProjectileKind::Minion {
        let weapon = minion_weapon();
        let barrel = world.spawn_barrel(id, &weapon)?;
        let mount = Mount::new(barrel, weapon);
        world.put_armament(id.index, Armament::new(vec![mount]));
    }

    Ok(Some(id))
}
