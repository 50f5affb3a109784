//! Immutable definition tables.
//!
//! The simulation core never hardcodes a tank or a weapon: every playable
//! or AI-driven kind is one of a handful of generic entity templates
//! parametrized by these tables. The full catalogue lives outside the core
//! and is deserialized once at startup; the structs here are its schema.
//!
//! A small set of built-in presets is provided for tests and the headless
//! demo server.

use crate::math::Vec2;
use serde::{Deserialize, Serialize};

/// Discriminates projectile construction when a barrel fires.
///
/// Unknown tags deserialize to [`ProjectileKind::Unknown`]; the weapon
/// system skips those spawns with a log line instead of failing the tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectileKind {
    /// Plain bullet: flies straight, decays after its lifetime.
    #[default]
    Bullet,
    /// Trap: decelerates sharply and lingers.
    Trap,
    /// Drone: steered by the owner's aim point, counts against a live cap.
    Drone,
    /// Minion: a drone that carries its own weapon.
    Minion,
    /// Anything the running build does not recognize.
    #[serde(other)]
    Unknown,
}

impl ProjectileKind {
    /// Kinds that fire continuously without player input.
    #[must_use]
    pub const fn is_always_fire(self) -> bool {
        matches!(self, Self::Drone | Self::Minion)
    }
}

/// Parameters of the projectile a barrel spawns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectileDefinition {
    /// Construction dispatch tag.
    #[serde(default)]
    pub kind: ProjectileKind,
    /// Speed multiplier over the base projectile acceleration.
    pub speed: f32,
    /// Damage dealt per overlap tick.
    pub damage: f32,
    /// Durability of the projectile itself.
    pub health: f32,
    /// Projectile radius as a fraction of the barrel width.
    pub size_ratio: f32,
    /// Lifetime in ticks before natural decay.
    pub lifetime: u32,
    /// Spread of the scatter roll; 0 fires perfectly straight.
    #[serde(default)]
    pub scatter_rate: f32,
    /// Knockback absorption of the projectile body.
    #[serde(default = "default_absorption")]
    pub absorption_factor: f32,
    /// Live-count cap for always-fire kinds (drones, minions).
    #[serde(default)]
    pub max_count: Option<u32>,
    /// Projectiles spawned per fire event (shotgun fans).
    #[serde(default)]
    pub pellet_count: Option<u32>,
}

fn default_absorption() -> f32 {
    1.0
}

/// Geometry and timing of one barrel.
///
/// Angles are radians relative to the owner's facing; distances scale with
/// the owner's size factor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeaponDefinition {
    /// Mount angle on the owner.
    pub angle: f32,
    /// Sideways offset of the mount point.
    #[serde(default)]
    pub offset: f32,
    /// Barrel length.
    pub size: f32,
    /// Barrel width.
    pub width: f32,
    /// Extra fire-window fraction of the reload interval.
    pub delay: f32,
    /// Reload multiplier over the owner's reload interval.
    pub reload: f32,
    /// Recoil impulse applied to the root owner per shot.
    #[serde(default)]
    pub recoil: f32,
    /// Fires regardless of input when set.
    #[serde(default)]
    pub force_fire: bool,
    /// Keys off the repel flag instead of the fire flag.
    #[serde(default)]
    pub inverse_fire: bool,
    /// Cosmetic addon identifier, consumed opaquely.
    #[serde(default)]
    pub addon: Option<String>,
    /// What this barrel shoots.
    pub projectile: ProjectileDefinition,
}

/// A playable or AI-driven tank template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TankDefinition {
    /// Display name.
    pub name: String,
    /// Maximum health.
    pub max_health: f32,
    /// Movement acceleration per tick at full input.
    pub move_accel: f32,
    /// Maximum speed, units per tick.
    pub max_speed: f32,
    /// Contact damage dealt per overlap tick.
    pub body_damage: f32,
    /// Body radius.
    pub size: f32,
    /// Polygon sides of the body; 1 renders as a circle.
    #[serde(default = "default_sides")]
    pub sides: u8,
    /// Barrels, in mount order.
    pub weapons: Vec<WeaponDefinition>,
}

fn default_sides() -> u8 {
    1
}

/// Spawn location hint attached to a tank template at spawn time.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    /// World position.
    pub position: Vec2,
    /// Initial facing in radians.
    #[serde(default)]
    pub angle: f32,
}

// =============================================================================
// Built-in presets - enough to boot a server without external tables
// =============================================================================

/// Single forward bullet barrel.
#[must_use]
pub fn standard_tank() -> TankDefinition {
    TankDefinition {
        name: "Standard".to_owned(),
        max_health: 50.0,
        move_accel: 2.5,
        max_speed: 15.0,
        body_damage: 1.0,
        size: 50.0,
        sides: 1,
        weapons: vec![WeaponDefinition {
            angle: 0.0,
            offset: 0.0,
            size: 95.0,
            width: 42.0,
            delay: 0.2,
            reload: 1.0,
            recoil: 1.0,
            force_fire: false,
            inverse_fire: false,
            addon: None,
            projectile: ProjectileDefinition {
                kind: ProjectileKind::Bullet,
                speed: 1.0,
                damage: 7.0,
                health: 10.0,
                size_ratio: 1.0,
                lifetime: 72,
                scatter_rate: 1.0,
                absorption_factor: 1.0,
                max_count: None,
                pellet_count: None,
            },
        }],
    }
}

/// Drone spawner: two always-fire barrels with a shared live cap of eight.
#[must_use]
pub fn drone_carrier() -> TankDefinition {
    let spawner = WeaponDefinition {
        angle: std::f32::consts::FRAC_PI_2,
        offset: 0.0,
        size: 70.0,
        width: 42.0,
        delay: 0.0,
        reload: 1.2,
        recoil: 0.0,
        force_fire: true,
        inverse_fire: false,
        addon: None,
        projectile: ProjectileDefinition {
            kind: ProjectileKind::Drone,
            speed: 0.8,
            damage: 4.0,
            health: 12.0,
            size_ratio: 1.2,
            lifetime: u32::MAX,
            scatter_rate: 0.0,
            absorption_factor: 1.0,
            max_count: Some(4),
            pellet_count: None,
        },
    };
    let mut mirrored = spawner.clone();
    mirrored.angle = -std::f32::consts::FRAC_PI_2;

    TankDefinition {
        name: "Carrier".to_owned(),
        max_health: 50.0,
        move_accel: 2.2,
        max_speed: 13.0,
        body_damage: 1.0,
        size: 50.0,
        sides: 1,
        weapons: vec![spawner, mirrored],
    }
}

/// The gun a spawned minion carries: small, auto-firing, short-lived
/// bullets.
#[must_use]
pub fn minion_weapon() -> WeaponDefinition {
    WeaponDefinition {
        angle: 0.0,
        offset: 0.0,
        size: 80.0,
        width: 50.0,
        delay: 0.0,
        reload: 2.5,
        recoil: 0.5,
        force_fire: true,
        inverse_fire: false,
        addon: None,
        projectile: ProjectileDefinition {
            kind: ProjectileKind::Bullet,
            speed: 0.7,
            damage: 2.0,
            health: 3.0,
            size_ratio: 0.8,
            lifetime: 36,
            scatter_rate: 1.0,
            absorption_factor: 0.5,
            max_count: None,
            pellet_count: None,
        },
    }
}

/// Shotgun: one barrel spawning a three-pellet fan per fire event.
#[must_use]
pub fn scatter_gun() -> TankDefinition {
    TankDefinition {
        name: "Scatter".to_owned(),
        max_health: 55.0,
        move_accel: 2.4,
        max_speed: 14.0,
        body_damage: 1.0,
        size: 50.0,
        sides: 1,
        weapons: vec![WeaponDefinition {
            angle: 0.0,
            offset: 0.0,
            size: 80.0,
            width: 56.0,
            delay: 0.3,
            reload: 2.0,
            recoil: 2.5,
            force_fire: false,
            inverse_fire: false,
            addon: None,
            projectile: ProjectileDefinition {
                kind: ProjectileKind::Bullet,
                speed: 0.9,
                damage: 4.0,
                health: 4.0,
                size_ratio: 0.6,
                lifetime: 40,
                scatter_rate: 3.0,
                absorption_factor: 0.5,
                max_count: None,
                pellet_count: Some(3),
            },
        }],
    }
}
