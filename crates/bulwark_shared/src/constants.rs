//! Gameplay constants.
//!
//! Everything here is a server-side tuning value; none of it is secret from
//! the client, but the server's copy is authoritative.

/// Simulation tick rate (Hz).
pub const TICK_RATE: u32 = 25;

/// Duration of one tick in microseconds.
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / TICK_RATE as u64;

/// Base reload interval in ticks, before stats and definition multipliers.
pub const BASE_RELOAD_TICKS: f32 = 15.0;

/// Velocity retained per tick after integration (air resistance).
pub const FRICTION: f32 = 0.9;

/// Hard cap on any entity's speed, units per tick.
pub const MAX_SPEED: f32 = 100.0;

/// Default half extent of a client's view rectangle.
pub const VIEW_HALF_EXTENT: f32 = 960.0;

/// Ticks a deletion animation runs before the entity is fully destroyed.
pub const DELETION_ANIMATION_TICKS: u32 = 5;

/// Per-tick shrink factor applied during the deletion animation.
pub const DELETION_SHRINK_FACTOR: f32 = 0.75;

/// Base projectile acceleration, before definition speed multipliers.
pub const BASE_PROJECTILE_ACCEL: f32 = 20.0;

/// Tank body radius at which weapon geometry is authored; barrel sizes
/// scale by `owner_size / BASE_TANK_SIZE`.
pub const BASE_TANK_SIZE: f32 = 50.0;

/// Scatter unit: one point of scatter rate is this many radians of spread.
pub const SCATTER_UNIT_RADIANS: f32 = 10.0 * std::f32::consts::PI / 180.0;
