//! # Behavior Components
//!
//! Per-entity tick hooks as ordered composition: every entity carries a
//! list of behavior components and the scheduler invokes them in sequence.
//! There is no function wrapping at construction time and no override
//! chain - adding behavior to an entity means pushing a component onto
//! its list.
//!
//! A failing component is isolated to its entity: the error is logged,
//! the rest of the list and the rest of the tick continue.

use crate::error::{SimError, SimResult};
use crate::world::World;
use bulwark_core::EntityId;
use bulwark_shared::Vec2;

/// One per-tick hook attached to an entity.
pub trait Behavior: std::fmt::Debug {
    /// Runs one tick for `id`. The entity may destroy itself or spawn
    /// others; the scheduler re-checks liveness between components.
    ///
    /// # Errors
    ///
    /// Failures are logged by the scheduler and do not abort the tick.
    fn tick(&mut self, world: &mut World, id: EntityId, tick: u64) -> SimResult<()>;
}

/// The ordered component list of one entity.
pub type BehaviorList = Vec<Box<dyn Behavior>>;

/// Runs an entity's behavior list with the take/put-back discipline the
/// borrow rules require: the list is moved out, each component gets the
/// whole world, and the list is returned if the entity survived.
pub fn run_entity_behaviors(world: &mut World, id: EntityId, tick: u64) {
    if !world.registry.is_alive(id) {
        return;
    }
    let mut behaviors = world.take_behaviors(id.index);
    if behaviors.is_empty() {
        return;
    }

    for behavior in &mut behaviors {
        if let Err(err) = behavior.tick(world, id, tick) {
            tracing::warn!("behavior hook failed on {}: {}", id, err);
        }
        if !world.registry.is_alive(id) {
            return;
        }
    }
    world.put_behaviors(id.index, behaviors);
}

// =============================================================================
// Built-in components
// =============================================================================

/// Constant thrust along a fixed direction; keeps projectiles at cruise
/// speed against friction.
#[derive(Debug)]
pub struct Propulsion {
    /// Acceleration added to the entity every tick.
    pub accel: Vec2,
}

impl Behavior for Propulsion {
    fn tick(&mut self, world: &mut World, id: EntityId, _tick: u64) -> SimResult<()> {
        if let Some(entity) = world.registry.get_mut(id) {
            entity.impulse += self.accel;
        }
        Ok(())
    }
}

/// Tick-counted decay: destroys the entity (animated) when it runs out.
#[derive(Debug)]
pub struct Lifetime {
    /// Ticks left to live.
    pub remaining: u32,
}

impl Behavior for Lifetime {
    fn tick(&mut self, world: &mut World, id: EntityId, _tick: u64) -> SimResult<()> {
        if self.remaining == 0 {
            world.destroy(id, true)?;
            return Ok(());
        }
        self.remaining -= 1;
        Ok(())
    }
}

/// Drone steering: seeks the owner's aim point, flees it while the owner
/// holds repel, and drifts back to the owner when the owner is idle. The
/// owner handle is weak; a dead owner leaves the drone coasting.
#[derive(Debug)]
pub struct DroneSteer {
    /// Acceleration toward the steering point.
    pub accel: f32,
}

impl Behavior for DroneSteer {
    fn tick(&mut self, world: &mut World, id: EntityId, _tick: u64) -> SimResult<()> {
        let owner = match world.registry.get(id) {
            Some(entity) => entity.groups.relations.values().owner,
            None => return Ok(()),
        };
        if !world.registry.is_alive(owner) {
            return Ok(());
        }

        let owner_input = world.input_of(owner);
        let owner_pos = {
            let entity = world.registry.get(owner).ok_or(
                bulwark_core::CoreError::StaleHandle(owner),
            )?;
            let values = entity.groups.position.values();
            Vec2::new(values.x, values.y)
        };

        let my_pos = match world.registry.get(id) {
            Some(entity) => {
                let values = entity.groups.position.values();
                Vec2::new(values.x, values.y)
            }
            None => return Ok(()),
        };

        let goal = if owner_input.is_firing() || owner_input.is_repelling() {
            owner_input.aim
        } else {
            owner_pos
        };
        let mut dir = (goal - my_pos).normalize_or_zero();
        if owner_input.is_repelling() {
            dir = -dir;
        }

        if let Some(entity) = world.registry.get_mut(id) {
            entity.impulse += dir * self.accel;
        }
        Ok(())
    }
}

/// Constant rotation, for decorative spinners.
#[derive(Debug)]
pub struct Spin {
    /// Radians per tick.
    pub rate: f32,
}

impl Behavior for Spin {
    fn tick(&mut self, world: &mut World, id: EntityId, _tick: u64) -> SimResult<()> {
        if let Some(entity) = world.registry.get_mut(id) {
            let angle = entity.groups.position.values().angle;
            entity.groups.position.set_angle(angle + self.rate);
        }
        Ok(())
    }
}

/// Test helper: a component that always fails, for isolation tests.
#[derive(Debug)]
pub struct AlwaysFails;

impl Behavior for AlwaysFails {
    fn tick(&mut self, _world: &mut World, id: EntityId, _tick: u64) -> SimResult<()> {
        Err(SimError::Behavior {
            entity: id,
            reason: "always fails".to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    fn world() -> World {
        World::new(ServerConfig::default())
    }

    #[test]
    fn test_lifetime_destroys_after_expiry() {
        let mut world = world();
        let shape = world.spawn_shape(Vec2::ZERO, 4, 30.0, 5.0, 0.0).unwrap();
        world.push_behavior(shape, Box::new(Lifetime { remaining: 2 }));

        for _ in 0..3 {
            run_entity_behaviors(&mut world, shape, 0);
        }
        assert!(
            !world.registry.get(shape).unwrap().lifecycle.is_active(),
            "lifetime expiry must start the deletion path"
        );
    }

    #[test]
    fn test_failing_behavior_does_not_stop_the_list() {
        let mut world = world();
        let shape = world.spawn_shape(Vec2::ZERO, 4, 30.0, 5.0, 0.0).unwrap();
        world.push_behavior(shape, Box::new(AlwaysFails));
        world.push_behavior(shape, Box::new(Spin { rate: 0.5 }));

        run_entity_behaviors(&mut world, shape, 0);

        let angle = world
            .registry
            .get(shape)
            .unwrap()
            .groups
            .position
            .values()
            .angle;
        assert!((angle - 0.5).abs() < 1e-6, "later components still ran");
    }

    #[test]
    fn test_spin_is_ordered_composition() {
        let mut world = world();
        let shape = world.spawn_shape(Vec2::ZERO, 4, 30.0, 5.0, 0.0).unwrap();
        world.push_behavior(shape, Box::new(Spin { rate: 0.25 }));
        world.push_behavior(shape, Box::new(Spin { rate: 0.25 }));

        run_entity_behaviors(&mut world, shape, 0);
        let angle = world
            .registry
            .get(shape)
            .unwrap()
            .groups
            .position
            .values()
            .angle;
        assert!((angle - 0.5).abs() < 1e-6, "both components applied in order");
    }
}
