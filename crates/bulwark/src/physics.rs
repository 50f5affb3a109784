//! # Narrow-Phase Collision & Damage
//!
//! Consumes broad-phase candidates and resolves actual contacts:
//! circle/circle for bodies and projectiles, circle/segment for walls and
//! other two-sided shapes. Overlapping bodies receive push-factor scaled
//! separation impulses; damageable pairs on opposing teams trade body
//! damage.
//!
//! Pairs are processed in ascending entity-ID order - the outer loop
//! walks IDs ascending and only accepts candidates with a higher index -
//! so damage ordering and death ties are deterministic for a given
//! layout.

use crate::spatial::QueryHits;
use crate::world::World;
use bulwark_core::fields::{PhysicsValues, StyleValues};
use bulwark_core::EntityId;
use bulwark_shared::math::Rect;
use bulwark_shared::Vec2;
use std::collections::HashSet;

/// Separation impulse per unit of push factor.
const PUSH_SCALE: f32 = 2.0;

/// One resolved contact, a -> b.
#[derive(Clone, Copy, Debug)]
struct Contact {
    /// Unit normal pointing from a to b.
    normal: Vec2,
}

/// Everything needed to apply one pair's response after the read phase.
struct Resolution {
    a: EntityId,
    b: EntityId,
    push_a: Vec2,
    push_b: Vec2,
    damage_a: f32,
    damage_b: f32,
}

/// Step 5 of the tick: narrow phase plus damage, ascending ID order.
pub fn resolve_collisions(world: &mut World) {
    let ids = world.registry.alive_ids();
    let mut hits = QueryHits::new();
    let mut casualties: Vec<EntityId> = Vec::new();
    let mut flashed: HashSet<u32> = HashSet::new();

    for &id in &ids {
        let Some(shape_a) = read_body(world, id) else {
            continue;
        };

        world.grid.query(shape_a.bounds(), &mut hits);
        for b_index in hits.iter() {
            // Strictly-greater indices only: every unordered pair is
            // visited exactly once, in ascending order of its lower ID.
            if b_index <= id.index {
                continue;
            }
            let Some(b_id) = world.registry.get_by_index(b_index).map(bulwark_core::Entity::id)
            else {
                continue;
            };
            let Some(shape_b) = read_body(world, b_id) else {
                continue;
            };

            if !pair_collides(&shape_a, &shape_b) {
                continue;
            }
            let Some(contact) = overlap(&shape_a, &shape_b) else {
                continue;
            };

            let resolution = build_resolution(&shape_a, &shape_b, contact);
            apply_resolution(world, &resolution, &mut casualties, &mut flashed);
        }
    }

    // Deaths resolve after the sweep, still in ascending discovery order.
    for id in casualties {
        if world.registry.is_alive(id) {
            if let Err(err) = world.destroy_subtree(id, true) {
                tracing::debug!("death cascade on {}: {}", id, err);
            }
        }
    }

    // Flash decay: anything flashing that was not damaged this tick
    // stops flashing.
    for &id in &ids {
        if flashed.contains(&id.index) {
            continue;
        }
        let Some(entity) = world.registry.get_mut(id) else {
            continue;
        };
        let flags = entity.groups.style.values().flags;
        if flags & StyleValues::FLAG_FLASHING != 0 {
            entity
                .groups
                .style
                .set_flags(flags & !StyleValues::FLAG_FLASHING);
        }
    }
}

/// Snapshot of one collidable body, gathered in the read phase.
struct Body {
    id: EntityId,
    pos: Vec2,
    angle: f32,
    physics: PhysicsValues,
    team: EntityId,
    owner: EntityId,
    body_damage: f32,
    damageable: bool,
}

impl Body {
    fn bounds(&self) -> Rect {
        let half = self.physics.size.max(self.physics.width).max(1.0);
        Rect::square(self.pos, half)
    }

    fn is_wall(&self) -> bool {
        self.physics.flags & PhysicsValues::FLAG_SOLID_WALL != 0
    }

    fn is_segment(&self) -> bool {
        self.physics.sides == 2
    }
}

/// Reads a body snapshot; `None` when the entity does not collide at all
/// (dead, inactive, or attached to a live parent).
fn read_body(world: &World, id: EntityId) -> Option<Body> {
    let entity = world.registry.get(id)?;
    if !entity.lifecycle.is_active() {
        return None;
    }
    let relations = *entity.groups.relations.values();
    if world.registry.is_alive(relations.parent) {
        // Attached children (barrels) do not collide themselves.
        return None;
    }
    let values = entity.groups.position.values();
    Some(Body {
        id,
        pos: Vec2::new(values.x, values.y),
        angle: values.angle,
        physics: *entity.groups.physics.values(),
        team: relations.team,
        owner: relations.owner,
        body_damage: world.stats_of(id).body_damage,
        damageable: entity.groups.health.is_some(),
    })
}

/// Flag/team gate before any geometry runs.
fn pair_collides(a: &Body, b: &Body) -> bool {
    // Two segments never meet in the narrow phase (wall-wall, barrel-barrel).
    if a.is_segment() && b.is_segment() {
        return false;
    }

    let same_team = !a.team.is_null() && a.team == b.team;
    let no_team_collision = (a.physics.flags | b.physics.flags)
        & PhysicsValues::FLAG_NO_OWN_TEAM_COLLISION
        != 0;
    if same_team && no_team_collision {
        return false;
    }

    let owner_only = (a.physics.flags | b.physics.flags)
        & PhysicsValues::FLAG_ONLY_SAME_OWNER_COLLISION
        != 0;
    if owner_only && a.owner != b.owner {
        return false;
    }

    true
}

/// Geometry dispatch: circle/circle or circle/segment.
fn overlap(a: &Body, b: &Body) -> Option<Contact> {
    match (a.is_segment(), b.is_segment()) {
        (false, false) => circle_circle(a.pos, a.physics.size, b.pos, b.physics.size),
        (false, true) => circle_segment(a.pos, a.physics.size, b).map(|n| Contact { normal: n }),
        (true, false) => circle_segment(b.pos, b.physics.size, a)
            .map(|n| Contact { normal: -n }),
        (true, true) => None,
    }
}

/// Circle/circle overlap; returns the a -> b contact.
fn circle_circle(a_pos: Vec2, a_radius: f32, b_pos: Vec2, b_radius: f32) -> Option<Contact> {
    let delta = b_pos - a_pos;
    let dist_sq = delta.length_squared();
    let reach = a_radius + b_radius;
    if dist_sq >= reach * reach {
        return None;
    }
    let dist = dist_sq.sqrt();
    let normal = if dist > f32::EPSILON {
        delta * (1.0 / dist)
    } else {
        // Perfectly coincident centers: pick a stable axis.
        Vec2::new(1.0, 0.0)
    };
    Some(Contact { normal })
}

/// Circle against an oriented segment (`seg.size` long, `seg.width`
/// thick). Returns the unit normal pointing from the circle toward the
/// segment, or `None` without contact.
fn circle_segment(circle_pos: Vec2, radius: f32, seg: &Body) -> Option<Vec2> {
    let axis = Vec2::from_angle(seg.angle);
    let half_len = seg.physics.size / 2.0;
    let half_width = seg.physics.width / 2.0;

    let to_circle = circle_pos - seg.pos;
    let along = to_circle.dot(axis).clamp(-half_len, half_len);
    let closest = seg.pos + axis * along;

    let delta = circle_pos - closest;
    let dist_sq = delta.length_squared();
    let reach = radius + half_width;
    if dist_sq >= reach * reach {
        return None;
    }
    let dist = dist_sq.sqrt();
    if dist > f32::EPSILON {
        Some(delta * (-1.0 / dist))
    } else {
        Some(Vec2::new(0.0, -1.0))
    }
}

fn build_resolution(a: &Body, b: &Body, contact: Contact) -> Resolution {
    // Separation scales with the partner's push and our own absorption.
    let push_a = -contact.normal * (b.physics.push_factor * a.physics.absorption_factor * PUSH_SCALE);
    let push_b = contact.normal * (a.physics.push_factor * b.physics.absorption_factor * PUSH_SCALE);

    // Walls neither take nor deal damage; same-team pairs push but do not
    // hurt each other; teamless entities hurt everyone.
    let same_team = !a.team.is_null() && a.team == b.team;
    let damaging =
        a.damageable && b.damageable && !same_team && !a.is_wall() && !b.is_wall();

    Resolution {
        a: a.id,
        b: b.id,
        push_a,
        push_b,
        damage_a: if damaging { b.body_damage } else { 0.0 },
        damage_b: if damaging { a.body_damage } else { 0.0 },
    }
}

fn apply_resolution(
    world: &mut World,
    resolution: &Resolution,
    casualties: &mut Vec<EntityId>,
    flashed: &mut HashSet<u32>,
) {
    apply_to_one(
        world,
        resolution.a,
        resolution.push_a,
        resolution.damage_a,
        casualties,
        flashed,
    );
    apply_to_one(
        world,
        resolution.b,
        resolution.push_b,
        resolution.damage_b,
        casualties,
        flashed,
    );
}

fn apply_to_one(
    world: &mut World,
    id: EntityId,
    push: Vec2,
    damage: f32,
    casualties: &mut Vec<EntityId>,
    flashed: &mut HashSet<u32>,
) {
    let Some(entity) = world.registry.get_mut(id) else {
        return;
    };
    entity.impulse += push;

    if damage <= 0.0 {
        return;
    }
    let Some(health) = &mut entity.groups.health else {
        return;
    };
    let remaining = health.values().health - damage;
    health.set_health(remaining);

    let flags = entity.groups.style.values().flags;
    entity
        .groups
        .style
        .set_flags(flags | StyleValues::FLAG_FLASHING);
    flashed.insert(id.index);

    if remaining <= 0.0 {
        casualties.push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use bulwark_shared::defs;
    use bulwark_shared::defs::SpawnPoint;

    fn world() -> World {
        World::new(ServerConfig::default())
    }

    fn tank_at(world: &mut World, x: f32, team: EntityId) -> EntityId {
        world
            .spawn_tank(
                &defs::standard_tank(),
                SpawnPoint {
                    position: Vec2::new(x, 0.0),
                    angle: 0.0,
                },
                team,
                None,
            )
            .unwrap()
    }

    fn collide_once(world: &mut World) {
        world.rebuild_spatial();
        resolve_collisions(world);
    }

    #[test]
    fn test_overlapping_hostiles_trade_damage() {
        let mut world = world();
        let a = tank_at(&mut world, 0.0, EntityId::NULL);
        let b = tank_at(&mut world, 40.0, EntityId::NULL);

        collide_once(&mut world);

        let health_a = world.registry.get(a).unwrap().groups.health.unwrap();
        let health_b = world.registry.get(b).unwrap().groups.health.unwrap();
        assert!(health_a.values().health < health_a.values().max_health);
        assert!(health_b.values().health < health_b.values().max_health);

        // Pushed apart: impulses point away from each other.
        assert!(world.registry.get(a).unwrap().impulse.x < 0.0);
        assert!(world.registry.get(b).unwrap().impulse.x > 0.0);
    }

    #[test]
    fn test_same_team_pushes_without_damage() {
        let mut world = world();
        let anchor = world.spawn_shape(Vec2::new(900.0, 900.0), 4, 10.0, 1.0, 0.0).unwrap();
        let a = tank_at(&mut world, 0.0, anchor);
        let b = tank_at(&mut world, 40.0, anchor);

        collide_once(&mut world);

        let health_a = world.registry.get(a).unwrap().groups.health.unwrap();
        assert_eq!(health_a.values().health, health_a.values().max_health);
        assert!(world.registry.get(b).unwrap().impulse.x > 0.0, "still pushed");
    }

    #[test]
    fn test_separated_bodies_do_not_interact() {
        let mut world = world();
        let a = tank_at(&mut world, 0.0, EntityId::NULL);
        let _b = tank_at(&mut world, 500.0, EntityId::NULL);

        collide_once(&mut world);

        let health = world.registry.get(a).unwrap().groups.health.unwrap();
        assert_eq!(health.values().health, health.values().max_health);
        assert_eq!(world.registry.get(a).unwrap().impulse, Vec2::ZERO);
    }

    #[test]
    fn test_wall_pushes_but_never_damages() {
        let mut world = world();
        let tank = tank_at(&mut world, 0.0, EntityId::NULL);
        let _wall = world
            .spawn_wall(Vec2::new(45.0, 0.0), std::f32::consts::FRAC_PI_2, 300.0, 30.0)
            .unwrap();

        collide_once(&mut world);

        let entity = world.registry.get(tank).unwrap();
        let health = entity.groups.health.unwrap();
        assert_eq!(health.values().health, health.values().max_health);
        assert!(entity.impulse.x < 0.0, "pushed out of the wall");
    }

    #[test]
    fn test_lethal_contact_destroys_with_animation() {
        let mut world = world();
        let tank = tank_at(&mut world, 0.0, EntityId::NULL);
        let victim = world.spawn_shape(Vec2::new(30.0, 0.0), 4, 30.0, 0.5, 0.0).unwrap();
        let _ = tank;

        collide_once(&mut world);

        let lifecycle = world.registry.get(victim).unwrap().lifecycle;
        assert!(
            !lifecycle.is_active(),
            "lethal damage must start the deletion path, got {lifecycle:?}"
        );
    }

    #[test]
    fn test_flash_decays_next_tick() {
        let mut world = world();
        let a = tank_at(&mut world, 0.0, EntityId::NULL);
        let b = tank_at(&mut world, 40.0, EntityId::NULL);

        collide_once(&mut world);
        assert!(
            world.registry.get(a).unwrap().groups.style.values().flags
                & StyleValues::FLAG_FLASHING
                != 0
        );

        // Separate them; the flash clears on the next resolution pass.
        let far = Vec2::new(800.0, 0.0);
        {
            let entity = world.registry.get_mut(b).unwrap();
            entity.groups.position.set_x(far.x);
        }
        collide_once(&mut world);
        assert!(
            world.registry.get(a).unwrap().groups.style.values().flags
                & StyleValues::FLAG_FLASHING
                == 0
        );
    }
}
