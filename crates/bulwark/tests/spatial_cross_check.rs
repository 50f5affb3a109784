//! Broad-phase correctness against brute force.
//!
//! The query surface must return exactly the live entities overlapping
//! the query rectangle - no duplicates, no omissions - across random
//! layouts, random movement, and random destruction.

use bulwark::config::ServerConfig;
use bulwark::world::World;
use bulwark_core::EntityId;
use bulwark_shared::math::Rect;
use bulwark_shared::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn brute_force(world: &World, rect: Rect) -> Vec<EntityId> {
    let mut expected: Vec<EntityId> = world
        .registry
        .iter_alive()
        .filter(|entity| {
            let values = entity.groups.position.values();
            let physics = entity.groups.physics.values();
            let half = physics.size.max(physics.width).max(1.0);
            Rect::square(Vec2::new(values.x, values.y), half).overlaps(&rect)
        })
        .map(bulwark_core::Entity::id)
        .collect();
    expected.sort_unstable();
    expected
}

fn random_rect(rng: &mut ChaCha8Rng, half_extent: f32) -> Rect {
    Rect::new(
        Vec2::new(
            rng.gen_range(-half_extent..half_extent),
            rng.gen_range(-half_extent..half_extent),
        ),
        rng.gen_range(10.0..500.0),
        rng.gen_range(10.0..500.0),
    )
}

#[test]
fn query_matches_brute_force_over_random_layouts() {
    let mut rng = ChaCha8Rng::seed_from_u64(0xC0FFEE);

    for _round in 0..10 {
        let config = ServerConfig {
            arena_half_extent: 1000.0,
            cell_shift: 6,
            capacity: 512,
            ..ServerConfig::default()
        };
        let mut world = World::new(config);

        let mut ids = Vec::new();
        for _ in 0..250 {
            let position = Vec2::new(rng.gen_range(-950.0..950.0), rng.gen_range(-950.0..950.0));
            let size = rng.gen_range(5.0..80.0);
            ids.push(
                world
                    .spawn_shape(position, 4, size, 10.0, 0.0)
                    .expect("capacity is sufficient"),
            );
        }

        for _ in 0..40 {
            let rect = random_rect(&mut rng, 1100.0);
            let got = world.query_ids(rect);

            let mut deduped = got.clone();
            deduped.dedup();
            assert_eq!(got, deduped, "no duplicates");
            let mut sorted = got.clone();
            sorted.sort_unstable();
            assert_eq!(got, sorted, "ascending order");

            assert_eq!(got, brute_force(&world, rect), "exact overlap set");
        }

        // Shuffle a third of the entities around and re-check: the
        // membership refresh must leave no stale bits behind.
        for &id in ids.iter().step_by(3) {
            let next = Vec2::new(rng.gen_range(-950.0..950.0), rng.gen_range(-950.0..950.0));
            let entity = world.registry.get_mut(id).unwrap();
            entity.groups.position.set_x(next.x);
            entity.groups.position.set_y(next.y);
        }
        world.rebuild_spatial();

        for _ in 0..40 {
            let rect = random_rect(&mut rng, 1100.0);
            assert_eq!(world.query_ids(rect), brute_force(&world, rect));
        }

        // Destroy a handful; their bits must vanish the same tick.
        for &id in ids.iter().step_by(5) {
            world.destroy(id, false).unwrap();
        }
        world.purge_destroyed();

        for _ in 0..40 {
            let rect = random_rect(&mut rng, 1100.0);
            let got = world.query_ids(rect);
            for id in &got {
                assert!(world.registry.is_alive(*id), "no ghost candidates");
            }
            assert_eq!(got, brute_force(&world, rect));
        }
    }
}
