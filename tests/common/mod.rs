//! Shared fixtures for integration tests.

#![allow(dead_code)]

use coreguard::config::ArenaConfig;
use coreguard::core::physics::EulerPhysics;
use coreguard::game::session::{JoinOutcome, PlayerId};
use coreguard::game::state::World;

/// Nominal tick length.
pub const DT: f64 = 1.0 / 60.0;

/// One core per team.
pub fn duel_config() -> ArenaConfig {
    ArenaConfig { cores_per_team: 1, ..Default::default() }
}

/// A world with `players` connected players, all joined.
pub fn arena(config: ArenaConfig, players: usize) -> (World, EulerPhysics, Vec<PlayerId>) {
    let mut physics = EulerPhysics::new();
    let mut world = World::new(config, &mut physics);

    let ids: Vec<PlayerId> = (0..players).map(|_| PlayerId::new()).collect();
    for (i, id) in ids.iter().enumerate() {
        world.connect(*id);
        let outcome = world.join(id, &format!("player{i}"), &mut physics);
        assert!(matches!(outcome, JoinOutcome::Joined { .. }), "join failed: {outcome:?}");
    }
    world.take_events();

    (world, physics, ids)
}
