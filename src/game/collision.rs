//! Contact Resolution
//!
//! Turns physics contact pairs into game outcomes. The only lethal pairing
//! is an enemy guard touching a core whose spawn protection has expired.
//! Core-core and core-guard pairs never get a physical response (see the
//! registry's `ContactFilter` impl).

use tracing::info;

use crate::core::physics::{ContactPair, Physics};
use crate::game::entity::{Core, EntityId, EntityRef, EntityRegistry, Guard};
use crate::game::events::GameEvent;
use crate::game::session::PlayerId;
use crate::game::state::World;

/// Game meaning of a contact pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContactKind {
    /// Two cores overlap; no effect
    CoreCore(EntityId, EntityId),
    /// A core and a guard (possibly its own)
    CoreGuard {
        /// The core
        core: EntityId,
        /// The guard
        guard: EntityId,
    },
    /// Anything involving a wall, or guard-guard
    Other,
}

/// Classify a contact pair by the roles of its two bodies.
pub fn classify(registry: &EntityRegistry, pair: ContactPair) -> ContactKind {
    match (registry.resolve(pair.a), registry.resolve(pair.b)) {
        (Some(EntityRef::Core(a)), Some(EntityRef::Core(b))) => ContactKind::CoreCore(a, b),
        (Some(EntityRef::Core(core)), Some(EntityRef::Guard(guard)))
        | (Some(EntityRef::Guard(guard)), Some(EntityRef::Core(core))) => {
            ContactKind::CoreGuard { core, guard }
        }
        _ => ContactKind::Other,
    }
}

/// Check whether `guard` touching `core` kills the core.
///
/// Both must be alive and active, on different teams, the core must be past
/// its spawn protection, and the round must still be running.
pub fn is_lethal(core: &Core, guard: &Guard, safe_time_ms: f64, game_over: bool) -> bool {
    if !core.alive || !core.active || !guard.alive || !guard.active {
        return false;
    }
    if core.team == guard.team || game_over {
        return false;
    }
    core.age_ms > safe_time_ms
}

/// Half of the victim's score, never negative.
#[inline]
pub fn transfer_amount(victim_score: f64) -> f64 {
    (victim_score * 0.5).max(0.0)
}

/// Outcome of a lethal contact.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Kill {
    /// Dead core
    pub core_id: EntityId,
    /// Guard that killed it
    pub guard_id: EntityId,
    /// Core owner
    pub victim: Option<PlayerId>,
    /// Guard owner
    pub killer: Option<PlayerId>,
    /// Score moved from victim to killer
    pub transferred: f64,
}

/// Kill a core because `guard_id` touched it, moving half the victim's
/// score to the guard's owner.
fn apply_kill(
    world: &mut World,
    physics: &mut dyn Physics,
    core_id: EntityId,
    guard_id: EntityId,
) -> Kill {
    let victim = world.entities.core(core_id).and_then(|c| c.player_id);
    let killer = world.entities.guard(guard_id).and_then(|g| g.player_id);

    world.kill_core(core_id, physics);

    let mut transferred = 0.0;
    if let (Some(victim_id), Some(killer_id)) = (victim, killer) {
        let amount = world
            .sessions
            .get(&victim_id)
            .map(|p| transfer_amount(p.score))
            .unwrap_or(0.0);

        if amount > 0.0 && world.sessions.get(&killer_id).is_some() {
            if let Some(p) = world.sessions.get_mut(&victim_id) {
                p.score -= amount;
            }
            if let Some(p) = world.sessions.get_mut(&killer_id) {
                p.score += amount;
            }
            transferred = amount;
        }
    }

    Kill { core_id, guard_id, victim, killer, transferred }
}

/// Resolve this tick's new contacts in the order physics reported them.
pub fn resolve_contacts(
    world: &mut World,
    physics: &mut dyn Physics,
    contacts: &[ContactPair],
) -> Vec<Kill> {
    let mut kills = Vec::new();

    for &pair in contacts {
        let ContactKind::CoreGuard { core, guard } = classify(&world.entities, pair) else {
            continue;
        };

        let lethal = match (world.entities.core(core), world.entities.guard(guard)) {
            (Some(c), Some(g)) => {
                is_lethal(c, g, world.round.safe_time_ms, world.round.game_over)
            }
            _ => false,
        };
        if !lethal {
            continue;
        }

        let kill = apply_kill(world, physics, core, guard);
        info!(
            core_id = kill.core_id,
            guard_id = kill.guard_id,
            transferred = kill.transferred,
            "Core killed"
        );
        world.push_event(GameEvent::core_killed(
            world.tick,
            kill.core_id,
            kill.guard_id,
            kill.victim,
            kill.killer,
            kill.transferred,
        ));
        kills.push(kill);
    }

    kills
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArenaConfig;
    use crate::core::physics::EulerPhysics;
    use crate::game::session::JoinOutcome;

    /// One core per team, both joined, clock past safe time.
    fn duel() -> (World, EulerPhysics, PlayerId, PlayerId) {
        let config = ArenaConfig { cores_per_team: 1, ..Default::default() };
        let mut physics = EulerPhysics::new();
        let mut world = World::new(config, &mut physics);

        let a = PlayerId::new();
        let b = PlayerId::new();
        world.connect(a);
        world.connect(b);
        assert!(matches!(world.join(&a, "a", &mut physics), JoinOutcome::Joined { .. }));
        assert!(matches!(world.join(&b, "b", &mut physics), JoinOutcome::Joined { .. }));
        (world, physics, a, b)
    }

    fn pair_of(world: &World, core: EntityId, guard: EntityId) -> ContactPair {
        ContactPair::new(
            world.entities.core(core).unwrap().body,
            world.entities.guard(guard).unwrap().body,
        )
    }

    #[test]
    fn test_classify() {
        let (world, _, _, _) = duel();
        let core_a = world.entities.core(0).unwrap().body;
        let core_b = world.entities.core(1).unwrap().body;
        let guard_b = world.entities.guard(1).unwrap().body;
        let wall = world.entities.walls()[0].body;

        assert_eq!(classify(&world.entities, ContactPair::new(core_a, core_b)), ContactKind::CoreCore(0, 1));
        assert_eq!(
            classify(&world.entities, ContactPair::new(guard_b, core_a)),
            ContactKind::CoreGuard { core: 0, guard: 1 }
        );
        assert_eq!(classify(&world.entities, ContactPair::new(core_a, wall)), ContactKind::Other);
    }

    #[test]
    fn test_safe_time_protects_core() {
        let (mut world, mut physics, _, _) = duel();
        world.entities.core_mut(0).unwrap().age_ms = 0.0;

        let contact = pair_of(&world, 0, 1);
        let kills = resolve_contacts(&mut world, &mut physics, &[contact, contact]);

        assert!(kills.is_empty());
        assert!(world.entities.core(0).unwrap().alive);
    }

    #[test]
    fn test_expired_safe_time_kills_and_transfers_half() {
        let (mut world, mut physics, a, b) = duel();
        world.sessions.get_mut(&a).unwrap().score = 30.0;
        world.sessions.get_mut(&b).unwrap().score = 5.0;
        world.entities.core_mut(0).unwrap().age_ms = world.config.safe_time_ms + 1.0;

        let contact = pair_of(&world, 0, 1);
        let kills = resolve_contacts(&mut world, &mut physics, &[contact]);

        assert_eq!(kills.len(), 1);
        assert_eq!(kills[0].victim, Some(a));
        assert_eq!(kills[0].killer, Some(b));
        assert_eq!(kills[0].transferred, 15.0);

        assert_eq!(world.sessions.get(&a).unwrap().score, 15.0);
        assert_eq!(world.sessions.get(&b).unwrap().score, 20.0);
        assert!(!world.sessions.get(&a).unwrap().alive);
        assert!(!world.entities.core(0).unwrap().alive);
        assert!(!world.entities.guard(0).unwrap().alive);
        assert_eq!(physics.velocity(world.entities.core(0).unwrap().body), crate::core::vec2::Vec2::ZERO);
    }

    #[test]
    fn test_dead_core_cannot_die_twice() {
        let (mut world, mut physics, a, _) = duel();
        world.sessions.get_mut(&a).unwrap().score = 40.0;
        world.entities.core_mut(0).unwrap().age_ms = 10_000.0;

        let contact = pair_of(&world, 0, 1);
        let kills = resolve_contacts(&mut world, &mut physics, &[contact, contact]);

        assert_eq!(kills.len(), 1);
        assert_eq!(world.sessions.get(&a).unwrap().score, 20.0);
    }

    #[test]
    fn test_same_team_guard_is_harmless() {
        let (mut world, mut physics, _, _) = duel();
        world.entities.core_mut(0).unwrap().age_ms = 10_000.0;

        let contact = pair_of(&world, 0, 0);
        let kills = resolve_contacts(&mut world, &mut physics, &[contact]);

        assert!(kills.is_empty());
        assert!(world.entities.core(0).unwrap().alive);
    }

    #[test]
    fn test_no_death_when_game_over_or_inactive() {
        let (mut world, mut physics, _, b) = duel();
        world.entities.core_mut(0).unwrap().age_ms = 10_000.0;
        let contact = pair_of(&world, 0, 1);

        world.round.game_over = true;
        assert!(resolve_contacts(&mut world, &mut physics, &[contact]).is_empty());

        world.round.game_over = false;
        world.disconnect(&b);
        assert!(resolve_contacts(&mut world, &mut physics, &[contact]).is_empty());
        assert!(world.entities.core(0).unwrap().alive);
    }

    #[test]
    fn test_transfer_amount_never_negative() {
        assert_eq!(transfer_amount(10.0), 5.0);
        assert_eq!(transfer_amount(0.0), 0.0);
        assert_eq!(transfer_amount(-4.0), 0.0);
    }
}
