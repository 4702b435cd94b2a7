//! Rules Engine Tick
//!
//! One simulation step. The caller drains queued session commands before
//! calling [`tick`], so nothing external interleaves with these steps:
//!
//! 1. Forces: player intent on cores, spring-to-core on guards
//! 2. Physics step, positions cached
//! 3. Age and score accrual
//! 4. Central-zone update
//! 5. Contact resolution (deaths, score transfer)
//! 6. Round lifecycle (goal, countdown, reset)

use tracing::{debug, info};

use crate::core::physics::Physics;
use crate::core::vec2::Vec2;
use crate::game::collision::resolve_contacts;
use crate::game::entity::Team;
use crate::game::events::GameEvent;
use crate::game::state::World;
use crate::game::zone::update_central;

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick (including queued session events)
    pub events: Vec<GameEvent>,
    /// A team reached the goal this tick
    pub round_ended: bool,
    /// The countdown expired and the arena was reset this tick
    pub round_reset: bool,
    /// Winning team, when `round_ended`
    pub winner: Option<Team>,
    /// Step duration actually simulated (s)
    pub dt: f64,
}

/// Clamp a measured step to something the integrator can take.
pub fn sanitize_dt(dt: f64, max_step: f64) -> f64 {
    if dt.is_finite() && dt > 0.0 {
        dt.min(max_step)
    } else {
        0.0
    }
}

/// Run one simulation tick of `dt` seconds.
pub fn tick(world: &mut World, physics: &mut dyn Physics, dt: f64) -> TickResult {
    let mut result = TickResult::default();

    let dt = sanitize_dt(dt, world.config.max_step_secs);
    world.tick += 1;
    world.clock_ms += dt * 1000.0;
    world.round.dt = dt;
    result.dt = dt;

    // 1. Forces
    apply_forces(world, physics);

    // 2. Physics
    let contacts = physics.step(dt, &world.entities);
    world.entities.sync_from_physics(physics);

    // 3. Age and score
    accrue(world, dt);

    // 4. Central zone
    world.round.zone_radius = update_central(world.entities.cores_mut(), world.config.zone_cap_radius);

    // 5. Contacts
    resolve_contacts(world, physics, &contacts);

    // 6. Round lifecycle
    advance_round(world, physics, dt, &mut result);

    result.events = world.take_events();
    result
}

/// Core intent forces and guard spring forces.
fn apply_forces(world: &mut World, physics: &mut dyn Physics) {
    let game_over = world.round.game_over;
    let core_force = world.config.core_force;
    let attraction = world.config.guard_attraction;

    if !game_over {
        for core in world.entities.cores().iter().filter(|c| c.alive && c.active) {
            let Some(player) = core.player_id.and_then(|id| world.sessions.get(&id)) else {
                continue;
            };
            let intent = player.intent();
            if intent == Vec2::ZERO {
                continue;
            }
            let position = physics.position(core.body);
            physics.apply_force(core.body, position, intent * core_force);
        }
    }

    for guard in world.entities.guards().iter().filter(|g| g.alive && g.active) {
        let Some(core) = world.entities.core(guard.core_id) else {
            continue;
        };
        let guard_pos = physics.position(guard.body);
        let displacement = physics.position(core.body) - guard_pos;
        physics.apply_force(guard.body, guard_pos, displacement * attraction);
    }
}

/// Update ages and pay central cores.
fn accrue(world: &mut World, dt: f64) {
    let now = world.clock_ms;
    let paying = !world.round.game_over;
    let gain = world.config.score_rate * dt;

    let mut earners = Vec::new();
    for core in world.entities.cores_mut().iter_mut().filter(|c| c.active) {
        core.age_ms = now - core.birth_ms;
        if paying && core.central {
            if let Some(id) = core.player_id {
                earners.push(id);
            }
        }
    }
    for guard in world.entities.guards_mut().iter_mut().filter(|g| g.active) {
        guard.age_ms = now - guard.birth_ms;
    }

    for id in earners {
        if let Some(player) = world.sessions.get_mut(&id) {
            player.score += gain;
        }
    }
}

/// Detect the goal or count down to reset.
fn advance_round(world: &mut World, physics: &mut dyn Physics, dt: f64, result: &mut TickResult) {
    if world.round.game_over {
        world.round.countdown = (world.round.countdown - dt).max(0.0);
        if world.round.countdown <= 0.0 {
            let purged = world.reset_round(physics);
            info!(purged, rounds = world.round.rounds_played, "Round reset");
            world.push_event(GameEvent::round_reset(world.tick, purged));
            result.round_reset = true;
        }
        return;
    }

    world.recompute_team_scores();
    if let Some(team) = world.round.leader_at_goal() {
        world.round.game_over = true;
        world.round.countdown = world.config.countdown_secs;
        info!(team = team.number(), scores = ?world.round.scores, "Round won");
        world.push_event(GameEvent::round_won(world.tick, team, world.round.scores));
        result.round_ended = true;
        result.winner = Some(team);
    } else {
        debug!(tick = world.tick, scores = ?world.round.scores, "Tick");
    }
}

// =============================================================================
// TESTS
// =============================================================================
