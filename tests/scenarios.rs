//! End-to-end round scenarios driven through the public API.

mod common;

use common::{arena, duel_config, DT};
use coreguard::config::ArenaConfig;
use coreguard::core::physics::{ContactPair, Physics};
use coreguard::core::vec2::Vec2;
use coreguard::game::entity::Team;
use coreguard::game::events::GameEventData;
use coreguard::game::input::InputFrame;
use coreguard::game::session::{JoinOutcome, PlayerId};
use coreguard::game::tick::tick;
use coreguard::network::snapshot::build_snapshot;

#[test]
fn test_holding_centre_wins_then_round_resets() {
    let config = ArenaConfig { score_rate: 10.0, countdown_secs: 2.0, ..duel_config() };
    let (mut world, mut physics, ids) = arena(config, 2);
    let core_body = world.entities.core(0).unwrap().body;
    physics.set_position(core_body, Vec2::ZERO);

    let mut winner = None;
    let mut ended_at = None;
    for n in 1..=700u64 {
        let result = tick(&mut world, &mut physics, DT);
        if result.round_ended {
            winner = result.winner;
            ended_at = Some(n);
            break;
        }
    }

    // 10 points a second to a goal of 100: about ten seconds at 60 Hz
    let ended_at = ended_at.expect("round should have ended");
    assert!((590..=605).contains(&ended_at), "round ended at tick {ended_at}");
    assert_eq!(winner, Some(Team::One));
    assert!(world.round.game_over);
    assert!(world.round.scores[0] >= 100);
    assert_eq!(world.round.scores[1], 0);
    assert_eq!(world.round.countdown, 2.0);

    // Everyone's view freezes while the countdown runs
    let frozen = build_snapshot(&world, &ids[0]);
    assert!(frozen.game_over);
    assert!(frozen.cores.iter().all(|c| c.combat.is_none()));

    let mut reset = false;
    for _ in 0..150 {
        if tick(&mut world, &mut physics, DT).round_reset {
            reset = true;
            break;
        }
    }

    // Two second countdown
    assert!(reset);
    assert!((119..=121).contains(&(world.tick - ended_at)), "reset {} ticks after the win", world.tick - ended_at);
    assert!(!world.round.game_over);
    assert_eq!(world.round.scores, [0, 0]);
    assert_eq!(world.round.rounds_played, 1);
    for id in &ids {
        let player = world.sessions.get(id).unwrap();
        assert_eq!(player.score, 0.0);
        assert!(!player.joined);
        assert_eq!(player.team, None);
    }
    assert_eq!(world.entities.core(0).unwrap().position, Vec2::new(0.0, -800.0));
}

#[test]
fn test_safe_time_then_kill_then_respawn() {
    let config = ArenaConfig { score_rate: 0.0, ..duel_config() };
    let (mut world, mut physics, ids) = arena(config, 2);
    let (a, b) = (ids[0], ids[1]);
    world.sessions.get_mut(&a).unwrap().score = 50.0;
    world.sessions.get_mut(&b).unwrap().score = 10.0;

    let enemy_guard = world.entities.guard(1).unwrap().body;

    // Fresh spawn: touching is harmless
    let target = world.entities.core(0).unwrap().position;
    physics.set_position(enemy_guard, target);
    tick(&mut world, &mut physics, DT);
    assert!(world.entities.core(0).unwrap().alive);

    physics.set_position(enemy_guard, Vec2::new(500.0, 0.0));
    for _ in 0..250 {
        tick(&mut world, &mut physics, DT);
    }
    assert!(world.entities.core(0).unwrap().age_ms > world.config.safe_time_ms);
    assert!(world.entities.core(0).unwrap().alive);

    // Protection expired: a new touch kills
    let target = world.entities.core(0).unwrap().position;
    physics.set_position(enemy_guard, target);
    let result = tick(&mut world, &mut physics, DT);

    let kill = result
        .events
        .iter()
        .find_map(|e| match &e.data {
            GameEventData::CoreKilled { victim, killer, transferred, .. } => {
                Some((*victim, *killer, *transferred))
            }
            _ => None,
        })
        .expect("core should have been killed");
    assert_eq!(kill, (Some(a), Some(b), 25.0));

    assert!(!world.entities.core(0).unwrap().alive);
    assert!(!world.entities.guard(0).unwrap().alive);
    assert!(!world.sessions.get(&a).unwrap().alive);
    assert_eq!(world.sessions.get(&a).unwrap().score, 25.0);
    assert_eq!(world.sessions.get(&b).unwrap().score, 35.0);

    // Dead stays dead without a respawn request
    for _ in 0..120 {
        tick(&mut world, &mut physics, DT);
    }
    assert!(!world.entities.core(0).unwrap().alive);
    assert!(build_snapshot(&world, &a).cores.iter().all(|c| c.combat.is_none()));

    let respawned = world.submit_input(&a, InputFrame::new().with_respawn(true), None, &mut physics);
    assert!(respawned);
    tick(&mut world, &mut physics, DT);

    let core = world.entities.core(0).unwrap();
    assert!(core.alive && core.active);
    assert!(core.age_ms < world.config.safe_time_ms);
    assert!(world.sessions.get(&a).unwrap().alive);
    assert!(build_snapshot(&world, &a).cores.iter().all(|c| c.combat.is_some()));
}

#[test]
fn test_disconnect_frees_core_for_next_joiner() {
    let (mut world, mut physics, ids) = arena(duel_config(), 2);
    let late = PlayerId::new();
    world.connect(late);

    assert_eq!(world.join(&late, "late", &mut physics), JoinOutcome::NoFreeCore);
    assert!(!world.sessions.get(&late).unwrap().joined);

    world.sessions.get_mut(&ids[0]).unwrap().score = 12.0;
    assert!(world.disconnect(&ids[0]));
    assert!(world.disconnect(&ids[0]));
    assert!(!world.entities.core(0).unwrap().active);

    assert_eq!(
        world.join(&late, "late", &mut physics),
        JoinOutcome::Joined { core_id: 0, team: Team::One }
    );

    // The departed player stays on the scoreboard until reset
    tick(&mut world, &mut physics, DT);
    let roster = build_snapshot(&world, &late).players;
    let gone = roster.iter().find(|p| p.id == ids[0]).unwrap();
    assert!(!gone.connected);
    assert_eq!(gone.score, 12);

    world.round.game_over = true;
    world.round.countdown = 0.01;
    let result = tick(&mut world, &mut physics, DT);

    assert!(result.round_reset);
    assert!(result
        .events
        .iter()
        .any(|e| e.data == GameEventData::RoundReset { purged_players: 1 }));
    assert!(world.sessions.get(&ids[0]).is_none());
    assert!(world.sessions.get(&late).is_some());
    assert!(world.entities.cores().iter().all(|c| c.alive && c.player_id.is_none()));
}

#[test]
fn test_enemy_core_contact_is_harmless_and_passes_through() {
    let (mut world, mut physics, _) = arena(duel_config(), 2);
    for _ in 0..300 {
        tick(&mut world, &mut physics, DT);
    }

    let a = world.entities.core(0).unwrap().body;
    let b = world.entities.core(1).unwrap().body;
    physics.set_position(a, Vec2::new(0.0, 0.0));
    physics.set_position(b, Vec2::new(10.0, 0.0));

    tick(&mut world, &mut physics, DT);

    assert!(world.entities.core(0).unwrap().alive);
    assert!(world.entities.core(1).unwrap().alive);
    // Touching, but no push-apart between cores
    assert!(physics.touching_pairs().any(|p| *p == ContactPair::new(a, b)));
    assert_eq!(physics.velocity(a), Vec2::ZERO);
    assert_eq!(physics.velocity(b), Vec2::ZERO);
}
