//! World State
//!
//! The one mutable world the simulation runs on: entities, players, round
//! state and the simulation clock. Passed by reference into the tick and
//! session operations; there is no global state.

use serde::{Serialize, Deserialize};

use crate::config::ArenaConfig;
use crate::core::physics::Physics;
use crate::game::entity::{EntityId, EntityRegistry, Team};
use crate::game::events::GameEvent;
use crate::game::map::{arena_walls, team_home};
use crate::game::session::SessionManager;

// =============================================================================
// ROUND STATE
// =============================================================================

/// Match/round bookkeeping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundState {
    /// Rounded per-team totals, index 0 = team 1
    pub scores: [i64; 2],
    /// Threshold that ends the round
    pub goal: i64,
    /// Round over, waiting for the countdown
    pub game_over: bool,
    /// Seconds until reset (meaningful while `game_over`)
    pub countdown: f64,
    /// Spawn invincibility (ms)
    pub safe_time_ms: f64,
    /// Duration of the last step (s)
    pub dt: f64,
    /// Central-zone radius of the last tick; `None` when no core is live
    pub zone_radius: Option<f64>,
    /// Rounds completed since start
    pub rounds_played: u64,
}

impl RoundState {
    /// Fresh round from config.
    pub fn new(config: &ArenaConfig) -> Self {
        Self {
            scores: [0; 2],
            goal: config.goal,
            game_over: false,
            countdown: config.countdown_secs,
            safe_time_ms: config.safe_time_ms,
            dt: 0.0,
            zone_radius: None,
            rounds_played: 0,
        }
    }

    /// Team that has reached the goal, if any. Ties go to the higher score,
    /// then to team 1.
    pub fn leader_at_goal(&self) -> Option<Team> {
        let [one, two] = self.scores;
        if one < self.goal && two < self.goal {
            None
        } else if two > one {
            Some(Team::Two)
        } else {
            Some(Team::One)
        }
    }
}

// =============================================================================
// WORLD
// =============================================================================

/// Complete simulation state.
#[derive(Clone, Debug)]
pub struct World {
    /// Gameplay constants
    pub config: ArenaConfig,

    /// Cores, guards, walls
    pub entities: EntityRegistry,

    /// Players
    pub sessions: SessionManager,

    /// Round state
    pub round: RoundState,

    /// Ticks simulated
    pub tick: u64,

    /// Simulation clock (ms since world creation)
    pub clock_ms: f64,

    /// Events generated since the last `take_events`
    pending_events: Vec<GameEvent>,
}

impl World {
    /// Build the arena: walls first, then core/guard pairs alternating
    /// team 1, team 2.
    pub fn new(config: ArenaConfig, physics: &mut dyn Physics) -> Self {
        let mut entities = EntityRegistry::new();

        for spec in arena_walls(&config) {
            entities.create_wall(spec, physics);
        }

        for _ in 0..config.cores_per_team {
            for team in Team::ALL {
                entities.create_pair(team, team_home(&config, team), &config, physics);
            }
        }

        Self {
            round: RoundState::new(&config),
            config,
            entities,
            sessions: SessionManager::new(),
            tick: 0,
            clock_ms: 0.0,
            pending_events: Vec::new(),
        }
    }

    /// Respawn a core/guard pair at its team home with a fresh birth time.
    pub fn spawn_core(&mut self, core_id: EntityId, physics: &mut dyn Physics) {
        let Some(team) = self.entities.core(core_id).map(|c| c.team) else {
            return;
        };
        let home = team_home(&self.config, team);
        self.entities.spawn_pair(core_id, home, self.clock_ms, physics);
    }

    /// Kill a core/guard pair and mark its player dead.
    pub fn kill_core(&mut self, core_id: EntityId, physics: &mut dyn Physics) {
        let owner = self.entities.core(core_id).and_then(|c| c.player_id);
        self.entities.kill_pair(core_id, physics);

        if let Some(player) = owner.and_then(|id| self.sessions.get_mut(&id)) {
            player.alive = false;
        }
    }

    /// Unrounded sum of a team's player scores.
    pub fn raw_team_score(&self, team: Team) -> f64 {
        self.sessions
            .iter()
            .filter(|p| p.team == Some(team))
            .map(|p| p.score)
            .sum()
    }

    /// Recompute the rounded per-team scores from player scores.
    pub fn recompute_team_scores(&mut self) {
        for team in Team::ALL {
            self.round.scores[team.index()] = self.raw_team_score(team).round() as i64;
        }
    }

    /// Reset the round.
    ///
    /// Scores go to zero, every player is detached and must join again,
    /// every pair respawns at home, and players whose connection is gone are
    /// dropped. Returns how many players were dropped.
    pub fn reset_round(&mut self, physics: &mut dyn Physics) -> usize {
        for player in self.sessions.iter_mut() {
            player.score = 0.0;
            player.joined = false;
            player.alive = false;
            player.team = None;
            player.core_id = None;
            player.guard_id = None;
        }

        let core_ids: Vec<EntityId> = self.entities.cores().iter().map(|c| c.id).collect();
        for core_id in core_ids {
            self.entities.detach(core_id);
            self.spawn_core(core_id, physics);
        }

        let purged = self.sessions.purge_disconnected();

        self.round.scores = [0; 2];
        self.round.game_over = false;
        self.round.countdown = self.config.countdown_secs;
        self.round.zone_radius = None;
        self.round.rounds_played += 1;
        purged
    }

    /// Take pending events (consumes them), ordered by tick then priority.
    ///
    /// Events with the same key keep the order they were pushed in.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        let mut events = std::mem::take(&mut self.pending_events);
        events.sort_by_key(GameEvent::order_key);
        events
    }

    /// Push a game event.
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }
}

// =============================================================================
// TESTS
// =============================================================================
