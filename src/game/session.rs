//! Session Manager
//!
//! Players are connection-scoped: created on connect, bound to a core/guard
//! pair on join, detached on disconnect or round reset, and destroyed only at
//! the round reset after their connection is gone.
//!
//! All operations are total. An unknown player id is ignored and reported
//! through the return value, never as an error.

use std::collections::BTreeMap;
use std::fmt;
use serde::{Serialize, Deserialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::physics::Physics;
use crate::core::vec2::Vec2;
use crate::game::entity::{EntityId, Team};
use crate::game::events::GameEvent;
use crate::game::input::InputFrame;
use crate::game::state::World;

// =============================================================================
// PLAYER ID
// =============================================================================

/// Player identifier; equal to the connection id.
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// PLAYER
// =============================================================================

/// A connected (or recently connected) player.
#[derive(Clone, Debug, PartialEq)]
pub struct Player {
    /// Connection id
    pub id: PlayerId,
    /// Display name
    pub name: String,
    /// Assigned when attached; `None` means unassigned (0 on the wire)
    pub team: Option<Team>,
    /// Real-valued score, rounded only for display
    pub score: f64,
    /// Connection still open
    pub connected: bool,
    /// Attached through a join since the last reset
    pub joined: bool,
    /// Bound core is alive
    pub alive: bool,
    /// Bound core
    pub core_id: Option<EntityId>,
    /// Bound guard
    pub guard_id: Option<EntityId>,
    /// Latest input
    pub input: InputFrame,
}

impl Player {
    /// Unattached player with zero score.
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            name: String::new(),
            team: None,
            score: 0.0,
            connected: true,
            joined: false,
            alive: false,
            core_id: None,
            guard_id: None,
            input: InputFrame::new(),
        }
    }

    /// Team as a wire number, 0 when unassigned.
    #[inline]
    pub fn team_number(&self) -> u8 {
        self.team.map(Team::number).unwrap_or(0)
    }

    /// Current unit movement intent.
    #[inline]
    pub fn intent(&self) -> Vec2 {
        self.input.intent()
    }

    /// Score as shown to clients.
    #[inline]
    pub fn rounded_score(&self) -> i64 {
        self.score.round() as i64
    }
}

/// Trim a display name and cut it to `max_chars` characters.
pub fn clamp_name(name: &str, max_chars: usize) -> String {
    name.trim().chars().take(max_chars).collect()
}

// =============================================================================
// PLAYER TABLE
// =============================================================================

/// Owner of all `Player` records (BTreeMap for deterministic iteration).
#[derive(Clone, Debug, Default)]
pub struct SessionManager {
    players: BTreeMap<PlayerId, Player>,
}

impl SessionManager {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a player by ID.
    pub fn get(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    /// Get a player mutably by ID.
    pub fn get_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    /// Players in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Players in id order, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.values_mut()
    }

    /// Number of player records, connected or not.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Check if there are no players.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Drop every disconnected player. Returns how many were dropped.
    pub fn purge_disconnected(&mut self) -> usize {
        let before = self.players.len();
        self.players.retain(|_, p| p.connected);
        before - self.players.len()
    }
}

// =============================================================================
// SESSION OPERATIONS
// =============================================================================

/// Result of a join request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Attached to a fresh core/guard pair
    Joined {
        /// Core assigned
        core_id: EntityId,
        /// Team of that core
        team: Team,
    },
    /// Already attached; nothing changed but the name
    AlreadyJoined {
        /// Core the player holds
        core_id: EntityId,
    },
    /// Every core is taken; the player stays in the lobby
    NoFreeCore,
    /// No such (connected) player
    UnknownPlayer,
}

impl World {
    /// Register a new connection. Returns the (possibly existing) player.
    pub fn connect(&mut self, id: PlayerId) -> &Player {
        let player = self.sessions.players.entry(id).or_insert_with(|| {
            debug!(player = %id, "Player connected");
            Player::new(id)
        });
        player.connected = true;
        player
    }

    /// Mark a connection gone and free its core/guard pair.
    ///
    /// The record, team and score stay until the next round reset. Safe to
    /// call repeatedly. Returns false for an unknown player.
    pub fn disconnect(&mut self, id: &PlayerId) -> bool {
        let tick = self.tick;
        let Some(player) = self.sessions.get_mut(id) else {
            return false;
        };

        let was_connected = player.connected;
        player.connected = false;
        player.joined = false;
        player.alive = false;
        player.guard_id = None;
        let core_id = player.core_id.take();

        if let Some(core_id) = core_id {
            self.entities.detach(core_id);
        }

        if was_connected {
            info!(player = %id, ?core_id, "Player disconnected");
            self.push_event(GameEvent::player_disconnected(tick, *id));
        }
        true
    }

    /// Attach a player to the first free core/guard pair and spawn it.
    pub fn join(&mut self, id: &PlayerId, name: &str, physics: &mut dyn Physics) -> JoinOutcome {
        let max_name = self.config.max_name_length;
        let Some(player) = self.sessions.get_mut(id).filter(|p| p.connected) else {
            return JoinOutcome::UnknownPlayer;
        };

        let name = clamp_name(name, max_name);

        if let Some(core_id) = player.core_id {
            if !name.is_empty() {
                player.name = name;
            }
            return JoinOutcome::AlreadyJoined { core_id };
        }

        // No free core leaves the player untouched
        let Some(core_id) = self.entities.find_free_core() else {
            info!(player = %id, "Join rejected: no free core");
            return JoinOutcome::NoFreeCore;
        };

        let Some((team, guard_id)) = self.entities.attach(core_id, *id) else {
            return JoinOutcome::NoFreeCore;
        };
        self.spawn_core(core_id, physics);

        if let Some(player) = self.sessions.get_mut(id) {
            if !name.is_empty() {
                player.name = name;
            }
            player.team = Some(team);
            player.core_id = Some(core_id);
            player.guard_id = Some(guard_id);
            player.joined = true;
            player.alive = true;
            info!(player = %id, name = %player.name, core_id, team = team.number(), "Player joined");
        }

        self.push_event(GameEvent::player_joined(self.tick, *id, core_id, team));
        JoinOutcome::Joined { core_id, team }
    }

    /// Store the latest input. A respawn request revives a dead bound core.
    ///
    /// Returns true if a respawn happened.
    pub fn submit_input(
        &mut self,
        id: &PlayerId,
        input: InputFrame,
        name: Option<&str>,
        physics: &mut dyn Physics,
    ) -> bool {
        let max_name = self.config.max_name_length;
        let Some(player) = self.sessions.get_mut(id).filter(|p| p.connected) else {
            return false;
        };

        player.input = input;
        if let Some(name) = name.map(|n| clamp_name(n, max_name)).filter(|n| !n.is_empty()) {
            player.name = name;
        }

        let Some(core_id) = player.core_id else {
            return false;
        };
        let core_dead = self.entities.core(core_id).is_some_and(|c| !c.alive);
        if !(core_dead && input.respawn_requested()) {
            return false;
        }

        self.spawn_core(core_id, physics);
        if let Some(player) = self.sessions.get_mut(id) {
            player.alive = true;
        }
        debug!(player = %id, core_id, "Player respawned");
        self.push_event(GameEvent::player_respawned(self.tick, *id, core_id));
        true
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArenaConfig;
    use crate::core::physics::EulerPhysics;
    use crate::game::events::GameEventData;

    fn small_world() -> (World, EulerPhysics) {
        let config = ArenaConfig { cores_per_team: 1, ..Default::default() };
        let mut physics = EulerPhysics::new();
        let world = World::new(config, &mut physics);
        (world, physics)
    }

    #[test]
    fn test_connect_creates_unattached_player() {
        let (mut world, _) = small_world();
        let id = PlayerId::new();

        let player = world.connect(id);
        assert!(player.connected);
        assert!(!player.joined);
        assert_eq!(player.score, 0.0);
        assert_eq!(player.team_number(), 0);
        assert_eq!(player.core_id, None);
    }

    #[test]
    fn test_join_attaches_in_order_and_alternates_teams() {
        let (mut world, mut physics) = small_world();
        let a = PlayerId::new();
        let b = PlayerId::new();
        let c = PlayerId::new();
        world.connect(a);
        world.connect(b);
        world.connect(c);

        assert_eq!(world.join(&a, "alice", &mut physics), JoinOutcome::Joined { core_id: 0, team: Team::One });
        assert_eq!(world.join(&b, "bob", &mut physics), JoinOutcome::Joined { core_id: 1, team: Team::Two });
        assert_eq!(world.join(&c, "carol", &mut physics), JoinOutcome::NoFreeCore);

        let alice = world.sessions.get(&a).unwrap();
        assert!(alice.joined && alice.alive);
        assert_eq!(alice.name, "alice");
        assert_eq!(world.entities.core(0).unwrap().player_id, Some(a));
        assert_eq!(world.entities.guard(0).unwrap().player_id, Some(a));

        let carol = world.sessions.get(&c).unwrap();
        assert!(!carol.joined);
        assert_eq!(carol.team, None);
    }

    #[test]
    fn test_join_twice_keeps_core() {
        let (mut world, mut physics) = small_world();
        let a = PlayerId::new();
        world.connect(a);

        world.join(&a, "a", &mut physics);
        let outcome = world.join(&a, "renamed", &mut physics);

        assert_eq!(outcome, JoinOutcome::AlreadyJoined { core_id: 0 });
        assert_eq!(world.sessions.get(&a).unwrap().name, "renamed");
        assert_eq!(world.entities.find_free_core(), Some(1));
    }

    #[test]
    fn test_rejected_join_keeps_name() {
        let (mut world, mut physics) = small_world();
        let ids: Vec<PlayerId> = (0..3).map(|_| PlayerId::new()).collect();
        for id in &ids {
            world.connect(*id);
        }
        world.join(&ids[0], "a", &mut physics);
        world.join(&ids[1], "b", &mut physics);

        assert_eq!(world.join(&ids[2], "late", &mut physics), JoinOutcome::NoFreeCore);

        let late = world.sessions.get(&ids[2]).unwrap();
        assert_eq!(late.name, "");
        assert!(!late.joined);
    }

    #[test]
    fn test_unknown_player_ignored() {
        let (mut world, mut physics) = small_world();
        let ghost = PlayerId::new();

        assert_eq!(world.join(&ghost, "x", &mut physics), JoinOutcome::UnknownPlayer);
        assert!(!world.disconnect(&ghost));
        assert!(!world.submit_input(&ghost, InputFrame::new().with_respawn(true), None, &mut physics));
        assert!(world.sessions.is_empty());
    }

    #[test]
    fn test_disconnect_frees_core_and_keeps_score() {
        let (mut world, mut physics) = small_world();
        let a = PlayerId::new();
        world.connect(a);
        world.join(&a, "a", &mut physics);
        world.sessions.get_mut(&a).unwrap().score = 12.5;

        assert!(world.disconnect(&a));
        assert!(world.disconnect(&a));

        let player = world.sessions.get(&a).unwrap();
        assert!(!player.connected);
        assert_eq!(player.score, 12.5);
        assert_eq!(player.team, Some(Team::One));
        assert_eq!(player.core_id, None);
        assert!(!world.entities.core(0).unwrap().active);
        assert!(!world.entities.guard(0).unwrap().active);
        assert_eq!(world.entities.find_free_core(), Some(0));

        // Only one disconnect event despite two calls
        let disconnects = world
            .take_events()
            .into_iter()
            .filter(|e| matches!(e.data, GameEventData::PlayerDisconnected { .. }))
            .count();
        assert_eq!(disconnects, 1);

        // A disconnected player cannot join
        assert_eq!(world.join(&a, "a", &mut physics), JoinOutcome::UnknownPlayer);
    }

    #[test]
    fn test_respawn_only_when_dead_and_requested() {
        let (mut world, mut physics) = small_world();
        let a = PlayerId::new();
        world.connect(a);
        world.join(&a, "a", &mut physics);

        // Alive: respawn flag does nothing
        assert!(!world.submit_input(&a, InputFrame::new().with_respawn(true), None, &mut physics));

        world.clock_ms = 9000.0;
        world.kill_core(0, &mut physics);
        assert!(!world.sessions.get(&a).unwrap().alive);

        // Dead without request: stays dead
        assert!(!world.submit_input(&a, InputFrame::from_keys(true, false, false, false), None, &mut physics));
        assert!(!world.entities.core(0).unwrap().alive);

        // Dead with request: respawns with fresh birth time
        assert!(world.submit_input(&a, InputFrame::new().with_respawn(true), None, &mut physics));
        let core = world.entities.core(0).unwrap();
        assert!(core.alive);
        assert_eq!(core.birth_ms, 9000.0);
        assert!(world.entities.guard(0).unwrap().alive);
        assert!(world.sessions.get(&a).unwrap().alive);
    }

    #[test]
    fn test_input_stores_intent_and_name() {
        let (mut world, mut physics) = small_world();
        let a = PlayerId::new();
        world.connect(a);

        world.submit_input(&a, InputFrame::from_keys(false, false, false, true), Some("  neo  "), &mut physics);

        let player = world.sessions.get(&a).unwrap();
        assert_eq!(player.intent(), Vec2::new(1.0, 0.0));
        assert_eq!(player.name, "neo");
    }

    #[test]
    fn test_clamp_name() {
        assert_eq!(clamp_name("  hello  ", 16), "hello");
        assert_eq!(clamp_name("abcdefghij", 4), "abcd");
        assert_eq!(clamp_name("ñandú", 3), "ñan");
        assert_eq!(clamp_name("   ", 8), "");
    }

    #[test]
    fn test_purge_disconnected() {
        let (mut world, _) = small_world();
        let a = PlayerId::new();
        let b = PlayerId::new();
        world.connect(a);
        world.connect(b);
        world.disconnect(&b);

        assert_eq!(world.sessions.purge_disconnected(), 1);
        assert!(world.sessions.get(&a).is_some());
        assert!(world.sessions.get(&b).is_none());
    }
}
