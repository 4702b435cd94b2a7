//! Snapshot Builder
//!
//! Converts the world into one view per recipient. Positions and geometry
//! always stream. Combat state (`active`, `alive`, `age`, `central`,
//! `playerId`) is only included while the recipient is joined, alive and the
//! round is running; otherwise those fields are omitted and the client keeps
//! the last values it saw. [`SnapshotGates`] keeps the gate open for one more
//! snapshot after it closes, so the death or game over that closed it still
//! reaches the client.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;
use crate::game::entity::{Core, EntityId, Guard, Role, Team, Wall};
use crate::game::session::{Player, PlayerId};
use crate::game::state::World;

// =============================================================================
// WIRE TYPES
// =============================================================================

/// Per-recipient world view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Simulation tick the view was taken at
    pub tick: u64,
    /// Cores
    pub cores: Vec<CoreView>,
    /// Guards
    pub guards: Vec<GuardView>,
    /// Walls
    pub walls: Vec<WallView>,
    /// Rounded team scores (team 1, team 2)
    pub scores: [i64; 2],
    /// A team reached the goal and the reset countdown is running
    pub game_over: bool,
    /// Seconds until reset, rounded
    pub countdown: i64,
    /// Spawn protection (ms)
    pub safe_time: f64,
    /// Scoreboard, by team then descending score
    pub players: Vec<RosterEntry>,
    /// The recipient's own state
    pub you: SelfView,
}

/// Core as seen by a client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreView {
    /// Core id
    pub id: EntityId,
    /// Always `core`
    pub role: Role,
    /// Position x
    pub x: f64,
    /// Position y
    pub y: f64,
    /// Radius (px)
    pub radius: f64,
    /// Owning team
    pub team: Team,
    /// Paired guard
    pub guard_id: EntityId,
    /// Combat state, when visible to the recipient
    #[serde(flatten)]
    pub combat: Option<CoreCombat>,
}

/// Gated core fields.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreCombat {
    /// Bound to a player
    pub active: bool,
    /// Not dead
    pub alive: bool,
    /// Milliseconds since spawn
    pub age: f64,
    /// Inside the capture zone
    pub central: bool,
    /// Owning player
    pub player_id: Option<PlayerId>,
}

/// Guard as seen by a client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardView {
    /// Guard id
    pub id: EntityId,
    /// Always `guard`
    pub role: Role,
    /// Position x
    pub x: f64,
    /// Position y
    pub y: f64,
    /// Radius (px)
    pub radius: f64,
    /// Owning team
    pub team: Team,
    /// Core this guard follows
    pub core_id: EntityId,
    /// Combat state, when visible to the recipient
    #[serde(flatten)]
    pub combat: Option<GuardCombat>,
}

/// Gated guard fields.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardCombat {
    /// Bound to a player
    pub active: bool,
    /// Not dead
    pub alive: bool,
    /// Milliseconds since spawn
    pub age: f64,
    /// Owning player
    pub player_id: Option<PlayerId>,
}

/// Wall outline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WallView {
    /// Wall id
    pub id: EntityId,
    /// Always `wall`
    pub role: Role,
    /// Polygon vertices
    pub vertices: Vec<Vec2>,
}

/// Scoreboard line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    /// Player id
    pub id: PlayerId,
    /// Display name
    pub name: String,
    /// Team number, 0 when unassigned
    pub team: u8,
    /// Connection open
    pub connected: bool,
    /// Attached since the last reset
    pub joined: bool,
    /// Rounded score
    pub score: i64,
}

/// The recipient's own state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfView {
    /// Connection id
    pub id: Option<PlayerId>,
    /// Attached since the last reset
    pub joined: bool,
    /// Bound core alive
    pub alive: bool,
    /// Team number, 0 when unassigned
    pub team: u8,
    /// Bound core
    pub core_id: Option<EntityId>,
    /// Bound guard
    pub guard_id: Option<EntityId>,
    /// Rounded score
    pub score: i64,
}

impl From<&Player> for SelfView {
    fn from(player: &Player) -> Self {
        Self {
            id: Some(player.id),
            joined: player.joined,
            alive: player.alive,
            team: player.team_number(),
            core_id: player.core_id,
            guard_id: player.guard_id,
            score: player.rounded_score(),
        }
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Whether `recipient` currently receives combat-state updates.
pub fn combat_visible(world: &World, recipient: &PlayerId) -> bool {
    !world.round.game_over
        && world
            .sessions
            .get(recipient)
            .is_some_and(|p| p.joined && p.alive)
}

fn core_view(core: &Core, gated_open: bool) -> CoreView {
    CoreView {
        id: core.id,
        role: Role::Core,
        x: core.position.x,
        y: core.position.y,
        radius: core.radius,
        team: core.team,
        guard_id: core.guard_id,
        combat: gated_open.then(|| CoreCombat {
            active: core.active,
            alive: core.alive,
            age: core.age_ms,
            central: core.central,
            player_id: core.player_id,
        }),
    }
}

fn guard_view(guard: &Guard, gated_open: bool) -> GuardView {
    GuardView {
        id: guard.id,
        role: Role::Guard,
        x: guard.position.x,
        y: guard.position.y,
        radius: guard.radius,
        team: guard.team,
        core_id: guard.core_id,
        combat: gated_open.then(|| GuardCombat {
            active: guard.active,
            alive: guard.alive,
            age: guard.age_ms,
            player_id: guard.player_id,
        }),
    }
}

fn wall_view(wall: &Wall) -> WallView {
    WallView { id: wall.id, role: Role::Wall, vertices: wall.vertices.clone() }
}

/// Scoreboard for every known player, by team then descending score.
pub fn roster(world: &World) -> Vec<RosterEntry> {
    let mut players: Vec<RosterEntry> = world
        .sessions
        .iter()
        .map(|p| RosterEntry {
            id: p.id,
            name: p.name.clone(),
            team: p.team_number(),
            connected: p.connected,
            joined: p.joined,
            score: p.rounded_score(),
        })
        .collect();

    players.sort_by(|a, b| {
        a.team
            .cmp(&b.team)
            .then(b.score.cmp(&a.score))
            .then(a.name.cmp(&b.name))
    });
    players
}

/// Builds snapshots for many recipients from one world state.
///
/// Entity views are computed once per gate state and cloned per recipient.
pub struct SnapshotBuilder<'a> {
    world: &'a World,
    open: (Vec<CoreView>, Vec<GuardView>),
    closed: (Vec<CoreView>, Vec<GuardView>),
    walls: Vec<WallView>,
    players: Vec<RosterEntry>,
}

impl<'a> SnapshotBuilder<'a> {
    /// Prepare views of `world`.
    pub fn new(world: &'a World) -> Self {
        let views = |open: bool| -> (Vec<CoreView>, Vec<GuardView>) {
            (
                world.entities.cores().iter().map(|c| core_view(c, open)).collect(),
                world.entities.guards().iter().map(|g| guard_view(g, open)).collect(),
            )
        };

        Self {
            world,
            open: views(true),
            closed: views(false),
            walls: world.entities.walls().iter().map(wall_view).collect(),
            players: roster(world),
        }
    }

    /// Snapshot for one recipient, gated on the current world state.
    pub fn build(&self, recipient: &PlayerId) -> Snapshot {
        self.build_gated(recipient, combat_visible(self.world, recipient))
    }

    /// Snapshot for one recipient with the combat gate decided by the caller.
    pub fn build_gated(&self, recipient: &PlayerId, gate_open: bool) -> Snapshot {
        let world = self.world;
        let (cores, guards) = if gate_open {
            self.open.clone()
        } else {
            self.closed.clone()
        };

        let you = match world.sessions.get(recipient) {
            Some(player) => SelfView::from(player),
            None => SelfView { id: Some(*recipient), ..Default::default() },
        };

        Snapshot {
            tick: world.tick,
            cores,
            guards,
            walls: self.walls.clone(),
            scores: world.round.scores,
            game_over: world.round.game_over,
            countdown: world.round.countdown.round() as i64,
            safe_time: world.round.safe_time_ms,
            players: self.players.clone(),
            you,
        }
    }
}

/// Snapshot of `world` for a single recipient.
pub fn build_snapshot(world: &World, recipient: &PlayerId) -> Snapshot {
    SnapshotBuilder::new(world).build(recipient)
}

/// Gate state of the last snapshot delivered to each recipient.
#[derive(Debug, Default)]
pub struct SnapshotGates {
    delivered: BTreeMap<PlayerId, bool>,
}

impl SnapshotGates {
    /// No recipients seen yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate for the next snapshot to `recipient`: open now, or open on the
    /// last delivered one.
    pub fn open_for(&self, world: &World, recipient: &PlayerId) -> bool {
        combat_visible(world, recipient)
            || self.delivered.get(recipient).copied().unwrap_or(false)
    }

    /// Record that a snapshot of `world` reached `recipient`.
    pub fn delivered(&mut self, world: &World, recipient: &PlayerId) {
        self.delivered.insert(*recipient, combat_visible(world, recipient));
    }

    /// Drop recipients that are gone.
    pub fn retain(&mut self, mut keep: impl FnMut(&PlayerId) -> bool) {
        self.delivered.retain(|id, _| keep(id));
    }

    /// Gated snapshot for `recipient`, recorded as delivered.
    pub fn next(&mut self, builder: &SnapshotBuilder<'_>, recipient: &PlayerId) -> Snapshot {
        let snapshot = builder.build_gated(recipient, self.open_for(builder.world, recipient));
        self.delivered(builder.world, recipient);
        snapshot
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

    fn world_with(players: usize) -> (World, EulerPhysics, Vec<PlayerId>) {
        let config = ArenaConfig { cores_per_team: 1, ..Default::default() };
        let mut physics = EulerPhysics::new();
        let mut world = World::new(config, &mut physics);
        let ids: Vec<PlayerId> = (0..players).map(|_| PlayerId::new()).collect();
        for (i, id) in ids.iter().enumerate() {
            world.connect(*id);
            world.join(id, &format!("p{i}"), &mut physics);
        }
        (world, physics, ids)
    }

    #[test]
    fn test_structure_always_present() {
        let (world, _, _) = world_with(0);
        let lobby = PlayerId::new();

        let snapshot = build_snapshot(&world, &lobby);

        assert_eq!(snapshot.cores.len(), 2);
        assert_eq!(snapshot.guards.len(), 2);
        assert_eq!(snapshot.walls.len(), 6);
        assert!(snapshot.walls.iter().all(|w| w.vertices.len() == 4));
        assert!(snapshot.cores.iter().all(|c| c.combat.is_none()));
        assert_eq!(snapshot.cores[0].y, -800.0);
        assert_eq!(snapshot.you.id, Some(lobby));
        assert!(!snapshot.you.joined);
    }

    #[test]
    fn test_joined_alive_recipient_sees_combat_state() {
        let (world, _, ids) = world_with(2);

        let snapshot = build_snapshot(&world, &ids[0]);

        let core = snapshot.cores[0].combat.unwrap();
        assert!(core.active && core.alive);
        assert_eq!(core.player_id, Some(ids[0]));
        assert!(snapshot.guards[1].combat.is_some());
        assert_eq!(snapshot.you.core_id, Some(0));
        assert_eq!(snapshot.you.team, 1);
    }

    #[test]
    fn test_dead_recipient_gets_frozen_view() {
        let (mut world, mut physics, ids) = world_with(2);
        world.kill_core(0, &mut physics);

        let dead = build_snapshot(&world, &ids[0]);
        let alive = build_snapshot(&world, &ids[1]);

        assert!(dead.cores.iter().all(|c| c.combat.is_none()));
        assert!(!dead.you.alive);
        assert_eq!(alive.cores[0].combat.map(|c| c.alive), Some(false));
        // Positions stream regardless
        assert_eq!(dead.cores[1].x, alive.cores[1].x);
    }

    #[test]
    fn test_game_over_closes_gate_for_everyone() {
        let (mut world, _, ids) = world_with(2);
        world.round.game_over = true;
        world.round.countdown = 7.6;

        for id in &ids {
            let snapshot = build_snapshot(&world, id);
            assert!(snapshot.game_over);
            assert_eq!(snapshot.countdown, 8);
            assert!(snapshot.guards.iter().all(|g| g.combat.is_none()));
        }
    }

    #[test]
    fn test_gated_fields_omitted_from_json() {
        let (world, _, ids) = world_with(1);
        let stranger = PlayerId::new();

        let open = serde_json::to_value(build_snapshot(&world, &ids[0])).unwrap();
        let closed = serde_json::to_value(build_snapshot(&world, &stranger)).unwrap();

        assert_eq!(open["cores"][0]["active"], true);
        assert_eq!(open["cores"][0]["guardId"], 0);
        assert!(open["cores"][1]["playerId"].is_null());
        assert!(closed["cores"][0].get("active").is_none());
        assert!(closed["cores"][0].get("playerId").is_none());
        assert_eq!(closed["cores"][0]["role"], "core");
        assert_eq!(closed["safeTime"], 4000.0);
    }

    #[test]
    fn test_victim_sees_own_death_before_freeze() {
        let (mut world, mut physics, ids) = world_with(2);
        let mut gates = SnapshotGates::new();
        let victim = ids[0];

        let before = gates.next(&SnapshotBuilder::new(&world), &victim);
        assert_eq!(before.cores[0].combat.map(|c| c.alive), Some(true));

        world.kill_core(0, &mut physics);

        let death = gates.next(&SnapshotBuilder::new(&world), &victim);
        assert_eq!(death.cores[0].combat.map(|c| c.alive), Some(false));
        assert_eq!(death.guards[0].combat.map(|g| g.alive), Some(false));
        assert!(!death.you.alive);

        let frozen = gates.next(&SnapshotBuilder::new(&world), &victim);
        assert!(frozen.cores.iter().all(|c| c.combat.is_none()));
    }

    #[test]
    fn test_game_over_delivered_once_with_combat_state() {
        let (mut world, _, ids) = world_with(2);
        let mut gates = SnapshotGates::new();
        for id in &ids {
            gates.next(&SnapshotBuilder::new(&world), id);
        }

        world.round.game_over = true;
        world.round.scores = [100, 3];

        for id in &ids {
            let last = gates.next(&SnapshotBuilder::new(&world), id);
            assert!(last.game_over);
            assert!(last.cores.iter().all(|c| c.combat.is_some()));
        }
        for id in &ids {
            let frozen = gates.next(&SnapshotBuilder::new(&world), id);
            assert!(frozen.cores.iter().all(|c| c.combat.is_none()));
        }
    }

    #[test]
    fn test_gates_stay_closed_for_lobby_and_undelivered() {
        let (mut world, mut physics, ids) = world_with(1);
        let lobby = PlayerId::new();
        world.connect(lobby);
        let mut gates = SnapshotGates::new();

        assert!(!gates.open_for(&world, &lobby));
        gates.next(&SnapshotBuilder::new(&world), &lobby);
        assert!(!gates.open_for(&world, &lobby));

        // Open snapshot never delivered: nothing left to flush
        world.kill_core(0, &mut physics);
        assert!(!gates.open_for(&world, &ids[0]));

        gates.delivered(&world, &lobby);
        gates.retain(|id| *id != lobby);
        assert!(!gates.open_for(&world, &lobby));
    }

    #[test]
    fn test_roster_sorted_and_rounded() {
        let (mut world, _, ids) = world_with(2);
        let lobby = PlayerId::new();
        world.connect(lobby);
        world.sessions.get_mut(&ids[0]).unwrap().score = 2.4;
        world.sessions.get_mut(&ids[1]).unwrap().score = 9.6;

        let players = roster(&world);

        assert_eq!(players.len(), 3);
        assert_eq!(players[0].id, lobby);
        assert_eq!(players[0].team, 0);
        assert_eq!((players[1].team, players[1].score), (1, 2));
        assert_eq!((players[2].team, players[2].score), (2, 10));
    }
}
