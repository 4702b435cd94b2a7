//! Game Events
//!
//! Notable things that happened during a tick or a session operation.
//! The server logs them; tests assert on them.

use serde::{Serialize, Deserialize};
use crate::game::entity::{EntityId, Team};
use crate::game::session::PlayerId;

/// Priority for event processing order.
///
/// Lower value = processed first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventPriority {
    /// Deaths first
    Combat = 0,
    /// Round transitions
    Round = 1,
    /// Join / respawn / disconnect
    Session = 2,
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEventData {
    /// A core was killed by an enemy guard
    CoreKilled {
        /// Dead core
        core_id: EntityId,
        /// Guard that touched it
        guard_id: EntityId,
        /// Player who owned the core
        victim: Option<PlayerId>,
        /// Player who owns the guard
        killer: Option<PlayerId>,
        /// Score moved from victim to killer
        transferred: f64,
    },

    /// A team reached the goal
    RoundWon {
        /// Winning team
        team: Team,
        /// Rounded team scores at the moment of winning
        scores: [i64; 2],
    },

    /// The countdown expired and the arena was reset
    RoundReset {
        /// Disconnected players dropped from the roster
        purged_players: usize,
    },

    /// A player was bound to a core/guard pair
    PlayerJoined {
        /// Joining player
        player_id: PlayerId,
        /// Core assigned
        core_id: EntityId,
        /// Team of that core
        team: Team,
    },

    /// A dead core was brought back on request
    PlayerRespawned {
        /// Player
        player_id: PlayerId,
        /// Core respawned
        core_id: EntityId,
    },

    /// A connection went away
    PlayerDisconnected {
        /// Player
        player_id: PlayerId,
    },
}

/// A game event with timing and priority.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when event occurred
    pub tick: u64,

    /// Processing priority
    pub priority: EventPriority,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u64, priority: EventPriority, data: GameEventData) -> Self {
        Self { tick, priority, data }
    }

    /// Processing order: tick, then priority.
    #[inline]
    pub fn order_key(&self) -> (u64, EventPriority) {
        (self.tick, self.priority)
    }

    /// Player most concerned by this event, if any.
    pub fn player_id(&self) -> Option<PlayerId> {
        match &self.data {
            GameEventData::CoreKilled { victim, .. } => *victim,
            GameEventData::PlayerJoined { player_id, .. }
            | GameEventData::PlayerRespawned { player_id, .. }
            | GameEventData::PlayerDisconnected { player_id } => Some(*player_id),
            GameEventData::RoundWon { .. } | GameEventData::RoundReset { .. } => None,
        }
    }

    /// Create core killed event.
    pub fn core_killed(
        tick: u64,
        core_id: EntityId,
        guard_id: EntityId,
        victim: Option<PlayerId>,
        killer: Option<PlayerId>,
        transferred: f64,
    ) -> Self {
        Self::new(
            tick,
            EventPriority::Combat,
            GameEventData::CoreKilled { core_id, guard_id, victim, killer, transferred },
        )
    }

    /// Create round won event.
    pub fn round_won(tick: u64, team: Team, scores: [i64; 2]) -> Self {
        Self::new(tick, EventPriority::Round, GameEventData::RoundWon { team, scores })
    }

    /// Create round reset event.
    pub fn round_reset(tick: u64, purged_players: usize) -> Self {
        Self::new(tick, EventPriority::Round, GameEventData::RoundReset { purged_players })
    }

    /// Create player joined event.
    pub fn player_joined(tick: u64, player_id: PlayerId, core_id: EntityId, team: Team) -> Self {
        Self::new(
            tick,
            EventPriority::Session,
            GameEventData::PlayerJoined { player_id, core_id, team },
        )
    }

    /// Create player respawned event.
    pub fn player_respawned(tick: u64, player_id: PlayerId, core_id: EntityId) -> Self {
        Self::new(
            tick,
            EventPriority::Session,
            GameEventData::PlayerRespawned { player_id, core_id },
        )
    }

    /// Create player disconnected event.
    pub fn player_disconnected(tick: u64, player_id: PlayerId) -> Self {
        Self::new(tick, EventPriority::Session, GameEventData::PlayerDisconnected { player_id })
    }
}
