//! Game Logic Module
//!
//! The arena simulation. Pure state mutation over [`state::World`]; no I/O.
//!
//! ## Module Structure
//!
//! - `entity`: Entity Registry (cores, guards, walls)
//! - `map`: Arena wall layout and team homes
//! - `input`: Held keys to movement intent
//! - `state`: World and round state
//! - `session`: Session Manager (connect, join, input, disconnect)
//! - `zone`: Central capture zone
//! - `collision`: Contact classification and lethal contacts
//! - `tick`: Rules Engine tick
//! - `events`: Game events emitted per tick

pub mod entity;
pub mod map;
pub mod input;
pub mod state;
pub mod session;
pub mod zone;
pub mod collision;
pub mod tick;
pub mod events;

// Re-export key types
pub use entity::{Core, EntityId, EntityRegistry, Guard, Role, Team, Wall};
pub use input::InputFrame;
pub use state::{RoundState, World};
pub use session::{JoinOutcome, Player, PlayerId, SessionManager};
pub use tick::{tick, TickResult};
pub use events::{GameEvent, GameEventData};
