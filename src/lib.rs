//! # Coreguard Game Server
//!
//! Authoritative server for a real-time two-team arena game. Each player
//! steers a core that is shadowed by a guard; teams score by holding the
//! central zone, and an enemy guard touching a core kills it and takes half
//! of its owner's score.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    COREGUARD SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  config.rs       - Arena and transport configuration         │
//! │                                                              │
//! │  core/           - Primitives                                │
//! │  ├── vec2.rs     - 2D vector                                 │
//! │  └── physics.rs  - Physics trait + Euler backend             │
//! │                                                              │
//! │  game/           - Simulation (no I/O)                       │
//! │  ├── entity.rs   - Entity Registry                           │
//! │  ├── session.rs  - Session Manager                           │
//! │  ├── tick.rs     - Rules Engine                              │
//! │  ├── zone.rs     - Central zone                              │
//! │  └── collision.rs- Lethal contacts, score transfer           │
//! │                                                              │
//! │  network/        - Transport                                 │
//! │  ├── server.rs   - WebSocket server + world task             │
//! │  ├── snapshot.rs - Snapshot Builder                          │
//! │  └── protocol.rs - Message types                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//!
//! One world task owns all game state. Connection tasks queue commands to it;
//! the queue is drained at the start of each tick, so a tick always sees a
//! consistent world.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use config::{ArenaConfig, Config, ServerConfig};
pub use crate::core::vec2::Vec2;
pub use crate::core::physics::{EulerPhysics, Physics};
pub use game::state::World;
pub use game::session::PlayerId;
pub use game::tick::{tick, TickResult};
pub use network::server::GameServer;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;
