//! Network Layer
//!
//! WebSocket transport. All game mutation is funnelled into the world task
//! in `server`; snapshots are the only thing that flows back out.

pub mod protocol;
pub mod snapshot;
pub mod server;

pub use protocol::{ClientMessage, ServerMessage, InputMessage, ErrorCode};
pub use snapshot::{build_snapshot, Snapshot, SnapshotBuilder};
pub use server::{GameServer, GameServerError, WorldCommand};
