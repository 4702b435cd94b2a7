//! Core primitives: vector math and the physics collaborator.
//!
//! Nothing in here knows about teams, players or scoring.

pub mod vec2;
pub mod physics;

// Re-export core types
pub use vec2::Vec2;
pub use physics::{BodyDesc, BodyHandle, ContactFilter, ContactPair, EulerPhysics, Physics, Shape};
