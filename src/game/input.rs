//! Player Input
//!
//! Four directional keys plus a respawn request, packed into one byte.
//! The movement intent is the unit vector of the held keys in screen space
//! (+Y is down), or zero when nothing (or only opposing keys) is held.

use serde::{Serialize, Deserialize};
use crate::core::vec2::Vec2;

/// Input state for one message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputFrame {
    /// Packed key flags, see `FLAG_*`.
    pub flags: u8,
}

impl InputFrame {
    /// Up key (toward -Y)
    pub const FLAG_UP: u8 = 0x01;
    /// Down key (toward +Y)
    pub const FLAG_DOWN: u8 = 0x02;
    /// Left key (toward -X)
    pub const FLAG_LEFT: u8 = 0x04;
    /// Right key (toward +X)
    pub const FLAG_RIGHT: u8 = 0x08;
    /// Respawn requested
    pub const FLAG_RESPAWN: u8 = 0x10;

    /// Empty frame.
    pub const fn new() -> Self {
        Self { flags: 0 }
    }

    /// Build from individual keys.
    pub fn from_keys(up: bool, down: bool, left: bool, right: bool) -> Self {
        let mut frame = Self::new();
        frame.set(Self::FLAG_UP, up);
        frame.set(Self::FLAG_DOWN, down);
        frame.set(Self::FLAG_LEFT, left);
        frame.set(Self::FLAG_RIGHT, right);
        frame
    }

    /// Builder: set the respawn flag.
    pub fn with_respawn(mut self, respawn: bool) -> Self {
        self.set(Self::FLAG_RESPAWN, respawn);
        self
    }

    #[inline]
    fn set(&mut self, flag: u8, on: bool) {
        if on {
            self.flags |= flag;
        } else {
            self.flags &= !flag;
        }
    }

    #[inline]
    fn has(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    /// Check if a respawn was requested.
    #[inline]
    pub fn respawn_requested(&self) -> bool {
        self.has(Self::FLAG_RESPAWN)
    }

    /// Raw (unnormalized) key direction.
    pub fn raw_direction(&self) -> Vec2 {
        let mut v = Vec2::ZERO;
        if self.has(Self::FLAG_UP) {
            v.y -= 1.0;
        }
        if self.has(Self::FLAG_DOWN) {
            v.y += 1.0;
        }
        if self.has(Self::FLAG_LEFT) {
            v.x -= 1.0;
        }
        if self.has(Self::FLAG_RIGHT) {
            v.x += 1.0;
        }
        v
    }

    /// Unit movement intent; zero when no net direction is held.
    #[inline]
    pub fn intent(&self) -> Vec2 {
        self.raw_direction().normalize()
    }

    /// Check if any movement key is held.
    #[inline]
    pub fn has_movement(&self) -> bool {
        self.flags & (Self::FLAG_UP | Self::FLAG_DOWN | Self::FLAG_LEFT | Self::FLAG_RIGHT) != 0
    }
}

// =============================================================================
// TESTS
// =============================================================================
