//! Arena Geometry
//!
//! A square arena centred on the origin, closed by four border walls, with
//! two inner walls splitting the field into the two home halves and a
//! contested middle band.
//!
//! ```text
//!  y = -size  ┌──────────────────────────┐
//!             │        team 1 home       │
//!  y = -off   │     ══════════════       │
//!             │            ◎ centre      │
//!  y = +off   │     ══════════════       │
//!             │        team 2 home       │
//!  y = +size  └──────────────────────────┘
//! ```

use crate::config::ArenaConfig;
use crate::core::vec2::Vec2;
use crate::game::entity::{Team, WallSpec};

/// Arena centre; the capture zone is measured from here.
pub const ARENA_CENTER: Vec2 = Vec2::ZERO;

/// Border and inner walls for an arena.
///
/// Order is bottom, top, right, left border, then the lower and upper
/// inner wall. Wall ids follow this order.
pub fn arena_walls(config: &ArenaConfig) -> Vec<WallSpec> {
    let size = config.arena_half_size;
    let t = config.wall_thickness;
    let span = 2.0 * size + 2.0 * t;
    let edge = size + 0.5 * t;

    vec![
        WallSpec { center: Vec2::new(0.0, edge), width: span, height: t },
        WallSpec { center: Vec2::new(0.0, -edge), width: span, height: t },
        WallSpec { center: Vec2::new(edge, 0.0), width: t, height: span },
        WallSpec { center: Vec2::new(-edge, 0.0), width: t, height: span },
        WallSpec {
            center: Vec2::new(0.0, config.inner_wall_offset),
            width: config.inner_wall_length,
            height: t,
        },
        WallSpec {
            center: Vec2::new(0.0, -config.inner_wall_offset),
            width: config.inner_wall_length,
            height: t,
        },
    ]
}

/// Spawn position for a team.
#[inline]
pub fn team_home(config: &ArenaConfig, team: Team) -> Vec2 {
    config.team_homes[team.index()]
}
