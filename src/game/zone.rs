//! Central Zone
//!
//! The capture zone is a circle around the arena centre whose radius
//! shrinks to the nearest live core, capped at a maximum:
//!
//! ```text
//! radius = min(cap, min |core - centre| over alive+active cores)
//! ```
//!
//! A core is central iff it is alive, active and within that radius. With a
//! single live core, that core is always central. Several cores tied for
//! nearest are all central.

use crate::core::vec2::Vec2;
use crate::game::entity::Core;
use crate::game::map::ARENA_CENTER;

/// Whether a core takes part in the zone contest.
#[inline]
fn contests(core: &Core) -> bool {
    core.alive && core.active
}

/// Zone radius for the given cores, or `None` when no core is contesting.
pub fn zone_radius(cores: &[Core], cap: f64) -> Option<f64> {
    cores
        .iter()
        .filter(|c| contests(c))
        .map(|c| c.position.distance(ARENA_CENTER))
        .fold(None, |nearest: Option<f64>, d| Some(nearest.map_or(d, |n| n.min(d))))
        .map(|nearest| nearest.min(cap))
}

/// Whether a point at `position` lies inside a zone of `radius`.
#[inline]
pub fn in_zone(position: Vec2, radius: f64) -> bool {
    position.distance(ARENA_CENTER) <= radius
}

/// Recompute every core's `central` flag. Returns the radius used.
pub fn update_central(cores: &mut [Core], cap: f64) -> Option<f64> {
    let radius = zone_radius(cores, cap);

    for core in cores.iter_mut() {
        core.central = match radius {
            Some(r) => contests(core) && in_zone(core.position, r),
            None => false,
        };
    }

    #[cfg(feature = "debug-tracing")]
    tracing::trace!(?radius, "Central zone updated");

    radius
}

// =============================================================================
// TESTS
// =============================================================================
