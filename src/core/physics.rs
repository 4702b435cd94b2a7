//! Physics Collaborator
//!
//! The rules engine never integrates motion itself. It talks to a [`Physics`]
//! implementation that owns bodies, integrates them each step and reports
//! contact pairs that started touching during that step.
//!
//! [`EulerPhysics`] is the bundled backend: circles and static rectangles,
//! semi-implicit Euler integration with air friction, brute-force contact
//! detection and an impulse response that callers can suppress per pair
//! through a [`ContactFilter`].
//!
//! ## Units
//!
//! ```text
//! position  px          velocity  px/s
//! force     mass*px/s²  dt        seconds
//! mass      area * density
//! ```

use std::collections::BTreeSet;
use std::f64::consts::PI;
use serde::{Serialize, Deserialize};

use super::vec2::Vec2;

/// Air friction is expressed per reference step so that it behaves the same
/// at any tick rate.
pub const FRICTION_REFERENCE_STEP: f64 = 1.0 / 60.0;

/// Fraction of penetration depth corrected per step.
const POSITION_CORRECTION: f64 = 0.8;

// =============================================================================
// BODY DESCRIPTION
// =============================================================================

/// Opaque handle to a physics body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BodyHandle(pub u32);

/// Collision shape of a body.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    /// Circle centred on the body position.
    Circle {
        /// Circle radius (px)
        radius: f64,
    },
    /// Axis-aligned rectangle centred on the body position.
    Rectangle {
        /// Full width (px)
        width: f64,
        /// Full height (px)
        height: f64,
    },
}

impl Shape {
    /// Area of the shape.
    pub fn area(&self) -> f64 {
        match *self {
            Shape::Circle { radius } => PI * radius * radius,
            Shape::Rectangle { width, height } => width * height,
        }
    }
}

/// Everything needed to create a body.
#[derive(Clone, Copy, Debug)]
pub struct BodyDesc {
    /// Collision shape
    pub shape: Shape,
    /// Initial position
    pub position: Vec2,
    /// Static bodies never move and have infinite mass
    pub is_static: bool,
    /// Velocity fraction lost per reference step
    pub air_friction: f64,
    /// Mass per unit area
    pub density: f64,
    /// Bounciness of the default contact response (0 = none)
    pub restitution: f64,
}

impl BodyDesc {
    /// Dynamic circle with default material.
    pub fn circle(radius: f64, position: Vec2) -> Self {
        Self {
            shape: Shape::Circle { radius },
            position,
            is_static: false,
            air_friction: 0.01,
            density: 0.001,
            restitution: 0.0,
        }
    }

    /// Static axis-aligned rectangle.
    pub fn static_rectangle(center: Vec2, width: f64, height: f64) -> Self {
        Self {
            shape: Shape::Rectangle { width, height },
            position: center,
            is_static: true,
            air_friction: 0.0,
            density: 0.0,
            restitution: 0.0,
        }
    }

    /// Override air friction.
    pub fn with_air_friction(mut self, air_friction: f64) -> Self {
        self.air_friction = air_friction;
        self
    }

    /// Override density.
    pub fn with_density(mut self, density: f64) -> Self {
        self.density = density;
        self
    }
}

/// Two bodies that started touching during a step. `a < b` always.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContactPair {
    /// Lower handle
    pub a: BodyHandle,
    /// Higher handle
    pub b: BodyHandle,
}

impl ContactPair {
    /// Build a pair in canonical order.
    pub fn new(x: BodyHandle, y: BodyHandle) -> Self {
        if x <= y {
            Self { a: x, b: y }
        } else {
            Self { a: y, b: x }
        }
    }
}

/// Decides, per touching pair, whether the default physical response is skipped.
pub trait ContactFilter {
    /// Return true to let the bodies overlap without pushback.
    fn suppress_response(&self, a: BodyHandle, b: BodyHandle) -> bool;
}

/// Filter that never suppresses anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct RespondToAll;

impl ContactFilter for RespondToAll {
    fn suppress_response(&self, _a: BodyHandle, _b: BodyHandle) -> bool {
        false
    }
}

// =============================================================================
// PHYSICS CONTRACT
// =============================================================================

/// The physics collaborator contract consumed by the rules engine.
///
/// Accessors on an unknown handle return zero / do nothing; the engine only
/// ever passes handles it received from `create_body`.
pub trait Physics {
    /// Create a body and return its handle.
    fn create_body(&mut self, desc: BodyDesc) -> BodyHandle;

    /// Current position.
    fn position(&self, body: BodyHandle) -> Vec2;

    /// Current velocity.
    fn velocity(&self, body: BodyHandle) -> Vec2;

    /// Teleport a body.
    fn set_position(&mut self, body: BodyHandle, position: Vec2);

    /// Overwrite a body's velocity.
    fn set_velocity(&mut self, body: BodyHandle, velocity: Vec2);

    /// Accumulate a force for the next step. `point` is where the force acts;
    /// bodies do not rotate, so only the force itself matters here.
    fn apply_force(&mut self, body: BodyHandle, point: Vec2, force: Vec2);

    /// Polygon outline of a body (empty for circles).
    fn vertices(&self, body: BodyHandle) -> Vec<Vec2>;

    /// Advance the simulation by `dt` seconds.
    ///
    /// Returns the pairs that started touching during this step. Pairs for
    /// which `filter` returns true are detected and reported but receive no
    /// physical response.
    fn step(&mut self, dt: f64, filter: &dyn ContactFilter) -> Vec<ContactPair>;
}

// =============================================================================
// EULER BACKEND
// =============================================================================

#[derive(Clone, Debug)]
struct Body {
    shape: Shape,
    position: Vec2,
    velocity: Vec2,
    force: Vec2,
    inv_mass: f64,
    is_static: bool,
    air_friction: f64,
    restitution: f64,
}

/// Penetration between two bodies; `normal` points from the first to the second.
#[derive(Clone, Copy, Debug)]
struct Manifold {
    normal: Vec2,
    depth: f64,
}

/// Simple Euler-integration physics backend.
#[derive(Clone, Debug, Default)]
pub struct EulerPhysics {
    bodies: Vec<Body>,
    touching: BTreeSet<ContactPair>,
}

impl EulerPhysics {
    /// Create an empty world (no gravity).
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bodies.
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Pairs touching after the last step.
    pub fn touching_pairs(&self) -> impl Iterator<Item = &ContactPair> {
        self.touching.iter()
    }

    fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(handle.0 as usize)
    }

    fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.bodies.get_mut(handle.0 as usize)
    }

    fn integrate(&mut self, dt: f64) {
        let friction_steps = dt / FRICTION_REFERENCE_STEP;

        for body in self.bodies.iter_mut().filter(|b| !b.is_static) {
            let acceleration = body.force.scale(body.inv_mass);
            body.velocity += acceleration.scale(dt);
            body.velocity = body
                .velocity
                .scale((1.0 - body.air_friction).max(0.0).powf(friction_steps));
            body.position += body.velocity.scale(dt);
            body.force = Vec2::ZERO;
        }
    }

    fn manifold(a: &Body, b: &Body) -> Option<Manifold> {
        match (a.shape, b.shape) {
            (Shape::Circle { radius: ra }, Shape::Circle { radius: rb }) => {
                circle_circle(a.position, ra, b.position, rb)
            }
            (Shape::Circle { radius }, Shape::Rectangle { width, height }) => {
                circle_rect(a.position, radius, b.position, width * 0.5, height * 0.5)
            }
            (Shape::Rectangle { width, height }, Shape::Circle { radius }) => {
                circle_rect(b.position, radius, a.position, width * 0.5, height * 0.5).map(|m| {
                    Manifold {
                        normal: -m.normal,
                        depth: m.depth,
                    }
                })
            }
            (
                Shape::Rectangle { width: wa, height: ha },
                Shape::Rectangle { width: wb, height: hb },
            ) => rect_rect(a.position, wa * 0.5, ha * 0.5, b.position, wb * 0.5, hb * 0.5),
        }
    }

    fn respond(&mut self, i: usize, j: usize, manifold: Manifold) {
        let (a, b) = (&self.bodies[i], &self.bodies[j]);
        let total_inv_mass = a.inv_mass + b.inv_mass;
        if total_inv_mass <= 0.0 {
            return;
        }

        let restitution = a.restitution.max(b.restitution);
        let correction = manifold
            .normal
            .scale(POSITION_CORRECTION * manifold.depth / total_inv_mass);

        let relative = b.velocity - a.velocity;
        let approach = relative.dot(manifold.normal);
        let impulse = if approach < 0.0 {
            manifold
                .normal
                .scale(-(1.0 + restitution) * approach / total_inv_mass)
        } else {
            Vec2::ZERO
        };

        let (inv_a, inv_b) = (a.inv_mass, b.inv_mass);

        let a = &mut self.bodies[i];
        a.position = a.position - correction.scale(inv_a);
        a.velocity = a.velocity - impulse.scale(inv_a);

        let b = &mut self.bodies[j];
        b.position += correction.scale(inv_b);
        b.velocity += impulse.scale(inv_b);
    }
}

impl Physics for EulerPhysics {
    fn create_body(&mut self, desc: BodyDesc) -> BodyHandle {
        let mass = desc.shape.area() * desc.density;
        let inv_mass = if desc.is_static || mass <= 0.0 {
            0.0
        } else {
            1.0 / mass
        };

        let handle = BodyHandle(self.bodies.len() as u32);
        self.bodies.push(Body {
            shape: desc.shape,
            position: desc.position,
            velocity: Vec2::ZERO,
            force: Vec2::ZERO,
            inv_mass,
            is_static: desc.is_static,
            air_friction: desc.air_friction,
            restitution: desc.restitution,
        });
        handle
    }

    fn position(&self, body: BodyHandle) -> Vec2 {
        self.body(body).map(|b| b.position).unwrap_or(Vec2::ZERO)
    }

    fn velocity(&self, body: BodyHandle) -> Vec2 {
        self.body(body).map(|b| b.velocity).unwrap_or(Vec2::ZERO)
    }

    fn set_position(&mut self, body: BodyHandle, position: Vec2) {
        if let Some(b) = self.body_mut(body) {
            b.position = position;
        }
    }

    fn set_velocity(&mut self, body: BodyHandle, velocity: Vec2) {
        if let Some(b) = self.body_mut(body) {
            if !b.is_static {
                b.velocity = velocity;
            }
        }
    }

    fn apply_force(&mut self, body: BodyHandle, _point: Vec2, force: Vec2) {
        if !force.is_finite() {
            return;
        }
        if let Some(b) = self.body_mut(body) {
            if !b.is_static {
                b.force += force;
            }
        }
    }

    fn vertices(&self, body: BodyHandle) -> Vec<Vec2> {
        match self.body(body) {
            Some(Body {
                shape: Shape::Rectangle { width, height },
                position,
                ..
            }) => {
                let (hw, hh) = (width * 0.5, height * 0.5);
                vec![
                    Vec2::new(position.x - hw, position.y - hh),
                    Vec2::new(position.x + hw, position.y - hh),
                    Vec2::new(position.x + hw, position.y + hh),
                    Vec2::new(position.x - hw, position.y + hh),
                ]
            }
            _ => Vec::new(),
        }
    }

    fn step(&mut self, dt: f64, filter: &dyn ContactFilter) -> Vec<ContactPair> {
        if !dt.is_finite() || dt <= 0.0 {
            return Vec::new();
        }

        self.integrate(dt);

        let mut touching = BTreeSet::new();
        let mut started = Vec::new();

        for i in 0..self.bodies.len() {
            for j in (i + 1)..self.bodies.len() {
                let (a, b) = (&self.bodies[i], &self.bodies[j]);
                if a.is_static && b.is_static {
                    continue;
                }

                let Some(manifold) = Self::manifold(a, b) else {
                    continue;
                };

                let pair = ContactPair::new(BodyHandle(i as u32), BodyHandle(j as u32));
                if !self.touching.contains(&pair) {
                    started.push(pair);
                }
                touching.insert(pair);

                if !filter.suppress_response(pair.a, pair.b) {
                    self.respond(i, j, manifold);
                }
            }
        }

        self.touching = touching;
        started
    }
}

// =============================================================================
// NARROW PHASE
// =============================================================================

fn circle_circle(pa: Vec2, ra: f64, pb: Vec2, rb: f64) -> Option<Manifold> {
    let delta = pb - pa;
    let dist_sq = delta.length_squared();
    let combined = ra + rb;
    if dist_sq >= combined * combined {
        return None;
    }

    let dist = dist_sq.sqrt();
    let normal = if dist > 0.0 {
        delta.scale(1.0 / dist)
    } else {
        Vec2::new(0.0, 1.0)
    };
    Some(Manifold {
        normal,
        depth: combined - dist,
    })
}

/// Circle against a rectangle; the normal points from the circle into the rectangle.
fn circle_rect(center: Vec2, radius: f64, rect: Vec2, hw: f64, hh: f64) -> Option<Manifold> {
    let local = center - rect;
    let closest = Vec2::new(local.x.clamp(-hw, hw), local.y.clamp(-hh, hh));
    let outward = local - closest;
    let dist_sq = outward.length_squared();

    if dist_sq > 0.0 {
        if dist_sq >= radius * radius {
            return None;
        }
        let dist = dist_sq.sqrt();
        return Some(Manifold {
            normal: -outward.scale(1.0 / dist),
            depth: radius - dist,
        });
    }

    // Centre is inside the rectangle: push out along the shallowest axis.
    let overlap_x = hw - local.x.abs();
    let overlap_y = hh - local.y.abs();
    if overlap_x < overlap_y {
        let sign = if local.x < 0.0 { -1.0 } else { 1.0 };
        Some(Manifold {
            normal: Vec2::new(-sign, 0.0),
            depth: radius + overlap_x,
        })
    } else {
        let sign = if local.y < 0.0 { -1.0 } else { 1.0 };
        Some(Manifold {
            normal: Vec2::new(0.0, -sign),
            depth: radius + overlap_y,
        })
    }
}

fn rect_rect(pa: Vec2, hwa: f64, hha: f64, pb: Vec2, hwb: f64, hhb: f64) -> Option<Manifold> {
    let delta = pb - pa;
    let overlap_x = hwa + hwb - delta.x.abs();
    let overlap_y = hha + hhb - delta.y.abs();
    if overlap_x <= 0.0 || overlap_y <= 0.0 {
        return None;
    }

    if overlap_x < overlap_y {
        let sign = if delta.x < 0.0 { -1.0 } else { 1.0 };
        Some(Manifold {
            normal: Vec2::new(sign, 0.0),
            depth: overlap_x,
        })
    } else {
        let sign = if delta.y < 0.0 { -1.0 } else { 1.0 };
        Some(Manifold {
            normal: Vec2::new(0.0, sign),
            depth: overlap_y,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
