//! Entity Registry
//!
//! Owns every Core, Guard and Wall in the arena. Entities are created once
//! at startup, never removed, and get a small integer id per type that is
//! simply their creation index.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::config::ArenaConfig;
use crate::core::physics::{BodyDesc, BodyHandle, ContactFilter, Physics};
use crate::core::vec2::Vec2;
use crate::game::session::PlayerId;

/// Per-type entity id.
pub type EntityId = u32;

// =============================================================================
// TEAM
// =============================================================================

/// One of the two teams.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Team {
    /// Team 1 (spawns at the top)
    One = 1,
    /// Team 2 (spawns at the bottom)
    Two = 2,
}

impl Team {
    /// Both teams in wire order.
    pub const ALL: [Team; 2] = [Team::One, Team::Two];

    /// Index into per-team arrays (0 or 1).
    #[inline]
    pub fn index(self) -> usize {
        self as usize - 1
    }

    /// Wire number (1 or 2).
    #[inline]
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Parse a wire number.
    pub fn from_number(n: u8) -> Option<Team> {
        match n {
            1 => Some(Team::One),
            2 => Some(Team::Two),
            _ => None,
        }
    }
}

impl Serialize for Team {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.number())
    }
}

impl<'de> Deserialize<'de> for Team {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let n = u8::deserialize(deserializer)?;
        Team::from_number(n).ok_or_else(|| serde::de::Error::custom(format!("invalid team {n}")))
    }
}

// =============================================================================
// ENTITIES
// =============================================================================

/// Role tag of an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Player-controlled capture entity
    Core,
    /// Orbiting companion
    Guard,
    /// Static geometry
    Wall,
}

/// Typed reference to an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityRef {
    /// A core by id
    Core(EntityId),
    /// A guard by id
    Guard(EntityId),
    /// A wall by id
    Wall(EntityId),
}

impl EntityRef {
    /// Role tag of the referenced entity.
    pub fn role(self) -> Role {
        match self {
            EntityRef::Core(_) => Role::Core,
            EntityRef::Guard(_) => Role::Guard,
            EntityRef::Wall(_) => Role::Wall,
        }
    }
}

/// A player-controlled capture point.
#[derive(Clone, Debug)]
pub struct Core {
    /// Stable id
    pub id: EntityId,
    /// Owning team
    pub team: Team,
    /// Physics body
    pub body: BodyHandle,
    /// Collision radius (px)
    pub radius: f64,
    /// Position cached after the last physics step
    pub position: Vec2,
    /// Velocity cached after the last physics step
    pub velocity: Vec2,
    /// Bound to a connected, joined player
    pub active: bool,
    /// Not killed since last spawn
    pub alive: bool,
    /// Milliseconds since last spawn
    pub age_ms: f64,
    /// Inside the capture zone this tick
    pub central: bool,
    /// Clock reading (ms) at last spawn
    pub birth_ms: f64,
    /// The guard paired with this core
    pub guard_id: EntityId,
    /// Owning player, if attached
    pub player_id: Option<PlayerId>,
}

/// An orbiting companion whose contact can kill enemy cores.
#[derive(Clone, Debug)]
pub struct Guard {
    /// Stable id
    pub id: EntityId,
    /// Owning team (always its core's team)
    pub team: Team,
    /// Physics body
    pub body: BodyHandle,
    /// Collision radius (px)
    pub radius: f64,
    /// Position cached after the last physics step
    pub position: Vec2,
    /// Velocity cached after the last physics step
    pub velocity: Vec2,
    /// Mirrors the core
    pub active: bool,
    /// Mirrors the core
    pub alive: bool,
    /// Milliseconds since last spawn
    pub age_ms: f64,
    /// Clock reading (ms) at last spawn
    pub birth_ms: f64,
    /// The core this guard follows
    pub core_id: EntityId,
    /// Owning player, if attached
    pub player_id: Option<PlayerId>,
}

/// Static wall. Immutable after creation.
#[derive(Clone, Debug)]
pub struct Wall {
    /// Stable id
    pub id: EntityId,
    /// Physics body
    pub body: BodyHandle,
    /// Polygon outline
    pub vertices: Vec<Vec2>,
}

/// Axis-aligned wall placement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WallSpec {
    /// Centre point
    pub center: Vec2,
    /// Full width
    pub width: f64,
    /// Full height
    pub height: f64,
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Canonical set of arena entities.
#[derive(Clone, Debug, Default)]
pub struct EntityRegistry {
    cores: Vec<Core>,
    guards: Vec<Guard>,
    walls: Vec<Wall>,
    bodies: BTreeMap<BodyHandle, EntityRef>,
}

impl EntityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a core and its guard, both inactive and alive at `home`.
    ///
    /// Returns the core id.
    pub fn create_pair(
        &mut self,
        team: Team,
        home: Vec2,
        config: &ArenaConfig,
        physics: &mut dyn Physics,
    ) -> EntityId {
        let core_id = self.cores.len() as EntityId;
        let guard_id = self.guards.len() as EntityId;

        let core_body = physics.create_body(
            BodyDesc::circle(config.core_radius, home)
                .with_air_friction(config.air_friction)
                .with_density(config.density),
        );
        let guard_body = physics.create_body(
            BodyDesc::circle(config.guard_radius, home)
                .with_air_friction(config.air_friction)
                .with_density(config.density),
        );

        self.cores.push(Core {
            id: core_id,
            team,
            body: core_body,
            radius: config.core_radius,
            position: home,
            velocity: Vec2::ZERO,
            active: false,
            alive: true,
            age_ms: 0.0,
            central: false,
            birth_ms: 0.0,
            guard_id,
            player_id: None,
        });
        self.guards.push(Guard {
            id: guard_id,
            team,
            body: guard_body,
            radius: config.guard_radius,
            position: home,
            velocity: Vec2::ZERO,
            active: false,
            alive: true,
            age_ms: 0.0,
            birth_ms: 0.0,
            core_id,
            player_id: None,
        });

        self.bodies.insert(core_body, EntityRef::Core(core_id));
        self.bodies.insert(guard_body, EntityRef::Guard(guard_id));
        core_id
    }

    /// Create a static wall.
    pub fn create_wall(&mut self, spec: WallSpec, physics: &mut dyn Physics) -> EntityId {
        let id = self.walls.len() as EntityId;
        let body = physics.create_body(BodyDesc::static_rectangle(spec.center, spec.width, spec.height));
        let vertices = physics.vertices(body);

        self.walls.push(Wall { id, body, vertices });
        self.bodies.insert(body, EntityRef::Wall(id));
        id
    }

    /// First core not bound to a player, in creation order.
    pub fn find_free_core(&self) -> Option<EntityId> {
        self.cores.iter().find(|c| !c.active).map(|c| c.id)
    }

    /// Which entity owns a physics body.
    pub fn resolve(&self, body: BodyHandle) -> Option<EntityRef> {
        self.bodies.get(&body).copied()
    }

    /// Get a core.
    pub fn core(&self, id: EntityId) -> Option<&Core> {
        self.cores.get(id as usize)
    }

    /// Get a core mutably.
    pub fn core_mut(&mut self, id: EntityId) -> Option<&mut Core> {
        self.cores.get_mut(id as usize)
    }

    /// Get a guard.
    pub fn guard(&self, id: EntityId) -> Option<&Guard> {
        self.guards.get(id as usize)
    }

    /// Get a guard mutably.
    pub fn guard_mut(&mut self, id: EntityId) -> Option<&mut Guard> {
        self.guards.get_mut(id as usize)
    }

    /// All cores in id order.
    pub fn cores(&self) -> &[Core] {
        &self.cores
    }

    /// All cores, mutably.
    pub fn cores_mut(&mut self) -> &mut [Core] {
        &mut self.cores
    }

    /// All guards in id order.
    pub fn guards(&self) -> &[Guard] {
        &self.guards
    }

    /// All guards, mutably.
    pub fn guards_mut(&mut self) -> &mut [Guard] {
        &mut self.guards
    }

    /// All walls in id order.
    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    /// Bind a core/guard pair to a player and mark both active.
    ///
    /// Returns the pair's team, or `None` for an unknown core.
    pub fn attach(&mut self, core_id: EntityId, player: PlayerId) -> Option<(Team, EntityId)> {
        let core = self.cores.get_mut(core_id as usize)?;
        core.player_id = Some(player);
        core.active = true;
        let (team, guard_id) = (core.team, core.guard_id);

        if let Some(guard) = self.guards.get_mut(guard_id as usize) {
            guard.player_id = Some(player);
            guard.active = true;
        }
        Some((team, guard_id))
    }

    /// Unbind a core/guard pair and mark both inactive. Idempotent.
    pub fn detach(&mut self, core_id: EntityId) {
        let Some(core) = self.cores.get_mut(core_id as usize) else {
            return;
        };
        core.player_id = None;
        core.active = false;
        core.central = false;
        let guard_id = core.guard_id;

        if let Some(guard) = self.guards.get_mut(guard_id as usize) {
            guard.player_id = None;
            guard.active = false;
        }
    }

    /// Place a core and its guard at `home`, alive, with zero velocity and a
    /// fresh birth time.
    pub fn spawn_pair(&mut self, core_id: EntityId, home: Vec2, now_ms: f64, physics: &mut dyn Physics) {
        let Some(core) = self.cores.get_mut(core_id as usize) else {
            return;
        };
        physics.set_position(core.body, home);
        physics.set_velocity(core.body, Vec2::ZERO);
        core.position = home;
        core.velocity = Vec2::ZERO;
        core.alive = true;
        core.central = false;
        core.birth_ms = now_ms;
        core.age_ms = 0.0;
        let guard_id = core.guard_id;

        if let Some(guard) = self.guards.get_mut(guard_id as usize) {
            physics.set_position(guard.body, home);
            physics.set_velocity(guard.body, Vec2::ZERO);
            guard.position = home;
            guard.velocity = Vec2::ZERO;
            guard.alive = true;
            guard.birth_ms = now_ms;
            guard.age_ms = 0.0;
        }
    }

    /// Kill a core and its guard: both stop, both are flagged dead.
    pub fn kill_pair(&mut self, core_id: EntityId, physics: &mut dyn Physics) {
        let Some(core) = self.cores.get_mut(core_id as usize) else {
            return;
        };
        physics.set_velocity(core.body, Vec2::ZERO);
        core.velocity = Vec2::ZERO;
        core.alive = false;
        core.central = false;
        let guard_id = core.guard_id;

        if let Some(guard) = self.guards.get_mut(guard_id as usize) {
            physics.set_velocity(guard.body, Vec2::ZERO);
            guard.velocity = Vec2::ZERO;
            guard.alive = false;
        }
    }

    /// Refresh cached positions and velocities from the physics world.
    pub fn sync_from_physics(&mut self, physics: &dyn Physics) {
        for core in &mut self.cores {
            core.position = physics.position(core.body);
            core.velocity = physics.velocity(core.body);
        }
        for guard in &mut self.guards {
            guard.position = physics.position(guard.body);
            guard.velocity = physics.velocity(guard.body);
        }
    }
}

impl ContactFilter for EntityRegistry {
    /// Core-core and core-guard contacts pass through each other; the rules
    /// engine decides what they mean.
    fn suppress_response(&self, a: BodyHandle, b: BodyHandle) -> bool {
        matches!(
            (self.resolve(a).map(EntityRef::role), self.resolve(b).map(EntityRef::role)),
            (Some(Role::Core), Some(Role::Core))
                | (Some(Role::Core), Some(Role::Guard))
                | (Some(Role::Guard), Some(Role::Core))
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::physics::EulerPhysics;

    fn registry_with_pairs(n: usize) -> (EntityRegistry, EulerPhysics) {
        let config = ArenaConfig::default();
        let mut physics = EulerPhysics::new();
        let mut registry = EntityRegistry::new();
        for i in 0..n {
            let team = Team::ALL[i % 2];
            registry.create_pair(team, config.team_homes[team.index()], &config, &mut physics);
        }
        (registry, physics)
    }

    #[test]
    fn test_ids_are_creation_order() {
        let (registry, _) = registry_with_pairs(4);

        let ids: Vec<_> = registry.cores().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);

        for core in registry.cores() {
            let guard = registry.guard(core.guard_id).unwrap();
            assert_eq!(guard.core_id, core.id);
            assert_eq!(guard.team, core.team);
        }
        assert_eq!(registry.core(1).unwrap().team, Team::Two);
    }

    #[test]
    fn test_find_free_core_scans_in_order() {
        let (mut registry, _) = registry_with_pairs(3);
        let player = PlayerId::new();

        assert_eq!(registry.find_free_core(), Some(0));
        registry.attach(0, player);
        assert_eq!(registry.find_free_core(), Some(1));
        registry.attach(1, player);
        registry.attach(2, player);
        assert_eq!(registry.find_free_core(), None);

        registry.detach(1);
        assert_eq!(registry.find_free_core(), Some(1));
    }

    #[test]
    fn test_attach_detach_symmetric() {
        let (mut registry, _) = registry_with_pairs(2);
        let player = PlayerId::new();

        let (team, guard_id) = registry.attach(1, player).unwrap();
        assert_eq!(team, Team::Two);
        assert!(registry.core(1).unwrap().active);
        assert_eq!(registry.guard(guard_id).unwrap().player_id, Some(player));

        registry.detach(1);
        registry.detach(1);
        assert!(!registry.core(1).unwrap().active);
        assert!(!registry.guard(guard_id).unwrap().active);
        assert_eq!(registry.core(1).unwrap().player_id, None);
    }

    #[test]
    fn test_kill_and_spawn_pair() {
        let (mut registry, mut physics) = registry_with_pairs(1);
        let body = registry.core(0).unwrap().body;
        physics.set_velocity(body, Vec2::new(50.0, 0.0));

        registry.kill_pair(0, &mut physics);
        assert!(!registry.core(0).unwrap().alive);
        assert!(!registry.guard(0).unwrap().alive);
        assert_eq!(physics.velocity(body), Vec2::ZERO);

        let home = Vec2::new(0.0, -800.0);
        registry.spawn_pair(0, home, 1234.0, &mut physics);
        let core = registry.core(0).unwrap();
        assert!(core.alive);
        assert_eq!(core.birth_ms, 1234.0);
        assert_eq!(physics.position(body), home);
    }

    #[test]
    fn test_contact_filter_roles() {
        let config = ArenaConfig::default();
        let mut physics = EulerPhysics::new();
        let mut registry = EntityRegistry::new();
        registry.create_pair(Team::One, Vec2::ZERO, &config, &mut physics);
        registry.create_pair(Team::Two, Vec2::ZERO, &config, &mut physics);
        registry.create_wall(
            WallSpec { center: Vec2::ZERO, width: 10.0, height: 10.0 },
            &mut physics,
        );

        let core_a = registry.core(0).unwrap().body;
        let core_b = registry.core(1).unwrap().body;
        let guard_a = registry.guard(0).unwrap().body;
        let guard_b = registry.guard(1).unwrap().body;
        let wall = registry.walls()[0].body;

        assert!(registry.suppress_response(core_a, core_b));
        assert!(registry.suppress_response(core_a, guard_b));
        assert!(registry.suppress_response(guard_b, core_a));
        assert!(!registry.suppress_response(guard_a, guard_b));
        assert!(!registry.suppress_response(core_a, wall));
        assert_eq!(registry.walls()[0].vertices.len(), 4);
    }

    #[test]
    fn test_team_wire_numbers() {
        assert_eq!(Team::One.index(), 0);
        assert_eq!(Team::Two.number(), 2);
        assert_eq!(Team::from_number(3), None);
        assert_eq!(serde_json::to_string(&Team::Two).unwrap(), "2");
    }
}
