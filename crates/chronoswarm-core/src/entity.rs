//! Entity model: cells, agents, pickups, hazards and the mass economy.
//!
//! All mass-conserving operations live here. They return `Option` and are
//! silent no-ops when their preconditions fail; failed attempts are an
//! expected part of normal play, never an error.

use crate::config::ArenaConfig;
use crate::math::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use slotmap::{Key, SlotMap, new_key_type};
use std::f32::consts::TAU;

new_key_type! {
    /// Stable handle for agents backed by a generational slot map.
    pub struct AgentId;
    /// Stable handle for cells.
    pub struct CellId;
    /// Stable handle for chrono-matter pickups.
    pub struct MatterId;
    /// Stable handle for ejected mass pickups.
    pub struct EjectedId;
    /// Stable handle for temporal rifts.
    pub struct RiftId;
}

/// Slot map paired with an explicit insertion-ordered handle list.
///
/// Slot map iteration order is unspecified under key reuse, so every pass
/// that must be deterministic walks `ids()` instead.
#[derive(Debug)]
pub struct OrderedStore<K: Key, V> {
    slots: SlotMap<K, V>,
    order: Vec<K>,
}

impl<K: Key, V> Default for OrderedStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Key, V> OrderedStore<K, V> {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
            order: Vec::new(),
        }
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true when the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Insert a value, returning its handle.
    pub fn insert(&mut self, value: V) -> K {
        let key = self.slots.insert(value);
        self.order.push(key);
        key
    }

    /// Remove by handle. Tolerates handles that were already removed.
    pub fn remove(&mut self, key: K) -> Option<V> {
        let value = self.slots.remove(key)?;
        self.order.retain(|&existing| existing != key);
        Some(value)
    }

    /// Immutable access by handle.
    #[must_use]
    pub fn get(&self, key: K) -> Option<&V> {
        self.slots.get(key)
    }

    /// Mutable access by handle.
    #[must_use]
    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        self.slots.get_mut(key)
    }

    /// Returns true if `key` refers to a live entry.
    #[must_use]
    pub fn contains(&self, key: K) -> bool {
        self.slots.contains_key(key)
    }

    /// Handles in insertion order.
    #[must_use]
    pub fn ids(&self) -> &[K] {
        &self.order
    }

    /// Iterate entries in insertion order.
    pub fn iter_ordered(&self) -> impl Iterator<Item = (K, &V)> {
        self.order
            .iter()
            .filter_map(|&key| self.slots.get(key).map(|value| (key, value)))
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.order.clear();
    }
}

/// Personality traits sampled once at agent creation, fixed for its lifetime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Personality {
    pub aggressiveness: f32,
    pub risk_tolerance: f32,
    pub patience: f32,
    pub adaptability: f32,
    pub teamwork: f32,
}

impl Personality {
    /// Sample a uniform random personality.
    pub fn sample<R: Rng>(rng: &mut R) -> Self {
        Self {
            aggressiveness: rng.random_range(0.0..1.0),
            risk_tolerance: rng.random_range(0.0..1.0),
            patience: rng.random_range(0.0..1.0),
            adaptability: rng.random_range(0.0..1.0),
            teamwork: rng.random_range(0.0..1.0),
        }
    }
}

impl Default for Personality {
    fn default() -> Self {
        Self {
            aggressiveness: 0.5,
            risk_tolerance: 0.5,
            patience: 0.5,
            adaptability: 0.5,
            teamwork: 0.5,
        }
    }
}

/// The minimal mass-bearing, collidable unit owned by exactly one agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cell {
    pub owner: AgentId,
    pub mass: f32,
    /// Derived: always `radius_scale * sqrt(mass)`; kept in sync by `set_mass`.
    pub radius: f32,
    pub position: Vec2,
    pub velocity: Vec2,
    /// Countdown preventing freshly split cells from immediately re-merging.
    pub recombine_lock_ms: f32,
}

impl Cell {
    /// Construct a cell with its radius derived from mass.
    #[must_use]
    pub fn new(owner: AgentId, mass: f32, position: Vec2, config: &ArenaConfig) -> Self {
        let mass = sanitize_mass(config, mass);
        Self {
            owner,
            mass,
            radius: config.radius_for_mass(mass),
            position,
            velocity: Vec2::ZERO,
            recombine_lock_ms: 0.0,
        }
    }

    /// Write a new mass, re-deriving the radius and clamping to the floor.
    pub fn set_mass(&mut self, mass: f32, config: &ArenaConfig) {
        self.mass = sanitize_mass(config, mass);
        self.radius = config.radius_for_mass(self.mass);
    }

    /// Whether the recombine lock is still running.
    #[must_use]
    pub fn locked(&self) -> bool {
        self.recombine_lock_ms > 0.0
    }

    /// Exact circle-overlap test against another cell.
    #[must_use]
    pub fn overlaps(&self, other: &Cell) -> bool {
        let reach = self.radius + other.radius;
        self.position.distance_sq(other.position) < reach * reach
    }
}

/// A controlled collection of cells sharing identity, score and personality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Owned cells in creation order.
    pub cells: Vec<CellId>,
    pub personality: Personality,
    pub alive: bool,
    /// Total mass across owned cells, refreshed each tick.
    pub score: f32,
    pub kills: u32,
    pub is_primary: bool,
    /// Desired world-space movement point, if any.
    pub target: Option<Vec2>,
    pub pending_split: bool,
    pub pending_eject: bool,
    pub split_cooldown_ms: f32,
}

impl Agent {
    /// Construct a live agent with no cells yet.
    #[must_use]
    pub fn new(personality: Personality, is_primary: bool) -> Self {
        Self {
            cells: Vec::new(),
            personality,
            alive: true,
            score: 0.0,
            kills: 0,
            is_primary,
            target: None,
            pending_split: false,
            pending_eject: false,
            split_cooldown_ms: 0.0,
        }
    }
}

/// Fixed-mass growth pickup, consumed on overlap.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ChronoMatter {
    pub position: Vec2,
    pub mass: f32,
}

/// Transient pickup created by an eject action, collectible by any agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EjectedMass {
    pub position: Vec2,
    pub velocity: Vec2,
    pub mass: f32,
    pub ttl_ms: f32,
}

/// Hazard that shatters oversized cells into scattered shards.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TemporalRift {
    pub position: Vec2,
    pub radius: f32,
    /// Accumulates by absorbing ejected mass; sets the trigger threshold.
    pub energy: f32,
}

impl TemporalRift {
    /// Whether a cell of the given mass would trigger this rift.
    #[must_use]
    pub fn triggered_by(&self, mass: f32, config: &ArenaConfig) -> bool {
        mass > self.energy * config.rift_trigger_ratio
    }
}

/// Clamp a mass value to a safe positive floor.
///
/// Non-finite or non-positive masses indicate an upstream invariant breach;
/// the simulation absorbs them rather than propagating across the tick.
#[must_use]
pub fn sanitize_mass(config: &ArenaConfig, mass: f32) -> f32 {
    if mass.is_finite() {
        mass.max(config.min_cell_mass)
    } else {
        config.min_cell_mass
    }
}

/// Halve `source` into a sibling cell recoiling along `direction`.
///
/// Requires `mass >= 2 * min_split_mass` and a free cell slot; otherwise a
/// silent no-op. Mass is conserved exactly and both halves receive a fresh
/// recombine lock.
pub fn split(
    config: &ArenaConfig,
    cells: &mut OrderedStore<CellId, Cell>,
    agent: &mut Agent,
    source: CellId,
    direction: Vec2,
) -> Option<CellId> {
    let cell = cells.get(source)?;
    if cell.mass < 2.0 * config.min_split_mass || agent.cells.len() >= config.max_cells {
        return None;
    }
    let dir = match direction.normalized() {
        d if d == Vec2::ZERO => Vec2::new(1.0, 0.0),
        d => d,
    };
    let half = cell.mass * 0.5;

    let (owner, spawn_pos) = {
        let cell = cells.get_mut(source)?;
        cell.set_mass(half, config);
        cell.velocity -= dir * config.split_recoil;
        cell.recombine_lock_ms = config.recombine_lock_ms;
        (cell.owner, cell.position + dir * (cell.radius * 2.0))
    };

    let mut sibling = Cell::new(owner, half, spawn_pos, config);
    sibling.velocity = dir * config.split_impulse;
    sibling.recombine_lock_ms = config.recombine_lock_ms;
    let id = cells.insert(sibling);
    agent.cells.push(id);
    Some(id)
}

/// Shed a fixed amount of mass as a drifting pickup.
///
/// Requires `mass > eject_amount` (strict); otherwise a silent no-op. The
/// pickup carries the full deducted amount and the source recoils slightly.
pub fn eject(
    config: &ArenaConfig,
    cells: &mut OrderedStore<CellId, Cell>,
    ejected: &mut OrderedStore<EjectedId, EjectedMass>,
    source: CellId,
    direction: Vec2,
) -> Option<EjectedId> {
    let cell = cells.get(source)?;
    if cell.mass <= config.eject_amount {
        return None;
    }
    let dir = match direction.normalized() {
        d if d == Vec2::ZERO => Vec2::new(1.0, 0.0),
        d => d,
    };

    let cell = cells.get_mut(source)?;
    cell.set_mass(cell.mass - config.eject_amount, config);
    cell.velocity -= dir * (config.eject_impulse * 0.1);
    let spawn_pos = cell.position + dir * (cell.radius + 4.0);

    Some(ejected.insert(EjectedMass {
        position: spawn_pos,
        velocity: dir * config.eject_impulse,
        mass: config.eject_amount,
        ttl_ms: config.eject_ttl_ms,
    }))
}

/// Merge two cells of the same agent, returning the surviving handle.
///
/// Requires matching owners, centers closer than the mean radius, and both
/// recombine locks expired. The survivor carries the exact mass sum at the
/// mass-weighted average position with averaged velocity.
pub fn combine(
    config: &ArenaConfig,
    cells: &mut OrderedStore<CellId, Cell>,
    agent: &mut Agent,
    a: CellId,
    b: CellId,
) -> Option<CellId> {
    if a == b {
        return None;
    }
    {
        let cell_a = cells.get(a)?;
        let cell_b = cells.get(b)?;
        if cell_a.owner != cell_b.owner || cell_a.locked() || cell_b.locked() {
            return None;
        }
        let reach = (cell_a.radius + cell_b.radius) * 0.5;
        if cell_a.position.distance_sq(cell_b.position) >= reach * reach {
            return None;
        }
    }

    let (survivor, absorbed) = {
        let mass_a = cells.get(a)?.mass;
        let mass_b = cells.get(b)?.mass;
        if mass_a >= mass_b { (a, b) } else { (b, a) }
    };
    let absorbed_cell = cells.remove(absorbed)?;
    let merged = cells.get_mut(survivor)?;
    let total = merged.mass + absorbed_cell.mass;
    let inv = 1.0 / total;
    merged.position =
        (merged.position * merged.mass + absorbed_cell.position * absorbed_cell.mass) * inv;
    merged.velocity = (merged.velocity + absorbed_cell.velocity) * 0.5;
    merged.set_mass(total, config);
    agent.cells.retain(|&id| id != absorbed);
    Some(survivor)
}

/// Shatter a cell into radially scattered shards of equal mass.
///
/// The source cell becomes the first shard; up to `shatter_shards - 1` new
/// cells are created, bounded by the owner's free cell slots and the mass
/// floor. Total mass is conserved and every shard gets a fresh recombine
/// lock. Returns the newly created shard handles (empty when the agent is
/// already at `max_cells`).
pub fn shatter<R: Rng>(
    config: &ArenaConfig,
    cells: &mut OrderedStore<CellId, Cell>,
    agent: &mut Agent,
    source: CellId,
    rng: &mut R,
) -> Vec<CellId> {
    let Some(cell) = cells.get(source) else {
        return Vec::new();
    };
    let free_slots = config.max_cells.saturating_sub(agent.cells.len());
    let mass_bound = (cell.mass / config.min_cell_mass).floor() as usize;
    let shards = config.shatter_shards.min(free_slots + 1).min(mass_bound);
    if shards < 2 {
        return Vec::new();
    }

    let shard_mass = cell.mass / shards as f32;
    let base_angle = rng.random_range(0.0..TAU);
    let (owner, center) = {
        let cell = cells.get_mut(source).expect("source checked above");
        cell.set_mass(shard_mass, config);
        cell.recombine_lock_ms = config.recombine_lock_ms;
        (cell.owner, cell.position)
    };

    let mut created = Vec::with_capacity(shards - 1);
    for index in 1..shards {
        let angle = base_angle + TAU * index as f32 / shards as f32;
        let dir = Vec2::from_angle(angle);
        let mut shard = Cell::new(
            owner,
            shard_mass,
            center + dir * config.radius_for_mass(shard_mass),
            config,
        );
        shard.velocity = dir * (config.split_impulse * 0.8);
        shard.recombine_lock_ms = config.recombine_lock_ms;
        let id = cells.insert(shard);
        agent.cells.push(id);
        created.push(id);
    }
    created
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn fixture() -> (ArenaConfig, OrderedStore<CellId, Cell>, Agent, AgentId) {
        let config = ArenaConfig {
            min_split_mass: 50.0,
            rng_seed: Some(7),
            ..ArenaConfig::default()
        };
        let cells = OrderedStore::new();
        let agent = Agent::new(Personality::default(), false);
        let mut agents: SlotMap<AgentId, ()> = SlotMap::with_key();
        let owner = agents.insert(());
        (config, cells, agent, owner)
    }

    fn add_cell(
        config: &ArenaConfig,
        cells: &mut OrderedStore<CellId, Cell>,
        agent: &mut Agent,
        owner: AgentId,
        mass: f32,
        position: Vec2,
    ) -> CellId {
        let id = cells.insert(Cell::new(owner, mass, position, config));
        agent.cells.push(id);
        id
    }

    #[test]
    fn split_conserves_mass_with_opposite_recoil() {
        let (config, mut cells, mut agent, owner) = fixture();
        let source = add_cell(&config, &mut cells, &mut agent, owner, 100.0, Vec2::ZERO);
        let dir = Vec2::new(0.0, 1.0);

        let sibling = split(&config, &mut cells, &mut agent, source, dir).expect("split");
        let a = cells.get(source).unwrap();
        let b = cells.get(sibling).unwrap();
        assert!((a.mass - 50.0).abs() < 1e-6);
        assert!((b.mass - 50.0).abs() < 1e-6);
        assert!((a.mass + b.mass - 100.0).abs() < 1e-6);
        assert!(a.velocity.dot(dir) < 0.0, "source recoils backwards");
        assert!(b.velocity.dot(dir) > 0.0, "sibling launches forwards");
        assert!(a.locked() && b.locked());
        assert_eq!(agent.cells.len(), 2);
    }

    #[test]
    fn split_is_a_silent_noop_below_threshold() {
        let (config, mut cells, mut agent, owner) = fixture();
        let source = add_cell(&config, &mut cells, &mut agent, owner, 99.0, Vec2::ZERO);
        assert!(split(&config, &mut cells, &mut agent, source, Vec2::new(1.0, 0.0)).is_none());
        assert_eq!(cells.len(), 1);
        assert!((cells.get(source).unwrap().mass - 99.0).abs() < 1e-6);
    }

    #[test]
    fn split_is_a_silent_noop_at_max_cells() {
        let (mut config, mut cells, mut agent, owner) = fixture();
        config.max_cells = 2;
        add_cell(&config, &mut cells, &mut agent, owner, 200.0, Vec2::ZERO);
        let source = add_cell(
            &config,
            &mut cells,
            &mut agent,
            owner,
            200.0,
            Vec2::new(50.0, 0.0),
        );
        assert!(split(&config, &mut cells, &mut agent, source, Vec2::new(1.0, 0.0)).is_none());
        assert_eq!(cells.len(), 2);
    }

    #[test]
    fn recombine_lock_blocks_combine_until_elapsed() {
        let (config, mut cells, mut agent, owner) = fixture();
        let source = add_cell(&config, &mut cells, &mut agent, owner, 100.0, Vec2::ZERO);
        let sibling = split(&config, &mut cells, &mut agent, source, Vec2::new(1.0, 0.0))
            .expect("split succeeds");

        // Force full overlap so only the lock can block the merge.
        cells.get_mut(sibling).unwrap().position = Vec2::ZERO;
        assert!(combine(&config, &mut cells, &mut agent, source, sibling).is_none());

        // Simulate the lock countdown reaching zero.
        cells.get_mut(source).unwrap().recombine_lock_ms = 0.0;
        cells.get_mut(sibling).unwrap().recombine_lock_ms = 0.0;
        let survivor =
            combine(&config, &mut cells, &mut agent, source, sibling).expect("merge after lock");
        assert!((cells.get(survivor).unwrap().mass - 100.0).abs() < 1e-6);
        assert_eq!(agent.cells.len(), 1);
        assert_eq!(cells.len(), 1);
    }

    #[test]
    fn combine_requires_overlap_and_same_owner() {
        let (config, mut cells, mut agent, owner) = fixture();
        let a = add_cell(&config, &mut cells, &mut agent, owner, 80.0, Vec2::ZERO);
        let b = add_cell(
            &config,
            &mut cells,
            &mut agent,
            owner,
            80.0,
            Vec2::new(500.0, 0.0),
        );
        assert!(combine(&config, &mut cells, &mut agent, a, b).is_none());

        let mut agents: SlotMap<AgentId, ()> = SlotMap::with_key();
        // The first key of a fresh map is bit-identical to the fixture's
        // `owner`; insert twice so the stranger is a genuinely distinct key.
        agents.insert(());
        let stranger = agents.insert(());
        cells.get_mut(b).unwrap().owner = stranger;
        cells.get_mut(b).unwrap().position = Vec2::ZERO;
        assert!(combine(&config, &mut cells, &mut agent, a, b).is_none());
    }

    #[test]
    fn combine_uses_mass_weighted_position() {
        let (config, mut cells, mut agent, owner) = fixture();
        let a = add_cell(&config, &mut cells, &mut agent, owner, 30.0, Vec2::ZERO);
        let b = add_cell(
            &config,
            &mut cells,
            &mut agent,
            owner,
            10.0,
            Vec2::new(8.0, 0.0),
        );
        let survivor = combine(&config, &mut cells, &mut agent, a, b).expect("merge");
        let merged = cells.get(survivor).unwrap();
        assert!((merged.mass - 40.0).abs() < 1e-6);
        assert!((merged.position.x - 2.0).abs() < 1e-5);
    }

    #[test]
    fn eject_moves_fixed_mass_into_pickup() {
        let (config, mut cells, mut agent, owner) = fixture();
        let mut ejected = OrderedStore::new();
        let source = add_cell(&config, &mut cells, &mut agent, owner, 60.0, Vec2::ZERO);

        let id = eject(
            &config,
            &mut cells,
            &mut ejected,
            source,
            Vec2::new(1.0, 0.0),
        )
        .expect("eject");
        let cell = cells.get(source).unwrap();
        let pickup = ejected.get(id).unwrap();
        assert!((cell.mass - (60.0 - config.eject_amount)).abs() < 1e-6);
        assert!((pickup.mass - config.eject_amount).abs() < 1e-6);
        assert!(pickup.velocity.x > 0.0);
        assert!(pickup.ttl_ms > 0.0);
    }

    #[test]
    fn eject_is_a_silent_noop_when_too_light() {
        let (config, mut cells, mut agent, owner) = fixture();
        let mut ejected = OrderedStore::new();
        let source = add_cell(
            &config,
            &mut cells,
            &mut agent,
            owner,
            config.eject_amount,
            Vec2::ZERO,
        );
        assert!(
            eject(
                &config,
                &mut cells,
                &mut ejected,
                source,
                Vec2::new(1.0, 0.0)
            )
            .is_none()
        );
        assert!(ejected.is_empty());
    }

    #[test]
    fn shatter_conserves_mass_across_shards() {
        let (config, mut cells, mut agent, owner) = fixture();
        let mut rng = SmallRng::seed_from_u64(3);
        let source = add_cell(&config, &mut cells, &mut agent, owner, 120.0, Vec2::ZERO);

        let created = shatter(&config, &mut cells, &mut agent, source, &mut rng);
        assert_eq!(created.len(), config.shatter_shards - 1);
        let total: f32 = agent
            .cells
            .iter()
            .map(|&id| cells.get(id).unwrap().mass)
            .sum();
        assert!((total - 120.0).abs() < 1e-3);
        assert!(agent.cells.iter().all(|&id| cells.get(id).unwrap().locked()));
    }

    #[test]
    fn shatter_noop_when_agent_is_full() {
        let (mut config, mut cells, mut agent, owner) = fixture();
        config.max_cells = 1;
        let mut rng = SmallRng::seed_from_u64(3);
        let source = add_cell(&config, &mut cells, &mut agent, owner, 120.0, Vec2::ZERO);
        assert!(shatter(&config, &mut cells, &mut agent, source, &mut rng).is_empty());
        assert!((cells.get(source).unwrap().mass - 120.0).abs() < 1e-6);
    }

    #[test]
    fn sanitize_mass_clamps_invalid_values() {
        let config = ArenaConfig::default();
        assert_eq!(sanitize_mass(&config, f32::NAN), config.min_cell_mass);
        assert_eq!(sanitize_mass(&config, -5.0), config.min_cell_mass);
        assert_eq!(sanitize_mass(&config, f32::INFINITY), config.min_cell_mass);
        assert_eq!(sanitize_mass(&config, 42.0), 42.0);
    }

    #[test]
    fn ordered_store_iterates_in_insertion_order() {
        let mut store: OrderedStore<MatterId, u32> = OrderedStore::new();
        let a = store.insert(1);
        let b = store.insert(2);
        let c = store.insert(3);
        store.remove(b);
        let seen: Vec<u32> = store.iter_ordered().map(|(_, v)| *v).collect();
        assert_eq!(seen, vec![1, 3]);
        assert_eq!(store.ids(), &[a, c]);
        assert!(store.remove(b).is_none(), "double remove is tolerated");
    }
}
