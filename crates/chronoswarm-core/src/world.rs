//! Aggregate arena state and the fixed-phase simulation clock.
//!
//! One external driver advances the world by a delta-time each frame via
//! [`ArenaWorld::step`]. The phase order is fixed: input, AI decisions,
//! queued actions, movement integration, collision resolution, chunk
//! streaming, bookkeeping. Each phase completes across all agents before
//! the next begins; the frame boundary is the only yield point.

use crate::chunk::{ChunkCoord, ChunkManager};
use crate::config::{ArenaConfig, ArenaConfigError};
use crate::entity::{
    self, Agent, AgentId, Cell, CellId, ChronoMatter, EjectedId, EjectedMass, MatterId,
    OrderedStore, Personality, RiftId, TemporalRift,
};
use crate::events::{EventSink, NullSink, SimEvent};
use crate::math::Vec2;
use ordered_float::OrderedFloat;
use rand::{Rng, RngCore, rngs::SmallRng};
use slotmap::SecondaryMap;
use std::borrow::Cow;
use std::collections::{HashMap, VecDeque};
use std::f32::consts::TAU;
use std::fmt;
use tracing::debug;

/// High level simulation clock (ticks processed since boot).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Resets the tick counter back to zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Discrete commands supplied by the external input adapter for the
/// primary agent. Consumed (and reset) at the start of each tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PrimaryInput {
    pub target: Option<Vec2>,
    pub split: bool,
    pub eject: bool,
}

/// Read-only snapshot of one live agent, as exposed to AI drivers.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentView {
    pub id: AgentId,
    pub is_primary: bool,
    pub total_mass: f32,
    pub centroid: Vec2,
    pub largest_cell_mass: f32,
    pub cell_count: usize,
    /// Personality traits, present for AI-controlled agents only.
    pub personality: Option<Personality>,
}

/// Read-only snapshot of the world consumed by AI drivers each decision.
#[derive(Debug, Clone, Default)]
pub struct WorldView {
    pub tick: Tick,
    pub arena: Vec2,
    pub agents: Vec<AgentView>,
    pub matter: Vec<Vec2>,
    pub ejected: Vec<Vec2>,
    pub rifts: Vec<(Vec2, f32)>,
}

impl WorldView {
    /// Geometric center of the arena.
    #[must_use]
    pub fn center(&self) -> Vec2 {
        self.arena * 0.5
    }

    /// Look up an agent view by id.
    #[must_use]
    pub fn agent(&self, id: AgentId) -> Option<&AgentView> {
        self.agents.iter().find(|a| a.id == id)
    }
}

/// Same-tick coordination order applied to an allied driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RedirectOrder {
    /// The shared high-value target agent.
    pub focus: AgentId,
    /// Desired movement point for the redirected ally.
    pub target: Vec2,
}

/// Outcome of one driver decision pass.
#[derive(Debug, Clone, Default)]
pub struct DriverIntent {
    /// Desired world-space movement point, if changed.
    pub target: Option<Vec2>,
    pub split: bool,
    pub eject: bool,
    /// Coordination orders for allied agents, applied before the next
    /// agent's decision runs.
    pub redirects: Vec<(AgentId, RedirectOrder)>,
}

/// Decision logic attached to a non-primary agent.
///
/// Drivers see a read-only world snapshot and write only their own intent;
/// cross-agent influence flows through [`RedirectOrder`]s which the world
/// applies in stable agent order.
pub trait SwarmDriver: Send {
    /// Static identifier of the driver implementation.
    fn kind(&self) -> &'static str;

    /// Evaluate the next intent for agent `me`.
    fn decide(&mut self, view: &WorldView, me: AgentId, dt_ms: f32) -> DriverIntent;

    /// Accept a coordination order from an allied driver.
    fn apply_redirect(&mut self, _order: RedirectOrder) {}
}

type DriverSpawner = Box<dyn Fn(&mut dyn RngCore) -> Box<dyn SwarmDriver> + Send + Sync + 'static>;

struct DriverEntry {
    kind: Cow<'static, str>,
    spawner: DriverSpawner,
}

/// Registry owning driver factories keyed by opaque handles.
#[derive(Default)]
pub struct DriverRegistry {
    next_key: u64,
    entries: HashMap<u64, DriverEntry>,
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("next_key", &self.next_key)
            .field("entry_count", &self.entries.len())
            .finish()
    }
}

impl DriverRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new driver factory, returning its registry key.
    pub fn register<F>(&mut self, kind: impl Into<Cow<'static, str>>, factory: F) -> u64
    where
        F: Fn(&mut dyn RngCore) -> Box<dyn SwarmDriver> + Send + Sync + 'static,
    {
        let key = self.next_key;
        self.next_key += 1;
        self.entries.insert(
            key,
            DriverEntry {
                kind: kind.into(),
                spawner: Box::new(factory),
            },
        );
        key
    }

    /// Instantiate a driver using the factory referenced by `key`.
    pub fn spawn(&self, rng: &mut dyn RngCore, key: u64) -> Option<Box<dyn SwarmDriver>> {
        self.entries.get(&key).map(|entry| (entry.spawner)(rng))
    }

    /// Descriptive identifier of a registry entry.
    #[must_use]
    pub fn kind(&self, key: u64) -> Option<&str> {
        self.entries.get(&key).map(|entry| entry.kind.as_ref())
    }

    /// Returns whether a key is registered.
    #[must_use]
    pub fn contains(&self, key: u64) -> bool {
        self.entries.contains_key(&key)
    }
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub agent: AgentId,
    pub mass: f32,
    pub rank: usize,
    pub alive: bool,
}

/// Summary pushed into the in-memory ring history after each tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickSummary {
    pub tick: Tick,
    pub alive_agents: usize,
    pub cell_count: usize,
    pub total_mass: f32,
    pub matter_count: usize,
}

/// Aggregate world state: entity stores, chunk manager, driver seam, clock.
pub struct ArenaWorld {
    pub(crate) config: ArenaConfig,
    pub(crate) tick: Tick,
    pub(crate) rng: SmallRng,
    pub(crate) agents: OrderedStore<AgentId, Agent>,
    pub(crate) cells: OrderedStore<CellId, Cell>,
    pub(crate) matter: OrderedStore<MatterId, ChronoMatter>,
    pub(crate) ejected: OrderedStore<EjectedId, EjectedMass>,
    pub(crate) rifts: OrderedStore<RiftId, TemporalRift>,
    pub(crate) chunks: ChunkManager,
    pub(crate) drivers: SecondaryMap<AgentId, Box<dyn SwarmDriver>>,
    pub(crate) registry: DriverRegistry,
    pub(crate) sink: Box<dyn EventSink>,
    pub(crate) primary: Option<AgentId>,
    pub(crate) input: PrimaryInput,
    pub(crate) ranks: HashMap<AgentId, usize>,
    pub(crate) history: VecDeque<TickSummary>,
}

impl fmt::Debug for ArenaWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaWorld")
            .field("tick", &self.tick)
            .field("agent_count", &self.agents.len())
            .field("cell_count", &self.cells.len())
            .field("active_chunks", &self.chunks.active_len())
            .finish()
    }
}

impl ArenaWorld {
    /// Instantiate a new arena using the supplied configuration.
    pub fn new(config: ArenaConfig) -> Result<Self, ArenaConfigError> {
        Self::with_sink(config, Box::new(NullSink))
    }

    /// Instantiate a new arena with a notification sink attached.
    pub fn with_sink(
        config: ArenaConfig,
        sink: Box<dyn EventSink>,
    ) -> Result<Self, ArenaConfigError> {
        config.validate()?;
        let rng = config.seeded_rng();
        let history_capacity = config.history_capacity;
        Ok(Self {
            config,
            tick: Tick::zero(),
            rng,
            agents: OrderedStore::new(),
            cells: OrderedStore::new(),
            matter: OrderedStore::new(),
            ejected: OrderedStore::new(),
            rifts: OrderedStore::new(),
            chunks: ChunkManager::new(),
            drivers: SecondaryMap::new(),
            registry: DriverRegistry::new(),
            sink,
            primary: None,
            input: PrimaryInput::default(),
            ranks: HashMap::new(),
            history: VecDeque::with_capacity(history_capacity),
        })
    }

    /// Spawn an agent with a single starting cell at `position`.
    pub fn spawn_agent(&mut self, position: Vec2, is_primary: bool) -> AgentId {
        let personality = Personality::sample(&mut self.rng);
        let id = self.agents.insert(Agent::new(personality, is_primary));
        let cell = Cell::new(id, self.config.spawn_mass, position, &self.config);
        let cell_id = self.cells.insert(cell);
        self.agents
            .get_mut(id)
            .expect("freshly inserted agent")
            .cells
            .push(cell_id);
        if is_primary {
            self.primary = Some(id);
        }
        id
    }

    /// Bind a driver from the registry to the specified agent.
    pub fn bind_agent_driver(&mut self, id: AgentId, key: u64) -> bool {
        if !self.agents.contains(id) {
            return false;
        }
        match self.registry.spawn(&mut self.rng, key) {
            Some(driver) => {
                self.drivers.insert(id, driver);
                true
            }
            None => false,
        }
    }

    /// Attach a concrete driver instance to an agent directly.
    pub fn attach_driver(&mut self, id: AgentId, driver: Box<dyn SwarmDriver>) -> bool {
        if !self.agents.contains(id) {
            return false;
        }
        self.drivers.insert(id, driver);
        true
    }

    /// Merge input-adapter commands for the primary agent into this tick.
    pub fn set_primary_input(&mut self, input: PrimaryInput) {
        if input.target.is_some() {
            self.input.target = input.target;
        }
        self.input.split |= input.split;
        self.input.eject |= input.eject;
    }

    /// Execute one simulation tick, returning its summary.
    pub fn step(&mut self, dt_ms: f32) -> TickSummary {
        self.tick = self.tick.next();
        self.stage_input();
        self.stage_decisions(dt_ms);
        self.stage_actions();
        self.stage_movement(dt_ms);
        self.stage_collisions();
        self.stage_chunks();
        self.stage_bookkeeping()
    }

    fn stage_input(&mut self) {
        let input = std::mem::take(&mut self.input);
        let Some(primary) = self.primary else {
            return;
        };
        if let Some(agent) = self.agents.get_mut(primary) {
            if !agent.alive {
                return;
            }
            if let Some(target) = input.target {
                agent.target = Some(target);
            }
            agent.pending_split |= input.split;
            agent.pending_eject |= input.eject;
        }
    }

    /// Produce the read-only snapshot handed to every driver this tick.
    #[must_use]
    pub fn view(&self) -> WorldView {
        let mut agents = Vec::with_capacity(self.agents.len());
        for (id, agent) in self.agents.iter_ordered() {
            if !agent.alive {
                continue;
            }
            let mut total = 0.0;
            let mut weighted = Vec2::ZERO;
            let mut largest = 0.0_f32;
            for &cell_id in &agent.cells {
                if let Some(cell) = self.cells.get(cell_id) {
                    total += cell.mass;
                    weighted += cell.position * cell.mass;
                    largest = largest.max(cell.mass);
                }
            }
            if total <= 0.0 {
                continue;
            }
            agents.push(AgentView {
                id,
                is_primary: agent.is_primary,
                total_mass: total,
                centroid: weighted * (1.0 / total),
                largest_cell_mass: largest,
                cell_count: agent.cells.len(),
                personality: (!agent.is_primary).then_some(agent.personality),
            });
        }
        WorldView {
            tick: self.tick,
            arena: Vec2::new(self.config.arena_width, self.config.arena_height),
            agents,
            matter: self.matter.iter_ordered().map(|(_, m)| m.position).collect(),
            ejected: self
                .ejected
                .iter_ordered()
                .map(|(_, e)| e.position)
                .collect(),
            rifts: self
                .rifts
                .iter_ordered()
                .map(|(_, r)| (r.position, r.energy))
                .collect(),
        }
    }

    fn stage_decisions(&mut self, dt_ms: f32) {
        if self.drivers.is_empty() {
            return;
        }
        let view = self.view();
        let order: Vec<AgentId> = self.agents.ids().to_vec();
        for id in order {
            let skip = self
                .agents
                .get(id)
                .is_none_or(|agent| agent.is_primary || !agent.alive);
            if skip {
                continue;
            }
            let Some(mut driver) = self.drivers.remove(id) else {
                continue;
            };
            let intent = driver.decide(&view, id, dt_ms);
            self.drivers.insert(id, driver);
            self.apply_intent(id, intent);
        }
    }

    fn apply_intent(&mut self, id: AgentId, intent: DriverIntent) {
        if let Some(agent) = self.agents.get_mut(id) {
            if let Some(target) = intent.target {
                agent.target = Some(target);
            }
            agent.pending_split |= intent.split;
            agent.pending_eject |= intent.eject;
        }
        for (ally, order) in intent.redirects {
            if ally == id {
                continue;
            }
            if let Some(driver) = self.drivers.get_mut(ally) {
                driver.apply_redirect(order);
                if let Some(agent) = self.agents.get_mut(ally) {
                    if agent.alive && !agent.is_primary {
                        agent.target = Some(order.target);
                    }
                }
            }
        }
    }

    fn stage_actions(&mut self) {
        let order: Vec<AgentId> = self.agents.ids().to_vec();
        for id in order {
            let (wants_split, wants_eject, aim, owned, cooldown_ready) = {
                let Some(agent) = self.agents.get_mut(id) else {
                    continue;
                };
                let wants_split = std::mem::take(&mut agent.pending_split);
                let wants_eject = std::mem::take(&mut agent.pending_eject);
                if !agent.alive || (!wants_split && !wants_eject) {
                    continue;
                }
                (
                    wants_split,
                    wants_eject,
                    agent.target,
                    agent.cells.clone(),
                    agent.split_cooldown_ms <= 0.0,
                )
            };

            if wants_split && cooldown_ready {
                let mut performed = false;
                for &cell_id in &owned {
                    let direction =
                        Self::aim_direction(&mut self.rng, &self.cells, cell_id, aim);
                    let Some(agent) = self.agents.get_mut(id) else {
                        break;
                    };
                    if let Some(sibling) =
                        entity::split(&self.config, &mut self.cells, agent, cell_id, direction)
                    {
                        performed = true;
                        self.sink.on_event(&SimEvent::Split {
                            agent: id,
                            source: cell_id,
                            sibling,
                        });
                    }
                }
                // The cooldown is only charged by an actual split; a
                // rejected attempt leaves the agent free to retry.
                if performed {
                    if let Some(agent) = self.agents.get_mut(id) {
                        agent.split_cooldown_ms = self.config.split_cooldown_ms;
                    }
                }
            }

            if wants_eject {
                for &cell_id in &owned {
                    let direction =
                        Self::aim_direction(&mut self.rng, &self.cells, cell_id, aim);
                    entity::eject(
                        &self.config,
                        &mut self.cells,
                        &mut self.ejected,
                        cell_id,
                        direction,
                    );
                }
            }
        }
    }

    /// Direction of a split/eject action: toward the aim point, or random.
    fn aim_direction(
        rng: &mut SmallRng,
        cells: &OrderedStore<CellId, Cell>,
        cell_id: CellId,
        aim: Option<Vec2>,
    ) -> Vec2 {
        let fallback = Vec2::from_angle(rng.random_range(0.0..TAU));
        let Some(aim) = aim else {
            return fallback;
        };
        let Some(cell) = cells.get(cell_id) else {
            return fallback;
        };
        let dir = (aim - cell.position).normalized();
        if dir == Vec2::ZERO { fallback } else { dir }
    }

    fn stage_movement(&mut self, dt_ms: f32) {
        let dt = dt_ms / 1000.0;
        let (width, height) = (self.config.arena_width, self.config.arena_height);
        let blend = (self.config.steering_rate * dt).min(1.0);
        let order: Vec<AgentId> = self.agents.ids().to_vec();
        for id in order {
            let Some(agent) = self.agents.get_mut(id) else {
                continue;
            };
            if !agent.alive {
                continue;
            }
            agent.split_cooldown_ms = (agent.split_cooldown_ms - dt_ms).max(0.0);
            let target = agent.target;
            for &cell_id in &agent.cells {
                let Some(cell) = self.cells.get_mut(cell_id) else {
                    continue;
                };
                cell.recombine_lock_ms = (cell.recombine_lock_ms - dt_ms).max(0.0);
                let desired = match target {
                    Some(point) => {
                        let offset = point - cell.position;
                        if offset.length_sq() < 1.0 {
                            Vec2::ZERO
                        } else {
                            let speed = self.config.base_speed / cell.mass.sqrt().max(1.0);
                            offset.normalized() * speed
                        }
                    }
                    None => Vec2::ZERO,
                };
                cell.velocity = cell.velocity.lerp(desired, blend);
                cell.position += cell.velocity * dt;
                // A cell wider than the arena pins to the midline; the
                // bounds must never invert.
                cell.position = cell.position.clamped(
                    Vec2::new(cell.radius.min(width * 0.5), cell.radius.min(height * 0.5)),
                    Vec2::new(
                        (width - cell.radius).max(width * 0.5),
                        (height - cell.radius).max(height * 0.5),
                    ),
                );
            }
        }

        let drifting: Vec<EjectedId> = self.ejected.ids().to_vec();
        for id in drifting {
            if let Some(pickup) = self.ejected.get_mut(id) {
                pickup.position += pickup.velocity * dt;
                pickup.position = pickup
                    .position
                    .clamped(Vec2::ZERO, Vec2::new(width, height));
                let decay = (1.0 - self.config.ejected_damping * dt).max(0.0);
                pickup.velocity = pickup.velocity * decay;
                pickup.ttl_ms -= dt_ms;
            }
        }
    }

    fn stage_chunks(&mut self) {
        let Some(primary) = self.primary else {
            return;
        };
        let centroid = {
            let Some(agent) = self.agents.get(primary) else {
                return;
            };
            if !agent.alive {
                return;
            }
            let mut total = 0.0;
            let mut weighted = Vec2::ZERO;
            for &cell_id in &agent.cells {
                if let Some(cell) = self.cells.get(cell_id) {
                    total += cell.mass;
                    weighted += cell.position * cell.mass;
                }
            }
            if total <= 0.0 {
                return;
            }
            weighted * (1.0 / total)
        };
        self.chunks.update(
            &self.config,
            centroid,
            &mut self.matter,
            &mut self.rifts,
            &mut self.rng,
            self.sink.as_mut(),
        );
    }

    fn stage_bookkeeping(&mut self) -> TickSummary {
        let expired: Vec<EjectedId> = self
            .ejected
            .iter_ordered()
            .filter(|(_, pickup)| pickup.ttl_ms <= 0.0)
            .map(|(id, _)| id)
            .collect();
        for id in expired {
            self.ejected.remove(id);
        }

        let order: Vec<AgentId> = self.agents.ids().to_vec();
        let mut alive_agents = 0;
        let mut total_mass = 0.0;
        for id in order {
            let score: f32 = {
                let Some(agent) = self.agents.get(id) else {
                    continue;
                };
                agent
                    .cells
                    .iter()
                    .filter_map(|&cell_id| self.cells.get(cell_id))
                    .map(|cell| cell.mass)
                    .sum()
            };
            let Some(agent) = self.agents.get_mut(id) else {
                continue;
            };
            agent.score = score;
            if agent.alive && agent.cells.is_empty() {
                agent.alive = false;
                debug!(?id, "agent died with no remaining cells");
                self.sink.on_event(&SimEvent::AgentDied {
                    agent: id,
                    killer: None,
                });
            }
            if agent.alive {
                alive_agents += 1;
                total_mass += score;
            } else {
                self.drivers.remove(id);
            }
        }

        self.refresh_ranks();

        let summary = TickSummary {
            tick: self.tick,
            alive_agents,
            cell_count: self.cells.len(),
            total_mass,
            matter_count: self.matter.len(),
        };
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(summary.clone());
        summary
    }

    /// Recompute leaderboard ranks: descending total mass, ties broken by
    /// previous rank, then by agent insertion order.
    fn refresh_ranks(&mut self) {
        let previous = std::mem::take(&mut self.ranks);
        let mut entries: Vec<(usize, AgentId, f32)> = self
            .agents
            .iter_ordered()
            .enumerate()
            .map(|(index, (id, agent))| (index, id, agent.score))
            .collect();
        entries.sort_by(|a, b| {
            OrderedFloat(b.2)
                .cmp(&OrderedFloat(a.2))
                .then_with(|| {
                    let rank_a = previous.get(&a.1).copied().unwrap_or(usize::MAX);
                    let rank_b = previous.get(&b.1).copied().unwrap_or(usize::MAX);
                    rank_a.cmp(&rank_b)
                })
                .then_with(|| a.0.cmp(&b.0))
        });
        for (rank, (_, id, _)) in entries.iter().enumerate() {
            self.ranks.insert(*id, rank);
        }
    }

    /// Ranked leaderboard rows (rank 0 is the heaviest agent).
    #[must_use]
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut rows: Vec<LeaderboardEntry> = self
            .agents
            .iter_ordered()
            .map(|(id, agent)| LeaderboardEntry {
                agent: id,
                mass: agent.score,
                rank: self.ranks.get(&id).copied().unwrap_or(usize::MAX),
                alive: agent.alive,
            })
            .collect();
        rows.sort_by_key(|row| row.rank);
        rows
    }

    /// Computed rank for one agent, when known.
    #[must_use]
    pub fn rank_of(&self, id: AgentId) -> Option<usize> {
        self.ranks.get(&id).copied()
    }

    /// Returns an immutable reference to configuration.
    #[must_use]
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Current simulation tick.
    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// The primary (tracked) agent, if one was spawned.
    #[must_use]
    pub const fn primary(&self) -> Option<AgentId> {
        self.primary
    }

    /// Read-only access to the agent store.
    #[must_use]
    pub fn agents(&self) -> &OrderedStore<AgentId, Agent> {
        &self.agents
    }

    /// Mutable access to the agent store.
    #[must_use]
    pub fn agents_mut(&mut self) -> &mut OrderedStore<AgentId, Agent> {
        &mut self.agents
    }

    /// Read-only access to the cell store.
    #[must_use]
    pub fn cells(&self) -> &OrderedStore<CellId, Cell> {
        &self.cells
    }

    /// Mutable access to the cell store.
    #[must_use]
    pub fn cells_mut(&mut self) -> &mut OrderedStore<CellId, Cell> {
        &mut self.cells
    }

    /// Read-only access to chrono-matter pickups.
    #[must_use]
    pub fn matter(&self) -> &OrderedStore<MatterId, ChronoMatter> {
        &self.matter
    }

    /// Mutable access to chrono-matter pickups.
    #[must_use]
    pub fn matter_mut(&mut self) -> &mut OrderedStore<MatterId, ChronoMatter> {
        &mut self.matter
    }

    /// Read-only access to drifting ejected mass.
    #[must_use]
    pub fn ejected(&self) -> &OrderedStore<EjectedId, EjectedMass> {
        &self.ejected
    }

    /// Mutable access to drifting ejected mass.
    #[must_use]
    pub fn ejected_mut(&mut self) -> &mut OrderedStore<EjectedId, EjectedMass> {
        &mut self.ejected
    }

    /// Read-only access to temporal rifts.
    #[must_use]
    pub fn rifts(&self) -> &OrderedStore<RiftId, TemporalRift> {
        &self.rifts
    }

    /// Mutable access to temporal rifts.
    #[must_use]
    pub fn rifts_mut(&mut self) -> &mut OrderedStore<RiftId, TemporalRift> {
        &mut self.rifts
    }

    /// Chunk activity diagnostics.
    #[must_use]
    pub fn chunks(&self) -> &ChunkManager {
        &self.chunks
    }

    /// Active chunk coordinates, sorted.
    #[must_use]
    pub fn active_chunks(&self) -> Vec<ChunkCoord> {
        self.chunks.active_coords()
    }

    /// Immutable access to the driver registry.
    #[must_use]
    pub fn driver_registry(&self) -> &DriverRegistry {
        &self.registry
    }

    /// Mutable access to the driver registry.
    #[must_use]
    pub fn driver_registry_mut(&mut self) -> &mut DriverRegistry {
        &mut self.registry
    }

    /// Replace the notification sink.
    pub fn set_event_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sink = sink;
    }

    /// Iterate over retained tick summaries.
    pub fn history(&self) -> impl Iterator<Item = &TickSummary> {
        self.history.iter()
    }

    /// Borrow the world RNG mutably for deterministic sampling.
    #[must_use]
    pub fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }
}
