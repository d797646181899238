//! Core simulation types shared across the Chronoswarm workspace.
//!
//! The crate owns the mass economy, the per-tick collision resolver, the
//! spatial chunk streaming and the fixed-phase simulation clock. Swarm AI
//! plugs in through the [`SwarmDriver`] trait so that decision logic lives
//! in its own crate, mirroring how input adapters stay outside the core.

pub mod chunk;
pub mod collision;
pub mod config;
pub mod entity;
pub mod events;
pub mod math;
pub mod world;

pub use chunk::{Chunk, ChunkCoord, ChunkManager};
pub use config::{ArenaConfig, ArenaConfigError};
pub use entity::{
    Agent, AgentId, Cell, CellId, ChronoMatter, EjectedId, EjectedMass, MatterId, OrderedStore,
    Personality, RiftId, TemporalRift,
};
pub use events::{EventSink, NullSink, SimEvent};
pub use math::Vec2;
pub use world::{
    AgentView, ArenaWorld, DriverIntent, DriverRegistry, LeaderboardEntry, PrimaryInput,
    RedirectOrder, SwarmDriver, Tick, TickSummary, WorldView,
};
