//! Notification events emitted by the simulation core.

use crate::chunk::ChunkCoord;
use crate::entity::{AgentId, CellId};

/// Events delivered to the registered sink as side effects are applied.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    /// A cell halved itself into a sibling.
    Split {
        agent: AgentId,
        source: CellId,
        sibling: CellId,
    },
    /// Two cells of the same agent recombined.
    Merge {
        agent: AgentId,
        survivor: CellId,
        mass: f32,
    },
    /// A cell of `victim` was consumed by a cell of `attacker`.
    Consumed {
        attacker: AgentId,
        victim: AgentId,
        mass_delta: f32,
    },
    /// A cell shattered against a temporal rift.
    Shattered { agent: AgentId, shards: usize },
    /// An agent lost its last cell.
    AgentDied {
        agent: AgentId,
        killer: Option<AgentId>,
    },
    /// A chunk entered the live set.
    ChunkLoaded { coord: ChunkCoord },
    /// A chunk left the live set along with its owned entities.
    ChunkUnloaded { coord: ChunkCoord },
}

/// Notification sink invoked synchronously during the tick.
///
/// Implementations must not block; the default sink discards everything so
/// an unregistered listener costs nothing.
pub trait EventSink: Send {
    fn on_event(&mut self, event: &SimEvent);
}

/// No-op event sink.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn on_event(&mut self, _event: &SimEvent) {}
}
