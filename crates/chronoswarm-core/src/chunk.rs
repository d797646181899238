//! Spatial chunk streaming: only a neighborhood of the arena stays live.

use crate::config::ArenaConfig;
use crate::entity::{ChronoMatter, MatterId, OrderedStore, RiftId, TemporalRift};
use crate::events::{EventSink, SimEvent};
use crate::math::Vec2;
use rand::Rng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Grid coordinate of one streaming chunk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    /// Chebyshev distance to another chunk coordinate.
    #[must_use]
    pub fn chebyshev(self, other: Self) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

/// A live chunk and the entity handles it owns.
#[derive(Debug, Default)]
pub struct Chunk {
    pub matter: Vec<MatterId>,
    pub rifts: Vec<RiftId>,
}

/// Streams chunk-owned content in and out around the tracked agent.
///
/// The active set is recomputed only when the tracked agent crosses a chunk
/// boundary, never every tick. Content generation is probabilistic per
/// activation; a chunk reloaded later may roll different content.
#[derive(Debug, Default)]
pub struct ChunkManager {
    tracked: Option<ChunkCoord>,
    active: HashMap<ChunkCoord, Chunk>,
}

impl ChunkManager {
    /// Create a manager with no active chunks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Chunk coordinate containing a world position.
    #[must_use]
    pub fn coord_of(config: &ArenaConfig, position: Vec2) -> ChunkCoord {
        ChunkCoord {
            x: (position.x / config.chunk_size).floor() as i32,
            y: (position.y / config.chunk_size).floor() as i32,
        }
    }

    fn in_bounds(config: &ArenaConfig, coord: ChunkCoord) -> bool {
        let cols = (config.arena_width / config.chunk_size).ceil() as i32;
        let rows = (config.arena_height / config.chunk_size).ceil() as i32;
        (0..cols).contains(&coord.x) && (0..rows).contains(&coord.y)
    }

    /// Number of currently active chunks.
    #[must_use]
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Returns true when `coord` is in the live set.
    #[must_use]
    pub fn is_active(&self, coord: ChunkCoord) -> bool {
        self.active.contains_key(&coord)
    }

    /// Active chunk coordinates for diagnostics, sorted for stable output.
    #[must_use]
    pub fn active_coords(&self) -> Vec<ChunkCoord> {
        let mut coords: Vec<ChunkCoord> = self.active.keys().copied().collect();
        coords.sort_by_key(|c| (c.x, c.y));
        coords
    }

    /// Borrow a live chunk's owned handles.
    #[must_use]
    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.active.get(&coord)
    }

    /// The chunk coordinate of the tracked agent at the last recompute.
    #[must_use]
    pub fn tracked(&self) -> Option<ChunkCoord> {
        self.tracked
    }

    /// Recompute the active set for the tracked agent's position.
    pub fn update(
        &mut self,
        config: &ArenaConfig,
        tracked_position: Vec2,
        matter: &mut OrderedStore<MatterId, ChronoMatter>,
        rifts: &mut OrderedStore<RiftId, TemporalRift>,
        rng: &mut SmallRng,
        sink: &mut dyn EventSink,
    ) {
        let coord = Self::coord_of(config, tracked_position);
        if self.tracked == Some(coord) {
            return;
        }
        self.tracked = Some(coord);

        let radius = config.chunk_load_radius;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let candidate = ChunkCoord {
                    x: coord.x + dx,
                    y: coord.y + dy,
                };
                if Self::in_bounds(config, candidate) {
                    self.load(config, candidate, matter, rifts, rng, sink);
                }
            }
        }

        let mut stale: Vec<ChunkCoord> = self
            .active
            .keys()
            .copied()
            .filter(|c| c.chebyshev(coord) > config.chunk_unload_radius)
            .collect();
        stale.sort_by_key(|c| (c.x, c.y));
        for coord in stale {
            self.unload(coord, matter, rifts, sink);
        }
    }

    /// Activate a chunk, generating its owned entities. Idempotent.
    pub fn load(
        &mut self,
        config: &ArenaConfig,
        coord: ChunkCoord,
        matter: &mut OrderedStore<MatterId, ChronoMatter>,
        rifts: &mut OrderedStore<RiftId, TemporalRift>,
        rng: &mut SmallRng,
        sink: &mut dyn EventSink,
    ) {
        if self.active.contains_key(&coord) {
            return;
        }
        let chunk = Self::generate(config, coord, matter, rifts, rng);
        self.active.insert(coord, chunk);
        debug!(x = coord.x, y = coord.y, "chunk loaded");
        sink.on_event(&SimEvent::ChunkLoaded { coord });
    }

    /// Deactivate a chunk, removing every entity it owns from the live lists.
    pub fn unload(
        &mut self,
        coord: ChunkCoord,
        matter: &mut OrderedStore<MatterId, ChronoMatter>,
        rifts: &mut OrderedStore<RiftId, TemporalRift>,
        sink: &mut dyn EventSink,
    ) {
        let Some(chunk) = self.active.remove(&coord) else {
            return;
        };
        // Handles already consumed by collisions remove as a no-op.
        for id in chunk.matter {
            matter.remove(id);
        }
        for id in chunk.rifts {
            rifts.remove(id);
        }
        debug!(x = coord.x, y = coord.y, "chunk unloaded");
        sink.on_event(&SimEvent::ChunkUnloaded { coord });
    }

    fn generate(
        config: &ArenaConfig,
        coord: ChunkCoord,
        matter: &mut OrderedStore<MatterId, ChronoMatter>,
        rifts: &mut OrderedStore<RiftId, TemporalRift>,
        rng: &mut SmallRng,
    ) -> Chunk {
        let origin = Vec2::new(
            coord.x as f32 * config.chunk_size,
            coord.y as f32 * config.chunk_size,
        );
        let random_point = |rng: &mut SmallRng| {
            origin
                + Vec2::new(
                    rng.random_range(0.0..config.chunk_size),
                    rng.random_range(0.0..config.chunk_size),
                )
        };

        let mut chunk = Chunk::default();
        let count = rng.random_range(config.chunk_matter_min..=config.chunk_matter_max);
        for _ in 0..count {
            let id = matter.insert(ChronoMatter {
                position: random_point(rng),
                mass: config.matter_mass,
            });
            chunk.matter.push(id);
        }

        if rng.random_bool(config.chunk_rift_chance) {
            let id = rifts.insert(TemporalRift {
                position: random_point(rng),
                radius: config.rift_radius,
                energy: config.rift_base_energy,
            });
            chunk.rifts.push(id);
        }

        if rng.random_bool(config.chunk_relic_chance) {
            if let Some(position) = Self::place_relic(config, &chunk, rifts, rng, &random_point) {
                let id = matter.insert(ChronoMatter {
                    position,
                    mass: config.relic_mass,
                });
                chunk.matter.push(id);
            } else {
                // Optional content only; the chunk activates without it.
                debug!(x = coord.x, y = coord.y, "relic placement exhausted");
            }
        }

        chunk
    }

    /// Find a relic position clear of the chunk's rifts within bounded retries.
    fn place_relic(
        config: &ArenaConfig,
        chunk: &Chunk,
        rifts: &OrderedStore<RiftId, TemporalRift>,
        rng: &mut SmallRng,
        random_point: &impl Fn(&mut SmallRng) -> Vec2,
    ) -> Option<Vec2> {
        let clearance = config.rift_radius * 2.0;
        for _ in 0..config.relic_place_retries {
            let candidate = random_point(rng);
            let blocked = chunk.rifts.iter().any(|&id| {
                rifts
                    .get(id)
                    .is_some_and(|rift| rift.position.distance(candidate) < clearance)
            });
            if !blocked {
                return Some(candidate);
            }
        }
        None
    }
}
