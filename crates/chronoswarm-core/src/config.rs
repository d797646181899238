//! Static arena configuration and validation.

use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when validating arena configuration.
#[derive(Debug, Error)]
pub enum ArenaConfigError {
    /// Indicates a configuration value that cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Static configuration for a Chronoswarm arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaConfig {
    /// Width of the arena in world units.
    pub arena_width: f32,
    /// Height of the arena in world units.
    pub arena_height: f32,
    /// Optional RNG seed for reproducible simulations.
    pub rng_seed: Option<u64>,

    /// Scale factor `k` in `radius = k * sqrt(mass)`.
    pub radius_scale: f32,
    /// Hard floor applied when sanitizing cell mass.
    pub min_cell_mass: f32,
    /// Starting mass for freshly spawned agents.
    pub spawn_mass: f32,
    /// A cell must carry at least twice this mass to split.
    pub min_split_mass: f32,
    /// Maximum number of cells a single agent may own.
    pub max_cells: usize,
    /// Outward velocity granted to a freshly split sibling cell.
    pub split_impulse: f32,
    /// Opposing recoil applied to the splitting source cell.
    pub split_recoil: f32,
    /// Cooldown before cells from the same split may recombine.
    pub recombine_lock_ms: f32,
    /// Minimum delay between split actions of the same agent.
    pub split_cooldown_ms: f32,

    /// Mass removed from a cell per eject action.
    pub eject_amount: f32,
    /// Outward velocity of ejected mass pickups.
    pub eject_impulse: f32,
    /// Lifetime of ejected mass pickups before they evaporate.
    pub eject_ttl_ms: f32,

    /// Predator mass must exceed prey mass times this ratio.
    pub consume_ratio: f32,
    /// Fraction of consumed mass credited to the predator.
    pub consume_efficiency: f32,

    /// Mass of a single chrono-matter pickup.
    pub matter_mass: f32,
    /// Mass of the rare relic pickup placed during chunk activation.
    pub relic_mass: f32,

    /// Energy a temporal rift starts with.
    pub rift_base_energy: f32,
    /// A cell triggers a rift when its mass exceeds `energy * ratio`.
    pub rift_trigger_ratio: f32,
    /// Collision radius of temporal rifts.
    pub rift_radius: f32,
    /// Number of shards a shattered cell breaks into (upper bound).
    pub shatter_shards: usize,

    /// Edge length of one streaming chunk in world units.
    pub chunk_size: f32,
    /// Chebyshev radius (in chunks) around the tracked agent kept live.
    pub chunk_load_radius: i32,
    /// Active chunks farther than this (in chunks) are unloaded.
    pub chunk_unload_radius: i32,
    /// Minimum chrono-matter generated per chunk activation.
    pub chunk_matter_min: u32,
    /// Maximum chrono-matter generated per chunk activation.
    pub chunk_matter_max: u32,
    /// Probability of a temporal rift spawning in a fresh chunk.
    pub chunk_rift_chance: f64,
    /// Probability of a relic pickup spawning in a fresh chunk.
    pub chunk_relic_chance: f64,
    /// Bounded placement retries for relic pickups before skipping.
    pub relic_place_retries: u32,

    /// Base cell speed in world units per second (scaled down by mass).
    pub base_speed: f32,
    /// Steering responsiveness: fraction of velocity gap closed per second.
    pub steering_rate: f32,
    /// Per-second velocity decay applied to drifting ejected mass.
    pub ejected_damping: f32,

    /// Milliseconds between AI decision re-evaluations.
    pub decision_interval_ms: f32,
    /// Maximum number of recent tick summaries retained in memory.
    pub history_capacity: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            arena_width: 8_000.0,
            arena_height: 8_000.0,
            rng_seed: None,
            radius_scale: 4.0,
            min_cell_mass: 1.0,
            spawn_mass: 25.0,
            min_split_mass: 20.0,
            max_cells: 16,
            split_impulse: 320.0,
            split_recoil: 60.0,
            recombine_lock_ms: 8_000.0,
            split_cooldown_ms: 500.0,
            eject_amount: 12.0,
            eject_impulse: 420.0,
            eject_ttl_ms: 20_000.0,
            consume_ratio: 1.1,
            consume_efficiency: 0.8,
            matter_mass: 1.0,
            relic_mass: 40.0,
            rift_base_energy: 100.0,
            rift_trigger_ratio: 1.15,
            rift_radius: 35.0,
            shatter_shards: 6,
            chunk_size: 500.0,
            chunk_load_radius: 2,
            chunk_unload_radius: 3,
            chunk_matter_min: 4,
            chunk_matter_max: 12,
            chunk_rift_chance: 0.25,
            chunk_relic_chance: 0.05,
            relic_place_retries: 8,
            base_speed: 900.0,
            steering_rate: 4.0,
            ejected_damping: 1.5,
            decision_interval_ms: 250.0,
            history_capacity: 256,
        }
    }
}

impl ArenaConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ArenaConfigError> {
        if self.arena_width <= 0.0 || self.arena_height <= 0.0 {
            return Err(ArenaConfigError::InvalidConfig(
                "arena dimensions must be positive",
            ));
        }
        if self.chunk_size <= 0.0 {
            return Err(ArenaConfigError::InvalidConfig(
                "chunk_size must be positive",
            ));
        }
        if self.chunk_load_radius < 0 || self.chunk_unload_radius < self.chunk_load_radius {
            return Err(ArenaConfigError::InvalidConfig(
                "chunk_unload_radius must be at least chunk_load_radius",
            ));
        }
        if self.chunk_matter_max < self.chunk_matter_min {
            return Err(ArenaConfigError::InvalidConfig(
                "chunk_matter_max must be at least chunk_matter_min",
            ));
        }
        if !(0.0..=1.0).contains(&self.chunk_rift_chance)
            || !(0.0..=1.0).contains(&self.chunk_relic_chance)
        {
            return Err(ArenaConfigError::InvalidConfig(
                "chunk content probabilities must lie in [0, 1]",
            ));
        }
        if self.radius_scale <= 0.0 {
            return Err(ArenaConfigError::InvalidConfig(
                "radius_scale must be positive",
            ));
        }
        if self.min_cell_mass <= 0.0 || self.spawn_mass < self.min_cell_mass {
            return Err(ArenaConfigError::InvalidConfig(
                "spawn_mass must be at least the positive min_cell_mass",
            ));
        }
        if self.min_split_mass <= 0.0 || self.max_cells == 0 {
            return Err(ArenaConfigError::InvalidConfig(
                "split thresholds must be positive and max_cells non-zero",
            ));
        }
        if self.eject_amount <= 0.0 || self.eject_ttl_ms <= 0.0 {
            return Err(ArenaConfigError::InvalidConfig(
                "eject_amount and eject_ttl_ms must be positive",
            ));
        }
        if self.consume_ratio <= 1.0 {
            return Err(ArenaConfigError::InvalidConfig(
                "consume_ratio must exceed 1.0",
            ));
        }
        if !(0.0..1.0).contains(&self.consume_efficiency) {
            return Err(ArenaConfigError::InvalidConfig(
                "consume_efficiency must lie in [0, 1)",
            ));
        }
        if self.shatter_shards < 2 {
            return Err(ArenaConfigError::InvalidConfig(
                "shatter_shards must be at least 2",
            ));
        }
        if self.rift_base_energy <= 0.0
            || self.rift_trigger_ratio <= 0.0
            || self.rift_radius <= 0.0
        {
            return Err(ArenaConfigError::InvalidConfig(
                "rift parameters must be positive",
            ));
        }
        if self.base_speed <= 0.0 || self.steering_rate <= 0.0 {
            return Err(ArenaConfigError::InvalidConfig(
                "movement parameters must be positive",
            ));
        }
        if self.decision_interval_ms <= 0.0 {
            return Err(ArenaConfigError::InvalidConfig(
                "decision_interval_ms must be positive",
            ));
        }
        if self.history_capacity == 0 {
            return Err(ArenaConfigError::InvalidConfig(
                "history_capacity must be non-zero",
            ));
        }
        Ok(())
    }

    /// Returns the configured RNG, generating a seed from entropy if absent.
    #[must_use]
    pub fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }

    /// Derived cell radius for a given mass.
    #[must_use]
    pub fn radius_for_mass(&self, mass: f32) -> f32 {
        self.radius_scale * mass.max(0.0).sqrt()
    }
}
