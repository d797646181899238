//! Personality-weighted decision drivers for Chronoswarm AI agents.
//!
//! Each non-primary agent runs a [`PersonalityController`]: perception
//! scans a read-only world snapshot into scored candidate lists, a
//! data-driven rule table picks the next state, and the coordination
//! layer may redirect nearby allies onto a shared target within the same
//! tick. Controllers write only their own intent; cross-agent influence
//! travels through redirect orders applied by the world in stable order.

pub mod controller;
pub mod coordination;
pub mod perception;
pub mod rules;

pub use controller::{AiConfig, PersonalityController};
pub use coordination::TerritoryClaim;
pub use perception::{Candidate, Perception};
pub use rules::{RuleContext, SwarmState, evaluate_transition};

use chronoswarm_core::ArenaWorld;

/// Identifier reported by [`PersonalityController::kind`].
pub const DRIVER_KIND: &str = "personality.fsm";

/// Register the default personality driver, returning its registry key.
///
/// The controllers' reaction time follows the arena's
/// `decision_interval_ms`; the remaining tunables are [`AiConfig`]
/// defaults.
pub fn register_personality_driver(world: &mut ArenaWorld) -> u64 {
    let config = AiConfig {
        decision_interval_ms: world.config().decision_interval_ms,
        ..AiConfig::default()
    };
    world.driver_registry_mut().register(DRIVER_KIND, move |rng| {
        Box::new(PersonalityController::from_rng(config.clone(), rng))
    })
}
