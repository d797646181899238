//! Data-driven state transition table.
//!
//! Each transition is a `(from-states, predicate, target)` row evaluated
//! in ascending priority order once per decision tick; the first matching
//! row wins. New behaviors are added as rows, not as nested branches.

use chronoswarm_core::Personality;
use serde::{Deserialize, Serialize};

use crate::perception::Perception;

/// Behavioral states of an AI-controlled swarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwarmState {
    /// Initial state: roam toward randomized, center-biased targets.
    Wandering,
    /// Chase the highest-scored prey candidate.
    Hunting,
    /// Run along the inverse-weighted average direction away from threats.
    Fleeing,
    /// Collect the nearest consumable resource.
    Feeding,
    /// Hold a claimed region against nearby swarms.
    TerritoryDefense,
}

/// Everything a transition predicate may inspect.
#[derive(Debug)]
pub struct RuleContext<'a> {
    pub perception: &'a Perception,
    pub personality: Personality,
    pub state: SwarmState,
    /// Uniform `[0, 1)` sample rolled once per decision tick; predicates
    /// compare it against personality-weighted gates.
    pub gate_roll: f32,
    pub territory_claimed: bool,
    /// Other AI swarms inside the territory candidate radius.
    pub intruders_near: bool,
}

impl RuleContext<'_> {
    /// Personality-weighted hunting gate: aggressive, risk-tolerant swarms
    /// commit to a chase more readily.
    #[must_use]
    pub fn hunt_gate_passes(&self) -> bool {
        if self.perception.prey.is_empty() {
            return false;
        }
        let gate = 0.3
            + 0.5 * self.personality.aggressiveness
            + 0.3 * self.personality.risk_tolerance;
        self.gate_roll < gate
    }
}

/// One transition rule.
pub struct Rule {
    pub from: &'static [SwarmState],
    pub target: SwarmState,
    pub predicate: fn(&RuleContext) -> bool,
}

const ANY: &[SwarmState] = &[
    SwarmState::Wandering,
    SwarmState::Hunting,
    SwarmState::Fleeing,
    SwarmState::Feeding,
    SwarmState::TerritoryDefense,
];

fn threat_perceived(ctx: &RuleContext) -> bool {
    !ctx.perception.threats.is_empty()
}

fn hunt_gate(ctx: &RuleContext) -> bool {
    ctx.hunt_gate_passes()
}

fn prey_still_present(ctx: &RuleContext) -> bool {
    !ctx.perception.prey.is_empty()
}

fn food_in_range(ctx: &RuleContext) -> bool {
    !ctx.perception.food.is_empty()
}

fn territory_pressed(ctx: &RuleContext) -> bool {
    ctx.territory_claimed && ctx.intruders_near
}

fn always(_ctx: &RuleContext) -> bool {
    true
}

/// The transition table, in ascending priority order.
pub const RULES: &[Rule] = &[
    // Survival first: any perceived threat preempts everything else.
    Rule {
        from: ANY,
        target: SwarmState::Fleeing,
        predicate: threat_perceived,
    },
    // Commit to a chase when the personality gate passes.
    Rule {
        from: &[
            SwarmState::Wandering,
            SwarmState::Feeding,
            SwarmState::TerritoryDefense,
        ],
        target: SwarmState::Hunting,
        predicate: hunt_gate,
    },
    // An ongoing chase persists while the prey exists; no re-gating.
    Rule {
        from: &[SwarmState::Hunting],
        target: SwarmState::Hunting,
        predicate: prey_still_present,
    },
    Rule {
        from: &[SwarmState::Wandering, SwarmState::Hunting, SwarmState::Feeding],
        target: SwarmState::Feeding,
        predicate: food_in_range,
    },
    Rule {
        from: &[SwarmState::Wandering, SwarmState::TerritoryDefense],
        target: SwarmState::TerritoryDefense,
        predicate: territory_pressed,
    },
    // Triggering conditions gone: settle back into wandering.
    Rule {
        from: ANY,
        target: SwarmState::Wandering,
        predicate: always,
    },
];

/// Evaluate the table against `ctx`, returning the next state.
#[must_use]
pub fn evaluate_transition(ctx: &RuleContext) -> SwarmState {
    for rule in RULES {
        if rule.from.contains(&ctx.state) && (rule.predicate)(ctx) {
            return rule.target;
        }
    }
    SwarmState::Wandering
}
