//! Perception: scan the world snapshot into scored candidate lists.

use chronoswarm_core::{AgentId, AgentView, Vec2, WorldView};
use ordered_float::OrderedFloat;

use crate::controller::AiConfig;

/// One scored perception candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Agent candidates carry their id; food candidates carry none.
    pub agent: Option<AgentId>,
    pub position: Vec2,
    pub mass: f32,
    pub distance: f32,
    /// Priority score; candidate lists are sorted descending on this.
    pub score: f32,
}

/// Candidate lists rebuilt on every decision tick.
///
/// Each list is sorted by descending score with stable ties, so the first
/// entry is always the most pressing candidate of its class.
#[derive(Debug, Clone, Default)]
pub struct Perception {
    pub threats: Vec<Candidate>,
    pub prey: Vec<Candidate>,
    pub food: Vec<Candidate>,
    pub allies: Vec<Candidate>,
}

impl Perception {
    /// Scan `view` from the perspective of agent `me`.
    #[must_use]
    pub fn scan(config: &AiConfig, view: &WorldView, me: &AgentView) -> Self {
        let mut perception = Self::default();

        for other in &view.agents {
            if other.id == me.id {
                continue;
            }
            let distance = me.centroid.distance(other.centroid);

            if other.personality.is_some()
                && distance <= config.ally_radius
                && other.total_mass <= me.total_mass * config.flee_ratio
            {
                let ratio = other.total_mass / me.total_mass.max(f32::EPSILON);
                if ratio >= 1.0 / config.ally_mass_band && ratio <= config.ally_mass_band {
                    perception.allies.push(Candidate {
                        agent: Some(other.id),
                        position: other.centroid,
                        mass: other.total_mass,
                        distance,
                        score: 1.0 / distance.max(1.0),
                    });
                }
            }

            if distance <= config.flee_radius
                && other.total_mass > me.total_mass * config.flee_ratio
            {
                let ratio = other.total_mass / me.total_mass.max(f32::EPSILON);
                perception.threats.push(Candidate {
                    agent: Some(other.id),
                    position: other.centroid,
                    mass: other.total_mass,
                    distance,
                    score: ratio / distance.max(1.0),
                });
            } else if distance <= config.hunt_radius
                && me.total_mass > other.total_mass * config.hunt_ratio
            {
                perception.prey.push(Candidate {
                    agent: Some(other.id),
                    position: other.centroid,
                    mass: other.total_mass,
                    distance,
                    score: other.total_mass / distance.max(1.0),
                });
            }
        }

        for &position in view.matter.iter().chain(view.ejected.iter()) {
            let distance = me.centroid.distance(position);
            if distance <= config.food_radius {
                perception.food.push(Candidate {
                    agent: None,
                    position,
                    mass: 0.0,
                    distance,
                    score: 1.0 / distance.max(1.0),
                });
            }
        }

        sort_descending(&mut perception.threats);
        sort_descending(&mut perception.prey);
        sort_descending(&mut perception.food);
        sort_descending(&mut perception.allies);
        perception
    }

    /// Direction away from all threats, inverse-distance weighted.
    ///
    /// Returns `None` when no threats are perceived or the weighted sum
    /// degenerates to zero (threats on exactly opposite sides).
    #[must_use]
    pub fn flee_direction(&self, from: Vec2) -> Option<Vec2> {
        if self.threats.is_empty() {
            return None;
        }
        let mut away = Vec2::ZERO;
        for threat in &self.threats {
            let offset = from - threat.position;
            let weight = 1.0 / threat.distance.max(1.0);
            away += offset.normalized() * weight;
        }
        let direction = away.normalized();
        (direction != Vec2::ZERO).then_some(direction)
    }
}

/// Stable descending sort on candidate score.
fn sort_descending(candidates: &mut [Candidate]) {
    candidates.sort_by_key(|candidate| std::cmp::Reverse(OrderedFloat(candidate.score)));
}
