//! Cross-swarm coordination: shared-target redirects and territory claims.

use chronoswarm_core::{AgentId, AgentView, Personality, RedirectOrder, Vec2, WorldView};
use ordered_float::OrderedFloat;
use tracing::trace;

use crate::controller::AiConfig;
use crate::perception::Perception;

/// How many of the strongest allies participate in a coordinated strike.
const STRIKE_PARTY: usize = 3;

/// A claimed center+radius region an agent prefers to defend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerritoryClaim {
    pub center: Vec2,
    pub radius: f32,
}

impl TerritoryClaim {
    /// Whether a point lies inside the claimed region.
    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        self.center.distance_sq(point) <= self.radius * self.radius
    }
}

/// A coordinated strike: the evaluating agent's own target plus the
/// redirect orders for its participating allies.
#[derive(Debug, Clone, PartialEq)]
pub struct Strike {
    pub target: Vec2,
    pub orders: Vec<(AgentId, RedirectOrder)>,
}

/// Evaluate whether the agent can rally nearby allies onto a shared
/// high-value target.
///
/// Cooperation is the sum of pairwise teamwork products across the
/// strongest allies; below the threshold no orders are emitted. The focus
/// is the heaviest opposing agent whose mass is disproportionate to the
/// evaluator's own.
#[must_use]
pub fn plan_strike(
    config: &AiConfig,
    view: &WorldView,
    me: &AgentView,
    personality: Personality,
    perception: &Perception,
) -> Option<Strike> {
    if perception.allies.is_empty() {
        return None;
    }

    let mut party: Vec<(AgentId, f32)> = perception
        .allies
        .iter()
        .filter_map(|ally| {
            let id = ally.agent?;
            let teamwork = view.agent(id)?.personality?.teamwork;
            Some((id, personality.teamwork * teamwork))
        })
        .collect();
    party.sort_by_key(|&(_, weight)| std::cmp::Reverse(OrderedFloat(weight)));
    party.truncate(STRIKE_PARTY);

    let cooperation: f32 = party.iter().map(|&(_, weight)| weight).sum();
    if cooperation < config.coordination_threshold {
        return None;
    }

    let focus = view
        .agents
        .iter()
        .filter(|other| {
            other.id != me.id
                && other.total_mass > me.total_mass * config.focus_ratio
                && !party.iter().any(|&(id, _)| id == other.id)
        })
        .max_by_key(|other| OrderedFloat(other.total_mass))?;

    trace!(
        focus = ?focus.id,
        cooperation,
        party = party.len(),
        "coordinated strike"
    );
    let orders = party
        .into_iter()
        .map(|(id, _)| {
            (
                id,
                RedirectOrder {
                    focus: focus.id,
                    target: focus.centroid,
                },
            )
        })
        .collect();
    Some(Strike {
        target: focus.centroid,
        orders,
    })
}

/// Advance a territory claim by one decision tick.
///
/// A claim starts when other swarms crowd the candidate radius, grows
/// while undefended, and is dropped the moment the owner leaves it.
#[must_use]
pub fn update_territory(
    config: &AiConfig,
    current: Option<TerritoryClaim>,
    me: &AgentView,
    intruders_near: bool,
) -> Option<TerritoryClaim> {
    match current {
        Some(mut claim) => {
            if !claim.contains(me.centroid) {
                return None;
            }
            if !intruders_near {
                claim.radius =
                    (claim.radius + config.territory_growth).min(config.territory_max_radius);
            }
            Some(claim)
        }
        None => intruders_near.then(|| TerritoryClaim {
            center: me.centroid,
            radius: config.territory_radius,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::Candidate;
    use chronoswarm_core::Tick;
    use slotmap::SlotMap;

    fn ids(count: usize) -> Vec<AgentId> {
        let mut slots: SlotMap<AgentId, ()> = SlotMap::with_key();
        (0..count).map(|_| slots.insert(())).collect()
    }

    fn agent_view(id: AgentId, mass: f32, centroid: Vec2, teamwork: f32) -> AgentView {
        AgentView {
            id,
            is_primary: false,
            total_mass: mass,
            centroid,
            largest_cell_mass: mass,
            cell_count: 1,
            personality: Some(Personality {
                teamwork,
                ..Personality::default()
            }),
        }
    }

    fn ally_candidate(id: AgentId, position: Vec2, mass: f32, distance: f32) -> Candidate {
        Candidate {
            agent: Some(id),
            position,
            mass,
            distance,
            score: 1.0 / distance.max(1.0),
        }
    }

    #[test]
    fn strong_teamwork_rallies_allies_on_a_giant() {
        let keys = ids(4);
        let me = agent_view(keys[0], 100.0, Vec2::new(1000.0, 1000.0), 0.9);
        let ally_a = agent_view(keys[1], 110.0, Vec2::new(1200.0, 1000.0), 0.8);
        let ally_b = agent_view(keys[2], 90.0, Vec2::new(1000.0, 1200.0), 0.7);
        let giant = agent_view(keys[3], 400.0, Vec2::new(1500.0, 1500.0), 0.1);
        let view = WorldView {
            tick: Tick(1),
            arena: Vec2::new(8_000.0, 8_000.0),
            agents: vec![me.clone(), ally_a, ally_b, giant],
            matter: Vec::new(),
            ejected: Vec::new(),
            rifts: Vec::new(),
        };
        let mut perception = Perception::default();
        perception
            .allies
            .push(ally_candidate(keys[1], Vec2::new(1200.0, 1000.0), 110.0, 200.0));
        perception
            .allies
            .push(ally_candidate(keys[2], Vec2::new(1000.0, 1200.0), 90.0, 200.0));

        let personality = me.personality.unwrap();
        let strike = plan_strike(&AiConfig::default(), &view, &me, personality, &perception)
            .expect("cooperation 0.9*0.8 + 0.9*0.7 = 1.35 passes");
        assert_eq!(strike.target, Vec2::new(1500.0, 1500.0));
        assert_eq!(strike.orders.len(), 2);
        assert!(strike.orders.iter().all(|(_, order)| order.focus == keys[3]));
    }

    #[test]
    fn weak_teamwork_never_coordinates() {
        let keys = ids(3);
        let me = agent_view(keys[0], 100.0, Vec2::new(1000.0, 1000.0), 0.1);
        let ally = agent_view(keys[1], 110.0, Vec2::new(1200.0, 1000.0), 0.1);
        let giant = agent_view(keys[2], 400.0, Vec2::new(1500.0, 1500.0), 0.5);
        let view = WorldView {
            tick: Tick(1),
            arena: Vec2::new(8_000.0, 8_000.0),
            agents: vec![me.clone(), ally, giant],
            matter: Vec::new(),
            ejected: Vec::new(),
            rifts: Vec::new(),
        };
        let mut perception = Perception::default();
        perception
            .allies
            .push(ally_candidate(keys[1], Vec2::new(1200.0, 1000.0), 110.0, 200.0));

        let personality = me.personality.unwrap();
        assert!(plan_strike(&AiConfig::default(), &view, &me, personality, &perception).is_none());
    }

    #[test]
    fn territory_claims_grow_while_undefended_and_reset_on_exit() {
        let config = AiConfig::default();
        let keys = ids(1);
        let me = agent_view(keys[0], 100.0, Vec2::new(1000.0, 1000.0), 0.5);

        let claim = update_territory(&config, None, &me, true).expect("crowding starts a claim");
        assert_eq!(claim.center, me.centroid);
        assert!((claim.radius - config.territory_radius).abs() < 1e-6);

        // No claim without intruders.
        assert!(update_territory(&config, None, &me, false).is_none());

        let grown = update_territory(&config, Some(claim), &me, false).expect("claim persists");
        assert!(grown.radius > claim.radius);

        // Walking out of the claim drops it.
        let far = agent_view(keys[0], 100.0, Vec2::new(5000.0, 5000.0), 0.5);
        assert!(update_territory(&config, Some(grown), &far, true).is_none());
    }
}
