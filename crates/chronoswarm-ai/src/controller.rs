//! The personality-weighted FSM driver bound to each AI agent.

use chronoswarm_core::{
    AgentId, AgentView, DriverIntent, Personality, RedirectOrder, SwarmDriver, Vec2, WorldView,
};
use rand::{Rng, RngCore, SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::coordination::{self, TerritoryClaim};
use crate::perception::Perception;
use crate::rules::{RuleContext, SwarmState, evaluate_transition};

/// Tunables for the personality driver. One copy per controller so
/// variants can be registered side by side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Milliseconds between decision re-evaluations (reaction time).
    pub decision_interval_ms: f32,
    pub flee_radius: f32,
    /// A threat must outweigh the agent by this ratio to trigger fleeing.
    pub flee_ratio: f32,
    pub hunt_radius: f32,
    /// The agent must outweigh prey by this ratio to consider a chase.
    pub hunt_ratio: f32,
    pub food_radius: f32,
    /// Distance of the projected escape point when fleeing.
    pub flee_step: f32,
    /// Maximum stochastic heading error applied to movement intents.
    pub heading_error_rad: f32,
    /// Threats closer than this damp the escape step (hesitation).
    pub hesitation_radius: f32,
    /// Wander targets are re-randomized after this long.
    pub wander_interval_ms: f32,
    /// Small per-decision chance of re-randomizing the wander target early.
    pub wander_rekick_chance: f64,
    /// How strongly wander targets pull toward the arena center.
    pub center_bias: f32,
    /// Minimum largest-cell mass before an opportunistic hunting split.
    pub hunt_split_mass: f32,
    /// Base probability of the hunting split, scaled by aggressiveness.
    pub hunt_split_chance: f32,
    /// Base probability of shedding mass for speed while fleeing.
    pub flee_eject_chance: f32,
    pub ally_radius: f32,
    /// Allies must be within this mass ratio band (both directions).
    pub ally_mass_band: f32,
    /// Minimum summed teamwork product required for a coordinated strike.
    pub coordination_threshold: f32,
    /// A strike focus must outweigh the evaluator by this ratio.
    pub focus_ratio: f32,
    /// Other swarms inside this radius count as territory intruders.
    pub territory_candidate_radius: f32,
    /// Initial radius of a fresh territory claim.
    pub territory_radius: f32,
    /// Radius gained per undefended decision tick.
    pub territory_growth: f32,
    pub territory_max_radius: f32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            decision_interval_ms: 250.0,
            flee_radius: 600.0,
            flee_ratio: 1.3,
            hunt_radius: 500.0,
            hunt_ratio: 1.25,
            food_radius: 450.0,
            flee_step: 500.0,
            heading_error_rad: 0.15,
            hesitation_radius: 160.0,
            wander_interval_ms: 2_500.0,
            wander_rekick_chance: 0.03,
            center_bias: 0.35,
            hunt_split_mass: 90.0,
            hunt_split_chance: 0.35,
            flee_eject_chance: 0.08,
            ally_radius: 700.0,
            ally_mass_band: 2.0,
            coordination_threshold: 0.55,
            focus_ratio: 1.5,
            territory_candidate_radius: 900.0,
            territory_radius: 300.0,
            territory_growth: 15.0,
            territory_max_radius: 900.0,
        }
    }
}

/// Personality-weighted FSM controller: perception, rule-table transition,
/// per-state target synthesis, coordination.
pub struct PersonalityController {
    config: AiConfig,
    rng: SmallRng,
    state: SwarmState,
    /// Per-agent jittered reaction time, fixed at construction.
    interval_ms: f32,
    since_decision_ms: f32,
    wander_target: Option<Vec2>,
    wander_age_ms: f32,
    territory: Option<TerritoryClaim>,
    incoming: Option<RedirectOrder>,
}

impl PersonalityController {
    /// Construct a controller seeded from the supplied entropy source.
    #[must_use]
    pub fn from_rng(config: AiConfig, rng: &mut dyn RngCore) -> Self {
        let mut rng = SmallRng::seed_from_u64(rng.next_u64());
        let interval_ms = config.decision_interval_ms * rng.random_range(0.85..1.15);
        Self {
            config,
            rng,
            state: SwarmState::Wandering,
            interval_ms,
            // Saturated so the very first decide() call acts immediately.
            since_decision_ms: f32::MAX,
            wander_target: None,
            wander_age_ms: 0.0,
            territory: None,
            incoming: None,
        }
    }

    /// Current FSM state.
    #[must_use]
    pub const fn state(&self) -> SwarmState {
        self.state
    }

    /// Current territory claim, if any.
    #[must_use]
    pub const fn territory(&self) -> Option<TerritoryClaim> {
        self.territory
    }

    /// Apply hesitation damping and stochastic heading error to an intent.
    fn perturbed(&mut self, from: Vec2, to: Vec2, personality: Personality) -> Vec2 {
        let offset = to - from;
        let spread = self.config.heading_error_rad * (1.0 - 0.5 * personality.adaptability);
        let angle = if spread > 0.0 {
            self.rng.random_range(-spread..spread)
        } else {
            0.0
        };
        from + offset.rotated(angle)
    }

    /// Randomized wander target, biased toward the arena center.
    fn wander_point(&mut self, view: &WorldView, me: &AgentView) -> Vec2 {
        let refresh = self.wander_target.is_none()
            || self.wander_age_ms >= self.config.wander_interval_ms
            || self.rng.random_bool(self.config.wander_rekick_chance);
        if refresh {
            let roam = Vec2::new(
                self.rng.random_range(0.0..view.arena.x),
                self.rng.random_range(0.0..view.arena.y),
            );
            let point = roam.lerp(view.center(), self.config.center_bias);
            self.wander_target = Some(point);
            self.wander_age_ms = 0.0;
            trace!(agent = ?me.id, ?point, "new wander target");
        }
        self.wander_target.unwrap_or_else(|| view.center())
    }

    fn flee_point(&mut self, perception: &Perception, me: &AgentView, personality: Personality) -> Vec2 {
        let direction = perception
            .flee_direction(me.centroid)
            .unwrap_or(Vec2::new(1.0, 0.0));
        let mut step = self.config.flee_step;
        // Hesitate near very close threats; patience steadies the hand.
        if perception
            .threats
            .first()
            .is_some_and(|threat| threat.distance < self.config.hesitation_radius)
        {
            step *= 0.6 + 0.4 * personality.patience;
        }
        me.centroid + direction * step
    }
}

impl SwarmDriver for PersonalityController {
    fn kind(&self) -> &'static str {
        crate::DRIVER_KIND
    }

    fn decide(&mut self, view: &WorldView, me: AgentId, dt_ms: f32) -> DriverIntent {
        self.since_decision_ms = (self.since_decision_ms + dt_ms).min(f32::MAX);
        self.wander_age_ms += dt_ms;
        let Some(me_view) = view.agent(me) else {
            return DriverIntent::default();
        };
        let me_view = me_view.clone();
        if self.since_decision_ms < self.interval_ms && self.incoming.is_none() {
            return DriverIntent::default();
        }
        self.since_decision_ms = 0.0;

        let personality = me_view.personality.unwrap_or_default();
        let perception = Perception::scan(&self.config, view, &me_view);

        // A redirect order overrides this decision entirely: adopt the
        // shared target and go hunting.
        if let Some(order) = self.incoming.take() {
            if view.agent(order.focus).is_some() {
                self.state = SwarmState::Hunting;
                return DriverIntent {
                    target: Some(order.target),
                    ..DriverIntent::default()
                };
            }
        }

        let intruders_near = view.agents.iter().any(|other| {
            other.id != me_view.id
                && other.personality.is_some()
                && other.centroid.distance(me_view.centroid) <= self.config.territory_candidate_radius
        });
        self.territory =
            coordination::update_territory(&self.config, self.territory, &me_view, intruders_near);

        let ctx = RuleContext {
            perception: &perception,
            personality,
            state: self.state,
            gate_roll: self.rng.random(),
            territory_claimed: self.territory.is_some(),
            intruders_near,
        };
        let next = evaluate_transition(&ctx);
        if next != self.state {
            trace!(agent = ?me_view.id, from = ?self.state, to = ?next, "state transition");
        }
        self.state = next;

        let mut intent = DriverIntent::default();
        match self.state {
            SwarmState::Fleeing => {
                intent.target = Some(self.flee_point(&perception, &me_view, personality));
                // Shed a little mass for speed; risk tolerance loosens it.
                if self.rng.random::<f32>()
                    < self.config.flee_eject_chance * personality.risk_tolerance
                {
                    intent.eject = true;
                }
            }
            SwarmState::Hunting => {
                if let Some(prey) = perception.prey.first().copied() {
                    intent.target =
                        Some(self.perturbed(me_view.centroid, prey.position, personality));
                    if me_view.largest_cell_mass >= self.config.hunt_split_mass
                        && me_view.total_mass > prey.mass * 2.2
                        && self.rng.random::<f32>()
                            < self.config.hunt_split_chance
                                * (0.4 + 0.6 * personality.aggressiveness)
                    {
                        intent.split = true;
                    }
                } else {
                    // Redirect adoption without a scored candidate.
                    intent.target = Some(self.wander_point(view, &me_view));
                }
                if let Some(strike) =
                    coordination::plan_strike(&self.config, view, &me_view, personality, &perception)
                {
                    intent.target = Some(strike.target);
                    intent.redirects = strike.orders;
                }
            }
            SwarmState::Feeding => {
                intent.target = perception
                    .food
                    .first()
                    .map(|food| self.perturbed(me_view.centroid, food.position, personality));
            }
            SwarmState::TerritoryDefense => {
                intent.target = self.territory.map(|claim| claim.center);
            }
            SwarmState::Wandering => {
                intent.target = Some(self.wander_point(view, &me_view));
            }
        }
        intent
    }

    fn apply_redirect(&mut self, order: RedirectOrder) {
        self.incoming = Some(order);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronoswarm_core::Tick;
    use rand::SeedableRng;
    use slotmap::SlotMap;

    fn ids(count: usize) -> Vec<AgentId> {
        let mut slots: SlotMap<AgentId, ()> = SlotMap::with_key();
        (0..count).map(|_| slots.insert(())).collect()
    }

    fn agent_view(id: AgentId, mass: f32, centroid: Vec2, personality: Personality) -> AgentView {
        AgentView {
            id,
            is_primary: false,
            total_mass: mass,
            centroid,
            largest_cell_mass: mass,
            cell_count: 1,
            personality: Some(personality),
        }
    }

    fn view_with(agents: Vec<AgentView>) -> WorldView {
        WorldView {
            tick: Tick(1),
            arena: Vec2::new(8_000.0, 8_000.0),
            agents,
            matter: Vec::new(),
            ejected: Vec::new(),
            rifts: Vec::new(),
        }
    }

    fn controller() -> PersonalityController {
        let mut seed = SmallRng::seed_from_u64(11);
        PersonalityController::from_rng(AiConfig::default(), &mut seed)
    }

    #[test]
    fn threat_in_range_triggers_fleeing_away() {
        let keys = ids(2);
        let me = agent_view(
            keys[0],
            100.0,
            Vec2::new(2000.0, 2000.0),
            Personality::default(),
        );
        let threat = agent_view(
            keys[1],
            300.0,
            Vec2::new(2300.0, 2000.0),
            Personality::default(),
        );
        let view = view_with(vec![me, threat]);

        let mut driver = controller();
        let intent = driver.decide(&view, keys[0], 16.0);
        assert_eq!(driver.state(), SwarmState::Fleeing);
        let target = intent.target.expect("flee target");
        let away = target - Vec2::new(2000.0, 2000.0);
        let toward_threat = Vec2::new(2300.0, 2000.0) - Vec2::new(2000.0, 2000.0);
        assert!(
            away.dot(toward_threat) < 0.0,
            "flee target heads away from the threat"
        );
    }

    #[test]
    fn aggressive_agent_hunts_nearby_prey_within_one_decision() {
        let keys = ids(2);
        let personality = Personality {
            aggressiveness: 0.9,
            risk_tolerance: 0.9,
            ..Personality::default()
        };
        let me = agent_view(keys[0], 300.0, Vec2::new(2000.0, 2000.0), personality);
        let prey_pos = Vec2::new(2050.0, 2000.0);
        let prey = agent_view(keys[1], 100.0, prey_pos, Personality::default());
        let view = view_with(vec![me, prey]);

        let mut driver = controller();
        let intent = driver.decide(&view, keys[0], 16.0);
        assert_eq!(driver.state(), SwarmState::Hunting);
        let target = intent.target.expect("hunt target");
        assert!(
            target.distance(prey_pos) < 15.0,
            "target tracks the prey position up to heading error"
        );
    }

    #[test]
    fn decisions_are_throttled_between_intervals() {
        let keys = ids(2);
        let me = agent_view(
            keys[0],
            100.0,
            Vec2::new(2000.0, 2000.0),
            Personality::default(),
        );
        let threat = agent_view(
            keys[1],
            300.0,
            Vec2::new(2300.0, 2000.0),
            Personality::default(),
        );
        let view = view_with(vec![me, threat]);

        let mut driver = controller();
        let first = driver.decide(&view, keys[0], 16.0);
        assert!(first.target.is_some());
        // Well inside the decision interval: no new intent.
        let second = driver.decide(&view, keys[0], 16.0);
        assert!(second.target.is_none());
        // Past the interval the controller re-evaluates.
        let third = driver.decide(&view, keys[0], 300.0);
        assert!(third.target.is_some());
    }

    #[test]
    fn wandering_targets_bias_toward_center_and_stay_in_bounds() {
        let keys = ids(1);
        let me = agent_view(
            keys[0],
            100.0,
            Vec2::new(100.0, 100.0),
            Personality::default(),
        );
        let view = view_with(vec![me]);

        let mut driver = controller();
        for _ in 0..20 {
            let intent = driver.decide(&view, keys[0], 300.0);
            let target = intent.target.expect("wander target");
            assert!(target.x >= 0.0 && target.x <= view.arena.x);
            assert!(target.y >= 0.0 && target.y <= view.arena.y);
        }
        assert_eq!(driver.state(), SwarmState::Wandering);
    }

    #[test]
    fn redirect_order_overrides_the_next_decision() {
        let keys = ids(3);
        let me = agent_view(
            keys[0],
            100.0,
            Vec2::new(2000.0, 2000.0),
            Personality::default(),
        );
        let focus_pos = Vec2::new(4000.0, 4000.0);
        let focus = agent_view(keys[1], 400.0, focus_pos, Personality::default());
        let view = view_with(vec![me, focus]);

        let mut driver = controller();
        driver.apply_redirect(RedirectOrder {
            focus: keys[1],
            target: focus_pos,
        });
        let intent = driver.decide(&view, keys[0], 16.0);
        assert_eq!(intent.target, Some(focus_pos));
        assert_eq!(driver.state(), SwarmState::Hunting);
    }

    #[test]
    fn stale_redirects_on_dead_focus_are_dropped() {
        let keys = ids(2);
        let me = agent_view(
            keys[0],
            100.0,
            Vec2::new(2000.0, 2000.0),
            Personality::default(),
        );
        let view = view_with(vec![me]);

        let mut driver = controller();
        driver.apply_redirect(RedirectOrder {
            focus: keys[1], // not in the view: already dead
            target: Vec2::new(4000.0, 4000.0),
        });
        let intent = driver.decide(&view, keys[0], 16.0);
        assert_ne!(intent.target, Some(Vec2::new(4000.0, 4000.0)));
        assert_eq!(driver.state(), SwarmState::Wandering);
    }
}
