//! Collision resolution: predation, recombination, pickups and rifts.
//!
//! Pairs are resolved sequentially in entity insertion order, so when one
//! prey cell is inside two predators on the same tick the earlier-spawned
//! predator wins and the later pairing sees the cell as already gone.

use crate::entity::{self, AgentId, CellId, EjectedId, MatterId, RiftId};
use crate::events::SimEvent;
use crate::world::ArenaWorld;
use std::collections::HashSet;
use tracing::debug;

impl ArenaWorld {
    /// Resolve every collision class for the current tick.
    pub(crate) fn stage_collisions(&mut self) {
        self.resolve_cell_pairs();
        self.resolve_matter_pickups();
        self.resolve_ejected_pickups();
        self.resolve_rift_triggers();
    }

    /// Pairwise cell interactions: same-owner recombination and
    /// cross-owner predation.
    fn resolve_cell_pairs(&mut self) {
        let ids: Vec<CellId> = self.cells.ids().to_vec();
        let mut gone: HashSet<CellId> = HashSet::new();

        for i in 0..ids.len() {
            let a = ids[i];
            if gone.contains(&a) {
                continue;
            }
            for j in (i + 1)..ids.len() {
                let b = ids[j];
                if gone.contains(&a) {
                    break;
                }
                if gone.contains(&b) {
                    continue;
                }
                let Some(cell_a) = self.cells.get(a) else {
                    break;
                };
                let Some(cell_b) = self.cells.get(b) else {
                    continue;
                };
                let (owner_a, owner_b) = (cell_a.owner, cell_b.owner);
                let (mass_a, mass_b) = (cell_a.mass, cell_b.mass);
                if !cell_a.overlaps(cell_b) {
                    continue;
                }

                if owner_a == owner_b {
                    let Some(agent) = self.agents.get_mut(owner_a) else {
                        continue;
                    };
                    if let Some(survivor) = entity::combine(&self.config, &mut self.cells, agent, a, b)
                    {
                        let absorbed = if survivor == a { b } else { a };
                        gone.insert(absorbed);
                        let mass = self
                            .cells
                            .get(survivor)
                            .map(|cell| cell.mass)
                            .unwrap_or_default();
                        self.sink.on_event(&SimEvent::Merge {
                            agent: owner_a,
                            survivor,
                            mass,
                        });
                    }
                } else if mass_a > mass_b * self.config.consume_ratio {
                    self.consume_cell(a, b);
                    gone.insert(b);
                } else if mass_b > mass_a * self.config.consume_ratio {
                    self.consume_cell(b, a);
                    gone.insert(a);
                }
            }
        }
    }

    /// Transfer a prey cell into its predator at the configured efficiency.
    fn consume_cell(&mut self, predator: CellId, prey: CellId) -> Option<()> {
        let attacker_owner = self.cells.get(predator)?.owner;
        let prey_cell = self.cells.remove(prey)?;
        let gain = prey_cell.mass * self.config.consume_efficiency;

        {
            let cell = self.cells.get_mut(predator)?;
            cell.set_mass(cell.mass + gain, &self.config);
        }

        let mut victim_died = false;
        if let Some(victim) = self.agents.get_mut(prey_cell.owner) {
            victim.cells.retain(|&id| id != prey);
            if victim.alive && victim.cells.is_empty() {
                victim.alive = false;
                victim_died = true;
            }
        }
        self.sink.on_event(&SimEvent::Consumed {
            attacker: attacker_owner,
            victim: prey_cell.owner,
            mass_delta: gain,
        });
        if victim_died {
            if let Some(attacker) = self.agents.get_mut(attacker_owner) {
                attacker.kills += 1;
            }
            debug!(victim = ?prey_cell.owner, attacker = ?attacker_owner, "agent consumed");
            self.sink.on_event(&SimEvent::AgentDied {
                agent: prey_cell.owner,
                killer: Some(attacker_owner),
            });
        }
        Some(())
    }

    /// Cells absorb chrono-matter whose center they cover.
    fn resolve_matter_pickups(&mut self) {
        let matter_ids: Vec<MatterId> = self.matter.ids().to_vec();
        for matter_id in matter_ids {
            let Some(pickup) = self.matter.get(matter_id) else {
                continue;
            };
            let (position, mass) = (pickup.position, pickup.mass);
            let eater = self.cells.iter_ordered().find_map(|(id, cell)| {
                (cell.position.distance_sq(position) < cell.radius * cell.radius).then_some(id)
            });
            if let Some(cell_id) = eater {
                self.matter.remove(matter_id);
                if let Some(cell) = self.cells.get_mut(cell_id) {
                    cell.set_mass(cell.mass + mass, &self.config);
                }
            }
        }
    }

    /// Rifts absorb overlapping ejected mass into their energy pool;
    /// otherwise any covering cell collects the pickup.
    fn resolve_ejected_pickups(&mut self) {
        let ejected_ids: Vec<EjectedId> = self.ejected.ids().to_vec();
        for ejected_id in ejected_ids {
            let Some(pickup) = self.ejected.get(ejected_id) else {
                continue;
            };
            let (position, mass) = (pickup.position, pickup.mass);

            let feeding = self.rifts.iter_ordered().find_map(|(id, rift)| {
                (rift.position.distance_sq(position) < rift.radius * rift.radius).then_some(id)
            });
            if let Some(rift_id) = feeding {
                self.ejected.remove(ejected_id);
                if let Some(rift) = self.rifts.get_mut(rift_id) {
                    rift.energy += mass;
                }
                continue;
            }

            let eater = self.cells.iter_ordered().find_map(|(id, cell)| {
                (cell.position.distance_sq(position) < cell.radius * cell.radius).then_some(id)
            });
            if let Some(cell_id) = eater {
                self.ejected.remove(ejected_id);
                if let Some(cell) = self.cells.get_mut(cell_id) {
                    cell.set_mass(cell.mass + mass, &self.config);
                }
            }
        }
    }

    /// Rifts shatter the first overlapping cell heavy enough to trigger
    /// them, then collapse.
    fn resolve_rift_triggers(&mut self) {
        let rift_ids: Vec<RiftId> = self.rifts.ids().to_vec();
        for rift_id in rift_ids {
            let Some(rift) = self.rifts.get(rift_id) else {
                continue;
            };
            let rift = *rift;

            let victim: Option<(CellId, AgentId)> =
                self.cells.iter_ordered().find_map(|(id, cell)| {
                    let reach = cell.radius + rift.radius;
                    let overlapping = cell.position.distance_sq(rift.position) < reach * reach;
                    (overlapping && rift.triggered_by(cell.mass, &self.config))
                        .then_some((id, cell.owner))
                });
            let Some((cell_id, owner)) = victim else {
                continue;
            };
            let Some(agent) = self.agents.get_mut(owner) else {
                continue;
            };
            let created =
                entity::shatter(&self.config, &mut self.cells, agent, cell_id, &mut self.rng);
            if !created.is_empty() {
                self.rifts.remove(rift_id);
                self.sink.on_event(&SimEvent::Shattered {
                    agent: owner,
                    shards: created.len() + 1,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ArenaConfig;
    use crate::entity::{ChronoMatter, EjectedMass, TemporalRift};
    use crate::events::{EventSink, SimEvent};
    use crate::math::Vec2;
    use crate::world::{ArenaWorld, Tick};
    use std::sync::{Arc, Mutex};

    fn quiet_config() -> ArenaConfig {
        ArenaConfig {
            rng_seed: Some(5),
            chunk_matter_min: 0,
            chunk_matter_max: 0,
            chunk_rift_chance: 0.0,
            chunk_relic_chance: 0.0,
            ..ArenaConfig::default()
        }
    }

    fn world_with(config: ArenaConfig) -> ArenaWorld {
        ArenaWorld::new(config).expect("valid config")
    }

    fn set_cell_mass(world: &mut ArenaWorld, agent: crate::entity::AgentId, mass: f32) {
        let config = world.config().clone();
        let cell_id = world.agents().get(agent).unwrap().cells[0];
        world
            .cells_mut()
            .get_mut(cell_id)
            .unwrap()
            .set_mass(mass, &config);
    }

    #[derive(Clone, Default)]
    struct SpySink {
        events: Arc<Mutex<Vec<SimEvent>>>,
    }

    impl EventSink for SpySink {
        fn on_event(&mut self, event: &SimEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn heavier_overlapping_cell_consumes_the_lighter() {
        let spy = SpySink::default();
        let events = spy.events.clone();
        let mut world = ArenaWorld::with_sink(quiet_config(), Box::new(spy)).expect("world");
        let predator = world.spawn_agent(Vec2::new(1000.0, 1000.0), false);
        let prey = world.spawn_agent(Vec2::new(1000.0, 1000.0), false);
        set_cell_mass(&mut world, predator, 200.0);
        set_cell_mass(&mut world, prey, 150.0);

        world.stage_collisions();

        let predator_agent = world.agents().get(predator).unwrap();
        let prey_agent = world.agents().get(prey).unwrap();
        let predator_cell = world.cells().get(predator_agent.cells[0]).unwrap();
        assert!((predator_cell.mass - 320.0).abs() < 1e-3, "200 + 150 * 0.8");
        assert!(prey_agent.cells.is_empty());
        assert!(!prey_agent.alive);
        assert_eq!(predator_agent.kills, 1);

        let log = events.lock().unwrap();
        assert!(log.iter().any(|event| matches!(
            event,
            SimEvent::Consumed { attacker, victim, .. }
                if *attacker == predator && *victim == prey
        )));
        assert!(log.iter().any(|event| matches!(
            event,
            SimEvent::AgentDied { agent, killer: Some(k) }
                if *agent == prey && *k == predator
        )));
    }

    #[test]
    fn near_equal_masses_pass_through_without_consumption() {
        let mut world = world_with(quiet_config());
        let a = world.spawn_agent(Vec2::new(1000.0, 1000.0), false);
        let b = world.spawn_agent(Vec2::new(1000.0, 1000.0), false);
        set_cell_mass(&mut world, a, 100.0);
        set_cell_mass(&mut world, b, 95.0); // below the 1.1 ratio

        world.stage_collisions();

        assert!(world.agents().get(a).unwrap().alive);
        assert!(world.agents().get(b).unwrap().alive);
        assert_eq!(world.cells().len(), 2);
    }

    #[test]
    fn shared_prey_goes_to_the_earlier_spawned_predator() {
        let mut world = world_with(quiet_config());
        let first = world.spawn_agent(Vec2::new(1000.0, 1000.0), false);
        let second = world.spawn_agent(Vec2::new(1000.0, 1000.0), false);
        let prey = world.spawn_agent(Vec2::new(1000.0, 1000.0), false);
        set_cell_mass(&mut world, first, 200.0);
        set_cell_mass(&mut world, second, 200.0);
        set_cell_mass(&mut world, prey, 100.0);

        world.stage_collisions();

        let first_cell = world.cells().get(world.agents().get(first).unwrap().cells[0]);
        let second_cell = world.cells().get(world.agents().get(second).unwrap().cells[0]);
        assert!((first_cell.unwrap().mass - 280.0).abs() < 1e-3);
        assert!((second_cell.unwrap().mass - 200.0).abs() < 1e-3);
        assert!(!world.agents().get(prey).unwrap().alive);
    }

    #[test]
    fn unlocked_same_owner_cells_recombine() {
        let mut world = world_with(quiet_config());
        let agent = world.spawn_agent(Vec2::new(2000.0, 2000.0), false);
        set_cell_mass(&mut world, agent, 60.0);

        // Add a second unlocked cell at the same position.
        let config = world.config().clone();
        let extra = world.cells_mut().insert(crate::entity::Cell::new(
            agent,
            40.0,
            Vec2::new(2000.0, 2000.0),
            &config,
        ));
        world.agents_mut().get_mut(agent).unwrap().cells.push(extra);

        world.stage_collisions();
        let agent_state = world.agents().get(agent).unwrap();
        assert_eq!(agent_state.cells.len(), 1);
        let survivor = world.cells().get(agent_state.cells[0]).unwrap();
        assert!((survivor.mass - 100.0).abs() < 1e-3);
    }

    #[test]
    fn matter_is_absorbed_by_covering_cell() {
        let mut world = world_with(quiet_config());
        let agent = world.spawn_agent(Vec2::new(1000.0, 1000.0), false);
        set_cell_mass(&mut world, agent, 50.0);
        world.matter_mut().insert(ChronoMatter {
            position: Vec2::new(1002.0, 1000.0),
            mass: 1.0,
        });

        world.stage_collisions();

        assert!(world.matter().is_empty());
        let cell_id = world.agents().get(agent).unwrap().cells[0];
        assert!((world.cells().get(cell_id).unwrap().mass - 51.0).abs() < 1e-4);
    }

    #[test]
    fn rifts_absorb_ejected_mass_before_cells_can() {
        let mut world = world_with(quiet_config());
        let rift_id = world.rifts_mut().insert(TemporalRift {
            position: Vec2::new(500.0, 500.0),
            radius: 35.0,
            energy: 100.0,
        });
        world.ejected_mut().insert(EjectedMass {
            position: Vec2::new(505.0, 500.0),
            velocity: Vec2::ZERO,
            mass: 12.0,
            ttl_ms: 10_000.0,
        });

        world.stage_collisions();

        assert!(world.ejected().is_empty());
        assert!((world.rifts().get(rift_id).unwrap().energy - 112.0).abs() < 1e-4);
    }

    #[test]
    fn oversized_cell_shatters_on_rift_contact() {
        let spy = SpySink::default();
        let events = spy.events.clone();
        let mut world = ArenaWorld::with_sink(quiet_config(), Box::new(spy)).expect("world");
        let agent = world.spawn_agent(Vec2::new(500.0, 500.0), false);
        set_cell_mass(&mut world, agent, 300.0);
        world.rifts_mut().insert(TemporalRift {
            position: Vec2::new(500.0, 500.0),
            radius: 35.0,
            energy: 100.0,
        });

        world.stage_collisions();

        let agent_state = world.agents().get(agent).unwrap();
        assert!(agent_state.cells.len() > 1, "cell broke into shards");
        assert!(world.rifts().is_empty(), "rift collapsed");
        let total: f32 = agent_state
            .cells
            .iter()
            .map(|&id| world.cells().get(id).unwrap().mass)
            .sum();
        assert!((total - 300.0).abs() < 1e-2, "shatter conserves mass");
        assert!(
            events
                .lock()
                .unwrap()
                .iter()
                .any(|event| matches!(event, SimEvent::Shattered { .. }))
        );
    }

    #[test]
    fn light_cell_passes_rift_untouched() {
        let mut world = world_with(quiet_config());
        let agent = world.spawn_agent(Vec2::new(500.0, 500.0), false);
        set_cell_mass(&mut world, agent, 50.0); // below 100 * 1.15
        world.rifts_mut().insert(TemporalRift {
            position: Vec2::new(500.0, 500.0),
            radius: 35.0,
            energy: 100.0,
        });

        world.stage_collisions();

        assert_eq!(world.agents().get(agent).unwrap().cells.len(), 1);
        assert_eq!(world.rifts().len(), 1);
        assert_eq!(world.tick(), Tick(0));
    }
}
