use anyhow::Result;
use chronoswarm_ai::register_personality_driver;
use chronoswarm_core::{ArenaConfig, ArenaWorld, EventSink, PrimaryInput, SimEvent, Vec2};
use std::f32::consts::TAU;
use tracing::{debug, info};

const TICK_MS: f32 = 16.0;
const RUN_TICKS: u64 = 3_600;
const AI_SWARMS: usize = 12;

fn main() -> Result<()> {
    init_tracing();
    let mut world = bootstrap_world()?;
    info!(
        agents = world.agents().len(),
        arena = ?(world.config().arena_width, world.config().arena_height),
        "starting chronoswarm arena"
    );
    run(&mut world);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Forwards notable simulation events into the tracing stream.
struct TracingSink;

impl EventSink for TracingSink {
    fn on_event(&mut self, event: &SimEvent) {
        match event {
            SimEvent::Consumed {
                attacker,
                victim,
                mass_delta,
            } => debug!(?attacker, ?victim, mass_delta, "consumption"),
            SimEvent::AgentDied { agent, killer } => info!(?agent, ?killer, "agent died"),
            SimEvent::Shattered { agent, shards } => debug!(?agent, shards, "rift shatter"),
            SimEvent::ChunkLoaded { coord } => debug!(?coord, "chunk loaded"),
            SimEvent::ChunkUnloaded { coord } => debug!(?coord, "chunk unloaded"),
            SimEvent::Split { .. } | SimEvent::Merge { .. } => {}
        }
    }
}

fn bootstrap_world() -> Result<ArenaWorld> {
    let config = ArenaConfig {
        rng_seed: Some(0xC0FF_EE00_5EED_1234),
        ..ArenaConfig::default()
    };
    let mut world = ArenaWorld::with_sink(config, Box::new(TracingSink))?;
    let driver_key = register_personality_driver(&mut world);

    let center = Vec2::new(
        world.config().arena_width * 0.5,
        world.config().arena_height * 0.5,
    );
    world.spawn_agent(center, true);

    // AI swarms on a ring around the primary.
    for index in 0..AI_SWARMS {
        let angle = index as f32 * TAU / AI_SWARMS as f32;
        let position = center + Vec2::from_angle(angle) * 1_500.0;
        let agent = world.spawn_agent(position, false);
        world.bind_agent_driver(agent, driver_key);
    }

    Ok(world)
}

fn run(world: &mut ArenaWorld) {
    let center = Vec2::new(
        world.config().arena_width * 0.5,
        world.config().arena_height * 0.5,
    );
    for tick in 0..RUN_TICKS {
        // Drive the primary on a slow orbit so chunk streaming gets
        // exercised without an interactive input adapter.
        let angle = tick as f32 * 0.002;
        world.set_primary_input(PrimaryInput {
            target: Some(center + Vec2::from_angle(angle) * 2_200.0),
            split: false,
            eject: false,
        });
        let summary = world.step(TICK_MS);

        if tick % 250 == 0 {
            info!(
                tick = summary.tick.0,
                alive = summary.alive_agents,
                cells = summary.cell_count,
                total_mass = summary.total_mass,
                matter = summary.matter_count,
                chunks = world.chunks().active_len(),
                "arena status"
            );
            for row in world.leaderboard().iter().take(3) {
                debug!(rank = row.rank, agent = ?row.agent, mass = row.mass, "leaderboard");
            }
        }
    }

    info!("final standings");
    for row in world.leaderboard() {
        info!(
            rank = row.rank,
            agent = ?row.agent,
            mass = row.mass,
            alive = row.alive,
            "standing"
        );
    }
}
