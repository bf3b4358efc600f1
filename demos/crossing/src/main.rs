//! crossing: four-arm unsignalled crossing negotiated by vehicle agents.
//!
//! A deterministic demand stream feeds the four approaches.  Every n-th
//! vehicle carries a profile tag (`_emergency`, `_dec`, `_flaw`) so all
//! behaviour profiles meet at the crossing.  Run with `RUST_LOG=debug` (or
//! `--verbose`) to see every state transition.

mod network;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use dim_core::{SimConfig, SimRng, Tick};
use dim_sim::{NegotiationEvent, SimBuilder, SimObserver, TickSummary};
use dim_world::{MemoryWorld, VehicleSpec, WorldState};

use network::{APPROACHES, build_crossing};

/// Spawned vehicles keep this much room to the vehicle ahead at the lane start.
const SPAWN_CLEARANCE: f64 = 12.0;

#[derive(Parser)]
#[command(name = "crossing")]
#[command(about = "Decentralized negotiation at a four-arm crossing", long_about = None)]
struct Cli {
    /// TOML configuration file (defaults apply to every missing key)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tie-break and demand seed (overrides the config)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Ticks to simulate (overrides the config)
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Ticks between two spawn attempts
    #[arg(long, default_value = "3")]
    spawn_every: u64,

    /// Every n-th vehicle is an emergency vehicle (0 = never)
    #[arg(long, default_value = "9")]
    emergency_every: u64,

    /// Every n-th vehicle misreports its convoy (0 = never)
    #[arg(long, default_value = "7")]
    deceiving_every: u64,

    /// Every n-th vehicle cannot communicate (0 = never)
    #[arg(long, default_value = "11")]
    flaw_every: u64,

    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

// ── Demand ────────────────────────────────────────────────────────────────────

struct Demand {
    rng:             SimRng,
    spawned:         u64,
    skipped:         u64,
    every:           u64,
    emergency_every: u64,
    deceiving_every: u64,
    flaw_every:      u64,
}

impl Demand {
    fn new(cli: &Cli, rng: SimRng) -> Self {
        Self {
            rng,
            spawned: 0,
            skipped: 0,
            every: cli.spawn_every.max(1),
            emergency_every: cli.emergency_every,
            deceiving_every: cli.deceiving_every,
            flaw_every: cli.flaw_every,
        }
    }

    fn tag(&self, n: u64) -> &'static str {
        let hits = |every: u64| every > 0 && n % every == 0;
        if hits(self.flaw_every) {
            "_flaw"
        } else if hits(self.emergency_every) {
            "_emergency"
        } else if hits(self.deceiving_every) {
            "_dec"
        } else {
            ""
        }
    }

    /// Try to put one vehicle on a random approach.  Skips the attempt when
    /// the lane start is occupied.
    fn spawn(&mut self, tick: Tick, world: &mut MemoryWorld) -> Result<()> {
        if tick.0 % self.every != 0 {
            return Ok(());
        }
        let lane = APPROACHES[self.rng.gen_range(0..APPROACHES.len())];
        let speed: f64 = self.rng.gen_range(6.0..12.0);

        let occupied = world
            .lane_member_ids(&lane.into())
            .iter()
            .filter_map(|v| world.lane_position(v))
            .any(|pos| pos < SPAWN_CLEARANCE);
        if occupied {
            self.skipped += 1;
            return Ok(());
        }

        let n = self.spawned + 1;
        let id = format!("v{n}{}", self.tag(n));
        world
            .add_vehicle(VehicleSpec::new(id.as_str(), lane, 0.0).speed(speed))
            .with_context(|| format!("spawning {id}"))?;
        self.spawned = n;
        Ok(())
    }
}

// ── Observer ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Tally {
    transitions:     usize,
    convoys:         usize,
    escalations:     usize,
    warnings:        usize,
    requests:        usize,
    refusals:        usize,
    blocked:         usize,
    max_negotiating: usize,
}

impl SimObserver for Tally {
    fn on_event(&mut self, tick: Tick, event: &NegotiationEvent) {
        match event {
            NegotiationEvent::Transition { .. } => self.transitions += 1,
            NegotiationEvent::SafetyWarning { vehicle, peer, .. } => {
                self.warnings += 1;
                warn!(%tick, %vehicle, %peer, "safety warning");
            }
            NegotiationEvent::ConvoyCompleted { boundary, .. } => {
                self.convoys += 1;
                info!(%tick, timed_out = boundary.is_none(), "convoy completed");
            }
            NegotiationEvent::FlawEscalated { vehicle, .. } => {
                self.escalations += 1;
                info!(%tick, %vehicle, "follower told to wait for a silent peer");
            }
            NegotiationEvent::PriorityRequested { refused, .. } => {
                self.requests += 1;
                if *refused {
                    self.refusals += 1;
                }
            }
            NegotiationEvent::ExitBlocked { .. } => self.blocked += 1,
        }
    }

    fn on_tick_end(&mut self, _tick: Tick, summary: &TickSummary) {
        self.max_negotiating = self.max_negotiating.max(summary.negotiated);
    }
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();

    let mut config = match &cli.config {
        Some(path) => SimConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SimConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(ticks) = cli.ticks {
        config.total_ticks = ticks;
    }
    let total_ticks = config.total_ticks;

    // The demand stream gets its own child stream so it never shifts the
    // tie-break coin.
    let mut demand = Demand::new(&cli, SimRng::new(config.seed).child(1));
    let mut sim = SimBuilder::new(config, build_crossing()).build()?;
    info!(lanes = sim.lanes.len(), ticks = total_ticks, seed = sim.config.seed, "crossing ready");

    let mut tally = Tally::default();
    let t0 = Instant::now();
    while sim.clock.current_tick.0 < total_ticks {
        demand.spawn(sim.clock.current_tick, &mut sim.world)?;
        sim.run_ticks(1, &mut tally);
    }
    let elapsed = t0.elapsed();

    println!("Simulated {total_ticks} ticks in {:.3} s", elapsed.as_secs_f64());
    println!("  vehicles spawned   : {} ({} attempts skipped)", demand.spawned, demand.skipped);
    println!("  still in the world : {}", sim.world.vehicle_count());
    println!("  state transitions  : {}", tally.transitions);
    println!("  convoys completed  : {}", tally.convoys);
    println!("  priority requests  : {} ({} refused)", tally.requests, tally.refusals);
    println!("  flaw escalations   : {}", tally.escalations);
    println!("  exits blocked      : {}", tally.blocked);
    println!("  safety warnings    : {}", tally.warnings);
    println!("  busiest tick       : {} negotiating leaders", tally.max_negotiating);
    Ok(())
}
