//! The `Sim` struct and its tick loop.

use tracing::info;

use dim_agent::{AgentRegistry, DecisionBook};
use dim_core::{SimClock, SimConfig, SimRng};
use dim_lane::LaneNetwork;
use dim_world::WorldState;

use crate::negotiation::Negotiator;
use crate::{NegotiationEvent, SimObserver, TickSummary};

/// The simulation runner.
///
/// Owns the world, every agent and every lane channel.  Each tick syncs lane
/// membership and lets each lane leader negotiate, lane by lane in a fixed
/// order.
///
/// Create via [`SimBuilder`][crate::SimBuilder].
pub struct Sim<W: WorldState> {
    pub config: SimConfig,

    /// Current tick and its time in seconds.
    pub clock: SimClock,

    pub world: W,

    /// Every live agent, keyed by generational handle.
    pub agents: AgentRegistry,

    /// Lane channels in stepping order.
    pub lanes: LaneNetwork,

    /// Pairwise priority decisions of contested episodes.
    pub decisions: DecisionBook,

    /// Shared tie-break coin.
    pub(crate) rng: SimRng,
}

impl<W: WorldState> Sim<W> {
    // ── Public API ────────────────────────────────────────────────────────

    /// Run from the current tick to `config.end_tick()`, advancing the world
    /// by `step_secs` before each tick.
    pub fn run<O: SimObserver>(&mut self, observer: &mut O) {
        let start = self.clock.current_tick;
        while self.clock.current_tick < self.config.end_tick() {
            self.world.advance(self.config.step_secs);
            self.step(observer);
        }
        info!(
            from = %start,
            to = %self.clock.current_tick,
            agents = self.agents.len(),
            "simulation finished",
        );
        observer.on_sim_end(self.clock.current_tick);
    }

    /// Advance the world and step exactly `n` ticks (ignores `end_tick`).
    pub fn run_ticks<O: SimObserver>(&mut self, n: u64, observer: &mut O) {
        for _ in 0..n {
            self.world.advance(self.config.step_secs);
            self.step(observer);
        }
    }

    /// Process the current tick against the world as it is, then move the
    /// clock forward.  Does not advance the world.
    pub fn step<O: SimObserver>(&mut self, observer: &mut O) -> TickSummary {
        let now = self.clock.now();
        observer.on_tick_start(now.tick);

        let mut summary = TickSummary { tick: now.tick, ..TickSummary::default() };
        let mut events: Vec<NegotiationEvent> = Vec::new();

        let order: Vec<_> = self.lanes.indices().collect();
        for idx in order {
            let Some(lane) = self.lanes.get_mut(idx) else { continue };
            let delta = lane.sync_membership(&self.world, &mut self.agents, now);
            for (key, _) in &delta.departed {
                self.decisions.forget(*key);
            }
            summary.entered += delta.entered.len();
            summary.departed += delta.departed.len();

            let Some(leader) = lane.leader() else { continue };
            Negotiator {
                config:    &self.config.protocol,
                now,
                agents:    &mut self.agents,
                lanes:     &mut self.lanes,
                world:     &mut self.world,
                decisions: &mut self.decisions,
                rng:       &mut self.rng,
                events:    &mut events,
            }
            .step_leader(idx, leader);
            summary.negotiated += 1;
        }

        for event in &events {
            observer.on_event(now.tick, event);
        }
        summary.events = events.len();
        observer.on_tick_end(now.tick, &summary);

        self.clock.advance();
        summary
    }
}
