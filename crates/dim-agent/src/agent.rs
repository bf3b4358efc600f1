//! The agent record, its world snapshot and its actuation.

use std::fmt;

use tracing::debug;

use dim_core::{AgentKey, EdgeId, LaneIdx, Point, ProtocolConfig, SimTime, Tick, VehicleId};
use dim_world::WorldState;

use crate::BehaviorProfile;

// ── AgentState ────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum AgentState {
    #[default]
    Auto,
    Yielding,
    GainingPriority,
    /// Flaw agents only: a fixed hold after losing a contested episode.
    Waiting,
}

impl AgentState {
    /// Held at the stop line by a protocol decision.
    #[inline]
    pub fn is_held(self) -> bool {
        !matches!(self, AgentState::Auto)
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentState::Auto => "auto",
            AgentState::Yielding => "yielding",
            AgentState::GainingPriority => "gaining_priority",
            AgentState::Waiting => "waiting",
        };
        f.write_str(s)
    }
}

// ── StopSite ──────────────────────────────────────────────────────────────────

/// Where an agent's stop line is: the lane's edge and length.
#[derive(Copy, Clone, Debug)]
pub struct StopSite<'a> {
    pub edge:        &'a EdgeId,
    pub lane_length: f64,
}

impl StopSite<'_> {
    /// Stop position, `margin` metres short of the lane end.
    #[inline]
    pub fn stop_position(&self, margin: f64) -> f64 {
        (self.lane_length - margin).max(0.0)
    }
}

// ── Agent ─────────────────────────────────────────────────────────────────────

/// One vehicle's negotiation state for the time it occupies one lane.
///
/// Fields are public for observers and tests; state changes go through the
/// methods below so the timer invariants hold:
///
/// - `yielding_since.is_some()` iff `state == Yielding`
/// - `waiting_since.is_some()` iff `state == Waiting`
/// - entering `Auto` clears every timer and `should_wait`
/// - `exit_hold` implies `should_wait`
#[derive(Clone, Debug)]
pub struct Agent {
    pub key:     AgentKey,
    pub id:      VehicleId,
    pub profile: BehaviorProfile,
    pub lane:    LaneIdx,
    pub state:   AgentState,

    // World snapshot, refreshed at most once per tick.
    pub position:                 Point,
    pub lane_position:            f64,
    pub distance_to_intersection: f64,
    pub speed:                    f64,
    pub max_deceleration:         f64,
    pub last_refreshed:           Option<Tick>,

    // Timers, in simulated seconds.
    pub yielding_since:      Option<f64>,
    pub waiting_since:       Option<f64>,
    pub opposite_flaw_since: Option<f64>,

    pub should_wait:        bool,
    /// `should_wait` was raised by a blocked exit lane, not by flaw
    /// escalation, and is dropped once the exit clears.
    pub exit_hold:          bool,
    pub is_emergency:       bool,
    pub is_flaw:            bool,
    pub already_negotiated: bool,
}

impl Agent {
    pub fn new(key: AgentKey, id: VehicleId, profile: BehaviorProfile, lane: LaneIdx, lane_length: f64) -> Self {
        Self {
            key,
            id,
            profile,
            lane,
            state: AgentState::Auto,
            position: Point::default(),
            lane_position: 0.0,
            distance_to_intersection: lane_length,
            speed: 0.0,
            max_deceleration: 0.0,
            last_refreshed: None,
            yielding_since: None,
            waiting_since: None,
            opposite_flaw_since: None,
            should_wait: false,
            exit_hold: false,
            is_emergency: profile.is_emergency(),
            is_flaw: false,
            already_negotiated: false,
        }
    }

    // ── World snapshot ────────────────────────────────────────────────────

    /// Pull position, speed and braking capability from the world.
    ///
    /// Memoized per tick.  If the world no longer knows the vehicle the last
    /// known values are kept.
    pub fn refresh<W: WorldState + ?Sized>(&mut self, world: &W, lane_length: f64, now: SimTime) {
        if self.last_refreshed.is_some_and(|t| t >= now.tick) {
            return;
        }
        let (Some(position), Some(lane_position), Some(speed)) = (
            world.position(&self.id),
            world.lane_position(&self.id),
            world.speed(&self.id),
        ) else {
            return;
        };
        self.position = position;
        self.lane_position = lane_position;
        self.distance_to_intersection = lane_length - lane_position;
        self.speed = speed;
        if let Some(decel) = world.max_deceleration(&self.id) {
            self.max_deceleration = decel;
        }
        self.last_refreshed = Some(now.tick);
    }

    #[inline]
    pub fn can_transmit(&self) -> bool {
        self.profile.can_communicate()
    }

    /// Physically stopped, or held by the protocol.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.speed <= 0.0 || matches!(self.state, AgentState::Yielding | AgentState::Waiting)
    }

    /// Seconds spent in the current Yielding episode, 0 if not yielding.
    #[inline]
    pub fn yield_time(&self, now: SimTime) -> f64 {
        now.elapsed_since(self.yielding_since)
    }

    // ── Braking feasibility ───────────────────────────────────────────────

    /// Reaction delay plus time to brake from the current speed.
    pub fn min_braking_time(&self, config: &ProtocolConfig) -> f64 {
        self.speed / self.max_deceleration + config.stopping_time_delay_secs
    }

    /// Distance needed to come to rest, never less than the distance covered
    /// during the reaction delay.
    pub fn min_braking_distance(&self, config: &ProtocolConfig) -> f64 {
        if self.speed <= 0.0 {
            return 0.0;
        }
        if self.max_deceleration <= 0.0 {
            return f64::INFINITY;
        }
        let delay = config.stopping_time_delay_secs;
        let t = self.min_braking_time(config);
        let kinematic = delay * self.speed + self.speed * t - self.max_deceleration * t * t / 2.0;
        kinematic.max(delay * self.speed)
    }

    /// Whether the agent can still stop before the stop line.
    pub fn can_stop(&self, config: &ProtocolConfig) -> bool {
        if self.speed <= 0.0 || self.state.is_held() {
            return true;
        }
        self.distance_to_intersection - config.min_braking_margin >= self.min_braking_distance(config)
    }

    // ── Transitions with actuation ────────────────────────────────────────

    /// Stop at the stop line and enter Yielding.
    ///
    /// Returns `true` if the agent is yielding afterwards.  An agent that
    /// cannot stop in time, or whose stop request the world rejects, stays
    /// where it is.
    pub fn yield_now<W: WorldState + ?Sized>(
        &mut self,
        world:  &mut W,
        site:   StopSite<'_>,
        config: &ProtocolConfig,
        now:    SimTime,
    ) -> bool {
        if matches!(self.state, AgentState::Yielding | AgentState::Waiting) {
            return true;
        }
        if !self.can_stop(config) {
            return false;
        }
        let at = site.stop_position(config.min_braking_margin);
        if let Err(e) = world.request_stop(&self.id, site.edge, at) {
            debug!(vehicle = %self.id, error = %e, "stop request ignored");
            return false;
        }
        self.state = AgentState::Yielding;
        self.yielding_since = Some(now.secs);
        self.waiting_since = None;
        true
    }

    /// Leave Yielding / GainingPriority for Auto.
    ///
    /// A no-op (returns `false`) in any other state, including Waiting, whose
    /// hold is released by [`Agent::release_hold`].
    pub fn resume<W: WorldState + ?Sized>(
        &mut self,
        world:  &mut W,
        site:   StopSite<'_>,
        config: &ProtocolConfig,
    ) -> bool {
        let outcome = match self.state {
            AgentState::Yielding => world.resume(&self.id),
            AgentState::GainingPriority => {
                let at = site.stop_position(config.min_braking_margin);
                world.request_stop_duration(&self.id, site.edge, at, 0.0)
            }
            AgentState::Auto | AgentState::Waiting => return false,
        };
        if let Err(e) = outcome {
            debug!(vehicle = %self.id, error = %e, "resume ignored");
            return false;
        }
        self.enter_auto();
        true
    }

    /// End a Waiting hold: release the stop and re-enter Auto.
    pub fn release_hold<W: WorldState + ?Sized>(&mut self, world: &mut W) {
        if let Err(e) = world.resume(&self.id) {
            debug!(vehicle = %self.id, error = %e, "hold release ignored");
        }
        self.enter_auto();
    }

    /// Still inside the Waiting hold at `now`.
    pub fn is_holding(&self, config: &ProtocolConfig, now: SimTime) -> bool {
        self.state == AgentState::Waiting
            && now.elapsed_since(self.waiting_since) < config.waiting_hold_secs
    }

    // ── Transitions without actuation ─────────────────────────────────────
    //
    // The vehicle is already held at the stop line in all of these.

    pub fn begin_gaining_priority(&mut self) {
        self.state = AgentState::GainingPriority;
        self.yielding_since = None;
        self.waiting_since = None;
    }

    pub fn fall_back_to_yielding(&mut self, now: SimTime) {
        if self.state != AgentState::Yielding {
            self.yielding_since = Some(now.secs);
        }
        self.state = AgentState::Yielding;
        self.waiting_since = None;
    }

    pub fn enter_waiting(&mut self, now: SimTime) {
        self.state = AgentState::Waiting;
        self.waiting_since = Some(now.secs);
        self.yielding_since = None;
    }

    fn enter_auto(&mut self) {
        self.state = AgentState::Auto;
        self.yielding_since = None;
        self.waiting_since = None;
        self.opposite_flaw_since = None;
        self.should_wait = false;
        self.exit_hold = false;
    }
}
