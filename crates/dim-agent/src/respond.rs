//! Answering requests.

use tracing::trace;

use dim_core::{ProtocolConfig, SimTime};
use dim_protocol::{Body, LeaderReport, Message};
use dim_world::WorldState;

use crate::{Agent, StopSite};

/// How a request reached the agent.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Protocol message.  Needs a communicating receiver.
    Radio,
    /// One-way visual observation.  Only the opposite-leader report can be
    /// perceived; every agent can be perceived.
    Perception,
}

/// Result of handling one request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Handled {
    pub reply:          Option<Message>,
    /// Forward the request to the next agent upstream.
    pub relay_upstream: bool,
}

impl Handled {
    fn reply(message: Message) -> Self {
        Self { reply: Some(message), relay_upstream: false }
    }

    fn silent() -> Self {
        Self::default()
    }
}

impl Agent {
    pub fn leader_report(&self, config: &ProtocolConfig, now: SimTime) -> LeaderReport {
        LeaderReport {
            distance_to_intersection: self.distance_to_intersection,
            is_stopped:               self.is_stopped(),
            wait_time:                self.yield_time(now),
            can_brake:                self.can_stop(config),
        }
    }

    /// Answer `message`.  May stop the agent (on `PriorityRequired`).
    pub fn handle<W: WorldState + ?Sized>(
        &mut self,
        message:  &Message,
        delivery: Delivery,
        world:    &mut W,
        site:     StopSite<'_>,
        config:   &ProtocolConfig,
        now:      SimTime,
    ) -> Handled {
        if !message.is_request() {
            trace!(vehicle = %self.id, kind = message.body.kind(), "ignoring non-request message");
            return Handled::silent();
        }

        if delivery == Delivery::Perception {
            return match message.body {
                Body::RequestOppositeLeader { .. } => Handled::reply(Message::new(
                    self.key,
                    Body::ResponseOppositeLeader(self.leader_report(config, now)),
                )),
                _ => Handled::silent(),
            };
        }
        if !self.can_transmit() {
            return Handled::silent();
        }

        let body = match message.body {
            Body::RequestFollower { sender_wait_time } => Body::ResponseFollower {
                detected_count: self.convoy_report(config, sender_wait_time, now),
            },
            Body::RequestEmergency if self.profile.is_emergency() => Body::ResponseEmergency,
            Body::RequestEmergency => Body::ResponseNotEmergency,
            Body::RequestOppositeLeader { .. } => {
                Body::ResponseOppositeLeader(self.leader_report(config, now))
            }
            Body::RequestNextLastFollower { .. } => Body::ResponseNextLastFollower {
                distance_to_intersection: self.distance_to_intersection,
                is_stopped_or_slow:       self.speed <= config.slow_speed,
                wait_time:                self.yield_time(now),
                can_brake:                self.can_stop(config),
            },
            Body::PriorityRequired => {
                if self.yield_now(world, site, config, now) {
                    Body::Yielding
                } else {
                    return Handled {
                        reply:          Some(Message::new(self.key, Body::YieldingNotPossible)),
                        relay_upstream: true,
                    };
                }
            }
            _ => return Handled::silent(),
        };
        Handled::reply(Message::new(self.key, body))
    }
}
