//! Unit tests for dim-agent.

#[cfg(test)]
mod fixtures {
    use dim_core::{LaneIdx, Point, SimTime, Tick, VehicleId};
    use dim_world::{LaneSpec, MemoryWorld, VehicleSpec};

    use crate::{AgentRegistry, BehaviorProfile};

    pub const LANE_LENGTH: f64 = 100.0;

    /// One 100 m lane `w_in` on edge `w`, ending at x = 0.
    pub fn world() -> MemoryWorld {
        let mut w = MemoryWorld::new();
        w.add_lane(LaneSpec::new(
            "w_in",
            "w",
            vec![Point::new(-100.0, 0.0), Point::new(0.0, 0.0)],
        ));
        w
    }

    pub fn at(tick: u64) -> SimTime {
        SimTime::new(Tick(tick), tick as f64)
    }

    /// Put a vehicle `distance` metres before the lane end and spawn its agent.
    pub fn place(
        world:    &mut MemoryWorld,
        agents:   &mut AgentRegistry,
        id:       &str,
        distance: f64,
        speed:    f64,
    ) -> dim_core::AgentKey {
        world
            .add_vehicle(VehicleSpec::new(id, "w_in", LANE_LENGTH - distance).speed(speed))
            .unwrap();
        let key = agents.spawn(
            VehicleId::from(id),
            BehaviorProfile::from_vehicle_id(id),
            LaneIdx(0),
            LANE_LENGTH,
        );
        agents.get_mut(key).unwrap().refresh(world, LANE_LENGTH, at(0));
        key
    }
}

#[cfg(test)]
mod profile {
    use crate::BehaviorProfile;

    #[test]
    fn classified_by_name_tag() {
        assert_eq!(BehaviorProfile::from_vehicle_id("veh3"), BehaviorProfile::Normal);
        assert_eq!(BehaviorProfile::from_vehicle_id("veh3_emergency"), BehaviorProfile::Emergency);
        assert_eq!(BehaviorProfile::from_vehicle_id("veh3_dec"), BehaviorProfile::Deceiving);
        assert_eq!(BehaviorProfile::from_vehicle_id("veh3_flaw"), BehaviorProfile::Flaw);
    }

    #[test]
    fn flaw_tag_wins() {
        assert_eq!(BehaviorProfile::from_vehicle_id("x_emergency_flaw"), BehaviorProfile::Flaw);
    }

    #[test]
    fn capabilities() {
        assert!(BehaviorProfile::Normal.can_communicate());
        assert!(!BehaviorProfile::Flaw.can_communicate());
        assert!(BehaviorProfile::Emergency.is_emergency());
        assert!(!BehaviorProfile::Deceiving.is_emergency());
        assert!(BehaviorProfile::Deceiving.capabilities().fabricates_convoy_response);
        assert_eq!(BehaviorProfile::Flaw.to_string(), "flaw");
    }
}

#[cfg(test)]
mod braking {
    use dim_core::ProtocolConfig;

    use super::fixtures::*;
    use crate::{AgentRegistry, AgentState};

    #[test]
    fn refresh_reads_world() {
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let k = place(&mut w, &mut agents, "a", 40.0, 10.0);
        let a = agents.get(k).unwrap();
        assert_eq!(a.distance_to_intersection, 40.0);
        assert_eq!(a.speed, 10.0);
        assert_eq!(a.max_deceleration, 4.5);
        assert!((a.position.x + 40.0).abs() < 1e-9);
    }

    #[test]
    fn refresh_is_memoized_per_tick() {
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let k = place(&mut w, &mut agents, "a", 40.0, 10.0);
        w.set_speed(&"a".into(), 3.0).unwrap();
        let a = agents.get_mut(k).unwrap();
        a.refresh(&w, LANE_LENGTH, at(0));
        assert_eq!(a.speed, 10.0);
        a.refresh(&w, LANE_LENGTH, at(1));
        assert_eq!(a.speed, 3.0);
    }

    #[test]
    fn refresh_keeps_last_values_after_departure() {
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let k = place(&mut w, &mut agents, "a", 40.0, 10.0);
        w.remove_vehicle(&"a".into());
        let a = agents.get_mut(k).unwrap();
        a.refresh(&w, LANE_LENGTH, at(1));
        assert_eq!(a.distance_to_intersection, 40.0);
    }

    #[test]
    fn braking_distance() {
        let cfg = ProtocolConfig::default();
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let k = place(&mut w, &mut agents, "a", 40.0, 10.0);
        let a = agents.get(k).unwrap();
        assert!((a.min_braking_time(&cfg) - (10.0 / 4.5 + 1.0)).abs() < 1e-9);
        assert!((a.min_braking_distance(&cfg) - 18.8611).abs() < 1e-3);
        assert!(a.can_stop(&cfg));
    }

    #[test]
    fn stopped_agent_needs_no_distance() {
        let cfg = ProtocolConfig::default();
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let k = place(&mut w, &mut agents, "a", 0.5, 0.0);
        let a = agents.get(k).unwrap();
        assert_eq!(a.min_braking_distance(&cfg), 0.0);
        assert!(a.can_stop(&cfg));
        assert!(a.is_stopped());
    }

    #[test]
    fn too_close_cannot_stop() {
        let cfg = ProtocolConfig::default();
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let k = place(&mut w, &mut agents, "a", 10.0, 12.0);
        let a = agents.get_mut(k).unwrap();
        assert!(!a.can_stop(&cfg));
        // Already held by the protocol: counts as able to stop.
        a.state = AgentState::Yielding;
        assert!(a.can_stop(&cfg));
    }

    #[test]
    fn reaction_distance_is_a_floor() {
        let cfg = ProtocolConfig::default();
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let k = place(&mut w, &mut agents, "a", 50.0, 2.0);
        let a = agents.get_mut(k).unwrap();
        a.max_deceleration = 100.0;
        assert!(a.min_braking_distance(&cfg) >= 2.0 * cfg.stopping_time_delay_secs);
        a.max_deceleration = 0.0;
        assert_eq!(a.min_braking_distance(&cfg), f64::INFINITY);
    }
}

#[cfg(test)]
mod actuation {
    use dim_core::{EdgeId, ProtocolConfig};
    use dim_world::Actuation;

    use super::fixtures::*;
    use crate::{AgentRegistry, AgentState, StopSite};

    #[test]
    fn yield_stops_before_the_line() {
        let cfg = ProtocolConfig::default();
        let edge = EdgeId::from("w");
        let site = StopSite { edge: &edge, lane_length: LANE_LENGTH };
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let k = place(&mut w, &mut agents, "a", 40.0, 10.0);
        let a = agents.get_mut(k).unwrap();

        assert!(a.yield_now(&mut w, site, &cfg, at(3)));
        assert_eq!(a.state, AgentState::Yielding);
        assert_eq!(a.yielding_since, Some(3.0));
        assert_eq!(
            w.actuations(),
            &[Actuation::Stop { vehicle: "a".into(), edge: "w".into(), position: 99.0 }]
        );

        // Second call is a no-op.
        assert!(a.yield_now(&mut w, site, &cfg, at(4)));
        assert_eq!(a.yielding_since, Some(3.0));
        assert_eq!(w.actuations().len(), 1);
    }

    #[test]
    fn yield_refused_when_unable_to_stop() {
        let cfg = ProtocolConfig::default();
        let edge = EdgeId::from("w");
        let site = StopSite { edge: &edge, lane_length: LANE_LENGTH };
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let k = place(&mut w, &mut agents, "a", 5.0, 13.0);
        let a = agents.get_mut(k).unwrap();
        assert!(!a.yield_now(&mut w, site, &cfg, at(0)));
        assert_eq!(a.state, AgentState::Auto);
        assert!(w.actuations().is_empty());
    }

    #[test]
    fn resume_from_each_state() {
        let cfg = ProtocolConfig::default();
        let edge = EdgeId::from("w");
        let site = StopSite { edge: &edge, lane_length: LANE_LENGTH };
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let k = place(&mut w, &mut agents, "a", 40.0, 0.0);
        let a = agents.get_mut(k).unwrap();

        // Auto: nothing to release.
        assert!(!a.resume(&mut w, site, &cfg));
        assert!(w.actuations().is_empty());

        a.yield_now(&mut w, site, &cfg, at(0));
        a.should_wait = true;
        assert!(a.resume(&mut w, site, &cfg));
        assert_eq!(a.state, AgentState::Auto);
        assert!(!a.should_wait);
        assert_eq!(a.yielding_since, None);
        assert_eq!(w.actuations().last(), Some(&Actuation::Resume { vehicle: "a".into() }));

        a.yield_now(&mut w, site, &cfg, at(1));
        a.begin_gaining_priority();
        assert!(a.resume(&mut w, site, &cfg));
        assert_eq!(
            w.actuations().last(),
            Some(&Actuation::StopDuration {
                vehicle:  "a".into(),
                edge:     "w".into(),
                position: 99.0,
                duration: 0.0,
            })
        );
    }

    #[test]
    fn waiting_hold() {
        let cfg = ProtocolConfig::default();
        let edge = EdgeId::from("w");
        let site = StopSite { edge: &edge, lane_length: LANE_LENGTH };
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let k = place(&mut w, &mut agents, "a_flaw", 40.0, 0.0);
        let a = agents.get_mut(k).unwrap();

        a.yield_now(&mut w, site, &cfg, at(0));
        a.enter_waiting(at(5));
        assert_eq!(a.yielding_since, None);
        assert!(a.is_holding(&cfg, at(16)));
        assert!(!a.is_holding(&cfg, at(17)));

        // resume() never ends a Waiting hold.
        assert!(!a.resume(&mut w, site, &cfg));
        assert_eq!(a.state, AgentState::Waiting);

        a.release_hold(&mut w);
        assert_eq!(a.state, AgentState::Auto);
        assert_eq!(a.waiting_since, None);
        assert!(!w.is_held(&"a_flaw".into()));
    }

    #[test]
    fn fall_back_keeps_running_yield_timer() {
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let k = place(&mut w, &mut agents, "a", 40.0, 0.0);
        let a = agents.get_mut(k).unwrap();
        a.begin_gaining_priority();
        a.fall_back_to_yielding(at(7));
        assert_eq!(a.yielding_since, Some(7.0));
        a.fall_back_to_yielding(at(9));
        assert_eq!(a.yielding_since, Some(7.0));
        assert_eq!(a.yield_time(at(10)), 3.0);
    }
}

#[cfg(test)]
mod decide {
    use dim_core::ProtocolConfig;
    use dim_protocol::LeaderReport;

    use super::fixtures::*;
    use crate::{AgentRegistry, AgentState, AgentView, YieldReason};

    fn report(distance: f64, is_stopped: bool, can_brake: bool) -> LeaderReport {
        LeaderReport { distance_to_intersection: distance, is_stopped, wait_time: 0.0, can_brake }
    }

    #[test]
    fn farther_agent_yields_to_closer_moving_peer() {
        let cfg = ProtocolConfig::default();
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let a = place(&mut w, &mut agents, "a", 40.0, 10.0);
        let b = place(&mut w, &mut agents, "b", 30.0, 10.0);
        let me = agents.get(a).unwrap();
        let peer = agents.view(b).unwrap();

        let v = me.yield_verdict(&report(30.0, false, true), &peer, &cfg);
        assert!(v.should_yield);
        assert_eq!(v.reason, YieldReason::PeerCloser);

        let v = me.yield_verdict(&report(45.0, false, true), &peer, &cfg);
        assert_eq!(v.reason, YieldReason::Proceed);
    }

    #[test]
    fn stopped_peers_do_not_block() {
        let cfg = ProtocolConfig::default();
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let a1 = place(&mut w, &mut agents, "a1", 40.0, 0.0);
        let b1 = place(&mut w, &mut agents, "b1", 45.0, 0.0);
        let ra = agents.get(a1).unwrap().leader_report(&cfg, at(0));
        let rb = agents.get(b1).unwrap().leader_report(&cfg, at(0));
        let va = agents.view(a1).unwrap();
        let vb = agents.view(b1).unwrap();
        assert!(!agents.get(a1).unwrap().should_yield(&rb, &vb, &cfg));
        assert!(!agents.get(b1).unwrap().should_yield(&ra, &va, &cfg));
    }

    #[test]
    fn equal_distance_higher_id_yields() {
        let cfg = ProtocolConfig::default();
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let a = place(&mut w, &mut agents, "a", 40.0, 8.0);
        let b = place(&mut w, &mut agents, "b", 40.0, 8.0);
        let rb = agents.get(b).unwrap().leader_report(&cfg, at(0));
        let ra = agents.get(a).unwrap().leader_report(&cfg, at(0));
        let vb = agents.view(b).unwrap();
        let va = agents.view(a).unwrap();
        assert!(!agents.get(a).unwrap().should_yield(&rb, &vb, &cfg));
        let v = agents.get(b).unwrap().yield_verdict(&ra, &va, &cfg);
        assert!(v.should_yield);
        assert_eq!(v.reason, YieldReason::TieBreak);
    }

    #[test]
    fn braking_check_overrides_everything() {
        let cfg = ProtocolConfig::default();
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let a = place(&mut w, &mut agents, "a", 5.0, 13.0);
        let b = place(&mut w, &mut agents, "b", 60.0, 5.0);
        agents.get_mut(a).unwrap().should_wait = true;
        let peer = agents.view(b).unwrap();
        let me = agents.get(a).unwrap();

        let v = me.yield_verdict(&report(1.0, false, true), &peer, &cfg);
        assert!(!v.should_yield);
        assert_eq!(v.reason, YieldReason::CannotStop);

        let v = me.yield_verdict(&report(1.0, false, false), &peer, &cfg);
        assert!(v.is_safety_warning());
    }

    #[test]
    fn forced_wait_and_flaw_rules() {
        let cfg = ProtocolConfig::default();
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let n = place(&mut w, &mut agents, "n", 10.0, 5.0);
        let f = place(&mut w, &mut agents, "f_flaw", 60.0, 5.0);
        let far = report(60.0, false, true);
        let near = report(10.0, false, true);

        // A Flaw peer never makes a normal agent yield...
        let fv = agents.view(f).unwrap();
        let v = agents.get(n).unwrap().yield_verdict(&far, &fv, &cfg);
        assert_eq!(v.reason, YieldReason::UntrustedFlawPeer);
        // ...unless the normal agent was told to wait.
        agents.get_mut(n).unwrap().should_wait = true;
        let v = agents.get(n).unwrap().yield_verdict(&far, &fv, &cfg);
        assert_eq!(v.reason, YieldReason::ForcedWait);

        // A Flaw agent yields unless its peer is forced to wait.
        let nv = agents.view(n).unwrap();
        let v = agents.get(f).unwrap().yield_verdict(&near, &nv, &cfg);
        assert_eq!(v.reason, YieldReason::PeerCloser);
        agents.get_mut(n).unwrap().should_wait = false;
        let nv = agents.view(n).unwrap();
        let v = agents.get(f).unwrap().yield_verdict(&near, &nv, &cfg);
        assert_eq!(v.reason, YieldReason::FlawCaution);
    }

    #[test]
    fn held_states_wait_for_a_stopped_peer() {
        let cfg = ProtocolConfig::default();
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let a = place(&mut w, &mut agents, "a", 2.0, 0.0);
        let b = place(&mut w, &mut agents, "b", 50.0, 5.0);
        let peer = agents.view(b).unwrap();

        agents.get_mut(a).unwrap().state = AgentState::Yielding;
        let v = agents.get(a).unwrap().yield_verdict(&report(50.0, false, true), &peer, &cfg);
        assert_eq!(v.reason, YieldReason::PeerStillMoving);

        agents.get_mut(a).unwrap().state = AgentState::GainingPriority;
        let v = agents.get(a).unwrap().yield_verdict(&report(50.0, true, false), &peer, &cfg);
        assert_eq!(v.reason, YieldReason::PriorityUnconfirmed);
        let v = agents.get(a).unwrap().yield_verdict(&report(50.0, true, true), &peer, &cfg);
        assert_eq!(v.reason, YieldReason::PeerStopped);
    }

    #[test]
    fn view_mirrors_agent() {
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let k = place(&mut w, &mut agents, "x_emergency", 40.0, 5.0);
        let v = AgentView::of(agents.get(k).unwrap());
        assert!(v.is_emergency);
        assert_eq!(v.key, k);
        assert_eq!(v.id.as_str(), "x_emergency");
    }
}

#[cfg(test)]
mod decide_props {
    use proptest::prelude::*;

    use dim_core::ProtocolConfig;
    use dim_protocol::LeaderReport;

    use super::fixtures::*;
    use crate::AgentRegistry;

    proptest! {
        /// An agent that cannot stop in time is never told to yield.
        #[test]
        fn never_yields_when_unable_to_stop(
            distance    in 0.0f64..100.0,
            speed       in 0.0f64..30.0,
            should_wait in any::<bool>(),
            peer_dist   in 0.0f64..100.0,
            peer_stop   in any::<bool>(),
            peer_brake  in any::<bool>(),
        ) {
            let cfg = ProtocolConfig::default();
            let mut w = world();
            let mut agents = AgentRegistry::new();
            let a = place(&mut w, &mut agents, "a", distance, speed);
            let b = place(&mut w, &mut agents, "b", peer_dist, 1.0);
            agents.get_mut(a).unwrap().should_wait = should_wait;
            let peer = agents.view(b).unwrap();
            let report = LeaderReport {
                distance_to_intersection: peer_dist,
                is_stopped: peer_stop,
                wait_time: 0.0,
                can_brake: peer_brake,
            };
            let me = agents.get(a).unwrap();
            if !me.can_stop(&cfg) {
                prop_assert!(!me.should_yield(&report, &peer, &cfg));
            }
        }

        /// Two moving Auto leaders at the same distance: exactly one yields.
        #[test]
        fn tie_break_picks_exactly_one(
            distance in 40.0f64..90.0,
            speed    in 1.0f64..8.0,
            id_a     in "[a-z]{1,6}",
            id_b     in "[a-z]{1,6}",
        ) {
            prop_assume!(id_a != id_b);
            let cfg = ProtocolConfig::default();
            let mut w = world();
            let mut agents = AgentRegistry::new();
            let a = place(&mut w, &mut agents, &id_a, distance, speed);
            let b = place(&mut w, &mut agents, &id_b, distance, speed);
            let ra = agents.get(a).unwrap().leader_report(&cfg, at(0));
            let rb = agents.get(b).unwrap().leader_report(&cfg, at(0));
            let va = agents.view(a).unwrap();
            let vb = agents.view(b).unwrap();
            let a_yields = agents.get(a).unwrap().should_yield(&rb, &vb, &cfg);
            let b_yields = agents.get(b).unwrap().should_yield(&ra, &va, &cfg);
            prop_assert!(a_yields != b_yields);
            prop_assert_eq!(b_yields, id_b > id_a);
        }
    }
}

#[cfg(test)]
mod convoy {
    use slotmap::SlotMap;

    use dim_core::{AgentKey, ProtocolConfig};

    use super::fixtures::*;
    use crate::{AgentRegistry, ConvoyOutcome, tally_convoy};

    fn keys(n: usize) -> Vec<AgentKey> {
        let mut map: SlotMap<AgentKey, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    #[test]
    fn enough_followers_complete_the_convoy() {
        let cfg = ProtocolConfig::default();
        let k = keys(7);
        let responses: Vec<_> = k.iter().map(|&key| (key, 1)).collect();
        let out = tally_convoy(1, &responses, 0.0, &cfg);
        assert_eq!(out, ConvoyOutcome { complete: true, boundary: Some(k[6]) });
    }

    #[test]
    fn short_convoy_waits_for_timeout() {
        let cfg = ProtocolConfig::default();
        let k = keys(6);
        let responses: Vec<_> = k.iter().map(|&key| (key, 1)).collect();
        assert_eq!(tally_convoy(1, &responses, 19.0, &cfg), ConvoyOutcome::default());
        assert_eq!(
            tally_convoy(1, &responses, 20.0, &cfg),
            ConvoyOutcome { complete: true, boundary: None }
        );
    }

    #[test]
    fn deceiving_follower_claims_the_rest_of_the_convoy() {
        let cfg = ProtocolConfig::default();
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let d = place(&mut w, &mut agents, "v_dec", 40.0, 0.0);
        let n = place(&mut w, &mut agents, "v", 50.0, 0.0);
        let (d, n) = (agents.get(d).unwrap(), agents.get(n).unwrap());

        // Queued followers are in Auto: the leader's episode is what counts.
        assert_eq!(d.convoy_report(&cfg, 9.0, at(9)), 1);
        assert_eq!(d.convoy_report(&cfg, 10.0, at(10)), 7);
        assert_eq!(n.convoy_report(&cfg, 10.0, at(10)), 1);

        // One honest leader plus the fabricated claim completes.
        let out = tally_convoy(1, &[(d.key, 7)], 10.0, &cfg);
        assert_eq!(out, ConvoyOutcome { complete: true, boundary: Some(d.key) });
    }

    #[test]
    fn deceiving_leader_declares_its_own_convoy() {
        let cfg = ProtocolConfig::default();
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let d = place(&mut w, &mut agents, "v_dec", 40.0, 0.0);
        let n = place(&mut w, &mut agents, "v", 50.0, 0.0);
        agents.get_mut(d).unwrap().yielding_since = Some(0.0);
        agents.get_mut(n).unwrap().yielding_since = Some(0.0);

        assert!(!agents.get(d).unwrap().declares_convoy_complete(&cfg, at(9)));
        assert!(agents.get(d).unwrap().declares_convoy_complete(&cfg, at(10)));
        assert!(!agents.get(n).unwrap().declares_convoy_complete(&cfg, at(19)));
    }
}

#[cfg(test)]
mod respond {
    use dim_core::{EdgeId, ProtocolConfig};
    use dim_protocol::{Body, Message};
    use dim_world::Actuation;

    use super::fixtures::*;
    use crate::{AgentRegistry, AgentState, Delivery, StopSite};

    #[test]
    fn flaw_is_silent_on_radio_but_perceivable() {
        let cfg = ProtocolConfig::default();
        let edge = EdgeId::from("w");
        let site = StopSite { edge: &edge, lane_length: LANE_LENGTH };
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let asker = place(&mut w, &mut agents, "a", 40.0, 5.0);
        let f = place(&mut w, &mut agents, "f_flaw", 8.0, 0.0);
        let req = Message::new(
            asker,
            Body::RequestOppositeLeader { sender_distance: 40.0, sender_wait_time: 0.0 },
        );
        let flaw = agents.get_mut(f).unwrap();

        let radio = flaw.handle(&req, Delivery::Radio, &mut w, site, &cfg, at(0));
        assert_eq!(radio.reply, None);

        let seen = flaw.handle(&req, Delivery::Perception, &mut w, site, &cfg, at(0));
        let Some(Message { sender, body: Body::ResponseOppositeLeader(report) }) = seen.reply else {
            panic!("expected a leader report");
        };
        assert_eq!(sender, f);
        assert_eq!(report.distance_to_intersection, 8.0);
        assert!(report.is_stopped);
    }

    #[test]
    fn perception_only_answers_leader_queries() {
        let cfg = ProtocolConfig::default();
        let edge = EdgeId::from("w");
        let site = StopSite { edge: &edge, lane_length: LANE_LENGTH };
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let a = place(&mut w, &mut agents, "a", 40.0, 5.0);
        let b = place(&mut w, &mut agents, "b", 50.0, 5.0);
        let out = agents.get_mut(b).unwrap().handle(
            &Message::new(a, Body::RequestFollower { sender_wait_time: 0.0 }),
            Delivery::Perception,
            &mut w,
            site,
            &cfg,
            at(0),
        );
        assert_eq!(out.reply, None);
    }

    #[test]
    fn answers_emergency_and_follower_queries() {
        let cfg = ProtocolConfig::default();
        let edge = EdgeId::from("w");
        let site = StopSite { edge: &edge, lane_length: LANE_LENGTH };
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let a = place(&mut w, &mut agents, "a", 40.0, 5.0);
        let e = place(&mut w, &mut agents, "e_emergency", 50.0, 5.0);
        let n = place(&mut w, &mut agents, "n", 60.0, 5.0);

        let ask = Message::new(a, Body::RequestEmergency);
        let out = agents.get_mut(e).unwrap().handle(&ask, Delivery::Radio, &mut w, site, &cfg, at(0));
        assert_eq!(out.reply.map(|m| m.body), Some(Body::ResponseEmergency));
        let out = agents.get_mut(n).unwrap().handle(&ask, Delivery::Radio, &mut w, site, &cfg, at(0));
        assert_eq!(out.reply.map(|m| m.body), Some(Body::ResponseNotEmergency));

        let ask = Message::new(a, Body::RequestFollower { sender_wait_time: 0.0 });
        let out = agents.get_mut(n).unwrap().handle(&ask, Delivery::Radio, &mut w, site, &cfg, at(0));
        assert_eq!(out.reply.map(|m| m.body), Some(Body::ResponseFollower { detected_count: 1 }));
    }

    #[test]
    fn tail_reports_slow_flag() {
        let cfg = ProtocolConfig::default();
        let edge = EdgeId::from("w");
        let site = StopSite { edge: &edge, lane_length: LANE_LENGTH };
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let a = place(&mut w, &mut agents, "a", 40.0, 5.0);
        let t = place(&mut w, &mut agents, "t", 95.0, 0.5);
        let ask = Message::new(
            a,
            Body::RequestNextLastFollower { sender_distance: 40.0, sender_wait_time: 0.0 },
        );
        let out = agents.get_mut(t).unwrap().handle(&ask, Delivery::Radio, &mut w, site, &cfg, at(0));
        let Some(Body::ResponseNextLastFollower { is_stopped_or_slow, distance_to_intersection, .. }) =
            out.reply.map(|m| m.body)
        else {
            panic!("expected a tail report");
        };
        assert!(is_stopped_or_slow);
        assert_eq!(distance_to_intersection, 95.0);
    }

    #[test]
    fn priority_required_stops_or_relays() {
        let cfg = ProtocolConfig::default();
        let edge = EdgeId::from("w");
        let site = StopSite { edge: &edge, lane_length: LANE_LENGTH };
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let a = place(&mut w, &mut agents, "a", 60.0, 0.0);
        let slow = place(&mut w, &mut agents, "slow", 40.0, 5.0);
        let fast = place(&mut w, &mut agents, "fast", 4.0, 13.0);
        let req = Message::new(a, Body::PriorityRequired);

        let out = agents.get_mut(slow).unwrap().handle(&req, Delivery::Radio, &mut w, site, &cfg, at(2));
        assert_eq!(out.reply.map(|m| m.body), Some(Body::Yielding));
        assert!(!out.relay_upstream);
        assert_eq!(agents.get(slow).unwrap().state, AgentState::Yielding);
        assert_eq!(
            w.actuations(),
            &[Actuation::Stop { vehicle: "slow".into(), edge: "w".into(), position: 99.0 }]
        );

        let out = agents.get_mut(fast).unwrap().handle(&req, Delivery::Radio, &mut w, site, &cfg, at(2));
        assert_eq!(out.reply.map(|m| m.body), Some(Body::YieldingNotPossible));
        assert!(out.relay_upstream);
        assert_eq!(agents.get(fast).unwrap().state, AgentState::Auto);
    }

    #[test]
    fn responses_are_ignored() {
        let cfg = ProtocolConfig::default();
        let edge = EdgeId::from("w");
        let site = StopSite { edge: &edge, lane_length: LANE_LENGTH };
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let a = place(&mut w, &mut agents, "a", 40.0, 5.0);
        let b = place(&mut w, &mut agents, "b", 50.0, 5.0);
        let out = agents.get_mut(b).unwrap().handle(
            &Message::new(a, Body::Yielding),
            Delivery::Radio,
            &mut w,
            site,
            &cfg,
            at(0),
        );
        assert_eq!(out, Default::default());
    }
}

#[cfg(test)]
mod priority {
    use dim_core::SimRng;

    use super::fixtures::*;
    use crate::{AgentRegistry, AgentState, DecisionBook, resolve_priority};

    #[test]
    fn book_is_symmetric() {
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let a = place(&mut w, &mut agents, "a", 40.0, 0.0);
        let b = place(&mut w, &mut agents, "b", 40.0, 0.0);
        let c = place(&mut w, &mut agents, "c", 40.0, 0.0);
        let mut book = DecisionBook::new();
        book.settle(b, a);
        assert_eq!(book.decision(a, b), Some(false));
        assert_eq!(book.decision(b, a), Some(true));
        assert_eq!(book.decision(a, c), None);
        book.settle(c, a);
        book.forget(a);
        assert!(book.is_empty());
    }

    #[test]
    fn emergency_pair_shares_one_coin() {
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let a = place(&mut w, &mut agents, "a_emergency", 40.0, 5.0);
        let b = place(&mut w, &mut agents, "b_emergency", 40.0, 5.0);
        let (va, vb) = (agents.view(a).unwrap(), agents.view(b).unwrap());
        let mut book = DecisionBook::new();
        let mut rng = SimRng::new(7);

        let d = resolve_priority(&va, &vb, &mut book, &mut rng).unwrap();
        let e = resolve_priority(&vb, &va, &mut book, &mut rng).unwrap();
        assert_eq!(e, !d);
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn lone_emergency_has_right_of_way() {
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let e = place(&mut w, &mut agents, "e_emergency", 40.0, 5.0);
        let n = place(&mut w, &mut agents, "n", 40.0, 5.0);
        let (ve, vn) = (agents.view(e).unwrap(), agents.view(n).unwrap());
        let mut book = DecisionBook::new();
        let mut rng = SimRng::new(0);
        assert_eq!(resolve_priority(&vn, &ve, &mut book, &mut rng), Some(false));
        assert_eq!(resolve_priority(&ve, &vn, &mut book, &mut rng), None);
    }

    #[test]
    fn forced_wait_then_flaw() {
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let n = place(&mut w, &mut agents, "n", 40.0, 5.0);
        let f = place(&mut w, &mut agents, "f_flaw", 40.0, 5.0);
        let mut book = DecisionBook::new();
        let mut rng = SimRng::new(0);

        let (vn, vf) = (agents.view(n).unwrap(), agents.view(f).unwrap());
        assert_eq!(resolve_priority(&vn, &vf, &mut book, &mut rng), Some(true));
        assert_eq!(resolve_priority(&vf, &vn, &mut book, &mut rng), Some(false));

        agents.get_mut(n).unwrap().should_wait = true;
        let vn = agents.view(n).unwrap();
        assert_eq!(resolve_priority(&vn, &vf, &mut book, &mut rng), Some(false));
        assert_eq!(book.decision(f, n), Some(true));
    }

    #[test]
    fn gaining_pair_flips_and_others_inherit() {
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let a = place(&mut w, &mut agents, "a", 40.0, 0.0);
        let b = place(&mut w, &mut agents, "b", 40.0, 0.0);
        let mut book = DecisionBook::new();
        let mut rng = SimRng::new(3);

        let (va, vb) = (agents.view(a).unwrap(), agents.view(b).unwrap());
        assert_eq!(resolve_priority(&va, &vb, &mut book, &mut rng), None);

        agents.get_mut(a).unwrap().state = AgentState::GainingPriority;
        agents.get_mut(b).unwrap().state = AgentState::GainingPriority;
        let (va, vb) = (agents.view(a).unwrap(), agents.view(b).unwrap());
        let d = resolve_priority(&va, &vb, &mut book, &mut rng).unwrap();

        // Back to Auto, the pair keeps the stored decision until forgotten.
        agents.get_mut(a).unwrap().state = AgentState::Auto;
        let va = agents.view(a).unwrap();
        assert_eq!(resolve_priority(&vb, &va, &mut book, &mut rng), Some(!d));
        book.forget(a);
        assert_eq!(resolve_priority(&vb, &va, &mut book, &mut rng), None);
    }

    #[test]
    fn seeded_coin_is_reproducible() {
        let mut w = world();
        let mut agents = AgentRegistry::new();
        let pairs: Vec<_> = (0..16)
            .map(|i| {
                let a = place(&mut w, &mut agents, &format!("p{i}_flaw"), 40.0, 0.0);
                let b = place(&mut w, &mut agents, &format!("q{i}_flaw"), 40.0, 0.0);
                (agents.view(a).unwrap(), agents.view(b).unwrap())
            })
            .collect();
        let run = |seed| {
            let mut book = DecisionBook::new();
            let mut rng = SimRng::new(seed);
            pairs
                .iter()
                .map(|(a, b)| resolve_priority(a, b, &mut book, &mut rng))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(42), run(42));
        assert!(run(42).iter().all(Option::is_some));
    }
}

#[cfg(test)]
mod registry {
    use dim_core::{LaneIdx, VehicleId};

    use crate::{AgentRegistry, BehaviorProfile};

    #[test]
    fn stale_keys_do_not_resolve() {
        let mut agents = AgentRegistry::new();
        let a = agents.spawn(VehicleId::from("a"), BehaviorProfile::Normal, LaneIdx(0), 100.0);
        assert!(agents.contains(a));
        assert_eq!(agents.find_by_vehicle(&"a".into()), Some(a));
        agents.remove(a);
        let b = agents.spawn(VehicleId::from("b"), BehaviorProfile::Normal, LaneIdx(0), 100.0);
        assert!(!agents.contains(a));
        assert!(agents.get(a).is_none());
        assert!(agents.view(b).is_some());
        assert_eq!(agents.len(), 1);
    }

    #[test]
    fn new_agent_starts_far_from_the_line() {
        let mut agents = AgentRegistry::new();
        let k = agents.spawn(VehicleId::from("x_emergency"), BehaviorProfile::Emergency, LaneIdx(2), 80.0);
        let a = agents.get(k).unwrap();
        assert_eq!(a.distance_to_intersection, 80.0);
        assert!(a.is_emergency);
        assert_eq!(a.lane, LaneIdx(2));
    }
}
