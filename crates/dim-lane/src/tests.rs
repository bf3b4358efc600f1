//! Unit tests for dim-lane.

#[cfg(test)]
mod fixtures {
    use dim_core::{Point, SimTime, Tick};
    use dim_world::{LaneSpec, MemoryWorld};

    /// Four-arm crossing centred on the origin, with one short internal lane.
    ///
    /// Stepping order (sorted ids): e_out, n_out, s_in, w_in.
    pub fn crossing() -> MemoryWorld {
        let mut w = MemoryWorld::new();
        w.add_lane(
            LaneSpec::new("w_in", "w", vec![Point::new(-196.0, -1.0), Point::new(-4.0, -1.0)])
                .with_successor("e_out"),
        );
        w.add_lane(
            LaneSpec::new("s_in", "s", vec![Point::new(1.0, -196.0), Point::new(1.0, -4.0)])
                .with_successor("n_out"),
        );
        w.add_lane(LaneSpec::new("e_out", "e", vec![Point::new(4.0, -1.0), Point::new(196.0, -1.0)]));
        w.add_lane(LaneSpec::new("n_out", "n", vec![Point::new(1.0, 4.0), Point::new(1.0, 196.0)]));
        w.add_lane(LaneSpec::new(":c_0", ":c", vec![Point::new(-4.0, -1.0), Point::new(4.0, -1.0)]));
        w
    }

    pub fn at(tick: u64) -> SimTime {
        SimTime::new(Tick(tick), tick as f64)
    }
}

#[cfg(test)]
mod topology {
    use dim_core::{EdgeId, LaneId, LaneIdx, Point, ProtocolConfig, VehicleId};
    use dim_world::WorldState;

    use super::fixtures::*;
    use crate::{LaneError, LaneNetwork};

    #[test]
    fn internal_lanes_get_no_channel() {
        let net = LaneNetwork::from_world(&crossing(), &ProtocolConfig::default()).unwrap();
        assert_eq!(net.len(), 4);
        assert_eq!(net.index_of(&LaneId::from(":c_0")), None);
        let order: Vec<&str> = net.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(order, ["e_out", "n_out", "s_in", "w_in"]);
    }

    #[test]
    fn successors_resolve_to_channels() {
        let net = LaneNetwork::from_world(&crossing(), &ProtocolConfig::default()).unwrap();
        let w_in = net.index_of(&"w_in".into()).unwrap();
        let e_out = net.index_of(&"e_out".into()).unwrap();
        assert_eq!(net.get(w_in).unwrap().successor, Some(e_out));
        assert_eq!(net.get(e_out).unwrap().successor, None);
        assert_eq!(net.get(w_in).unwrap().length, 192.0);
    }

    #[test]
    fn lanes_meeting_at_the_crossing_are_adjacent() {
        let net = LaneNetwork::from_world(&crossing(), &ProtocolConfig::default()).unwrap();
        let w_in = net.get(net.index_of(&"w_in".into()).unwrap()).unwrap();
        // Start point is far from everything.
        assert!(w_in.adjacent_at(0).is_empty());
        assert_eq!(w_in.adjacent_at(1), [LaneIdx(0), LaneIdx(1), LaneIdx(2)]);
        assert_eq!(w_in.adjacent_near(Point::new(-30.0, -1.0)), w_in.adjacent_at(1));
        assert!(w_in.adjacent_at(7).is_empty());
    }

    #[test]
    fn adjacency_threshold_is_strict() {
        let cfg = ProtocolConfig { adjacency_distance: 8.0, ..ProtocolConfig::default() };
        let net = LaneNetwork::from_world(&crossing(), &cfg).unwrap();
        let w_in = net.get(net.index_of(&"w_in".into()).unwrap()).unwrap();
        // e_out starts exactly 8 m away, n_out ~7.07 m, s_in ~5.83 m.
        assert_eq!(w_in.adjacent_at(1), [LaneIdx(1), LaneIdx(2)]);
    }

    /// A world whose single lane has broken topology.
    struct Broken {
        geometry: Option<Vec<Point>>,
        edge:     Option<EdgeId>,
    }

    impl WorldState for Broken {
        fn position(&self, _: &VehicleId) -> Option<Point> { None }
        fn speed(&self, _: &VehicleId) -> Option<f64> { None }
        fn max_deceleration(&self, _: &VehicleId) -> Option<f64> { None }
        fn lane_position(&self, _: &VehicleId) -> Option<f64> { None }
        fn request_stop(&mut self, v: &VehicleId, _: &EdgeId, _: f64) -> dim_world::WorldResult<()> {
            Err(dim_world::WorldError::Departed(v.clone()))
        }
        fn request_stop_duration(&mut self, v: &VehicleId, _: &EdgeId, _: f64, _: f64) -> dim_world::WorldResult<()> {
            Err(dim_world::WorldError::Departed(v.clone()))
        }
        fn resume(&mut self, v: &VehicleId) -> dim_world::WorldResult<()> {
            Err(dim_world::WorldError::Departed(v.clone()))
        }
        fn lane_ids(&self) -> Vec<LaneId> { vec!["x".into()] }
        fn lane_length(&self, _: &LaneId) -> Option<f64> { Some(100.0) }
        fn lane_geometry(&self, _: &LaneId) -> Option<Vec<Point>> { self.geometry.clone() }
        fn lane_edge_id(&self, _: &LaneId) -> Option<EdgeId> { self.edge.clone() }
        fn lane_member_ids(&self, _: &LaneId) -> Vec<VehicleId> { Vec::new() }
    }

    #[test]
    fn broken_topology_is_rejected() {
        let cfg = ProtocolConfig::default();
        let line = vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0)];

        let world = Broken { geometry: Some(vec![Point::new(0.0, 0.0)]), edge: Some("e".into()) };
        assert_eq!(LaneNetwork::from_world(&world, &cfg).err(), Some(LaneError::MissingGeometry("x".into())));

        let world = Broken { geometry: Some(line), edge: None };
        assert_eq!(LaneNetwork::from_world(&world, &cfg).err(), Some(LaneError::MissingEdge("x".into())));
    }
}

#[cfg(test)]
mod membership {
    use dim_agent::{AgentRegistry, BehaviorProfile};
    use dim_core::{Point, ProtocolConfig, VehicleId};
    use dim_world::{MemoryWorld, VehicleSpec};

    use super::fixtures::*;
    use crate::{LaneChannel, LaneNetwork};

    fn w_in(net: &mut LaneNetwork) -> &mut LaneChannel {
        let idx = net.index_of(&"w_in".into()).unwrap();
        net.get_mut(idx).unwrap()
    }

    fn setup() -> (MemoryWorld, LaneNetwork, AgentRegistry) {
        let mut world = crossing();
        world.add_vehicle(VehicleSpec::new("back", "w_in", 100.0)).unwrap();
        world.add_vehicle(VehicleSpec::new("front_dec", "w_in", 150.0)).unwrap();
        let net = LaneNetwork::from_world(&world, &ProtocolConfig::default()).unwrap();
        (world, net, AgentRegistry::new())
    }

    fn id(agents: &AgentRegistry, key: dim_core::AgentKey) -> &str {
        agents.get(key).unwrap().id.as_str()
    }

    #[test]
    fn arrivals_are_queued_front_first() {
        let (world, mut net, mut agents) = setup();
        let lane = w_in(&mut net);
        let delta = lane.sync_membership(&world, &mut agents, at(0));
        assert_eq!(delta.entered.len(), 2);
        assert!(delta.departed.is_empty());

        let leader = lane.leader().unwrap();
        assert_eq!(id(&agents, leader), "front_dec");
        assert_eq!(agents.get(leader).unwrap().profile, BehaviorProfile::Deceiving);
        assert_eq!(agents.get(leader).unwrap().distance_to_intersection, 42.0);
        assert_eq!(id(&agents, lane.tail().unwrap()), "back");
        assert_eq!(lane.next_upstream(leader), lane.tail());
        assert_eq!(lane.next_upstream(lane.tail().unwrap()), None);
    }

    #[test]
    fn departures_destroy_agents() {
        let (mut world, mut net, mut agents) = setup();
        let lane = w_in(&mut net);
        lane.sync_membership(&world, &mut agents, at(0));
        let old_leader = lane.leader().unwrap();

        world.remove_vehicle(&VehicleId::from("front_dec"));
        world.add_vehicle(VehicleSpec::new("late", "w_in", 20.0)).unwrap();
        let delta = lane.sync_membership(&world, &mut agents, at(1));

        assert_eq!(delta.departed, vec![(old_leader, VehicleId::from("front_dec"))]);
        assert_eq!(delta.entered.len(), 1);
        assert!(!agents.contains(old_leader));
        assert_eq!(agents.len(), 2);
        assert_eq!(id(&agents, lane.leader().unwrap()), "back");
        assert_eq!(id(&agents, lane.tail().unwrap()), "late");
    }

    #[test]
    fn unchanged_lane_has_empty_delta() {
        let (world, mut net, mut agents) = setup();
        let lane = w_in(&mut net);
        lane.sync_membership(&world, &mut agents, at(0));
        assert!(lane.sync_membership(&world, &mut agents, at(1)).is_empty());
        assert_eq!(lane.queue().len(), 2);
    }

    #[test]
    fn refresh_once_per_tick() {
        let (mut world, mut net, mut agents) = setup();
        let lane = w_in(&mut net);
        lane.sync_membership(&world, &mut agents, at(0));
        let leader = lane.leader().unwrap();

        world.set_speed(&"front_dec".into(), 6.0).unwrap();
        lane.refresh_members(&world, &mut agents, at(0));
        assert_eq!(agents.get(leader).unwrap().speed, 0.0);
        lane.refresh_members(&world, &mut agents, at(1));
        assert_eq!(agents.get(leader).unwrap().speed, 6.0);
    }

    #[test]
    fn members_within_radius_in_queue_order() {
        let (mut world, mut net, mut agents) = setup();
        world.add_vehicle(VehicleSpec::new("far", "w_in", 10.0)).unwrap();
        let lane = w_in(&mut net);
        lane.sync_membership(&world, &mut agents, at(0));
        let leader = lane.leader().unwrap();
        let origin = agents.get(leader).unwrap().position;
        assert_eq!(origin, Point::new(-46.0, -1.0));

        let near = lane.members_within(&agents, origin, 60.0, leader);
        let names: Vec<&str> = near.iter().map(|k| id(&agents, *k)).collect();
        assert_eq!(names, ["back"]);
        assert_eq!(lane.members_within(&agents, origin, 200.0, leader).len(), 2);
    }

    #[test]
    fn stale_boundary_counts_as_cleared() {
        let (mut world, mut net, mut agents) = setup();
        let lane = w_in(&mut net);
        lane.sync_membership(&world, &mut agents, at(0));
        assert!(lane.boundary_cleared(&agents));

        let back = lane.tail().unwrap();
        lane.last_convoy_boundary = Some(back);
        assert!(!lane.boundary_cleared(&agents));
        assert_eq!(lane.last_convoy_boundary, Some(back));

        world.remove_vehicle(&VehicleId::from("back"));
        lane.sync_membership(&world, &mut agents, at(1));
        // Slot reuse must not resurrect the old boundary.
        world.add_vehicle(VehicleSpec::new("new", "w_in", 5.0)).unwrap();
        lane.sync_membership(&world, &mut agents, at(2));
        assert!(lane.boundary_cleared(&agents));
        assert_eq!(lane.last_convoy_boundary, None);
    }

    #[test]
    fn stop_site_uses_lane_edge() {
        let (_, mut net, _) = setup();
        let lane = w_in(&mut net);
        let site = lane.stop_site();
        assert_eq!(site.edge.as_str(), "w");
        assert_eq!(site.stop_position(1.0), 191.0);
    }
}
