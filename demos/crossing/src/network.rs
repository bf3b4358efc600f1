//! Four-arm unsignalled crossing.
//!
//! Each arm has one approach lane and one exit lane, 192 m long, offset 1 m
//! either side of the arm's centre line.  Approaches continue straight
//! across: `w_in` → `e_out`, `s_in` → `n_out`, and so on.  The four short
//! `:c_*` lanes inside the box are intersection internals and get no channel.
//! Every lane sits on its own edge, named after the lane.

use dim_core::Point;
use dim_world::{LaneSpec, MemoryWorld};

/// Approach lanes, in the order the demand stream cycles through them.
pub const APPROACHES: [&str; 4] = ["w_in", "s_in", "e_in", "n_in"];

const REACH: f64 = 196.0;
const BOX: f64 = 4.0;

struct Arm {
    approach: &'static str,
    exit:     &'static str,
    /// Approach start and stop line.
    from:     (f64, f64),
    to:       (f64, f64),
    /// Exit start and end.
    out_from: (f64, f64),
    out_to:   (f64, f64),
}

const ARMS: [Arm; 4] = [
    Arm { approach: "w_in", exit: "e_out", from: (-REACH, -1.0), to: (-BOX, -1.0), out_from: (BOX, -1.0), out_to: (REACH, -1.0) },
    Arm { approach: "e_in", exit: "w_out", from: (REACH, 1.0), to: (BOX, 1.0), out_from: (-BOX, 1.0), out_to: (-REACH, 1.0) },
    Arm { approach: "s_in", exit: "n_out", from: (1.0, -REACH), to: (1.0, -BOX), out_from: (1.0, BOX), out_to: (1.0, REACH) },
    Arm { approach: "n_in", exit: "s_out", from: (-1.0, REACH), to: (-1.0, BOX), out_from: (-1.0, -BOX), out_to: (-1.0, -REACH) },
];

fn p((x, y): (f64, f64)) -> Point {
    Point::new(x, y)
}

pub fn build_crossing() -> MemoryWorld {
    let mut w = MemoryWorld::new();
    for (i, arm) in ARMS.iter().enumerate() {
        w.add_lane(
            LaneSpec::new(arm.approach, arm.approach, vec![p(arm.from), p(arm.to)]).with_successor(arm.exit),
        );
        w.add_lane(LaneSpec::new(arm.exit, arm.exit, vec![p(arm.out_from), p(arm.out_to)]));
        let internal = format!(":c_{i}");
        w.add_lane(LaneSpec::new(internal.clone(), internal, vec![p(arm.to), p(arm.out_from)]));
    }
    w
}
