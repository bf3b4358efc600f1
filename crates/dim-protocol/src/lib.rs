//! `dim-protocol`: the negotiation message set.
//!
//! Every exchange is a synchronous request/response pair completed inside the
//! initiating leader's step; there is no connection state to model.
//!
//! | Request                    | Responses                                      |
//! |----------------------------|------------------------------------------------|
//! | `RequestFollower { .. }`   | `ResponseFollower { detected_count }`          |
//! | `RequestEmergency`         | `ResponseEmergency` / `ResponseNotEmergency`   |
//! | `RequestOppositeLeader`    | `ResponseOppositeLeader(LeaderReport)`         |
//! | `RequestNextLastFollower`  | `ResponseNextLastFollower { .. }`              |
//! | `PriorityRequired`         | `Yielding` / `YieldingNotPossible`             |

pub mod codec;
pub mod error;
pub mod message;


pub use codec::{decode, encode};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{Body, LeaderReport, Message};
