//! Identifier types.
//!
//! Two families live here:
//!
//! - **Index ids** (`LaneIdx`) are `Copy + Ord + Hash` wrappers around a
//!   primitive integer, used to index the lane `Vec` directly.
//! - **Name ids** (`VehicleId`, `LaneId`, `EdgeId`) wrap the string names the
//!   external world uses.  `VehicleId` ordering is lexicographic and doubles
//!   as the deterministic tie-break key.
//!
//! Agents themselves are addressed by [`AgentKey`], a generational slot-map
//! handle: a key whose agent has been removed no longer resolves, so stale
//! back-references are detected instead of dereferenced.

use std::fmt;

use serde::{Deserialize, Serialize};

slotmap::new_key_type! {
    /// Generational handle of an agent in the agent registry.
    pub struct AgentKey;
}

/// Generate a typed ID wrapper around a primitive integer.
macro_rules! typed_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident($inner:ty);) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
        $vis struct $name(pub $inner);

        impl $name {
            /// Cast to `usize` for direct use as a `Vec` index.
            #[inline(always)]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl TryFrom<usize> for $name {
            type Error = std::num::TryFromIntError;
            fn try_from(n: usize) -> Result<$name, Self::Error> {
                <$inner>::try_from(n).map($name)
            }
        }
    };
}

/// Generate a string-backed name wrapper.
macro_rules! name_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident;) => {
        $(#[$attr])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        $vis struct $name(pub String);

        impl $name {
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

typed_id! {
    /// Position of a lane channel in the simulation's lane list.  Lanes are
    /// stepped in ascending `LaneIdx` order every tick.
    pub struct LaneIdx(u32);
}

name_id! {
    /// External vehicle name.  Totally ordered; used for tie-breaks.
    pub struct VehicleId;
}

name_id! {
    /// External lane name.
    pub struct LaneId;
}

name_id! {
    /// External edge (road segment) name; stop requests are addressed by edge.
    pub struct EdgeId;
}
