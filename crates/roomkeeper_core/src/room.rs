//! Room identifiers and set reconciliation.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Identifier of a live room.
///
/// Room IDs are opaque 64-bit values assigned by the live platform and
/// are the join key between the bridge, the collector and storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl RoomId {
    /// Creates a new room ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RoomId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Parses the canonical decimal form only.
///
/// Signs, whitespace and leading zeros are rejected so that
/// `id.to_string().parse()` is the only spelling that round-trips.
impl FromStr for RoomId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidRoomId {
            input: s.to_string(),
        };

        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if s.len() > 1 && s.starts_with('0') {
            return Err(invalid());
        }

        s.parse::<u64>().map(RoomId).map_err(|_| invalid())
    }
}

/// Set of rooms believed to be tracked.
pub type RoomSet = BTreeSet<RoomId>;

/// Returns the elements of `a` that are not in `b`, in ascending order.
pub fn difference<K: Ord + Clone>(a: &BTreeSet<K>, b: &BTreeSet<K>) -> Vec<K> {
    a.difference(b).cloned().collect()
}

/// Net change between two snapshots of a room set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomDelta {
    /// Rooms present before but not after.
    pub removed: Vec<RoomId>,
    /// Rooms present after but not before.
    pub added: Vec<RoomId>,
}

impl RoomDelta {
    /// Computes the delta that turns `before` into `after`.
    ///
    /// Only the net effect is visible: a room removed and re-added between
    /// the two snapshots appears in neither list.
    #[must_use]
    pub fn between(before: &RoomSet, after: &RoomSet) -> Self {
        Self {
            removed: difference(before, after),
            added: difference(after, before),
        }
    }

    /// Returns true if the two snapshots were equal.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }

    /// Applies the delta to a set in place.
    pub fn apply(&self, set: &mut RoomSet) {
        for id in &self.removed {
            set.remove(id);
        }
        set.extend(self.added.iter().copied());
    }
}
