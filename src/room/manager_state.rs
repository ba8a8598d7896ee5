//! The pure room-manager bookkeeping (spec §3, §4.3): committed-capacity
//! accounting and room-ID allocation. No actix dependency, so the
//! committed-capacity invariant is directly unit-testable; the actix
//! actor in `room::manager` owns one of these plus the `RoomId ->
//! Addr<Room>` map actix requires.

use ahash::HashMap;
use serde::Serialize;

use crate::error::ManagerError;
use crate::identity::{random_i31, RoomId};

/// What the manager remembers about a room without needing to ask the
/// room's own actor: its secret (for the `Connect`/`Reconnect` linear
/// scan) and its committed `max_clients` (fixed at creation, so the
/// committed-capacity sum can be recomputed without a round trip).
#[derive(Debug, Clone, Copy)]
pub struct RoomRecord {
    pub secret: i32,
    pub max_clients: i32,
}

/// A summary of the committed-capacity accounting (spec §4.3).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RoomsSummary {
    #[serde(rename = "NumberOfRooms")]
    pub number_of_rooms: i32,
    #[serde(rename = "MaxClients")]
    pub max_clients: i32,
    #[serde(rename = "CurrentClients")]
    pub current_clients: i32,
    #[serde(rename = "CommittedClients")]
    pub committed_clients: i32,
}

/// Server-wide committed-capacity bookkeeping plus the `RoomId ->
/// RoomRecord` map.
pub struct ManagerState {
    max_clients: i32,
    commit_rounding: i32,
    rooms: HashMap<RoomId, RoomRecord>,
}

impl ManagerState {
    pub fn new(max_clients: i32, commit_rounding: i32) -> Self {
        Self {
            max_clients,
            commit_rounding,
            rooms: ahash::HashMap::default(),
        }
    }

    /// Committed capacity for a single room: `max_clients` rounded up to
    /// the nearest multiple of `commit_rounding` (spec §3).
    fn committed(&self, max_clients: i32) -> i32 {
        let rounding = self.commit_rounding.max(1);
        ((max_clients + rounding - 1) / rounding) * rounding
    }

    fn committed_total(&self) -> i32 {
        self.rooms.values().map(|r| self.committed(r.max_clients)).sum()
    }

    /// Reserves committed capacity and a fresh room ID for a new room of
    /// `max_clients` capacity, or fails per spec §4.3.
    pub fn reserve(&mut self, max_clients: i32) -> Result<(RoomId, i32), ManagerError> {
        if max_clients <= 0 {
            return Err(ManagerError::MaxClientsTooSmall(max_clients));
        }

        let committed_after = self.committed_total() + self.committed(max_clients);
        if committed_after > self.max_clients {
            return Err(ManagerError::TooManyCommittedClients(
                committed_after,
                self.max_clients,
            ));
        }

        let mut id = random_i31();
        while self.rooms.contains_key(&id) {
            id = random_i31();
        }
        let secret = random_i31();
        self.rooms.insert(
            id,
            RoomRecord {
                secret,
                max_clients,
            },
        );
        Ok((id, secret))
    }

    pub fn remove(&mut self, id: RoomId) {
        self.rooms.remove(&id);
    }

    /// All rooms whose cached `{id, secret}` match, in insertion-order-
    /// agnostic iteration (the spec only requires "the first match" of
    /// some scan order, not a stable one).
    pub fn find_matching(&self, id: RoomId, secret: i32) -> Option<RoomId> {
        self.rooms.iter().find_map(|(room_id, record)| {
            (*room_id == id && record.secret == secret).then_some(*room_id)
        })
    }

    /// Summary of committed/rooms, not including per-room live occupancy
    /// (the caller supplies `current_clients`, which requires asking
    /// each room actor; see `room::manager`).
    pub fn summary(&self, current_clients: i32) -> RoomsSummary {
        RoomsSummary {
            number_of_rooms: self.rooms.len() as i32,
            max_clients: self.max_clients,
            current_clients,
            committed_clients: self.committed_total(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_rejects_non_positive_max_clients() {
        let mut manager = ManagerState::new(100, 5);
        let err = manager.reserve(0).unwrap_err();
        assert!(matches!(err, ManagerError::MaxClientsTooSmall(0)));
    }

    #[test]
    fn committed_capacity_rounds_up_to_the_nearest_multiple() {
        // Server cap 10, rounding 5: rooms of max-clients 3 and 3 commit
        // 5 + 5 = 10; a third room of max-clients 1 should then be
        // rejected (spec §8 scenario 6).
        let mut manager = ManagerState::new(10, 5);
        manager.reserve(3).unwrap();
        manager.reserve(3).unwrap();
        let err = manager.reserve(1).unwrap_err();
        assert!(matches!(err, ManagerError::TooManyCommittedClients(15, 10)));
    }

    #[test]
    fn committed_capacity_never_exceeds_the_configured_cap() {
        let mut manager = ManagerState::new(10, 5);
        assert!(manager.reserve(5).is_ok());
        assert!(manager.reserve(5).is_ok());
        assert!(manager.reserve(1).is_err());
    }

    #[test]
    fn room_ids_are_unique() {
        let mut manager = ManagerState::new(1000, 5);
        let mut ids = std::collections::HashSet::new();
        for _ in 0..20 {
            let (id, _) = manager.reserve(1).unwrap();
            assert!(ids.insert(id), "room IDs must not collide");
        }
    }

    #[test]
    fn find_matching_requires_both_id_and_secret() {
        let mut manager = ManagerState::new(100, 5);
        let (id, secret) = manager.reserve(2).unwrap();
        assert_eq!(manager.find_matching(id, secret), Some(id));
        assert_eq!(manager.find_matching(id, secret + 1), None);
    }
}
