//! Client and room identity types shared across the room engine.

use serde::{Deserialize, Serialize};

/// A client ID, unique within a room for the room's lifetime.
pub type ClientId = i32;

/// A room ID, unique across the server for the room's lifetime.
pub type RoomId = i32;

/// `{ID, Secret}` pair identifying a client within a room.
///
/// The secret is random and known only to the client and the room; it
/// authenticates rejoin after a disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub id: ClientId,
    pub secret: i32,
}

/// Draws a fresh, non-negative 31-bit value (room IDs, room secrets,
/// and client secrets all come from this range).
pub fn random_i31() -> i32 {
    fastrand::i32(0..i32::MAX)
}

/// The smallest ID not already used by `existing`, starting from 0.
///
/// Mirrors the original's ID-assignment loop: the new ID is one greater
/// than the maximum ID already in use, or 0 if nothing is in use yet.
pub fn next_free_id<'a>(existing: impl Iterator<Item = &'a ClientId>) -> ClientId {
    existing.copied().map(|id| id + 1).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_free_id_starts_at_zero() {
        assert_eq!(next_free_id([].iter()), 0);
    }

    #[test]
    fn next_free_id_is_one_past_the_max() {
        let ids = [0, 3, 1];
        assert_eq!(next_free_id(ids.iter()), 4);
    }
}
