//! The pure room data model (spec §3, §4.2). No actix dependency: every
//! method here is a plain, synchronous mutation of in-memory state, unit
//! testable on its own and reused unchanged by the actix actor in
//! `room::actor`.

use std::sync::Arc;

use serde::Serialize;

use crate::error::RoomError;
use crate::identity::{next_free_id, random_i31, ClientId, ClientIdentity, RoomId};
use crate::outbound::Outbound;

/// A room's lifecycle status (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    Running,
    Closing,
}

/// A currently-connected client: its identity plus the handle the
/// protocol engine uses to reach it.
pub struct ConnectedClient {
    pub identity: ClientIdentity,
    pub outbound: Arc<dyn Outbound>,
}

/// A point-in-time snapshot of a room, for the HTTP admin surface and
/// `RoomManager::summary`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RoomInfo {
    #[serde(rename = "ID")]
    pub id: RoomId,
    #[serde(rename = "Secret")]
    pub secret: i32,
    #[serde(rename = "MaxClients")]
    pub max_clients: i32,
    #[serde(rename = "CurrentClients")]
    pub current_clients: i32,
}

/// The room's membership, host assignment, and lifecycle state
/// (spec §3's `Room` data model).
pub struct RoomState {
    id: RoomId,
    secret: i32,
    max_clients: i32,
    connected: Vec<ConnectedClient>,
    disconnected: Vec<ClientIdentity>,
    host: Option<ClientId>,
    status: RoomStatus,
}

impl RoomState {
    pub fn new(id: RoomId, secret: i32, max_clients: i32) -> Self {
        Self {
            id,
            secret,
            max_clients,
            connected: Vec::new(),
            disconnected: Vec::new(),
            host: None,
            status: RoomStatus::Running,
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn max_clients(&self) -> i32 {
        self.max_clients
    }

    /// Constant-time-in-spirit equality on both fields (spec §4.2).
    pub fn matches(&self, id: RoomId, secret: i32) -> bool {
        self.id == id && self.secret == secret
    }

    /// Assigns a fresh ID and secret to `outbound`, admitting it as a new
    /// client. Fails if the room is at capacity.
    pub fn admit_new(&mut self, outbound: Arc<dyn Outbound>) -> Result<ClientIdentity, RoomError> {
        if self.connected.len() as i32 >= self.max_clients {
            return Err(RoomError::Full(self.id));
        }
        let id = next_free_id(
            self.connected
                .iter()
                .map(|c| &c.identity.id)
                .chain(self.disconnected.iter().map(|c| &c.id)),
        );
        let identity = ClientIdentity {
            id,
            secret: random_i31(),
        };
        self.connected.push(ConnectedClient { identity, outbound });
        Ok(identity)
    }

    /// Rebinds a previously-disconnected identity to a new outbound
    /// handle, authenticating with the given secret. Room-full check
    /// applies first, matching spec §4.2.
    pub fn admit_existing(
        &mut self,
        outbound: Arc<dyn Outbound>,
        id: ClientId,
        secret: i32,
    ) -> Result<ClientIdentity, RoomError> {
        if self.connected.len() as i32 >= self.max_clients {
            return Err(RoomError::Full(self.id));
        }
        let index = self
            .disconnected
            .iter()
            .position(|identity| identity.id == id)
            .ok_or(RoomError::NoSuchClient(id))?;
        if self.disconnected[index].secret != secret {
            return Err(RoomError::InvalidSecret(id));
        }
        let identity = self.disconnected.remove(index);
        self.connected.push(ConnectedClient { identity, outbound });
        Ok(identity)
    }

    /// Moves a connected client's identity to `disconnected`. The
    /// session's outbound handle is not closed here; the caller decides
    /// whether host migration follows (spec §4.2).
    pub fn remove(&mut self, id: ClientId) -> Result<(), RoomError> {
        let index = self
            .connected
            .iter()
            .position(|c| c.identity.id == id)
            .ok_or(RoomError::NoSuchClient(id))?;
        let client = self.connected.remove(index);
        self.disconnected.push(client.identity);
        Ok(())
    }

    pub fn get_client(&self, id: ClientId) -> Option<&ConnectedClient> {
        self.connected.iter().find(|c| c.identity.id == id)
    }

    pub fn is_host(&self, id: ClientId) -> bool {
        self.host == Some(id)
    }

    /// Returns the current host, self-repairing if `host` points at a
    /// client no longer in `connected` (spec §4.2's edge case).
    pub fn get_host(&mut self) -> Option<&ConnectedClient> {
        let Some(host_id) = self.host else {
            return None;
        };
        if self.connected.iter().any(|c| c.identity.id == host_id) {
            self.connected.iter().find(|c| c.identity.id == host_id)
        } else {
            self.host = None;
            None
        }
    }

    /// Sets or clears the host. Setting requires `id` to be currently
    /// connected.
    pub fn set_host(&mut self, id: Option<ClientId>) -> Result<(), RoomError> {
        match id {
            None => {
                self.host = None;
                Ok(())
            }
            Some(id) => {
                if !self.connected.iter().any(|c| c.identity.id == id) {
                    return Err(RoomError::NoSuchClient(id));
                }
                self.host = Some(id);
                Ok(())
            }
        }
    }

    pub fn get_connected(&self) -> &[ConnectedClient] {
        &self.connected
    }

    pub fn status(&self) -> RoomStatus {
        self.status
    }

    pub fn set_status(&mut self, status: RoomStatus) {
        self.status = status;
    }

    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            id: self.id,
            secret: self.secret,
            max_clients: self.max_clients,
            current_clients: self.connected.len() as i32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbound::test_support::RecordingOutbound;

    fn outbound() -> Arc<dyn Outbound> {
        Arc::new(RecordingOutbound::new())
    }

    #[test]
    fn admit_new_assigns_sequential_ids_starting_at_zero() {
        let mut room = RoomState::new(1, 99, 2);
        let a = room.admit_new(outbound()).unwrap();
        let b = room.admit_new(outbound()).unwrap();
        assert_eq!(a.id, 0);
        assert_eq!(b.id, 1);
        assert_ne!(a.secret, b.secret, "secrets should be freshly randomized");
    }

    #[test]
    fn admit_new_fails_when_room_is_full() {
        let mut room = RoomState::new(1, 99, 1);
        room.admit_new(outbound()).unwrap();
        let err = room.admit_new(outbound()).unwrap_err();
        assert!(matches!(err, RoomError::Full(1)));
    }

    #[test]
    fn admit_new_then_remove_then_admit_existing_restores_binding() {
        let mut room = RoomState::new(1, 99, 2);
        let identity = room.admit_new(outbound()).unwrap();
        room.remove(identity.id).unwrap();
        assert!(room.get_client(identity.id).is_none());

        let rebound = room
            .admit_existing(outbound(), identity.id, identity.secret)
            .unwrap();
        assert_eq!(rebound, identity);
        assert!(room.get_client(identity.id).is_some());
    }

    #[test]
    fn admit_existing_rejects_wrong_secret() {
        let mut room = RoomState::new(1, 99, 2);
        let identity = room.admit_new(outbound()).unwrap();
        room.remove(identity.id).unwrap();

        let err = room
            .admit_existing(outbound(), identity.id, identity.secret + 1)
            .unwrap_err();
        assert!(matches!(err, RoomError::InvalidSecret(id) if id == identity.id));
    }

    #[test]
    fn admit_existing_rejects_unknown_client() {
        let mut room = RoomState::new(1, 99, 2);
        let err = room.admit_existing(outbound(), 42, 0).unwrap_err();
        assert!(matches!(err, RoomError::NoSuchClient(42)));
    }

    #[test]
    fn ids_are_never_reused_across_connected_and_disconnected() {
        let mut room = RoomState::new(1, 99, 3);
        let a = room.admit_new(outbound()).unwrap();
        let b = room.admit_new(outbound()).unwrap();
        room.remove(a.id).unwrap();
        let c = room.admit_new(outbound()).unwrap();
        assert_ne!(c.id, a.id);
        assert_ne!(c.id, b.id);
    }

    #[test]
    fn get_host_self_repairs_when_host_is_no_longer_connected() {
        let mut room = RoomState::new(1, 99, 2);
        let host = room.admit_new(outbound()).unwrap();
        room.set_host(Some(host.id)).unwrap();
        room.remove(host.id).unwrap();

        assert!(room.get_host().is_none());
        assert!(!room.is_host(host.id));
    }

    #[test]
    fn set_host_rejects_a_non_connected_id() {
        let mut room = RoomState::new(1, 99, 2);
        let err = room.set_host(Some(42)).unwrap_err();
        assert!(matches!(err, RoomError::NoSuchClient(42)));
    }

    #[test]
    fn info_reports_current_client_count() {
        let mut room = RoomState::new(5, 1, 4);
        room.admit_new(outbound()).unwrap();
        room.admit_new(outbound()).unwrap();
        let info = room.info();
        assert_eq!(info.id, 5);
        assert_eq!(info.max_clients, 4);
        assert_eq!(info.current_clients, 2);
    }
}
