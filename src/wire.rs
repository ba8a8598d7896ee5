//! Wire contracts (spec §6): the `Flag` enum and request/response body
//! shapes the protocol engine exchanges with the (out-of-scope) framing
//! collaborator. Field numbering in the table below is preserved
//! bit-for-bit against the original protobuf schema; see `DESIGN.md` for
//! why this crate encodes bodies with `serde_json` rather than a
//! protobuf codec.

use serde::{Deserialize, Serialize};

use crate::identity::{ClientId, RoomId};

/// The closed set of wire flags, numbered exactly as spec §6 lists them.
///
/// Serializes as its numeric discriminant (not the variant name) so the
/// `flag` field on the wire matches the original protobuf enum's field
/// numbering bit-for-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
#[repr(i32)]
pub enum Flag {
    RequestRelayMessage = 0,
    RequestConnect = 1,
    RequestReconnect = 2,
    RequestList = 3,
    RequestKick = 4,
    RequestGrantHost = 5,
    ResponseRelayMessage = 6,
    ResponseConnect = 7,
    ResponseAssignHost = 8,
    ResponseBeginHostMigrate = 9,
    ResponseFinishHostMigrate = 10,
    ResponseList = 11,
    ResponseKick = 12,
    ResponseError = 13,
    ResponseClientConnect = 14,
}

impl From<Flag> for i32 {
    fn from(flag: Flag) -> i32 {
        flag as i32
    }
}

impl TryFrom<i32> for Flag {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Flag::RequestRelayMessage),
            1 => Ok(Flag::RequestConnect),
            2 => Ok(Flag::RequestReconnect),
            3 => Ok(Flag::RequestList),
            4 => Ok(Flag::RequestKick),
            5 => Ok(Flag::RequestGrantHost),
            6 => Ok(Flag::ResponseRelayMessage),
            7 => Ok(Flag::ResponseConnect),
            8 => Ok(Flag::ResponseAssignHost),
            9 => Ok(Flag::ResponseBeginHostMigrate),
            10 => Ok(Flag::ResponseFinishHostMigrate),
            11 => Ok(Flag::ResponseList),
            12 => Ok(Flag::ResponseKick),
            13 => Ok(Flag::ResponseError),
            14 => Ok(Flag::ResponseClientConnect),
            other => Err(format!("unknown wire flag {other}")),
        }
    }
}

/// The length-delimited envelope: a flag plus an opaque, flag-dependent
/// body. `data` is empty for flags with no body (e.g.
/// `ResponseBeginHostMigrate`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload {
    pub flag: Flag,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<u8>,
}

impl Payload {
    pub fn empty(flag: Flag) -> Self {
        Payload {
            flag,
            data: Vec::new(),
        }
    }

    /// Wraps an already-opaque byte string directly, with no further
    /// encoding. Used for relay forwarding, where the body is the
    /// sender's own opaque data and must reach the recipient unchanged
    /// (mirrors the original's direct `networkMessage.Data = ...`
    /// assignment rather than a marshal step).
    pub fn raw(flag: Flag, data: Vec<u8>) -> Self {
        Payload { flag, data }
    }

    /// Encodes a typed body into a `Payload` for the given flag. Encode
    /// failures are treated as unreachable given strict schema control
    /// (spec §7) and panic, matching the original's own `panic(err)` on
    /// marshal failure.
    pub fn with_body(flag: Flag, body: &impl Serialize) -> Self {
        let data = serde_json::to_vec(body).expect("failed to encode outgoing wire body");
        Payload { flag, data }
    }

    /// Decodes the envelope's body as `T`. This is the one fallible,
    /// client-controlled decode path (spec §7: malformed bodies are
    /// client-caused errors, not panics).
    pub fn decode<'a, T: Deserialize<'a>>(&'a self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.data)
    }
}

/// `{ID, Secret}` — the body of `RESPONSE_CONNECT`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Client {
    #[serde(rename = "ID")]
    pub id: ClientId,
    #[serde(rename = "Secret")]
    pub secret: i32,
}

/// An outward-facing client descriptor carrying only `{ID, Host-flag}`,
/// never the secret.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SanitisedClient {
    #[serde(rename = "ID")]
    pub id: ClientId,
    #[serde(rename = "Host")]
    pub host: bool,
}

/// Body of `RESPONSE_LIST`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientList {
    #[serde(rename = "List")]
    pub list: Vec<SanitisedClient>,
}

/// Body of `REQUEST_CONNECT`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct JoinRoomRequest {
    #[serde(rename = "RoomID")]
    pub room_id: RoomId,
    #[serde(rename = "RoomSecret")]
    pub room_secret: i32,
}

/// Body of `REQUEST_RECONNECT`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RejoinRoomRequest {
    #[serde(rename = "RoomID")]
    pub room_id: RoomId,
    #[serde(rename = "RoomSecret")]
    pub room_secret: i32,
    #[serde(rename = "ClientID")]
    pub client_id: ClientId,
    #[serde(rename = "ClientSecret")]
    pub client_secret: i32,
}

/// Body of `REQUEST_KICK`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KickRequest {
    #[serde(rename = "ClientID")]
    pub client_id: ClientId,
}

/// Body of `RESPONSE_KICK`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KickResponse {
    #[serde(rename = "ClientID")]
    pub client_id: ClientId,
}

/// Body of `REQUEST_GRANT_HOST`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GrantHostRequest {
    #[serde(rename = "HostID")]
    pub host_id: ClientId,
}

/// Body of the assign-host frame sent to the new host during migration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FinishHostMigrationResponse {
    #[serde(rename = "HostID")]
    pub host_id: ClientId,
}

/// The three relay message kinds a connected client may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
#[repr(i32)]
pub enum RelayType {
    Broadcast = 0,
    Target = 1,
    Host = 2,
}

impl From<RelayType> for i32 {
    fn from(kind: RelayType) -> i32 {
        kind as i32
    }
}

impl TryFrom<i32> for RelayType {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RelayType::Broadcast),
            1 => Ok(RelayType::Target),
            2 => Ok(RelayType::Host),
            other => Err(format!("unknown relay type {other}")),
        }
    }
}

/// Body of `REQUEST_RELAY_MESSAGE`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relay {
    #[serde(rename = "Type")]
    pub kind: RelayType,
    #[serde(rename = "Target", default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ClientId>,
    #[serde(rename = "Data")]
    pub data: Vec<u8>,
}

/// Body of `RESPONSE_ERROR`: `{Code, Message}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(rename = "Code")]
    pub code: i32,
    #[serde(rename = "Message")]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trips_a_typed_body() {
        let body = JoinRoomRequest {
            room_id: 7,
            room_secret: 42,
        };
        let payload = Payload::with_body(Flag::RequestConnect, &body);
        let decoded: JoinRoomRequest = payload.decode().unwrap();
        assert_eq!(decoded.room_id, 7);
        assert_eq!(decoded.room_secret, 42);
    }

    #[test]
    fn empty_payload_has_no_body_bytes() {
        let payload = Payload::empty(Flag::ResponseBeginHostMigrate);
        assert!(payload.data.is_empty());
    }
}
