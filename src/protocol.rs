//! The protocol engine (spec §4.4): free functions that mutate a single
//! `RoomState` and fan frames out over each connected client's
//! `Outbound` handle. Each function here is called from inside a `Room`
//! actix `Handler`, which supplies the per-room mailbox exclusivity the
//! fan-out atomicity in spec §5 requires; none of these functions touch
//! actix directly, so they're unit-testable against a bare `RoomState`.

use std::sync::Arc;

use crate::error::{internal_error, RoomError};
use crate::identity::{ClientId, RoomId};
use crate::outbound::Outbound;
use crate::room::state::{RoomState, RoomStatus};
use crate::wire::{
    ApiError, Client, ClientList, FinishHostMigrationResponse, Flag, GrantHostRequest,
    JoinRoomRequest, KickRequest, KickResponse, Payload, RejoinRoomRequest, Relay, RelayType,
    SanitisedClient,
};

fn fail(outbound: &dyn Outbound, code: i32, message: impl Into<String>) {
    outbound.enqueue(Payload::with_body(
        Flag::ResponseError,
        &ApiError {
            code,
            message: message.into(),
        },
    ));
}

/// Client-visible precondition failure for an action that requires an
/// already-admitted client, matching the original's per-action "Must be
/// connected to a room to ..." messages.
pub fn not_connected(outbound: &dyn Outbound, action: &str) {
    fail(outbound, 400, format!("Must be connected to a room to {action}"));
}

/// No room in the manager's linear scan matched the given ID/secret
/// pair (spec §4.4's Connect/Reconnect miss path).
pub fn room_not_found(outbound: &dyn Outbound, room_id: RoomId) {
    fail(outbound, 400, format!("No valid room match found for ID {room_id}"));
}

/// A decoded request body failed to conform to its schema.
pub fn invalid_request(outbound: &dyn Outbound, context: &str, err: impl std::fmt::Display) {
    fail(outbound, 400, format!("{context}, does not conform to spec, {err}"));
}

fn fail_internal(outbound: &dyn Outbound, context: &str) {
    let err = internal_error(context);
    outbound.enqueue(Payload::with_body(Flag::ResponseError, &err));
}

fn fail_room_error(outbound: &dyn Outbound, err: RoomError) {
    let api_err: ApiError = (&err).into();
    outbound.enqueue(Payload::with_body(Flag::ResponseError, &api_err));
}

/// Handles `REQUEST_CONNECT` against a room already matched by the
/// manager's linear scan. `already_connected` mirrors the engine-level
/// precondition that the session must not already be bound to a room
/// (spec §4.4); the caller (the session actor) is the one who knows
/// that, since `RoomState` has no notion of "current room" for a
/// session that isn't admitted yet.
pub fn connect(
    room: &mut RoomState,
    outbound: Arc<dyn Outbound>,
    request: JoinRoomRequest,
) -> Option<ClientId> {
    debug_assert!(room.matches(request.room_id, request.room_secret));
    match room.admit_new(outbound.clone()) {
        Ok(identity) => {
            outbound.enqueue(Payload::with_body(
                Flag::ResponseConnect,
                &Client {
                    id: identity.id,
                    secret: identity.secret,
                },
            ));
            set_host_if_none(room, identity.id);
            notify_host_of_newcomer(room, identity.id);
            Some(identity.id)
        }
        Err(err) => {
            fail_room_error(&*outbound, err);
            None
        }
    }
}

/// Handles `REQUEST_RECONNECT` against a room already matched by the
/// manager. See `connect` for the division of responsibility with the
/// caller.
pub fn reconnect(
    room: &mut RoomState,
    outbound: Arc<dyn Outbound>,
    request: RejoinRoomRequest,
) -> Option<ClientId> {
    debug_assert!(room.matches(request.room_id, request.room_secret));
    match room.admit_existing(outbound.clone(), request.client_id, request.client_secret) {
        Ok(identity) => {
            outbound.enqueue(Payload::with_body(
                Flag::ResponseConnect,
                &Client {
                    id: identity.id,
                    secret: identity.secret,
                },
            ));
            set_host_if_none(room, identity.id);
            notify_host_of_newcomer(room, identity.id);
            Some(identity.id)
        }
        Err(err) => {
            fail_room_error(&*outbound, err);
            None
        }
    }
}

/// Handles a disconnecting client (spec §4.4's Disconnect): moves the
/// identity to `disconnected` and migrates the host if the leaver held
/// it. No-op beyond the state move if the room is already `Closing`
/// (§4.4: "the per-disconnect path short-circuits").
pub fn disconnect(room: &mut RoomState, id: ClientId) {
    if room.status() == RoomStatus::Closing {
        return;
    }
    let was_host = room.is_host(id);
    if let Err(err) = room.remove(id) {
        log::error!("failed to disconnect client with ID {id}, {err}");
        return;
    }
    if was_host {
        if let Err(err) = migrate_host(room) {
            log::error!("failed to migrate host after disconnect, {err}");
        }
    }
}

/// Handles `REQUEST_RELAY_MESSAGE` (spec §4.4's Relay).
pub fn relay(room: &mut RoomState, sender_id: ClientId, request: Relay) {
    let is_host = room.is_host(sender_id);
    let Some(sender) = room.get_client(sender_id) else {
        return;
    };
    let sender_outbound = sender.outbound.clone();

    match request.kind {
        RelayType::Broadcast => {
            if !is_host {
                fail(&*sender_outbound, 400, "Must be host to broadcast");
                return;
            }
            for client in room.get_connected() {
                if client.identity.id == sender_id {
                    continue;
                }
                client.outbound.enqueue(Payload::raw(Flag::ResponseRelayMessage, request.data.clone()));
            }
        }
        RelayType::Target => {
            if !is_host {
                fail(&*sender_outbound, 400, "Must be host to send targeted messages");
                return;
            }
            let Some(target) = request.target else {
                fail(&*sender_outbound, 400, "Must provide a target ID to send a message to");
                return;
            };
            match room.get_client(target) {
                Some(client) => {
                    client
                        .outbound
                        .enqueue(Payload::raw(Flag::ResponseRelayMessage, request.data.clone()));
                }
                None => fail(
                    &*sender_outbound,
                    400,
                    format!("No target client found with ID {target}"),
                ),
            }
        }
        RelayType::Host => {
            if is_host {
                fail(&*sender_outbound, 400, "Hosts cannot send messages to themselves");
                return;
            }
            match room.get_host() {
                Some(host) => {
                    host.outbound
                        .enqueue(Payload::raw(Flag::ResponseRelayMessage, request.data.clone()));
                }
                None => fail_internal(&*sender_outbound, "relay to host requested but no host is set"),
            }
        }
    }
}

/// Handles `REQUEST_GRANT_HOST` (spec §4.4): runs the full migration
/// protocol even though no one has disconnected.
pub fn grant_host(room: &mut RoomState, sender_id: ClientId, request: GrantHostRequest) {
    let Some(sender) = room.get_client(sender_id) else {
        return;
    };
    let sender_outbound = sender.outbound.clone();

    if !room.is_host(sender_id) {
        fail(&*sender_outbound, 400, "Must be host to grant host to another host");
        return;
    }
    if request.host_id == sender_id {
        fail(&*sender_outbound, 400, "Cannot transfer host powers to yourself");
        return;
    }
    if room.get_client(request.host_id).is_none() {
        fail(
            &*sender_outbound,
            400,
            format!("No matching client with ID {}", request.host_id),
        );
        return;
    }
    if let Err(err) = change_host(room, request.host_id) {
        fail_room_error(&*sender_outbound, err);
    }
}

/// Handles `REQUEST_KICK` (spec §4.4): disconnects the target, then
/// confirms back to the initiator.
pub fn kick(room: &mut RoomState, sender_id: ClientId, request: KickRequest) {
    let Some(sender) = room.get_client(sender_id) else {
        return;
    };
    let sender_outbound = sender.outbound.clone();

    if !room.is_host(sender_id) {
        fail(&*sender_outbound, 400, "Must be host to kick");
        return;
    }
    if request.client_id == sender_id {
        fail(&*sender_outbound, 400, "Cannot kick yourself");
        return;
    }
    let Some(target) = room.get_client(request.client_id) else {
        fail(
            &*sender_outbound,
            400,
            format!("No matching client with ID {}", request.client_id),
        );
        return;
    };
    target.outbound.close();
    disconnect(room, request.client_id);

    sender_outbound.enqueue(Payload::with_body(
        Flag::ResponseKick,
        &KickResponse {
            client_id: request.client_id,
        },
    ));
}

/// Handles `REQUEST_LIST`: the sanitised roster of every connected
/// client (spec §4.4 names this in passing; shape is spec §6's
/// `ClientList`).
pub fn list(room: &RoomState, requester: &dyn Outbound) {
    let list = room
        .get_connected()
        .iter()
        .map(|client| SanitisedClient {
            id: client.identity.id,
            host: room.is_host(client.identity.id),
        })
        .collect();
    requester.enqueue(Payload::with_body(Flag::ResponseList, &ClientList { list }));
}

/// Closes a room administratively (spec §4.4's Close room): marks it
/// `Closing` so every subsequent `disconnect` short-circuits, then
/// disconnects everyone currently connected.
pub fn close_room(room: &mut RoomState) {
    room.set_status(RoomStatus::Closing);
    let ids: Vec<ClientId> = room.get_connected().iter().map(|c| c.identity.id).collect();
    for client in room.get_connected() {
        client.outbound.close();
    }
    for id in ids {
        // `disconnect` is a no-op under `Closing`; this just guarantees
        // every identity leaves `connected` rather than lingering.
        let _ = room.remove(id);
    }
}

fn set_host_if_none(room: &mut RoomState, candidate: ClientId) {
    if room.get_host().is_some() {
        return;
    }
    if room.set_host(Some(candidate)).is_ok() {
        if let Some(client) = room.get_client(candidate) {
            client
                .outbound
                .enqueue(Payload::empty(Flag::ResponseAssignHost));
        }
    }
}

fn notify_host_of_newcomer(room: &mut RoomState, newcomer: ClientId) {
    let Some(host) = room.get_host() else {
        return;
    };
    let is_host_itself = host.identity.id == newcomer;
    let host_outbound = host.outbound.clone();
    host_outbound.enqueue(Payload::with_body(
        Flag::ResponseClientConnect,
        &SanitisedClient {
            id: newcomer,
            host: is_host_itself,
        },
    ));
}

/// Reassigns the host slot when it becomes vacant because the host
/// disconnected or was kicked: the new host is the first connected
/// session in stable iteration order, or no host at all if the room is
/// now empty (spec §4.4's migration protocol, step 2's disconnect-
/// triggered branch).
fn migrate_host(room: &mut RoomState) -> Result<(), RoomError> {
    let Some(new_host) = room.get_connected().first().map(|c| c.identity.id) else {
        return room.set_host(None);
    };
    change_host(room, new_host)
}

/// The Begin -> Assign -> Finish host-migration fan-out (spec §4.4),
/// shared by disconnect/kick-triggered migration and explicit grants.
fn change_host(room: &mut RoomState, new_host: ClientId) -> Result<(), RoomError> {
    for client in room.get_connected() {
        client
            .outbound
            .enqueue(Payload::empty(Flag::ResponseBeginHostMigrate));
    }

    room.set_host(Some(new_host))?;

    if let Some(host) = room.get_client(new_host) {
        host.outbound.enqueue(Payload::with_body(
            Flag::ResponseAssignHost,
            &FinishHostMigrationResponse { host_id: new_host },
        ));
    }

    for client in room.get_connected() {
        client
            .outbound
            .enqueue(Payload::empty(Flag::ResponseFinishHostMigrate));
    }

    Ok(())
}

/// Reused by `room::actor`'s `Handler<Connect>`/`Handler<Reconnect>` to
/// translate a not-yet-admitted session's `already_connected` check
/// into the spec's `ErrAlreadyConnected` client-visible error.
pub fn already_connected(outbound: &dyn Outbound) {
    fail(
        outbound,
        400,
        "Cannot connect to a different room while already connected to another",
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbound::test_support::RecordingOutbound;
    use crate::wire::Flag;

    fn new_client(room: &mut RoomState) -> (ClientId, Arc<RecordingOutbound>) {
        let outbound = Arc::new(RecordingOutbound::new());
        let identity = room.admit_new(outbound.clone()).unwrap();
        (identity.id, outbound)
    }

    #[test]
    fn lone_host_assignment() {
        // Scenario 1 (spec §8): create room maxClients=2, A connects.
        let mut room = RoomState::new(1, 1, 2);
        let a_outbound = Arc::new(RecordingOutbound::new());
        let a = connect(
            &mut room,
            a_outbound.clone(),
            JoinRoomRequest {
                room_id: 1,
                room_secret: 1,
            },
        )
        .unwrap();

        let frames: Vec<Flag> = a_outbound.frames().iter().map(|f| f.flag).collect();
        assert_eq!(
            frames,
            vec![Flag::ResponseConnect, Flag::ResponseAssignHost, Flag::ResponseClientConnect]
        );
        assert!(room.is_host(a));
    }

    #[test]
    fn broadcast_fan_out_excludes_origin() {
        // Scenario 2 (spec §8).
        let mut room = RoomState::new(1, 1, 2);
        let (a, a_outbound) = new_client(&mut room);
        room.set_host(Some(a)).unwrap();
        let (_b, b_outbound) = new_client(&mut room);

        relay(
            &mut room,
            a,
            Relay {
                kind: RelayType::Broadcast,
                target: None,
                data: b"x".to_vec(),
            },
        );

        assert_eq!(b_outbound.frames().len(), 1);
        assert_eq!(b_outbound.frames()[0].flag, Flag::ResponseRelayMessage);
        assert!(a_outbound
            .frames()
            .iter()
            .all(|f| f.flag != Flag::ResponseRelayMessage));
    }

    #[test]
    fn non_host_broadcast_is_rejected() {
        // Scenario 3 (spec §8).
        let mut room = RoomState::new(1, 1, 2);
        let (a, _a_outbound) = new_client(&mut room);
        room.set_host(Some(a)).unwrap();
        let (b, b_outbound) = new_client(&mut room);

        relay(
            &mut room,
            b,
            Relay {
                kind: RelayType::Broadcast,
                target: None,
                data: b"x".to_vec(),
            },
        );

        let frames = b_outbound.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].flag, Flag::ResponseError);
        let err: ApiError = frames[0].decode().unwrap();
        assert_eq!(err.code, 400);
    }

    #[test]
    fn host_migration_on_disconnect_follows_begin_assign_finish_order() {
        // Scenario 4 (spec §8).
        let mut room = RoomState::new(1, 1, 2);
        let (a, _a_outbound) = new_client(&mut room);
        room.set_host(Some(a)).unwrap();
        let (b, b_outbound) = new_client(&mut room);

        disconnect(&mut room, a);

        let frames: Vec<Flag> = b_outbound.frames().iter().map(|f| f.flag).collect();
        assert_eq!(
            frames,
            vec![
                Flag::ResponseBeginHostMigrate,
                Flag::ResponseAssignHost,
                Flag::ResponseFinishHostMigrate
            ]
        );
        assert!(room.is_host(b));
    }

    #[test]
    fn rejoin_restores_identity_and_rejects_wrong_secret() {
        // Scenario 5 (spec §8).
        let mut room = RoomState::new(1, 1, 2);
        let (b, _b_outbound) = new_client(&mut room);
        let identity = room.get_client(b).unwrap().identity;
        disconnect(&mut room, b);

        let c_outbound = Arc::new(RecordingOutbound::new());
        let result = reconnect(
            &mut room,
            c_outbound.clone(),
            RejoinRoomRequest {
                room_id: 1,
                room_secret: 1,
                client_id: identity.id,
                client_secret: identity.secret,
            },
        );
        assert!(result.is_some());

        let wrong_outbound = Arc::new(RecordingOutbound::new());
        // identity.id is now connected again, so a second rejoin attempt
        // with a wrong secret must fail with no matching disconnected
        // client rather than an invalid-secret error; exercise the
        // invalid-secret path on a still-disconnected client instead.
        let (d, _d_outbound) = new_client(&mut room);
        disconnect(&mut room, d);
        reconnect(
            &mut room,
            wrong_outbound.clone(),
            RejoinRoomRequest {
                room_id: 1,
                room_secret: 1,
                client_id: d,
                client_secret: 999_999,
            },
        );
        let frames = wrong_outbound.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].flag, Flag::ResponseError);
    }

    #[test]
    fn kick_closes_and_disconnects_target_and_confirms_to_initiator() {
        let mut room = RoomState::new(1, 1, 3);
        let (a, a_outbound) = new_client(&mut room);
        room.set_host(Some(a)).unwrap();
        let (b, b_outbound) = new_client(&mut room);

        kick(&mut room, a, KickRequest { client_id: b });

        assert!(b_outbound.is_closed());
        assert!(room.get_client(b).is_none());
        let frames = a_outbound.frames();
        assert_eq!(frames.last().unwrap().flag, Flag::ResponseKick);
    }

    #[test]
    fn grant_host_rejects_self_grant() {
        let mut room = RoomState::new(1, 1, 2);
        let (a, a_outbound) = new_client(&mut room);
        room.set_host(Some(a)).unwrap();

        grant_host(&mut room, a, GrantHostRequest { host_id: a });

        let frames = a_outbound.frames();
        assert_eq!(frames.last().unwrap().flag, Flag::ResponseError);
    }
}
