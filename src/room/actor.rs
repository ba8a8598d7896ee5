use std::sync::Arc;

use actix::{Actor, ActorContext, Addr, Context, Handler, Message};

use crate::identity::ClientId;
use crate::outbound::Outbound;
use crate::protocol;
use crate::wire::{GrantHostRequest, JoinRoomRequest, KickRequest, RejoinRoomRequest, Relay};

use super::manager::RoomManager;
use super::state::{RoomInfo, RoomState};

/// A room as an actix actor: its mailbox is the per-room lock the
/// engine's fan-out needs, so every `Handler` here runs one protocol
/// operation to completion before the next is dequeued.
pub struct Room {
    state: RoomState,
    manager: Addr<RoomManager>,
}

impl Room {
    pub fn new(
        id: crate::identity::RoomId,
        secret: i32,
        max_clients: i32,
        manager: Addr<RoomManager>,
    ) -> Self {
        Self {
            state: RoomState::new(id, secret, max_clients),
            manager,
        }
    }
}

impl Actor for Room {
    type Context = Context<Self>;

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.manager
            .do_send(super::manager::RoomStopped(self.state.id()));
    }
}

#[derive(Message)]
#[rtype(result = "Option<ClientId>")]
pub struct Connect {
    pub request: JoinRoomRequest,
    pub outbound: Arc<dyn Outbound>,
}

impl Handler<Connect> for Room {
    type Result = Option<ClientId>;
    fn handle(&mut self, msg: Connect, _ctx: &mut Self::Context) -> Self::Result {
        protocol::connect(&mut self.state, msg.outbound, msg.request)
    }
}

#[derive(Message)]
#[rtype(result = "Option<ClientId>")]
pub struct Reconnect {
    pub request: RejoinRoomRequest,
    pub outbound: Arc<dyn Outbound>,
}

impl Handler<Reconnect> for Room {
    type Result = Option<ClientId>;
    fn handle(&mut self, msg: Reconnect, _ctx: &mut Self::Context) -> Self::Result {
        protocol::reconnect(&mut self.state, msg.outbound, msg.request)
    }
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub client_id: ClientId,
}

impl Handler<Disconnect> for Room {
    type Result = ();
    fn handle(&mut self, msg: Disconnect, ctx: &mut Self::Context) -> Self::Result {
        protocol::disconnect(&mut self.state, msg.client_id);
        if self.state.get_connected().is_empty() {
            ctx.stop();
        }
    }
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct RelayMessage {
    pub sender_id: ClientId,
    pub request: Relay,
}

impl Handler<RelayMessage> for Room {
    type Result = ();
    fn handle(&mut self, msg: RelayMessage, _ctx: &mut Self::Context) -> Self::Result {
        protocol::relay(&mut self.state, msg.sender_id, msg.request);
    }
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct GrantHost {
    pub sender_id: ClientId,
    pub request: GrantHostRequest,
}

impl Handler<GrantHost> for Room {
    type Result = ();
    fn handle(&mut self, msg: GrantHost, _ctx: &mut Self::Context) -> Self::Result {
        protocol::grant_host(&mut self.state, msg.sender_id, msg.request);
    }
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Kick {
    pub sender_id: ClientId,
    pub request: KickRequest,
}

impl Handler<Kick> for Room {
    type Result = ();
    fn handle(&mut self, msg: Kick, ctx: &mut Self::Context) -> Self::Result {
        protocol::kick(&mut self.state, msg.sender_id, msg.request);
        if self.state.get_connected().is_empty() {
            ctx.stop();
        }
    }
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct ListClients {
    pub requester: Arc<dyn Outbound>,
}

impl Handler<ListClients> for Room {
    type Result = ();
    fn handle(&mut self, msg: ListClients, _ctx: &mut Self::Context) -> Self::Result {
        protocol::list(&self.state, &*msg.requester);
    }
}

/// Administratively closes the room (spec §4.4), invoked from the HTTP
/// admin surface via `room::manager`.
#[derive(Message)]
#[rtype(result = "()")]
pub struct CloseRoom;

impl Handler<CloseRoom> for Room {
    type Result = ();
    fn handle(&mut self, _msg: CloseRoom, ctx: &mut Self::Context) -> Self::Result {
        protocol::close_room(&mut self.state);
        ctx.stop();
    }
}

#[derive(Message)]
#[rtype(result = "RoomInfo")]
pub struct GetInfo;

impl Handler<GetInfo> for Room {
    type Result = RoomInfo;
    fn handle(&mut self, _msg: GetInfo, _ctx: &mut Self::Context) -> Self::Result {
        self.state.info()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix::Actor;

    use super::*;
    use crate::outbound::test_support::RecordingOutbound;
    use crate::room::manager::RoomManager;
    use crate::wire::{Flag, JoinRoomRequest};

    fn start_room(max_clients: i32) -> Addr<Room> {
        let manager = RoomManager::new(100, 5).start();
        Room::new(1, 42, max_clients, manager).start()
    }

    #[actix_rt::test]
    async fn connect_message_assigns_host_and_notifies_over_the_mailbox() {
        let room = start_room(2);
        let outbound = Arc::new(RecordingOutbound::new());

        let client_id = room
            .send(Connect {
                request: JoinRoomRequest {
                    room_id: 1,
                    room_secret: 42,
                },
                outbound: outbound.clone(),
            })
            .await
            .expect("mailbox delivery");

        assert_eq!(client_id, Some(0));
        let frames: Vec<Flag> = outbound.frames().iter().map(|f| f.flag).collect();
        assert_eq!(
            frames,
            vec![Flag::ResponseConnect, Flag::ResponseAssignHost, Flag::ResponseClientConnect]
        );
    }

    #[actix_rt::test]
    async fn room_actor_stops_once_its_last_client_disconnects() {
        let room = start_room(1);
        let outbound = Arc::new(RecordingOutbound::new());

        let client_id = room
            .send(Connect {
                request: JoinRoomRequest {
                    room_id: 1,
                    room_secret: 42,
                },
                outbound,
            })
            .await
            .expect("mailbox delivery")
            .expect("room has capacity for one client");

        room.send(Disconnect { client_id })
            .await
            .expect("mailbox delivery");

        // The actor stops its own context once empty; a subsequent send
        // against a stopped actor's mailbox is a hard error.
        assert!(room.send(GetInfo).await.is_err());
    }
}

