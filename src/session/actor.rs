use std::sync::Arc;
use std::time::{Duration, Instant};

use actix::{
    Actor, ActorContext, ActorFutureExt, Addr, AsyncContext, Handler, StreamHandler, WrapFuture,
};
use actix_web_actors::ws::{self, ProtocolError, WebsocketContext};

use crate::identity::ClientId;
use crate::outbound::Outbound;
use crate::protocol;
use crate::room::actor::{Connect, Disconnect, GrantHost, Kick, ListClients, Reconnect, RelayMessage, Room};
use crate::room::manager::{ResolveRoom, RoomManager};
use crate::wire::{Flag, GrantHostRequest, JoinRoomRequest, KickRequest, Payload, RejoinRoomRequest, Relay};

use super::message::{CloseConnection, SendFrame};

/// How long to wait for a pong before considering the connection dead,
/// the common actix-web-actors websocket heartbeat idiom.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(15);

/// Sends frames back to a specific `Session` actor; stored as the
/// `Arc<dyn Outbound>` a room hands to `protocol` functions, so the
/// engine never has to know it's talking to a websocket.
struct SessionOutbound(Addr<Session>);

impl Outbound for SessionOutbound {
    fn enqueue(&self, frame: Payload) {
        self.0.do_send(SendFrame(frame));
    }

    fn close(&self) {
        self.0.do_send(CloseConnection);
    }
}

/// One websocket connection (spec §4.1's `Session`). Binds to at most
/// one room for its lifetime; reconnecting after a drop happens over a
/// brand new `Session`, identified by the rejoin secret rather than any
/// continuity at this layer.
pub struct Session {
    manager: Addr<RoomManager>,
    outbound: Option<Arc<dyn Outbound>>,
    room: Option<Addr<Room>>,
    client_id: Option<ClientId>,
    hb: Instant,
}

impl Session {
    pub fn new(manager: Addr<RoomManager>) -> Self {
        Self {
            manager,
            outbound: None,
            room: None,
            client_id: None,
            hb: Instant::now(),
        }
    }

    fn heartbeat(&self, ctx: &mut <Self as Actor>::Context) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn outbound(&self) -> &Arc<dyn Outbound> {
        self.outbound.as_ref().expect("outbound is set in started()")
    }

    fn handle_frame(&mut self, payload: Payload, ctx: &mut <Self as Actor>::Context) {
        match payload.flag {
            Flag::RequestConnect => match payload.decode::<JoinRoomRequest>() {
                Ok(request) => self.connect(request, ctx),
                Err(err) => {
                    protocol::invalid_request(self.outbound(), "Invalid join request provided", err)
                }
            },
            Flag::RequestReconnect => match payload.decode::<RejoinRoomRequest>() {
                Ok(request) => self.reconnect(request, ctx),
                Err(err) => {
                    protocol::invalid_request(self.outbound(), "Invalid join request provided", err)
                }
            },
            Flag::RequestList => self.with_room("list a room's clients", |session, room| {
                room.do_send(ListClients {
                    requester: session.outbound().clone(),
                });
            }),
            Flag::RequestRelayMessage => match payload.decode::<Relay>() {
                Ok(request) => self.with_room("relay a message", |session, room| {
                    room.do_send(RelayMessage {
                        sender_id: session.client_id.expect("checked by with_room"),
                        request,
                    });
                }),
                Err(err) => protocol::invalid_request(
                    self.outbound(),
                    "Relayed message does not conform to spec",
                    err,
                ),
            },
            Flag::RequestGrantHost => match payload.decode::<GrantHostRequest>() {
                Ok(request) => self.with_room("grant another client host", |session, room| {
                    room.do_send(GrantHost {
                        sender_id: session.client_id.expect("checked by with_room"),
                        request,
                    });
                }),
                Err(err) => protocol::invalid_request(
                    self.outbound(),
                    "Invalid grant host request provided",
                    err,
                ),
            },
            Flag::RequestKick => match payload.decode::<KickRequest>() {
                Ok(request) => self.with_room("kick a client", |session, room| {
                    room.do_send(Kick {
                        sender_id: session.client_id.expect("checked by with_room"),
                        request,
                    });
                }),
                Err(err) => {
                    protocol::invalid_request(self.outbound(), "Invalid kick request provided", err)
                }
            },
            other => {
                log::warn!("ignoring unexpected request flag {other:?} from client");
            }
        }
    }

    fn with_room(&mut self, action: &str, body: impl FnOnce(&mut Self, Addr<Room>)) {
        match self.room.clone() {
            Some(room) if self.client_id.is_some() => body(self, room),
            _ => protocol::not_connected(self.outbound(), action),
        }
    }

    fn connect(&mut self, request: JoinRoomRequest, ctx: &mut <Self as Actor>::Context) {
        if self.room.is_some() {
            protocol::already_connected(self.outbound());
            return;
        }
        let manager = self.manager.clone();
        let outbound = self.outbound().clone();
        let room_id = request.room_id;

        let fut = async move {
            let resolved = manager
                .send(ResolveRoom {
                    id: request.room_id,
                    secret: request.room_secret,
                })
                .await
                .ok()
                .flatten();
            match resolved {
                Some(room) => {
                    let client_id = room
                        .send(Connect {
                            request,
                            outbound: outbound.clone(),
                        })
                        .await
                        .ok()
                        .flatten();
                    (client_id, Some(room))
                }
                None => {
                    protocol::room_not_found(&*outbound, room_id);
                    (None, None)
                }
            }
        };

        ctx.spawn(fut.into_actor(self).map(|(client_id, room), act, _ctx| {
            if let (Some(client_id), Some(room)) = (client_id, room) {
                act.client_id = Some(client_id);
                act.room = Some(room);
            }
        }));
    }

    fn reconnect(&mut self, request: RejoinRoomRequest, ctx: &mut <Self as Actor>::Context) {
        if self.room.is_some() {
            protocol::already_connected(self.outbound());
            return;
        }
        let manager = self.manager.clone();
        let outbound = self.outbound().clone();
        let room_id = request.room_id;

        let fut = async move {
            let resolved = manager
                .send(ResolveRoom {
                    id: request.room_id,
                    secret: request.room_secret,
                })
                .await
                .ok()
                .flatten();
            match resolved {
                Some(room) => {
                    let client_id = room
                        .send(Reconnect {
                            request,
                            outbound: outbound.clone(),
                        })
                        .await
                        .ok()
                        .flatten();
                    (client_id, Some(room))
                }
                None => {
                    protocol::room_not_found(&*outbound, room_id);
                    (None, None)
                }
            }
        };

        ctx.spawn(fut.into_actor(self).map(|(client_id, room), act, _ctx| {
            if let (Some(client_id), Some(room)) = (client_id, room) {
                act.client_id = Some(client_id);
                act.room = Some(room);
            }
        }));
    }
}

impl Actor for Session {
    type Context = WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.outbound = Some(Arc::new(SessionOutbound(ctx.address())));
        self.heartbeat(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        if let (Some(room), Some(client_id)) = (self.room.take(), self.client_id.take()) {
            room.do_send(Disconnect { client_id });
        }
    }
}

impl StreamHandler<Result<ws::Message, ProtocolError>> for Session {
    fn handle(&mut self, item: Result<ws::Message, ProtocolError>, ctx: &mut Self::Context) {
        match item {
            Ok(ws::Message::Binary(bytes)) => match serde_json::from_slice::<Payload>(&bytes) {
                Ok(payload) => self.handle_frame(payload, ctx),
                Err(err) => log::error!("invalid message provided, does not conform to spec, {err}"),
            },
            Ok(ws::Message::Ping(bytes)) => {
                self.hb = Instant::now();
                ctx.pong(&bytes);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => {
                if let Some(outbound) = &self.outbound {
                    protocol::invalid_request(&**outbound, "Invalid message provided", "must be in binary format");
                }
            }
            Err(err) => log::error!("{err}"),
        }
    }
}

impl Handler<SendFrame> for Session {
    type Result = ();
    fn handle(&mut self, msg: SendFrame, ctx: &mut Self::Context) -> Self::Result {
        match serde_json::to_vec(&msg.0) {
            Ok(bytes) => ctx.binary(bytes),
            Err(err) => log::error!("failed to encode outgoing frame: {err}"),
        }
    }
}

impl Handler<CloseConnection> for Session {
    type Result = ();
    fn handle(&mut self, _msg: CloseConnection, ctx: &mut Self::Context) -> Self::Result {
        ctx.close(None);
        ctx.stop();
    }
}
