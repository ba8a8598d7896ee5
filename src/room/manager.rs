//! The room manager as an actix actor (spec §4.3): owns the committed-
//! capacity bookkeeping (`ManagerState`) plus the `RoomId -> Addr<Room>`
//! map actix itself requires, since an `Addr` can't be derived from the
//! pure state alone.

use actix::{Actor, ActorFutureExt, Addr, Context, Handler, Message, ResponseActFuture, WrapFuture};
use ahash::HashMap;
use futures::future::join_all;

use crate::error::ManagerError;
use crate::identity::RoomId;

use super::actor::{CloseRoom, GetInfo, Room};
use super::manager_state::{ManagerState, RoomsSummary};
use super::state::RoomInfo;

pub struct RoomManager {
    state: ManagerState,
    addrs: HashMap<RoomId, Addr<Room>>,
}

impl RoomManager {
    pub fn new(max_clients: i32, commit_rounding: i32) -> Self {
        Self {
            state: ManagerState::new(max_clients, commit_rounding),
            addrs: crate::utils::new_fast_hashmap(64),
        }
    }
}

impl Actor for RoomManager {
    type Context = Context<Self>;
}

/// Reserves capacity and starts a fresh `Room` actor (spec §4.3's
/// `CreateRoom`), used by the HTTP admin surface.
#[derive(Message)]
#[rtype(result = "Result<RoomInfo, ManagerError>")]
pub struct CreateRoom {
    pub max_clients: i32,
}

impl Handler<CreateRoom> for RoomManager {
    type Result = Result<RoomInfo, ManagerError>;
    fn handle(&mut self, msg: CreateRoom, ctx: &mut Self::Context) -> Self::Result {
        let (id, secret) = self.state.reserve(msg.max_clients)?;
        let addr = Room::new(id, secret, msg.max_clients, ctx.address()).start();
        self.addrs.insert(id, addr);
        Ok(RoomInfo {
            id,
            secret,
            max_clients: msg.max_clients,
            current_clients: 0,
        })
    }
}

/// Finds the room matching `{id, secret}`, for the websocket session's
/// `Connect`/`Reconnect` flow (spec §4.4). A linear scan over
/// `ManagerState` mirrors the original's own full-room-list scan.
#[derive(Message)]
#[rtype(result = "Option<Addr<Room>>")]
pub struct ResolveRoom {
    pub id: RoomId,
    pub secret: i32,
}

impl Handler<ResolveRoom> for RoomManager {
    type Result = Option<Addr<Room>>;
    fn handle(&mut self, msg: ResolveRoom, _ctx: &mut Self::Context) -> Self::Result {
        let id = self.state.find_matching(msg.id, msg.secret)?;
        self.addrs.get(&id).cloned()
    }
}

/// Administratively closes a room (spec §4.4), used by the HTTP
/// `DELETE /v1/api/rooms/{room_id}` route.
#[derive(Message)]
#[rtype(result = "Result<(), ManagerError>")]
pub struct DeleteRoom {
    pub id: RoomId,
}

impl Handler<DeleteRoom> for RoomManager {
    type Result = Result<(), ManagerError>;
    fn handle(&mut self, msg: DeleteRoom, _ctx: &mut Self::Context) -> Self::Result {
        let addr = self
            .addrs
            .get(&msg.id)
            .cloned()
            .ok_or(ManagerError::NoRoomFound(msg.id))?;
        addr.do_send(CloseRoom);
        Ok(())
    }
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct RoomStopped(pub RoomId);

impl Handler<RoomStopped> for RoomManager {
    type Result = ();
    fn handle(&mut self, msg: RoomStopped, _ctx: &mut Self::Context) -> Self::Result {
        self.state.remove(msg.0);
        self.addrs.remove(&msg.0);
    }
}

/// Lists every room's point-in-time info (spec §4.3's `GetRoomList`);
/// queries each room actor concurrently and waits for all of them,
/// matching the teacher's `.into_actor(self).then(...)` future-chaining
/// idiom for cross-actor requests.
#[derive(Message)]
#[rtype(result = "Vec<RoomInfo>")]
pub struct ListRooms;

impl Handler<ListRooms> for RoomManager {
    type Result = ResponseActFuture<Self, Vec<RoomInfo>>;
    fn handle(&mut self, _msg: ListRooms, _ctx: &mut Self::Context) -> Self::Result {
        let addrs: Vec<Addr<Room>> = self.addrs.values().cloned().collect();
        let fut = join_all(addrs.iter().map(|addr| addr.send(GetInfo)));
        Box::pin(fut.into_actor(self).map(|results, _act, _ctx| {
            results.into_iter().filter_map(Result::ok).collect()
        }))
    }
}

#[derive(Message)]
#[rtype(result = "Option<RoomInfo>")]
pub struct GetRoomInfo {
    pub id: RoomId,
}

impl Handler<GetRoomInfo> for RoomManager {
    type Result = ResponseActFuture<Self, Option<RoomInfo>>;
    fn handle(&mut self, msg: GetRoomInfo, _ctx: &mut Self::Context) -> Self::Result {
        let addr = self.addrs.get(&msg.id).cloned();
        Box::pin(
            async move {
                match addr {
                    Some(addr) => addr.send(GetInfo).await.ok(),
                    None => None,
                }
            }
            .into_actor(self),
        )
    }
}

/// Server-wide committed-capacity summary (spec §4.3's `GetRoomsSummary`);
/// current occupancy requires asking every room actor, so this one also
/// goes through `ResponseActFuture`.
#[derive(Message)]
#[rtype(result = "RoomsSummary")]
pub struct GetSummary;

impl Handler<GetSummary> for RoomManager {
    type Result = ResponseActFuture<Self, RoomsSummary>;
    fn handle(&mut self, _msg: GetSummary, _ctx: &mut Self::Context) -> Self::Result {
        let addrs: Vec<Addr<Room>> = self.addrs.values().cloned().collect();
        let fut = join_all(addrs.iter().map(|addr| addr.send(GetInfo)));
        Box::pin(fut.into_actor(self).map(|results, act, _ctx| {
            let current_clients: i32 = results
                .into_iter()
                .filter_map(Result::ok)
                .map(|info| info.current_clients)
                .sum();
            act.state.summary(current_clients)
        }))
    }
}
