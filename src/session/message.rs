//! Actix message types a `Session` actor receives from elsewhere (room
//! actors, via their `Outbound` handle) to push a frame or close the
//! underlying socket.

use actix::Message;

use crate::wire::Payload;

#[derive(Message)]
#[rtype(result = "()")]
pub struct SendFrame(pub Payload);

#[derive(Message)]
#[rtype(result = "()")]
pub struct CloseConnection;
