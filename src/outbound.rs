//! The `Outbound` seam between the room engine and a connected session
//! (spec §4.1). `RoomState` stores one `Arc<dyn Outbound>` per connected
//! client so the protocol engine can enqueue frames and request a close
//! without depending on `actix` at all, which keeps `room::state` and
//! `protocol` unit-testable without the actix runtime.

use crate::wire::Payload;

/// A destination a frame can be enqueued to, and a one-shot close.
///
/// `enqueue` must never block the caller beyond handing the frame to the
/// destination's own queue (spec §4.1); a destination that is already
/// closed silently discards enqueues rather than erroring.
pub trait Outbound: Send + Sync {
    fn enqueue(&self, frame: Payload);
    fn close(&self);
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// A recording `Outbound` double used by `room::state` and
    /// `protocol` unit tests: captures every frame enqueued to it in
    /// order, with no actix runtime involved.
    #[derive(Default)]
    pub struct RecordingOutbound {
        frames: Mutex<Vec<Payload>>,
        closed: Mutex<bool>,
    }

    impl RecordingOutbound {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn frames(&self) -> Vec<Payload> {
            self.frames.lock().unwrap().clone()
        }

        pub fn is_closed(&self) -> bool {
            *self.closed.lock().unwrap()
        }
    }

    impl Outbound for RecordingOutbound {
        fn enqueue(&self, frame: Payload) {
            self.frames.lock().unwrap().push(frame);
        }

        fn close(&self) {
            *self.closed.lock().unwrap() = true;
        }
    }
}
