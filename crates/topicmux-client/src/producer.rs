//! The publish-side path: pack, enqueue, signal.

use std::sync::Arc;

use topicmux_frame::{pack_frame, packed_len};
use topicmux_topic::CallContext;

use crate::pack::PackArena;
use crate::queue::QueueWriter;
use crate::signal::WakeSignal;
use crate::stats::Counters;

/// State shared between every producer callback and the transmitter.
pub(crate) struct Shared {
    pub(crate) queue: QueueWriter,
    pub(crate) signal: WakeSignal,
    pub(crate) packs: PackArena,
    pub(crate) counters: Counters,
}

/// Everything one topic's callback needs, captured by value at registration.
#[derive(Clone)]
pub struct ProducerContext {
    shared: Arc<Shared>,
    identifier: u32,
    slot: usize,
}

impl ProducerContext {
    pub(crate) fn new(shared: Arc<Shared>, identifier: u32, slot: usize) -> Self {
        Self {
            shared,
            identifier,
            slot,
        }
    }

    pub fn identifier(&self) -> u32 {
        self.identifier
    }

    pub fn slot(&self) -> usize {
        self.slot
    }
}

/// Frame `payload` for the context's topic and hand it to the transmitter.
///
/// Never blocks, never allocates, never logs and never touches the
/// transport. Updates that cannot be queued are dropped and counted. Once the
/// client has shut down, updates are ignored.
pub fn on_publish(context: &ProducerContext, call: CallContext, payload: &[u8]) {
    let shared = &*context.shared;
    if shared.signal.is_shutdown_requested() {
        return;
    }

    let Some(mut pack) = shared.packs.try_claim(context.slot) else {
        Counters::bump(&shared.counters.frames_dropped_slot_busy);
        return;
    };
    if packed_len(payload.len()) > pack.len() {
        Counters::bump(&shared.counters.frames_dropped_oversize);
        return;
    }

    let len = pack_frame(context.identifier, &mut pack, payload);
    let pushed = shared.queue.push_batch(&pack[..len]);
    drop(pack);

    if pushed.is_err() {
        Counters::bump(&shared.counters.frames_dropped_queue_full);
        return;
    }
    Counters::bump(&shared.counters.frames_enqueued);

    if call.is_interrupt() {
        shared.signal.post_from_isr();
    } else {
        shared.signal.post();
    }
}
