//! The single consumer: wait, drain, write.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use topicmux_transport::{Transport, WriteMode};
use tracing::{debug, info, warn};

use crate::config::DropPolicy;
use crate::producer::Shared;
use crate::queue::QueueReader;
use crate::signal::Wake;
use crate::stats::Counters;

pub(crate) struct Transmitter {
    reader: QueueReader,
    scratch: Box<[u8]>,
    transport: Box<dyn Transport>,
    shared: Arc<Shared>,
    drop_policy: DropPolicy,
    reported_drops: u64,
}

impl Transmitter {
    pub(crate) fn new(
        reader: QueueReader,
        scratch_capacity: usize,
        transport: Box<dyn Transport>,
        shared: Arc<Shared>,
        drop_policy: DropPolicy,
    ) -> Self {
        Self {
            reader,
            scratch: vec![0u8; scratch_capacity].into_boxed_slice(),
            transport,
            shared,
            drop_policy,
            reported_drops: 0,
        }
    }

    /// Run until shutdown is requested, then drain what is left and return.
    pub(crate) fn run(mut self) {
        debug!(
            transport = self.transport.transport_name(),
            scratch = self.scratch.len(),
            "transmitter started"
        );
        loop {
            match self.shared.signal.wait() {
                Wake::Data => {
                    Counters::bump(&self.shared.counters.wakeups);
                    self.drain();
                    self.report_drops();
                }
                Wake::Shutdown => {
                    self.drain();
                    self.report_drops();
                    break;
                }
            }
        }
        let stats = self.shared.counters.snapshot();
        info!(
            transport = self.transport.transport_name(),
            frames = stats.frames_enqueued,
            bytes = stats.bytes_written,
            dropped = stats.frames_dropped(),
            "transmitter stopped"
        );
    }

    /// Flush until the queue reads empty. Returns the number of bytes moved.
    pub(crate) fn drain(&mut self) -> usize {
        let mut total = 0;
        loop {
            let n = self.flush_once();
            if n == 0 {
                return total;
            }
            total += n;
        }
    }

    /// Move at most one scratch buffer of bytes from the queue to the transport.
    pub(crate) fn flush_once(&mut self) -> usize {
        let n = self.reader.pop_batch(&mut self.scratch);
        if n == 0 {
            return 0;
        }
        match self
            .transport
            .write(&self.scratch[..n], WriteMode::FireAndForget)
        {
            Ok(()) => {
                self.shared
                    .counters
                    .bytes_written
                    .fetch_add(n as u64, Ordering::Relaxed);
            }
            Err(err) => {
                Counters::bump(&self.shared.counters.write_failures);
                warn!(
                    transport = self.transport.transport_name(),
                    bytes = n,
                    error = %err,
                    "transport write failed; bytes lost"
                );
            }
        }
        n
    }

    fn report_drops(&mut self) {
        let dropped = self.shared.counters.snapshot().frames_dropped();
        if dropped == self.reported_drops {
            return;
        }
        let delta = dropped - self.reported_drops;
        self.reported_drops = dropped;
        if self.drop_policy == DropPolicy::WarnAndDrop {
            warn!(dropped = delta, total = dropped, "frames dropped before transmission");
        }
    }
}

#[cfg(test)]
mod tests {
    use topicmux_frame::{decode_stream, Frame, HEADER_SIZE};
    use topicmux_topic::CallContext;
    use topicmux_transport::MemoryTransport;

    use super::*;
    use crate::pack::PackArena;
    use crate::producer::{on_publish, ProducerContext};
    use crate::queue::FrameQueue;
    use crate::signal::WakeSignal;

    fn setup(
        queue_capacity: usize,
        scratch_capacity: usize,
    ) -> (Transmitter, Arc<Shared>, MemoryTransport) {
        let (writer, reader) = FrameQueue::with_capacity(queue_capacity).unwrap();
        let shared = Arc::new(Shared {
            queue: writer,
            signal: WakeSignal::new(),
            packs: PackArena::new([HEADER_SIZE + 16]),
            counters: Counters::default(),
        });
        let memory = MemoryTransport::new();
        let transmitter = Transmitter::new(
            reader,
            scratch_capacity,
            Box::new(memory.clone()),
            Arc::clone(&shared),
            DropPolicy::WarnAndDrop,
        );
        (transmitter, shared, memory)
    }

    #[test]
    fn flush_once_on_empty_queue_writes_nothing() {
        let (mut tx, _shared, memory) = setup(64, 64);
        assert_eq!(tx.flush_once(), 0);
        assert_eq!(memory.write_count(), 0);
    }

    #[test]
    fn drain_splits_into_scratch_sized_writes() {
        let (mut tx, shared, memory) = setup(128, 16);
        let ctx = ProducerContext::new(Arc::clone(&shared), 7, 0);
        for value in 0..3u8 {
            on_publish(&ctx, CallContext::Thread, &[value; 10]);
        }

        assert_eq!(tx.drain(), 54);
        assert_eq!(memory.write_count(), 4);

        let frames = decode_stream(&memory.contents(), 16).unwrap();
        assert_eq!(
            frames,
            vec![
                Frame::new(7, vec![0; 10]),
                Frame::new(7, vec![1; 10]),
                Frame::new(7, vec![2; 10]),
            ]
        );
        assert_eq!(shared.counters.snapshot().bytes_written, 54);
    }

    #[test]
    fn write_failure_is_counted_and_bytes_discarded() {
        let (mut tx, shared, memory) = setup(64, 64);
        let ctx = ProducerContext::new(Arc::clone(&shared), 1, 0);
        memory.fail_next_writes(1);

        on_publish(&ctx, CallContext::Thread, &[1, 2, 3]);
        assert_eq!(tx.flush_once(), 11);
        assert!(memory.contents().is_empty());

        on_publish(&ctx, CallContext::Thread, &[4]);
        assert_eq!(tx.flush_once(), 9);

        let stats = shared.counters.snapshot();
        assert_eq!(stats.write_failures, 1);
        assert_eq!(stats.bytes_written, 9);
        assert_eq!(
            decode_stream(&memory.contents(), 16).unwrap(),
            vec![Frame::new(1, vec![4])]
        );
    }

    #[test]
    fn drops_are_reported_once() {
        let (mut tx, shared, _memory) = setup(HEADER_SIZE + 1, 64);
        let ctx = ProducerContext::new(Arc::clone(&shared), 1, 0);

        on_publish(&ctx, CallContext::Thread, &[1, 2]);
        tx.report_drops();
        assert_eq!(tx.reported_drops, 1);

        tx.report_drops();
        assert_eq!(tx.reported_drops, 1);
    }

    #[test]
    fn run_drains_and_exits_on_shutdown() {
        let (tx, shared, memory) = setup(64, 64);
        let ctx = ProducerContext::new(Arc::clone(&shared), 3, 0);
        on_publish(&ctx, CallContext::Thread, &[0xEE]);
        shared.signal.request_shutdown();

        tx.run();

        assert_eq!(
            decode_stream(&memory.contents(), 16).unwrap(),
            vec![Frame::new(3, vec![0xEE])]
        );
    }
}
