//! Software-clocked output scheduler.
//!
//! Runs the block callback on its own thread at the block cadence and hands
//! each finished block to a [`BlockSink`]. Unpaced streams run as fast as the
//! sink accepts blocks, which is what offline rendering wants.

use super::{BlockOutcome, CallbackFlags, OutputBackend, OutputStream, StreamCallback, StreamParams};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use swanlake_core::{Error, Result};
use tracing::{debug, error, trace};

/// Receives every delivered block on the scheduler thread.
pub trait BlockSink: Send + Sync {
    fn consume(&self, block: &[u8]);
}

impl<F> BlockSink for F
where
    F: Fn(&[u8]) + Send + Sync,
{
    fn consume(&self, block: &[u8]) {
        self(block);
    }
}

/// Discards blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl BlockSink for NullSink {
    fn consume(&self, _block: &[u8]) {}
}

/// Opens [`ClockedStream`]s feeding one sink.
#[derive(Clone)]
pub struct ClockedBackend {
    sink: Arc<dyn BlockSink>,
    paced: bool,
}

impl ClockedBackend {
    /// Deliver one block per block duration.
    pub fn new(sink: Arc<dyn BlockSink>) -> Self {
        Self { sink, paced: true }
    }

    /// Deliver blocks back to back.
    pub fn unpaced(sink: Arc<dyn BlockSink>) -> Self {
        Self { sink, paced: false }
    }
}

impl OutputBackend for ClockedBackend {
    type Stream = ClockedStream;

    fn open(
        &self,
        params: StreamParams,
        callback: Arc<dyn StreamCallback>,
    ) -> Result<ClockedStream> {
        if params.block_size == 0 || params.frame_rate == 0 {
            return Err(Error::Stream(format!("Invalid stream parameters: {params:?}")));
        }

        debug!(
            "Clocked output: {} Hz, {} channels, {} frames per block, paced: {}",
            params.frame_rate, params.channels, params.block_size, self.paced
        );

        Ok(ClockedStream {
            params,
            callback,
            sink: self.sink.clone(),
            paced: self.paced,
            active: Arc::new(AtomicBool::new(false)),
            stopped: true,
            worker: None,
        })
    }
}

/// Why the scheduler thread returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    /// Told to stop; the finish hook has not run.
    Halted,
    /// The callback completed the stream and the thread ran the finish hook.
    Completed,
}

struct Worker {
    stop_tx: Sender<()>,
    handle: JoinHandle<Exit>,
}

/// Output stream driven by a dedicated scheduler thread.
pub struct ClockedStream {
    params: StreamParams,
    callback: Arc<dyn StreamCallback>,
    sink: Arc<dyn BlockSink>,
    paced: bool,
    active: Arc<AtomicBool>,
    stopped: bool,
    worker: Option<Worker>,
}

impl ClockedStream {
    /// Stop the thread and run the finish hook unless the thread already did.
    fn halt(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            self.stopped = true;
            return Ok(());
        };

        // Fails only if the thread already returned.
        let _ = worker.stop_tx.send(());
        let exit = worker
            .handle
            .join()
            .map_err(|_| Error::Stream("Output thread panicked".to_string()))?;

        self.stopped = true;
        if exit == Exit::Halted {
            self.active.store(false, Ordering::Release);
            self.callback.finished();
        }
        Ok(())
    }
}

impl OutputStream for ClockedStream {
    fn start(&mut self) -> Result<()> {
        if !self.stopped {
            return Err(Error::Stream(
                "Stream must be stopped before it can start".to_string(),
            ));
        }

        let (stop_tx, stop_rx) = bounded(1);
        let params = self.params;
        let callback = self.callback.clone();
        let sink = self.sink.clone();
        let active = self.active.clone();
        let paced = self.paced;

        self.active.store(true, Ordering::Release);
        let handle = std::thread::Builder::new()
            .name("swanlake-output".to_string())
            .spawn(move || run(params, &*callback, &*sink, paced, &active, &stop_rx))
            .map_err(|e| {
                self.active.store(false, Ordering::Release);
                Error::Stream(format!("Failed to spawn output thread: {e}"))
            })?;

        self.worker = Some(Worker { stop_tx, handle });
        self.stopped = false;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.halt()
    }

    fn abort(&mut self) -> Result<()> {
        // Nothing is queued downstream of the sink, so abort drains like stop.
        self.halt()
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl Drop for ClockedStream {
    fn drop(&mut self) {
        if let Err(e) = self.halt() {
            error!("Failed to stop output stream: {e}");
        }
    }
}

fn run(
    params: StreamParams,
    callback: &dyn StreamCallback,
    sink: &dyn BlockSink,
    paced: bool,
    active: &AtomicBool,
    stop_rx: &Receiver<()>,
) -> Exit {
    let mut block = vec![0u8; params.block_bytes()];
    let period = params.block_duration();
    let mut deadline = Instant::now();
    let mut late = false;

    loop {
        match stop_rx.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => return Exit::Halted,
            Err(TryRecvError::Empty) => {}
        }

        let outcome = callback.fill_block(
            &mut block,
            CallbackFlags {
                output_underflow: late,
            },
        );
        sink.consume(&block);

        if outcome == BlockOutcome::Complete {
            trace!("Stream completed by callback");
            active.store(false, Ordering::Release);
            callback.finished();
            return Exit::Completed;
        }

        if !paced {
            continue;
        }

        deadline += period;
        let now = Instant::now();
        late = now > deadline;
        if late {
            // Resync instead of bursting to catch up.
            deadline = now;
            continue;
        }

        match stop_rx.recv_timeout(deadline - now) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return Exit::Halted,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use swanlake_core::SampleFormat;

    /// Writes the block number into every byte; completes after `limit` blocks.
    struct Counter {
        blocks: AtomicUsize,
        finished: AtomicUsize,
        limit: Option<usize>,
    }

    impl Counter {
        fn new(limit: Option<usize>) -> Arc<Self> {
            Arc::new(Self {
                blocks: AtomicUsize::new(0),
                finished: AtomicUsize::new(0),
                limit,
            })
        }
    }

    impl StreamCallback for Counter {
        fn fill_block(&self, out: &mut [u8], _flags: CallbackFlags) -> BlockOutcome {
            let n = self.blocks.fetch_add(1, Ordering::SeqCst) + 1;
            out.fill(n as u8);
            if self.limit.is_some_and(|limit| n >= limit) {
                BlockOutcome::Complete
            } else {
                BlockOutcome::Continue
            }
        }

        fn finished(&self) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn params() -> StreamParams {
        StreamParams {
            channels: 1,
            frame_rate: 8000,
            block_size: 8,
            sample_format: SampleFormat::I16,
        }
    }

    fn wait_until(condition: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_completion_runs_finish_hook_once() {
        let blocks = Arc::new(Mutex::new(Vec::new()));
        let sink_blocks = blocks.clone();
        let backend = ClockedBackend::unpaced(Arc::new(move |block: &[u8]| {
            sink_blocks.lock().push(block.to_vec());
        }));

        let counter = Counter::new(Some(3));
        let mut stream = backend.open(params(), counter.clone()).unwrap();
        assert!(stream.is_stopped());

        stream.start().unwrap();
        wait_until(|| !stream.is_active() && counter.finished.load(Ordering::SeqCst) == 1);

        // Completed but not reset: starting again is refused.
        assert!(!stream.is_stopped());
        assert!(stream.start().is_err());

        stream.stop().unwrap();
        assert!(stream.is_stopped());
        assert_eq!(counter.finished.load(Ordering::SeqCst), 1);

        let blocks = blocks.lock();
        assert_eq!(blocks.len(), 3);
        assert!(blocks.iter().all(|b| b.len() == 16));
        assert_eq!(blocks[2][0], 3);
    }

    #[test]
    fn test_stop_halts_paced_stream() {
        let backend = ClockedBackend::new(Arc::new(NullSink));
        let counter = Counter::new(None);
        let mut stream = backend.open(params(), counter.clone()).unwrap();

        stream.start().unwrap();
        wait_until(|| counter.blocks.load(Ordering::SeqCst) >= 2);
        stream.stop().unwrap();

        assert!(!stream.is_active());
        assert_eq!(counter.finished.load(Ordering::SeqCst), 1);

        let delivered = counter.blocks.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(counter.blocks.load(Ordering::SeqCst), delivered);

        // Stopping an inactive stream does not run the hook again.
        stream.stop().unwrap();
        assert_eq!(counter.finished.load(Ordering::SeqCst), 1);

        stream.start().unwrap();
        assert!(stream.is_active());
        stream.abort().unwrap();
        assert_eq!(counter.finished.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_rejects_empty_blocks() {
        let backend = ClockedBackend::new(Arc::new(NullSink));
        let params = StreamParams {
            block_size: 0,
            ..params()
        };
        assert!(backend.open(params, Counter::new(None)).is_err());
    }
}
