//! Caller-driven output: every block is pumped explicitly.
//!
//! Useful for rendering offline and for stepping an engine block by block.

use super::{
    BlockOutcome, CallbackFlags, OutputBackend, OutputStream, StreamCallback, StreamParams,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use swanlake_core::{Error, Result};

struct Shared {
    params: StreamParams,
    callback: Arc<dyn StreamCallback>,
    active: AtomicBool,
    stopped: AtomicBool,
    /// Serializes pumps with stop/abort so a halt waits out a running block.
    gate: Mutex<()>,
}

impl Shared {
    fn halt(&self) {
        let _gate = self.gate.lock();
        self.stopped.store(true, Ordering::Release);
        if self.active.swap(false, Ordering::AcqRel) {
            self.callback.finished();
        }
    }
}

/// Backend whose blocks are produced by [`ManualBackend::pump`].
///
/// Clones share the most recently opened stream.
#[derive(Clone, Default)]
pub struct ManualBackend {
    stream: Arc<Mutex<Option<Arc<Shared>>>>,
}

impl ManualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one callback and return the block, or `None` if the stream is
    /// not active.
    pub fn pump(&self, flags: CallbackFlags) -> Option<Vec<u8>> {
        let shared = self.stream.lock().clone()?;
        let _gate = shared.gate.lock();
        if !shared.active.load(Ordering::Acquire) {
            return None;
        }

        let mut block = vec![0u8; shared.params.block_bytes()];
        if shared.callback.fill_block(&mut block, flags) == BlockOutcome::Complete
            && shared.active.swap(false, Ordering::AcqRel)
        {
            shared.callback.finished();
        }
        Some(block)
    }

    /// Pump until the stream deactivates or `max_blocks` were produced,
    /// concatenating the blocks.
    pub fn render(&self, max_blocks: usize) -> Vec<u8> {
        let mut rendered = Vec::new();
        for _ in 0..max_blocks {
            match self.pump(CallbackFlags::default()) {
                Some(block) => rendered.extend_from_slice(&block),
                None => break,
            }
        }
        rendered
    }

    pub fn is_active(&self) -> bool {
        self.stream
            .lock()
            .as_ref()
            .is_some_and(|shared| shared.active.load(Ordering::Acquire))
    }
}

impl OutputBackend for ManualBackend {
    type Stream = ManualStream;

    fn open(
        &self,
        params: StreamParams,
        callback: Arc<dyn StreamCallback>,
    ) -> Result<ManualStream> {
        if params.block_size == 0 {
            return Err(Error::Stream("Block size must be greater than 0".to_string()));
        }

        let shared = Arc::new(Shared {
            params,
            callback,
            active: AtomicBool::new(false),
            stopped: AtomicBool::new(true),
            gate: Mutex::new(()),
        });
        *self.stream.lock() = Some(shared.clone());
        Ok(ManualStream { shared })
    }
}

/// Control handle for a [`ManualBackend`] stream.
pub struct ManualStream {
    shared: Arc<Shared>,
}

impl OutputStream for ManualStream {
    fn start(&mut self) -> Result<()> {
        let _gate = self.shared.gate.lock();
        if !self.shared.stopped.load(Ordering::Acquire) {
            return Err(Error::Stream(
                "Stream must be stopped before it can start".to_string(),
            ));
        }
        self.shared.stopped.store(false, Ordering::Release);
        self.shared.active.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.shared.halt();
        Ok(())
    }

    fn abort(&mut self) -> Result<()> {
        self.shared.halt();
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::sync::atomic::AtomicUsize;
    use swanlake_core::SampleFormat;

    #[derive(Default)]
    struct Countdown {
        left: AtomicUsize,
        finished: AtomicUsize,
    }

    impl StreamCallback for Countdown {
        fn fill_block(&self, out: &mut [u8], _flags: CallbackFlags) -> BlockOutcome {
            out.fill(0xAA);
            if self.left.fetch_sub(1, Ordering::SeqCst) == 1 {
                BlockOutcome::Complete
            } else {
                BlockOutcome::Continue
            }
        }

        fn finished(&self) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn open(blocks: usize) -> (ManualBackend, ManualStream, Arc<Countdown>) {
        let backend = ManualBackend::new();
        let callback = Arc::new(Countdown {
            left: AtomicUsize::new(blocks),
            ..Countdown::default()
        });
        let params = StreamParams {
            channels: 2,
            frame_rate: 44100,
            block_size: 4,
            sample_format: SampleFormat::I8,
        };
        let stream = backend.open(params, callback.clone()).unwrap();
        (backend, stream, callback)
    }

    #[test]
    fn test_pump_requires_active_stream() {
        let (backend, mut stream, _) = open(10);
        assert!(backend.pump(CallbackFlags::default()).is_none());

        stream.start().unwrap();
        let block = backend.pump(CallbackFlags::default()).unwrap();
        assert_eq!(block, vec![0xAA; 8]);
    }

    #[test]
    fn test_render_until_complete() {
        let (backend, mut stream, callback) = open(3);
        stream.start().unwrap();

        assert_eq!(backend.render(10).len(), 24);
        assert!(!backend.is_active());
        assert!(!stream.is_stopped());
        assert_eq!(callback.finished.load(Ordering::SeqCst), 1);

        assert!(stream.start().is_err());
        stream.abort().unwrap();
        assert_eq!(callback.finished.load(Ordering::SeqCst), 1);
        stream.start().unwrap();
        assert!(stream.is_active());
    }

    #[test]
    fn test_stop_runs_finish_hook_when_active() {
        let (_backend, mut stream, callback) = open(10);
        stream.stop().unwrap();
        assert_eq!(callback.finished.load(Ordering::SeqCst), 0);

        stream.start().unwrap();
        stream.stop().unwrap();
        stream.stop().unwrap();
        assert_eq!(callback.finished.load(Ordering::SeqCst), 1);
        assert!(stream.is_stopped());
    }
}
