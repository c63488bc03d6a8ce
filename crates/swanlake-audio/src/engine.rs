//! Playback engine: transport controls plus the real-time block fill.
//!
//! Lock discipline: one mutex covers the whole [`PlaybackState`]. The output
//! callback holds it for the duration of one block, so a seek from the control
//! side lands at the start of the next block and never tears one. Locks are
//! taken in the order stream → state → store, and the state lock is never held
//! while the stream is halted (halting runs the finish hook, which takes it).

use crate::frame_store::FrameStore;
use crate::output::{
    BlockOutcome, CallbackFlags, OutputBackend, OutputStream, StreamCallback, StreamParams,
};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::io::{Read, Seek};
use std::sync::Arc;
use std::time::Duration;
use swanlake_core::{
    AudioGeometry, Direction, EngineConfig, Error, PlaybackMode, PlaybackState, Result,
};
use tracing::{debug, error, info, warn};

/// Events beyond this many unread ones are dropped.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Events emitted by the playback engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// Transport mode changed.
    ModeChanged(PlaybackMode),
    /// Playback ran off one end and wrapped to the other.
    Looped,
    /// Playback ran out of frames; the stream is deactivating.
    EndOfStream,
    /// The output reported that a block arrived late.
    OutputUnderflow,
}

/// Frames to copy for one block and where playback continues afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockSpan {
    /// First frame of the window, in stored order.
    start: u64,
    /// Frames in the window.
    len: usize,
    /// Position after a fully satisfied block.
    next: u64,
}

impl BlockSpan {
    /// Plan the window for `requested` frames from `curframe`.
    ///
    /// Forward plays `[curframe, next)`. Reverse plays the frames preceding
    /// `curframe`, `[next, curframe)`, in stored order.
    fn plan(curframe: u64, requested: usize, direction: Direction, frame_count: u64) -> Self {
        let frame_count = i128::from(frame_count);
        let current = i128::from(curframe).min(frame_count);
        let raw_end = current + requested as i128 * i128::from(direction.step());

        let next = if (0..frame_count).contains(&raw_end) {
            raw_end
        } else if direction == Direction::Forward {
            frame_count
        } else {
            0
        };

        let (start, end) = match direction {
            Direction::Forward => (current, next),
            Direction::Reverse => (next, current),
        };

        Self {
            start: start as u64,
            len: (end - start) as usize,
            next: next as u64,
        }
    }
}

/// State and source shared with the output callback.
struct EngineCore<S> {
    state: Mutex<PlaybackState>,
    store: Mutex<FrameStore<S>>,
    frame_count: u64,
    frame_size: usize,
    event_tx: Sender<EngineEvent>,
}

impl<S: Read + Seek> EngineCore<S> {
    fn emit(&self, event: EngineEvent) {
        // A full channel means nobody is listening closely; never block on it.
        let _ = self.event_tx.try_send(event);
    }

    fn set_mode(&self, mode: PlaybackMode) {
        let previous = std::mem::replace(&mut self.state.lock().mode, mode);
        if previous != mode {
            debug!("Mode changed: {previous:?} -> {mode:?}");
            self.emit(EngineEvent::ModeChanged(mode));
        }
    }

    /// Reset to frame 0, stopped, keeping loop and direction.
    fn rewind(&self) {
        let previous = {
            let mut state = self.state.lock();
            let previous = state.mode;
            *state = state.rewound();
            previous
        };
        if previous != PlaybackMode::Stopped {
            self.emit(EngineEvent::ModeChanged(PlaybackMode::Stopped));
        }
    }

    fn next_block(&self, state: &mut PlaybackState, out: &mut [u8]) -> Result<BlockOutcome> {
        let requested = out.len() / self.frame_size;
        let span = BlockSpan::plan(state.curframe, requested, state.direction, self.frame_count);

        let copied = if span.len == 0 {
            0
        } else {
            let window = &mut out[..span.len * self.frame_size];
            let mut store = self.store.lock();
            if state.direction.is_reverse() && state.curframe < self.frame_count {
                store.jump(state.curframe)?;
                store.read_left_into(window)?
            } else {
                store.jump(span.start)?;
                store.read_into(window)?
            }
        };
        out[copied * self.frame_size..].fill(0);

        if copied == requested {
            state.curframe = span.next;
            return Ok(BlockOutcome::Continue);
        }

        if state.looping {
            state.curframe = match state.direction {
                Direction::Forward => 0,
                Direction::Reverse => self.frame_count.saturating_sub(1),
            };
            debug!("Looped to frame {}", state.curframe);
            self.emit(EngineEvent::Looped);
            Ok(BlockOutcome::Continue)
        } else {
            debug!("End of stream after {copied} of {requested} frames");
            self.emit(EngineEvent::EndOfStream);
            Ok(BlockOutcome::Complete)
        }
    }
}

impl<S: Read + Seek + Send> StreamCallback for EngineCore<S> {
    fn fill_block(&self, out: &mut [u8], flags: CallbackFlags) -> BlockOutcome {
        if flags.output_underflow {
            warn!("Output underflowing");
            self.emit(EngineEvent::OutputUnderflow);
        }

        let mut state = self.state.lock();
        match self.next_block(&mut state, out) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Failed to fill block at frame {}: {e}", state.curframe);
                out.fill(0);
                self.emit(EngineEvent::EndOfStream);
                BlockOutcome::Complete
            }
        }
    }

    fn finished(&self) {
        let paused = self.state.lock().mode == PlaybackMode::Paused;
        if paused {
            debug!("Stream halted while paused, keeping position");
        } else {
            self.rewind();
        }
    }
}

/// Plays a [`FrameStore`] through an output stream.
///
/// Transport methods take `&self` and may be called from any thread while the
/// output callback runs.
pub struct PlaybackEngine<S, O> {
    core: Arc<EngineCore<S>>,
    stream: Mutex<O>,
    geometry: AudioGeometry,
    framerate: u32,
    block_size: usize,
    event_rx: Receiver<EngineEvent>,
}

impl<S, O> PlaybackEngine<S, O>
where
    S: Read + Seek + Send + 'static,
    O: OutputStream,
{
    /// Create a stopped engine and open its output stream on `backend`.
    pub fn new<B>(store: FrameStore<S>, config: EngineConfig, backend: &B) -> Result<Self>
    where
        B: OutputBackend<Stream = O>,
    {
        config.validate()?;

        let geometry = *store.geometry();
        let framerate = config.framerate_override.unwrap_or(geometry.frame_rate());
        let (event_tx, event_rx) = bounded(EVENT_CHANNEL_CAPACITY);

        let core = Arc::new(EngineCore {
            state: Mutex::new(PlaybackState::new(
                Direction::from_reverse(config.reverse),
                config.looping,
            )),
            store: Mutex::new(store),
            frame_count: geometry.frame_count(),
            frame_size: geometry.frame_size(),
            event_tx,
        });

        let params = StreamParams {
            channels: geometry.channels(),
            frame_rate: framerate,
            block_size: config.block_size,
            sample_format: geometry.sample_format(),
        };
        let callback: Arc<dyn StreamCallback> = core.clone();
        let stream = backend.open(params, callback)?;

        info!(
            "Playback engine ready: {} frames at {framerate} Hz, {} frames per block",
            geometry.frame_count(),
            config.block_size
        );

        Ok(Self {
            core,
            stream: Mutex::new(stream),
            geometry,
            framerate,
            block_size: config.block_size,
            event_rx,
        })
    }

    /// Start or resume playback.
    ///
    /// From stopped in reverse, playback starts from the last frame.
    pub fn play(&self) -> Result<()> {
        let mut stream = self.stream.lock();
        let previous = self.core.state.lock().mode;

        if previous == PlaybackMode::Stopped {
            // A stream that completed on its own will not call back again
            // until it has been reset.
            stream.abort()?;
        }

        self.core.set_mode(PlaybackMode::Playing);
        if stream.is_stopped() {
            let curframe = self.curframe();
            if previous == PlaybackMode::Stopped && self.is_reverse() {
                self.jump_to_end()?;
            }
            if let Err(e) = stream.start() {
                self.core.state.lock().curframe = curframe;
                self.core.set_mode(previous);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Halt output, keeping position and direction.
    pub fn pause(&self) -> Result<()> {
        let mut stream = self.stream.lock();
        if stream.is_active() {
            self.core.set_mode(PlaybackMode::Paused);
            stream.stop()?;
        }
        Ok(())
    }

    /// Halt output.
    ///
    /// Only the mode changes here. Position and direction are reset by the
    /// finish hook when an active stream deactivates, so a stop on an idle
    /// stream keeps the current position.
    pub fn stop(&self) -> Result<()> {
        let mut stream = self.stream.lock();

        self.core.set_mode(PlaybackMode::Stopped);
        // Also resets a stream that completed on its own.
        stream.stop()
    }

    /// Jump to a time, `floor(seconds × framerate)`.
    pub fn jump(&self, seconds: f64) -> Result<()> {
        if !seconds.is_finite() {
            return Err(Error::InvalidArgument(format!(
                "cannot jump to {seconds} seconds"
            )));
        }

        let frame = (seconds * f64::from(self.framerate)).floor();
        if frame < 0.0 {
            return Err(Error::out_of_bounds(frame as i64, self.frame_count() + 1));
        }
        self.jump_to_frame(frame as u64)
    }

    /// Jump to a frame in `0..=frame_count`.
    pub fn jump_to_frame(&self, frame: u64) -> Result<()> {
        let frame_count = self.frame_count();
        if frame > frame_count {
            return Err(Error::out_of_bounds(frame, frame_count + 1));
        }

        self.core.state.lock().curframe = frame;
        debug!("Jumped to frame {frame}");
        Ok(())
    }

    pub fn jump_to_start(&self) -> Result<()> {
        self.jump_to_frame(0)
    }

    /// Jump to the last frame.
    pub fn jump_to_end(&self) -> Result<()> {
        self.jump_to_frame(self.frame_count().saturating_sub(1))
    }

    pub fn is_looping(&self) -> bool {
        self.core.state.lock().looping
    }

    pub fn set_loop(&self, looping: bool) {
        self.core.state.lock().looping = looping;
    }

    pub fn direction(&self) -> Direction {
        self.core.state.lock().direction
    }

    /// Set the direction from its step: `1` forward, `-1` reverse.
    ///
    /// Any other value is rejected and the direction is left unchanged.
    pub fn set_direction(&self, step: i64) -> Result<()> {
        let direction = Direction::try_from(step)?;
        self.core.state.lock().direction = direction;
        Ok(())
    }

    pub fn is_reverse(&self) -> bool {
        self.direction().is_reverse()
    }

    pub fn set_reverse(&self, reverse: bool) {
        self.core.state.lock().direction = Direction::from_reverse(reverse);
    }

    /// Turn looping off and play forward.
    pub fn reset_properties(&self) {
        let mut state = self.core.state.lock();
        state.looping = false;
        state.direction = Direction::Forward;
    }

    /// The playback frame rate.
    pub const fn framerate(&self) -> u32 {
        self.framerate
    }

    pub fn curframe(&self) -> u64 {
        self.core.state.lock().curframe
    }

    /// Current position as a time at the playback frame rate.
    pub fn position(&self) -> Duration {
        Duration::from_secs_f64(self.curframe() as f64 / f64::from(self.framerate))
    }

    pub fn mode(&self) -> PlaybackMode {
        self.core.state.lock().mode
    }

    /// A consistent copy of the whole transport state.
    pub fn state(&self) -> PlaybackState {
        *self.core.state.lock()
    }

    pub const fn geometry(&self) -> &AudioGeometry {
        &self.geometry
    }

    pub const fn frame_count(&self) -> u64 {
        self.geometry.frame_count()
    }

    /// Frames per output block.
    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    /// Try to receive an event without blocking.
    pub fn try_recv_event(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Wait up to `timeout` for an event.
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}
