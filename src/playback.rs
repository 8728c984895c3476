//! Timed playback over the predicted sequence.
//!
//! [`PlaybackScheduler`] is a pure state machine driven by `tick(now)`; it
//! advances the cursor at most once per interval regardless of how often it
//! is ticked. [`PlaybackTimer`] is the recurring driver: a background
//! thread that ticks at display cadence until stopped.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use crate::{NowcastError, NowcastResult};

pub const DEFAULT_ADVANCE_INTERVAL: Duration = Duration::from_millis(400);
/// Roughly one 60 Hz display frame.
pub const DEFAULT_REFRESH: Duration = Duration::from_millis(16);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct PlaybackState {
    pub playing: bool,
    pub cursor: usize,
}

#[derive(Clone, Debug)]
pub struct PlaybackScheduler {
    state: PlaybackState,
    interval: Duration,
    last_advance: Option<Instant>,
}

impl PlaybackScheduler {
    pub fn new(interval: Duration) -> NowcastResult<Self> {
        if interval.is_zero() {
            return Err(NowcastError::validation(
                "playback interval must be non-zero",
            ));
        }
        Ok(Self {
            state: PlaybackState::default(),
            interval,
            last_advance: None,
        })
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_playing(&self) -> bool {
        self.state.playing
    }

    pub fn cursor(&self) -> usize {
        self.state.cursor
    }

    /// Stopped -> Playing. The interval is measured from `now`.
    pub fn play(&mut self, now: Instant) {
        if !self.state.playing {
            self.state.playing = true;
            self.last_advance = Some(now);
        }
    }

    /// Playing -> Stopped. The cursor stays where it is.
    pub fn pause(&mut self) {
        self.state.playing = false;
        self.last_advance = None;
    }

    pub fn toggle(&mut self, now: Instant) {
        if self.state.playing {
            self.pause();
        } else {
            self.play(now);
        }
    }

    /// Stop and rewind to the first frame.
    pub fn reset(&mut self) {
        self.pause();
        self.state.cursor = 0;
    }

    pub fn rewind(&mut self) {
        self.state.cursor = 0;
    }

    /// Jump to `index`, clamped into `[0, len)`. Inert when `len == 0`.
    pub fn seek(&mut self, index: usize, len: usize) {
        if len > 0 {
            self.state.cursor = index.min(len - 1);
        }
    }

    /// Advance once if playing and at least one interval has elapsed since
    /// the last advance. Returns the new cursor when it moved.
    pub fn tick(&mut self, now: Instant, len: usize) -> Option<usize> {
        if !self.state.playing || len == 0 {
            return None;
        }
        match self.last_advance {
            Some(last) if now.saturating_duration_since(last) >= self.interval => {
                self.last_advance = Some(now);
                Some(self.advance(len))
            }
            Some(_) => None,
            None => {
                self.last_advance = Some(now);
                None
            }
        }
    }

    /// Unconditional single step, wrapping modulo `len`.
    pub fn advance(&mut self, len: usize) -> usize {
        if len == 0 {
            return self.state.cursor;
        }
        self.state.cursor = (self.state.cursor.min(len - 1) + 1) % len;
        self.state.cursor
    }
}

impl Default for PlaybackScheduler {
    fn default() -> Self {
        Self {
            state: PlaybackState::default(),
            interval: DEFAULT_ADVANCE_INTERVAL,
            last_advance: None,
        }
    }
}

/// Recurring per-frame callback on a background thread.
///
/// The timer only delivers instants; pausing a [`PlaybackScheduler`] leaves
/// the timer running, and its owner decides when to stop it.
///
/// [`PlaybackTimer::stop`] joins the thread before returning, so no
/// callback runs after it returns. Dropping the timer stops it too.
pub struct PlaybackTimer {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PlaybackTimer {
    pub fn spawn<F>(refresh: Duration, mut on_frame: F) -> NowcastResult<Self>
    where
        F: FnMut(Instant) + Send + 'static,
    {
        if refresh.is_zero() {
            return Err(NowcastError::validation("refresh period must be non-zero"));
        }
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name("nowcast-playback".to_string())
            .spawn(move || {
                while !flag.load(Ordering::Acquire) {
                    on_frame(Instant::now());
                    std::thread::sleep(refresh);
                }
            })
            .map_err(|e| NowcastError::validation(format!("spawn playback thread: {e}")))?;

        let refresh_ms = refresh.as_millis() as u64;
        tracing::debug!(refresh_ms, "playback timer started");
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("playback thread panicked");
            }
            tracing::debug!("playback timer stopped");
        }
    }
}

impl Drop for PlaybackTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
