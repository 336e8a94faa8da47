//! Time sources and frame scheduling for the render loop.
//!
//! Everything that depends on time (prime cooldown, prime-active decay,
//! particle lifetimes, rotation rates) reads elapsed real time from a
//! [`FrameClock`], never a frame counter.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
    time::{Duration, Instant},
};

/// Monotonic time source measured from an arbitrary origin.
pub trait FrameClock {
    fn now(&self) -> Duration;
}

/// Wall-clock time since the clock was created.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::start()
    }
}

impl FrameClock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock advanced explicitly by the host. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, delta: Duration) {
        self.now.set(self.now.get() + delta);
    }

    pub fn set(&self, now: Duration) {
        self.now.set(now);
    }
}

impl FrameClock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Identifies one requested display-refresh callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameToken(pub u64);

/// Host-side display refresh. The engine requests at most one frame at a
/// time and cancels it synchronously on pause or stop.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameToken;
    fn cancel_frame(&mut self, token: FrameToken);
}

#[derive(Debug, Default)]
struct QueueState {
    next_id: u64,
    pending: Option<FrameToken>,
    requested: u64,
    cancelled: u64,
}

/// Single-slot frame queue. The engine side requests and cancels through the
/// [`FrameScheduler`] impl while the host side clone takes pending tokens and
/// hands them back to the engine when the refresh fires.
#[derive(Debug, Clone, Default)]
pub struct FrameQueue {
    state: Rc<RefCell<QueueState>>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns the pending token, if any.
    pub fn take_pending(&self) -> Option<FrameToken> {
        self.state.borrow_mut().pending.take()
    }

    pub fn pending(&self) -> Option<FrameToken> {
        self.state.borrow().pending
    }

    pub fn requested(&self) -> u64 {
        self.state.borrow().requested
    }

    pub fn cancelled(&self) -> u64 {
        self.state.borrow().cancelled
    }
}

impl FrameScheduler for FrameQueue {
    fn request_frame(&mut self) -> FrameToken {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        state.requested += 1;
        let token = FrameToken(state.next_id);
        state.pending = Some(token);
        token
    }

    fn cancel_frame(&mut self, token: FrameToken) {
        let mut state = self.state.borrow_mut();
        if state.pending == Some(token) {
            state.pending = None;
            state.cancelled += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let shared = clock.clone();
        clock.advance(Duration::from_millis(250));
        assert_eq!(shared.now(), Duration::from_millis(250));
    }

    #[test]
    fn queue_holds_single_pending_frame() {
        let host = FrameQueue::new();
        let mut engine_side = host.clone();

        let first = engine_side.request_frame();
        let second = engine_side.request_frame();
        assert_ne!(first, second);
        assert_eq!(host.take_pending(), Some(second));
        assert_eq!(host.take_pending(), None);
    }

    #[test]
    fn cancel_only_clears_matching_token() {
        let host = FrameQueue::new();
        let mut engine_side = host.clone();

        let token = engine_side.request_frame();
        engine_side.cancel_frame(FrameToken(token.0 + 10));
        assert_eq!(host.pending(), Some(token));

        engine_side.cancel_frame(token);
        assert_eq!(host.pending(), None);
        assert_eq!(host.cancelled(), 1);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::start();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
