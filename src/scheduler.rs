//! Debounced render scheduling
//!
//! The scheduler never owns a thread or a timer. It keeps a deadline that the
//! event loop polls: every view change re-arms the deadline, and once it
//! passes the loop runs exactly one render for the whole burst.
//!
//! ```text
//! idle ──request──▶ pending ──deadline──▶ rendering ──finish──▶ idle
//!                   ▲  │ request                │ request
//!                   └──┘ (reset deadline)       └──▶ pending after finish
//! ```

use std::time::{Duration, Instant};

use log::debug;

/// Default debounce delay between the last view change and the render pass.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    /// Nothing to do.
    Idle,
    /// A render is armed and will fire at `deadline`.
    Pending { deadline: Instant },
    /// A render pass is in flight. `rearm` records requests that arrived
    /// meanwhile; they start a new pending cycle when the pass finishes.
    Rendering { rearm: bool },
}

/// Coalesces bursts of view changes into single render passes.
#[derive(Debug)]
pub struct RenderScheduler {
    state: SchedulerState,
    delay: Duration,
    passes: u64,
    coalesced: u64,
}

impl Default for RenderScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl RenderScheduler {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            state: SchedulerState::Idle,
            delay,
            passes: 0,
            coalesced: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Number of render passes started so far.
    #[must_use]
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Number of requests that were folded into an already-armed render.
    #[must_use]
    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state == SchedulerState::Idle
    }

    /// Arm (or re-arm) the debounce deadline. Last request wins.
    pub fn request_render(&mut self, now: Instant) {
        match self.state {
            SchedulerState::Idle => {
                self.state = SchedulerState::Pending {
                    deadline: now + self.delay,
                };
            }
            SchedulerState::Pending { .. } => {
                self.coalesced += 1;
                self.state = SchedulerState::Pending {
                    deadline: now + self.delay,
                };
            }
            SchedulerState::Rendering { rearm } => {
                if rearm {
                    self.coalesced += 1;
                }
                self.state = SchedulerState::Rendering { rearm: true };
            }
        }
    }

    /// When the event loop should wake up next, if at all.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            SchedulerState::Pending { deadline } => Some(deadline),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        matches!(self.state, SchedulerState::Pending { deadline } if now >= deadline)
    }

    /// Move a due pending render into the rendering state.
    ///
    /// Returns `false` when nothing is due; the caller must then skip the pass.
    pub fn begin_render(&mut self, now: Instant) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.passes += 1;
        self.state = SchedulerState::Rendering { rearm: false };
        true
    }

    /// Close the current pass. Requests made during it start a fresh cycle.
    pub fn finish_render(&mut self, now: Instant) {
        self.state = match self.state {
            SchedulerState::Rendering { rearm: true } => {
                debug!("Render requested during pass, re-arming");
                SchedulerState::Pending {
                    deadline: now + self.delay,
                }
            }
            SchedulerState::Rendering { rearm: false } => SchedulerState::Idle,
            other => other,
        };
    }

    /// Run `render` if the deadline has passed. Returns `None` when not due.
    pub fn run_if_due<R>(&mut self, now: Instant, render: impl FnOnce() -> R) -> Option<R> {
        if !self.begin_render(now) {
            return None;
        }
        let result = render();
        self.finish_render(now);
        Some(result)
    }

    /// Abandon an armed render that has not started yet.
    pub fn cancel(&mut self) {
        if let SchedulerState::Pending { .. } = self.state {
            debug!("Dropping pending render");
            self.state = SchedulerState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn request_arms_deadline() {
        let t0 = Instant::now();
        let mut s = RenderScheduler::new(ms(20));
        assert!(s.is_idle());

        s.request_render(t0);
        assert_eq!(s.state(), SchedulerState::Pending { deadline: t0 + ms(20) });
        assert!(!s.is_due(t0 + ms(19)));
        assert!(s.is_due(t0 + ms(20)));
    }

    #[test]
    fn repeated_requests_reset_the_deadline() {
        let t0 = Instant::now();
        let mut s = RenderScheduler::new(ms(20));
        s.request_render(t0);
        s.request_render(t0 + ms(15));
        assert!(!s.begin_render(t0 + ms(25)));
        assert_eq!(s.next_deadline(), Some(t0 + ms(35)));
        assert_eq!(s.coalesced(), 1);
    }

    #[test]
    fn burst_produces_one_pass() {
        let t0 = Instant::now();
        let mut s = RenderScheduler::new(ms(10));
        for i in 0..10 {
            s.request_render(t0 + ms(i));
        }
        let mut rendered = 0;
        for tick in 0..40 {
            if s.run_if_due(t0 + ms(tick), || rendered += 1).is_some() {
                assert_eq!(tick, 19);
            }
        }
        assert_eq!(rendered, 1);
        assert_eq!(s.passes(), 1);
        assert!(s.is_idle());
    }

    #[test]
    fn request_during_render_defers_to_new_cycle() {
        let t0 = Instant::now();
        let mut s = RenderScheduler::new(ms(5));
        s.request_render(t0);
        assert!(s.begin_render(t0 + ms(5)));

        s.request_render(t0 + ms(6));
        assert_eq!(s.state(), SchedulerState::Rendering { rearm: true });

        s.finish_render(t0 + ms(8));
        assert_eq!(s.state(), SchedulerState::Pending { deadline: t0 + ms(13) });
    }

    #[test]
    fn cancel_drops_pending_but_not_inflight() {
        let t0 = Instant::now();
        let mut s = RenderScheduler::new(ms(5));
        s.request_render(t0);
        s.cancel();
        assert!(s.is_idle());
        assert!(s.run_if_due(t0 + ms(100), || ()).is_none());

        s.request_render(t0);
        assert!(s.begin_render(t0 + ms(5)));
        s.cancel();
        assert_eq!(s.state(), SchedulerState::Rendering { rearm: false });
    }
}
