//! Trailing-edge debounce as an explicit state machine.
//!
//! The owner polls [`Debounce::deadline`] to know when to wake and calls
//! [`Debounce::fire`] once it has. Every [`Debounce::schedule`] pushes the
//! deadline out by a full window, so a burst of signals fires once, one
//! window after the last signal.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Scheduled(Instant),
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct Debounce {
    window: Duration,
    state: DebounceState,
}

impl Debounce {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: DebounceState::Idle,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    /// (Re)start the timer. Returns the new deadline.
    pub fn schedule(&mut self, now: Instant) -> Instant {
        let deadline = now + self.window;
        self.state = DebounceState::Scheduled(deadline);
        deadline
    }

    /// Drop any pending deadline without firing.
    pub fn cancel(&mut self) {
        if matches!(self.state, DebounceState::Scheduled(_)) {
            self.state = DebounceState::Cancelled;
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            DebounceState::Scheduled(deadline) => Some(deadline),
            DebounceState::Idle | DebounceState::Cancelled => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline().is_some()
    }

    /// Consume the deadline if it has passed. Returns true exactly once per
    /// scheduled burst.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.state {
            DebounceState::Scheduled(deadline) if now >= deadline => {
                self.state = DebounceState::Idle;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn burst_fires_once_after_last_signal() {
        let window = Duration::from_millis(100);
        let mut debounce = Debounce::new(window);
        let mut fired = 0usize;

        for _ in 0..5 {
            debounce.schedule(Instant::now());
            advance(Duration::from_millis(40)).await;
            if debounce.fire(Instant::now()) {
                fired += 1;
            }
        }
        assert_eq!(fired, 0, "timer must restart on every signal");

        advance(Duration::from_millis(60)).await;
        assert!(debounce.fire(Instant::now()));
        assert!(!debounce.fire(Instant::now()), "fires once per burst");
        assert_eq!(debounce.state(), DebounceState::Idle);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn cancelled_timer_never_fires() {
        let mut debounce = Debounce::new(Duration::from_millis(10));
        debounce.schedule(Instant::now());
        debounce.cancel();
        advance(Duration::from_millis(50)).await;

        assert!(!debounce.fire(Instant::now()));
        assert_eq!(debounce.state(), DebounceState::Cancelled);
        assert_eq!(debounce.deadline(), None);

        debounce.schedule(Instant::now());
        assert!(debounce.is_pending());
    }

    #[test]
    fn cancel_on_idle_stays_idle() {
        let mut debounce = Debounce::new(Duration::from_millis(10));
        debounce.cancel();
        assert_eq!(debounce.state(), DebounceState::Idle);
    }
}
