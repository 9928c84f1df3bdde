//! Stability-window debouncer.
//!
//! A raw change becomes a logical edge only once the input has held the new
//! state for the whole interval. A change that reverts inside the window is
//! dropped. The accepted edge carries the time the raw change began, so
//! press durations measure what the operator actually did.

use std::time::Duration;

use handmov_common::io::Edge;

/// A debounced logical edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Debounced {
    pub edge: Edge,
    pub at: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct Debouncer {
    interval: Duration,
    stable: bool,
    candidate: bool,
    since: Duration,
}

impl Debouncer {
    /// Starts released.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            stable: false,
            candidate: false,
            since: Duration::ZERO,
        }
    }

    /// Current debounced state.
    #[inline]
    pub fn is_pressed(&self) -> bool {
        self.stable
    }

    /// Record a raw transition at `at`.
    ///
    /// A pending change that has already been stable long enough is accepted
    /// first and returned.
    pub fn on_raw(&mut self, pressed: bool, at: Duration) -> Option<Debounced> {
        let accepted = self.poll(at);
        if pressed != self.candidate {
            self.candidate = pressed;
            self.since = at;
        }
        accepted
    }

    /// Accept the pending change if it has been stable for the interval.
    pub fn poll(&mut self, now: Duration) -> Option<Debounced> {
        if self.candidate == self.stable || now.saturating_sub(self.since) < self.interval {
            return None;
        }
        self.stable = self.candidate;
        Some(Debounced {
            edge: if self.stable {
                Edge::Pressed
            } else {
                Edge::Released
            },
            at: self.since,
        })
    }

    /// Sample-driven form: record then poll at the same instant.
    pub fn update(&mut self, pressed: bool, now: Duration) -> Option<Debounced> {
        self.on_raw(pressed, now).or_else(|| self.poll(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(50);

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn short_blip_produces_no_edges() {
        let mut d = Debouncer::new(INTERVAL);
        assert_eq!(d.update(true, ms(0)), None);
        assert_eq!(d.update(true, ms(30)), None);
        assert_eq!(d.update(false, ms(40)), None);
        for t in (40..400).step_by(5) {
            assert_eq!(d.update(false, ms(t)), None);
        }
        assert!(!d.is_pressed());
    }

    #[test]
    fn stable_press_accepted_with_start_time() {
        let mut d = Debouncer::new(INTERVAL);
        assert_eq!(d.update(true, ms(100)), None);
        assert_eq!(d.update(true, ms(149)), None);
        assert_eq!(
            d.update(true, ms(150)),
            Some(Debounced {
                edge: Edge::Pressed,
                at: ms(100)
            })
        );
        assert!(d.is_pressed());
        assert_eq!(d.update(true, ms(400)), None);
    }

    #[test]
    fn bounce_restarts_window() {
        let mut d = Debouncer::new(INTERVAL);
        d.update(true, ms(0));
        d.update(false, ms(10));
        d.update(true, ms(20));
        assert_eq!(d.poll(ms(60)), None);
        assert_eq!(d.poll(ms(70)).map(|e| e.at), Some(ms(20)));
    }

    #[test]
    fn event_form_accepts_pending_before_next_change() {
        let mut d = Debouncer::new(INTERVAL);
        assert_eq!(d.on_raw(true, ms(0)), None);
        // No poll in between: the release itself flushes the accepted press.
        let press = d.on_raw(false, ms(800)).unwrap();
        assert_eq!(press.edge, Edge::Pressed);
        assert_eq!(press.at, ms(0));
        let release = d.poll(ms(850)).unwrap();
        assert_eq!(release.edge, Edge::Released);
        assert_eq!(release.at, ms(800));
    }
}
