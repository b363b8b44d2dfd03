use tracing::{debug, info};

use crate::config::ConfigError;

/// Where the tracker sits within the current episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    /// No current run of positive frames.
    Idle,
    /// An unbroken run is building but has not reached the threshold.
    Accumulating,
    /// The run reached the threshold. Holds until `reset()`.
    Confirmed,
}

/// Emitted exactly once per episode, on the observation that completes the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    /// 1-based episode number, monotonic across resets.
    pub episode: u64,
}

/// Debounces the per-frame detection signal into confirmed episodes.
///
/// A confirmation fires iff `threshold` consecutive positive observations
/// arrive with no miss between them. A single miss zeroes the run; there is
/// no partial credit. After confirming, the tracker holds in `Confirmed`
/// (further observations are no-ops) until `reset()` re-arms it, so one
/// episode can never dispatch twice.
pub struct ConfirmationTracker {
    threshold: u32,
    consecutive_hits: u32,
    confirmed: bool,
    episodes: u64,
}

impl ConfirmationTracker {
    pub fn new(threshold: u32) -> Result<Self, ConfigError> {
        if threshold == 0 {
            return Err(ConfigError::Invalid(
                "confirm threshold must be at least 1".into(),
            ));
        }
        Ok(Self {
            threshold,
            consecutive_hits: 0,
            confirmed: false,
            episodes: 0,
        })
    }

    /// Feed one frame's detection signal. Returns `Some` exactly on the
    /// observation that completes the run, `None` everywhere else.
    pub fn observe(&mut self, hit: bool) -> Option<Confirmation> {
        if self.confirmed {
            return None;
        }

        if !hit {
            if self.consecutive_hits > 0 {
                debug!(run = self.consecutive_hits, "detection run broken");
            }
            self.consecutive_hits = 0;
            return None;
        }

        self.consecutive_hits += 1;
        debug!(
            consecutive_hits = self.consecutive_hits,
            threshold = self.threshold,
            "positive detection frame"
        );

        if self.consecutive_hits >= self.threshold {
            self.confirmed = true;
            self.episodes += 1;
            info!(
                episode = self.episodes,
                consecutive_hits = self.consecutive_hits,
                "ACCUMULATING→CONFIRMED: detection held across threshold"
            );
            return Some(Confirmation {
                episode: self.episodes,
            });
        }
        None
    }

    /// Re-arm after an alert attempt. Idempotent; a reset tracker behaves
    /// exactly like a freshly built one (episode numbering aside).
    pub fn reset(&mut self) {
        if self.confirmed {
            debug!(episode = self.episodes, "CONFIRMED→IDLE: tracker re-armed");
        }
        self.consecutive_hits = 0;
        self.confirmed = false;
    }

    pub fn state(&self) -> TrackerState {
        if self.confirmed {
            TrackerState::Confirmed
        } else if self.consecutive_hits > 0 {
            TrackerState::Accumulating
        } else {
            TrackerState::Idle
        }
    }

    pub fn consecutive_hits(&self) -> u32 {
        self.consecutive_hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(tracker: &mut ConfirmationTracker, signals: &[bool]) -> Vec<Option<Confirmation>> {
        signals.iter().map(|&s| tracker.observe(s)).collect()
    }

    #[test]
    fn confirms_on_final_hit_of_unbroken_run() {
        let mut tracker = ConfirmationTracker::new(3).unwrap();
        let out = feed(&mut tracker, &[true, true, true]);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert_eq!(out[2], Some(Confirmation { episode: 1 }));
        assert_eq!(tracker.state(), TrackerState::Confirmed);
    }

    #[test]
    fn single_miss_zeroes_the_run() {
        let mut tracker = ConfirmationTracker::new(3).unwrap();
        let out = feed(&mut tracker, &[true, true, false, true, true, true]);
        assert_eq!(
            out,
            vec![
                None,
                None,
                None,
                None,
                None,
                Some(Confirmation { episode: 1 })
            ]
        );
    }

    #[test]
    fn never_confirms_below_threshold() {
        let mut tracker = ConfirmationTracker::new(5).unwrap();
        let out = feed(&mut tracker, &[true, true, true, true]);
        assert!(out.iter().all(|o| o.is_none()));
        assert_eq!(tracker.state(), TrackerState::Accumulating);
        assert_eq!(tracker.consecutive_hits(), 4);
    }

    #[test]
    fn threshold_one_confirms_immediately() {
        let mut tracker = ConfirmationTracker::new(1).unwrap();
        assert_eq!(tracker.observe(true), Some(Confirmation { episode: 1 }));
    }

    #[test]
    fn zero_threshold_rejected() {
        assert!(ConfirmationTracker::new(0).is_err());
    }

    #[test]
    fn confirmed_holds_until_reset() {
        let mut tracker = ConfirmationTracker::new(2).unwrap();
        feed(&mut tracker, &[true, true]);
        assert_eq!(tracker.state(), TrackerState::Confirmed);
        // Neither extra hits nor misses can fire a second confirmation.
        let out = feed(&mut tracker, &[true, true, false, true, true]);
        assert!(out.iter().all(|o| o.is_none()));
        assert_eq!(tracker.state(), TrackerState::Confirmed);
    }

    #[test]
    fn reset_restores_fresh_behavior() {
        let mut tracker = ConfirmationTracker::new(3).unwrap();
        feed(&mut tracker, &[true, true, true]);
        tracker.reset();
        assert_eq!(tracker.state(), TrackerState::Idle);
        assert_eq!(tracker.consecutive_hits(), 0);

        let mut fresh = ConfirmationTracker::new(3).unwrap();
        let signals = [true, false, true, true, true];
        let reused: Vec<bool> = feed(&mut tracker, &signals)
            .iter()
            .map(|o| o.is_some())
            .collect();
        let baseline: Vec<bool> = feed(&mut fresh, &signals)
            .iter()
            .map(|o| o.is_some())
            .collect();
        assert_eq!(reused, baseline);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut tracker = ConfirmationTracker::new(3).unwrap();
        feed(&mut tracker, &[true, true, true]);
        tracker.reset();
        tracker.reset();
        assert_eq!(tracker.state(), TrackerState::Idle);
        assert_eq!(
            feed(&mut tracker, &[true, true, true])[2],
            Some(Confirmation { episode: 2 })
        );
    }

    #[test]
    fn reset_mid_accumulation_discards_progress() {
        let mut tracker = ConfirmationTracker::new(3).unwrap();
        feed(&mut tracker, &[true, true]);
        tracker.reset();
        let out = feed(&mut tracker, &[true, true, true]);
        assert_eq!(out[2], Some(Confirmation { episode: 1 }));
    }

    #[test]
    fn episode_numbers_are_monotonic() {
        let mut tracker = ConfirmationTracker::new(2).unwrap();
        for expected in 1..=3u64 {
            let out = feed(&mut tracker, &[true, true]);
            assert_eq!(out[1], Some(Confirmation { episode: expected }));
            tracker.reset();
        }
    }

    #[test]
    fn state_tracks_run_progress() {
        let mut tracker = ConfirmationTracker::new(3).unwrap();
        assert_eq!(tracker.state(), TrackerState::Idle);
        tracker.observe(true);
        assert_eq!(tracker.state(), TrackerState::Accumulating);
        tracker.observe(false);
        assert_eq!(tracker.state(), TrackerState::Idle);
    }

    // Exhaustive check of the debounce rule over every signal sequence up to
    // length 8: the tracker confirms at index i iff the `threshold` signals
    // ending at i are all positive and no earlier index qualified.
    #[test]
    fn confirmation_matches_consecutive_run_rule() {
        let threshold = 3u32;
        for len in 0..=8u32 {
            for bits in 0u32..(1 << len) {
                let signals: Vec<bool> = (0..len).map(|i| bits >> i & 1 == 1).collect();

                let mut tracker = ConfirmationTracker::new(threshold).unwrap();
                let mut confirmed_at = None;
                for (i, &s) in signals.iter().enumerate() {
                    if let Some(c) = tracker.observe(s) {
                        assert!(
                            confirmed_at.is_none(),
                            "second confirmation without reset for {signals:?}"
                        );
                        assert_eq!(c.episode, 1);
                        confirmed_at = Some(i);
                    }
                }

                let expected = (0..signals.len()).find(|&i| {
                    i + 1 >= threshold as usize
                        && signals[i + 1 - threshold as usize..=i].iter().all(|&b| b)
                });
                assert_eq!(confirmed_at, expected, "signals {signals:?}");
            }
        }
    }
}
