//! Burst timing for the lightning effect.
//!
//! A [`Storm`] decides, frame by frame, how bright the lightning flash should
//! be. Bursts fire at randomized intervals, last roughly a second, and
//! sometimes repeat once in quick succession to mimic the double-flash
//! character of real lightning. The machine is pure timing logic: callers feed
//! it elapsed time and read back an intensity, so it can be driven and tested
//! without a GPU.

use std::time::Duration;

use rand::prelude::*;

#[derive(Debug, thiserror::Error)]
pub enum TuningError {
    #[error("burst duration range is inverted ({min:?} > {max:?})")]
    InvertedDuration { min: Duration, max: Duration },
    #[error("burst gap range is inverted ({min:?} > {max:?})")]
    InvertedGap { min: Duration, max: Duration },
    #[error("second-burst delay range is inverted ({min:?} > {max:?})")]
    InvertedSecondDelay { min: Duration, max: Duration },
    #[error("minimum burst duration must be greater than zero")]
    ZeroDuration,
    #[error("double-burst chance {0} is outside [0, 1]")]
    ChanceOutOfRange(f32),
    #[error("intensity gain {0} must be greater than zero")]
    NonPositiveGain(f32),
}

/// Timing bounds and shaping constants for burst generation.
///
/// The defaults reproduce the tuned feel of the effect: ~1s bursts every
/// 5-13 seconds, with a 40% chance of a quick follow-up flash.
#[derive(Debug, Clone, PartialEq)]
pub struct BurstTuning {
    /// Shortest sampled burst duration.
    pub min_duration: Duration,
    /// Longest sampled burst duration.
    pub max_duration: Duration,
    /// Shortest delay between independent bursts, measured from trigger time.
    pub min_gap: Duration,
    /// Longest delay between independent bursts.
    pub max_gap: Duration,
    /// Shortest delay between a burst's end and its companion flash.
    pub second_min_delay: Duration,
    /// Longest companion-flash delay.
    pub second_max_delay: Duration,
    /// Probability that a burst is followed by a companion flash.
    pub double_chance: f32,
    /// Peak intensity multiplier applied to the eased curve.
    pub gain: f32,
}

impl Default for BurstTuning {
    fn default() -> Self {
        Self {
            min_duration: Duration::from_millis(880),
            max_duration: Duration::from_millis(1030),
            min_gap: Duration::from_millis(5000),
            max_gap: Duration::from_millis(13000),
            second_min_delay: Duration::from_millis(100),
            second_max_delay: Duration::from_millis(250),
            double_chance: 0.4,
            gain: 1.2,
        }
    }
}

impl BurstTuning {
    pub fn validate(&self) -> Result<(), TuningError> {
        if self.min_duration.is_zero() {
            return Err(TuningError::ZeroDuration);
        }
        if self.min_duration > self.max_duration {
            return Err(TuningError::InvertedDuration {
                min: self.min_duration,
                max: self.max_duration,
            });
        }
        if self.min_gap > self.max_gap {
            return Err(TuningError::InvertedGap {
                min: self.min_gap,
                max: self.max_gap,
            });
        }
        if self.second_min_delay > self.second_max_delay {
            return Err(TuningError::InvertedSecondDelay {
                min: self.second_min_delay,
                max: self.second_max_delay,
            });
        }
        if !(0.0..=1.0).contains(&self.double_chance) {
            return Err(TuningError::ChanceOutOfRange(self.double_chance));
        }
        if self.gain <= 0.0 {
            return Err(TuningError::NonPositiveGain(self.gain));
        }
        Ok(())
    }
}

/// Where the machine currently is in its burst cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstPhase {
    /// No flash active; waiting for the next scheduled burst.
    Idle,
    /// A burst is running and intensity follows the ease curve.
    Bursting,
    /// A burst just ended and its companion flash is pending.
    WaitingForSecondBurst,
}

/// Symmetric cubic ease: accelerating `4p^3` below the midpoint, decelerating
/// `1 - (-2p + 2)^3 / 2` above it. Input is clamped to [0, 1]; the two
/// branches meet at 0.5 so the curve has no jump at the midpoint.
pub fn ease_in_out_cubic(p: f32) -> f32 {
    let p = p.clamp(0.0, 1.0);
    if p < 0.5 {
        4.0 * p * p * p
    } else {
        1.0 - (-2.0 * p + 2.0).powi(3) / 2.0
    }
}

/// Randomized burst state machine.
///
/// Time is supplied by the caller as a [`Duration`] since the effect started,
/// which keeps the machine deterministic under test. Frames are strictly
/// sequential, so a plain `&mut self` advance is all the coordination needed.
pub struct Storm {
    tuning: BurstTuning,
    rng: StdRng,
    phase: BurstPhase,
    burst_start: Duration,
    burst_duration: Duration,
    double_eligible: bool,
    second_burst_at: Duration,
    next_burst_at: Duration,
    cursor: Duration,
}

impl Storm {
    /// Creates a machine with a fixed RNG seed. The first burst is scheduled
    /// one full gap interval after start, as if a burst had just ended.
    pub fn new(tuning: BurstTuning, seed: u64) -> Result<Self, TuningError> {
        Self::with_rng(tuning, StdRng::seed_from_u64(seed))
    }

    /// Creates a machine seeded from the OS entropy source.
    pub fn from_entropy(tuning: BurstTuning) -> Result<Self, TuningError> {
        Self::with_rng(tuning, StdRng::from_entropy())
    }

    fn with_rng(tuning: BurstTuning, mut rng: StdRng) -> Result<Self, TuningError> {
        tuning.validate()?;
        let first = sample_between(&mut rng, tuning.min_gap, tuning.max_gap);
        let floor = tuning.min_duration;
        Ok(Self {
            tuning,
            rng,
            phase: BurstPhase::Idle,
            burst_start: Duration::ZERO,
            burst_duration: floor,
            double_eligible: false,
            second_burst_at: Duration::ZERO,
            next_burst_at: first,
            cursor: Duration::ZERO,
        })
    }

    pub fn phase(&self) -> BurstPhase {
        self.phase
    }

    /// Start time of the next independent burst, relative to effect start.
    pub fn next_burst_at(&self) -> Duration {
        self.next_burst_at
    }

    /// Advances the machine to `now` and returns the intensity for this frame.
    ///
    /// The returned value is 0 outside an active burst and never exceeds the
    /// configured gain.
    pub fn advance(&mut self, now: Duration) -> f32 {
        self.cursor = now;
        match self.phase {
            BurstPhase::Idle => {
                if now >= self.next_burst_at {
                    let double = self.rng.gen::<f32>() < self.tuning.double_chance;
                    self.trigger(now, double);
                    self.intensity_at(now)
                } else {
                    0.0
                }
            }
            BurstPhase::Bursting => {
                let elapsed = now.saturating_sub(self.burst_start);
                if elapsed >= self.burst_duration {
                    self.finish_burst();
                    0.0
                } else {
                    self.intensity_at(now)
                }
            }
            BurstPhase::WaitingForSecondBurst => {
                if now >= self.second_burst_at {
                    // Companion flashes never chain a third burst.
                    self.trigger(now, false);
                    self.intensity_at(now)
                } else {
                    0.0
                }
            }
        }
    }

    /// Advances to `target` in small fixed steps from the last seen
    /// timestamp. A burst only accumulates progress across calls, so a
    /// single jump over a burst window would trigger it at `target` with
    /// zero elapsed time and report darkness; stepping replays the skipped
    /// interval instead, so a timestamp landing mid-burst reads back the
    /// mid-burst intensity. Returns the intensity at `target`.
    pub fn advance_to(&mut self, target: Duration) -> f32 {
        const STEP: Duration = Duration::from_millis(16);
        let mut t = self.cursor + STEP;
        while t < target {
            self.advance(t);
            t += STEP;
        }
        self.advance(target)
    }

    fn trigger(&mut self, now: Duration, double_eligible: bool) {
        self.phase = BurstPhase::Bursting;
        self.burst_start = now;
        self.burst_duration =
            sample_between(&mut self.rng, self.tuning.min_duration, self.tuning.max_duration);
        self.double_eligible = double_eligible;
        if !double_eligible {
            // Double-eligible bursts defer scheduling to their companion.
            self.next_burst_at =
                now + sample_between(&mut self.rng, self.tuning.min_gap, self.tuning.max_gap);
        }
    }

    fn finish_burst(&mut self) {
        if self.double_eligible {
            self.phase = BurstPhase::WaitingForSecondBurst;
            let delay = sample_between(
                &mut self.rng,
                self.tuning.second_min_delay,
                self.tuning.second_max_delay,
            );
            self.second_burst_at = self.burst_start + self.burst_duration + delay;
        } else {
            self.phase = BurstPhase::Idle;
        }
    }

    fn intensity_at(&self, now: Duration) -> f32 {
        if self.phase != BurstPhase::Bursting {
            return 0.0;
        }
        let elapsed = now.saturating_sub(self.burst_start);
        let progress = elapsed.as_secs_f32() / self.burst_duration.as_secs_f32();
        ease_in_out_cubic(progress) * self.tuning.gain
    }
}

fn sample_between(rng: &mut StdRng, min: Duration, max: Duration) -> Duration {
    if min >= max {
        return min;
    }
    Duration::from_nanos(rng.gen_range(min.as_nanos() as u64..=max.as_nanos() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn millis(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn ease_curve_hits_endpoints() {
        assert!((ease_in_out_cubic(0.0) - 0.0).abs() < 1e-6);
        assert!((ease_in_out_cubic(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn ease_curve_is_continuous_at_midpoint() {
        let below = ease_in_out_cubic(0.5 - 1e-4);
        let above = ease_in_out_cubic(0.5 + 1e-4);
        assert!((below - above).abs() < 1e-3);
        assert!((ease_in_out_cubic(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn ease_curve_clamps_out_of_range_input() {
        assert_eq!(ease_in_out_cubic(-1.0), 0.0);
        assert!((ease_in_out_cubic(2.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn idle_frames_before_first_burst_are_dark() {
        let mut storm = Storm::new(BurstTuning::default(), 7).unwrap();
        let first = storm.next_burst_at();
        assert!(first >= millis(5000) && first <= millis(13000));
        let mut t = Duration::ZERO;
        while t + millis(16) < first {
            assert_eq!(storm.advance(t), 0.0);
            assert_eq!(storm.phase(), BurstPhase::Idle);
            t += millis(16);
        }
    }

    #[test]
    fn single_burst_returns_to_idle_and_reschedules() {
        let mut storm = Storm::new(BurstTuning::default(), 1).unwrap();
        let trigger_at = millis(6000);
        storm.trigger(trigger_at, false);
        assert_eq!(storm.phase(), BurstPhase::Bursting);
        assert!(storm.burst_duration >= millis(880) && storm.burst_duration <= millis(1030));

        let gap = storm.next_burst_at() - trigger_at;
        assert!(gap >= millis(5000) && gap <= millis(13000));

        let end = trigger_at + storm.burst_duration;
        assert_eq!(storm.advance(end), 0.0);
        assert_eq!(storm.phase(), BurstPhase::Idle);
    }

    #[test]
    fn double_burst_waits_then_flashes_again() {
        let mut storm = Storm::new(BurstTuning::default(), 3).unwrap();
        let trigger_at = millis(6000);
        storm.trigger(trigger_at, true);
        let first_end = trigger_at + storm.burst_duration;

        assert_eq!(storm.advance(first_end), 0.0);
        assert_eq!(storm.phase(), BurstPhase::WaitingForSecondBurst);
        let companion_delay = storm.second_burst_at - first_end;
        assert!(companion_delay >= millis(100) && companion_delay <= millis(250));

        // Still dark while waiting for the companion.
        assert_eq!(storm.advance(first_end + millis(50)), 0.0);

        let second_start = storm.second_burst_at;
        storm.advance(second_start);
        assert_eq!(storm.phase(), BurstPhase::Bursting);
        assert!(!storm.double_eligible);
        let gap = storm.next_burst_at() - second_start;
        assert!(gap >= millis(5000) && gap <= millis(13000));

        let second_end = second_start + storm.burst_duration;
        assert_eq!(storm.advance(second_end), 0.0);
        assert_eq!(storm.phase(), BurstPhase::Idle);
    }

    #[test]
    fn intensity_stays_within_gain_bound() {
        for seed in 0..32 {
            let mut storm = Storm::new(BurstTuning::default(), seed).unwrap();
            let mut t = Duration::ZERO;
            while t < Duration::from_secs(60) {
                let intensity = storm.advance(t);
                assert!(
                    (0.0..=1.2 + 1e-5).contains(&intensity),
                    "seed {seed}: intensity {intensity} out of range at {t:?}"
                );
                if storm.phase() != BurstPhase::Bursting {
                    assert_eq!(intensity, 0.0);
                }
                t += millis(7);
            }
        }
    }

    #[test]
    fn sampled_durations_stay_within_bounds() {
        for seed in 0..64 {
            let mut storm = Storm::new(BurstTuning::default(), seed).unwrap();
            let mut t = Duration::ZERO;
            let mut seen = 0;
            while t < Duration::from_secs(120) && seen < 6 {
                let was_idle = storm.phase() != BurstPhase::Bursting;
                storm.advance(t);
                if was_idle && storm.phase() == BurstPhase::Bursting {
                    assert!(
                        storm.burst_duration >= millis(880)
                            && storm.burst_duration <= millis(1030),
                        "seed {seed}: duration {:?}",
                        storm.burst_duration
                    );
                    seen += 1;
                }
                t += millis(16);
            }
            assert!(seen > 0, "seed {seed} never burst");
        }
    }

    #[test]
    fn burst_peak_reaches_gain_before_ending() {
        let mut storm = Storm::new(BurstTuning::default(), 5).unwrap();
        storm.trigger(Duration::ZERO, false);
        let near_end = storm.burst_duration - Duration::from_micros(1);
        let intensity = storm.advance(near_end);
        assert!(intensity > 1.19, "peak intensity {intensity} too low");
    }

    #[test]
    fn jump_to_mid_burst_timestamp_replays_the_burst() {
        for seed in 0..16 {
            let mut storm = Storm::new(BurstTuning::default(), seed).unwrap();
            // 440ms past the trigger is inside any burst: shorter than the
            // minimum duration, long enough for the ease to climb.
            let target = storm.next_burst_at() + millis(440);
            let intensity = storm.advance_to(target);
            assert_eq!(storm.phase(), BurstPhase::Bursting);
            assert!(
                intensity > 0.1,
                "seed {seed}: intensity {intensity} at {target:?}"
            );
        }
    }

    #[test]
    fn single_jump_advance_misses_the_burst_interior() {
        // Baseline for the catch-up path: one big advance starts a due burst
        // at the jump target, so the sampled frame reads zero progress.
        let mut storm = Storm::new(BurstTuning::default(), 9).unwrap();
        let target = storm.next_burst_at() + millis(440);
        assert_eq!(storm.advance(target), 0.0);
    }

    #[test]
    fn repeated_advance_to_same_timestamp_is_stable() {
        let mut storm = Storm::new(BurstTuning::default(), 9).unwrap();
        let target = storm.next_burst_at() + millis(440);
        let first = storm.advance_to(target);
        let second = storm.advance_to(target);
        assert!(first > 0.0);
        assert_eq!(first, second);
    }

    #[test]
    fn degenerate_equal_range_is_allowed() {
        let tuning = BurstTuning {
            min_duration: millis(900),
            max_duration: millis(900),
            ..BurstTuning::default()
        };
        let mut storm = Storm::new(tuning, 0).unwrap();
        storm.trigger(Duration::ZERO, false);
        assert_eq!(storm.burst_duration, millis(900));
    }

    #[test]
    fn invalid_tunings_are_rejected() {
        let inverted = BurstTuning {
            min_duration: millis(2000),
            max_duration: millis(1000),
            ..BurstTuning::default()
        };
        assert!(matches!(
            Storm::new(inverted, 0),
            Err(TuningError::InvertedDuration { .. })
        ));

        let bad_chance = BurstTuning {
            double_chance: 1.5,
            ..BurstTuning::default()
        };
        assert!(matches!(
            Storm::new(bad_chance, 0),
            Err(TuningError::ChanceOutOfRange(_))
        ));

        let bad_gain = BurstTuning {
            gain: 0.0,
            ..BurstTuning::default()
        };
        assert!(matches!(
            Storm::new(bad_gain, 0),
            Err(TuningError::NonPositiveGain(_))
        ));

        let zero = BurstTuning {
            min_duration: Duration::ZERO,
            ..BurstTuning::default()
        };
        assert!(matches!(Storm::new(zero, 0), Err(TuningError::ZeroDuration)));
    }

    #[test]
    fn double_chance_of_one_always_doubles() {
        let tuning = BurstTuning {
            double_chance: 1.0,
            ..BurstTuning::default()
        };
        let mut storm = Storm::new(tuning, 11).unwrap();
        let start = storm.next_burst_at();
        storm.advance(start);
        assert_eq!(storm.phase(), BurstPhase::Bursting);
        assert!(storm.double_eligible);
    }
}
