//! Calibration detection from observed heading diversity.
//!
//! A magnetometer is considered calibrated once the user has swept the device
//! through a wide arc several separate times (the familiar figure-eight
//! motion). The tracker keeps a rolling window of recent samples and, on a
//! fixed cadence, measures the arc they span.
//!
//! # Detection Flow
//!
//! ```text
//! observe(sample) → window (last 10 s) → check_calibration(now) every 2 s
//!                                              ↓
//!                               arc of samples since last event > 120°?
//!                                              ↓ yes
//!                                  diversity_event_count += 1
//!                                              ↓ reaches 3
//!                                       is_calibrated = true
//! ```
//!
//! Each diversity event only considers samples captured after the previous
//! event, so one long sweep that stays in the window is counted once.

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;

use super::HeadingSample;

const DEFAULT_WINDOW: Duration = Duration::from_secs(10);
const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_MIN_SAMPLES: usize = 20;
const DEFAULT_RANGE_THRESHOLD_DEG: f64 = 120.0;
const DEFAULT_REQUIRED_EVENTS: u32 = 3;

/// Tuning for [`CalibrationTracker`].
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationConfig {
    /// How much history the window keeps, relative to the newest sample.
    pub window: Duration,
    /// Minimum time between two diversity evaluations.
    pub check_interval: Duration,
    /// Samples required in the window before any evaluation.
    pub min_samples: usize,
    /// Arc (degrees) a sweep must exceed to count as a diversity event.
    pub range_threshold_deg: f64,
    /// Diversity events needed to certify calibration.
    pub required_events: u32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            check_interval: DEFAULT_CHECK_INTERVAL,
            min_samples: DEFAULT_MIN_SAMPLES,
            range_threshold_deg: DEFAULT_RANGE_THRESHOLD_DEG,
            required_events: DEFAULT_REQUIRED_EVENTS,
        }
    }
}

/// Snapshot of the tracker for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationState {
    pub is_calibrated: bool,
    pub diversity_event_count: u32,
    /// Buffered samples, oldest first.
    pub sample_window: Vec<HeadingSample>,
}

/// Rolling-window calibration detector.
///
/// Not thread-safe; owned by a single session.
#[derive(Debug, Clone)]
pub struct CalibrationTracker {
    samples: VecDeque<HeadingSample>,
    config: CalibrationConfig,

    /// Timestamp of the last evaluation that passed the cadence gate.
    last_check_ms: Option<u64>,

    /// Newest sample timestamp at the time of the last diversity event.
    last_event_ms: Option<u64>,

    diversity_event_count: u32,
    is_calibrated: bool,
}

impl Default for CalibrationTracker {
    fn default() -> Self {
        Self::new(CalibrationConfig::default())
    }
}

impl CalibrationTracker {
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            samples: VecDeque::with_capacity(config.min_samples * 4),
            config,
            last_check_ms: None,
            last_event_ms: None,
            diversity_event_count: 0,
            is_calibrated: false,
        }
    }

    /// Inserts a sample in timestamp order and prunes everything older than
    /// the window.
    ///
    /// A late sample already outside the window is dropped.
    pub fn observe(&mut self, sample: &HeadingSample) {
        let newest = self
            .samples
            .back()
            .map_or(sample.captured_at_ms, |last| {
                last.captured_at_ms.max(sample.captured_at_ms)
            });

        if sample.captured_at_ms < newest.saturating_sub(self.window_ms()) {
            tracing::trace!(
                at_ms = sample.captured_at_ms,
                newest_ms = newest,
                "Calibration: dropping sample older than the window"
            );
            return;
        }

        let at = self
            .samples
            .partition_point(|s| s.captured_at_ms <= sample.captured_at_ms);
        self.samples.insert(at, *sample);
        self.prune(newest);
    }

    /// Evaluates heading diversity if the cadence allows it.
    ///
    /// Returns the calibration status after the (possibly skipped)
    /// evaluation.
    pub fn check_calibration(&mut self, now_ms: u64) -> bool {
        if let Some(last) = self.last_check_ms {
            if now_ms.saturating_sub(last) < self.interval_ms() {
                return self.is_calibrated;
            }
        }

        if self.samples.len() < self.config.min_samples {
            return self.is_calibrated;
        }

        self.last_check_ms = Some(now_ms);

        if self.is_calibrated {
            return true;
        }

        let Some(range) = self.fresh_range() else {
            return false;
        };

        if range > self.config.range_threshold_deg {
            self.diversity_event_count += 1;
            self.last_event_ms = self.samples.back().map(|s| s.captured_at_ms);

            tracing::debug!(
                range = format!("{:.1}°", range),
                events = self.diversity_event_count,
                required = self.config.required_events,
                "Calibration: wide sweep observed"
            );

            if self.diversity_event_count >= self.config.required_events {
                self.is_calibrated = true;
                tracing::info!(
                    events = self.diversity_event_count,
                    "Calibration: heading diversity sufficient, compass calibrated"
                );
            }
        }

        self.is_calibrated
    }

    /// Marks the tracker calibrated regardless of observed diversity.
    pub fn force_calibrated(&mut self) {
        if !self.is_calibrated {
            tracing::info!(
                events = self.diversity_event_count,
                "Calibration: forced after timeout"
            );
        }
        self.is_calibrated = true;
    }

    /// Clears the window and all counters.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.last_check_ms = None;
        self.last_event_ms = None;
        self.diversity_event_count = 0;
        self.is_calibrated = false;
    }

    pub fn is_calibrated(&self) -> bool {
        self.is_calibrated
    }

    pub fn diversity_event_count(&self) -> u32 {
        self.diversity_event_count
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn state(&self) -> CalibrationState {
        CalibrationState {
            is_calibrated: self.is_calibrated,
            diversity_event_count: self.diversity_event_count,
            sample_window: self.samples.iter().copied().collect(),
        }
    }

    /// Arc spanned by samples newer than the last diversity event.
    ///
    /// `max - min`, folded to `360 - range` past 180° so a cluster straddling
    /// north reads as narrow.
    fn fresh_range(&self) -> Option<f64> {
        let cutoff = self.last_event_ms;
        let mut fresh = self
            .samples
            .iter()
            .filter(|s| cutoff.map_or(true, |c| s.captured_at_ms > c))
            .map(|s| s.heading_degrees);

        let first = fresh.next()?;
        let (min, max) = fresh.fold((first, first), |(lo, hi), h| (lo.min(h), hi.max(h)));

        let range = max - min;
        Some(if range > 180.0 { 360.0 - range } else { range })
    }

    fn prune(&mut self, newest_ms: u64) {
        let cutoff = newest_ms.saturating_sub(self.window_ms());
        while let Some(front) = self.samples.front() {
            if front.captured_at_ms < cutoff {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    fn window_ms(&self) -> u64 {
        self.config.window.as_millis() as u64
    }

    fn interval_ms(&self) -> u64 {
        self.config.check_interval.as_millis() as u64
    }
}
