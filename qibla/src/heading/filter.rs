//! Circular-mean heading smoothing.

use std::collections::VecDeque;

use super::HeadingSample;
use crate::geo::normalize_degrees;

/// Default number of recent headings averaged together.
pub const DEFAULT_FILTER_CAPACITY: usize = 5;

/// Smooths headings with a circular mean over the most recent samples.
///
/// Headings wrap at 360°, so the arithmetic mean of 359° and 1° would be
/// 180°. Averaging the unit vectors instead gives the expected 0°.
///
/// # Example
///
/// ```
/// use qibla::heading::{HeadingFilter, HeadingSample, HeadingSource};
///
/// let mut filter = HeadingFilter::default();
/// for (i, h) in [359.0, 1.0, 0.0].into_iter().enumerate() {
///     let sample = HeadingSample::new(h, true, i as u64, HeadingSource::NativeCompass).unwrap();
///     filter.push(&sample);
/// }
/// let smoothed = filter.smoothed().unwrap();
/// assert!(smoothed < 0.01 || smoothed > 359.99);
/// ```
#[derive(Debug, Clone)]
pub struct HeadingFilter {
    /// Raw headings, oldest first.
    buffer: VecDeque<f64>,
    capacity: usize,
}

impl Default for HeadingFilter {
    fn default() -> Self {
        Self::new(DEFAULT_FILTER_CAPACITY)
    }
}

impl HeadingFilter {
    /// Creates a filter holding at most `capacity` headings (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Adds a sample and returns the smoothed heading.
    ///
    /// With a single buffered heading the raw value comes back unchanged.
    pub fn push(&mut self, sample: &HeadingSample) -> f64 {
        self.buffer.push_back(sample.heading_degrees);
        while self.buffer.len() > self.capacity {
            self.buffer.pop_front();
        }
        self.smoothed().unwrap_or(sample.heading_degrees)
    }

    /// Current smoothed heading, or `None` when empty.
    pub fn smoothed(&self) -> Option<f64> {
        match self.buffer.len() {
            0 => None,
            1 => self.buffer.front().copied(),
            n => {
                let (sin_sum, cos_sum) = self.buffer.iter().fold((0.0, 0.0), |(s, c), h| {
                    let rad = h.to_radians();
                    (s + rad.sin(), c + rad.cos())
                });
                let n = n as f64;
                Some(normalize_degrees(
                    (sin_sum / n).atan2(cos_sum / n).to_degrees(),
                ))
            }
        }
    }

    /// Drops all buffered headings.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
