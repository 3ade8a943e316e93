//! Orientation platform seam.
//!
//! A host environment exposes orientation data through
//! [`OrientationPlatform`]: whether the capability exists, whether consent is
//! needed, and a stream of raw [`OrientationEvent`]s. Native compass
//! readings and generic orientation angles travel through the same event
//! type, so the session never branches on platform-specific event names.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::geo::normalize_degrees;
use crate::heading::{HeadingSample, HeadingSource};

/// What the host can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrientationCapability {
    /// No orientation data at all.
    Unsupported,
    /// Orientation data exists; some platforms gate it behind consent.
    Available { requires_permission: bool },
}

/// Result of asking the user for orientation access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionOutcome {
    Granted,
    Denied,
    /// The platform doesn't gate orientation behind consent.
    NotRequired,
    /// The request itself failed.
    Failed(String),
}

/// One raw orientation reading as delivered by the host.
///
/// A single event may carry both a native compass heading and a generic
/// `alpha` angle; the native heading wins when it's usable.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OrientationEvent {
    /// Platform-native compass heading in degrees, clockwise from magnetic north.
    pub compass_heading: Option<f64>,
    /// Device-orientation alpha angle in degrees, counter-clockwise.
    pub alpha: Option<f64>,
    /// Whether `alpha` is referenced to magnetic north.
    pub absolute: bool,
}

impl OrientationEvent {
    pub fn compass(heading: f64) -> Self {
        Self {
            compass_heading: Some(heading),
            alpha: None,
            absolute: true,
        }
    }

    pub fn alpha(alpha: f64, absolute: bool) -> Self {
        Self {
            compass_heading: None,
            alpha: Some(alpha),
            absolute,
        }
    }

    /// Converts the event into a heading sample, or `None` if it carries no
    /// usable reading.
    pub fn classify(&self, captured_at_ms: u64) -> Option<HeadingSample> {
        if let Some(heading) = self.compass_heading.filter(|h| h.is_finite()) {
            return HeadingSample::new(heading, true, captured_at_ms, HeadingSource::NativeCompass);
        }

        let alpha = self.alpha.filter(|a| a.is_finite())?;
        HeadingSample::new(
            normalize_degrees(360.0 - alpha),
            self.absolute,
            captured_at_ms,
            HeadingSource::Orientation,
        )
    }
}

/// Error parsing a textual orientation event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid orientation event '{0}' (expected 'compass <deg>', 'alpha <deg> [absolute]' or 'skip')")]
pub struct ParseEventError(pub String);

impl FromStr for OrientationEvent {
    type Err = ParseEventError;

    /// Parses `compass <deg>`, `alpha <deg> [absolute]`, or `skip`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseEventError(s.trim().to_string());
        let mut parts = s.split_whitespace();

        let kind = parts.next().ok_or_else(err)?;
        let event = match kind.to_ascii_lowercase().as_str() {
            "skip" | "null" => OrientationEvent::default(),
            "compass" => {
                let heading = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
                OrientationEvent::compass(heading)
            }
            "alpha" => {
                let alpha = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
                let absolute = match parts.next() {
                    None => false,
                    Some(flag) if flag.eq_ignore_ascii_case("absolute") => true,
                    Some(_) => return Err(err()),
                };
                OrientationEvent::alpha(alpha, absolute)
            }
            _ => return Err(err()),
        };

        if parts.next().is_some() {
            return Err(err());
        }
        Ok(event)
    }
}

/// A host environment that can supply orientation events.
pub trait OrientationPlatform: Send + 'static {
    fn capability(&self) -> OrientationCapability;

    /// Asks for consent. Only called when the capability requires it.
    fn request_permission(&mut self) -> BoxFuture<'_, PermissionOutcome>;

    /// Starts delivering events.
    fn subscribe(&mut self) -> mpsc::Receiver<OrientationEvent>;

    /// Stops delivering events.
    fn unsubscribe(&mut self);
}

/// Platform fed from an in-process channel.
///
/// Adapters (a stdin reader, a test script, a bridge from another runtime)
/// push events through the paired sender.
pub struct ChannelPlatform {
    capability: OrientationCapability,
    permission: PermissionOutcome,
    receiver: Option<mpsc::Receiver<OrientationEvent>>,
    subscribed: Arc<AtomicBool>,
}

impl ChannelPlatform {
    /// Creates a platform that needs no permission, plus its event sender.
    pub fn new(buffer: usize) -> (Self, mpsc::Sender<OrientationEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let platform = Self {
            capability: OrientationCapability::Available {
                requires_permission: false,
            },
            permission: PermissionOutcome::NotRequired,
            receiver: Some(rx),
            subscribed: Arc::new(AtomicBool::new(false)),
        };
        (platform, tx)
    }

    pub fn with_capability(mut self, capability: OrientationCapability) -> Self {
        self.capability = capability;
        self
    }

    /// Sets the outcome returned by the permission prompt.
    pub fn with_permission(mut self, outcome: PermissionOutcome) -> Self {
        self.permission = outcome;
        self
    }

    /// Shared flag reflecting the subscription state.
    pub fn subscription_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.subscribed)
    }
}

impl OrientationPlatform for ChannelPlatform {
    fn capability(&self) -> OrientationCapability {
        self.capability
    }

    fn request_permission(&mut self) -> BoxFuture<'_, PermissionOutcome> {
        let outcome = self.permission.clone();
        Box::pin(async move { outcome })
    }

    fn subscribe(&mut self) -> mpsc::Receiver<OrientationEvent> {
        self.subscribed.store(true, Ordering::SeqCst);
        match self.receiver.take() {
            Some(rx) => rx,
            None => {
                // Already handed out: return a stream that's closed from the start
                let (_, rx) = mpsc::channel(1);
                rx
            }
        }
    }

    fn unsubscribe(&mut self) {
        self.subscribed.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_compass_preferred() {
        let event = OrientationEvent {
            compass_heading: Some(42.0),
            alpha: Some(100.0),
            absolute: false,
        };
        let sample = event.classify(7).unwrap();
        assert_eq!(sample.heading_degrees, 42.0);
        assert!(sample.is_absolute);
        assert_eq!(sample.source, HeadingSource::NativeCompass);
        assert_eq!(sample.captured_at_ms, 7);
    }

    #[test]
    fn test_alpha_converted_to_heading() {
        let sample = OrientationEvent::alpha(90.0, true).classify(0).unwrap();
        assert!((sample.heading_degrees - 270.0).abs() < 1e-9);
        assert!(sample.is_absolute);
        assert_eq!(sample.source, HeadingSource::Orientation);

        let sample = OrientationEvent::alpha(0.0, false).classify(0).unwrap();
        assert_eq!(sample.heading_degrees, 0.0);
        assert!(!sample.is_absolute);
    }

    #[test]
    fn test_nan_compass_falls_back_to_alpha() {
        let event = OrientationEvent {
            compass_heading: Some(f64::NAN),
            alpha: Some(350.0),
            absolute: true,
        };
        let sample = event.classify(0).unwrap();
        assert!((sample.heading_degrees - 10.0).abs() < 1e-9);
        assert_eq!(sample.source, HeadingSource::Orientation);
    }

    #[test]
    fn test_empty_event_dropped() {
        assert!(OrientationEvent::default().classify(0).is_none());
        assert!(OrientationEvent::alpha(f64::NAN, true).classify(0).is_none());
    }

    #[test]
    fn test_parse_events() {
        assert_eq!(
            "compass 123.5".parse::<OrientationEvent>().unwrap(),
            OrientationEvent::compass(123.5)
        );
        assert_eq!(
            "alpha 200 absolute".parse::<OrientationEvent>().unwrap(),
            OrientationEvent::alpha(200.0, true)
        );
        assert_eq!(
            "ALPHA 15".parse::<OrientationEvent>().unwrap(),
            OrientationEvent::alpha(15.0, false)
        );
        assert_eq!(
            "skip".parse::<OrientationEvent>().unwrap(),
            OrientationEvent::default()
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for line in ["", "compass", "compass north", "alpha 10 relative", "gyro 3", "compass 1 2"] {
            assert!(line.parse::<OrientationEvent>().is_err(), "accepted '{}'", line);
        }
    }

    #[tokio::test]
    async fn test_channel_platform_delivers_events() {
        let (mut platform, tx) = ChannelPlatform::new(4);
        let flag = platform.subscription_flag();

        let mut rx = platform.subscribe();
        assert!(flag.load(Ordering::SeqCst));

        tx.send(OrientationEvent::compass(5.0)).await.unwrap();
        assert_eq!(rx.recv().await, Some(OrientationEvent::compass(5.0)));

        platform.unsubscribe();
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_second_subscription_is_closed() {
        let (mut platform, _tx) = ChannelPlatform::new(4);
        let _first = platform.subscribe();
        let mut second = platform.subscribe();
        assert_eq!(second.recv().await, None);
    }

    #[tokio::test]
    async fn test_permission_outcome_returned() {
        let (platform, _tx) = ChannelPlatform::new(1);
        let mut platform = platform.with_permission(PermissionOutcome::Denied);
        assert_eq!(platform.request_permission().await, PermissionOutcome::Denied);
    }
}
