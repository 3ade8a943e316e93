//! Synchronous heading session state machine.
//!
//! [`HeadingSession`] owns the filter, the calibration tracker, and the
//! observer/target geometry. It never touches a clock or a runtime: callers
//! pass timestamps in, and the async runner drives it from a single task.

use crate::declination::DeclinationRecord;
use crate::geo::{bearing_to, distance_km, normalize_degrees, GeoPoint};
use crate::heading::{CalibrationState, CalibrationTracker, HeadingFilter, HeadingSample};

use super::platform::{OrientationCapability, OrientationEvent, PermissionOutcome};
use super::state::{AccuracyLabel, LifecyclePhase, SessionState, UnavailableReason};
use super::{SessionConfig, SessionError};

/// One compass session from start to stop.
#[derive(Debug)]
pub struct HeadingSession {
    config: SessionConfig,
    filter: HeadingFilter,
    tracker: CalibrationTracker,
    phase: LifecyclePhase,

    observer: Option<GeoPoint>,
    target: Option<GeoPoint>,
    target_bearing: Option<f64>,
    distance_km: Option<f64>,
    declination: Option<DeclinationRecord>,

    last_sample: Option<HeadingSample>,
    smoothed: Option<f64>,

    /// Bumped on every recalibration and on stop; forced-calibration
    /// deadlines carry the epoch they were armed for.
    epoch: u64,

    state: SessionState,
}

impl HeadingSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            filter: HeadingFilter::new(config.filter_capacity),
            tracker: CalibrationTracker::new(config.calibration.clone()),
            config,
            phase: LifecyclePhase::Idle,
            observer: None,
            target: None,
            target_bearing: None,
            distance_km: None,
            declination: None,
            last_sample: None,
            smoothed: None,
            epoch: 0,
            state: SessionState::default(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    /// The latest published state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn observer(&self) -> Option<GeoPoint> {
        self.observer
    }

    pub fn target(&self) -> Option<GeoPoint> {
        self.target
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn calibration(&self) -> CalibrationState {
        self.tracker.state()
    }

    /// Starts the session for an observer and target.
    ///
    /// Computes bearing and distance immediately. Moves to
    /// `RequestingPermission`, or straight to `Unavailable(NotSupported)`
    /// when the platform has no orientation capability.
    pub fn start(
        &mut self,
        observer: GeoPoint,
        target: GeoPoint,
        capability: OrientationCapability,
    ) -> Result<LifecyclePhase, SessionError> {
        if self.phase != LifecyclePhase::Idle {
            return Err(SessionError::InvalidTransition {
                action: "start",
                phase: self.phase,
            });
        }

        let observer = GeoPoint::new(observer.latitude, observer.longitude)?;
        let target = GeoPoint::new(target.latitude, target.longitude)?;

        self.observer = Some(observer);
        self.target = Some(target);
        self.update_geometry();

        tracing::info!(
            observer = %observer,
            target = %target,
            bearing = format!("{:.1}°", self.target_bearing.unwrap_or_default()),
            distance_km = format!("{:.1}", self.distance_km.unwrap_or_default()),
            "Heading session started"
        );

        match capability {
            OrientationCapability::Unsupported => {
                tracing::warn!("Orientation not supported on this platform");
                self.transition(LifecyclePhase::Unavailable(UnavailableReason::NotSupported));
            }
            OrientationCapability::Available { .. } => {
                self.transition(LifecyclePhase::RequestingPermission);
            }
        }

        self.recompute();
        Ok(self.phase)
    }

    /// Applies the result of the permission prompt.
    pub fn resolve_permission(
        &mut self,
        outcome: PermissionOutcome,
    ) -> Result<LifecyclePhase, SessionError> {
        if self.phase != LifecyclePhase::RequestingPermission {
            return Err(SessionError::InvalidTransition {
                action: "resolve permission",
                phase: self.phase,
            });
        }

        let next = match outcome {
            PermissionOutcome::Granted | PermissionOutcome::NotRequired => {
                LifecyclePhase::Listening
            }
            PermissionOutcome::Denied => {
                tracing::warn!("Orientation permission denied");
                LifecyclePhase::Unavailable(UnavailableReason::PermissionDenied)
            }
            PermissionOutcome::Failed(reason) => {
                tracing::error!(reason = %reason, "Orientation permission request failed");
                LifecyclePhase::Unavailable(UnavailableReason::Error)
            }
        };

        self.transition(next);
        self.recompute();
        Ok(self.phase)
    }

    /// Feeds one raw event. Returns `true` if the published state changed.
    ///
    /// Events outside `Listening` and events without a usable reading are
    /// dropped without touching the filter or the tracker.
    pub fn handle_event(&mut self, event: &OrientationEvent, captured_at_ms: u64) -> bool {
        if self.phase != LifecyclePhase::Listening {
            return false;
        }

        let Some(sample) = event.classify(captured_at_ms) else {
            tracing::trace!(at_ms = captured_at_ms, "Dropping orientation event without a reading");
            return false;
        };

        self.smoothed = Some(self.filter.push(&sample));
        self.tracker.observe(&sample);
        self.tracker.check_calibration(captured_at_ms);
        self.last_sample = Some(sample);

        self.recompute()
    }

    /// Applies a resolved declination.
    ///
    /// Discarded once the session is terminal, or when the record was
    /// resolved for a location the observer has since left.
    pub fn apply_declination(&mut self, record: DeclinationRecord) -> bool {
        if self.phase.is_terminal() || self.phase == LifecyclePhase::Idle {
            tracing::debug!(phase = %self.phase, "Discarding declination for inactive session");
            return false;
        }

        let Some(observer) = self.observer else {
            return false;
        };

        if !record.applies_to(&observer, self.config.observer_epsilon_km) {
            tracing::debug!(
                resolved_for = %record.for_location,
                observer = %observer,
                "Discarding declination resolved for a stale location"
            );
            return false;
        }

        tracing::debug!(
            degrees = format!("{:.2}°", record.degrees),
            source = %record.source,
            "Declination applied"
        );
        self.declination = Some(record);
        self.recompute()
    }

    /// Moves the observer. Returns `true` if it moved far enough to matter,
    /// in which case the caller should resolve declination again.
    pub fn update_observer(&mut self, observer: GeoPoint) -> Result<bool, SessionError> {
        if self.phase.is_terminal() || self.phase == LifecyclePhase::Idle {
            return Err(SessionError::InvalidTransition {
                action: "update observer",
                phase: self.phase,
            });
        }

        let observer = GeoPoint::new(observer.latitude, observer.longitude)?;

        if let Some(current) = self.observer {
            if distance_km(&current, &observer) <= self.config.observer_epsilon_km {
                return Ok(false);
            }
        }

        tracing::info!(observer = %observer, "Observer moved");
        self.observer = Some(observer);
        self.update_geometry();
        self.recompute();
        Ok(true)
    }

    /// Restarts calibration detection.
    ///
    /// Clears the tracker and the filter and returns the new epoch, which the
    /// caller arms the forced-calibration deadline with.
    pub fn recalibrate(&mut self) -> Result<u64, SessionError> {
        if self.phase != LifecyclePhase::Listening {
            return Err(SessionError::InvalidTransition {
                action: "recalibrate",
                phase: self.phase,
            });
        }

        self.tracker.reset();
        self.filter.reset();
        self.epoch += 1;

        tracing::info!(epoch = self.epoch, "Recalibration requested");
        self.recompute();
        Ok(self.epoch)
    }

    /// Forces calibration when the deadline for `epoch` expires.
    ///
    /// A deadline from an earlier epoch is ignored, so a stale timer can
    /// never certify a session that has since been recalibrated or stopped.
    pub fn force_calibration(&mut self, epoch: u64) -> bool {
        if self.phase != LifecyclePhase::Listening || epoch != self.epoch {
            tracing::debug!(
                epoch,
                current = self.epoch,
                phase = %self.phase,
                "Ignoring stale forced-calibration deadline"
            );
            return false;
        }

        self.tracker.force_calibrated();
        self.recompute()
    }

    /// Marks the session unavailable after a platform failure.
    pub fn fail(&mut self, reason: UnavailableReason) -> LifecyclePhase {
        if !self.phase.is_terminal() {
            self.transition(LifecyclePhase::Unavailable(reason));
            self.epoch += 1;
            self.recompute();
        }
        self.phase
    }

    /// Stops the session. Idempotent; terminal phases are left alone.
    pub fn stop(&mut self) -> LifecyclePhase {
        if !self.phase.is_terminal() {
            self.transition(LifecyclePhase::Stopped);
            self.epoch += 1;
            self.recompute();
        }
        self.phase
    }

    fn transition(&mut self, next: LifecyclePhase) {
        if self.phase != next {
            tracing::debug!(from = %self.phase, to = %next, "Session phase change");
            self.phase = next;
        }
    }

    fn update_geometry(&mut self) {
        if let (Some(observer), Some(target)) = (self.observer, self.target) {
            self.target_bearing = Some(bearing_to(&observer, &target));
            self.distance_km = Some(distance_km(&observer, &target));
        }
    }

    /// Rebuilds the published state; returns `true` if it changed.
    fn recompute(&mut self) -> bool {
        let declination_deg = self.declination.map_or(0.0, |d| d.degrees);
        let true_heading = self.smoothed.map(|s| normalize_degrees(s + declination_deg));
        let relative_bearing = match (self.target_bearing, true_heading) {
            (Some(target), Some(heading)) => Some(normalize_degrees(target - heading + 360.0)),
            _ => None,
        };

        let tolerance = self.config.alignment_tolerance_deg;
        let aligned = relative_bearing.is_some_and(|r| r <= tolerance || r >= 360.0 - tolerance);

        let source = self.last_sample.map(|s| s.source);
        let is_absolute = self.last_sample.is_some_and(|s| s.is_absolute);
        let calibrated = self.tracker.is_calibrated();

        let next = SessionState {
            phase: self.phase,
            accuracy: AccuracyLabel::derive(self.phase, source, is_absolute, calibrated),
            calibrated,
            smoothed_heading: self.smoothed,
            true_heading,
            relative_bearing,
            target_bearing: self.target_bearing,
            distance_km: self.distance_km,
            declination: self.declination,
            aligned,
            source,
            last_sample_at_ms: self.last_sample.map(|s| s.captured_at_ms),
        };

        if next == self.state {
            return false;
        }
        self.state = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declination::DeclinationSource;
    use crate::geo::KAABA;

    const AVAILABLE: OrientationCapability = OrientationCapability::Available {
        requires_permission: true,
    };

    fn observer() -> GeoPoint {
        GeoPoint::new(21.0, 39.0).unwrap()
    }

    fn listening() -> HeadingSession {
        let mut session = HeadingSession::new(SessionConfig::default());
        session.start(observer(), KAABA, AVAILABLE).unwrap();
        session.resolve_permission(PermissionOutcome::Granted).unwrap();
        session
    }

    fn record(degrees: f64, at: GeoPoint) -> DeclinationRecord {
        DeclinationRecord {
            degrees,
            source: DeclinationSource::Measured,
            for_location: at,
        }
    }

    #[test]
    fn test_start_computes_geometry() {
        let mut session = HeadingSession::new(SessionConfig::default());
        let phase = session.start(observer(), KAABA, AVAILABLE).unwrap();

        assert_eq!(phase, LifecyclePhase::RequestingPermission);
        let state = session.state();
        assert!((state.target_bearing.unwrap() - 61.105).abs() < 0.01);
        assert!((state.distance_km.unwrap() - 97.684).abs() < 0.01);
        assert_eq!(state.accuracy, AccuracyLabel::Initializing);
    }

    #[test]
    fn test_start_unsupported() {
        let mut session = HeadingSession::new(SessionConfig::default());
        let phase = session
            .start(observer(), KAABA, OrientationCapability::Unsupported)
            .unwrap();
        assert_eq!(phase, LifecyclePhase::Unavailable(UnavailableReason::NotSupported));
        assert_eq!(session.state().accuracy, AccuracyLabel::NotSupported);
    }

    #[test]
    fn test_start_rejects_invalid_location() {
        let mut session = HeadingSession::new(SessionConfig::default());
        let bogus = GeoPoint {
            latitude: 91.0,
            longitude: 0.0,
        };
        assert!(matches!(
            session.start(bogus, KAABA, AVAILABLE),
            Err(SessionError::InvalidLocation(_))
        ));
        assert_eq!(session.phase(), LifecyclePhase::Idle);
    }

    #[test]
    fn test_start_twice_rejected() {
        let mut session = listening();
        assert!(matches!(
            session.start(observer(), KAABA, AVAILABLE),
            Err(SessionError::InvalidTransition { action: "start", .. })
        ));
    }

    #[test]
    fn test_permission_outcomes() {
        for (outcome, expected) in [
            (PermissionOutcome::Granted, LifecyclePhase::Listening),
            (PermissionOutcome::NotRequired, LifecyclePhase::Listening),
            (
                PermissionOutcome::Denied,
                LifecyclePhase::Unavailable(UnavailableReason::PermissionDenied),
            ),
            (
                PermissionOutcome::Failed("prompt dismissed".to_string()),
                LifecyclePhase::Unavailable(UnavailableReason::Error),
            ),
        ] {
            let mut session = HeadingSession::new(SessionConfig::default());
            session.start(observer(), KAABA, AVAILABLE).unwrap();
            assert_eq!(session.resolve_permission(outcome).unwrap(), expected);
        }
    }

    #[test]
    fn test_denied_session_ignores_events() {
        let mut session = HeadingSession::new(SessionConfig::default());
        session.start(observer(), KAABA, AVAILABLE).unwrap();
        session.resolve_permission(PermissionOutcome::Denied).unwrap();

        assert!(!session.handle_event(&OrientationEvent::compass(90.0), 0));
        assert_eq!(session.state().accuracy, AccuracyLabel::PermissionDenied);
        assert!(session.state().smoothed_heading.is_none());
    }

    #[test]
    fn test_native_compass_reading() {
        let mut session = listening();
        assert!(session.handle_event(&OrientationEvent::compass(61.105), 0));

        let state = session.state();
        assert_eq!(state.accuracy, AccuracyLabel::PlatformAbsolute);
        // No declination yet: true heading equals smoothed heading
        assert_eq!(state.true_heading, state.smoothed_heading);
        assert!(state.relative_bearing.unwrap() < 0.01 || state.relative_bearing.unwrap() > 359.99);
        assert!(state.aligned);
    }

    #[test]
    fn test_invalid_event_leaves_state_alone() {
        let mut session = listening();
        session.handle_event(&OrientationEvent::compass(100.0), 0);
        let before = session.state().clone();

        assert!(!session.handle_event(&OrientationEvent::default(), 100));
        assert!(!session.handle_event(&OrientationEvent::alpha(f64::NAN, true), 200));
        assert_eq!(session.state(), &before);
        assert_eq!(session.calibration().sample_window.len(), 1);
    }

    #[test]
    fn test_declination_shifts_true_heading() {
        let mut session = listening();
        session.handle_event(&OrientationEvent::compass(50.0), 0);
        assert!(session.apply_declination(record(3.0, observer())));

        let state = session.state();
        assert!((state.smoothed_heading.unwrap() - 50.0).abs() < 1e-9);
        assert!((state.true_heading.unwrap() - 53.0).abs() < 1e-9);
        let expected = normalize_degrees(state.target_bearing.unwrap() - 53.0 + 360.0);
        assert!((state.relative_bearing.unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_true_heading_wraps() {
        let mut session = listening();
        session.handle_event(&OrientationEvent::compass(358.0), 0);
        session.apply_declination(record(5.0, observer()));
        assert!((session.state().true_heading.unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_declination_for_other_location_discarded() {
        let mut session = listening();
        let elsewhere = GeoPoint::new(40.0, -74.0).unwrap();
        assert!(!session.apply_declination(record(-13.0, elsewhere)));
        assert!(session.state().declination.is_none());
    }

    #[test]
    fn test_declination_after_stop_discarded() {
        let mut session = listening();
        session.stop();
        assert!(!session.apply_declination(record(3.0, observer())));
        assert!(session.state().declination.is_none());
    }

    #[test]
    fn test_orientation_needs_calibration_then_forced() {
        let mut session = listening();
        session.handle_event(&OrientationEvent::alpha(90.0, true), 0);
        assert_eq!(session.state().accuracy, AccuracyLabel::NeedsCalibration);

        let epoch = session.recalibrate().unwrap();
        assert!(session.force_calibration(epoch));
        assert_eq!(session.state().accuracy, AccuracyLabel::Absolute);
        assert!(session.state().calibrated);
    }

    #[test]
    fn test_relative_orientation_label() {
        let mut session = listening();
        session.handle_event(&OrientationEvent::alpha(90.0, false), 0);
        let epoch = session.epoch();
        session.force_calibration(epoch);
        assert_eq!(session.state().accuracy, AccuracyLabel::Relative);
    }

    #[test]
    fn test_stale_epoch_ignored() {
        let mut session = listening();
        session.handle_event(&OrientationEvent::alpha(90.0, true), 0);

        let first = session.recalibrate().unwrap();
        let second = session.recalibrate().unwrap();
        assert_ne!(first, second);

        assert!(!session.force_calibration(first));
        assert!(!session.state().calibrated);
        assert!(session.force_calibration(second));
    }

    #[test]
    fn test_sweeps_calibrate_orientation_source() {
        let mut session = listening();
        // Three wide sweeps from 350° down to 200°, 100 ms apart
        for k in 0..3u64 {
            for i in 0..20u64 {
                let alpha = 10.0 + 150.0 * i as f64 / 19.0;
                session.handle_event(&OrientationEvent::alpha(alpha, true), k * 2_000 + i * 100);
            }
        }
        assert!(session.state().calibrated);
        assert_eq!(session.state().accuracy, AccuracyLabel::Absolute);
    }

    #[test]
    fn test_recalibrate_resets_tracker() {
        let mut session = listening();
        session.handle_event(&OrientationEvent::alpha(90.0, true), 0);
        let epoch = session.epoch();
        session.force_calibration(epoch);
        assert!(session.state().calibrated);

        session.recalibrate().unwrap();
        assert!(!session.state().calibrated);
        assert_eq!(session.calibration().sample_window.len(), 0);
        assert_eq!(session.state().accuracy, AccuracyLabel::NeedsCalibration);
    }

    #[test]
    fn test_recalibrate_requires_listening() {
        let mut session = HeadingSession::new(SessionConfig::default());
        assert!(session.recalibrate().is_err());
        session.start(observer(), KAABA, AVAILABLE).unwrap();
        assert!(session.recalibrate().is_err());
    }

    #[test]
    fn test_update_observer_within_epsilon() {
        let mut session = listening();
        // ~50 m away
        let nearby = GeoPoint::new(21.00045, 39.0).unwrap();
        assert!(!session.update_observer(nearby).unwrap());
        assert_eq!(session.observer(), Some(observer()));
    }

    #[test]
    fn test_update_observer_moves_geometry() {
        let mut session = listening();
        session.apply_declination(record(3.0, observer()));
        let london = GeoPoint::new(51.5074, -0.1278).unwrap();

        assert!(session.update_observer(london).unwrap());
        let state = session.state();
        assert!((state.target_bearing.unwrap() - 118.987).abs() < 0.01);
        assert!((state.distance_km.unwrap() - 4793.8).abs() < 1.0);
        // Old declination stays until a fresh one arrives
        assert_eq!(state.declination.unwrap().degrees, 3.0);

        // A late record for the previous location no longer applies
        assert!(!session.apply_declination(record(4.0, observer())));
        assert!(session.apply_declination(record(1.2, london)));
    }

    #[test]
    fn test_update_observer_after_stop_rejected() {
        let mut session = listening();
        session.stop();
        assert!(session.update_observer(observer()).is_err());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut session = listening();
        let epoch = session.epoch();
        assert_eq!(session.stop(), LifecyclePhase::Stopped);
        assert_eq!(session.stop(), LifecyclePhase::Stopped);
        assert!(session.epoch() > epoch);
        assert!(!session.force_calibration(epoch));
    }

    #[test]
    fn test_stop_keeps_unavailable() {
        let mut session = HeadingSession::new(SessionConfig::default());
        session.start(observer(), KAABA, AVAILABLE).unwrap();
        session.resolve_permission(PermissionOutcome::Denied).unwrap();
        assert_eq!(
            session.stop(),
            LifecyclePhase::Unavailable(UnavailableReason::PermissionDenied)
        );
    }

    #[test]
    fn test_fail_marks_error() {
        let mut session = listening();
        session.handle_event(&OrientationEvent::compass(10.0), 0);
        assert_eq!(
            session.fail(UnavailableReason::Error),
            LifecyclePhase::Unavailable(UnavailableReason::Error)
        );
        assert_eq!(session.state().accuracy, AccuracyLabel::Error);
    }

    #[test]
    fn test_alignment_tolerance() {
        let mut session = listening();
        let bearing = session.state().target_bearing.unwrap();

        session.handle_event(&OrientationEvent::compass(bearing + 9.0), 0);
        assert!(session.state().aligned);

        let mut session = listening();
        session.handle_event(&OrientationEvent::compass(bearing + 30.0), 0);
        assert!(!session.state().aligned);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_relative_bearing_in_range(
                headings in prop::collection::vec(-720.0..720.0_f64, 1..50),
                declination in -30.0..30.0_f64,
                lat in -89.0..89.0_f64,
                lon in -179.0..179.0_f64,
            ) {
                let mut session = HeadingSession::new(SessionConfig::default());
                let observer = GeoPoint::new(lat, lon).unwrap();
                session.start(observer, KAABA, AVAILABLE).unwrap();
                session.resolve_permission(PermissionOutcome::Granted).unwrap();
                session.apply_declination(record(declination, observer));

                for (i, h) in headings.iter().enumerate() {
                    session.handle_event(&OrientationEvent::compass(*h), i as u64 * 50);
                    let state = session.state();
                    let relative = state.relative_bearing.unwrap();
                    let true_heading = state.true_heading.unwrap();
                    prop_assert!((0.0..360.0).contains(&relative));
                    prop_assert!((0.0..360.0).contains(&true_heading));

                    let expected = normalize_degrees(state.smoothed_heading.unwrap() + declination);
                    let diff = crate::geo::angular_difference(true_heading, expected);
                    prop_assert!(diff < 1e-6);
                }
            }
        }
    }
}
