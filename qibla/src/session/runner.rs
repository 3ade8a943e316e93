//! Async driver for a [`HeadingSession`].
//!
//! The runner is a self-driving task that owns the session and is the only
//! code that ever touches it, so samples are processed strictly in arrival
//! order. Callers interact through a cheap-to-clone [`SessionHandle`].
//!
//! # Task Layout
//!
//! ```text
//! spawn_session()
//!     │
//!     ├─ start() + permission prompt
//!     │
//!     └─ select! loop ──┬─ cancellation token  → stop
//!                       ├─ commands            → recalibrate / move observer / forced deadline
//!                       ├─ declination results → apply (stale ones discarded)
//!                       └─ orientation events  → filter, tracker, publish
//! ```
//!
//! State is published through a `watch` channel after every change.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::declination::{AsyncHttpClient, DeclinationProvider, DeclinationRecord};
use crate::geo::GeoPoint;

use super::machine::HeadingSession;
use super::platform::{OrientationCapability, OrientationPlatform, PermissionOutcome};
use super::state::{LifecyclePhase, SessionState, UnavailableReason};
use super::timer::ForcedCalibrationTimer;
use super::{SessionConfig, SessionError};

/// Requests delivered to the runner task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionCommand {
    Recalibrate,
    UpdateObserver(GeoPoint),
    /// Sent by the forced-calibration deadline.
    ForceCalibration { epoch: u64 },
}

/// Handle to a running session.
///
/// Dropping every handle does not stop the session; call [`stop`](Self::stop).
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    state: watch::Receiver<SessionState>,
    cancellation: CancellationToken,
}

impl SessionHandle {
    /// Snapshot of the latest published state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// A receiver that's notified on every published change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Asks the session to recalibrate. Returns `false` once the runner has
    /// exited.
    pub fn recalibrate(&self) -> bool {
        self.commands.send(SessionCommand::Recalibrate).is_ok()
    }

    /// Reports a new observer location.
    pub fn update_observer(&self, observer: GeoPoint) -> bool {
        self.commands
            .send(SessionCommand::UpdateObserver(observer))
            .is_ok()
    }

    /// Stops the session. Safe to call at any time, any number of times.
    pub fn stop(&self) {
        if !self.cancellation.is_cancelled() {
            info!("Heading session stop requested");
        }
        self.cancellation.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// The token that stops this session when cancelled.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }
}

/// Starts a session and spawns its runner on the current runtime.
///
/// Observer and target are validated before anything is spawned. The
/// returned join handle resolves to the final state once the session has
/// stopped or become unavailable.
pub fn spawn_session<P, C>(
    config: SessionConfig,
    platform: P,
    provider: Arc<DeclinationProvider<C>>,
    observer: GeoPoint,
    target: GeoPoint,
) -> Result<(SessionHandle, JoinHandle<SessionState>), SessionError>
where
    P: OrientationPlatform,
    C: AsyncHttpClient + 'static,
{
    let capability = platform.capability();
    let mut session = HeadingSession::new(config);
    session.start(observer, target, capability)?;

    let (state_tx, state_rx) = watch::channel(session.state().clone());
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let cancellation = CancellationToken::new();

    let handle = SessionHandle {
        commands: command_tx.clone(),
        state: state_rx,
        cancellation: cancellation.clone(),
    };

    let runner = SessionRunner {
        session,
        platform,
        provider,
        capability,
        state_tx,
        commands: command_rx,
        command_tx,
        cancellation,
        timer: ForcedCalibrationTimer::new(),
        lookup: None,
        clock: Instant::now(),
    };

    Ok((handle, tokio::spawn(runner.run())))
}

struct SessionRunner<P, C: AsyncHttpClient> {
    session: HeadingSession,
    platform: P,
    provider: Arc<DeclinationProvider<C>>,
    capability: OrientationCapability,
    state_tx: watch::Sender<SessionState>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    /// Kept for the forced-calibration deadline to report back through.
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    cancellation: CancellationToken,
    timer: ForcedCalibrationTimer,
    lookup: Option<JoinHandle<()>>,
    /// Session clock origin for sample timestamps.
    clock: Instant,
}

impl<P, C> SessionRunner<P, C>
where
    P: OrientationPlatform,
    C: AsyncHttpClient + 'static,
{
    async fn run(mut self) -> SessionState {
        if self.session.phase() == LifecyclePhase::RequestingPermission {
            let outcome = match self.capability {
                OrientationCapability::Available {
                    requires_permission: false,
                } => Some(PermissionOutcome::NotRequired),
                _ => {
                    debug!("Requesting orientation permission");
                    tokio::select! {
                        biased;
                        _ = self.cancellation.cancelled() => None,
                        outcome = self.platform.request_permission() => Some(outcome),
                    }
                }
            };

            match outcome {
                Some(outcome) => {
                    if let Err(e) = self.session.resolve_permission(outcome) {
                        warn!(error = %e, "Permission outcome rejected");
                    }
                }
                None => {
                    self.session.stop();
                }
            }
            self.publish();
        }

        if self.session.phase() != LifecyclePhase::Listening {
            return self.finish();
        }

        let mut events = self.platform.subscribe();
        info!("Listening for orientation events");

        let (declination_tx, mut declination_rx) = mpsc::unbounded_channel();
        self.resolve_declination(&declination_tx);

        loop {
            tokio::select! {
                biased;

                _ = self.cancellation.cancelled() => break,

                Some(command) = self.commands.recv() => {
                    self.handle_command(command, &declination_tx);
                }

                Some(record) = declination_rx.recv() => {
                    if self.session.apply_declination(record) {
                        self.publish();
                    }
                }

                event = events.recv() => match event {
                    Some(event) => {
                        let at_ms = self.now_ms();
                        if self.session.handle_event(&event, at_ms) {
                            self.publish();
                        }
                    }
                    None => {
                        warn!("Orientation stream ended unexpectedly");
                        self.session.fail(UnavailableReason::Error);
                        break;
                    }
                },
            }
        }

        self.platform.unsubscribe();
        self.finish()
    }

    fn handle_command(
        &mut self,
        command: SessionCommand,
        declination_tx: &mpsc::UnboundedSender<DeclinationRecord>,
    ) {
        match command {
            SessionCommand::Recalibrate => match self.session.recalibrate() {
                Ok(epoch) => {
                    let commands = self.command_tx.clone();
                    let timeout = self.session.config().forced_calibration_timeout;
                    self.timer.arm(timeout, epoch, move |epoch| {
                        let _ = commands.send(SessionCommand::ForceCalibration { epoch });
                    });
                    self.publish();
                }
                Err(e) => warn!(error = %e, "Recalibration rejected"),
            },
            SessionCommand::ForceCalibration { epoch } => {
                if self.session.force_calibration(epoch) {
                    self.publish();
                }
            }
            SessionCommand::UpdateObserver(observer) => match self.session.update_observer(observer) {
                Ok(true) => {
                    self.publish();
                    self.resolve_declination(declination_tx);
                }
                Ok(false) => debug!(observer = %observer, "Observer within epsilon, ignoring"),
                Err(e) => warn!(error = %e, "Observer update rejected"),
            },
        }
    }

    /// Spawns a lookup for the current observer, superseding any in flight.
    fn resolve_declination(&mut self, tx: &mpsc::UnboundedSender<DeclinationRecord>) {
        let Some(observer) = self.session.observer() else {
            return;
        };

        if let Some(previous) = self.lookup.take() {
            previous.abort();
        }

        let provider = Arc::clone(&self.provider);
        let tx = tx.clone();
        self.lookup = Some(tokio::spawn(async move {
            let record = provider.resolve(observer).await;
            let _ = tx.send(record);
        }));
    }

    fn finish(mut self) -> SessionState {
        self.timer.cancel();
        if let Some(lookup) = self.lookup.take() {
            lookup.abort();
        }
        self.session.stop();
        self.publish();

        info!(phase = %self.session.phase(), "Heading session ended");
        self.session.state().clone()
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.session.state().clone());
    }

    fn now_ms(&self) -> u64 {
        self.clock.elapsed().as_millis() as u64
    }
}
