//! Simulate command - run a heading session fed from stdin.
//!
//! Each input line is one orientation event:
//!
//! ```text
//! compass 118.5          # native compass heading
//! alpha 240 absolute     # orientation alpha, referenced to magnetic north
//! alpha 240              # orientation alpha, relative
//! skip                   # event without a usable reading
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. After each change the
//! latest session state is printed to stdout as one JSON object per line;
//! states superseded within a burst of input are coalesced. The session stops
//! at end of input or on Ctrl+C.

use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use qibla::geo::GeoPoint;
use qibla::session::{
    spawn_session, ChannelPlatform, OrientationEvent, SessionHandle, SessionState,
};

use super::common::resolve_target;
use crate::error::CliError;
use crate::runner::CliRunner;

const EVENT_BUFFER: usize = 64;

/// Arguments for the simulate command.
pub struct SimulateArgs {
    pub latitude: f64,
    pub longitude: f64,
    pub target_latitude: Option<f64>,
    pub target_longitude: Option<f64>,
    pub recalibrate: bool,
    pub offline: bool,
}

/// Run the simulate command.
pub fn run(args: SimulateArgs, verbose: bool) -> Result<(), CliError> {
    let runner = CliRunner::new(verbose)?;
    runner.log_startup("simulate");

    let observer = GeoPoint::new(args.latitude, args.longitude)?;
    let target = resolve_target(args.target_latitude, args.target_longitude, runner.config())?;
    let provider = Arc::new(runner.declination_provider(args.offline)?);
    let session_config = runner.config().session_config();
    let runtime = runner.runtime()?;

    let result = runtime.block_on(async move {
        let (platform, events) = ChannelPlatform::new(EVENT_BUFFER);
        let (handle, task) = spawn_session(session_config, platform, provider, observer, target)?;

        install_stop_handler(handle.cancellation())?;

        if args.recalibrate {
            handle.recalibrate();
        }

        tokio::spawn(feed_stdin(events, handle.clone()));

        let mut last_printed = None;
        let mut updates = handle.subscribe();
        loop {
            let state = updates.borrow_and_update().clone();
            if last_printed.as_ref() != Some(&state) {
                print_state(&state)?;
                last_printed = Some(state);
            }
            if updates.changed().await.is_err() {
                break;
            }
        }

        let final_state = task
            .await
            .map_err(|e| CliError::Runtime(format!("Session task failed: {}", e)))?;
        if last_printed.as_ref() != Some(&final_state) {
            print_state(&final_state)?;
        }

        eprintln!("Session ended: {}", final_state.phase);
        Ok::<(), CliError>(())
    });

    // A blocking stdin read can't be cancelled; don't wait for it
    runtime.shutdown_background();
    result
}

/// Cancels `token` on Ctrl+C. Only one handler may exist per process.
fn install_stop_handler(token: CancellationToken) -> Result<(), CliError> {
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Received shutdown signal, stopping session...");
        token.cancel();
    })
    .map_err(|e| CliError::Runtime(format!("Failed to set signal handler: {}", e)))
}

/// Forwards parsed stdin lines to the platform; stops the session at EOF
/// once every queued event has been consumed.
async fn feed_stdin(events: mpsc::Sender<OrientationEvent>, handle: SessionHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                match line.parse::<OrientationEvent>() {
                    Ok(event) => {
                        if events.send(event).await.is_err() {
                            debug!("Session no longer accepting events");
                            return;
                        }
                    }
                    Err(e) => warn!(error = %e, "Skipping input line"),
                }
            }
            Ok(None) => {
                debug!("End of input");
                // Every permit back means the runner has taken every event
                let _ = events.reserve_many(events.max_capacity()).await;
                handle.stop();
                return;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stdin");
                handle.stop();
                return;
            }
        }
    }
}

fn print_state(state: &SessionState) -> Result<(), CliError> {
    let json = serde_json::to_string(state).map_err(|e| CliError::Output(e.to_string()))?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", json).map_err(|e| CliError::Output(e.to_string()))?;
    stdout.flush().map_err(|e| CliError::Output(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_stop_handler_is_runtime_error() {
        // The first install may already have happened in this process
        let _ = install_stop_handler(CancellationToken::new());

        let err = install_stop_handler(CancellationToken::new()).unwrap_err();
        assert!(matches!(err, CliError::Runtime(_)));
        assert!(err.to_string().starts_with("Runtime error"));
    }
}
