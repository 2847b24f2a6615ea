use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use spibridge_core::{EmulatorListener, RegisterEmulator};
use tracing::{info, warn};

use crate::cmd::{BridgeArgs, ServeArgs};
use crate::exit::{bridge_error, CliError, CliResult, INTERNAL, SUCCESS};

pub fn run(args: ServeArgs, bridge_args: &BridgeArgs) -> CliResult<i32> {
    let config = bridge_args.config()?;
    config
        .validate()
        .map_err(|err| bridge_error("invalid configuration", err))?;

    let mut emulator = RegisterEmulator::new(bridge_args.mode(), config.chunk_size)
        .map_err(|err| bridge_error("invalid configuration", err))?
        .with_status(args.status);
    if let Some(limit) = args.burst_limit {
        emulator = emulator.with_burst_limit(limit);
    }
    let listener = EmulatorListener::bind(&config.socket_path, emulator)
        .map_err(|err| bridge_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut sessions = 0usize;
    while running.load(Ordering::SeqCst) {
        let mut stream = listener
            .accept()
            .map_err(|err| bridge_error("accept failed", err))?;
        match listener.emulator().serve(&mut stream) {
            Ok(requests) => info!(requests, "session closed"),
            Err(err) => warn!(error = %err, "session ended with error"),
        }
        sessions = sessions.saturating_add(1);

        if let Some(count) = args.count {
            if sessions >= count {
                break;
            }
        }
    }

    info!(sessions, "emulator stopped");
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
