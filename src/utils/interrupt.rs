//! Ctrl-C handling.
//!
//! The first interrupt only raises an [`InterruptFlag`]; the processing loop
//! notices it between records, stops reading and still finishes every open
//! output. A second interrupt exits immediately with status 130.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, warn};

/// Exit status used when the run was interrupted
pub const INTERRUPTED_EXIT_CODE: u8 = 130;

/// Shared, clonable "stop requested" flag
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Listen for Ctrl-C on a background thread and raise `flag` when it arrives.
///
/// # Errors
///
/// Returns an error if the signal runtime or its thread cannot be started.
pub fn install_ctrl_c_handler(flag: InterruptFlag) -> std::io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    std::thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                loop {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!("Unable to listen for Ctrl-C: {e}");
                        return;
                    }
                    if flag.is_set() {
                        error!("Interrupted again, exiting without finishing outputs");
                        std::process::exit(i32::from(INTERRUPTED_EXIT_CODE));
                    }
                    warn!("Interrupt received, finishing outputs (Ctrl-C again to abort)");
                    flag.set();
                }
            });
        })?;

    Ok(())
}
