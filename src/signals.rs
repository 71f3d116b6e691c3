//! SIGINT/SIGTERM handling for the CLI worker.
//!
//! The handler only sets a process-wide flag. The worker loop polls it
//! between batches and while backing off, then unwinds normally so every
//! lock guard and map is released.

use crate::error::{QueueError, Result};
use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(_signal: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Install the flag-setting handler for SIGINT and SIGTERM.
pub fn install() -> Result<()> {
    let handler = on_signal as extern "C" fn(libc::c_int);
    for signal in [libc::SIGINT, libc::SIGTERM] {
        // SAFETY: the handler only performs an atomic store, which is
        // async-signal-safe.
        let previous = unsafe { libc::signal(signal, handler as libc::sighandler_t) };
        if previous == libc::SIG_ERR {
            return Err(QueueError::UserError(format!(
                "failed to install handler for signal {}: {}",
                signal,
                std::io::Error::last_os_error()
            )));
        }
    }
    Ok(())
}

/// Whether SIGINT or SIGTERM has arrived since the last [`reset`].
pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Clear the flag.
pub fn reset() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_signal_sets_flag() {
        install().unwrap();
        reset();
        assert!(!interrupted());

        // SAFETY: our handler is installed, so this does not terminate the test process.
        unsafe {
            libc::raise(libc::SIGTERM);
        }

        assert!(interrupted());
        reset();
        assert!(!interrupted());
    }

    #[test]
    #[serial]
    fn test_install_is_repeatable() {
        install().unwrap();
        install().unwrap();
        assert!(!interrupted());
    }
}
