//! Device reset
//!
//! On the unit a restart reason ends in a full reset. On a host this means
//! replacing the process image with a fresh copy of the binary; if that is not
//! possible the process exits and the service manager starts it again.

use tracing::error;

use crate::utils::error::RestartReason;

/// Exit status used when the binary cannot be re-executed (`EX_TEMPFAIL`).
pub const RESTART_EXIT_CODE: i32 = 75;

pub fn restart_device(reason: &RestartReason) -> ! {
    error!(%reason, "restarting unit");

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        use std::process::Command;

        match std::env::current_exe() {
            Ok(program) => {
                let err = Command::new(program).args(std::env::args_os().skip(1)).exec();
                error!("re-exec failed: {err}");
            }
            Err(e) => error!("cannot locate own binary: {e}"),
        }
    }

    std::process::exit(RESTART_EXIT_CODE)
}
