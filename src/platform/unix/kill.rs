//! Forceful process termination using SIGKILL

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

/// Send SIGKILL to exactly one PID.
///
/// Non-positive PIDs address process groups (or every process) under
/// kill(2) and are refused.
pub fn force_kill(pid_raw: i32) -> Result<(), Errno> {
    if pid_raw <= 0 {
        return Err(Errno::EINVAL);
    }
    kill(Pid::from_raw(pid_raw), Signal::SIGKILL)
}
