//! Process and port monitoring core.

pub mod kill;
pub mod monitor;
pub mod ports;
pub mod probe;
pub mod runner;

pub use kill::kill_port;
pub use monitor::Monitor;
pub use ports::observe_ports;
pub use probe::{HostProbe, SystemProbe};
pub use runner::{CommandRunner, RunHandle, ScriptInvocation};
