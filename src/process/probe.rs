//! System Process Query: the seam between the core and the host OS.
//!
//! Every method is fail-soft. Execution failures of the underlying commands
//! are logged and collapsed into the benign default (empty list, no listener,
//! `false`), so nothing above this layer ever sees an OS query error.

use async_trait::async_trait;
use log::{debug, warn};

use crate::model::ProcessRecord;
use crate::platform::current::{kill, ports, procs};
use crate::utils::find_command;

#[async_trait]
pub trait SystemProbe: Send + Sync {
    /// Processes whose command line mentions the monitored runtime.
    async fn list_processes(&self) -> Vec<ProcessRecord>;

    /// PID holding a TCP listener on `port`. "Free" and "could not tell"
    /// are both `None`.
    async fn find_listener_pid(&self, port: u16) -> Option<i32>;

    async fn describe_listener(&self, _port: u16) -> Option<ProcessRecord> {
        None
    }

    /// Deliver a forceful termination signal. `true` if the OS accepted it.
    async fn force_kill(&self, pid: i32) -> bool;
}

/// Probe backed by `ps`, `lsof` and kill(2).
#[derive(Clone, Debug)]
pub struct HostProbe {
    process_filter: String,
    ps: String,
    lsof: String,
}

impl HostProbe {
    pub fn new(process_filter: impl Into<String>) -> Self {
        Self::with_commands(process_filter, find_command("ps"), find_command("lsof"))
    }

    pub fn with_commands(
        process_filter: impl Into<String>,
        ps: impl Into<String>,
        lsof: impl Into<String>,
    ) -> Self {
        Self {
            process_filter: process_filter.into(),
            ps: ps.into(),
            lsof: lsof.into(),
        }
    }
}

#[async_trait]
impl SystemProbe for HostProbe {
    async fn list_processes(&self) -> Vec<ProcessRecord> {
        match procs::list_processes(&self.ps, &self.process_filter).await {
            Ok(processes) => processes,
            Err(err) => {
                warn!("Process listing unavailable: {:#}", err);
                Vec::new()
            }
        }
    }

    async fn find_listener_pid(&self, port: u16) -> Option<i32> {
        match ports::find_listener_pid(&self.lsof, port).await {
            Ok(pid) => pid,
            Err(err) => {
                debug!("Listener lookup for port {} failed: {:#}", port, err);
                None
            }
        }
    }

    async fn describe_listener(&self, port: u16) -> Option<ProcessRecord> {
        match ports::describe_listener(&self.lsof, port).await {
            Ok(record) => record,
            Err(err) => {
                debug!("Listener description for port {} failed: {:#}", port, err);
                None
            }
        }
    }

    async fn force_kill(&self, pid: i32) -> bool {
        match kill::force_kill(pid) {
            Ok(()) => true,
            Err(errno) => {
                warn!("SIGKILL to PID {} rejected: {}", pid, errno);
                false
            }
        }
    }
}
