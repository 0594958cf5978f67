//! Process Termination Controller

use log::{info, warn};

use crate::model::TerminationOutcome;
use crate::process::probe::SystemProbe;

/// Kill whatever listens on `port`: look up the listener, send one SIGKILL,
/// report whether the OS accepted it.
///
/// Nothing listening is `succeeded: false`, same as a refused signal. A
/// process that exits between lookup and signal also lands there; there is
/// no retry and no graceful SIGTERM first.
pub async fn kill_port(probe: &dyn SystemProbe, port: u16) -> TerminationOutcome {
    let Some(pid) = probe.find_listener_pid(port).await else {
        info!("No listener on port {}, nothing to kill", port);
        return TerminationOutcome {
            port,
            succeeded: false,
        };
    };

    let succeeded = probe.force_kill(pid).await;
    if succeeded {
        info!("Killed PID {} listening on port {}", pid, port);
    } else {
        warn!("Failed to kill PID {} listening on port {}", pid, port);
    }
    TerminationOutcome { port, succeeded }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::model::ProcessRecord;
    use crate::process::ports::observe_ports;

    struct RecordingProbe {
        listeners: HashMap<u16, i32>,
        signal_accepted: bool,
        signalled: Mutex<Vec<i32>>,
    }

    impl RecordingProbe {
        fn new(listeners: &[(u16, i32)], signal_accepted: bool) -> Self {
            Self {
                listeners: listeners.iter().copied().collect(),
                signal_accepted,
                signalled: Mutex::new(Vec::new()),
            }
        }

        fn signalled(&self) -> Vec<i32> {
            self.signalled.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SystemProbe for RecordingProbe {
        async fn list_processes(&self) -> Vec<ProcessRecord> {
            Vec::new()
        }

        async fn find_listener_pid(&self, port: u16) -> Option<i32> {
            self.listeners.get(&port).copied()
        }

        async fn force_kill(&self, pid: i32) -> bool {
            self.signalled.lock().unwrap().push(pid);
            self.signal_accepted
        }
    }

    #[tokio::test]
    async fn signals_listener_once_and_reports_success() {
        let probe = RecordingProbe::new(&[(3000, 111)], true);
        let outcome = kill_port(&probe, 3000).await;
        assert_eq!(
            outcome,
            TerminationOutcome {
                port: 3000,
                succeeded: true
            }
        );
        assert_eq!(probe.signalled(), vec![111]);
    }

    #[tokio::test]
    async fn free_port_sends_no_signal() {
        let probe = RecordingProbe::new(&[], true);
        let outcome = kill_port(&probe, 8080).await;
        assert!(!outcome.succeeded);
        assert!(probe.signalled().is_empty());
    }

    #[tokio::test]
    async fn rejected_signal_is_a_failure() {
        let probe = RecordingProbe::new(&[(5173, 222)], false);
        let outcome = kill_port(&probe, 5173).await;
        assert!(!outcome.succeeded);
        assert_eq!(probe.signalled(), vec![222]);
    }

    #[tokio::test]
    async fn observe_then_kill_scenario() {
        let probe = RecordingProbe::new(&[(3000, 111)], true);

        let observed = observe_ports(&probe, &[3000, 8080]).await;
        assert_eq!(observed, BTreeMap::from([(3000, true), (8080, false)]));

        assert!(kill_port(&probe, 3000).await.succeeded);
        assert_eq!(probe.signalled(), vec![111]);

        assert!(!kill_port(&probe, 8080).await.succeeded);
        assert_eq!(probe.signalled(), vec![111]);
    }
}
