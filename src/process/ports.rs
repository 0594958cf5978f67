//! Port State Reconciler

use std::collections::BTreeMap;

use futures::future::join_all;

use crate::process::probe::SystemProbe;

/// One reconciliation pass: every port is checked concurrently and the pass
/// resolves once all checks have. The result has exactly one entry per
/// requested port.
pub async fn observe_ports(probe: &dyn SystemProbe, ports: &[u16]) -> BTreeMap<u16, bool> {
    let checks = ports.iter().map(|port| async move {
        let in_use = probe.find_listener_pid(*port).await.is_some();
        (*port, in_use)
    });
    join_all(checks).await.into_iter().collect()
}
