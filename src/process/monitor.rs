//! Polling Loop / Live View Model
//!
//! A [`Monitor`] owns one background task that refreshes a
//! [`MonitorSnapshot`] on a fixed cadence until stopped. Refreshes query the
//! process table and the port reconciler concurrently and publish both
//! results together, so readers never see a process list from one cycle next
//! to port states from another.
//!
//! A tick that fires while the previous refresh is still running is skipped;
//! refreshes never overlap. Stopping cancels future ticks only: a refresh
//! already in flight runs to completion on a detached task and its result is
//! dropped.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use log::{debug, trace, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::model::MonitorSnapshot;
use crate::process::ports::observe_ports;
use crate::process::probe::SystemProbe;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

type Refresh = Pin<Box<dyn Future<Output = MonitorSnapshot> + Send>>;

pub struct Monitor {
    snapshot: watch::Receiver<MonitorSnapshot>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Monitor {
    /// Start polling `ports`. The first refresh is issued immediately; later
    /// ones follow every `interval`.
    pub fn start(probe: Arc<dyn SystemProbe>, ports: Vec<u16>, interval: Duration) -> Self {
        let (tx, rx) = watch::channel(MonitorSnapshot::pending(&ports));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_loop(
            probe,
            Arc::from(ports),
            interval.max(MIN_POLL_INTERVAL),
            tx,
            cancel.clone(),
        ));
        Self {
            snapshot: rx,
            cancel,
            task: Some(task),
        }
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MonitorSnapshot> {
        self.snapshot.clone()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop and wait for the polling task to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
        {
            warn!("Monitor task ended abnormally: {}", err);
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// One refresh cycle: process listing and port reconciliation side by side.
pub async fn refresh(probe: &dyn SystemProbe, ports: &[u16]) -> MonitorSnapshot {
    let (processes, occupancy) =
        tokio::join!(probe.list_processes(), observe_ports(probe, ports));
    trace!(
        "Refreshed: {} processes, {}/{} ports in use",
        processes.len(),
        occupancy.values().filter(|in_use| **in_use).count(),
        occupancy.len()
    );
    MonitorSnapshot {
        processes,
        ports: occupancy,
        captured_at: Local::now(),
        is_refreshing: false,
    }
}

async fn poll_loop(
    probe: Arc<dyn SystemProbe>,
    ports: Arc<[u16]>,
    period: Duration,
    tx: watch::Sender<MonitorSnapshot>,
    cancel: CancellationToken,
) {
    let mut in_flight: Option<Refresh> = Some(begin_refresh(&probe, &ports, &tx));
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            snapshot = settle(&mut in_flight) => {
                in_flight = None;
                tx.send_replace(snapshot);
            }
            _ = ticker.tick() => {
                if in_flight.is_some() {
                    debug!("Previous refresh still running, skipping tick");
                } else {
                    in_flight = Some(begin_refresh(&probe, &ports, &tx));
                }
            }
        }
    }

    if let Some(refresh) = in_flight.take() {
        tokio::spawn(async move {
            let _ = refresh.await;
            debug!("Discarded refresh that completed after the monitor stopped");
        });
    }
    debug!("Monitor stopped");
}

fn begin_refresh(
    probe: &Arc<dyn SystemProbe>,
    ports: &Arc<[u16]>,
    tx: &watch::Sender<MonitorSnapshot>,
) -> Refresh {
    // Only the flag changes; the previous content stays readable.
    tx.send_if_modified(|snapshot| !std::mem::replace(&mut snapshot.is_refreshing, true));
    let probe = Arc::clone(probe);
    let ports = Arc::clone(ports);
    Box::pin(async move { refresh(probe.as_ref(), &ports).await })
}

async fn settle(in_flight: &mut Option<Refresh>) -> MonitorSnapshot {
    match in_flight {
        Some(refresh) => refresh.await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::model::ProcessRecord;

    /// Cycle `n` reports one process with PID `n`; its port is in use only
    /// on odd cycles. Selected cycles can be slowed down.
    #[derive(Default)]
    struct CycleProbe {
        list_calls: AtomicUsize,
        port_calls: AtomicUsize,
        slow_lists: HashMap<usize, Duration>,
    }

    impl CycleProbe {
        fn with_slow_lists(slow: &[(usize, u64)]) -> Self {
            Self {
                slow_lists: slow
                    .iter()
                    .map(|(cycle, secs)| (*cycle, Duration::from_secs(*secs)))
                    .collect(),
                ..Self::default()
            }
        }

        fn list_calls(&self) -> usize {
            self.list_calls.load(Ordering::SeqCst)
        }

        fn port_calls(&self) -> usize {
            self.port_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SystemProbe for CycleProbe {
        async fn list_processes(&self) -> Vec<ProcessRecord> {
            let cycle = self.list_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(delay) = self.slow_lists.get(&cycle) {
                time::sleep(*delay).await;
            }
            vec![ProcessRecord {
                pid: cycle as i32,
                port: None,
                command: format!("node cycle-{}.js", cycle),
                cpu: "0.0".to_string(),
                memory: "0.1".to_string(),
            }]
        }

        async fn find_listener_pid(&self, _port: u16) -> Option<i32> {
            let cycle = self.port_calls.fetch_add(1, Ordering::SeqCst) + 1;
            (cycle % 2 == 1).then_some(cycle as i32)
        }

        async fn force_kill(&self, _pid: i32) -> bool {
            false
        }
    }

    fn start(probe: &Arc<CycleProbe>) -> Monitor {
        Monitor::start(probe.clone(), vec![3000], DEFAULT_POLL_INTERVAL)
    }

    fn newest_pid(snapshot: &MonitorSnapshot) -> i32 {
        snapshot.processes[0].pid
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_stop_still_runs_entry_refresh_once() {
        let probe = Arc::new(CycleProbe::default());
        let monitor = start(&probe);
        let rx = monitor.subscribe();
        monitor.stop();
        monitor.shutdown().await;

        time::sleep(Duration::from_secs(30)).await;

        assert_eq!(probe.list_calls(), 1);
        assert_eq!(probe.port_calls(), 1);
        // Result of the entry refresh was discarded
        assert!(rx.borrow().processes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn refreshes_on_entry_and_every_interval() {
        let probe = Arc::new(CycleProbe::default());
        let monitor = start(&probe);

        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(probe.list_calls(), 1);
        let snapshot = monitor.snapshot();
        assert!(!snapshot.is_refreshing);
        assert_eq!(newest_pid(&snapshot), 1);
        assert!(snapshot.is_port_in_use(3000));

        time::sleep(Duration::from_millis(10_400)).await;
        assert_eq!(probe.list_calls(), 3);
        assert_eq!(newest_pid(&monitor.snapshot()), 3);

        monitor.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_previous_content_while_refreshing() {
        let probe = Arc::new(CycleProbe::with_slow_lists(&[(2, 3)]));
        let monitor = start(&probe);

        time::sleep(Duration::from_secs(6)).await;
        let during = monitor.snapshot();
        assert!(during.is_refreshing);
        assert_eq!(newest_pid(&during), 1);
        assert!(during.is_port_in_use(3000));

        time::sleep(Duration::from_secs(3)).await;
        let after = monitor.snapshot();
        assert!(!after.is_refreshing);
        assert_eq!(newest_pid(&after), 2);
        assert!(!after.is_port_in_use(3000));

        monitor.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn slow_refresh_skips_overlapping_tick() {
        let probe = Arc::new(CycleProbe::with_slow_lists(&[(1, 7)]));
        let monitor = start(&probe);

        // Tick at 5s lands mid-refresh and is skipped; next refresh at 10s.
        time::sleep(Duration::from_secs(9)).await;
        assert_eq!(probe.list_calls(), 1);
        assert_eq!(newest_pid(&monitor.snapshot()), 1);

        time::sleep(Duration::from_secs(3)).await;
        assert_eq!(probe.list_calls(), 2);
        assert_eq!(newest_pid(&monitor.snapshot()), 2);

        monitor.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_discards_in_flight_refresh() {
        let probe = Arc::new(CycleProbe::with_slow_lists(&[(2, 3)]));
        let monitor = start(&probe);
        let rx = monitor.subscribe();

        time::sleep(Duration::from_secs(6)).await;
        monitor.shutdown().await;
        time::sleep(Duration::from_secs(30)).await;

        assert_eq!(probe.list_calls(), 2);
        assert_eq!(newest_pid(&rx.borrow()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshots_never_mix_cycles() {
        let probe = Arc::new(CycleProbe::with_slow_lists(&[(1, 7), (3, 4)]));
        let monitor = start(&probe);
        let mut rx = monitor.subscribe();

        let collector = tokio::spawn(async move {
            let mut published = Vec::new();
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                if !snapshot.is_refreshing {
                    published.push(snapshot);
                }
            }
            published
        });

        time::sleep(Duration::from_secs(41)).await;
        monitor.shutdown().await;
        let published = collector.await.unwrap();

        assert!(published.len() >= 4);
        for snapshot in &published {
            let pid = newest_pid(snapshot);
            assert_eq!(snapshot.is_port_in_use(3000), pid % 2 == 1, "cycle {}", pid);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_keys_follow_configured_ports() {
        let probe = Arc::new(CycleProbe::default());
        let monitor = Monitor::start(probe.clone(), vec![4200, 4300], DEFAULT_POLL_INTERVAL);
        assert_eq!(monitor.snapshot().ports.len(), 2);

        time::sleep(Duration::from_millis(100)).await;
        let ports: Vec<u16> = monitor.snapshot().ports.keys().copied().collect();
        assert_eq!(ports, vec![4200, 4300]);

        monitor.shutdown().await;
    }
}
