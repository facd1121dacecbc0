//! Periodic background connection.
//!
//! Every manager gets its own task that calls [`DeviceManager::connect`] on
//! a fixed interval, so peripherals that are plugged in late or recover from
//! a power loss come back without operator action. An optional second kind
//! of task refreshes the availability aggregator on the same interval.
//!
//! Connecting blocks on driver calls and lock timeouts, so each tick runs on
//! the blocking pool.
//!
//! ```text
//! ┌──────────────┐  tick   ┌──────────────┐  spawn_blocking  ┌─────────────┐
//! │ interval     │────────►│ manager task │─────────────────►│ connect()   │
//! └──────────────┘         └──────────────┘                  └─────────────┘
//! ```

use crate::availability::AvailabilityAggregator;
use crate::DeviceManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

type TaskResult = std::result::Result<(), JoinError>;

/// Counts of how scheduler tasks ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub panicked: usize,
}

/// Builder for the background connect tasks.
pub struct ReconnectScheduler {
    managers: Vec<Arc<dyn DeviceManager>>,
    aggregator: Option<Arc<AvailabilityAggregator>>,
    interval: Duration,
}

impl ReconnectScheduler {
    pub fn new(managers: Vec<Arc<dyn DeviceManager>>, interval: Duration) -> Self {
        Self {
            managers,
            aggregator: None,
            interval,
        }
    }

    /// Also refresh `aggregator` every interval.
    pub fn with_availability(mut self, aggregator: Arc<AvailabilityAggregator>) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    /// Spawn one task per manager, plus the availability task if configured.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> SchedulerHandle {
        let mut tasks = JoinSet::new();

        for manager in self.managers {
            tasks.spawn(connect_task(manager, self.interval));
        }
        if let Some(aggregator) = self.aggregator {
            tasks.spawn(availability_task(aggregator, self.interval));
        }

        info!(
            tasks = tasks.len(),
            interval_ms = self.interval.as_millis() as u64,
            "Scheduler started"
        );
        SchedulerHandle { tasks }
    }
}

/// Running scheduler tasks.
pub struct SchedulerHandle {
    tasks: JoinSet<TaskResult>,
}

impl SchedulerHandle {
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Abort every task and wait for them to end.
    ///
    /// Individual task failures are counted and logged, never returned.
    pub async fn shutdown(mut self) -> ShutdownReport {
        self.tasks.abort_all();

        let mut report = ShutdownReport::default();
        while let Some(result) = self.tasks.join_next().await {
            match classify_task_result(result) {
                TaskTermination::Success => report.completed += 1,
                TaskTermination::Error => report.failed += 1,
                TaskTermination::Cancelled => report.cancelled += 1,
                TaskTermination::Panic => report.panicked += 1,
            }
        }

        if report.failed + report.panicked > 0 {
            error!(
                failed = report.failed,
                panicked = report.panicked,
                "Scheduler tasks ended abnormally"
            );
        }
        info!(
            cancelled = report.cancelled,
            completed = report.completed,
            "Scheduler stopped"
        );
        report
    }
}

/// Task termination classification for shutdown handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskTermination {
    Success,
    /// A blocking tick panicked and the task gave up.
    Error,
    /// Aborted by shutdown.
    Cancelled,
    Panic,
}

fn classify_task_result(result: std::result::Result<TaskResult, JoinError>) -> TaskTermination {
    match result {
        Ok(Ok(())) => TaskTermination::Success,
        Ok(Err(_)) => TaskTermination::Error,
        Err(e) if e.is_cancelled() => TaskTermination::Cancelled,
        Err(_) => TaskTermination::Panic,
    }
}

async fn connect_task(manager: Arc<dyn DeviceManager>, interval: Duration) -> TaskResult {
    let kinds: Vec<&str> = manager.kinds().iter().map(|kind| kind.as_str()).collect();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let tick_manager = manager.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || tick_manager.connect()).await {
            error!(devices = ?kinds, error = %e, "Connect tick failed");
            return Err(e);
        }
        debug!(devices = ?kinds, "Connect tick");
    }
}

async fn availability_task(
    aggregator: Arc<AvailabilityAggregator>,
    interval: Duration,
) -> TaskResult {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let tick_aggregator = aggregator.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || tick_aggregator.refresh()).await {
            error!(error = %e, "Availability refresh failed");
            return Err(e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DeviceDescriptors;
    use crate::health::HealthTracker;
    use crate::managed::ManagedDevice;
    use pos_core::{DeviceKind, HealthRecord, HealthStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingManager {
        connects: AtomicUsize,
        panic_on_connect: bool,
        tracker: HealthTracker,
    }

    impl DeviceManager for CountingManager {
        fn devices(&self) -> Vec<&dyn ManagedDevice> {
            Vec::new()
        }

        fn tracker(&self) -> &HealthTracker {
            &self.tracker
        }

        fn kinds(&self) -> Vec<DeviceKind> {
            vec![DeviceKind::Scale]
        }

        fn connect(&self) {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.panic_on_connect {
                panic!("driver crashed");
            }
        }

        fn health(&self) -> Vec<HealthRecord> {
            vec![HealthRecord::for_kind(DeviceKind::Scale, HealthStatus::NotReady)]
        }
    }

    #[test]
    fn test_classify_task_result() {
        assert_eq!(classify_task_result(Ok(Ok(()))), TaskTermination::Success);
    }

    #[tokio::test]
    async fn test_connects_every_interval() {
        let manager = Arc::new(CountingManager::default());
        let managers: Vec<Arc<dyn DeviceManager>> = vec![manager.clone()];
        let handle = ReconnectScheduler::new(managers, Duration::from_millis(10)).start();
        assert_eq!(handle.task_count(), 1);

        tokio::time::sleep(Duration::from_millis(80)).await;
        let report = handle.shutdown().await;

        assert!(manager.connects.load(Ordering::SeqCst) >= 2);
        assert_eq!(
            report,
            ShutdownReport {
                cancelled: 1,
                ..ShutdownReport::default()
            }
        );
    }

    #[tokio::test]
    async fn test_first_tick_is_immediate() {
        let manager = Arc::new(CountingManager::default());
        let managers: Vec<Arc<dyn DeviceManager>> = vec![manager.clone()];
        let handle = ReconnectScheduler::new(managers, Duration::from_secs(3600)).start();

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.shutdown().await;
        assert_eq!(manager.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_connect_is_counted() {
        let manager = Arc::new(CountingManager {
            panic_on_connect: true,
            ..CountingManager::default()
        });
        let managers: Vec<Arc<dyn DeviceManager>> =
            vec![manager.clone(), Arc::new(CountingManager::default())];
        let handle = ReconnectScheduler::new(managers, Duration::from_millis(10)).start();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let report = handle.shutdown().await;

        assert_eq!(manager.connects.load(Ordering::SeqCst), 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.cancelled, 1);
    }

    #[tokio::test]
    async fn test_availability_task_notifies() {
        let manager: Arc<dyn DeviceManager> = Arc::new(CountingManager::default());
        let aggregator = Arc::new(AvailabilityAggregator::new(
            vec![manager.clone()],
            DeviceDescriptors::empty(),
        ));
        let mut errors = aggregator.subscribe();

        let handle = ReconnectScheduler::new(vec![manager], Duration::from_millis(10))
            .with_availability(aggregator)
            .start();
        assert_eq!(handle.task_count(), 2);

        let snapshot = tokio::time::timeout(Duration::from_secs(2), errors.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.devices, vec![DeviceKind::Scale]);

        handle.shutdown().await;
    }
}
