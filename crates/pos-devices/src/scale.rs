//! Scale orchestrator.
//!
//! Two kinds of reading come out of a scale. A stable weight is read on
//! demand: a background thread retries the driver's blocking read until the
//! weight settles or the caller's deadline passes, then completes every
//! caller waiting on it. Live weights arrive with status callbacks and are
//! broadcast to subscribers while live publishing is on. Stable results are
//! broadcast too.

use crate::Peripheral;
use crate::base::{DeviceCore, describe, is_offline_code};
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use pos_core::constants::LIVE_WEIGHT_CHANNEL_CAPACITY;
use pos_core::{DeviceError, DeviceKind, DeviceSettings, Result, WeightError, WeightReading};
use pos_hardware::codes::{power, scale as codes};
use pos_hardware::events::{DataEvent, ErrorEvent, OutputCompleteEvent, StatusEvent};
use pos_hardware::traits::{ScaleHandle, attach_listener};
use pos_hardware::{
    ConnectOutcome, DeviceRegistry, DriverError, DriverListener, ErrorCode, OperationGuard,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Statuses that end a wait on the scale.
///
/// Weight statuses are handled by the live weight publisher instead.
pub fn is_failure_status(status: i32) -> bool {
    power::is_failure(status)
}

/// Classify a scale driver error.
pub fn map_error(error: &DriverError) -> DeviceError {
    let kind = DeviceKind::Scale;
    match error.code {
        ErrorCode::Extended => match error.extended {
            codes::EXT_OVERWEIGHT => WeightError::Overweight.into(),
            codes::EXT_UNDER_ZERO => WeightError::UnderZero.into(),
            codes::EXT_SAME_WEIGHT => WeightError::Unstable.into(),
            _ => DeviceError::hardware(kind, describe(error)),
        },
        code if is_offline_code(code) || code == ErrorCode::Disabled => DeviceError::offline(kind),
        ErrorCode::Failure => DeviceError::hardware(kind, describe(error)),
        ErrorCode::Timeout => DeviceError::timeout(kind),
        ErrorCode::Busy | ErrorCode::Claimed => DeviceError::busy(kind),
        _ => DeviceError::unexpected(describe(error)),
    }
}

/// Reading announced by a weight status update, if the status is one.
pub fn reading_for_status(
    status: i32,
    live_weight: impl FnOnce() -> Option<i32>,
) -> Option<WeightReading> {
    let reading = match status {
        codes::SUE_STABLE_WEIGHT => match live_weight() {
            Some(raw) if raw >= 0 => WeightReading::from_raw(raw),
            Some(_) => WeightReading::from_error(WeightError::UnderZero),
            None => WeightReading::from_error(WeightError::NotReady),
        },
        codes::SUE_WEIGHT_ZERO => WeightReading::from_raw(0),
        codes::SUE_WEIGHT_UNSTABLE => WeightReading::from_error(WeightError::Unstable),
        codes::SUE_WEIGHT_OVERWEIGHT => WeightReading::from_error(WeightError::Overweight),
        codes::SUE_WEIGHT_UNDER_ZERO => WeightReading::from_error(WeightError::UnderZero),
        codes::SUE_NOT_READY => WeightReading::from_error(WeightError::NotReady),
        _ => return None,
    };
    Some(reading)
}

type StableWaiter = Sender<Result<WeightReading>>;

/// Weighs items.
pub struct Scale<H: ScaleHandle + ?Sized> {
    core: DeviceCore<H>,
    reading: AtomicBool,
    waiters: Mutex<Vec<StableWaiter>>,
    live_tx: broadcast::Sender<WeightReading>,
    live_enabled: AtomicBool,
}

impl<H: ScaleHandle + ?Sized + 'static> Scale<H> {
    pub fn new(
        handle: Arc<H>,
        registry: Arc<dyn DeviceRegistry>,
        settings: DeviceSettings,
    ) -> Arc<Self> {
        let (live_tx, _) = broadcast::channel(LIVE_WEIGHT_CHANNEL_CAPACITY);
        let scale = Arc::new(Self {
            core: DeviceCore::new(
                DeviceKind::Scale,
                handle,
                registry,
                None,
                settings,
                is_failure_status,
            ),
            reading: AtomicBool::new(false),
            waiters: Mutex::new(Vec::new()),
            live_tx,
            live_enabled: AtomicBool::new(false),
        });
        attach_listener(scale.core.supervisor().handle().as_ref(), &scale);
        scale
    }

    /// Start a stable weight read unless one is already running.
    ///
    /// Returns whether a new read was started. The read retries driver
    /// timeouts until `timeout` elapses and reports an unstable weight if
    /// nothing settled by then.
    pub fn start_stable_weight_read(self: &Arc<Self>, timeout: Duration) -> Result<bool> {
        let _waiters = self.waiters.lock();
        self.start_read_locked(timeout)
    }

    /// Caller holds `waiters`, so the running read cannot finish in between.
    fn start_read_locked(self: &Arc<Self>, timeout: Duration) -> Result<bool> {
        if self.reading.swap(true, Ordering::SeqCst) {
            debug!("Stable weight read already in progress");
            return Ok(false);
        }

        let scale = Arc::clone(self);
        let spawned = std::thread::Builder::new()
            .name("scale-stable-read".to_string())
            .spawn(move || {
                let deadline = Instant::now() + timeout;
                let result = scale.read_until_settled(deadline);
                scale.publish_stable(result);
            });

        match spawned {
            Ok(_) => Ok(true),
            Err(e) => {
                self.reading.store(false, Ordering::SeqCst);
                Err(DeviceError::unexpected(format!("failed to start weight read: {}", e)))
            }
        }
    }

    /// Read a settled weight, joining a read already in progress if there is one.
    pub fn read_stable_weight(self: &Arc<Self>, timeout: Duration) -> Result<WeightReading> {
        self.core.ensure_connected()?;

        let (tx, rx) = channel::bounded(1);
        {
            let mut waiters = self.waiters.lock();
            waiters.push(tx);
            if let Err(e) = self.start_read_locked(timeout) {
                waiters.pop();
                return Err(e);
            }
        }

        let grace = self.core.settings().scale_read_attempt();
        match rx.recv_timeout(timeout + grace) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(WeightError::Unstable.into()),
            Err(RecvTimeoutError::Disconnected) => {
                Err(DeviceError::unexpected("weight read abandoned"))
            }
        }
    }
}

impl<H: ScaleHandle + ?Sized> Scale<H> {
    pub fn core(&self) -> &DeviceCore<H> {
        &self.core
    }

    /// Whether a stable weight read is running.
    pub fn is_reading(&self) -> bool {
        self.reading.load(Ordering::SeqCst)
    }

    /// Subscribe to live weights and turn publishing on.
    pub fn subscribe_live_weight(&self) -> broadcast::Receiver<WeightReading> {
        self.live_enabled.store(true, Ordering::SeqCst);
        self.live_tx.subscribe()
    }

    /// Stop publishing live weights. Existing subscribers stay open.
    pub fn stop_live_weight(&self) {
        self.live_enabled.store(false, Ordering::SeqCst);
    }

    fn read_until_settled(&self, deadline: Instant) -> Result<WeightReading> {
        let attempt = self.core.settings().scale_read_attempt();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(WeightError::Unstable.into());
            }
            match self.core.call(|handle| handle.read_weight(attempt.min(remaining))) {
                Ok(raw) if raw < 0 => return Err(WeightError::UnderZero.into()),
                Ok(raw) => return Ok(WeightReading::from_raw(raw)),
                Err(e) if e.is_timeout() => continue,
                Err(e) => return Err(map_error(&e)),
            }
        }
    }

    fn publish_stable(&self, result: Result<WeightReading>) {
        let live = match &result {
            Ok(reading) => reading.clone(),
            Err(DeviceError::Weight(error)) => WeightReading::from_error(*error),
            Err(e) => {
                warn!(device = %self.core.kind(), error = %e, "Stable weight read failed");
                WeightReading::from_error(WeightError::NotReady)
            }
        };
        self.publish_live(live);

        let waiters = {
            let mut waiters = self.waiters.lock();
            self.reading.store(false, Ordering::SeqCst);
            std::mem::take(&mut *waiters)
        };
        for waiter in waiters {
            let _ = waiter.try_send(result.clone());
        }
    }

    fn publish_live(&self, reading: WeightReading) {
        if self.live_enabled.load(Ordering::SeqCst) {
            // No subscribers is not an error.
            let _ = self.live_tx.send(reading);
        }
    }

    fn after_connect(&self) {
        let result = self.core.call(|handle| {
            handle.set_status_notify(true)?;
            handle.set_device_enabled(true)
        });
        if let Err(e) = result {
            warn!(device = %self.core.kind(), error = %e, "Scale setup after connect failed");
        }
    }
}

impl<H: ScaleHandle + ?Sized> Peripheral for Scale<H> {
    fn kind(&self) -> DeviceKind {
        self.core.kind()
    }

    fn connect(&self) -> bool {
        match self.core.connect() {
            ConnectOutcome::Connected => {
                self.after_connect();
                true
            }
            ConnectOutcome::AlreadyConnected => true,
            ConnectOutcome::NotConnected => false,
        }
    }

    fn disconnect(&self) {
        self.core.disconnect();
    }

    fn is_connected(&self) -> bool {
        self.core.is_connected()
    }

    fn device_name(&self) -> String {
        self.core.device_name()
    }

    fn try_lock(&self, timeout: Duration) -> Option<OperationGuard<'_>> {
        self.core.try_lock(timeout)
    }
}

impl<H: ScaleHandle + ?Sized> DriverListener for Scale<H> {
    fn on_data(&self, event: DataEvent) {
        self.core.bridge().on_data(event);
    }

    fn on_error(&self, event: ErrorEvent) {
        self.core.close_on_hardware_loss(&event);
        self.core.bridge().on_error(event);
    }

    fn on_status(&self, event: StatusEvent) {
        let live = reading_for_status(event.status, || {
            self.core.call(|handle| handle.live_weight()).ok()
        });
        if let Some(reading) = live {
            self.publish_live(reading);
        }
        self.core.bridge().on_status(event);
    }

    fn on_output_complete(&self, event: OutputCompleteEvent) {
        self.core.bridge().on_output_complete(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pos_core::NO_WEIGHT_DISPLAY;
    use pos_hardware::mock::{MockOp, MockScale};
    use pos_hardware::registry::{InMemoryRegistry, LogicalDeviceConfig};
    use rstest::rstest;

    fn scale(mock: &Arc<MockScale>) -> Arc<Scale<MockScale>> {
        let registry = Arc::new(InMemoryRegistry::new(vec![LogicalDeviceConfig::new(
            "Scale", "Magellan",
        )]));
        let scale = Scale::new(mock.clone(), registry, DeviceSettings::fast());
        assert!(scale.connect());
        scale
    }

    #[rstest]
    #[case(codes::SUE_WEIGHT_UNSTABLE)]
    #[case(codes::SUE_WEIGHT_OVERWEIGHT)]
    #[case(codes::SUE_WEIGHT_UNDER_ZERO)]
    #[case(codes::SUE_NOT_READY)]
    fn test_non_weight_statuses_display_sentinel(#[case] status: i32) {
        let reading = reading_for_status(status, || Some(1000)).unwrap();
        assert_eq!(reading.display, NO_WEIGHT_DISPLAY);
        assert!(!reading.is_weight());
    }

    #[test]
    fn test_stable_and_zero_statuses_are_weights() {
        let stable = reading_for_status(codes::SUE_STABLE_WEIGHT, || Some(3000)).unwrap();
        assert_eq!(stable.display, "3.00");
        assert_eq!(reading_for_status(codes::SUE_WEIGHT_ZERO, || None).unwrap().display, "0.00");
        assert!(reading_for_status(power::SUE_POWER_ONLINE, || None).is_none());
    }

    #[rstest]
    #[case(DriverError::extended(codes::EXT_OVERWEIGHT, "x"), "WEIGHT_OVERWEIGHT")]
    #[case(DriverError::extended(codes::EXT_UNDER_ZERO, "x"), "WEIGHT_UNDER_ZERO")]
    #[case(DriverError::extended(codes::EXT_SAME_WEIGHT, "x"), "WEIGHT_UNSTABLE")]
    #[case(DriverError::new(ErrorCode::Offline, "x"), "DEVICE_OFFLINE")]
    #[case(DriverError::new(ErrorCode::Failure, "x"), "HARDWARE_ERROR")]
    #[case(DriverError::new(ErrorCode::NoService, "x"), "UNEXPECTED_ERROR")]
    fn test_error_mapping(#[case] error: DriverError, #[case] code: &str) {
        assert_eq!(map_error(&error).code(), code);
    }

    #[test]
    fn test_stable_weight_after_retries() {
        let mock = MockScale::new("Magellan");
        mock.queue_read(Err(DriverError::timeout("settling")));
        mock.queue_read(Err(DriverError::timeout("settling")));
        mock.queue_read(Ok(3000));
        let scale = scale(&mock);

        let reading = scale.read_stable_weight(Duration::from_millis(200)).unwrap();
        assert_eq!(reading.display, "3.00");
        assert_eq!(reading.raw, Some(3000));
        assert_eq!(mock.driver().calls(MockOp::ReadWeight), 3);
    }

    #[test]
    fn test_never_settles_is_unstable() {
        let mock = MockScale::new("Magellan");
        let scale = scale(&mock);

        let error = scale.read_stable_weight(Duration::from_millis(40)).unwrap_err();
        assert_eq!(error, DeviceError::Weight(WeightError::Unstable));
    }

    #[test]
    fn test_overweight_read() {
        let mock = MockScale::new("Magellan");
        mock.queue_read(Err(DriverError::extended(codes::EXT_OVERWEIGHT, "too heavy")));
        let scale = scale(&mock);

        assert_eq!(
            scale.read_stable_weight(Duration::from_millis(100)),
            Err(DeviceError::Weight(WeightError::Overweight))
        );
    }

    #[test]
    fn test_second_read_joins_first() {
        let mock = MockScale::new("Magellan");
        let scale = scale(&mock);

        assert!(scale.start_stable_weight_read(Duration::from_millis(60)).unwrap());
        assert!(!scale.start_stable_weight_read(Duration::from_millis(60)).unwrap());
        mock.set_resting_weight(Some(1250));

        let reading = scale.read_stable_weight(Duration::from_millis(60)).unwrap();
        assert_eq!(reading.display, "1.25");
    }

    #[test]
    fn test_read_after_previous_finished_is_fresh() {
        let mock = MockScale::new("Magellan");
        let scale = scale(&mock);

        for round in 1..=20 {
            mock.queue_read(Ok(round * 10));
            mock.queue_read(Ok(round * 10 + 5));

            assert!(scale.start_stable_weight_read(Duration::from_millis(200)).unwrap());
            while scale.is_reading() {
                std::hint::spin_loop();
            }
            let reading = scale.read_stable_weight(Duration::from_millis(200)).unwrap();
            assert_eq!(reading.raw, Some(round * 10 + 5));
        }
    }

    #[test]
    fn test_live_weight_published_to_subscribers() {
        let mock = MockScale::new("Magellan");
        let scale = scale(&mock);
        let mut live = scale.subscribe_live_weight();

        mock.emit_live(codes::SUE_STABLE_WEIGHT, 4567);
        mock.emit_live(codes::SUE_WEIGHT_UNSTABLE, 0);

        assert_eq!(live.try_recv().unwrap().display, "4.57");
        assert_eq!(live.try_recv().unwrap().display, NO_WEIGHT_DISPLAY);

        scale.stop_live_weight();
        mock.emit_live(codes::SUE_STABLE_WEIGHT, 100);
        assert!(live.try_recv().is_err());
    }

    #[test]
    fn test_stable_result_is_also_live() {
        let mock = MockScale::new("Magellan");
        mock.queue_read(Ok(3000));
        let scale = scale(&mock);
        let mut live = scale.subscribe_live_weight();

        scale.read_stable_weight(Duration::from_millis(100)).unwrap();
        assert_eq!(live.try_recv().unwrap().display, "3.00");
    }

    #[test]
    fn test_connect_enables_status_notify() {
        let mock = MockScale::new("Magellan");
        let _scale = scale(&mock);
        assert!(mock.status_notify());
    }

    #[test]
    fn test_connect_disconnect_round_trip() {
        let mock = MockScale::new("Magellan");
        let scale = scale(&mock);
        scale.disconnect();

        assert!(!scale.is_connected());
        assert_eq!(mock.driver().calls(MockOp::Release), 1);
        assert_eq!(mock.driver().calls(MockOp::Close), 1);
    }
}
