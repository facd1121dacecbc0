//! Event bridge: turn driver callbacks into a blocking, cancellable wait.
//!
//! The bridge is a single-slot barrier. [`EventBridge::start_event_listeners`]
//! arms it at the current generation; the first callback that arrives while
//! armed stores its event, advances the generation and disarms, so exactly
//! one event is delivered per armed wait. [`EventBridge::wait_for_event`]
//! blocks until the generation moves past the armed one.

use crate::events::{DataEvent, DriverEvent, ErrorEvent, OutputCompleteEvent, StatusEvent};
use crate::traits::DriverListener;
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::trace;

/// Decides whether a status update should satisfy a wait.
pub type StatusFilter = fn(i32) -> bool;

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    armed_at: u64,
    armed: bool,
    pending: Option<DriverEvent>,
}

/// Single-slot synchronizer between driver callbacks and one waiting caller.
pub struct EventBridge {
    slot: Mutex<Slot>,
    signal: Condvar,
    is_failure_status: StatusFilter,
}

impl EventBridge {
    /// Create a bridge that forwards only statuses `is_failure_status` accepts.
    pub fn new(is_failure_status: StatusFilter) -> Self {
        Self {
            slot: Mutex::new(Slot::default()),
            signal: Condvar::new(),
            is_failure_status,
        }
    }

    /// Arm a one-shot wait. Any previously captured event is discarded.
    ///
    /// That includes a cancel from [`EventBridge::stop_waiting_for_event`]
    /// issued before arming. A caller cancelling a wait it cannot see armed
    /// must repeat the cancel until the waiting operation returns.
    pub fn start_event_listeners(&self) {
        let mut slot = self.slot.lock();
        slot.armed_at = slot.generation;
        slot.armed = true;
        slot.pending = None;
    }

    /// Whether a wait is armed and no event has arrived yet.
    pub fn is_armed(&self) -> bool {
        self.slot.lock().armed
    }

    /// Record an event if armed. Returns whether the event was captured.
    pub fn record(&self, event: DriverEvent) -> bool {
        let mut slot = self.slot.lock();
        if !slot.armed {
            trace!(?event, "Event arrived while not armed");
            return false;
        }
        slot.pending = Some(event);
        slot.armed = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.signal.notify_all();
        true
    }

    /// Block until the armed wait is satisfied, or `timeout` elapses.
    ///
    /// With `None` the call blocks until an event arrives or the wait is
    /// cancelled. On expiry the wait is disarmed and a synthetic timeout error
    /// is returned. The captured event is consumed.
    pub fn wait_for_event(&self, timeout: Option<Duration>) -> DriverEvent {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut slot = self.slot.lock();

        while slot.generation == slot.armed_at && slot.armed {
            match deadline {
                Some(deadline) => {
                    if self.signal.wait_until(&mut slot, deadline).timed_out()
                        && slot.generation == slot.armed_at
                    {
                        slot.armed = false;
                        return DriverEvent::Error(ErrorEvent::cancelled());
                    }
                }
                None => self.signal.wait(&mut slot),
            }
        }

        slot.pending
            .take()
            .unwrap_or_else(|| DriverEvent::Error(ErrorEvent::cancelled()))
    }

    /// Cancel the armed wait by injecting a synthetic timeout.
    ///
    /// A real event that already arrived is left in place.
    pub fn stop_waiting_for_event(&self) {
        let mut slot = self.slot.lock();
        if slot.pending.is_some() {
            return;
        }
        slot.pending = Some(DriverEvent::Error(ErrorEvent::cancelled()));
        slot.armed = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.signal.notify_all();
    }

    /// Whether a status update passes the failure filter.
    pub fn is_failure_status(&self, status: i32) -> bool {
        (self.is_failure_status)(status)
    }
}

impl DriverListener for EventBridge {
    fn on_data(&self, event: DataEvent) {
        self.record(DriverEvent::Data(event));
    }

    fn on_error(&self, event: ErrorEvent) {
        self.record(DriverEvent::Error(event));
    }

    fn on_status(&self, event: StatusEvent) {
        if self.is_failure_status(event.status) {
            self.record(DriverEvent::StatusUpdate(event));
        }
    }

    fn on_output_complete(&self, event: OutputCompleteEvent) {
        self.record(DriverEvent::OutputComplete(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::power;
    use crate::error::ErrorCode;
    use std::sync::Arc;
    use std::thread;

    fn bridge() -> Arc<EventBridge> {
        Arc::new(EventBridge::new(power::is_failure))
    }

    #[test]
    fn test_returns_recorded_event() {
        let bridge = bridge();
        bridge.start_event_listeners();
        bridge.on_output_complete(OutputCompleteEvent { output_id: 7 });

        let event = bridge.wait_for_event(Some(Duration::from_secs(1)));
        assert_eq!(event, DriverEvent::OutputComplete(OutputCompleteEvent { output_id: 7 }));
    }

    #[test]
    fn test_first_event_wins_until_rearmed() {
        let bridge = bridge();
        bridge.start_event_listeners();
        bridge.on_data(DataEvent { status: 1 });
        bridge.on_data(DataEvent { status: 2 });

        assert_eq!(
            bridge.wait_for_event(Some(Duration::from_millis(50))),
            DriverEvent::Data(DataEvent { status: 1 })
        );
    }

    #[test]
    fn test_events_before_arming_are_ignored() {
        let bridge = bridge();
        bridge.on_data(DataEvent { status: 1 });
        bridge.start_event_listeners();

        assert!(bridge.wait_for_event(Some(Duration::from_millis(20))).is_cancellation());
    }

    #[test]
    fn test_stop_without_pending_event_injects_timeout() {
        let bridge = bridge();
        bridge.start_event_listeners();
        bridge.stop_waiting_for_event();

        let event = bridge.wait_for_event(None);
        assert!(event.is_cancellation());
        assert_eq!(event.as_error().map(|e| e.code), Some(ErrorCode::Timeout));
    }

    #[test]
    fn test_stop_before_arming_is_discarded() {
        let bridge = bridge();
        bridge.stop_waiting_for_event();
        bridge.start_event_listeners();

        let started = Instant::now();
        assert!(bridge.wait_for_event(Some(Duration::from_millis(40))).is_cancellation());
        assert!(started.elapsed() >= Duration::from_millis(40));

        bridge.start_event_listeners();
        let waiter = {
            let bridge = Arc::clone(&bridge);
            thread::spawn(move || bridge.wait_for_event(None))
        };
        while !waiter.is_finished() {
            bridge.stop_waiting_for_event();
            thread::sleep(Duration::from_millis(5));
        }
        assert!(waiter.join().unwrap().is_cancellation());
    }

    #[test]
    fn test_stop_keeps_real_event() {
        let bridge = bridge();
        bridge.start_event_listeners();
        bridge.on_error(ErrorEvent::new(ErrorCode::Extended, 203));
        bridge.stop_waiting_for_event();

        let event = bridge.wait_for_event(None);
        assert!(!event.is_cancellation());
        assert_eq!(event.as_error().map(|e| e.extended), Some(203));
    }

    #[test]
    fn test_stop_unblocks_waiter_on_other_thread() {
        let bridge = bridge();
        bridge.start_event_listeners();

        let waiter = {
            let bridge = Arc::clone(&bridge);
            thread::spawn(move || bridge.wait_for_event(None))
        };
        thread::sleep(Duration::from_millis(20));
        bridge.stop_waiting_for_event();

        assert!(waiter.join().unwrap().is_cancellation());
    }

    #[test]
    fn test_callback_from_other_thread_wakes_waiter() {
        let bridge = bridge();
        bridge.start_event_listeners();

        let producer = {
            let bridge = Arc::clone(&bridge);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                bridge.on_data(DataEvent { status: 42 });
            })
        };

        let event = bridge.wait_for_event(Some(Duration::from_secs(2)));
        producer.join().unwrap();
        assert_eq!(event, DriverEvent::Data(DataEvent { status: 42 }));
    }

    #[test]
    fn test_wait_times_out_with_synthetic_error() {
        let bridge = bridge();
        bridge.start_event_listeners();

        let event = bridge.wait_for_event(Some(Duration::from_millis(10)));
        assert!(event.is_cancellation());
        assert!(!bridge.is_armed());
    }

    #[test]
    fn test_benign_status_is_suppressed() {
        let bridge = bridge();
        bridge.start_event_listeners();
        bridge.on_status(StatusEvent { status: power::SUE_POWER_ONLINE });
        assert!(bridge.is_armed());

        bridge.on_status(StatusEvent { status: power::SUE_POWER_OFF_OFFLINE });
        assert_eq!(
            bridge.wait_for_event(Some(Duration::from_millis(50))),
            DriverEvent::StatusUpdate(StatusEvent { status: power::SUE_POWER_OFF_OFFLINE })
        );
    }

    #[test]
    fn test_rearm_discards_consumed_event() {
        let bridge = bridge();
        bridge.start_event_listeners();
        bridge.on_data(DataEvent { status: 1 });
        bridge.wait_for_event(None);

        bridge.start_event_listeners();
        bridge.on_data(DataEvent { status: 2 });
        assert_eq!(bridge.wait_for_event(None), DriverEvent::Data(DataEvent { status: 2 }));
    }
}
