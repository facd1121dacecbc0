//! Per-peripheral operation lock.

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::time::Duration;

/// Reentrant, fair, timeout-acquired lock held for one logical operation.
///
/// Contention never blocks longer than the caller's timeout; the caller turns
/// a failed acquisition into a busy error.
#[derive(Default)]
pub struct OperationLock {
    inner: ReentrantMutex<()>,
}

impl OperationLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire within `timeout`, or `None` if another thread holds the lock.
    pub fn try_lock(&self, timeout: Duration) -> Option<OperationGuard<'_>> {
        self.inner
            .try_lock_for(timeout)
            .map(|guard| OperationGuard { guard: Some(guard) })
    }

    /// Whether any thread currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}

/// Releases the operation lock fairly when dropped.
pub struct OperationGuard<'a> {
    guard: Option<ReentrantMutexGuard<'a, ()>>,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            ReentrantMutexGuard::unlock_fair(guard);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn test_reentrant_on_same_thread() {
        let lock = OperationLock::new();
        let outer = lock.try_lock(Duration::from_millis(10));
        assert!(outer.is_some());
        let inner = lock.try_lock(Duration::from_millis(10));
        assert!(inner.is_some());
    }

    #[test]
    fn test_released_on_drop() {
        let lock = Arc::new(OperationLock::new());
        drop(lock.try_lock(Duration::from_millis(10)));
        assert!(!lock.is_locked());

        let other = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || lock.try_lock(Duration::from_millis(10)).is_some())
        };
        assert!(other.join().unwrap());
    }

    #[test]
    fn test_exactly_one_of_fifty_proceeds() {
        const CALLERS: usize = 50;
        let lock = Arc::new(OperationLock::new());
        let barrier = Arc::new(Barrier::new(CALLERS));
        let proceeded = Arc::new(AtomicUsize::new(0));
        let busy = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let barrier = Arc::clone(&barrier);
                let proceeded = Arc::clone(&proceeded);
                let busy = Arc::clone(&busy);
                thread::spawn(move || {
                    barrier.wait();
                    match lock.try_lock(Duration::from_millis(20)) {
                        Some(_guard) => {
                            proceeded.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(500));
                        }
                        None => {
                            busy.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(proceeded.load(Ordering::SeqCst), 1);
        assert_eq!(busy.load(Ordering::SeqCst), CALLERS - 1);
    }
}
