//! Lock helpers that recover from poisoning.

use std::sync::{Mutex, MutexGuard};

/// Acquire a lock even if a previous holder panicked.
///
/// A panic while holding one of our locks leaves plain data (prompt logs,
/// injected failures) that is still usable, so the poison flag is discarded.
pub trait IgnoreLock<T> {
    /// Lock the mutex, ignoring any poison error.
    fn lock_ignore_poison(&self) -> MutexGuard<'_, T>;
}

impl<T> IgnoreLock<T> for Mutex<T> {
    fn lock_ignore_poison(&self) -> MutexGuard<'_, T> {
        match self.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_poisoned_mutex_still_usable() {
        let shared = Arc::new(Mutex::new(vec![1]));
        let cloned = Arc::clone(&shared);
        let outcome = thread::spawn(move || {
            let _guard = cloned.lock_ignore_poison();
            panic!("poison the lock");
        })
        .join();
        assert!(outcome.is_err());

        shared.lock_ignore_poison().push(2);
        assert_eq!(*shared.lock_ignore_poison(), vec![1, 2]);
    }
}
