// SPDX-License-Identifier: GPL-3.0-only

//! At-most-one-in-flight admission

use std::sync::atomic::{AtomicBool, Ordering};

/// Single-slot busy flag
#[derive(Debug, Default)]
pub struct BusyFlag(AtomicBool);

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot, or `None` if a frame is already in flight
    ///
    /// The slot is freed when the returned guard is dropped, including
    /// during unwinding.
    pub fn try_acquire(&self) -> Option<BusyGuard<'_>> {
        self.0
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| BusyGuard(self))
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Proof that the holder owns the in-flight slot
#[derive(Debug)]
pub struct BusyGuard<'a>(&'a BusyFlag);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_only_one_holder() {
        let flag = BusyFlag::new();
        let guard = flag.try_acquire().unwrap();
        assert!(flag.is_busy());
        assert!(flag.try_acquire().is_none());
        drop(guard);
        assert!(!flag.is_busy());
        assert!(flag.try_acquire().is_some());
    }

    #[test]
    fn test_released_on_error_path() {
        fn failing(flag: &BusyFlag) -> Result<(), String> {
            let _guard = flag.try_acquire().ok_or("busy")?;
            Err("process failed".to_string())
        }

        let flag = BusyFlag::new();
        assert!(failing(&flag).is_err());
        assert!(!flag.is_busy());
    }

    #[test]
    fn test_released_on_panic() {
        let flag = Arc::new(BusyFlag::new());
        let inner = Arc::clone(&flag);
        let result = std::thread::spawn(move || {
            let _guard = inner.try_acquire().unwrap();
            panic!("engine crashed");
        })
        .join();
        assert!(result.is_err());
        assert!(!flag.is_busy());
    }
}
