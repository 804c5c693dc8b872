//! Spin-based mutual exclusion
//!
//! A busy-waiting lock for the very short critical sections around a code
//! patch. The write it guards is a handful of bytes; sleeping locks are not
//! worth their overhead there and are unusable from contexts that must not
//! block.

use std::sync::atomic::{AtomicBool, Ordering};

/// A simple spin lock.
///
/// Use only for short critical sections; waiters burn CPU until the holder
/// releases.
pub struct SpinLock {
	locked: AtomicBool,
}

impl Default for SpinLock {
	fn default() -> Self {
		Self::new()
	}
}

impl SpinLock {
	/// Creates a new unlocked `SpinLock`.
	#[must_use]
	pub const fn new() -> Self {
		Self {
			locked: AtomicBool::new(false),
		}
	}

	/// Acquires the lock and returns a guard that releases it on drop.
	pub fn guard(&self) -> SpinLockGuard<'_> {
		self.acquire();
		SpinLockGuard { lock: self }
	}

	fn acquire(&self) {
		while self.locked.swap(true, Ordering::Acquire) {
			while self.locked.load(Ordering::Relaxed) {
				std::hint::spin_loop();
			}
		}
	}

	fn release(&self) {
		self.locked.store(false, Ordering::Release);
	}
}

/// RAII guard for a [`SpinLock`]; the lock is released when the guard drops,
/// on every exit path including panics.
pub struct SpinLockGuard<'a> {
	lock: &'a SpinLock,
}

impl Drop for SpinLockGuard<'_> {
	fn drop(&mut self) {
		self.lock.release();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;
	use std::thread;

	#[test]
	fn guard_serializes_increments() {
		let lock = Arc::new(SpinLock::new());
		let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));

		let handles: Vec<_> = (0..4)
			.map(|_| {
				let lock = Arc::clone(&lock);
				let counter = Arc::clone(&counter);
				thread::spawn(move || {
					for _ in 0..1000 {
						let _guard = lock.guard();
						counter.fetch_add(1, Ordering::Relaxed);
					}
				})
			})
			.collect();

		for handle in handles {
			handle.join().unwrap();
		}
		assert_eq!(counter.load(Ordering::Relaxed), 4000);
	}
}
