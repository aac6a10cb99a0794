//! Wait queue shared by the interrupt path and blocking consumers.
//!
//! Sleepers park on a condition variable paired with the caller's lock and
//! re-check their condition on every wakeup. Multiplexing callers instead
//! register a [`Poller`], which is signalled on every wakeup but never parks
//! on the queue itself.

use std::sync::atomic::{ AtomicBool, AtomicUsize, Ordering };
use std::sync::{ Arc, Weak };
use std::time::{ Duration, Instant };

use parking_lot::{ Condvar, Mutex, MutexGuard };

use crate::error::{ Error, Result };

#[derive(Default)]
pub struct WaitQueue {
	condvar: Condvar,
	sleepers: AtomicUsize,
	pollers: Mutex<Vec<Weak<PollEntry>>>,
}

impl WaitQueue {
	pub fn new() -> Self {
		Self::default()
	}

	/// Sleep until `ready` holds for the guarded value.
	///
	/// `guard` must be the lock every waker takes before changing what
	/// `ready` looks at. A pending `signal` is consumed and ends the wait
	/// with [`Error::Interrupted`], but only while `ready` is false.
	pub fn wait_event<T, F>(
		&self,
		guard: &mut MutexGuard<'_, T>,
		mut ready: F,
		signal: &AtomicBool,
	) -> Result<()>
	where
		F: FnMut(&T) -> bool,
	{
		self.sleepers.fetch_add(1, Ordering::SeqCst);

		let result = loop {
			if ready(&**guard) {
				break Ok(());
			}

			if signal.swap(false, Ordering::SeqCst) {
				break Err(Error::Interrupted);
			}

			self.condvar.wait(guard);
		};

		self.sleepers.fetch_sub(1, Ordering::SeqCst);

		result
	}

	/// Wake every sleeper and every registered poller. Never blocks on a sleeper.
	pub fn wake_all(&self) {
		self.condvar.notify_all();

		let mut pollers = self.pollers.lock();
		pollers.retain(|entry| match entry.upgrade() {
			Some(entry) => {
				entry.wake();
				true
			}
			None => false,
		});
	}

	/// Add `poller` to the set signalled by [`wake_all`](Self::wake_all).
	pub fn register(&self, poller: &Poller) {
		let mut pollers = self.pollers.lock();

		let known = pollers.iter()
			.any(|entry| entry.as_ptr() == Arc::as_ptr(&poller.entry));

		if !known {
			pollers.retain(|entry| entry.strong_count() > 0);
			pollers.push(Arc::downgrade(&poller.entry));
		}
	}

	/// Remove `poller`, along with any registration whose poller is gone.
	pub fn unregister(&self, poller: &Poller) {
		self.pollers.lock().retain(|entry| {
			entry.strong_count() > 0 && entry.as_ptr() != Arc::as_ptr(&poller.entry)
		});
	}

	/// Number of callers currently parked in [`wait_event`](Self::wait_event).
	pub fn sleepers(&self) -> usize {
		self.sleepers.load(Ordering::SeqCst)
	}

	pub fn registered(&self) -> usize {
		self.pollers.lock().iter()
			.filter(|entry| entry.strong_count() > 0)
			.count()
	}
}

#[derive(Default)]
struct PollEntry {
	woken: Mutex<bool>,
	condvar: Condvar,
}

impl PollEntry {
	fn wake(&self) {
		*self.woken.lock() = true;
		self.condvar.notify_all();
	}
}

/// Readiness registration for a caller watching several sources at once.
///
/// Register it with each source (for a key device: [`Handle::poll`]), check
/// the returned masks, then [`wait`](Self::wait) if nothing is ready. A
/// wakeup that lands between registering and waiting is not lost.
///
/// [`Handle::poll`]: crate::device::Handle::poll
#[derive(Default)]
pub struct Poller {
	entry: Arc<PollEntry>,
}

impl Poller {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn wait(&self) {
		let mut woken = self.entry.woken.lock();

		while !*woken {
			self.entry.condvar.wait(&mut woken);
		}

		*woken = false;
	}

	/// Returns false if `timeout` elapsed without a wakeup.
	pub fn wait_timeout(&self, timeout: Duration) -> bool {
		let deadline = Instant::now() + timeout;
		let mut woken = self.entry.woken.lock();

		while !*woken {
			if self.entry.condvar.wait_until(&mut woken, deadline).timed_out() {
				break;
			}
		}

		std::mem::replace(&mut *woken, false)
	}
}
