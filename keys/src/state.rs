use parking_lot::{ Mutex, MutexGuard };

use crate::wait::WaitQueue;

pub const RELEASED: u8 = b'0';
pub const PRESSED: u8 = b'1';

/// Latest level of every button plus the "changed since last read" flag.
#[derive(Debug)]
pub(crate) struct Snapshot {
	pub(crate) levels: Vec<u8>,
	pub(crate) pending: bool,
}

/// Shared between the interrupt handlers of one device and its readers.
///
/// The lock is only ever held for a few byte writes or a copy of the levels,
/// never across a sleep, so the interrupt path can take it without waiting on
/// a reader.
pub struct KeyState {
	snapshot: Mutex<Snapshot>,
	waitq: WaitQueue,
}

impl KeyState {
	pub fn new(buttons: usize) -> Self {
		Self {
			snapshot: Mutex::new(Snapshot {
				levels: vec![RELEASED; buttons],
				pending: false,
			}),
			waitq: WaitQueue::new(),
		}
	}

	pub fn len(&self) -> usize {
		self.snapshot.lock().levels.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn levels(&self) -> Vec<u8> {
		self.snapshot.lock().levels.clone()
	}

	pub fn is_pending(&self) -> bool {
		self.snapshot.lock().pending
	}

	/// Consumers currently blocked in a read.
	pub fn waiters(&self) -> usize {
		self.waitq.sleepers()
	}

	pub fn wait_queue(&self) -> &WaitQueue {
		&self.waitq
	}

	pub(crate) fn lock(&self) -> MutexGuard<'_, Snapshot> {
		self.snapshot.lock()
	}

	/// Store a new level for button `index`, arming the pending flag.
	///
	/// Returns false, touching nothing, when the stored level already matches.
	/// Does not wake anyone; callers follow a `true` with a wake.
	pub fn record(&self, index: usize, down: bool) -> bool {
		let mut snapshot = self.snapshot.lock();

		let level = match snapshot.levels.get_mut(index) {
			Some(level) => level,
			None => return false,
		};

		if (*level & 1 == 1) == down {
			return false;
		}

		*level = RELEASED + down as u8;
		snapshot.pending = true;

		true
	}
}
