//! The key device as consumers see it.
//!
//! A [`KeyDevice`] lives as long as the module would: it owns the button
//! table, the shared [`KeyState`] and the platform. Opening it binds every
//! button's interrupt and yields a [`Handle`]; reading the handle returns one
//! `'0'`/`'1'` byte per button, in table order, once something has changed.

use std::cmp::min;
use std::io::{ self, Read, Write };
use std::ops::BitOr;
use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::{ Arc, Weak };

use parking_lot::Mutex;
use rppal::gpio::Trigger;
use tracing::{ debug, info, warn };

use crate::button::{ ButtonTable, IrqId };
use crate::circuit::{ IrqHandler, Platform };
use crate::error::{ Error, Result };
use crate::irq::{ button_interrupt, IrqReturn };
use crate::state::KeyState;
use crate::wait::Poller;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpenFlags {
	pub nonblocking: bool,
}

impl OpenFlags {
	pub fn nonblocking() -> Self {
		Self { nonblocking: true }
	}
}

/// Readiness reported by [`Handle::poll`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollMask(u16);

impl PollMask {
	pub const EMPTY: PollMask = PollMask(0);
	/// Data available to read
	pub const POLLIN: PollMask = PollMask(0x0001);
	pub const POLLRDNORM: PollMask = PollMask(0x0040);

	pub fn bits(self) -> u16 {
		self.0
	}

	pub fn contains(self, other: PollMask) -> bool {
		self.0 & other.0 == other.0
	}

	pub fn is_readable(self) -> bool {
		self.contains(PollMask::POLLIN)
	}
}

impl BitOr for PollMask {
	type Output = PollMask;

	fn bitor(self, rhs: PollMask) -> PollMask {
		PollMask(self.0 | rhs.0)
	}
}

struct Inner<P: Platform> {
	name: String,
	platform: Arc<P>,
	table: ButtonTable,
	state: Arc<KeyState>,
	bound: Mutex<Vec<IrqId>>,
}

impl<P: Platform> Inner<P> {
	fn unwind(&self, acquired: &[IrqId]) {
		for &irq in acquired.iter().rev() {
			self.platform.disable_interrupt(irq);
			self.platform.unbind_interrupt(irq);
		}
	}

	fn release(&self) {
		let irqs = std::mem::take(&mut *self.bound.lock());

		for &irq in &irqs {
			self.platform.unbind_interrupt(irq);
		}

		if !irqs.is_empty() {
			info!(device = %self.name, released = irqs.len(), "closed");
		}
	}
}

impl<P: Platform> Drop for Inner<P> {
	fn drop(&mut self) {
		self.release();
		info!(device = %self.name, "removed");
	}
}

pub struct KeyDevice<P: Platform> {
	inner: Arc<Inner<P>>,
}

impl<P: Platform> KeyDevice<P> {
	/// Set up the device with every button released and nothing pending.
	///
	/// Fails if `platform` cannot wire one of the buttons.
	pub fn new(name: &str, platform: P, table: ButtonTable) -> Result<Self> {
		for button in table.iter() {
			platform.check_button(button)?;
		}

		let state = Arc::new(KeyState::new(table.len()));

		info!(device = name, buttons = table.len(), "initialized");

		Ok(Self {
			inner: Arc::new(Inner {
				name: name.to_owned(),
				platform: Arc::new(platform),
				table,
				state,
				bound: Mutex::new(Vec::new()),
			}),
		})
	}

	pub fn name(&self) -> &str {
		&self.inner.name
	}

	pub fn platform(&self) -> &P {
		&self.inner.platform
	}

	pub fn table(&self) -> &ButtonTable {
		&self.inner.table
	}

	pub fn state(&self) -> &KeyState {
		&self.inner.state
	}

	/// Bind every button's interrupt, both edges.
	///
	/// Buttons without an interrupt are skipped. If any bind fails, the
	/// interrupts bound by this call are disabled and released in reverse
	/// order and the open fails with [`Error::Busy`].
	pub fn open(&self, flags: OpenFlags) -> Result<Handle<P>> {
		let inner = &self.inner;
		let mut bound = inner.bound.lock();
		let mut acquired = Vec::with_capacity(inner.table.len());

		for button in inner.table.iter() {
			let irq = match button.irq {
				Some(irq) => irq,
				None => {
					debug!(button = %button.name, "no interrupt, skipped");
					continue;
				}
			};

			if let Err(e) = inner.platform.configure_line(button.line, button.mode) {
				warn!(button = %button.name, line = button.line, "unable to configure line: {}", e);
				inner.unwind(&acquired);
				return Err(e);
			}

			let handler: IrqHandler = {
				let platform: Weak<P> = Arc::downgrade(&inner.platform);
				let state = Arc::clone(&inner.state);
				let button = button.clone();

				Box::new(move || match platform.upgrade() {
					Some(platform) => button_interrupt(&*platform, &state, &button),
					None => IrqReturn::None,
				})
			};

			if let Err(e) = inner.platform.bind_interrupt(irq, Trigger::Both, &button.name, handler) {
				warn!(button = %button.name, irq, "unable to bind interrupt: {}", e);
				inner.unwind(&acquired);
				return Err(Error::Busy);
			}

			acquired.push(irq);
		}

		info!(device = %inner.name, bound = acquired.len(), "opened");
		bound.extend(acquired);

		Ok(Handle {
			device: Arc::clone(inner),
			nonblocking: AtomicBool::new(flags.nonblocking),
			signal: Arc::new(AtomicBool::new(false)),
			closed: false,
		})
	}

	/// Release every interrupt still bound. Safe to call any number of times.
	pub fn release(&self) {
		self.inner.release();
	}
}

/// An open key device.
///
/// Closing (or dropping) the handle releases the interrupts bound at open.
/// The handle may be shared between threads; all of them read the same
/// pending flag.
pub struct Handle<P: Platform> {
	device: Arc<Inner<P>>,
	nonblocking: AtomicBool,
	signal: Arc<AtomicBool>,
	closed: bool,
}

impl<P: Platform> Handle<P> {
	pub fn is_nonblocking(&self) -> bool {
		self.nonblocking.load(Ordering::SeqCst)
	}

	pub fn set_nonblocking(&self, nonblocking: bool) {
		self.nonblocking.store(nonblocking, Ordering::SeqCst);
	}

	pub fn state(&self) -> &KeyState {
		&self.device.state
	}

	pub fn interrupter(&self) -> Interrupter {
		Interrupter {
			signal: Arc::clone(&self.signal),
			state: Arc::clone(&self.device.state),
		}
	}

	/// Read up to `buf.len()` bytes of the button snapshot.
	pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
		let count = buf.len();
		self.read_to(buf, count)
	}

	/// Wait for an unread change, then write up to `count` snapshot bytes to `out`.
	///
	/// The pending flag is cleared together with taking the snapshot, so a
	/// change that lands afterwards arms the next read. A failing `out` is a
	/// [`Error::Fault`] and the change stays consumed.
	pub fn read_to<W: Write>(&self, mut out: W, count: usize) -> Result<usize> {
		let state = &self.device.state;
		let mut levels = vec![0; min(self.device.table.len(), count)];

		{
			let mut snapshot = state.lock();

			if !snapshot.pending {
				if self.is_nonblocking() {
					return Err(Error::WouldBlock);
				}

				state.wait_queue().wait_event(&mut snapshot, |s| s.pending, &self.signal)?;
			}

			snapshot.pending = false;
			let n = levels.len();
			levels.copy_from_slice(&snapshot.levels[..n]);
		}

		out.write_all(&levels).map_err(|_| Error::Fault)?;

		Ok(levels.len())
	}

	/// Report readiness without blocking, registering `poller` for the next change.
	pub fn poll(&self, poller: Option<&Poller>) -> PollMask {
		let state = &self.device.state;

		if let Some(poller) = poller {
			state.wait_queue().register(poller);
		}

		if state.is_pending() {
			PollMask::POLLIN | PollMask::POLLRDNORM
		} else {
			PollMask::EMPTY
		}
	}

	/// Stop waking `poller` on changes to this device.
	pub fn unregister(&self, poller: &Poller) {
		self.device.state.wait_queue().unregister(poller);
	}

	pub fn close(mut self) {
		self.device.release();
		self.closed = true;
	}
}

impl<P: Platform> Drop for Handle<P> {
	fn drop(&mut self) {
		if !self.closed {
			self.device.release();
		}
	}
}

impl<P: Platform> Read for Handle<P> {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		let count = buf.len();
		Ok(self.read_to(buf, count)?)
	}
}

/// Cancels a blocking read on the handle it came from.
///
/// A cancellation stays pending until one read that has to wait consumes it.
#[derive(Clone)]
pub struct Interrupter {
	signal: Arc<AtomicBool>,
	state: Arc<KeyState>,
}

impl Interrupter {
	pub fn interrupt(&self) {
		self.signal.store(true, Ordering::SeqCst);

		// a reader between its checks and its sleep holds the lock
		drop(self.state.lock());
		self.state.wait_queue().wake_all();
	}
}
