//! In-process lines for tests and dry runs.
//!
//! Levels are set from the outside with [`SimPlatform::press`] and friends;
//! a level change fires the bound handlers synchronously on the caller's
//! thread, which plays the part of the interrupt path. Handlers run with the
//! simulator unlocked, so they may read lines back.

use std::collections::{ HashMap, HashSet };
use std::sync::Arc;

use parking_lot::Mutex;
use rppal::gpio::{ Level, Trigger };

use crate::button::{ ButtonTable, IrqId, LineId, LineMode };
use crate::circuit::{ IrqHandler, Platform };
use crate::error::{ Error, Result };

struct Binding {
	line: LineId,
	trigger: Trigger,
	name: String,
	handler: Arc<Mutex<IrqHandler>>,
	enabled: bool,
}

#[derive(Default)]
struct SimInner {
	levels: HashMap<LineId, Level>,
	modes: HashMap<LineId, LineMode>,
	wiring: HashMap<IrqId, LineId>,
	bindings: HashMap<IrqId, Binding>,
	failing: HashSet<IrqId>,
	disabled: Vec<IrqId>,
	released: Vec<IrqId>,
}

impl SimInner {
	fn line_of(&self, irq: IrqId) -> LineId {
		self.wiring.get(&irq).copied().unwrap_or(irq)
	}

	fn level(&self, line: LineId) -> Level {
		match self.levels.get(&line) {
			Some(&level) => level,
			None => idle_level(self.modes.get(&line).copied().unwrap_or_default()),
		}
	}

	/// Handlers of every enabled binding on `line` whose trigger accepts the
	/// edge. `rising` is `None` for a retrigger with no level change.
	fn handlers(&self, line: LineId, rising: Option<bool>) -> Vec<Arc<Mutex<IrqHandler>>> {
		self.bindings.values()
			.filter(|binding| binding.line == line && binding.enabled)
			.filter(|binding| match (binding.trigger, rising) {
				(Trigger::Disabled, _) => false,
				(Trigger::Both, _) | (_, None) => true,
				(Trigger::RisingEdge, Some(rising)) => rising,
				(Trigger::FallingEdge, Some(rising)) => !rising,
			})
			.map(|binding| Arc::clone(&binding.handler))
			.collect()
	}
}

fn idle_level(mode: LineMode) -> Level {
	match mode {
		LineMode::InterruptPullDown => Level::Low,
		LineMode::Interrupt | LineMode::InterruptPullUp => Level::High,
	}
}

/// Simulated lines. Interrupt ids map to the line of the same number unless
/// [`wire`](Self::wire)d otherwise.
#[derive(Default)]
pub struct SimPlatform {
	inner: Mutex<SimInner>,
}

impl SimPlatform {
	pub fn new() -> Self {
		Self::default()
	}

	/// Wire each button's interrupt to its line.
	pub fn for_table(table: &ButtonTable) -> Self {
		let sim = Self::new();

		for button in table.iter() {
			if let Some(irq) = button.irq {
				sim.wire(irq, button.line);
			}
		}

		sim
	}

	pub fn wire(&self, irq: IrqId, line: LineId) {
		self.inner.lock().wiring.insert(irq, line);
	}

	/// Make every later bind of `irq` fail.
	pub fn fail_bind(&self, irq: IrqId) {
		self.inner.lock().failing.insert(irq);
	}

	/// Drive an active-low line low.
	pub fn press(&self, line: LineId) {
		self.set_level(line, Level::Low);
	}

	pub fn release(&self, line: LineId) {
		self.set_level(line, Level::High);
	}

	pub fn set_level(&self, line: LineId, level: Level) {
		let before = self.set_level_quietly(line, level);

		if before != level {
			self.fire(line, Some(level == Level::High));
		}
	}

	/// Move the line without firing anything, as if the edge was missed.
	/// Returns the level it had before.
	pub fn set_level_quietly(&self, line: LineId, level: Level) -> Level {
		let mut inner = self.inner.lock();
		let before = inner.level(line);

		inner.levels.insert(line, level);
		before
	}

	/// Fire the line's interrupt without changing its level.
	pub fn retrigger(&self, line: LineId) {
		self.fire(line, None);
	}

	fn fire(&self, line: LineId, rising: Option<bool>) {
		let handlers = self.inner.lock().handlers(line, rising);

		for handler in handlers {
			let mut handler = handler.lock();
			(*handler)();
		}
	}

	/// Currently bound interrupts, ascending.
	pub fn bound(&self) -> Vec<IrqId> {
		let mut bound: Vec<_> = self.inner.lock().bindings.keys().copied().collect();
		bound.sort_unstable();
		bound
	}

	pub fn binding_name(&self, irq: IrqId) -> Option<String> {
		self.inner.lock().bindings.get(&irq).map(|b| b.name.clone())
	}

	pub fn trigger(&self, irq: IrqId) -> Option<Trigger> {
		self.inner.lock().bindings.get(&irq).map(|b| b.trigger)
	}

	/// Interrupts released so far, in release order.
	pub fn released(&self) -> Vec<IrqId> {
		self.inner.lock().released.clone()
	}

	/// Interrupts disabled so far, in order.
	pub fn disabled(&self) -> Vec<IrqId> {
		self.inner.lock().disabled.clone()
	}

	pub fn mode(&self, line: LineId) -> Option<LineMode> {
		self.inner.lock().modes.get(&line).copied()
	}
}

impl Platform for SimPlatform {
	fn configure_line(&self, line: LineId, mode: LineMode) -> Result<()> {
		self.inner.lock().modes.insert(line, mode);
		Ok(())
	}

	fn read_line_level(&self, line: LineId) -> Result<Level> {
		let inner = self.inner.lock();

		if inner.modes.contains_key(&line) || inner.levels.contains_key(&line) {
			Ok(inner.level(line))
		} else {
			Err(Error::LineNotConfigured(line))
		}
	}

	fn bind_interrupt(
		&self,
		irq: IrqId,
		trigger: Trigger,
		name: &str,
		handler: IrqHandler,
	) -> Result<()> {
		let mut inner = self.inner.lock();

		if inner.failing.contains(&irq) || inner.bindings.contains_key(&irq) {
			return Err(Error::IrqInUse(irq));
		}

		let line = inner.line_of(irq);
		inner.bindings.insert(irq, Binding {
			line,
			trigger,
			name: name.to_owned(),
			handler: Arc::new(Mutex::new(handler)),
			enabled: true,
		});

		Ok(())
	}

	fn disable_interrupt(&self, irq: IrqId) {
		let mut inner = self.inner.lock();

		if let Some(binding) = inner.bindings.get_mut(&irq) {
			binding.enabled = false;
			inner.disabled.push(irq);
		}
	}

	fn unbind_interrupt(&self, irq: IrqId) {
		let mut inner = self.inner.lock();

		if inner.bindings.remove(&irq).is_some() {
			inner.released.push(irq);
		}
	}
}
