use std::collections::{ HashMap, HashSet };
use std::convert::TryFrom;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use rppal::gpio::{ Gpio, InputPin, Level, Trigger };
use tracing::{ debug, warn };

use crate::button::{ ButtonDescriptor, IrqId, LineId, LineMode };
use crate::circuit::{ IrqHandler, Platform };
use crate::error::{ Error, Result };

static GPIO: OnceCell<Gpio> = OnceCell::new();

fn gpio() -> rppal::gpio::Result<&'static Gpio> {
	GPIO.get_or_try_init(Gpio::new)
}

fn bcm(line: LineId) -> Result<u8> {
	u8::try_from(line).map_err(|_| Error::NoSuchLine(line))
}

/// Every BCM line is its own interrupt source, so a button's interrupt id
/// must be its line number.
pub fn check_wiring(button: &ButtonDescriptor) -> Result<()> {
	match button.irq {
		None => Ok(()),
		Some(irq) if irq != button.line => Err(Error::IrqNotLine {
			name: button.name.clone(),
			irq,
			line: button.line,
		}),
		Some(_) => bcm(button.line).map(|_| ()),
	}
}

/// Raspberry Pi GPIO through rppal.
///
/// Interrupt ids are BCM pin numbers. rppal runs one watcher thread per bound
/// line; the handler reads the line back through [`Platform::read_line_level`].
pub struct RpiPlatform {
	pins: Mutex<HashMap<LineId, InputPin>>,
	bound: Mutex<HashSet<IrqId>>,
}

impl RpiPlatform {
	pub fn new() -> Result<Self> {
		gpio()?;

		Ok(Self {
			pins: Mutex::new(HashMap::new()),
			bound: Mutex::new(HashSet::new()),
		})
	}

	/// Run `f` on the pin of `line` with the pin map unlocked.
	///
	/// Setting or clearing an interrupt joins the line's watcher thread,
	/// and its handler takes the map lock to read the line.
	fn with_pin<T>(&self, line: LineId, f: impl FnOnce(&mut InputPin) -> T) -> Option<T> {
		let mut pin = self.pins.lock().remove(&line)?;
		let result = f(&mut pin);

		self.pins.lock().insert(line, pin);
		Some(result)
	}
}

impl Platform for RpiPlatform {
	fn configure_line(&self, line: LineId, mode: LineMode) -> Result<()> {
		let mut pins = self.pins.lock();

		// a pin can only be taken once; keep the existing input as is
		if pins.contains_key(&line) {
			return Ok(());
		}

		let pin = gpio()?.get(bcm(line)?)?;

		let input = match mode {
			LineMode::Interrupt => pin.into_input(),
			LineMode::InterruptPullUp => pin.into_input_pullup(),
			LineMode::InterruptPullDown => pin.into_input_pulldown(),
		};

		debug!(line, ?mode, "line configured");
		pins.insert(line, input);

		Ok(())
	}

	fn read_line_level(&self, line: LineId) -> Result<Level> {
		self.pins.lock()
			.get(&line)
			.map(InputPin::read)
			.ok_or(Error::LineNotConfigured(line))
	}

	fn check_button(&self, button: &ButtonDescriptor) -> Result<()> {
		check_wiring(button)
	}

	fn bind_interrupt(
		&self,
		irq: IrqId,
		trigger: Trigger,
		name: &str,
		mut handler: IrqHandler,
	) -> Result<()> {
		if !self.pins.lock().contains_key(&irq) {
			return Err(Error::LineNotConfigured(irq));
		}

		if !self.bound.lock().insert(irq) {
			return Err(Error::IrqInUse(irq));
		}

		let result = self.with_pin(irq, |pin| {
			pin.set_async_interrupt(trigger, move |_| {
				handler();
			})
		});

		match result {
			Some(Ok(())) => {
				debug!(irq, name, "interrupt bound");
				Ok(())
			}
			Some(Err(e)) => {
				self.bound.lock().remove(&irq);
				Err(e.into())
			}
			None => {
				self.bound.lock().remove(&irq);
				Err(Error::LineNotConfigured(irq))
			}
		}
	}

	fn disable_interrupt(&self, irq: IrqId) {
		if let Some(Err(e)) = self.with_pin(irq, InputPin::clear_async_interrupt) {
			warn!(irq, "unable to disable interrupt: {}", e);
		}
	}

	fn unbind_interrupt(&self, irq: IrqId) {
		if !self.bound.lock().remove(&irq) {
			return;
		}

		if let Some(Err(e)) = self.with_pin(irq, InputPin::clear_async_interrupt) {
			warn!(irq, "unable to release interrupt: {}", e);
		}

		debug!(irq, "interrupt released");
	}
}
