//! Seam between the key device and whatever delivers line edges.

use rppal::gpio::{ Level, Trigger };

use crate::button::{ ButtonDescriptor, IrqId, LineId, LineMode };
use crate::error::Result;
use crate::irq::IrqReturn;

pub mod gpio;
pub mod sim;

pub use gpio::RpiPlatform;
pub use sim::SimPlatform;

/// Called each time a bound line sees a matching edge. The handler samples
/// the line itself, so it must not be run with any platform lock held.
pub type IrqHandler = Box<dyn FnMut() -> IrqReturn + Send + 'static>;

pub trait Platform: Send + Sync + 'static {
	/// Reject a button this platform cannot wire up, before anything is bound.
	fn check_button(&self, _button: &ButtonDescriptor) -> Result<()> {
		Ok(())
	}


	/// Put `line` into the given interrupt-capable input mode.
	fn configure_line(&self, line: LineId, mode: LineMode) -> Result<()>;

	fn read_line_level(&self, line: LineId) -> Result<Level>;

	/// Route edges of `irq` to `handler` until [`unbind_interrupt`](Self::unbind_interrupt).
	///
	/// Fails if `irq` is already bound. `name` labels the binding.
	fn bind_interrupt(
		&self,
		irq: IrqId,
		trigger: Trigger,
		name: &str,
		handler: IrqHandler,
	) -> Result<()>;

	/// Stop delivering edges for `irq` without releasing it.
	fn disable_interrupt(&self, _irq: IrqId) {}

	fn unbind_interrupt(&self, irq: IrqId);
}
