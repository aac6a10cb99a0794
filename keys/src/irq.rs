use rppal::gpio::Level;

use crate::button::ButtonDescriptor;
use crate::circuit::Platform;
use crate::state::KeyState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IrqReturn {
	/// The interrupt was not ours.
	None,
	Handled,
}

/// Edge handler for one button, run on the platform's interrupt path.
///
/// The edge only says that something happened; the button's level is read
/// from its line here. Lines are active-low, so a low line means the button
/// is down. A line that cannot be read leaves the state alone. Only the state
/// lock and the wait queue's wake side are touched; this path never parks on
/// the wait queue and never allocates.
pub fn button_interrupt<P>(platform: &P, state: &KeyState, button: &ButtonDescriptor) -> IrqReturn
where
	P: Platform + ?Sized,
{
	let down = match platform.read_line_level(button.line) {
		Ok(level) => level == Level::Low,
		Err(_) => return IrqReturn::None,
	};

	if state.record(button.index, down) {
		state.wait_queue().wake_all();
	}

	IrqReturn::Handled
}
