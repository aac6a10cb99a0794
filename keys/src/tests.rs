#![cfg(test)]

use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::{ Arc, Weak };
use std::time::Duration;
use std::thread;

use rppal::gpio::{ Level, Trigger };

use crate::button::{ ButtonDescriptor, ButtonTable, LineMode };
use crate::circuit::{ IrqHandler, Platform, RpiPlatform, SimPlatform };
use crate::circuit::gpio::check_wiring;
use crate::config::Config;
use crate::device::{ KeyDevice, OpenFlags, PollMask };
use crate::error::{ errno, Error };
use crate::irq::{ button_interrupt, IrqReturn };
use crate::state::KeyState;
use crate::wait::{ Poller, WaitQueue };

const CONFIG: &str = r#"
device_name = "buttons"

[[buttons]]
name = "KEY0"
line = 17
irq = 17

[[buttons]]
name = "KEY1"
line = 27
mode = "interrupt_pull_down"
"#;

fn descriptor(index: usize) -> ButtonDescriptor {
	ButtonDescriptor {
		irq: Some(index as u32),
		line: index as u32,
		mode: LineMode::default(),
		index,
		name: format!("KEY{}", index),
	}
}

#[test]
fn test_config() {
	let config: Config = CONFIG.parse().unwrap();

	assert_eq!(config.device_name(), "buttons");
	assert_eq!(config.buttons().len(), 2);
	assert_eq!(config.buttons()[0].irq, Some(17));
	assert_eq!(config.buttons()[0].mode, LineMode::InterruptPullUp);
	assert_eq!(config.buttons()[1].irq, None);
	assert_eq!(config.buttons()[1].mode, LineMode::InterruptPullDown);

	let table = ButtonTable::from_config(config.buttons()).unwrap();
	assert_eq!(table.len(), 2);
	assert_eq!(table[1].index, 1);
	assert_eq!(table[1].name, "KEY1");
}

#[test]
fn test_config_defaults() {
	let config: Config = "".parse().unwrap();

	assert_eq!(config.device_name(), "keys");
	assert!(config.buttons().is_empty());

	assert!(matches!("buttons = 3".parse::<Config>(), Err(Error::Config(_))));
}

#[test]
fn test_table_duplicates() {
	let config: Config = r#"
		[[buttons]]
		name = "A"
		line = 5
		irq = 5

		[[buttons]]
		name = "B"
		line = 6
		irq = 5
	"#.parse().unwrap();

	match ButtonTable::from_config(config.buttons()) {
		Err(Error::DuplicateIrq { irq, first, second }) => {
			assert_eq!(irq, 5);
			assert_eq!(first, "A");
			assert_eq!(second, "B");
		}
		other => panic!("unexpected {:?}", other),
	}

	let config: Config = r#"
		[[buttons]]
		name = "A"
		line = 5

		[[buttons]]
		name = "B"
		line = 5
	"#.parse().unwrap();

	assert!(matches!(
		ButtonTable::from_config(config.buttons()),
		Err(Error::DuplicateLine { line: 5, .. })
	));
}

#[test]
fn test_record() {
	let state = KeyState::new(3);

	assert_eq!(state.levels(), b"000");
	assert!(!state.is_pending());

	// no change, no side effects
	assert!(!state.record(1, false));
	assert!(!state.is_pending());

	assert!(state.record(1, true));
	assert_eq!(state.levels(), b"010");
	assert!(state.is_pending());

	assert!(!state.record(1, true));
	assert!(state.record(1, false));
	assert_eq!(state.levels(), b"000");

	// out of range is ignored
	assert!(!state.record(3, true));
	assert_eq!(state.len(), 3);
}

#[test]
fn test_interrupt_active_low() {
	let sim = SimPlatform::new();
	let state = KeyState::new(6);
	let button = descriptor(2);

	sim.configure_line(2, LineMode::InterruptPullUp).unwrap();
	assert_eq!(button_interrupt(&sim, &state, &button), IrqReturn::Handled);
	assert!(!state.is_pending());

	sim.set_level_quietly(2, Level::Low);
	assert_eq!(button_interrupt(&sim, &state, &button), IrqReturn::Handled);
	assert_eq!(state.levels(), b"001000");
	assert!(state.is_pending());

	sim.set_level_quietly(2, Level::High);
	assert_eq!(button_interrupt(&sim, &state, &button), IrqReturn::Handled);
	assert_eq!(state.levels(), b"000000");
}

#[test]
fn test_interrupt_unreadable_line() {
	let sim = SimPlatform::new();
	let state = KeyState::new(1);

	// line 0 was never configured
	assert_eq!(button_interrupt(&sim, &state, &descriptor(0)), IrqReturn::None);
	assert_eq!(state.levels(), b"0");
	assert!(!state.is_pending());
}

#[test]
fn test_interrupt_wakes_poller() {
	let sim = SimPlatform::new();
	let state = KeyState::new(1);
	let poller = Poller::new();

	sim.configure_line(0, LineMode::InterruptPullUp).unwrap();
	state.wait_queue().register(&poller);

	// retrigger at the stored level wakes nobody
	button_interrupt(&sim, &state, &descriptor(0));
	assert!(!poller.wait_timeout(Duration::from_millis(10)));

	sim.set_level_quietly(0, Level::Low);
	button_interrupt(&sim, &state, &descriptor(0));
	assert!(poller.wait_timeout(Duration::from_millis(10)));

	// consumed by the wait
	assert!(!poller.wait_timeout(Duration::from_millis(10)));
}

#[test]
fn test_poller_registration() {
	let waitq = WaitQueue::new();
	let poller = Poller::new();

	waitq.register(&poller);
	waitq.register(&poller);
	assert_eq!(waitq.registered(), 1);

	{
		let other = Poller::new();
		waitq.register(&other);
		assert_eq!(waitq.registered(), 2);
	}

	assert_eq!(waitq.registered(), 1);

	waitq.wake_all();
	poller.wait();
}

#[test]
fn test_poller_unregister() {
	let waitq = WaitQueue::new();
	let poller = Poller::new();
	let other = Poller::new();

	waitq.register(&poller);
	waitq.register(&other);

	waitq.unregister(&poller);
	waitq.unregister(&poller);
	assert_eq!(waitq.registered(), 1);

	waitq.wake_all();
	assert!(!poller.wait_timeout(Duration::from_millis(10)));
	assert!(other.wait_timeout(Duration::from_millis(10)));

	// registering again after leaving works as before
	waitq.register(&poller);
	waitq.wake_all();
	assert!(poller.wait_timeout(Duration::from_millis(10)));
}

#[test]
fn test_wait_event_signal() {
	let waitq = WaitQueue::new();
	let lock = parking_lot::Mutex::new(false);
	let signal = AtomicBool::new(true);

	let mut guard = lock.lock();
	assert!(matches!(
		waitq.wait_event(&mut guard, |ready| *ready, &signal),
		Err(Error::Interrupted)
	));
	assert_eq!(waitq.sleepers(), 0);

	// a ready condition wins over a pending signal
	*guard = true;
	let signal = AtomicBool::new(true);
	assert!(waitq.wait_event(&mut guard, |ready| *ready, &signal).is_ok());
}

#[test]
fn test_wait_event_wakeup() {
	let shared = Arc::new((parking_lot::Mutex::new(false), WaitQueue::new()));

	let waiter = {
		let shared = Arc::clone(&shared);
		thread::spawn(move || {
			let (lock, waitq) = &*shared;
			let signal = AtomicBool::new(false);
			let mut guard = lock.lock();
			waitq.wait_event(&mut guard, |ready| *ready, &signal)
		})
	};

	while shared.1.sleepers() == 0 {
		thread::sleep(Duration::from_millis(1));
	}

	// spurious wakeup, condition still false
	shared.1.wake_all();
	thread::sleep(Duration::from_millis(10));
	assert_eq!(shared.1.sleepers(), 1);

	*shared.0.lock() = true;
	shared.1.wake_all();

	assert!(waiter.join().unwrap().is_ok());
	assert_eq!(shared.1.sleepers(), 0);
}

#[test]
fn test_errno() {
	assert_eq!(Error::Busy.errno(), errno::EBUSY);
	assert_eq!(Error::WouldBlock.errno(), errno::EAGAIN);
	assert_eq!(Error::Interrupted.errno(), errno::EINTR);
	assert_eq!(Error::Fault.errno(), errno::EFAULT);
	assert_eq!(Error::IrqInUse(3).errno(), errno::EBUSY);
	assert_eq!(Error::IrqNotLine { name: "K".into(), irq: 8, line: 192 }.errno(), errno::EINVAL);

	assert_eq!(io::Error::from(Error::WouldBlock).kind(), io::ErrorKind::WouldBlock);
	assert_eq!(io::Error::from(Error::Interrupted).kind(), io::ErrorKind::Interrupted);
	assert_eq!(io::Error::from(Error::Fault).raw_os_error(), Some(errno::EFAULT));
}

#[test]
fn test_poll_mask() {
	let mask = PollMask::POLLIN | PollMask::POLLRDNORM;

	assert_eq!(mask.bits(), 0x0041);
	assert!(mask.is_readable());
	assert!(mask.contains(PollMask::POLLRDNORM));
	assert!(!PollMask::EMPTY.is_readable());
}

fn sim_handler(sim: &Arc<SimPlatform>, state: &Arc<KeyState>, button: ButtonDescriptor) -> IrqHandler {
	let sim: Weak<SimPlatform> = Arc::downgrade(sim);
	let state = Arc::clone(state);

	Box::new(move || match sim.upgrade() {
		Some(sim) => button_interrupt(&*sim, &state, &button),
		None => IrqReturn::None,
	})
}

#[test]
fn test_sim_edges() {
	let sim = Arc::new(SimPlatform::new());
	let state = Arc::new(KeyState::new(1));
	let mut button = descriptor(0);
	button.line = 4;

	sim.configure_line(4, LineMode::InterruptPullUp).unwrap();
	assert_eq!(sim.read_line_level(4).unwrap(), Level::High);
	assert!(matches!(sim.read_line_level(5), Err(Error::LineNotConfigured(5))));

	sim.bind_interrupt(4, Trigger::FallingEdge, "KEY0", sim_handler(&sim, &state, button)).unwrap();

	assert_eq!(sim.trigger(4), Some(Trigger::FallingEdge));
	assert_eq!(sim.binding_name(4).as_deref(), Some("KEY0"));
	assert!(matches!(
		sim.bind_interrupt(4, Trigger::Both, "again", Box::new(|| IrqReturn::None)),
		Err(Error::IrqInUse(4))
	));

	sim.press(4);
	assert_eq!(sim.read_line_level(4).unwrap(), Level::Low);
	assert_eq!(state.levels(), b"1");

	// rising edge is filtered out by the trigger
	sim.release(4);
	assert_eq!(state.levels(), b"1");

	// the handler samples the line, not the edge that woke it
	sim.retrigger(4);
	assert_eq!(state.levels(), b"0");

	sim.unbind_interrupt(4);
	sim.unbind_interrupt(4);
	assert_eq!(sim.released(), vec![4]);
	assert!(sim.bound().is_empty());
}

#[test]
fn test_device_lifetime() {
	let config: Config = CONFIG.parse().unwrap();
	let table = ButtonTable::from_config(config.buttons()).unwrap();
	let device = KeyDevice::new(config.device_name(), SimPlatform::new(), table).unwrap();

	assert_eq!(device.name(), "buttons");
	assert_eq!(device.state().levels(), b"00");

	let handle = device.open(OpenFlags::default()).unwrap();

	// KEY1 has no interrupt and is left alone entirely
	assert_eq!(device.platform().bound(), vec![17]);
	assert_eq!(device.platform().mode(17), Some(LineMode::InterruptPullUp));
	assert_eq!(device.platform().mode(27), None);
	assert_eq!(device.platform().trigger(17), Some(Trigger::Both));
	assert!(!handle.is_nonblocking());

	drop(handle);
	assert!(device.platform().bound().is_empty());
	assert_eq!(device.platform().released(), vec![17]);
}

/// Simulated lines that refuse wiring a Pi cannot do.
struct PiWiring(SimPlatform);

impl Platform for PiWiring {
	fn check_button(&self, button: &ButtonDescriptor) -> crate::Result<()> {
		check_wiring(button)
	}

	fn configure_line(&self, line: u32, mode: LineMode) -> crate::Result<()> {
		self.0.configure_line(line, mode)
	}

	fn read_line_level(&self, line: u32) -> crate::Result<Level> {
		self.0.read_line_level(line)
	}

	fn bind_interrupt(&self, irq: u32, trigger: Trigger, name: &str, handler: IrqHandler) -> crate::Result<()> {
		self.0.bind_interrupt(irq, trigger, name, handler)
	}

	fn unbind_interrupt(&self, irq: u32) {
		self.0.unbind_interrupt(irq)
	}
}

#[test]
fn test_check_wiring() {
	let mut button = descriptor(0);
	button.line = 17;

	button.irq = Some(17);
	assert!(check_wiring(&button).is_ok());

	button.irq = None;
	assert!(check_wiring(&button).is_ok());

	button.irq = Some(8);
	match check_wiring(&button) {
		Err(Error::IrqNotLine { name, irq, line }) => {
			assert_eq!(name, "KEY0");
			assert_eq!(irq, 8);
			assert_eq!(line, 17);
		}
		other => panic!("unexpected {:?}", other),
	}

	button.line = 300;
	button.irq = Some(300);
	assert!(matches!(check_wiring(&button), Err(Error::NoSuchLine(300))));

	// rejected when the device is set up
	let config: Config = r#"
		[[buttons]]
		name = "KEY0"
		line = 192
		irq = 8
	"#.parse().unwrap();
	let table = ButtonTable::from_config(config.buttons()).unwrap();
	let sim = SimPlatform::new();

	assert!(KeyDevice::new("keys", SimPlatform::new(), table.clone()).is_ok());
	assert!(matches!(
		KeyDevice::new("keys", PiWiring(sim), table),
		Err(Error::IrqNotLine { irq: 8, line: 192, .. })
	));
}

/// needs a Raspberry Pi with a button from BCM 17 to ground
#[test] #[ignore]
fn test_hardware_open() -> crate::Result<()> {
	let config: Config = CONFIG.parse()?;
	let table = ButtonTable::from_config(config.buttons())?;
	let device = KeyDevice::new("keys", RpiPlatform::new()?, table)?;

	let handle = device.open(OpenFlags::nonblocking())?;
	assert!(matches!(device.open(OpenFlags::default()), Err(Error::Busy)));

	assert!(device.platform().read_line_level(17).is_ok());
	handle.close();

	Ok(())
}
