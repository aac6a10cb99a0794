use std::io;

use thiserror::Error;

use crate::button::{ IrqId, LineId };

pub type Result<T> = std::result::Result<T, Error>;

/// Errno values reported through [`Error::errno`].
pub mod errno {
	pub const EINTR: i32 = 4;
	pub const EIO: i32 = 5;
	pub const EAGAIN: i32 = 11;
	pub const EFAULT: i32 = 14;
	pub const EBUSY: i32 = 16;
	pub const EINVAL: i32 = 22;
}

#[derive(Debug, Error)]
pub enum Error {
	/// An interrupt could not be bound while opening; nothing stays bound.
	#[error("device or resource busy")]
	Busy,

	/// Non-blocking read with no unread change.
	#[error("no key event pending")]
	WouldBlock,

	/// A blocking read was cancelled before a change arrived.
	#[error("interrupted while waiting for a key event")]
	Interrupted,

	/// The read destination could not take the snapshot.
	#[error("bad destination buffer")]
	Fault,

	#[error("interrupt {0} is already bound")]
	IrqInUse(IrqId),

	#[error("line {0} has not been configured")]
	LineNotConfigured(LineId),

	#[error("line {0} does not exist on this platform")]
	NoSuchLine(LineId),

	#[error("interrupt {irq} is assigned to both {first} and {second}")]
	DuplicateIrq { irq: IrqId, first: String, second: String },

	#[error("line {line} is assigned to both {first} and {second}")]
	DuplicateLine { line: LineId, first: String, second: String },

	/// The platform only knows one interrupt per line, numbered like the line.
	#[error("{name}: interrupt {irq} is not line {line}'s interrupt")]
	IrqNotLine { name: String, irq: IrqId, line: LineId },

	#[error("gpio: {0}")]
	Gpio(#[from] rppal::gpio::Error),

	#[error("unable to parse config file: {0}")]
	Config(#[from] toml::de::Error),

	#[error(transparent)]
	Io(#[from] io::Error),
}

impl Error {
	pub fn errno(&self) -> i32 {
		use Error::*;

		match self {
			Busy | IrqInUse(_) => errno::EBUSY,
			WouldBlock => errno::EAGAIN,
			Interrupted => errno::EINTR,
			Fault => errno::EFAULT,
			DuplicateIrq { .. } | DuplicateLine { .. } | IrqNotLine { .. } | Config(_) => errno::EINVAL,
			LineNotConfigured(_) | NoSuchLine(_) | Gpio(_) => errno::EIO,
			Io(e) => e.raw_os_error().unwrap_or(errno::EIO),
		}
	}
}

impl From<Error> for io::Error {
	fn from(err: Error) -> Self {
		match err {
			Error::Io(e) => e,
			Error::WouldBlock => io::Error::new(io::ErrorKind::WouldBlock, err),
			Error::Interrupted => io::Error::new(io::ErrorKind::Interrupted, err),
			other => io::Error::from_raw_os_error(other.errno()),
		}
	}
}
