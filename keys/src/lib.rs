//! Push-buttons on interrupt lines, read as one byte stream.
//!
//! Each button's line fires an edge interrupt; the handler records the new
//! level and wakes readers. A read blocks (or fails with
//! [`Error::WouldBlock`]) until some button changed, then returns one
//! `'0'`/`'1'` per button.

pub mod button;
pub mod circuit;
pub mod config;
pub mod device;
pub mod error;
pub mod irq;
pub mod state;
pub mod wait;

pub use button::{ ButtonDescriptor, ButtonTable, IrqId, LineId, LineMode };
pub use circuit::{ Platform, RpiPlatform, SimPlatform };
pub use config::Config;
pub use device::{ Handle, Interrupter, KeyDevice, OpenFlags, PollMask };
pub use error::{ Error, Result };
pub use state::KeyState;
pub use wait::Poller;

#[cfg(test)] mod tests;
