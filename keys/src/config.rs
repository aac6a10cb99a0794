use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::button::{ IrqId, LineId, LineMode };
use crate::error::{ Error, Result };

pub const DEFAULT_DEVICE_NAME: &str = "keys";

#[derive(Debug, Deserialize)]
pub struct Config {
	#[serde(default = "default_device_name")]
	device_name: String,
	#[serde(default)]
	buttons: Vec<ButtonConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ButtonConfig {
	pub name: String,
	pub line: LineId,
	/// Leave out to wire the button without an interrupt; it is then skipped at open.
	#[serde(default)]
	pub irq: Option<IrqId>,
	#[serde(default)]
	pub mode: LineMode,
}

fn default_device_name() -> String {
	DEFAULT_DEVICE_NAME.to_owned()
}

impl Config {
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
		fs::read_to_string(path)?.parse()
	}

	pub fn device_name(&self) -> &str {
		&self.device_name
	}

	pub fn buttons(&self) -> &[ButtonConfig] {
		&self.buttons
	}
}

impl FromStr for Config {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		Ok(toml::from_str(s)?)
	}
}
