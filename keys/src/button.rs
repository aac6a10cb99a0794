use std::collections::HashMap;
use std::ops::Index;

use serde::Deserialize;

use crate::config::ButtonConfig;
use crate::error::{ Error, Result };

/// Physical line number as the platform knows it (BCM numbering on the Pi).
pub type LineId = u32;

/// Hardware interrupt number bound to a line.
pub type IrqId = u32;

/// How a line is set up before its interrupt is bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineMode {
	/// Edge-interrupt input, no bias.
	Interrupt,
	InterruptPullUp,
	InterruptPullDown,
}

impl Default for LineMode {
	fn default() -> Self {
		// buttons are active-low
		LineMode::InterruptPullUp
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ButtonDescriptor {
	pub irq: Option<IrqId>,
	pub line: LineId,
	pub mode: LineMode,
	pub index: usize,
	pub name: String,
}

/// Buttons in the order their states appear in a snapshot.
///
/// Built once at startup and never changed afterwards.
#[derive(Clone, Debug, Default)]
pub struct ButtonTable {
	buttons: Vec<ButtonDescriptor>,
}

impl ButtonTable {
	pub fn from_config(buttons: &[ButtonConfig]) -> Result<Self> {
		let mut lines: HashMap<LineId, &str> = HashMap::new();
		let mut irqs: HashMap<IrqId, &str> = HashMap::new();

		for button in buttons {
			if let Some(first) = lines.insert(button.line, &button.name) {
				return Err(Error::DuplicateLine {
					line: button.line,
					first: first.to_owned(),
					second: button.name.clone(),
				});
			}

			if let Some(irq) = button.irq {
				if let Some(first) = irqs.insert(irq, &button.name) {
					return Err(Error::DuplicateIrq {
						irq,
						first: first.to_owned(),
						second: button.name.clone(),
					});
				}
			}
		}

		let buttons = buttons.iter()
			.enumerate()
			.map(|(index, b)| ButtonDescriptor {
				irq: b.irq,
				line: b.line,
				mode: b.mode,
				index,
				name: b.name.clone(),
			})
			.collect();

		Ok(Self { buttons })
	}

	pub fn len(&self) -> usize {
		self.buttons.len()
	}

	pub fn is_empty(&self) -> bool {
		self.buttons.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &ButtonDescriptor> {
		self.buttons.iter()
	}
}

impl Index<usize> for ButtonTable {
	type Output = ButtonDescriptor;

	fn index(&self, index: usize) -> &ButtonDescriptor {
		&self.buttons[index]
	}
}
