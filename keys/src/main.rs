use std::io::{ self, Write };

use tracing::info;

use keys::{ ButtonTable, Config, KeyDevice, OpenFlags, RpiPlatform };

fn main() -> Result<(), keys::Error> {
	let mut args = std::env::args();

	// parse arguments
	if 2 != args.len() {
		eprintln!("Usage: {} CONFIG", args.next().unwrap_or_else(|| "keys".to_owned()));
		return Ok(());
	}

	let args = args.collect::<Vec<_>>();

	tracing_subscriber::fmt()
		.with_writer(io::stderr)
		.init();

	let config = Config::load(&args[1])?;
	let table = ButtonTable::from_config(config.buttons())?;

	let device = KeyDevice::new(config.device_name(), RpiPlatform::new()?, table)?;
	let handle = device.open(OpenFlags::default())?;

	let mut prev = device.state().levels();
	let mut buf = vec![0; device.table().len()];
	let stdout = io::stdout();

	loop {
		let n = handle.read(&mut buf)?;

		for (i, (&before, &after)) in prev.iter().zip(&buf[..n]).enumerate() {
			if before != after {
				let button = &device.table()[i];
				let action = if after == b'1' { "pressed" } else { "released" };

				info!(button = %button.name, "{}", action);
			}
		}

		prev[..n].copy_from_slice(&buf[..n]);

		let mut out = stdout.lock();
		out.write_all(&buf[..n])?;
		out.write_all(b"\n")?;
		out.flush()?;
	}
}
