#![allow(dead_code)]

use assert2::{assert, let_assert};
use core::time::Duration;
use slb_lite::sim::{SimLine, Waveform};
use slb_lite::{Bus, BusConfig};

pub const SLAVE_ADDRESS: u8 = 0x01;

/// Gap between the end of one recorded transfer and its replay on the receiving line.
pub const REPLAY_DELAY: u64 = 200;

pub fn open_master() -> Bus<SimLine> {
	let config = BusConfig::master().with_read_timeout(Duration::from_millis(20));
	let mut bus = Bus::new(SimLine::new(), config);
	assert!(let Ok(()) = bus.init());
	assert!(let Ok(()) = bus.open(0));
	bus
}

pub fn open_slave(address: u8) -> Bus<SimLine> {
	let_assert!(Ok(config) = BusConfig::slave(address));
	let config = config.with_read_timeout(Duration::from_millis(20));
	let mut bus = Bus::new(SimLine::new(), config);
	assert!(let Ok(()) = bus.init());
	assert!(let Ok(()) = bus.open(0));
	bus
}

/// Move everything `from` transmitted so far onto the line of `to`.
pub fn deliver<R1, R2>(from: &mut Bus<SimLine, R1>, to: &mut Bus<SimLine, R2>)
where
	R1: slb_lite::Runtime,
	R2: slb_lite::Runtime,
{
	let waveform = from.line_mut().take_recording();
	to.line_mut().play_after(&waveform, REPLAY_DELAY);
}

/// Build a complete frame waveform from raw wire bytes at the reference bit period.
pub fn raw_frame(bytes: &[u8]) -> Waveform {
	let mut builder = Waveform::builder().low(891).high(99);
	for &byte in bytes {
		builder = builder.byte(33, byte);
	}
	builder.low(33).high(132).build()
}
