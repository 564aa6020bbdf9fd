//! Pulse-width bit codec.
//!
//! Every bit starts with a low sync pulse of one bit period.
//! The line is then released for one bit period to send a `0`, or two bit periods to send a `1`.
//! The receiver only measures the length of the high phase,
//! so the two sides do not need a shared clock.

use crate::timing::{hold, measure, Timing};
use crate::LineSignal;

/// The result of decoding a single bit.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Symbol {
	Zero,
	One,
	/// The high phase was too long for a data bit: the frame has ended.
	Stop,
}

/// A byte could not be decoded.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BitError {
	/// A stop condition arrived before all 8 bits were received.
	Stop,

	/// The sync pulse was long enough to be a select pulse: a new frame is starting.
	///
	/// The line is high again, in the start pulse of the new frame.
	Select,

	/// The line did not change level within the bit timeout.
	Timeout,
}

/// Classify the length of a high phase.
pub fn classify(timing: &Timing, high_micros: u64) -> Symbol {
	if high_micros > u64::from(timing.stop_threshold) {
		Symbol::Stop
	} else if high_micros > u64::from(timing.one_threshold) {
		Symbol::One
	} else {
		Symbol::Zero
	}
}

/// Transmit a single bit.
pub fn encode_bit<L: LineSignal>(line: &mut L, timing: &Timing, bit: bool) {
	line.drive_low();
	hold(line, timing.bit_period);
	line.release_high();
	hold(line, timing.high_phase(bit));
}

/// Transmit a byte, most significant bit first.
pub fn encode_byte<L: LineSignal>(line: &mut L, timing: &Timing, byte: u8) {
	for i in (0..8).rev() {
		encode_bit(line, timing, byte & (1 << i) != 0);
	}
}

/// Receive a single bit.
///
/// Must be called while the line is low (in the sync pulse of the bit),
/// and returns as soon as the line falls again for the next bit.
/// A stop condition is reported as soon as the high phase exceeds the stop threshold,
/// without waiting for the line to fall.
pub fn decode_bit<L: LineSignal>(line: &mut L, timing: &Timing, timeout_micros: u64) -> Result<Symbol, BitError> {
	let sync = measure(line, false, timeout_micros).map_err(|_| BitError::Timeout)?;
	if sync >= u64::from(timing.min_select) {
		return Err(BitError::Select);
	}
	let high = match measure(line, true, u64::from(timing.stop_threshold)) {
		Ok(high) => high,
		Err(_) => return Ok(Symbol::Stop),
	};
	Ok(classify(timing, high))
}

/// Receive a byte, most significant bit first.
pub fn decode_byte<L: LineSignal>(line: &mut L, timing: &Timing, timeout_micros: u64) -> Result<u8, BitError> {
	let mut byte = 0u8;
	for _ in 0..8 {
		let bit = match decode_bit(line, timing, timeout_micros)? {
			Symbol::Zero => 0,
			Symbol::One => 1,
			Symbol::Stop => return Err(BitError::Stop),
		};
		byte = byte << 1 | bit;
	}
	Ok(byte)
}
