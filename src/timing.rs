//! Pulse widths and the polling helpers that produce and measure them.

use crate::frame::MAX_PAYLOAD;
use crate::LineSignal;

/// Reference bit period in microseconds.
pub const DEFAULT_BIT_PERIOD: u32 = 33;

/// All pulse widths and thresholds of the bus, in microseconds.
///
/// Use [`Timing::from_bit_period()`] to derive every value from a single bit period.
/// The fields are public so a port can trim individual values for a noisy line.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Timing {
	/// The length of the sync pulse that starts every bit, and of the high phase of a `0` bit.
	pub bit_period: u32,

	/// A high phase longer than this decodes as a `1` bit.
	pub one_threshold: u32,

	/// A high phase longer than this decodes as a stop condition.
	pub stop_threshold: u32,

	/// The low pulse that announces a new frame.
	pub select: u32,

	/// The high pulse between the select pulse and the first bit.
	pub start: u32,

	/// Shorter low pulses are not accepted as a select condition.
	pub min_select: u32,

	/// Shorter high pulses after a select are not accepted as a start condition.
	pub min_start: u32,

	/// How long the transmitter holds the line high after the last bit.
	pub stop_hold: u32,

	/// How long a slave waits after a read request before it transmits the response.
	pub turnaround: u32,

	/// How long a receiver waits for the next edge inside a frame before it drops the frame.
	///
	/// Must be longer than `select`, so a select pulse in place of a bit can still be recognized.
	pub edge_timeout: u32,
}

impl Timing {
	/// Derive all pulse widths from a bit period in microseconds.
	///
	/// At the reference bit period of 33us, a high phase above 39us decodes as a `1`
	/// and a high phase above 79us as a stop condition.
	pub const fn from_bit_period(bit_period: u32) -> Self {
		Self {
			bit_period,
			one_threshold: bit_period * 6 / 5,
			stop_threshold: bit_period * 12 / 5,
			select: bit_period * 27,
			start: bit_period * 3,
			min_select: bit_period * 18,
			min_start: bit_period * 27 / 10,
			stop_hold: bit_period * 4,
			turnaround: bit_period * 30,
			edge_timeout: bit_period * 54,
		}
	}

	/// The high phase that encodes a bit value.
	pub const fn high_phase(&self, bit: bool) -> u32 {
		if bit {
			2 * self.bit_period
		} else {
			self.bit_period
		}
	}

	/// Worst-case time on the wire for a frame with the given payload length, in microseconds.
	///
	/// This includes the select and start pulses and the stop hold,
	/// and assumes every bit is a `1`.
	/// It bounds the time the driver spends with preemption disabled for one frame.
	pub const fn frame_duration(&self, payload_len: usize) -> u64 {
		let payload_len = if payload_len > MAX_PAYLOAD { MAX_PAYLOAD } else { payload_len };
		let bits = (payload_len as u64 + 2) * 8;
		let bit_time = 3 * self.bit_period as u64;
		self.select as u64 + self.start as u64 + bits * bit_time + self.bit_period as u64 + self.stop_hold as u64
	}
}

impl Default for Timing {
	fn default() -> Self {
		Self::from_bit_period(DEFAULT_BIT_PERIOD)
	}
}

/// The wait limit expired before the line changed level.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct Expired;

/// Busy-wait for the given number of microseconds.
pub(crate) fn hold<L: LineSignal>(line: &mut L, micros: u32) {
	let start = line.elapsed_microseconds();
	while line.elapsed_microseconds().wrapping_sub(start) < u64::from(micros) {}
}

/// Poll the line until it leaves the given level.
///
/// Returns how long the line stayed at `level`,
/// or [`Expired`] if it did not change within `limit` microseconds.
pub(crate) fn measure<L: LineSignal>(line: &mut L, level: bool, limit: u64) -> Result<u64, Expired> {
	let start = line.elapsed_microseconds();
	loop {
		let now = line.elapsed_microseconds();
		let elapsed = now.wrapping_sub(start);
		if line.sample() != level {
			return Ok(elapsed);
		}
		if elapsed > limit {
			return Err(Expired);
		}
	}
}
