//! Frame transport: select/start detection, byte sequencing and frame validation.
//!
//! A frame on the wire looks like this:
//!
//! ```text
//!  select (low)  start (high)  header  payload...  checksum  sync (low)  stop (high, idle)
//! ```
//!
//! The select pulse is much longer than any bit pulse, so a receiver can find the start of a frame
//! even if it starts listening in the middle of another one.

use crate::codec::{decode_bit, encode_byte, BitError, Symbol};
use crate::frame::{Frame, MAX_FRAME_LEN, MAX_PAYLOAD};
use crate::runtime::Runtime;
use crate::timing::{hold, measure, Expired, Timing};
use crate::LineSignal;

/// Options for receiving a frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ReceiveOptions {
	/// Only accept frames addressed to this device, if set.
	pub own_address: Option<u8>,

	/// The maximum payload length to decode.
	pub max_payload: usize,

	/// Give up if no valid frame arrived within this many microseconds.
	pub timeout: u64,
}

/// No valid frame arrived before the receive timeout.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ReceiveTimeout;

/// Send the select and start pulses that announce a new frame.
pub fn send_preamble<L: LineSignal>(line: &mut L, timing: &Timing) {
	line.drive_low();
	hold(line, timing.select);
	line.release_high();
	hold(line, timing.start);
}

/// Transmit a frame.
///
/// If `preamble` is false, the select and start pulses must already have been sent
/// with [`send_preamble()`], and the line must still be high.
/// The line is left released (idle high).
pub fn transmit<L: LineSignal>(line: &mut L, timing: &Timing, frame: &Frame, preamble: bool) {
	if preamble {
		send_preamble(line, timing);
	}

	for byte in frame.wire_bytes() {
		encode_byte(line, timing, byte);
	}

	// Close the last bit with a sync pulse, then hold the line high long enough to read as a stop.
	line.drive_low();
	hold(line, timing.bit_period);
	line.release_high();
	hold(line, timing.stop_hold);
}

/// Receive the next valid frame.
///
/// Noise, truncated frames, frames for other devices and frames with a bad checksum are dropped,
/// and the receiver goes back to waiting for the next select pulse.
/// Only the overall timeout ends the wait without a frame.
///
/// The idle wait for a falling edge can be preempted.
/// Everything from the falling edge to the end of that frame attempt runs in one [`Runtime::no_schedule()`] region.
pub fn receive<L, R>(line: &mut L, runtime: &R, timing: &Timing, options: &ReceiveOptions) -> Result<Frame, ReceiveTimeout>
where
	L: LineSignal,
	R: Runtime,
{
	let deadline = Deadline::start(line, options.timeout);
	loop {
		let limit = deadline.remaining(line).map_err(|_| ReceiveTimeout)?;
		measure(line, true, limit).map_err(|_| ReceiveTimeout)?;

		match runtime.no_schedule(|| receive_attempt(line, timing, options, &deadline)) {
			Ok(Some(frame)) => return Ok(frame),
			Ok(None) => continue,
			Err(Expired) => return Err(ReceiveTimeout),
		}
	}
}

/// Try to receive a frame, starting at a falling edge.
///
/// Returns `Ok(None)` if the frame was dropped, and [`Expired`] once the deadline passed.
fn receive_attempt<L: LineSignal>(line: &mut L, timing: &Timing, options: &ReceiveOptions, deadline: &Deadline) -> Result<Option<Frame>, Expired> {
	let select = match wait_while(line, false, u64::from(timing.edge_timeout), deadline)? {
		Some(select) => select,
		None => return Ok(None),
	};
	if select < u64::from(timing.min_select) {
		trace!("ignoring {}us low pulse", select);
		return Ok(None);
	}

	loop {
		// A start pulse that never ends belongs to a preamble without a frame.
		let start = match wait_while(line, true, u64::from(timing.edge_timeout), deadline)? {
			Some(start) => start,
			None => {
				trace!("no frame after select pulse");
				return Ok(None);
			},
		};
		if start < u64::from(timing.min_start) {
			trace!("ignoring {}us start pulse", start);
			return Ok(None);
		}

		let mut buffer = [0u8; MAX_FRAME_LEN];
		let len = match receive_bytes(line, timing, options.max_payload.min(MAX_PAYLOAD) + 2, &mut buffer, deadline)? {
			Received::Bytes(len) => len,
			Received::Select => {
				trace!("select pulse inside frame, restarting");
				continue;
			},
			Received::Stalled(len) => {
				trace!("line stalled after {} bytes, dropping frame: {:02X?}", len, &buffer[..len]);
				return Ok(None);
			},
		};

		return match Frame::parse(&buffer[..len], options.own_address) {
			Ok(frame) => {
				trace!("received frame: {:02X?}", &buffer[..len]);
				Ok(Some(frame))
			},
			Err(e) => {
				trace!("dropping frame: {}: {:02X?}", e, &buffer[..len]);
				Ok(None)
			},
		};
	}
}

/// The outcome of decoding the bytes of a frame.
enum Received {
	/// A stop condition or the length limit ended the frame after this many bytes.
	Bytes(usize),

	/// A new select pulse arrived, and the line is now in its start pulse.
	Select,

	/// The line did not change level in time after this many bytes.
	Stalled(usize),
}

/// Decode up to `max_len` bytes, most significant bit first.
///
/// A stop condition in the middle of a byte drops the partial byte.
fn receive_bytes<L: LineSignal>(line: &mut L, timing: &Timing, max_len: usize, buffer: &mut [u8; MAX_FRAME_LEN], deadline: &Deadline) -> Result<Received, Expired> {
	for len in 0..max_len {
		let mut byte = 0u8;
		for _ in 0..8 {
			let limit = deadline.remaining(line)?.min(u64::from(timing.edge_timeout));
			let bit = match decode_bit(line, timing, limit) {
				Ok(Symbol::Zero) => 0,
				Ok(Symbol::One) => 1,
				Ok(Symbol::Stop) | Err(BitError::Stop) => return Ok(Received::Bytes(len)),
				Err(BitError::Select) => return Ok(Received::Select),
				Err(BitError::Timeout) => {
					deadline.remaining(line)?;
					return Ok(Received::Stalled(len));
				},
			};
			byte = byte << 1 | bit;
		}
		buffer[len] = byte;
	}
	Ok(Received::Bytes(max_len))
}

/// Measure how long the line stays at `level`, for at most `max` microseconds.
///
/// Returns `Ok(None)` if the level did not change in time, and [`Expired`] if the deadline passed first.
fn wait_while<L: LineSignal>(line: &mut L, level: bool, max: u64, deadline: &Deadline) -> Result<Option<u64>, Expired> {
	let limit = deadline.remaining(line)?.min(max);
	match measure(line, level, limit) {
		Ok(duration) => Ok(Some(duration)),
		Err(Expired) => {
			deadline.remaining(line)?;
			Ok(None)
		},
	}
}

/// A point in time after which waiting stops.
struct Deadline {
	start: u64,
	limit: u64,
}

impl Deadline {
	fn start<L: LineSignal>(line: &mut L, limit: u64) -> Self {
		Self {
			start: line.elapsed_microseconds(),
			limit,
		}
	}

	fn remaining<L: LineSignal>(&self, line: &mut L) -> Result<u64, Expired> {
		let elapsed = line.elapsed_microseconds().wrapping_sub(self.start);
		self.limit.checked_sub(elapsed).ok_or(Expired)
	}
}

#[cfg(all(test, feature = "std"))]
mod test {
	use super::*;
	use crate::frame::{Direction, Header};
	use crate::runtime::Cooperative;
	use crate::sim::{SimLine, Waveform};
	use assert2::{assert, let_assert};
	use core::cell::Cell;

	fn options(own_address: Option<u8>) -> ReceiveOptions {
		ReceiveOptions {
			own_address,
			max_payload: MAX_PAYLOAD,
			timeout: 100_000,
		}
	}

	fn frame(address: u8, direction: Direction, payload: &[u8]) -> Frame {
		let_assert!(Ok(header) = Header::new(address, direction));
		let_assert!(Ok(frame) = Frame::new(header, payload));
		frame
	}

	fn record(frame: &Frame) -> Waveform {
		let mut line = SimLine::new();
		transmit(&mut line, &Timing::default(), frame, true);
		line.take_recording()
	}

	/// Build a frame waveform by hand from raw wire bytes.
	fn raw_frame(bytes: &[u8]) -> Waveform {
		let mut builder = Waveform::builder().low(891).high(99);
		for &byte in bytes {
			builder = builder.byte(33, byte);
		}
		builder.low(33).high(132).build()
	}

	#[test]
	fn transmit_layout() {
		let waveform = record(&frame(0x01, Direction::Request, &[]));
		let pulses = waveform.pulses();
		// select, start, 2 bytes of 2 pulses per bit, and the final sync pulse.
		assert!(pulses.len() == 2 + 32 + 1);
		assert!(pulses[0].0 == false);
		assert!((891..=893).contains(&pulses[0].1));
		assert!(pulses[1].0 == true);
		assert!((99..=101).contains(&pulses[1].1));
		// The header 0x02 has a single 1 bit at position 1, followed by the checksum 0x02.
		let highs: Vec<u64> = pulses[2..34].iter().skip(1).step_by(2).map(|p| p.1).collect();
		let bits: Vec<bool> = highs.iter().map(|&d| d > u64::from(Timing::default().one_threshold)).collect();
		assert!(bits == [
			false, false, false, false, false, false, true, false,
			false, false, false, false, false, false, true, false,
		]);
		// The line ends released.
		assert!(waveform.level_at(waveform.duration()) == true);
	}

	#[test]
	fn receive_transmitted_frame() {
		let sent = frame(0x01, Direction::Write, &[0x02, 0x20, 0x00, 0x00, 0x64]);
		let mut line = SimLine::new();
		line.play_after(&record(&sent), 500);
		let_assert!(Ok(received) = receive(&mut line, &Cooperative, &Timing::default(), &options(Some(0x01))));
		assert!(received == sent);
	}

	#[test]
	fn receive_skips_noise() {
		let sent = frame(0x01, Direction::Write, &[0xAB]);
		let mut line = SimLine::new();
		// Short low pulses and a select without a proper start pulse come first.
		line.play(&Waveform::builder().low(100).high(200).low(300).high(50).low(700).high(20).low(40).build(), 100);
		line.play(&record(&sent), 5_000);
		let_assert!(Ok(received) = receive(&mut line, &Cooperative, &Timing::default(), &options(None)));
		assert!(received == sent);
	}

	#[test]
	fn receive_skips_frames_for_other_devices() {
		let other = frame(0x02, Direction::Write, &[0x01, 0x02]);
		let mine = frame(0x01, Direction::Write, &[0x03, 0x04]);
		let mut line = SimLine::new();
		line.play(&record(&other), 100);
		line.play(&record(&mine), 10_000);
		let_assert!(Ok(received) = receive(&mut line, &Cooperative, &Timing::default(), &options(Some(0x01))));
		assert!(received == mine);
	}

	#[test]
	fn receive_skips_bad_checksum() {
		let good = frame(0x01, Direction::Write, &[0x32, 0x33]);
		let mut line = SimLine::new();
		line.play(&raw_frame(&[0x03, 0x32, 0x33, 0x00]), 100);
		line.play(&record(&good), 10_000);
		let_assert!(Ok(received) = receive(&mut line, &Cooperative, &Timing::default(), &options(Some(0x01))));
		assert!(received == good);
	}

	#[test]
	fn receive_skips_short_frames() {
		let good = frame(0x01, Direction::Request, &[]);
		let mut line = SimLine::new();
		line.play(&raw_frame(&[0x03]), 100);
		line.play(&record(&good), 10_000);
		let_assert!(Ok(received) = receive(&mut line, &Cooperative, &Timing::default(), &options(None)));
		assert!(received == good);
	}

	#[test]
	fn receive_times_out_on_idle_line() {
		let mut line = SimLine::new();
		assert!(let Err(ReceiveTimeout) = receive(&mut line, &Cooperative, &Timing::default(), &options(None)));
		assert!(line.now() >= 100_000);
		assert!(line.now() < 101_000);
	}

	#[test]
	fn receive_times_out_after_corrupt_frame() {
		let mut line = SimLine::new();
		line.play(&raw_frame(&[0x03, 0x32, 0x33, 0x00]), 100);
		assert!(let Err(ReceiveTimeout) = receive(&mut line, &Cooperative, &Timing::default(), &options(None)));
	}

	#[test]
	fn receive_limits_payload_length() {
		let sent = frame(0x01, Direction::Write, &[1, 2, 3, 4]);
		let mut line = SimLine::new();
		line.play(&record(&sent), 100);
		let options = ReceiveOptions {
			max_payload: 2,
			..options(None)
		};
		// Only the header and two payload bytes fit: the third byte is taken as checksum and does not match.
		assert!(let Err(ReceiveTimeout) = receive(&mut line, &Cooperative, &Timing::default(), &options));
	}

	#[test]
	fn receive_after_preamble_without_frame() {
		let preamble = Waveform::builder().low(891).high(99).build();
		let sent = frame(0x01, Direction::Write, &[0x32, 0x33]);

		// The next select pulse comes while the receiver is decoding the first bit.
		let mut line = SimLine::new();
		line.play(&preamble, 100);
		line.play(&record(&sent), 100 + 990 + 300);
		let_assert!(Ok(received) = receive(&mut line, &Cooperative, &Timing::default(), &options(Some(0x01))));
		assert!(received == sent);

		// The start pulse runs into an idle line.
		let mut line = SimLine::new();
		line.play(&preamble, 100);
		line.play(&record(&sent), 100 + 990 + 5_000);
		let_assert!(Ok(received) = receive(&mut line, &Cooperative, &Timing::default(), &options(Some(0x01))));
		assert!(received == sent);
	}

	#[derive(Default)]
	struct CountingRuntime {
		no_schedule: Cell<usize>,
	}

	impl Runtime for CountingRuntime {
		fn critical<R>(&self, f: impl FnOnce() -> R) -> R {
			f()
		}

		fn no_schedule<R>(&self, f: impl FnOnce() -> R) -> R {
			self.no_schedule.set(self.no_schedule.get() + 1);
			f()
		}
	}

	#[test]
	fn stalled_frame_respects_timeout() {
		let mut line = SimLine::new();
		line.play(&Waveform::builder().low(891).high(99).low(1_000_000).build(), 100);
		let runtime = CountingRuntime::default();
		let options = ReceiveOptions {
			timeout: 20_000,
			..options(None)
		};
		assert!(let Err(ReceiveTimeout) = receive(&mut line, &runtime, &Timing::default(), &options));
		assert!(line.now() >= 20_000);
		assert!(line.now() < 20_100);

		// Each attempt gets its own region, bounded by the edge timeout.
		assert!(runtime.no_schedule.get() >= 5);
	}

	#[test]
	fn one_region_per_frame() {
		let sent = frame(0x01, Direction::Write, &[0xAB]);
		let mut line = SimLine::new();
		line.play(&record(&sent), 50_000);
		let runtime = CountingRuntime::default();
		let_assert!(Ok(received) = receive(&mut line, &runtime, &Timing::default(), &options(None)));
		assert!(received == sent);
		assert!(runtime.no_schedule.get() == 1);
	}
}
