//! A simulated bus line running on virtual time.
//!
//! [`SimLine`] implements [`LineSignal`] without any hardware.
//! Every clock read advances virtual time by one microsecond,
//! so busy-wait loops make progress and timing is fully deterministic.
//!
//! Two devices never run at the same time in the simulation.
//! Instead, the edges one device drives are recorded as a [`Waveform`],
//! and that waveform is played back on the line of the other device.
//!
//! ```
//! use slb_lite::sim::{SimLine, Waveform};
//! use slb_lite::LineSignal;
//!
//! let mut line = SimLine::new();
//! line.play(&Waveform::builder().low(50).high(20).build(), 10);
//! assert!(line.sample());
//! ```

use crate::LineSignal;

/// A level change on the line.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Edge {
	/// The time of the change in microseconds.
	pub time: u64,

	/// The level after the change.
	pub high: bool,
}

/// A sequence of level changes, relative to the start of the waveform.
///
/// The line is high before the first edge and keeps the level of the last edge forever.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Waveform {
	edges: Vec<Edge>,
}

impl Waveform {
	/// Create a builder that appends pulses one after another.
	pub fn builder() -> WaveformBuilder {
		WaveformBuilder::default()
	}

	/// Create a waveform from absolute edges, shifting the first edge to time zero.
	pub fn from_edges(edges: &[Edge]) -> Self {
		let origin = edges.first().map(|edge| edge.time).unwrap_or(0);
		let edges = edges
			.iter()
			.map(|edge| Edge { time: edge.time - origin, high: edge.high })
			.collect();
		Self { edges }
	}

	/// The level changes of the waveform.
	pub fn edges(&self) -> &[Edge] {
		&self.edges
	}

	/// Check if the waveform contains no edges at all.
	pub fn is_empty(&self) -> bool {
		self.edges.is_empty()
	}

	/// The time of the last edge.
	pub fn duration(&self) -> u64 {
		self.edges.last().map(|edge| edge.time).unwrap_or(0)
	}

	/// The level of the line at the given time.
	pub fn level_at(&self, time: u64) -> bool {
		match self.edges.iter().rev().find(|edge| edge.time <= time) {
			Some(edge) => edge.high,
			None => true,
		}
	}

	/// The pulses between the edges as `(high, duration)` pairs.
	///
	/// The level after the last edge has no end, so it is not included.
	pub fn pulses(&self) -> Vec<(bool, u64)> {
		self.edges
			.windows(2)
			.map(|pair| (pair[0].high, pair[1].time - pair[0].time))
			.collect()
	}

	/// Replace the pulse at `index` (as returned by [`Self::pulses()`]) with a pulse of a different length.
	///
	/// All following edges move along with it.
	pub fn with_pulse_len(&self, index: usize, duration: u64) -> Self {
		let mut pulses = self.pulses();
		pulses[index].1 = duration;
		let mut builder = Waveform::builder();
		for (high, duration) in pulses {
			builder = builder.pulse(high, duration);
		}
		if let Some(last) = self.edges.last() {
			builder = builder.pulse(last.high, 0);
		}
		builder.build()
	}
}

/// Builder for a [`Waveform`].
#[derive(Debug, Clone, Default)]
pub struct WaveformBuilder {
	edges: Vec<Edge>,
	time: u64,
}

impl WaveformBuilder {
	/// Append a pulse at the given level.
	pub fn pulse(mut self, high: bool, duration: u64) -> Self {
		let level = self.edges.last().map(|edge| edge.high).unwrap_or(true);
		if self.edges.is_empty() || level != high {
			self.edges.push(Edge { time: self.time, high });
		}
		self.time += duration;
		self
	}

	/// Append a low pulse.
	pub fn low(self, duration: u64) -> Self {
		self.pulse(false, duration)
	}

	/// Append a high pulse.
	pub fn high(self, duration: u64) -> Self {
		self.pulse(true, duration)
	}

	/// Append the pulses of a single encoded bit.
	pub fn bit(self, bit_period: u64, value: bool) -> Self {
		let high = if value { 2 * bit_period } else { bit_period };
		self.low(bit_period).high(high)
	}

	/// Append the pulses of a byte, most significant bit first.
	pub fn byte(mut self, bit_period: u64, value: u8) -> Self {
		for i in (0..8).rev() {
			self = self.bit(bit_period, value & (1 << i) != 0);
		}
		self
	}

	/// Finish the waveform, releasing the line if it ends low.
	pub fn build(mut self) -> Waveform {
		if let Some(last) = self.edges.last() {
			if !last.high {
				self.edges.push(Edge { time: self.time, high: true });
			}
		}
		Waveform { edges: self.edges }
	}
}

/// The setup error of a [`SimLine`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SetupFailed;

impl core::fmt::Display for SetupFailed {
	fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
		write!(f, "simulated pin setup failure")
	}
}

impl std::error::Error for SetupFailed {}

/// A simulated open-drain line with a virtual microsecond clock.
///
/// The line reads low if this device drives it low,
/// or if any waveform played on it is low at the current time.
#[derive(Debug, Clone, Default)]
pub struct SimLine {
	now: u64,
	driven_low: bool,
	recorded: Vec<Edge>,
	playing: Vec<(u64, Waveform)>,
	fail_setup: bool,
	setup_calls: usize,
}

impl SimLine {
	/// Create an idle line at time zero.
	pub fn new() -> Self {
		Self::default()
	}

	/// Create a line whose setup always fails.
	pub fn failing() -> Self {
		Self {
			fail_setup: true,
			..Self::default()
		}
	}

	/// The current virtual time in microseconds.
	pub fn now(&self) -> u64 {
		self.now
	}

	/// Move virtual time forward without touching the line.
	pub fn advance(&mut self, micros: u64) {
		self.now += micros;
	}

	/// The number of times [`LineSignal::setup()`] was called.
	pub fn setup_calls(&self) -> usize {
		self.setup_calls
	}

	/// Check if this device currently pulls the line low.
	pub fn is_driven_low(&self) -> bool {
		self.driven_low
	}

	/// Play a waveform on the line, starting at the given absolute time.
	pub fn play(&mut self, waveform: &Waveform, start: u64) {
		self.playing.push((start, waveform.clone()));
	}

	/// Play a waveform on the line, starting `delay` microseconds from now.
	pub fn play_after(&mut self, waveform: &Waveform, delay: u64) {
		self.play(waveform, self.now + delay);
	}

	/// The edges driven by this device since the last call to [`Self::take_recording()`].
	pub fn recording(&self) -> Waveform {
		Waveform::from_edges(&self.recorded)
	}

	/// Take the edges driven by this device, clearing the recording.
	pub fn take_recording(&mut self) -> Waveform {
		let waveform = self.recording();
		self.recorded.clear();
		waveform
	}

	fn external_level(&self) -> bool {
		self.playing.iter().all(|(start, waveform)| {
			self.now < *start || waveform.level_at(self.now - start)
		})
	}

	fn record(&mut self, high: bool) {
		self.recorded.push(Edge { time: self.now, high });
	}
}

impl LineSignal for SimLine {
	type Error = SetupFailed;

	fn setup(&mut self) -> Result<(), Self::Error> {
		self.setup_calls += 1;
		if self.fail_setup {
			Err(SetupFailed)
		} else {
			Ok(())
		}
	}

	fn drive_low(&mut self) {
		if !self.driven_low {
			self.driven_low = true;
			self.record(false);
		}
	}

	fn release_high(&mut self) {
		if self.driven_low {
			self.driven_low = false;
			self.record(true);
		}
	}

	fn sample(&mut self) -> bool {
		!self.driven_low && self.external_level()
	}

	fn elapsed_microseconds(&mut self) -> u64 {
		self.now += 1;
		self.now
	}
}
