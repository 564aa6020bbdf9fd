//! [`LineSignal`] implementation for `embedded-hal` pins.

use embedded_hal::digital::{InputPin, OutputPin};

use crate::LineSignal;

/// A monotonic microsecond clock.
pub trait Clock {
	/// Read the current time in microseconds.
	fn now_micros(&mut self) -> u64;
}

impl<F: FnMut() -> u64> Clock for F {
	fn now_micros(&mut self) -> u64 {
		self()
	}
}

/// A bus line made from an open-drain `embedded-hal` pin and a [`Clock`].
///
/// The pin must already be configured as open-drain output with input enabled,
/// and the line needs an external pull-up.
/// Setting the pin high releases the line.
#[derive(Debug)]
pub struct PinLine<P, C> {
	pin: P,
	clock: C,
}

impl<P, C> PinLine<P, C>
where
	P: InputPin + OutputPin,
	C: Clock,
{
	/// Create a line from a pin and a clock.
	pub fn new(pin: P, clock: C) -> Self {
		Self { pin, clock }
	}

	/// Consume the line to get the pin and clock back.
	pub fn into_parts(self) -> (P, C) {
		(self.pin, self.clock)
	}
}

impl<P, C> LineSignal for PinLine<P, C>
where
	P: InputPin + OutputPin,
	C: Clock,
{
	type Error = P::Error;

	fn setup(&mut self) -> Result<(), Self::Error> {
		self.pin.set_high()
	}

	fn drive_low(&mut self) {
		// Pin errors show up as a stuck line on the receiving side.
		let _ = self.pin.set_low();
	}

	fn release_high(&mut self) {
		let _ = self.pin.set_high();
	}

	fn sample(&mut self) -> bool {
		self.pin.is_high().unwrap_or(false)
	}

	fn elapsed_microseconds(&mut self) -> u64 {
		self.clock.now_micros()
	}
}
