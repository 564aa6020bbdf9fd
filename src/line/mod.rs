//! [`LineSignal`] trait to drive and sense the bus line.

#[cfg(feature = "embedded-hal")]
mod pin;
#[cfg(feature = "embedded-hal")]
pub use pin::*;

/// A single open-drain bus line and a microsecond clock.
///
/// The line is pulled up externally.
/// Driving it low is the only active operation, releasing it lets the pull-up take over.
///
/// Drive and sample operations can not fail.
/// A faulty line simply reads as stuck high or low,
/// which the driver reports as a timeout.
pub trait LineSignal {
	/// The error returned when the pin can not be set up.
	type Error;

	/// Configure the pin for open-drain operation.
	///
	/// Called by [`Bus::init()`](crate::Bus::init).
	fn setup(&mut self) -> Result<(), Self::Error>;

	/// Pull the line low.
	fn drive_low(&mut self);

	/// Release the line, letting the pull-up bring it high.
	fn release_high(&mut self);

	/// Sample the line level, `true` meaning high.
	fn sample(&mut self) -> bool;

	/// Read a monotonic microsecond clock.
	fn elapsed_microseconds(&mut self) -> u64;
}

impl<L: LineSignal + ?Sized> LineSignal for &mut L {
	type Error = L::Error;

	fn setup(&mut self) -> Result<(), Self::Error> {
		L::setup(self)
	}

	fn drive_low(&mut self) {
		L::drive_low(self)
	}

	fn release_high(&mut self) {
		L::release_high(self)
	}

	fn sample(&mut self) -> bool {
		L::sample(self)
	}

	fn elapsed_microseconds(&mut self) -> u64 {
		L::elapsed_microseconds(self)
	}
}
