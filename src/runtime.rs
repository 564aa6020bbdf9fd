//! Hooks into the task runtime that hosts the driver.

/// The scheduling primitives the driver needs from the task runtime.
///
/// The driver uses two kinds of regions:
///
/// * A short mutual-exclusion region around the check-and-set of the busy and turn flags.
///   It never contains line I/O.
/// * A no-schedule region around the transfer of one whole frame.
///   Bit timing is measured with microsecond precision,
///   so a task switch in the middle of a pulse corrupts the frame.
///   A transmit region lasts [`Timing::frame_duration()`](crate::Timing::frame_duration) at most,
///   about 28 ms for a full payload at the reference bit period.
///   A receive region starts at the falling edge of a select pulse and ends with the frame.
///   A stalled frame ends it after one [`Timing::edge_timeout`](crate::Timing::edge_timeout),
///   and it never outlasts the read timeout. The idle wait between frames is not part of it.
pub trait Runtime {
	/// Run `f` inside a mutual-exclusion region.
	fn critical<R>(&self, f: impl FnOnce() -> R) -> R;

	/// Run `f` with task preemption disabled.
	fn no_schedule<R>(&self, f: impl FnOnce() -> R) -> R;
}

/// A runtime where the driver is never preempted.
///
/// Both regions are plain function calls.
/// Use this on hosted targets, for a driver running in its own thread, or in tests.
#[derive(Debug, Copy, Clone, Default)]
pub struct Cooperative;

impl Runtime for Cooperative {
	fn critical<R>(&self, f: impl FnOnce() -> R) -> R {
		f()
	}

	fn no_schedule<R>(&self, f: impl FnOnce() -> R) -> R {
		f()
	}
}

/// A runtime backed by the `critical-section` crate.
///
/// Both regions run inside [`critical_section::with()`].
/// On single-core microcontrollers this disables interrupts,
/// which also stops the scheduler for the duration of a frame.
#[cfg(feature = "critical-section")]
#[derive(Debug, Copy, Clone, Default)]
pub struct CriticalSection;

#[cfg(feature = "critical-section")]
impl Runtime for CriticalSection {
	fn critical<R>(&self, f: impl FnOnce() -> R) -> R {
		critical_section::with(|_| f())
	}

	fn no_schedule<R>(&self, f: impl FnOnce() -> R) -> R {
		critical_section::with(|_| f())
	}
}

impl<T: Runtime> Runtime for &T {
	fn critical<R>(&self, f: impl FnOnce() -> R) -> R {
		T::critical(self, f)
	}

	fn no_schedule<R>(&self, f: impl FnOnce() -> R) -> R {
		T::no_schedule(self, f)
	}
}
