//! Logging shim.
//!
//! Forwards to the `log` crate when the `log` feature is enabled.
//! Otherwise the macros still type-check their arguments but compile to nothing.

#[cfg(feature = "log")]
#[allow(unused)]
#[macro_use]
mod log {
	macro_rules! trace {
		($($args:tt)*) => { ::log::trace!(target: "slb_lite", $($args)*) }
	}

	macro_rules! debug {
		($($args:tt)*) => { ::log::debug!(target: "slb_lite", $($args)*) }
	}

	macro_rules! warn {
		($($args:tt)*) => { ::log::warn!(target: "slb_lite", $($args)*) }
	}
}

#[cfg(not(feature = "log"))]
#[allow(unused)]
#[macro_use]
mod log {
	macro_rules! trace {
		($($args:tt)*) => { if false { let _ = format_args!($($args)*); } }
	}

	macro_rules! debug {
		($($args:tt)*) => { if false { let _ = format_args!($($args)*); } }
	}

	macro_rules! warn {
		($($args:tt)*) => { if false { let _ = format_args!($($args)*); } }
	}
}
