//! Driver for SLB-Lite, a single-wire, half-duplex bus.
//!
//! SLB-Lite moves bytes over one open-drain line without a clock line.
//! Every bit starts with a low sync pulse of one bit period,
//! and the length of the following high phase carries the value:
//! one bit period for a `0`, two bit periods for a `1`.
//! A high phase longer than the stop threshold ends a frame.
//!
//! A frame looks like this on the wire:
//!
//! ```text
//! [ header ] [ payload 0 .. payload n-1 ] [ checksum ]
//! header   = address << 1 | direction
//! checksum = (header + sum(payload)) mod 256
//! ```
//!
//! A [`Bus`] drives one line through a [`LineSignal`] implementation.
//! It is either a [`Role::Master`] or a [`Role::Slave`].
//! A slave may only transmit after the master sent it a read request,
//! and gives the turn back with its response.
//!
//! The line is bit-banged, so every frame is sent and received
//! inside a region where the task runtime must not preempt the driver.
//! See the [`Runtime`] trait for the hooks a port has to provide.
//!
//! # Optional features
//!
//! * `std` (default): the virtual-time [`sim`] line and `std::error::Error` impls.
//! * `log`: trace and debug logging through the `log` facade.
//! * `embedded-hal`: [`PinLine`], a line built from an `embedded-hal` pin and a [`Clock`].
//! * `critical-section`: [`CriticalSection`], a runtime using the `critical-section` crate.

#![cfg_attr(not(feature = "std"), no_std)]

#[macro_use]
mod log;

pub mod codec;
pub mod frame;
pub mod transport;

mod bus;
pub use bus::*;

mod error;
pub use error::*;

mod line;
pub use line::*;

mod runtime;
pub use runtime::*;

mod timing;
pub use timing::{Timing, DEFAULT_BIT_PERIOD};

#[cfg(feature = "std")]
pub mod sim;

pub use frame::{Direction, Frame, Header, MAX_ADDRESS, MAX_PAYLOAD};
