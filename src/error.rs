use crate::frame::{MAX_ADDRESS, MAX_PAYLOAD};

/// An error returned by a [`Bus`](crate::Bus) operation.
///
/// The type parameter is the setup error of the [`LineSignal`](crate::LineSignal) implementation.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Error<E> {
	/// The bus has not been initialized with [`Bus::init()`](crate::Bus::init).
	NotInitialized,

	/// The line could not be set up.
	NotReady(E),

	/// The bus is already open.
	AlreadyOpen,

	/// The bus must be opened before reading or writing.
	NotOpen,

	/// The requested open mode is not supported.
	///
	/// Only mode `0` exists.
	UnsupportedMode(u8),

	/// A slave tried to transmit without holding the turn.
	///
	/// A slave may only transmit one frame after each read request from the master.
	WriteNotPermitted,

	/// The operation can only be performed by a master.
	NotMaster,

	/// No valid frame was received before the deadline.
	Timeout,

	/// The payload does not fit in a single frame.
	PayloadTooLong(PayloadTooLong),

	/// The address does not fit in the 7 address bits of the header.
	InvalidAddress(InvalidAddress),
}

/// The payload does not fit in a single frame.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PayloadTooLong {
	/// The length of the payload.
	pub actual: usize,

	/// The maximum payload length.
	pub max: usize,
}

/// The address is larger than [`MAX_ADDRESS`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InvalidAddress {
	pub address: u8,
}

/// A received frame that can not be delivered.
///
/// These are never returned from [`Bus::read()`](crate::Bus::read).
/// The receiver drops the frame and waits for the next one.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum InvalidFrame {
	/// The frame ended before a header and checksum were received.
	Malformed { len: usize },

	/// The checksum byte does not match the frame contents.
	ChecksumMismatch(ChecksumMismatch),

	/// The frame is addressed to another device.
	NotAddressedToMe(NotAddressedToMe),
}

/// The checksum byte does not match the frame contents.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ChecksumMismatch {
	/// The checksum byte from the frame.
	pub message: u8,

	/// The checksum computed over the received header and payload.
	pub computed: u8,
}

/// The frame is addressed to another device.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NotAddressedToMe {
	pub actual: u8,
	pub expected: u8,
}

impl PayloadTooLong {
	pub fn check(actual: usize) -> Result<(), Self> {
		if actual <= MAX_PAYLOAD {
			Ok(())
		} else {
			Err(Self { actual, max: MAX_PAYLOAD })
		}
	}
}

impl InvalidAddress {
	pub fn check(address: u8) -> Result<u8, Self> {
		if address <= MAX_ADDRESS {
			Ok(address)
		} else {
			Err(Self { address })
		}
	}
}

impl ChecksumMismatch {
	pub fn check(message: u8, computed: u8) -> Result<(), Self> {
		if message == computed {
			Ok(())
		} else {
			Err(Self { message, computed })
		}
	}
}

impl NotAddressedToMe {
	pub fn check(actual: u8, expected: u8) -> Result<(), Self> {
		if actual == expected {
			Ok(())
		} else {
			Err(Self { actual, expected })
		}
	}
}

impl<E> From<PayloadTooLong> for Error<E> {
	fn from(other: PayloadTooLong) -> Self {
		Self::PayloadTooLong(other)
	}
}

impl<E> From<InvalidAddress> for Error<E> {
	fn from(other: InvalidAddress) -> Self {
		Self::InvalidAddress(other)
	}
}

impl From<ChecksumMismatch> for InvalidFrame {
	fn from(other: ChecksumMismatch) -> Self {
		Self::ChecksumMismatch(other)
	}
}

impl From<NotAddressedToMe> for InvalidFrame {
	fn from(other: NotAddressedToMe) -> Self {
		Self::NotAddressedToMe(other)
	}
}

#[cfg(feature = "std")]
impl<E: core::fmt::Debug + core::fmt::Display> std::error::Error for Error<E> {}
#[cfg(feature = "std")]
impl std::error::Error for PayloadTooLong {}
#[cfg(feature = "std")]
impl std::error::Error for InvalidAddress {}
#[cfg(feature = "std")]
impl std::error::Error for InvalidFrame {}
#[cfg(feature = "std")]
impl std::error::Error for ChecksumMismatch {}
#[cfg(feature = "std")]
impl std::error::Error for NotAddressedToMe {}

impl<E: core::fmt::Display> core::fmt::Display for Error<E> {
	fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
		match self {
			Self::NotInitialized => write!(f, "bus is not initialized"),
			Self::NotReady(e) => write!(f, "failed to set up the bus line: {}", e),
			Self::AlreadyOpen => write!(f, "bus is already open"),
			Self::NotOpen => write!(f, "bus is not open"),
			Self::UnsupportedMode(mode) => write!(f, "unsupported open mode: {}", mode),
			Self::WriteNotPermitted => write!(f, "slave does not hold the write turn"),
			Self::NotMaster => write!(f, "operation is only available to a bus master"),
			Self::Timeout => write!(f, "timeout waiting for a frame"),
			Self::PayloadTooLong(e) => write!(f, "{}", e),
			Self::InvalidAddress(e) => write!(f, "{}", e),
		}
	}
}

impl core::fmt::Display for PayloadTooLong {
	fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
		write!(f, "payload too long, got {} bytes, maximum is {}", self.actual, self.max)
	}
}

impl core::fmt::Display for InvalidAddress {
	fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
		write!(f, "invalid device address {:#04X}, maximum is {:#04X}", self.address, MAX_ADDRESS)
	}
}

impl core::fmt::Display for InvalidFrame {
	fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
		match self {
			Self::Malformed { len } => write!(f, "malformed frame of {} bytes, need at least a header and checksum", len),
			Self::ChecksumMismatch(e) => write!(f, "{}", e),
			Self::NotAddressedToMe(e) => write!(f, "{}", e),
		}
	}
}

impl core::fmt::Display for ChecksumMismatch {
	fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
		write!(
			f,
			"invalid checksum, message claims {:#04X}, computed {:#04X}",
			self.message, self.computed
		)
	}
}

impl core::fmt::Display for NotAddressedToMe {
	fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
		write!(f, "frame addressed to {:#04X}, expected {:#04X}", self.actual, self.expected)
	}
}
