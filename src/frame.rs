//! Frame layout: header byte, payload and checksum.

use heapless::Vec;

use crate::{ChecksumMismatch, InvalidAddress, InvalidFrame, NotAddressedToMe, PayloadTooLong};

/// The maximum number of payload bytes in a frame.
pub const MAX_PAYLOAD: usize = 32;

/// The maximum number of bytes on the wire for one frame: header, payload and checksum.
pub const MAX_FRAME_LEN: usize = MAX_PAYLOAD + 2;

/// The highest device address that fits in the header.
pub const MAX_ADDRESS: u8 = 0x7F;

/// The direction bit of a frame header.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Direction {
	/// The master asks the addressed slave to transmit a response (bit value 0).
	Request,

	/// The frame carries data written by its sender (bit value 1).
	Write,
}

/// The header byte of a frame: a 7-bit address and a direction bit.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Header {
	raw: u8,
}

impl Header {
	/// Create a header for the given device address and direction.
	pub fn new(address: u8, direction: Direction) -> Result<Self, InvalidAddress> {
		let address = InvalidAddress::check(address)?;
		let bit = match direction {
			Direction::Request => 0,
			Direction::Write => 1,
		};
		Ok(Self { raw: address << 1 | bit })
	}

	/// Wrap a raw header byte.
	pub const fn from_raw(raw: u8) -> Self {
		Self { raw }
	}

	/// The raw header byte as sent on the wire.
	pub const fn raw(self) -> u8 {
		self.raw
	}

	/// The device address.
	pub const fn address(self) -> u8 {
		self.raw >> 1
	}

	/// The direction bit.
	pub const fn direction(self) -> Direction {
		if self.raw & 0x01 == 0 {
			Direction::Request
		} else {
			Direction::Write
		}
	}
}

impl core::fmt::Debug for Header {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Header")
			.field("address", &self.address())
			.field("direction", &self.direction())
			.finish()
	}
}

/// A complete frame.
///
/// The checksum is not stored: it is computed when the frame is encoded
/// and verified when it is parsed.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Frame {
	header: Header,
	payload: Vec<u8, MAX_PAYLOAD>,
}

impl Frame {
	/// Create a frame with the given header and payload.
	pub fn new(header: Header, payload: &[u8]) -> Result<Self, PayloadTooLong> {
		PayloadTooLong::check(payload.len())?;
		let mut data = Vec::new();
		// Can not fail: the length was checked above.
		let _ = data.extend_from_slice(payload);
		Ok(Self { header, payload: data })
	}

	/// The header of the frame.
	pub fn header(&self) -> Header {
		self.header
	}

	/// The payload of the frame.
	pub fn payload(&self) -> &[u8] {
		&self.payload
	}

	/// The checksum byte of the frame.
	pub fn checksum(&self) -> u8 {
		checksum(self.header.raw(), &self.payload)
	}

	/// Iterate over all bytes of the frame as sent on the wire, checksum included.
	pub fn wire_bytes(&self) -> impl Iterator<Item = u8> + '_ {
		core::iter::once(self.header.raw())
			.chain(self.payload.iter().copied())
			.chain(core::iter::once(self.checksum()))
	}

	/// Parse the bytes of a received frame.
	///
	/// `data` holds the header, the payload and the trailing checksum byte.
	/// If `own_address` is given, frames addressed to other devices are rejected.
	/// The address is checked before the checksum.
	pub fn parse(data: &[u8], own_address: Option<u8>) -> Result<Self, InvalidFrame> {
		if data.len() < 2 || data.len() > MAX_FRAME_LEN {
			return Err(InvalidFrame::Malformed { len: data.len() });
		}

		let header = Header::from_raw(data[0]);
		if let Some(own_address) = own_address {
			NotAddressedToMe::check(header.address(), own_address)?;
		}

		let (body, message_checksum) = data.split_at(data.len() - 1);
		ChecksumMismatch::check(message_checksum[0], checksum(body[0], &body[1..]))?;

		let mut payload = Vec::new();
		let _ = payload.extend_from_slice(&body[1..]);
		Ok(Self { header, payload })
	}
}

/// Compute the checksum of a frame: the sum of the header and all payload bytes, modulo 256.
pub fn checksum(header: u8, payload: &[u8]) -> u8 {
	payload.iter().fold(header, |sum, &byte| sum.wrapping_add(byte))
}
