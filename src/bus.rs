use core::time::Duration;

use crate::frame::{Direction, Frame, Header};
use crate::runtime::{Cooperative, Runtime};
use crate::timing::{hold, Timing, DEFAULT_BIT_PERIOD};
use crate::transport::{self, ReceiveOptions};
use crate::{Error, InvalidAddress, LineSignal};

/// The default time to wait for a frame in [`Bus::read()`].
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// The role of a device on the bus.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Role {
	/// The master may transmit at any time and addresses the slaves.
	Master,

	/// A slave only receives frames addressed to it,
	/// and transmits one response for every read request.
	Slave,
}

/// The lifecycle state of a [`Bus`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DeviceState {
	/// [`Bus::init()`] has not succeeded yet.
	Uninitialized,

	/// The bus is initialized and not open.
	Idle,

	/// The bus is open.
	Busy,
}

/// Configuration of a [`Bus`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BusConfig {
	/// The role of the device.
	pub role: Role,

	/// The device address.
	///
	/// A slave only accepts frames with this address, and uses it in the header of its responses.
	/// For a master this is the target of [`Bus::write()`].
	pub address: u8,

	/// Pulse widths and thresholds.
	pub timing: Timing,

	/// How long [`Bus::read()`] waits for a valid frame.
	pub read_timeout: Duration,
}

impl BusConfig {
	/// Configuration for a master, using the reference bit period.
	///
	/// Use [`Self::with_address()`] to set the target of [`Bus::write()`].
	pub fn master() -> Self {
		Self {
			role: Role::Master,
			address: 0,
			timing: Timing::from_bit_period(DEFAULT_BIT_PERIOD),
			read_timeout: DEFAULT_READ_TIMEOUT,
		}
	}

	/// Configuration for a slave with the given address, using the reference bit period.
	pub fn slave(address: u8) -> Result<Self, InvalidAddress> {
		Ok(Self {
			role: Role::Slave,
			address: InvalidAddress::check(address)?,
			..Self::master()
		})
	}

	/// Change the device address.
	pub fn with_address(self, address: u8) -> Result<Self, InvalidAddress> {
		Ok(Self {
			address: InvalidAddress::check(address)?,
			..self
		})
	}

	/// Derive all timing from a different bit period, in microseconds.
	pub fn with_bit_period(self, bit_period: u32) -> Self {
		self.with_timing(Timing::from_bit_period(bit_period))
	}

	/// Use custom pulse widths and thresholds.
	pub fn with_timing(self, timing: Timing) -> Self {
		Self { timing, ..self }
	}

	/// Change the timeout of [`Bus::read()`].
	pub fn with_read_timeout(self, read_timeout: Duration) -> Self {
		Self { read_timeout, ..self }
	}

	/// The base timing unit in microseconds.
	pub fn bit_period(&self) -> u32 {
		self.timing.bit_period
	}
}

#[derive(Debug, Default)]
struct BusState {
	initialized: bool,
	busy: bool,
	/// The half-duplex turn: permission to transmit.
	write_enabled: bool,
	/// The select and start pulses were sent by [`Bus::open()`] and the next write can skip them.
	preamble_sent: bool,
}

/// A device on an SLB-Lite bus.
///
/// The bus owns the [`LineSignal`] it drives and the [`Runtime`] hooks used to protect the timing.
pub struct Bus<L, R = Cooperative> {
	line: L,
	runtime: R,
	config: BusConfig,
	state: BusState,
}

impl<L, R> core::fmt::Debug for Bus<L, R>
where
	L: core::fmt::Debug,
{
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Bus")
			.field("line", &self.line)
			.field("config", &self.config)
			.field("state", &self.state)
			.finish_non_exhaustive()
	}
}

impl<L: LineSignal> Bus<L> {
	/// Create a new bus on the given line.
	///
	/// The bus is not usable until [`Self::init()`] succeeds.
	pub fn new(line: L, config: BusConfig) -> Self {
		Self::with_runtime(line, Cooperative, config)
	}
}

impl<L, R> Bus<L, R>
where
	L: LineSignal,
	R: Runtime,
{
	/// Create a new bus using the given runtime hooks.
	pub fn with_runtime(line: L, runtime: R, config: BusConfig) -> Self {
		Self {
			line,
			runtime,
			config,
			state: BusState::default(),
		}
	}

	/// The configuration of the bus.
	pub fn config(&self) -> &BusConfig {
		&self.config
	}

	/// Get a reference to the underlying line.
	pub fn line(&self) -> &L {
		&self.line
	}

	/// Get a mutable reference to the underlying line.
	///
	/// Driving the line directly while a frame is expected will corrupt communication.
	pub fn line_mut(&mut self) -> &mut L {
		&mut self.line
	}

	/// Consume the bus to get ownership of the line.
	pub fn into_line(self) -> L {
		self.line
	}

	/// The current lifecycle state.
	pub fn state(&self) -> DeviceState {
		if !self.state.initialized {
			DeviceState::Uninitialized
		} else if self.state.busy {
			DeviceState::Busy
		} else {
			DeviceState::Idle
		}
	}

	/// Check if this device may transmit a frame now.
	///
	/// Always true for an initialized master.
	/// A slave gets the turn from a read request and loses it when it transmits.
	pub fn has_turn(&self) -> bool {
		self.state.write_enabled
	}

	/// Set up the line and put the device in the idle state.
	///
	/// May be called again to reset the device. This closes the bus if it was open.
	pub fn init(&mut self) -> Result<(), Error<L::Error>> {
		self.state = BusState::default();
		self.line.setup().map_err(Error::NotReady)?;

		// An open-drain device releases the line both to idle as master and to listen as slave.
		self.line.release_high();
		self.state.write_enabled = self.config.role == Role::Master;
		self.state.initialized = true;
		debug!("initialized bus as {:?} with address {:#04X}", self.config.role, self.config.address);
		Ok(())
	}

	/// Open the bus for reading and writing.
	///
	/// Only mode `0` is supported.
	/// A master also sends the select and start pulses, so the first write after opening does not repeat them.
	pub fn open(&mut self, mode: u8) -> Result<(), Error<L::Error>> {
		self.check_initialized()?;
		if mode != 0 {
			return Err(Error::UnsupportedMode(mode));
		}

		let acquired = self.runtime.critical(|| !core::mem::replace(&mut self.state.busy, true));
		if !acquired {
			return Err(Error::AlreadyOpen);
		}

		if self.config.role == Role::Master {
			let timing = self.config.timing;
			self.runtime.no_schedule(|| transport::send_preamble(&mut self.line, &timing));
			self.state.preamble_sent = true;
		}

		debug!("opened bus");
		Ok(())
	}

	/// Close the bus.
	///
	/// A master releases the line to idle.
	/// A slave gives up the turn if it did not use it.
	pub fn close(&mut self) -> Result<(), Error<L::Error>> {
		self.check_initialized()?;

		match self.config.role {
			Role::Master => {
				self.line.release_high();
				self.state.preamble_sent = false;
			},
			Role::Slave => {
				self.runtime.critical(|| self.state.write_enabled = false);
			},
		}

		self.runtime.critical(|| self.state.busy = false);
		debug!("closed bus");
		Ok(())
	}

	/// Wait for a frame and copy its payload into `buffer`.
	///
	/// At most `buffer.len()` payload bytes (and never more than [`MAX_PAYLOAD`](crate::MAX_PAYLOAD)) are accepted.
	/// Returns the number of payload bytes received.
	///
	/// Frames with a bad checksum, truncated frames and (for a slave) frames addressed to other devices are skipped.
	/// If no valid frame arrives within the read timeout, [`Error::Timeout`] is returned.
	pub fn read(&mut self, buffer: &mut [u8]) -> Result<usize, Error<L::Error>> {
		let frame = self.read_frame(buffer.len())?;
		let payload = frame.payload();
		buffer[..payload.len()].copy_from_slice(payload);
		Ok(payload.len())
	}

	/// Wait for a frame with at most `max_payload` payload bytes and return it, header included.
	///
	/// See [`Self::read()`] for the frames that are skipped.
	/// When a slave receives a read request, it gets the turn to transmit one response.
	pub fn read_frame(&mut self, max_payload: usize) -> Result<Frame, Error<L::Error>> {
		self.check_open()?;

		let options = ReceiveOptions {
			own_address: match self.config.role {
				Role::Master => None,
				Role::Slave => Some(self.config.address),
			},
			max_payload,
			timeout: micros(self.config.read_timeout),
		};

		// Any select pulse sent by `open()` is stale once we listen.
		self.state.preamble_sent = false;
		let frame = transport::receive(&mut self.line, &self.runtime, &self.config.timing, &options)
			.map_err(|_| Error::Timeout)?;

		if self.config.role == Role::Slave && frame.header().direction() == Direction::Request {
			self.runtime.critical(|| self.state.write_enabled = true);
			debug!("read request received, took the turn");
		}

		Ok(frame)
	}

	/// Transmit a frame with the given payload.
	///
	/// The frame header carries the configured address with the direction bit set to [`Direction::Write`].
	/// For a slave this is the response to a read request:
	/// it fails with [`Error::WriteNotPermitted`] unless the slave holds the turn, and gives the turn back.
	///
	/// Returns the number of payload bytes sent.
	pub fn write(&mut self, payload: &[u8]) -> Result<usize, Error<L::Error>> {
		self.send(self.config.address, Direction::Write, payload)
	}

	/// Transmit a frame with the given payload to a specific slave.
	///
	/// Only available to a master.
	pub fn write_to(&mut self, address: u8, payload: &[u8]) -> Result<usize, Error<L::Error>> {
		self.check_master()?;
		self.send(address, Direction::Write, payload)
	}

	/// Ask a slave to transmit a response.
	///
	/// Only available to a master.
	/// The response can be received with [`Self::read()`] afterwards.
	pub fn request(&mut self, address: u8) -> Result<(), Error<L::Error>> {
		self.check_master()?;
		self.send(address, Direction::Request, &[])?;
		Ok(())
	}

	fn send(&mut self, address: u8, direction: Direction, payload: &[u8]) -> Result<usize, Error<L::Error>> {
		self.check_open()?;
		let frame = Frame::new(Header::new(address, direction)?, payload)?;
		let timing = self.config.timing;

		if self.config.role == Role::Slave {
			let granted = self.runtime.critical(|| core::mem::replace(&mut self.state.write_enabled, false));
			if !granted {
				warn!("slave tried to transmit without a read request");
				return Err(Error::WriteNotPermitted);
			}
			debug!("gave up the turn");

			// Give the master time to start listening.
			hold(&mut self.line, timing.turnaround);
		}

		let preamble = !core::mem::replace(&mut self.state.preamble_sent, false);
		trace!(
			"sending frame: header {:#04X}, payload {:02X?}, checksum {:#04X}, at most {}us",
			frame.header().raw(),
			frame.payload(),
			frame.checksum(),
			timing.frame_duration(payload.len()),
		);
		self.runtime.no_schedule(|| transport::transmit(&mut self.line, &timing, &frame, preamble));
		Ok(payload.len())
	}

	fn check_initialized(&self) -> Result<(), Error<L::Error>> {
		if self.state.initialized {
			Ok(())
		} else {
			Err(Error::NotInitialized)
		}
	}

	fn check_open(&self) -> Result<(), Error<L::Error>> {
		self.check_initialized()?;
		if self.state.busy {
			Ok(())
		} else {
			Err(Error::NotOpen)
		}
	}

	fn check_master(&self) -> Result<(), Error<L::Error>> {
		if self.config.role == Role::Master {
			Ok(())
		} else {
			Err(Error::NotMaster)
		}
	}
}

fn micros(duration: Duration) -> u64 {
	u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

#[cfg(all(test, feature = "std"))]
mod test {
	use super::*;
	use crate::sim::SimLine;
	use assert2::{assert, let_assert};

	fn slave() -> Bus<SimLine> {
		let_assert!(Ok(config) = BusConfig::slave(0x01));
		let mut bus = Bus::new(SimLine::new(), config);
		assert!(let Ok(()) = bus.init());
		bus
	}

	fn master() -> Bus<SimLine> {
		let mut bus = Bus::new(SimLine::new(), BusConfig::master());
		assert!(let Ok(()) = bus.init());
		bus
	}

	#[test]
	fn config_builders() {
		let_assert!(Ok(config) = BusConfig::slave(0x12));
		assert!(config.role == Role::Slave);
		assert!(config.address == 0x12);
		assert!(config.bit_period() == 33);
		assert!(config.read_timeout == Duration::from_millis(100));

		let config = config.with_bit_period(50).with_read_timeout(Duration::from_millis(20));
		assert!(config.timing == Timing::from_bit_period(50));
		assert!(config.read_timeout == Duration::from_millis(20));

		assert!(let Err(InvalidAddress { address: 0x80 }) = BusConfig::slave(0x80));
		assert!(let Err(InvalidAddress { address: 0xFF }) = BusConfig::master().with_address(0xFF));
	}

	#[test]
	fn lifecycle() {
		let mut bus = Bus::new(SimLine::new(), BusConfig::master());
		assert!(bus.state() == DeviceState::Uninitialized);
		assert!(let Err(Error::NotInitialized) = bus.open(0));
		assert!(let Err(Error::NotInitialized) = bus.close());

		assert!(let Ok(()) = bus.init());
		assert!(bus.state() == DeviceState::Idle);
		assert!(bus.has_turn());
		assert!(let Ok(()) = bus.open(0));
		assert!(bus.state() == DeviceState::Busy);
		assert!(let Ok(()) = bus.close());
		assert!(bus.state() == DeviceState::Idle);
	}

	#[test]
	fn init_failure() {
		let mut bus = Bus::new(SimLine::failing(), BusConfig::master());
		assert!(let Err(Error::NotReady(_)) = bus.init());
		assert!(bus.state() == DeviceState::Uninitialized);
		assert!(bus.line().setup_calls() == 1);
	}

	#[test]
	fn reinit_resets_state() {
		let mut bus = master();
		assert!(let Ok(()) = bus.open(0));
		assert!(let Ok(()) = bus.init());
		assert!(bus.state() == DeviceState::Idle);
		assert!(let Ok(()) = bus.open(0));
	}

	#[test]
	fn double_open() {
		let mut bus = slave();
		assert!(let Ok(()) = bus.open(0));
		assert!(let Err(Error::AlreadyOpen) = bus.open(0));
		assert!(let Ok(()) = bus.close());
		assert!(let Ok(()) = bus.open(0));
	}

	#[test]
	fn unsupported_mode() {
		let mut bus = slave();
		assert!(let Err(Error::UnsupportedMode(1)) = bus.open(1));
		assert!(bus.state() == DeviceState::Idle);
		assert!(let Ok(()) = bus.open(0));
	}

	#[test]
	fn read_write_need_open_bus() {
		let mut bus = master();
		let mut buffer = [0; 4];
		assert!(let Err(Error::NotOpen) = bus.write(&[1]));
		assert!(let Err(Error::NotOpen) = bus.read(&mut buffer));

		let mut bus = Bus::new(SimLine::new(), BusConfig::master());
		assert!(let Err(Error::NotInitialized) = bus.write(&[1]));
		assert!(let Err(Error::NotInitialized) = bus.read(&mut buffer));
	}

	#[test]
	fn slave_without_turn_leaves_line_alone() {
		let mut bus = slave();
		assert!(!bus.has_turn());
		assert!(let Ok(()) = bus.open(0));
		assert!(let Err(Error::WriteNotPermitted) = bus.write(&[0x32, 0x33]));
		assert!(bus.line().recording().is_empty());
	}

	#[test]
	fn slave_is_not_master() {
		let mut bus = slave();
		assert!(let Ok(()) = bus.open(0));
		assert!(let Err(Error::NotMaster) = bus.request(0x02));
		assert!(let Err(Error::NotMaster) = bus.write_to(0x02, &[1]));
	}

	#[test]
	fn payload_too_long() {
		let mut bus = master();
		assert!(let Ok(()) = bus.open(0));
		let recorded = bus.line_mut().take_recording();
		assert!(!recorded.is_empty());
		assert!(let Err(Error::PayloadTooLong(_)) = bus.write(&[0; 33]));
		assert!(let Err(Error::InvalidAddress(_)) = bus.write_to(0x80, &[0; 3]));
		assert!(bus.line().recording().is_empty());
	}

	#[test]
	fn master_open_sends_preamble_once() {
		let mut bus = master();
		assert!(let Ok(()) = bus.open(0));
		let preamble = bus.line_mut().take_recording();
		assert!(preamble.pulses().len() == 1);
		assert!(preamble.pulses()[0].0 == false);

		// The first write continues right after the start pulse.
		assert!(let Ok(1) = bus.write_to(0x01, &[0xFF]));
		let first = bus.line_mut().take_recording();
		assert!(first.pulses()[0].1 <= 35);

		// The second write brings its own select pulse.
		assert!(let Ok(1) = bus.write_to(0x01, &[0xFF]));
		let second = bus.line_mut().take_recording();
		assert!(second.pulses()[0].1 >= 891);

		assert!(let Ok(()) = bus.close());
		assert!(!bus.line().is_driven_low());
	}

	#[test]
	fn read_timeout() {
		let mut bus = slave();
		assert!(let Ok(()) = bus.open(0));
		let mut buffer = [0; 32];
		assert!(let Err(Error::Timeout) = bus.read(&mut buffer));
		assert!(bus.line().now() >= 100_000);
	}

	#[test]
	fn slave_close_gives_up_turn() {
		let mut bus = slave();
		assert!(let Ok(()) = bus.open(0));
		bus.state.write_enabled = true;
		assert!(let Ok(()) = bus.close());
		assert!(!bus.has_turn());
	}
}
