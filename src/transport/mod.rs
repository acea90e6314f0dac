//! Abstract programmer transport interface.
use anyhow::Result;

use crate::{Chip, config::EccOptions, eeprom::Eeprom, error::StatusCode};

pub use self::emulated::EmulatedTransport;

mod emulated;
#[cfg(test)]
pub(crate) mod mock;

/// Outcome of a single erase, write or read request.
pub type Status<T> = std::result::Result<T, StatusCode>;

/// Abstraction of the programmer.
/// Might be a CH341A over USB, a Linux spidev, or an emulated chip.
///
/// Chunking, timeouts, retries and ECC all live below this interface.
pub trait Transport {
    /// Acquire the programmer. Must succeed before anything else is called.
    fn probe(&mut self) -> Result<()>;
    /// Detect the attached chip and prepare its command set.
    ///
    /// `eeprom` carries the bus, organization and address length of a
    /// user-selected EEPROM, which cannot be detected.
    fn init_command_set(&mut self, ecc: EccOptions, eeprom: Option<&Eeprom>) -> Result<Chip>;

    fn erase(&mut self, address: usize, length: usize) -> Status<()>;
    /// Program `data` at `address`, returning the number of bytes written.
    fn write(&mut self, data: &[u8], address: usize) -> Status<usize>;
    /// Fill `buf` from `address`, returning the number of bytes read.
    fn read(&mut self, buf: &mut [u8], address: usize) -> Status<usize>;

    /// Release the programmer. Called once, after a successful `probe`.
    fn shutdown(&mut self);
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn probe(&mut self) -> Result<()> {
        (**self).probe()
    }

    fn init_command_set(&mut self, ecc: EccOptions, eeprom: Option<&Eeprom>) -> Result<Chip> {
        (**self).init_command_set(ecc, eeprom)
    }

    fn erase(&mut self, address: usize, length: usize) -> Status<()> {
        (**self).erase(address, length)
    }

    fn write(&mut self, data: &[u8], address: usize) -> Status<usize> {
        (**self).write(data, address)
    }

    fn read(&mut self, buf: &mut [u8], address: usize) -> Status<usize> {
        (**self).read(buf, address)
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }
}
