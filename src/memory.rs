//! The capability interface every addressable device implements.
//!
//! A [`MemoryPort`] is fallible by construction: a device only answers for the
//! addresses it claims via [`MemoryPort::is_readable`]/[`MemoryPort::is_writable`],
//! and any access outside that claim surfaces `InvalidRead`/`InvalidWrite` rather
//! than panicking.

use crate::bits::combine_bytes;
use crate::error::{Error, Result};

pub trait MemoryPort {
    fn is_readable(&self, address: u16) -> bool;
    fn is_writable(&self, address: u16) -> bool;

    fn read_byte(&mut self, address: u16) -> Result<u8>;
    fn write_byte(&mut self, address: u16, value: u8) -> Result<()>;

    /// Reads two bytes little-endian starting at `address` and combines them
    /// into a 16-bit address.
    fn read_pointer(&mut self, address: u16) -> Result<u16> {
        let low = self.read_byte(address)?;
        let high = self.read_byte(address.wrapping_add(1))?;
        Ok(combine_bytes(low, high))
    }

    /// Writes `pointer` little-endian starting at `address`.
    fn write_pointer(&mut self, address: u16, pointer: u16) -> Result<()> {
        let (low, high) = crate::bits::split_bytes(pointer);
        self.write_byte(address, low)?;
        self.write_byte(address.wrapping_add(1), high)?;
        Ok(())
    }

    /// `read_pointer(read_pointer(address))`: follow one pointer to find another.
    fn deref_pointer(&mut self, address: u16) -> Result<u16> {
        let inner = self.read_pointer(address)?;
        self.read_pointer(inner)
    }
}

/// Convenience used by devices to reject an access outside their claimed range.
/// Warns before surfacing the error so a misbehaving ROM's bad accesses are
/// visible without needing to inspect the propagated error (§10.1).
pub fn invalid_read(address: u16) -> Error {
    log::warn!("invalid read at address {address:#06x}");
    Error::InvalidRead(address)
}

pub fn invalid_write(address: u16) -> Error {
    log::warn!("invalid write at address {address:#06x}");
    Error::InvalidWrite(address)
}
