//! The host side of the controller board: the main processor's I/O space,
//! where the board claims its attention port, and the host memory that the
//! I/O processor's memory bus is wired to.

use log::{debug, trace};
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::ops::RangeInclusive;

/// Ports a peripheral can claim in the host I/O space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPort {
    ChannelAttention,
}

/// A claim that collides with one already made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostBusError {
    pub range: RangeInclusive<u32>,
    pub existing: HostPort,
}

impl Display for HostBusError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "host I/O window {:#06X}-{:#06X} is already claimed by {:?}",
               self.range.start(), self.range.end(), self.existing)
    }
}

impl Error for HostBusError {}

/// A host bus that peripherals register their write handlers with.
pub trait HostBus {
    fn claim_write_port(&mut self, range: RangeInclusive<u32>, port: HostPort)
        -> Result<(), HostBusError>;
}

/// The host I/O space: a list of claimed write windows.
#[derive(Debug, Default)]
pub struct HostIoMap {
    ports: Vec<(RangeInclusive<u32>, HostPort)>,
}

impl HostIoMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Which port, if any, a host write to the given address lands on.
    pub fn decode(&self, address: u32) -> Option<HostPort> {
        self.ports.iter()
            .find(|(range, _)| range.contains(&address))
            .map(|&(_, port)| port)
    }
}

impl HostBus for HostIoMap {
    fn claim_write_port(&mut self, range: RangeInclusive<u32>, port: HostPort)
            -> Result<(), HostBusError> {
        let clash = self.ports.iter()
            .find(|(claimed, _)| claimed.start() <= range.end() && range.start() <= claimed.end());
        if let Some(&(_, existing)) = clash {
            return Err(HostBusError { range, existing });
        }
        debug!("Host I/O {:#06X}-{:#06X} claimed for {:?}", range.start(), range.end(), port);
        self.ports.push((range, port));
        Ok(())
    }
}

/// Host memory as seen from the I/O processor's memory bus.
pub trait HostMemory {
    /// Little-endian word access; the address need not be aligned.
    fn read_word(&self, address: u32) -> u16;
    fn write_word(&mut self, address: u32, value: u16);
}

/// Plain host RAM. Accesses outside it read as all ones and drop writes.
pub struct VecMemory {
    data: Vec<u8>,
}

impl VecMemory {
    pub fn new(size: usize) -> Self {
        VecMemory { data: vec![0; size] }
    }

    fn byte(&self, address: u32) -> u8 {
        self.data.get(address as usize).copied().unwrap_or(0xFF)
    }

    fn set_byte(&mut self, address: u32, value: u8) {
        match self.data.get_mut(address as usize) {
            Some(byte) => *byte = value,
            None => trace!("Host memory write to {:#07X} dropped", address),
        }
    }
}

impl HostMemory for VecMemory {
    fn read_word(&self, address: u32) -> u16 {
        u16::from_le_bytes([self.byte(address), self.byte(address.wrapping_add(1))])
    }

    fn write_word(&mut self, address: u32, value: u16) {
        let [low, high] = value.to_le_bytes();
        self.set_byte(address, low);
        self.set_byte(address.wrapping_add(1), high);
    }
}
