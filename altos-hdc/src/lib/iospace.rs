use log::{trace, warn};

use crate::controller::{Controller, Register};
use crate::iop::IoProcessor;
use crate::storage::Storage;

// I/O-mapped zones.
const BEGIN_SRAM: u32 = 0x0000;             // Read/Write
const END_SRAM: u32 = 0x3FFF;
const BEGIN_REGISTERS: u32 = 0xFFD0;        // Per register
const END_REGISTERS: u32 = 0xFFD7;
const BEGIN_NOP: u32 = 0xFFF8;              // Write-only, ignored
const END_NOP: u32 = 0xFFF9;

// Register ports.
pub const DATA_PORT: u32 = BEGIN_REGISTERS;
pub const HEAD_SELECT_PORT: u32 = BEGIN_REGISTERS + 2;
pub const SEEK_CYLINDER_PORT: u32 = BEGIN_REGISTERS + 4;
pub const STATUS_COMMAND_PORT: u32 = BEGIN_REGISTERS + 6;

pub const SRAM_SIZE: usize = (END_SRAM - BEGIN_SRAM + 1) as usize;

/// What an unmapped read floats to.
pub const OPEN_BUS: u16 = 0xFFFF;

/// The I/O processor's I/O space on the controller board: on-board SRAM for
/// channel programs, and the controller's registers.
pub struct IoSpace<S, P> {
    sram: Vec<u8>,
    controller: Controller<S, P>,
}

impl<S: Storage, P: IoProcessor> IoSpace<S, P> {
    pub fn new(controller: Controller<S, P>) -> Self {
        IoSpace {
            sram: vec![0; SRAM_SIZE],
            controller,
        }
    }

    pub fn controller(&self) -> &Controller<S, P> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Controller<S, P> {
        &mut self.controller
    }

    /// Word read from I/O space.
    pub fn load_io(&mut self, address: u32) -> u16 {
        if address <= END_SRAM {
            let low = self.sram[address as usize];
            // A word at the very top of SRAM wraps its high byte to the bottom.
            let high = self.sram[((address + 1) & END_SRAM) as usize];
            u16::from_le_bytes([low, high])
        } else if (BEGIN_REGISTERS..=END_REGISTERS).contains(&address) {
            let register = decode_register(address);
            match self.controller.read_register(register) {
                Some(value) => value as u16,
                None => {
                    warn!("Read from write-only register {:?} at {:#06X}", register, address);
                    OPEN_BUS
                }
            }
        } else {
            warn!("Unmapped I/O read from {:#06X}", address);
            OPEN_BUS
        }
    }

    /// Word write to I/O space. Registers only see the low byte.
    pub fn store_io(&mut self, address: u32, value: u16) {
        if address <= END_SRAM {
            let [low, high] = value.to_le_bytes();
            self.sram[address as usize] = low;
            self.sram[((address + 1) & END_SRAM) as usize] = high;
        } else if (BEGIN_REGISTERS..=END_REGISTERS).contains(&address) {
            self.controller.write_register(decode_register(address), value as u8);
        } else if (BEGIN_NOP..=END_NOP).contains(&address) {
            trace!("Ignoring write of {:#06X} to {:#06X}", value, address);
        } else {
            warn!("Unmapped I/O write of {:#06X} to {:#06X}", value, address);
        }
    }
}

/// Registers sit on even addresses; the odd byte of each word aliases.
fn decode_register(address: u32) -> Register {
    match (address - BEGIN_REGISTERS) >> 1 {
        0 => Register::Data,
        1 => Register::HeadSelect,
        2 => Register::SeekCylinder,
        _ => Register::StatusCommand,
    }
}
