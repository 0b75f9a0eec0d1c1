//! The disk controller proper: register file, command state machine and the
//! staging buffer, sitting between the I/O processor and up to two drives.
//!
//! Command completion is not signalled to the host. Software is expected to
//! poll the status registers.


use altos_utils::hexdump::hex_dump;
use log::{debug, error, info, log_enabled, trace, warn, Level};
use std::collections::VecDeque;
use std::fmt::{self, Display, Formatter};
use std::ops::RangeInclusive;

use crate::buffer::{SectorBuffer, Watermark, HEADER_BYTES};
use crate::geometry::DriveSlot;
use crate::host::{HostBus, HostBusError, HostPort};
use crate::iop::IoProcessor;
use crate::storage::{Storage, StorageError};
use crate::translate::{translate, TranslateError};

// Status register bits.
pub const STATUS_BUSY: u8 = 0x01;
pub const STATUS_RECORD_NOT_FOUND: u8 = 0x40;
pub const STATUS_READY: u8 = 0x80;

// Seek status register bits.
pub const SEEK_STATUS_SELECTED: u8 = 0x01;
pub const SEEK_STATUS_SEEK_COMPLETE: u8 = 0x02;
const SEEK_STATUS_INITIAL: u8 = 0xFC;

// Commands.
pub const COMMAND_READ: u8 = 0x01;
pub const COMMAND_WRITE: u8 = 0x02;
pub const COMMAND_WRITE_FORMAT: u8 = 0x04;
pub const COMMAND_LONG: u8 = 0x08;
pub const COMMAND_READ_LONG: u8 = COMMAND_READ | COMMAND_LONG;
pub const COMMAND_SEEK: u8 = 0x10;
pub const COMMAND_SELECT: u8 = 0x20;
pub const COMMAND_RESET: u8 = 0x80;

// Drive select codes in the upper nibble of the head select register.
const SELECT_DRIVE_0: u8 = 0x10;
const SELECT_DRIVE_1: u8 = 0x20;

/// Second byte of a formatted sector header.
pub const SECTOR_MARK: u8 = 0xFE;

/// Where the board claims its channel attention port in host I/O space.
pub const ATTENTION_PORT: RangeInclusive<u32> = 0xFF00..=0xFF01;

const MAX_DIAGNOSTICS: usize = 64;

/// The controller's registers, as decoded from the I/O processor's bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    /// Read/write: the next byte of the sector buffer.
    Data,
    /// Write-only: drive and head select.
    HeadSelect,
    /// Read: seek status. Write: cylinder latch.
    SeekCylinder,
    /// Read: status. Write: command.
    StatusCommand,
}

/// The multi-step command currently using the sector buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Idle,
    Read,
    ReadLong,
    Write,
    WriteFormat,
}

/// Something the host did that the controller tolerated but didn't like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    FillCount { command: u8, expected: usize, actual: usize },
    UnknownCommand(u8),
    UnsupportedSelect(u8),
    DriveNotPresent(usize),
    HeadInvalid { drive: usize, head: u8 },
    RecordNotFound(TranslateError),
    SectorMark(u8),
    CylinderMismatch { expected: u32, found: u16 },
    HeadMismatch { expected: u8, found: u8 },
    StorageFailure(String),
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::FillCount { command, expected, actual } =>
                write!(f, "command {:#04X} expected {} value(s) in data buffer, has {}",
                       command, expected, actual),
            Diagnostic::UnknownCommand(command) => write!(f, "unknown command {:#04X}", command),
            Diagnostic::UnsupportedSelect(value) =>
                write!(f, "unsupported drive select {:#04X}", value),
            Diagnostic::DriveNotPresent(drive) => write!(f, "drive {} not present", drive),
            Diagnostic::HeadInvalid { drive, head } =>
                write!(f, "head {} invalid for drive {}", head, drive),
            Diagnostic::RecordNotFound(e) => write!(f, "record not found: {}", e),
            Diagnostic::SectorMark(mark) => write!(f, "suspicious sector mark {:#04X}", mark),
            Diagnostic::CylinderMismatch { expected, found } =>
                write!(f, "cylinder number mismatch: on {}, header says {}", expected, found),
            Diagnostic::HeadMismatch { expected, found } =>
                write!(f, "head number mismatch: on {}, header says {}", expected, found),
            Diagnostic::StorageFailure(desc) => write!(f, "storage failure: {}", desc),
        }
    }
}

/// The outcome of checking a sector header written by a format command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderCheck {
    pub sector: u8,
    pub mark_ok: bool,
    pub cylinder_ok: bool,
    pub head_ok: bool,
    /// The two sector numbers may legitimately differ on interleaved tracks.
    pub sector_numbers_match: bool,
}

impl HeaderCheck {
    pub fn is_consistent(&self) -> bool {
        self.mark_ok && self.cylinder_ok && self.head_ok
    }
}

/// A hard disk controller with two drive positions.
pub struct Controller<S, P> {
    iop: P,
    storage: [S; 2],
    drives: [DriveSlot; 2],
    buffer: SectorBuffer,
    selected_drive: usize,
    selected_head: u8,
    status: u8,
    seek_status: u8,
    cylinder_latch: u16,
    command: Command,
    data_request: bool,
    diagnostics: VecDeque<Diagnostic>,
    last_header_check: Option<HeaderCheck>,
}

impl<S: Storage, P: IoProcessor> Controller<S, P> {
    /// Construct a controller and put it through a power-on reset.
    pub fn new(iop: P, drive_0: S, drive_1: S) -> Self {
        let mut controller = Controller {
            iop,
            storage: [drive_0, drive_1],
            drives: [DriveSlot::default(); 2],
            buffer: SectorBuffer::new(),
            selected_drive: 0,
            selected_head: 0,
            status: 0,
            seek_status: SEEK_STATUS_INITIAL,
            cylinder_latch: 0,
            command: Command::Idle,
            data_request: false,
            diagnostics: VecDeque::new(),
            last_header_check: None,
        };
        controller.reset();
        controller
    }

    /// Return the controller to its power-on state and capture the geometry
    /// of whatever media is attached.
    pub fn reset(&mut self) {
        self.status = 0;
        self.seek_status = SEEK_STATUS_INITIAL;
        self.cylinder_latch = 0;
        self.selected_drive = 0;
        self.selected_head = 0;
        self.command = Command::Idle;
        self.buffer.clear();
        self.last_header_check = None;
        for (slot, storage) in self.drives.iter_mut().zip(self.storage.iter()) {
            *slot = DriveSlot::capture(storage.geometry());
        }
        self.set_data_request(false);

        info!("Disk controller reset.");
        for (drive, slot) in self.drives.iter().enumerate() {
            match slot.geometry {
                Some(geometry) => debug!("Drive {}: {}", drive, geometry),
                None => debug!("Drive {}: not present", drive),
            }
        }
    }

    /// Claim the board's attention port on the host bus. Host writes there
    /// must be routed to `attention_w`.
    pub fn attach(&self, bus: &mut impl HostBus) -> Result<(), HostBusError> {
        bus.claim_write_port(ATTENTION_PORT, HostPort::ChannelAttention)?;
        info!("Disk controller attached to host bus.");
        Ok(())
    }

    /// Handle a register read from the I/O processor.
    pub fn read_register(&mut self, register: Register) -> Option<u8> {
        let value = match register {
            Register::Data => self.data_r(),
            Register::HeadSelect => return None,
            Register::SeekCylinder => self.seek_status_r(),
            Register::StatusCommand => self.status_r(),
        };
        trace!("{:?} -> {:#04X}", register, value);
        Some(value)
    }

    /// Handle a register write from the I/O processor.
    pub fn write_register(&mut self, register: Register, value: u8) {
        trace!("{:?} <- {:#04X}", register, value);
        match register {
            Register::Data => self.data_w(value),
            Register::HeadSelect => self.head_select_w(value),
            Register::SeekCylinder => self.cylinder_w(value),
            Register::StatusCommand => self.command_w(value),
        }
    }

    /// Stream the next byte out of the sector buffer.
    pub fn data_r(&mut self) -> u8 {
        let (value, watermark) = self.buffer.read_byte();
        if let Some(Watermark::EndOfBuffer) = watermark {
            debug!("Read reached the end of the data buffer.");
            self.set_data_request(false);
            if let Command::Read | Command::ReadLong = self.command {
                self.command = Command::Idle;
            }
        }
        value
    }

    /// Stream the next byte into the sector buffer.
    pub fn data_w(&mut self, value: u8) {
        match self.buffer.write_byte(value) {
            Some(Watermark::HeaderComplete) if self.command == Command::WriteFormat => {
                self.check_format_header();
                self.set_data_request(false);
            }
            Some(Watermark::EndOfBuffer) => {
                debug!("Write reached the end of the data buffer.");
                self.set_data_request(false);
                match self.command {
                    Command::Write | Command::WriteFormat => {
                        let sector = self.buffer[0];
                        self.write_sector(sector);
                    }
                    _ => debug!("No write in progress, buffer contents kept."),
                }
                self.command = Command::Idle;
            }
            _ => {}
        }
    }

    pub fn head_select_w(&mut self, value: u8) {
        self.status &= !STATUS_READY;

        let drive = match value & 0xF0 {
            SELECT_DRIVE_0 => 0,
            SELECT_DRIVE_1 => 1,
            _ => return self.report(Diagnostic::UnsupportedSelect(value)),
        };
        self.selected_drive = drive;

        let geometry = match self.drives[drive].geometry {
            Some(geometry) => geometry,
            None => return self.report(Diagnostic::DriveNotPresent(drive)),
        };

        let head = value & 0x0F;
        self.selected_head = head;
        if head as u16 > geometry.heads {
            return self.report(Diagnostic::HeadInvalid { drive, head });
        }

        self.status |= STATUS_READY;
        debug!("Selected drive {} head {}.", drive, head);
    }

    pub fn seek_status_r(&self) -> u8 {
        self.seek_status
    }

    /// Shift a byte into the cylinder latch. The most recent write ends up
    /// in the high byte, so the low byte goes first.
    pub fn cylinder_w(&mut self, value: u8) {
        self.cylinder_latch = (self.cylinder_latch >> 8) | ((value as u16) << 8);
    }

    pub fn status_r(&self) -> u8 {
        self.status
    }

    /// Execute a command. Every command runs to completion here; reads and
    /// writes then continue through the data port.
    pub fn command_w(&mut self, value: u8) {
        match value {
            COMMAND_READ => {
                // Sector number is in the data buffer; data readout follows.
                debug!("READ command");
                self.expect_fill(value, 1);
                let sector = self.buffer[0];
                self.command = Command::Read;
                if !self.read_sector(sector) {
                    self.command = Command::Idle;
                }
                // Skip the header, just read the data.
                self.buffer.set_offset(HEADER_BYTES);
            }
            COMMAND_READ_LONG => {
                // Sector number is in the data buffer; header and data follow.
                debug!("READ LONG command");
                self.expect_fill(value, 1);
                let sector = self.buffer[0];
                self.command = Command::ReadLong;
                if self.read_sector(sector) {
                    let cylinder = self.drives[self.selected_drive].current_cylinder;
                    // Bit 3 of the second byte flags a bad sector; never set.
                    *self.buffer.header_mut() = [
                        cylinder as u8,
                        self.selected_head << 4 | ((cylinder >> 8) as u8 & 0x07),
                        sector,
                        0,
                        0,
                    ];
                } else {
                    self.command = Command::Idle;
                }
                self.buffer.set_offset(0);
            }
            COMMAND_WRITE => {
                // Sector number is in the data buffer; data write follows.
                debug!("WRITE command");
                self.expect_fill(value, 1);
                self.command = Command::Write;
                self.buffer.set_offset(HEADER_BYTES);
                self.set_data_request(true);
            }
            COMMAND_WRITE_FORMAT => {
                // Sector number is in the data buffer; header write follows.
                debug!("WRITE FORMAT command");
                self.expect_fill(value, 1);
                self.command = Command::WriteFormat;
                self.last_header_check = None;
                // Leave the sector number in.
                self.buffer.set_offset(1);
                self.set_data_request(true);
            }
            COMMAND_SEEK => {
                // Current cylinder is in the data buffer, new one in the latch.
                let from = (self.buffer[1] as u16) << 8 | self.buffer[0] as u16;
                debug!("SEEK from cylinder {} to {}", from, self.cylinder_latch);
                self.expect_fill(value, 2);
                self.buffer.set_offset(0);
                self.command = Command::Idle;
                self.drives[self.selected_drive].current_cylinder = self.cylinder_latch as u32;
                self.seek_status |= SEEK_STATUS_SEEK_COMPLETE;
                self.status &= !STATUS_BUSY;
            }
            COMMAND_SELECT => {
                debug!("SELECT command");
                self.seek_status |= SEEK_STATUS_SELECTED;
            }
            COMMAND_RESET => {
                debug!("RESET command");
                self.reset();
            }
            _ => self.report(Diagnostic::UnknownCommand(value)),
        }
    }

    /// The host wrote to the attention port: pass a pulse on to the I/O
    /// processor. The value written doesn't matter.
    pub fn attention_w(&mut self, value: u16) {
        trace!("Channel attention ({:#06X})", value);
        self.iop.channel_attention();
    }

    pub fn drive(&self, drive: usize) -> Option<&DriveSlot> {
        self.drives.get(drive)
    }

    pub fn storage(&self, drive: usize) -> Option<&S> {
        self.storage.get(drive)
    }

    /// Swap the media in a drive position, returning the old one. The
    /// controller only notices at the next reset. Hands the new media back
    /// if there is no such position.
    pub fn replace_storage(&mut self, drive: usize, storage: S) -> Result<S, S> {
        match self.storage.get_mut(drive) {
            Some(slot) => Ok(std::mem::replace(slot, storage)),
            None => Err(storage),
        }
    }

    pub fn selected_drive(&self) -> usize {
        self.selected_drive
    }

    pub fn selected_head(&self) -> u8 {
        self.selected_head
    }

    pub fn cylinder_latch(&self) -> u16 {
        self.cylinder_latch
    }

    pub fn command_in_flight(&self) -> Command {
        self.command
    }

    /// The level the data request line was last driven to.
    pub fn data_request(&self) -> bool {
        self.data_request
    }

    pub fn buffer(&self) -> &SectorBuffer {
        &self.buffer
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.diagnostics.drain(..).collect()
    }

    pub fn last_header_check(&self) -> Option<HeaderCheck> {
        self.last_header_check
    }

    fn set_data_request(&mut self, asserted: bool) {
        self.data_request = asserted;
        self.iop.set_data_request(asserted);
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        warn!("{}", diagnostic);
        if self.diagnostics.len() == MAX_DIAGNOSTICS {
            self.diagnostics.pop_front();
        }
        self.diagnostics.push_back(diagnostic);
    }

    fn expect_fill(&mut self, command: u8, expected: usize) {
        let actual = self.buffer.offset();
        if actual != expected {
            self.report(Diagnostic::FillCount { command, expected, actual });
        }
    }

    /// Resolve a sector on the selected drive and head, flagging record not
    /// found if it doesn't exist.
    fn locate(&mut self, sector: u8) -> Option<u32> {
        match translate(&self.drives, self.selected_drive, self.selected_head, sector) {
            Ok(lba) => {
                trace!("Drive {} sector CHS={}/{}/{} found at block {}",
                       self.selected_drive, self.drives[self.selected_drive].current_cylinder,
                       self.selected_head, sector, lba);
                Some(lba)
            }
            Err(e) => {
                self.status |= STATUS_RECORD_NOT_FOUND;
                self.report(Diagnostic::RecordNotFound(e));
                None
            }
        }
    }

    fn storage_failure(&mut self, e: StorageError) {
        error!("Drive {}: {}", self.selected_drive, e);
        self.status |= STATUS_RECORD_NOT_FOUND;
        self.report(Diagnostic::StorageFailure(e.to_string()));
    }

    /// Fill the payload from disk and ask for it to be streamed out.
    fn read_sector(&mut self, sector: u8) -> bool {
        let lba = match self.locate(sector) {
            Some(lba) => lba,
            None => return false,
        };
        let drive = self.selected_drive;
        if let Err(e) = self.storage[drive].read(lba, self.buffer.payload_mut()) {
            self.storage_failure(e);
            return false;
        }
        if log_enabled!(Level::Trace) {
            trace!("Block {}:\n{}", lba, hex_dump(self.buffer.payload(), HEADER_BYTES));
        }
        self.set_data_request(true);
        true
    }

    /// Commit the payload to disk.
    fn write_sector(&mut self, sector: u8) {
        let lba = match self.locate(sector) {
            Some(lba) => lba,
            None => return,
        };
        let drive = self.selected_drive;
        if let Err(e) = self.storage[drive].write(lba, self.buffer.payload()) {
            return self.storage_failure(e);
        }
        debug!("Wrote drive {} block {}.", drive, lba);
    }

    /// Check the header bytes of a format command against where the heads
    /// actually are. Mismatches are reported but never stop the format.
    fn check_format_header(&mut self) {
        let header = *self.buffer.header();
        let cylinder = self.drives[self.selected_drive].current_cylinder;
        let header_cylinder = ((header[3] & 0x0F) as u16) << 8 | header[2] as u16;
        let header_head = header[3] >> 4;

        let check = HeaderCheck {
            sector: header[0],
            mark_ok: header[1] == SECTOR_MARK,
            cylinder_ok: header_cylinder as u32 == cylinder,
            head_ok: header_head == self.selected_head,
            sector_numbers_match: header[0] == header[4],
        };
        debug!("Format header for drive {} CHS={}/{}/{}: {:02X?}",
               self.selected_drive, cylinder, self.selected_head, header[0], header);

        if !check.mark_ok {
            self.report(Diagnostic::SectorMark(header[1]));
        }
        if !check.cylinder_ok {
            self.report(Diagnostic::CylinderMismatch { expected: cylinder, found: header_cylinder });
        }
        if !check.head_ok {
            self.report(Diagnostic::HeadMismatch { expected: self.selected_head, found: header_head });
        }
        if !check.sector_numbers_match {
            debug!("Sector number mismatch {} vs {} (probably interleave).", header[0], header[4]);
        }
        self.last_header_check = Some(check);
    }
}
