use std::ops::{Index, IndexMut};

use crate::geometry::SECTOR_BYTES;

/// Size of the sector header region at the start of the buffer.
pub const HEADER_BYTES: usize = 5;
/// Total size of the staging buffer: header followed by sector payload.
pub const BUFFER_BYTES: usize = HEADER_BYTES + SECTOR_BYTES;

/// Cursor positions at which the buffer tells its owner something happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Watermark {
    /// A write moved the cursor to the end of the header.
    HeaderComplete,
    /// An access wrapped the cursor back to the start.
    EndOfBuffer,
}

/// The on-board staging SRAM window: a header and a sector payload, accessed
/// byte by byte through a single wrapping cursor.
pub struct SectorBuffer {
    header: [u8; HEADER_BYTES],
    payload: [u8; SECTOR_BYTES],
    offset: usize,
}

impl SectorBuffer {
    pub fn new() -> Self {
        SectorBuffer {
            header: [0; HEADER_BYTES],
            payload: [0; SECTOR_BYTES],
            offset: 0,
        }
    }

    /// Zero the contents and rewind the cursor.
    pub fn clear(&mut self) {
        self.header = [0; HEADER_BYTES];
        self.payload = [0; SECTOR_BYTES];
        self.offset = 0;
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn set_offset(&mut self, offset: usize) {
        self.offset = offset % BUFFER_BYTES;
    }

    /// Read the byte under the cursor and advance.
    pub fn read_byte(&mut self) -> (u8, Option<Watermark>) {
        let value = self[self.offset];
        self.offset = (self.offset + 1) % BUFFER_BYTES;
        let watermark = if self.offset == 0 {
            Some(Watermark::EndOfBuffer)
        } else {
            None
        };
        (value, watermark)
    }

    /// Store a byte under the cursor and advance.
    pub fn write_byte(&mut self, value: u8) -> Option<Watermark> {
        let offset = self.offset;
        self[offset] = value;
        self.offset = (offset + 1) % BUFFER_BYTES;
        match self.offset {
            0 => Some(Watermark::EndOfBuffer),
            HEADER_BYTES => Some(Watermark::HeaderComplete),
            _ => None,
        }
    }

    pub fn header(&self) -> &[u8; HEADER_BYTES] {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut [u8; HEADER_BYTES] {
        &mut self.header
    }

    pub fn payload(&self) -> &[u8; SECTOR_BYTES] {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut [u8; SECTOR_BYTES] {
        &mut self.payload
    }
}

impl Default for SectorBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<usize> for SectorBuffer {
    type Output = u8;

    fn index(&self, index: usize) -> &Self::Output {
        if index < HEADER_BYTES {
            &self.header[index]
        } else {
            &self.payload[index - HEADER_BYTES]
        }
    }
}

impl IndexMut<usize> for SectorBuffer {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        if index < HEADER_BYTES {
            &mut self.header[index]
        } else {
            &mut self.payload[index - HEADER_BYTES]
        }
    }
}
