//! Big-endian integer IO directly on streams.

use std::io::{self, Read, Write};

pub trait ReadBE: Read {
    fn read_be_u16(&mut self) -> io::Result<u16>;
    fn read_be_u32(&mut self) -> io::Result<u32>;
    /// Read a fixed-size tag, such as a file magic number.
    fn read_tag<const N: usize>(&mut self) -> io::Result<[u8; N]>;
}

impl<T: Read> ReadBE for T {
    fn read_be_u16(&mut self) -> io::Result<u16> {
        Ok(u16::from_be_bytes(self.read_tag()?))
    }

    fn read_be_u32(&mut self) -> io::Result<u32> {
        Ok(u32::from_be_bytes(self.read_tag()?))
    }

    fn read_tag<const N: usize>(&mut self) -> io::Result<[u8; N]> {
        let mut buf = [0; N];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }
}

pub trait WriteBE: Write {
    fn write_be_u16(&mut self, val: u16) -> io::Result<()>;
    fn write_be_u32(&mut self, val: u32) -> io::Result<()>;
}

impl<T: Write> WriteBE for T {
    fn write_be_u16(&mut self, val: u16) -> io::Result<()> {
        self.write_all(&val.to_be_bytes())
    }

    fn write_be_u32(&mut self, val: u32) -> io::Result<()> {
        self.write_all(&val.to_be_bytes())
    }
}
