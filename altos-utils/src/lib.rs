pub mod be_io;
pub mod hexdump;
