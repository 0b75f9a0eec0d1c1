mod board;
mod buffer;
mod controller;
mod geometry;
mod host;
mod iop;
mod iospace;
mod script;
mod storage;
mod translate;

pub use crate::board::Board;
pub use crate::buffer::{SectorBuffer, Watermark, BUFFER_BYTES, HEADER_BYTES};
pub use crate::controller::*;
pub use crate::geometry::{DriveModel, DriveSlot, Geometry, DRIVE_MODELS, MAX_HEADS,
                          SECTORS_PER_TRACK, SECTOR_BYTES};
pub use crate::host::{HostBus, HostBusError, HostIoMap, HostMemory, HostPort, VecMemory};
pub use crate::iop::{ChannelIop, IoProcessor, IopSignal};
pub use crate::iospace::{IoSpace, DATA_PORT, HEAD_SELECT_PORT, OPEN_BUS,
                         SEEK_CYLINDER_PORT, SRAM_SIZE, STATUS_COMMAND_PORT};
pub use crate::script::{parse_script, run_script, Line, ScriptError, ScriptResult, Statement};
pub use crate::storage::*;
pub use crate::translate::{translate, TranslateError};

/// Initialise logging for tests.
#[cfg(test)]
fn init_test_logging() {
    use simplelog::{Config, LevelFilter, TestLogger};

    // The logger can only be initialised once, but we don't know the order of
    // tests. Therefore we ignore the result.
    let _ = TestLogger::init(LevelFilter::Trace, Config::default());
}
