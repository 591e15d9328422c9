//! `SensorHardware` – the raw analog front-end read once per poll cycle.

use cuebot_types::CueError;

/// Multi-channel ADC (e.g. an MCP3008 behind software SPI).
pub trait SensorHardware: Send {
    /// Number of physical channels.  Constant for the life of the driver.
    fn channel_count(&self) -> usize;

    /// Read every channel once, in channel order.
    ///
    /// Failures are reported per channel so one bad line never hides the
    /// others.  The returned vector always has `channel_count()` entries.
    fn read_all_channels(&mut self) -> Vec<Result<i32, CueError>>;
}
