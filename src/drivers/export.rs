use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use crate::drivers::buffer::SampleBuffer;
use crate::drivers::error::MeterError;
pub const EXPORT_HEADER: &str = "Time (s), Power (W)";
/// Dumps every reading in acquisition order, one `time, power` line each.
pub fn write_samples<W: Write>(buffer: &SampleBuffer, mut writer: W) -> Result<(), MeterError> {
    writeln!(writer, "{EXPORT_HEADER}")?;
    for sample in buffer.iter() {
        writeln!(writer, "{}, {}", sample.timestamp, sample.power)?;
    }
    writer.flush()?;
    Ok(())
}
pub fn save_csv(buffer: &SampleBuffer, path: &Path) -> Result<(), MeterError> {
    let file = File::create(path)?;
    write_samples(buffer, BufWriter::new(file))?;
    log::info!("saved {} readings to {}", buffer.len(), path.display());
    Ok(())
}
/// Suggested file name for the save dialog, stamped with the current epoch time.
pub fn default_export_name(now: f64) -> String {
    format!("PM100D_{now}.csv")
}
