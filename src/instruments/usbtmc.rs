//! Thorlabs PM100-series meters on Linux, driven with SCPI over the kernel's
//! USBTMC character device (`/dev/usbtmcN`).
//!
//! Every write is one USBTMC message; a query is a write followed by a single
//! read of the response. Commands used:
//! - `*IDN?` identification, `SYST:BEEP:IMM` audible confirmation
//! - `SENS:POW:DC:RANG:AUTO ON` auto ranging, `INP:PDI:FILT:LPAS:STAT 0` bandwidth high
//! - `SENS:CORR:WAV <nm>` / `SENS:CORR:WAV? MIN|MAX` correction wavelength and limits
//! - `SENS:AVER:COUN <n>` averaging
//! - `READ?` one power reading in watts
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;
use anyhow::{Context, Result};
use crate::drivers::{clamp_wavelength, MeterError, PowerSource};
use crate::instruments::DeviceInfo;
const RESPONSE_BUFFER: usize = 4096;
/// Lists the USBTMC device nodes under `dev_dir`, sorted by name.
pub fn discover(dev_dir: &Path) -> Result<Vec<DeviceInfo>> {
    let mut found = Vec::new();
    let entries = std::fs::read_dir(dev_dir)
        .with_context(|| format!("failed to list {}", dev_dir.display()))?;
    for entry in entries.flatten() {
        if entry.file_name().to_string_lossy().starts_with("usbtmc") {
            found.push(DeviceInfo::from_resource(entry.path().to_string_lossy()));
        }
    }
    found.sort_by(|a, b| a.resource.cmp(&b.resource));
    Ok(found)
}
pub struct UsbtmcMeter<T: Read + Write = File> {
    name: String,
    port: T,
    limits: Option<(f64, f64)>,
}
impl UsbtmcMeter<File> {
    /// Opens the device node and applies the default setup (auto range, no
    /// low-pass filter).
    pub fn open(path: &Path) -> Result<Self> {
        let port = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("failed to open USBTMC device {}", path.display()))?;
        Self::with_port(path.display().to_string(), port)
    }
}
impl<T: Read + Write> UsbtmcMeter<T> {
    pub fn with_port(name: String, port: T) -> Result<Self> {
        let mut meter = Self {
            name,
            port,
            limits: None,
        };
        let idn = meter.query("*IDN?").context("identification query failed")?;
        log::info!("{}: {}", meter.name, idn);
        meter.name = format!("{} ({})", meter.name, idn);
        meter.send("SYST:BEEP:IMM")?;
        meter.send("SENS:POW:DC:RANG:AUTO ON")?;
        meter.send("INP:PDI:FILT:LPAS:STAT 0")?;
        let min = meter.query_f64("SENS:CORR:WAV? MIN");
        let max = meter.query_f64("SENS:CORR:WAV? MAX");
        match (min, max) {
            (Ok(min), Ok(max)) => meter.limits = Some((min, max)),
            (Err(err), _) | (_, Err(err)) => {
                log::warn!("{}: wavelength limits unavailable: {err}", meter.name)
            }
        }
        Ok(meter)
    }
    fn send(&mut self, command: &str) -> std::io::Result<()> {
        log::trace!("{} <- {command}", self.name);
        self.port.write_all(command.as_bytes())?;
        self.port.write_all(b"\n")?;
        self.port.flush()
    }
    fn query(&mut self, command: &str) -> std::io::Result<String> {
        self.send(command)?;
        let mut buf = [0u8; RESPONSE_BUFFER];
        let n = self.port.read(&mut buf)?;
        let response = String::from_utf8_lossy(&buf[..n]).trim().to_owned();
        log::trace!("{} -> {response}", self.name);
        Ok(response)
    }
    fn query_f64(&mut self, command: &str) -> Result<f64, MeterError> {
        let response = self
            .query(command)
            .map_err(|err| MeterError::ReadFailure(format!("{command}: {err}")))?;
        parse_number(&response)
    }
}
fn parse_number(response: &str) -> Result<f64, MeterError> {
    response
        .trim()
        .parse::<f64>()
        .map_err(|_| MeterError::ReadFailure(format!("unparseable response {response:?}")))
}
impl<T: Read + Write> PowerSource for UsbtmcMeter<T> {
    fn read(&mut self) -> Result<f64, MeterError> {
        self.query_f64("READ?")
    }
    fn set_wavelength(&mut self, wavelength_nm: f64) -> Result<f64, MeterError> {
        let applied = clamp_wavelength(wavelength_nm, self.limits);
        self.send(&format!("SENS:CORR:WAV {applied}"))?;
        Ok(applied)
    }
    fn wavelength_limits(&self) -> Option<(f64, f64)> {
        self.limits
    }
    fn set_average_count(&mut self, count: u32) -> Result<(), MeterError> {
        self.send(&format!("SENS:AVER:COUN {count}"))?;
        Ok(())
    }
    fn describe(&self) -> String {
        self.name.clone()
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;
    /// Fake device: answers queries from a script and records every command.
    struct FakePort {
        sent: Vec<String>,
        replies: VecDeque<&'static str>,
    }
    impl FakePort {
        fn new(replies: &[&'static str]) -> Self {
            Self {
                sent: Vec::new(),
                replies: replies.iter().copied().collect(),
            }
        }
    }
    impl Write for FakePort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let text = String::from_utf8_lossy(buf);
            if text != "\n" {
                self.sent.push(text.into_owned());
            }
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
    impl Read for FakePort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let reply = self
                .replies
                .pop_front()
                .ok_or_else(|| io::Error::new(io::ErrorKind::TimedOut, "no reply"))?;
            let bytes = format!("{reply}\n").into_bytes();
            buf[..bytes.len()].copy_from_slice(&bytes);
            Ok(bytes.len())
        }
    }
    const IDN: &str = "Thorlabs,PM100D,P0012345,2.6.0";
    #[test]
    fn setup_reads_identity_and_limits() {
        let port = FakePort::new(&[IDN, "400", "1100"]);
        let meter = UsbtmcMeter::with_port("/dev/usbtmc0".into(), port).unwrap();
        assert_eq!(meter.wavelength_limits(), Some((400.0, 1100.0)));
        assert!(meter.describe().contains("PM100D"));
        assert_eq!(
            meter.port.sent,
            vec![
                "*IDN?",
                "SYST:BEEP:IMM",
                "SENS:POW:DC:RANG:AUTO ON",
                "INP:PDI:FILT:LPAS:STAT 0",
                "SENS:CORR:WAV? MIN",
                "SENS:CORR:WAV? MAX",
            ]
        );
    }
    #[test]
    fn read_parses_scientific_notation() {
        let port = FakePort::new(&[IDN, "400", "1100", "1.234E-05"]);
        let mut meter = UsbtmcMeter::with_port("dev".into(), port).unwrap();
        assert!((meter.read().unwrap() - 1.234e-5).abs() < 1e-15);
        assert!(matches!(meter.read(), Err(MeterError::ReadFailure(_))));
    }
    #[test]
    fn wavelength_and_average_commands() {
        let port = FakePort::new(&[IDN, "400", "1100"]);
        let mut meter = UsbtmcMeter::with_port("dev".into(), port).unwrap();
        assert_eq!(meter.set_wavelength(1300.0).unwrap(), 1100.0);
        meter.set_average_count(10).unwrap();
        let sent = &meter.port.sent;
        assert_eq!(sent[sent.len() - 2], "SENS:CORR:WAV 1100");
        assert_eq!(sent[sent.len() - 1], "SENS:AVER:COUN 10");
    }
    #[test]
    fn missing_limits_are_tolerated() {
        let port = FakePort::new(&[IDN, "garbage", "1100"]);
        let mut meter = UsbtmcMeter::with_port("dev".into(), port).unwrap();
        assert_eq!(meter.wavelength_limits(), None);
        assert_eq!(meter.set_wavelength(1300.0).unwrap(), 1300.0);
    }
    #[test]
    fn discovers_usbtmc_nodes_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["usbtmc1", "tty0", "usbtmc0"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let found = discover(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|d| Path::new(&d.resource).file_name().unwrap().to_owned())
            .collect();
        assert_eq!(names, ["usbtmc0", "usbtmc1"]);
    }
}
