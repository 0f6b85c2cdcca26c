// src/instruments/mod.rs
// 设备发现与连接：Linux 走 USBTMC，Windows 走厂商 TLPM 驱动
pub mod tlpm;
pub mod usbtmc;
use std::path::Path;
use anyhow::Result;
use crate::drivers::{PowerSource, SimulatedSource};
/// Resource name that connects the synthetic meter instead of hardware.
pub const SIMULATED_RESOURCE: &str = "sim";
/// Immutable description of one attached meter, as returned by discovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Device node (`/dev/usbtmc0`) or VISA resource string.
    pub resource: String,
    pub model: Option<String>,
    pub serial: Option<String>,
    pub manufacturer: Option<String>,
}
impl DeviceInfo {
    pub fn from_resource(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            model: None,
            serial: None,
            manufacturer: None,
        }
    }
    pub fn simulated() -> Self {
        Self {
            resource: SIMULATED_RESOURCE.to_owned(),
            model: Some("PM100D".to_owned()),
            serial: Some("SIM0001".to_owned()),
            manufacturer: Some("simulated".to_owned()),
        }
    }
    pub fn is_simulated(&self) -> bool {
        self.resource == SIMULATED_RESOURCE
    }
    /// Short human-readable name for lists and window titles.
    pub fn label(&self) -> String {
        match (&self.model, &self.serial) {
            (Some(model), Some(serial)) => format!("{model} {serial} ({})", self.resource),
            _ => self.resource.clone(),
        }
    }
}
/// Lists the meters currently attached to this machine.
pub fn discover() -> Result<Vec<DeviceInfo>> {
    if cfg!(windows) {
        tlpm::discover()
    } else {
        usbtmc::discover(Path::new("/dev"))
    }
}
/// Opens the meter described by `info`.
pub fn connect(info: &DeviceInfo) -> Result<Box<dyn PowerSource>> {
    if info.is_simulated() {
        log::info!("using simulated power meter");
        return Ok(Box::new(SimulatedSource::default()));
    }
    if cfg!(windows) {
        Ok(Box::new(tlpm::TlpmMeter::open(info)?))
    } else {
        Ok(Box::new(usbtmc::UsbtmcMeter::open(Path::new(&info.resource))?))
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn labels() {
        assert_eq!(DeviceInfo::from_resource("/dev/usbtmc0").label(), "/dev/usbtmc0");
        assert_eq!(DeviceInfo::simulated().label(), "PM100D SIM0001 (sim)");
    }
    #[test]
    fn simulated_resource_connects_without_hardware() {
        let mut source = connect(&DeviceInfo::simulated()).unwrap();
        assert!(source.read().unwrap() > 0.0);
        assert_eq!(source.set_wavelength(2000.0).unwrap(), 1100.0);
    }
}
