use anyhow::{anyhow, Context, Result};
use libloading::Library;
use once_cell::sync::OnceCell;
use std::ffi::CString;
use std::os::raw::c_char;
use crate::drivers::{clamp_wavelength, MeterError, PowerSource};
use crate::instruments::DeviceInfo;
// VISA-style handle and status types used by the TLPM C API.
type ViSession = u32;
type ViStatus = i32;
type ViBoolean = u16;
const VI_TRUE: ViBoolean = 1;
const TLPM_BUFFER_SIZE: usize = 256;
const ATTR_SET_VALUE: i16 = 0;
const ATTR_MIN_VALUE: i16 = 1;
const ATTR_MAX_VALUE: i16 = 2;
const LIBRARY_NAME: &str = "TLPM_64.dll";
/// Serial number reported for meters that another process already holds open.
const ANONYMOUS_SERIAL: &str = "n/a";
struct TlpmApi {
    #[allow(dead_code)]
    lib: Library,
    find_rsrc: unsafe extern "C" fn(ViSession, *mut u32) -> ViStatus,
    get_rsrc_name: unsafe extern "C" fn(ViSession, u32, *mut c_char) -> ViStatus,
    get_rsrc_info: unsafe extern "C" fn(
        ViSession,
        u32,
        *mut c_char,
        *mut c_char,
        *mut c_char,
        *mut ViBoolean,
    ) -> ViStatus,
    init: unsafe extern "C" fn(*const c_char, ViBoolean, ViBoolean, *mut ViSession) -> ViStatus,
    close: unsafe extern "C" fn(ViSession) -> ViStatus,
    meas_power: unsafe extern "C" fn(ViSession, *mut f64) -> ViStatus,
    set_wavelength: unsafe extern "C" fn(ViSession, f64) -> ViStatus,
    get_wavelength: unsafe extern "C" fn(ViSession, i16, *mut f64) -> ViStatus,
    set_power_auto_range: unsafe extern "C" fn(ViSession, i16) -> ViStatus,
}
impl TlpmApi {
    fn load() -> Result<Self> {
        // The vendor installer puts the DLL on PATH.
        let lib = unsafe { Library::new(LIBRARY_NAME) }
            .with_context(|| format!("{LIBRARY_NAME} not found; is the Thorlabs driver installed?"))?;
        // Safety: signatures follow the TLPM C header shipped with the driver.
        unsafe {
            Ok(Self {
                find_rsrc: *lib.get(b"TLPM_findRsrc\0")?,
                get_rsrc_name: *lib.get(b"TLPM_getRsrcName\0")?,
                get_rsrc_info: *lib.get(b"TLPM_getRsrcInfo\0")?,
                init: *lib.get(b"TLPM_init\0")?,
                close: *lib.get(b"TLPM_close\0")?,
                meas_power: *lib.get(b"TLPM_measPower\0")?,
                set_wavelength: *lib.get(b"TLPM_setWavelength\0")?,
                get_wavelength: *lib.get(b"TLPM_getWavelength\0")?,
                set_power_auto_range: *lib.get(b"TLPM_setPowerAutoRange\0")?,
                lib,
            })
        }
    }
    fn instance() -> Result<&'static TlpmApi> {
        static API: OnceCell<TlpmApi> = OnceCell::new();
        API.get_or_try_init(Self::load)
    }
    fn wavelength(&self, handle: ViSession, attribute: i16) -> Result<f64, MeterError> {
        let mut value = 0.0f64;
        check(
            unsafe { (self.get_wavelength)(handle, attribute, &mut value as *mut f64) },
            "TLPM_getWavelength",
        )?;
        Ok(value)
    }
}
fn check(code: ViStatus, call: &str) -> Result<(), MeterError> {
    if code == 0 {
        Ok(())
    } else {
        Err(MeterError::ReadFailure(format!("{call} failed (TLPM status {code:#x})")))
    }
}
/// Reads a NUL-terminated string out of a driver-filled buffer.
fn string_from_buffer(buf: &[c_char]) -> String {
    let bytes: Vec<u8> = buf
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).trim().to_owned()
}
/// Enumerates attached meters. Entries whose serial reads `n/a` are already in
/// use by another session and cannot be addressed, so they are skipped.
pub fn discover() -> Result<Vec<DeviceInfo>> {
    let api = TlpmApi::instance()?;
    let mut count = 0u32;
    check(
        unsafe { (api.find_rsrc)(0, &mut count as *mut u32) },
        "TLPM_findRsrc",
    )?;
    let mut devices = Vec::with_capacity(count as usize);
    for index in 0..count {
        let mut name = [0 as c_char; TLPM_BUFFER_SIZE];
        let mut model = [0 as c_char; TLPM_BUFFER_SIZE];
        let mut serial = [0 as c_char; TLPM_BUFFER_SIZE];
        let mut vendor = [0 as c_char; TLPM_BUFFER_SIZE];
        let mut available: ViBoolean = 0;
        unsafe {
            check(
                (api.get_rsrc_name)(0, index, name.as_mut_ptr()),
                "TLPM_getRsrcName",
            )?;
            check(
                (api.get_rsrc_info)(
                    0,
                    index,
                    model.as_mut_ptr(),
                    serial.as_mut_ptr(),
                    vendor.as_mut_ptr(),
                    &mut available as *mut ViBoolean,
                ),
                "TLPM_getRsrcInfo",
            )?;
        }
        let serial = string_from_buffer(&serial);
        if serial == ANONYMOUS_SERIAL {
            continue;
        }
        devices.push(DeviceInfo {
            resource: string_from_buffer(&name),
            model: Some(string_from_buffer(&model)),
            serial: Some(serial),
            manufacturer: Some(string_from_buffer(&vendor)),
        });
    }
    Ok(devices)
}
/// Meter opened through the vendor TLPM library (Windows).
pub struct TlpmMeter {
    api: &'static TlpmApi,
    handle: ViSession,
    info: DeviceInfo,
    limits: Option<(f64, f64)>,
}
impl TlpmMeter {
    pub fn open(info: &DeviceInfo) -> Result<Self> {
        let api = TlpmApi::instance()?;
        let resource = CString::new(info.resource.as_str())
            .context("resource name contains a NUL byte")?;
        let mut handle: ViSession = 0;
        check(
            unsafe { (api.init)(resource.as_ptr(), VI_TRUE, VI_TRUE, &mut handle as *mut ViSession) },
            "TLPM_init",
        )
        .map_err(|err| anyhow!("failed to connect {}: {err}", info.resource))?;
        let mut meter = Self {
            api,
            handle,
            info: info.clone(),
            limits: None,
        };
        check(
            unsafe { (api.set_power_auto_range)(handle, 1) },
            "TLPM_setPowerAutoRange",
        )?;
        match (
            api.wavelength(handle, ATTR_MIN_VALUE),
            api.wavelength(handle, ATTR_MAX_VALUE),
        ) {
            (Ok(min), Ok(max)) => meter.limits = Some((min, max)),
            (Err(err), _) | (_, Err(err)) => log::warn!("{}: {err}", info.label()),
        }
        if let Ok(current) = api.wavelength(handle, ATTR_SET_VALUE) {
            log::info!("{} connected at {current} nm", info.label());
        }
        Ok(meter)
    }
}
impl PowerSource for TlpmMeter {
    fn read(&mut self) -> Result<f64, MeterError> {
        let mut power = 0.0f64;
        check(
            unsafe { (self.api.meas_power)(self.handle, &mut power as *mut f64) },
            "TLPM_measPower",
        )?;
        Ok(power)
    }
    fn set_wavelength(&mut self, wavelength_nm: f64) -> Result<f64, MeterError> {
        let applied = clamp_wavelength(wavelength_nm, self.limits);
        check(
            unsafe { (self.api.set_wavelength)(self.handle, applied) },
            "TLPM_setWavelength",
        )?;
        Ok(applied)
    }
    fn wavelength_limits(&self) -> Option<(f64, f64)> {
        self.limits
    }
    fn set_average_count(&mut self, _count: u32) -> Result<(), MeterError> {
        Err(MeterError::Unsupported("averaging via TLPM"))
    }
    fn describe(&self) -> String {
        self.info.label()
    }
}
impl Drop for TlpmMeter {
    fn drop(&mut self) {
        let _ = unsafe { (self.api.close)(self.handle) };
    }
}
