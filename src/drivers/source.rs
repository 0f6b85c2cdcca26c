use rand::Rng;
use crate::drivers::MeterError;
/// Anything that can be polled for a single optical power reading.
///
/// Configuration calls are passed straight through to the instrument; the
/// acquisition core never interprets them.
pub trait PowerSource {
    /// One reading in watts.
    fn read(&mut self) -> Result<f64, MeterError>;
    /// Applies a correction wavelength and returns the value the device accepted
    /// (out-of-range requests are clamped to the nearest device limit).
    fn set_wavelength(&mut self, wavelength_nm: f64) -> Result<f64, MeterError>;
    /// Device-reported wavelength limits in nm, if known.
    fn wavelength_limits(&self) -> Option<(f64, f64)> {
        None
    }
    fn set_average_count(&mut self, count: u32) -> Result<(), MeterError>;
    fn describe(&self) -> String;
}
impl<S: PowerSource + ?Sized> PowerSource for Box<S> {
    fn read(&mut self) -> Result<f64, MeterError> {
        (**self).read()
    }
    fn set_wavelength(&mut self, wavelength_nm: f64) -> Result<f64, MeterError> {
        (**self).set_wavelength(wavelength_nm)
    }
    fn wavelength_limits(&self) -> Option<(f64, f64)> {
        (**self).wavelength_limits()
    }
    fn set_average_count(&mut self, count: u32) -> Result<(), MeterError> {
        (**self).set_average_count(count)
    }
    fn describe(&self) -> String {
        (**self).describe()
    }
}
/// Clamps a requested wavelength into `limits`, logging when it had to move.
pub fn clamp_wavelength(requested_nm: f64, limits: Option<(f64, f64)>) -> f64 {
    let Some((min, max)) = limits else {
        return requested_nm;
    };
    if requested_nm < min {
        log::warn!("wavelength {requested_nm} nm below minimum, using {min} nm");
        min
    } else if requested_nm > max {
        log::warn!("wavelength {requested_nm} nm above maximum, using {max} nm");
        max
    } else {
        requested_nm
    }
}
/// In-memory source for tests.
///
/// Each call to `read` pops the next scripted result; an exhausted script reads
/// as a failure, like an unplugged meter.
#[cfg(test)]
pub struct ManualSource {
    queue: std::collections::VecDeque<Result<f64, MeterError>>,
    reads: usize,
    wavelength_nm: f64,
    average_count: u32,
    limits: Option<(f64, f64)>,
}
#[cfg(test)]
impl ManualSource {
    pub fn new(readings: impl IntoIterator<Item = f64>) -> Self {
        Self::scripted(readings.into_iter().map(Ok))
    }
    pub fn scripted(results: impl IntoIterator<Item = Result<f64, MeterError>>) -> Self {
        Self {
            queue: results.into_iter().collect(),
            reads: 0,
            wavelength_nm: 0.0,
            average_count: 1,
            limits: None,
        }
    }
    pub fn with_limits(mut self, min_nm: f64, max_nm: f64) -> Self {
        self.limits = Some((min_nm, max_nm));
        self
    }
    /// Number of times `read` has been called.
    pub fn reads(&self) -> usize {
        self.reads
    }
    pub fn average_count(&self) -> u32 {
        self.average_count
    }
}
#[cfg(test)]
impl PowerSource for ManualSource {
    fn read(&mut self) -> Result<f64, MeterError> {
        self.reads += 1;
        self.queue
            .pop_front()
            .unwrap_or_else(|| Err(MeterError::ReadFailure("no more scripted readings".into())))
    }
    fn set_wavelength(&mut self, wavelength_nm: f64) -> Result<f64, MeterError> {
        self.wavelength_nm = clamp_wavelength(wavelength_nm, self.limits);
        Ok(self.wavelength_nm)
    }
    fn wavelength_limits(&self) -> Option<(f64, f64)> {
        self.limits
    }
    fn set_average_count(&mut self, count: u32) -> Result<(), MeterError> {
        self.average_count = count;
        Ok(())
    }
    fn describe(&self) -> String {
        "manual".to_owned()
    }
}
/// Synthetic meter for running the UI without hardware: a slowly drifting beam
/// with detector noise, scaled by a crude responsivity curve around 780 nm.
pub struct SimulatedSource {
    phase: f64,
    base_watts: f64,
    wavelength_nm: f64,
    average_count: u32,
}
impl SimulatedSource {
    pub const WAVELENGTH_LIMITS: (f64, f64) = (400.0, 1100.0);
    pub fn new(base_watts: f64) -> Self {
        Self {
            phase: 0.0,
            base_watts,
            wavelength_nm: 780.0,
            average_count: 1,
        }
    }
}
impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new(450e-6)
    }
}
impl PowerSource for SimulatedSource {
    fn read(&mut self) -> Result<f64, MeterError> {
        self.phase += 0.02;
        let responsivity = 1.0 - ((self.wavelength_nm - 780.0) / 1000.0).powi(2);
        let drift = 1.0 + 0.2 * self.phase.sin();
        // averaging narrows the noise like the real sensor does
        let noise_scale = 0.05 / (self.average_count as f64).sqrt();
        let noise = rand::thread_rng().gen_range(-noise_scale..=noise_scale);
        Ok(self.base_watts * responsivity * (drift + noise))
    }
    fn set_wavelength(&mut self, wavelength_nm: f64) -> Result<f64, MeterError> {
        self.wavelength_nm = clamp_wavelength(wavelength_nm, Some(Self::WAVELENGTH_LIMITS));
        Ok(self.wavelength_nm)
    }
    fn wavelength_limits(&self) -> Option<(f64, f64)> {
        Some(Self::WAVELENGTH_LIMITS)
    }
    fn set_average_count(&mut self, count: u32) -> Result<(), MeterError> {
        self.average_count = count.max(1);
        Ok(())
    }
    fn describe(&self) -> String {
        "simulated PM100D".to_owned()
    }
}
