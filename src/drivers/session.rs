use std::time::{SystemTime, UNIX_EPOCH};
use crate::drivers::buffer::{Sample, SampleBuffer};
use crate::drivers::error::MeterError;
use crate::drivers::source::PowerSource;
use crate::drivers::window::{TickOutput, VisibleRange, WindowEngine};
/// Current wall-clock time as seconds since the Unix epoch.
pub fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Polling on every tick.
    Connected,
    /// Paused by the user; the instrument is still attached.
    Stopped,
    /// A read failed. No further reads until [`PlotSession::reconnect`].
    Disconnected,
}
/// One instrument's acquisition session: polls the source, owns the readings and
/// hands ready-to-plot frames to the UI.
pub struct PlotSession<S: PowerSource> {
    source: S,
    buffer: SampleBuffer,
    engine: WindowEngine,
    state: ConnectionState,
    latest: Option<TickOutput>,
}
impl<S: PowerSource> PlotSession<S> {
    #[cfg(test)]
    pub fn new(source: S) -> Self {
        Self::with_engine(source, WindowEngine::default())
    }
    pub fn with_engine(source: S, engine: WindowEngine) -> Self {
        Self {
            source,
            buffer: SampleBuffer::new(),
            engine,
            state: ConnectionState::Connected,
            latest: None,
        }
    }
    pub fn state(&self) -> ConnectionState {
        self.state
    }
    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }
    #[cfg(test)]
    pub fn source(&self) -> &S {
        &self.source
    }
    /// Frame produced by the most recent successful tick.
    pub fn latest(&self) -> Option<&TickOutput> {
        self.latest.as_ref()
    }
    /// Runs one poll: re-evaluate the visible range, read, append, render.
    ///
    /// Returns `Ok(None)` when not connected. A failed read moves the session to
    /// [`ConnectionState::Disconnected`] and is returned once; later ticks are
    /// silent no-ops.
    pub fn tick(&mut self, now: f64) -> Result<Option<TickOutput>, MeterError> {
        if self.state != ConnectionState::Connected {
            return Ok(None);
        }
        self.engine.apply_auto_extend(&self.buffer, now);
        let power = match self.source.read() {
            Ok(power) => power,
            Err(err) => {
                log::warn!("{}: {err}; polling halted", self.source.describe());
                self.state = ConnectionState::Disconnected;
                return Err(err);
            }
        };
        self.buffer.append(Sample::new(now, power));
        self.latest = self.engine.render(&self.buffer);
        Ok(self.latest.clone())
    }
    /// Re-renders without polling, e.g. after the range was dragged while stopped.
    pub fn refresh(&mut self) -> Option<&TickOutput> {
        self.latest = self.engine.render(&self.buffer);
        self.latest.as_ref()
    }
    pub fn stop(&mut self) {
        if self.state == ConnectionState::Connected {
            self.state = ConnectionState::Stopped;
        }
    }
    /// Resumes polling after [`PlotSession::stop`]. Has no effect once disconnected.
    pub fn start(&mut self) {
        if self.state == ConnectionState::Stopped {
            self.state = ConnectionState::Connected;
        }
    }
    /// Swaps in a freshly opened instrument and resumes polling. Readings are kept.
    pub fn reconnect(&mut self, source: S) {
        log::info!("reconnected to {}", source.describe());
        self.source = source;
        self.state = ConnectionState::Connected;
    }
    /// Drops every reading and the visible range.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.engine.clear();
        self.latest = None;
    }
    pub fn set_range(&mut self, range: VisibleRange) {
        self.engine.set_range(&self.buffer, range);
    }
    pub fn reset_range(&mut self) {
        self.engine.reset_range(&self.buffer);
    }
    pub fn set_wavelength(&mut self, wavelength_nm: f64) -> Result<f64, MeterError> {
        let applied = self.source.set_wavelength(wavelength_nm)?;
        log::info!("wavelength set to {applied} nm");
        Ok(applied)
    }
    pub fn wavelength_limits(&self) -> Option<(f64, f64)> {
        self.source.wavelength_limits()
    }
    pub fn set_average_count(&mut self, count: u32) -> Result<(), MeterError> {
        self.source.set_average_count(count)?;
        log::info!("averaging over {count} samples");
        Ok(())
    }
}
