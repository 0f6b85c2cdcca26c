use std::ops::Range;
use crate::drivers::buffer::SampleBuffer;
use crate::drivers::format::format_power;
/// Upper bound on the number of points handed to each plot per tick.
pub const DEFAULT_POINT_BUDGET: usize = 1000;
/// Time interval shown in the zoomed plot, in seconds since the epoch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisibleRange {
    pub lower: f64,
    pub upper: f64,
}
impl VisibleRange {
    /// Builds a range, swapping the bounds if they arrive inverted.
    pub fn new(a: f64, b: f64) -> Self {
        if a <= b {
            Self { lower: a, upper: b }
        } else {
            Self { lower: b, upper: a }
        }
    }
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
    fn clamped_to(self, span: VisibleRange) -> Self {
        let lower = self.lower.clamp(span.lower, span.upper);
        let upper = self.upper.clamp(span.lower, span.upper);
        Self::new(lower, upper)
    }
}
/// Everything the render sink needs for one frame.
#[derive(Clone, Debug)]
pub struct TickOutput {
    /// Downsampled `[time, power]` points inside the visible range.
    pub zoomed: Vec<[f64; 2]>,
    /// Downsampled `[time, power]` points over the whole history.
    pub overview: Vec<[f64; 2]>,
    pub max_power: f64,
    pub last_power: f64,
    pub num_visible: usize,
    pub total: usize,
    pub range: VisibleRange,
    /// First and last stored timestamp.
    pub span: VisibleRange,
}
impl TickOutput {
    pub fn last_power_formatted(&self) -> String {
        format_power(self.last_power)
    }
}
/// Stride that keeps `n` points within `budget` after subsampling.
pub fn stride_for(n: usize, budget: usize) -> usize {
    n / budget.max(1) + 1
}
/// Every `stride`-th sample of `indices`, starting at `indices.start`.
pub fn downsample(buffer: &SampleBuffer, indices: Range<usize>, stride: usize) -> Vec<[f64; 2]> {
    let times = buffer.times();
    let powers = buffer.powers();
    let end = indices.end.min(times.len());
    let start = indices.start.min(end);
    (start..end)
        .step_by(stride.max(1))
        .map(|idx| [times[idx], powers[idx]])
        .collect()
}
/// Tracks the visible range and derives both plot series from a [`SampleBuffer`].
///
/// Once per tick the range is re-evaluated against the buffer as it stood before
/// the new reading was appended:
/// - lower bound before the first sample (or no range yet): pin to the first
///   sample and stretch to `now`;
/// - upper bound at or past the last sample: stretch to `now`;
/// - otherwise the user narrowed the range away from the live edge; leave it.
///
/// A range written through [`WindowEngine::set_range`] goes through the same
/// rules on the next tick, so a selection ending at the newest sample keeps
/// following new readings.
#[derive(Clone, Debug)]
pub struct WindowEngine {
    range: Option<VisibleRange>,
    point_budget: usize,
}
impl Default for WindowEngine {
    fn default() -> Self {
        Self::with_point_budget(DEFAULT_POINT_BUDGET)
    }
}
impl WindowEngine {
    pub fn with_point_budget(point_budget: usize) -> Self {
        Self {
            range: None,
            point_budget: point_budget.max(1),
        }
    }
    #[cfg(test)]
    pub fn range(&self) -> Option<VisibleRange> {
        self.range
    }
    pub fn apply_auto_extend(&mut self, buffer: &SampleBuffer, now: f64) {
        let (Ok(first), Ok(last)) = (buffer.first(), buffer.last()) else {
            return;
        };
        self.range = match self.range {
            Some(range) if range.lower >= first.timestamp => {
                if range.upper >= last.timestamp {
                    Some(VisibleRange {
                        lower: range.lower,
                        upper: now,
                    })
                } else {
                    Some(range)
                }
            }
            _ => Some(VisibleRange {
                lower: first.timestamp,
                upper: now,
            }),
        };
    }
    pub fn render(&mut self, buffer: &SampleBuffer) -> Option<TickOutput> {
        let first = buffer.first().ok()?;
        let last = buffer.last().ok()?;
        let max_power = buffer.max_power().ok()?;
        let span = VisibleRange::new(first.timestamp, last.timestamp);
        let range = *self.range.get_or_insert(span);
        let visible = buffer.slice_by_time_range(range.lower, range.upper);
        let num_visible = visible.len();
        let zoomed_stride = stride_for(num_visible, self.point_budget);
        let overview_stride = stride_for(buffer.len(), self.point_budget);
        Some(TickOutput {
            zoomed: downsample(buffer, visible, zoomed_stride),
            overview: downsample(buffer, 0..buffer.len(), overview_stride),
            max_power,
            last_power: last.power,
            num_visible,
            total: buffer.len(),
            range,
            span,
        })
    }
    #[cfg(test)]
    pub fn tick(&mut self, buffer: &SampleBuffer, now: f64) -> Option<TickOutput> {
        self.apply_auto_extend(buffer, now);
        self.render(buffer)
    }
    /// Manual override from the region selector, clamped to the stored time span.
    pub fn set_range(&mut self, buffer: &SampleBuffer, range: VisibleRange) {
        let range = match (buffer.first(), buffer.last()) {
            (Ok(first), Ok(last)) => {
                range.clamped_to(VisibleRange::new(first.timestamp, last.timestamp))
            }
            _ => range,
        };
        self.range = Some(range);
    }
    /// Selects the whole history; auto-extension then follows the live edge again.
    pub fn reset_range(&mut self, buffer: &SampleBuffer) {
        if let (Ok(first), Ok(last)) = (buffer.first(), buffer.last()) {
            self.set_range(buffer, VisibleRange::new(first.timestamp, last.timestamp));
        }
    }
    /// Forgets the range so the next non-empty tick starts from the first sample.
    pub fn clear(&mut self) {
        self.range = None;
    }
}
