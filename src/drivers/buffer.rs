use std::ops::Range;
use crate::drivers::MeterError;
/// One power reading. `timestamp` is seconds since the Unix epoch, `power` is watts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub timestamp: f64,
    pub power: f64,
}
impl Sample {
    pub fn new(timestamp: f64, power: f64) -> Self {
        Self { timestamp, power }
    }
}
/// Append-only store of every reading taken in a session.
///
/// Times and powers live in parallel vectors so the plots can slice either one
/// without copying. Timestamps must arrive non-decreasing; the buffer trusts the
/// caller's clock and does not check.
#[derive(Clone, Debug, Default)]
pub struct SampleBuffer {
    times: Vec<f64>,
    powers: Vec<f64>,
    max_power: Option<f64>,
}
impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn append(&mut self, sample: Sample) {
        self.times.push(sample.timestamp);
        self.powers.push(sample.power);
        self.max_power = Some(match self.max_power {
            Some(max) => max.max(sample.power),
            None => sample.power,
        });
    }
    pub fn clear(&mut self) {
        self.times.clear();
        self.powers.clear();
        self.max_power = None;
    }
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
    pub fn len(&self) -> usize {
        self.times.len()
    }
    pub fn first(&self) -> Result<Sample, MeterError> {
        self.get(0).ok_or(MeterError::EmptyBuffer)
    }
    pub fn last(&self) -> Result<Sample, MeterError> {
        self.len()
            .checked_sub(1)
            .and_then(|idx| self.get(idx))
            .ok_or(MeterError::EmptyBuffer)
    }
    pub fn max_power(&self) -> Result<f64, MeterError> {
        self.max_power.ok_or(MeterError::EmptyBuffer)
    }
    pub fn get(&self, idx: usize) -> Option<Sample> {
        Some(Sample::new(*self.times.get(idx)?, *self.powers.get(idx)?))
    }
    pub fn times(&self) -> &[f64] {
        &self.times
    }
    pub fn powers(&self) -> &[f64] {
        &self.powers
    }
    pub fn iter(&self) -> impl Iterator<Item = Sample> + '_ {
        self.times
            .iter()
            .zip(&self.powers)
            .map(|(&t, &p)| Sample::new(t, p))
    }
    /// Index interval `[i, j)` of the samples with `lower <= time <= upper`.
    ///
    /// A single stored sample is always kept on the right (`j == 1`). When the
    /// whole buffer lies outside the bounds the result is empty, never inverted.
    pub fn slice_by_time_range(&self, lower: f64, upper: f64) -> Range<usize> {
        let start = self.times.partition_point(|&t| t < lower);
        let end = if self.times.len() > 1 {
            self.times.partition_point(|&t| t <= upper)
        } else {
            self.times.len()
        };
        start..end.max(start)
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    fn filled(times: &[f64]) -> SampleBuffer {
        let mut buffer = SampleBuffer::new();
        for (i, &t) in times.iter().enumerate() {
            buffer.append(Sample::new(t, i as f64));
        }
        buffer
    }
    #[test]
    fn count_tracks_appends_and_clears() {
        let mut buffer = filled(&[0.0, 1.0, 2.0]);
        assert_eq!(buffer.len(), 3);
        buffer.clear();
        assert_eq!(buffer.len(), 0);
        assert!(buffer.is_empty());
        buffer.append(Sample::new(5.0, 1.0));
        buffer.append(Sample::new(6.0, 2.0));
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.times().len(), buffer.powers().len());
    }
    #[test]
    fn accessors_fail_on_empty_buffer() {
        let buffer = SampleBuffer::new();
        assert!(matches!(buffer.first(), Err(MeterError::EmptyBuffer)));
        assert!(matches!(buffer.last(), Err(MeterError::EmptyBuffer)));
        assert!(matches!(buffer.max_power(), Err(MeterError::EmptyBuffer)));
    }
    #[test]
    fn first_last_and_running_max() {
        let mut buffer = SampleBuffer::new();
        buffer.append(Sample::new(1.0, 3e-6));
        buffer.append(Sample::new(2.0, 9e-6));
        buffer.append(Sample::new(3.0, 4e-6));
        assert_eq!(buffer.first().unwrap(), Sample::new(1.0, 3e-6));
        assert_eq!(buffer.last().unwrap(), Sample::new(3.0, 4e-6));
        assert_eq!(buffer.max_power().unwrap(), 9e-6);
        buffer.clear();
        buffer.append(Sample::new(4.0, 1e-6));
        assert_eq!(buffer.max_power().unwrap(), 1e-6);
    }
    #[test]
    fn slice_keeps_samples_inside_bounds() {
        let buffer = filled(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let range = buffer.slice_by_time_range(1.5, 4.0);
        assert_eq!(range, 2..5);
        for t in &buffer.times()[range] {
            assert!(*t >= 1.5 && *t <= 4.0);
        }
        assert_eq!(buffer.slice_by_time_range(-10.0, 10.0), 0..6);
    }
    #[test]
    fn slice_of_single_sample_skips_trailing_bound() {
        let buffer = filled(&[10.0]);
        assert_eq!(buffer.slice_by_time_range(10.0, 5.0), 0..1);
        assert_eq!(buffer.slice_by_time_range(0.0, 10.0).len(), 1);
    }
    #[test]
    fn slice_outside_data_is_empty() {
        let buffer = filled(&[5.0, 6.0, 7.0]);
        assert!(buffer.slice_by_time_range(8.0, 9.0).is_empty());
        assert!(buffer.slice_by_time_range(1.0, 2.0).is_empty());
        let inverted = buffer.slice_by_time_range(6.5, 5.5);
        assert!(inverted.is_empty());
        assert!(inverted.start <= buffer.len());
    }
    #[test]
    fn slice_with_repeated_timestamps() {
        let buffer = filled(&[1.0, 2.0, 2.0, 2.0, 3.0]);
        assert_eq!(buffer.slice_by_time_range(2.0, 2.0), 1..4);
    }
}
