use std::io::Cursor;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::LineSeries;
use plotters::prelude::*;
use crate::drivers::error::MeterError;
use crate::drivers::window::TickOutput;
#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub trace: RGBColor,
    pub max_line: RGBColor,
    pub region: RGBColor,
}
impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 900,
            height: 600,
            background: RGBColor(238, 238, 238),
            trace: BLACK,
            max_line: RGBColor(20, 20, 200),
            region: RGBColor(200, 120, 20),
        }
    }
}
/// Renders the zoomed plot (with the max-power line) above the overview strip
/// (with the visible-range markers) into a PNG. Times are drawn relative to the
/// first reading.
pub fn render_session_png(frame: &TickOutput, style: PlotStyle) -> Result<Vec<u8>, MeterError> {
    if frame.overview.is_empty() {
        return Err(MeterError::Plot("frame has no readings".into()));
    }
    let t0 = frame.span.lower;
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let (upper, lower) = root.split_vertically((style.height * 3 / 4) as i32);
        let zoom_x = axis_bounds(frame.range.lower - t0, frame.range.upper - t0);
        let y_top = if frame.max_power > 0.0 {
            frame.max_power * 1.1
        } else {
            1e-6
        };
        let mut zoomed = ChartBuilder::on(&upper)
            .margin(10)
            .caption(
                format!("Power  {}", frame.last_power_formatted()),
                ("sans-serif", 20).into_font().color(&BLACK),
            )
            .set_label_area_size(LabelAreaPosition::Left, 70)
            .set_label_area_size(LabelAreaPosition::Bottom, 30)
            .build_cartesian_2d(zoom_x.0..zoom_x.1, 0f64..y_top)?;
        zoomed
            .configure_mesh()
            .y_desc("Power (W)")
            .y_label_formatter(&|v| format!("{v:.1e}"))
            .light_line_style(&BLACK.mix(0.05))
            .draw()?;
        zoomed.draw_series(LineSeries::new(
            frame.zoomed.iter().map(|p| (p[0] - t0, p[1])),
            &style.trace,
        ))?;
        zoomed.draw_series(LineSeries::new(
            [(zoom_x.0, frame.max_power), (zoom_x.1, frame.max_power)],
            &style.max_line.mix(0.4),
        ))?;
        let full_x = axis_bounds(0.0, frame.span.upper - t0);
        let mut overview = ChartBuilder::on(&lower)
            .margin(10)
            .set_label_area_size(LabelAreaPosition::Left, 70)
            .set_label_area_size(LabelAreaPosition::Bottom, 30)
            .build_cartesian_2d(full_x.0..full_x.1, 0f64..y_top)?;
        overview
            .configure_mesh()
            .disable_y_mesh()
            .y_labels(0)
            .x_desc("Time (s)")
            .draw()?;
        overview.draw_series(LineSeries::new(
            frame.overview.iter().map(|p| (p[0] - t0, p[1])),
            &style.trace,
        ))?;
        for edge in [frame.range.lower - t0, frame.range.upper - t0] {
            overview.draw_series(LineSeries::new(
                [(edge, 0.0), (edge, y_top)],
                &style.region,
            ))?;
        }
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}
fn axis_bounds(lo: f64, hi: f64) -> (f64, f64) {
    if (hi - lo).abs() < f64::EPSILON {
        (lo - 0.5, hi + 0.5)
    } else {
        (lo, hi)
    }
}
fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, MeterError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| MeterError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::buffer::{Sample, SampleBuffer};
    use crate::drivers::window::WindowEngine;
    #[test]
    fn renders_png_for_live_frame() {
        let mut buffer = SampleBuffer::new();
        for i in 0..50 {
            buffer.append(Sample::new(1.7e9 + i as f64 * 0.1, (i % 7) as f64 * 1e-5));
        }
        let frame = WindowEngine::default().tick(&buffer, 1.7e9 + 4.9).unwrap();
        let png = render_session_png(&frame, PlotStyle::default()).unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }
    #[test]
    fn single_reading_still_renders() {
        let mut buffer = SampleBuffer::new();
        buffer.append(Sample::new(10.0, 0.0));
        let frame = WindowEngine::default().render(&buffer).unwrap();
        let png = render_session_png(&frame, PlotStyle::default()).unwrap();
        assert!(!png.is_empty());
    }
}
