// src/gui.rs
use std::path::PathBuf;
use std::time::{Duration, Instant};
use eframe::egui;
use egui::{Color32, RichText};
use egui_plot::{HLine, Line, Plot, PlotBounds, PlotPoints, VLine};
use crate::drivers::{
    default_export_name, epoch_seconds, format_count, render_session_png, save_csv,
    ConnectionState, MeterError, PlotSession, PlotStyle, PowerSource, RateCounter, TickOutput,
    VisibleRange, WindowEngine,
};
use crate::instruments::{self, DeviceInfo};
use crate::types::*;

// 区域选择器的拖动方式
#[derive(Clone, Copy, Debug, PartialEq)]
enum RegionDrag {
    Lower,
    Upper,
    Move { grab_offset: f64, width: f64 },
    Select { anchor: f64 },
}

impl RegionDrag {
    /// Picks the drag mode from where the pointer went down (absolute time).
    fn begin(x: f64, range: VisibleRange, edge_tolerance: f64) -> Self {
        if (x - range.lower).abs() <= edge_tolerance {
            RegionDrag::Lower
        } else if (x - range.upper).abs() <= edge_tolerance {
            RegionDrag::Upper
        } else if x > range.lower && x < range.upper {
            RegionDrag::Move {
                grab_offset: x - range.lower,
                width: range.width(),
            }
        } else {
            RegionDrag::Select { anchor: x }
        }
    }

    fn apply(self, x: f64, range: VisibleRange) -> VisibleRange {
        match self {
            RegionDrag::Lower => VisibleRange::new(x, range.upper),
            RegionDrag::Upper => VisibleRange::new(range.lower, x),
            RegionDrag::Move { grab_offset, width } => {
                VisibleRange::new(x - grab_offset, x - grab_offset + width)
            }
            RegionDrag::Select { anchor } => VisibleRange::new(anchor, x),
        }
    }
}

/// Y bounds for a series, padded so a flat line is still visible.
fn y_bounds(points: &[[f64; 2]], include: f64) -> (f64, f64) {
    let (mut lo, mut hi) = (include, include);
    for p in points {
        lo = lo.min(p[1]);
        hi = hi.max(p[1]);
    }
    let pad = ((hi - lo) * 0.05).max(hi.abs() * 0.05).max(1e-12);
    (lo - pad, hi + pad)
}

/// Wall-clock label for an epoch timestamp, as shown on the time axes.
fn clock_label<Tz: chrono::TimeZone>(epoch: f64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let secs = epoch.floor();
    let nanos = ((epoch - secs) * 1e9) as u32;
    match chrono::DateTime::from_timestamp(secs as i64, nanos) {
        Some(utc) => utc.with_timezone(tz).format("%H:%M:%S").to_string(),
        None => format!("{epoch:.0}"),
    }
}

fn relative(points: &[[f64; 2]], t0: f64) -> Vec<[f64; 2]> {
    points.iter().map(|p| [p[0] - t0, p[1]]).collect()
}

pub struct PowerMeterApp {
    device: DeviceInfo,
    session: PlotSession<Box<dyn PowerSource>>,
    config: SessionConfig,
    wavelength_limits: (f64, f64),
    last_tick: Option<Instant>,
    rate: RateCounter,
    drag: Option<RegionDrag>,
    status: Option<String>,
}

impl PowerMeterApp {
    pub fn new(device: DeviceInfo, source: Box<dyn PowerSource>, config: SessionConfig) -> Self {
        let engine = WindowEngine::with_point_budget(config.point_budget);
        let mut app = Self {
            device,
            session: PlotSession::with_engine(source, engine),
            config,
            wavelength_limits: (400.0, 1100.0),
            last_tick: None,
            rate: RateCounter::default(),
            drag: None,
            status: None,
        };
        app.apply_config();
        app
    }

    pub fn title(&self) -> String {
        format!("PowerMeter ({})", self.device.resource)
    }

    // 把配置下发给仪器（波长、平均次数）
    fn apply_config(&mut self) {
        match self.session.set_wavelength(self.config.wavelength_nm) {
            Ok(applied) => self.config.wavelength_nm = applied,
            Err(err) => self.report(err),
        }
        if let Some(limits) = self.session.wavelength_limits() {
            self.wavelength_limits = limits;
        }
        if let Err(err) = self.session.set_average_count(self.config.average_count) {
            self.report(err);
        }
    }

    fn report(&mut self, err: MeterError) {
        log::warn!("{}: {err}", self.device.resource);
        self.status = Some(err.to_string());
    }

    fn tick_if_due(&mut self, ctx: &egui::Context) {
        if self.session.state() != ConnectionState::Connected {
            return;
        }
        let period = self.config.sample_rate.period();
        let now = Instant::now();
        let due = self
            .last_tick
            .map_or(true, |last| now.duration_since(last) >= period);
        if due {
            self.last_tick = Some(now);
            match self.session.tick(epoch_seconds()) {
                Ok(_) => {
                    self.rate.record(now);
                }
                Err(err) => self.report(err),
            }
        }
        if period.is_zero() {
            ctx.request_repaint();
        } else {
            let waited = self.last_tick.map_or(Duration::ZERO, |last| now.duration_since(last));
            ctx.request_repaint_after(period.saturating_sub(waited));
        }
    }

    fn reconnect(&mut self) {
        match instruments::connect(&self.device) {
            Ok(source) => {
                self.session.reconnect(source);
                self.status = None;
                self.apply_config();
            }
            Err(err) => {
                log::warn!("reconnect failed: {err:#}");
                self.status = Some(format!("{err:#}"));
            }
        }
    }

    fn save(&mut self) {
        let picked = rfd::FileDialog::new()
            .set_file_name(default_export_name(epoch_seconds()))
            .add_filter("Text Files", &["csv", "txt"])
            .save_file();
        if let Some(path) = picked {
            if let Err(err) = save_csv(self.session.buffer(), &path) {
                self.report(err);
            }
        }
    }

    fn snapshot(&mut self, frame: &TickOutput) {
        let path = PathBuf::from(format!("PM100D_{}.png", epoch_seconds()));
        let written = render_session_png(frame, PlotStyle::default())
            .and_then(|png| std::fs::write(&path, png).map_err(MeterError::from));
        match written {
            Ok(()) => log::info!("snapshot written to {}", path.display()),
            Err(err) => self.report(err),
        }
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        let latest = self.session.latest().map(|f| f.last_power_formatted());
        ui.horizontal(|ui| {
            egui::Grid::new("controls").num_columns(2).show(ui, |ui| {
                ui.label("Wavelength:");
                let (min, max) = self.wavelength_limits;
                let wavelength = ui.add(
                    egui::DragValue::new(&mut self.config.wavelength_nm)
                        .clamp_range(min..=max)
                        .fixed_decimals(0)
                        .suffix(" nm"),
                );
                if wavelength.changed() {
                    match self.session.set_wavelength(self.config.wavelength_nm) {
                        Ok(applied) => self.config.wavelength_nm = applied,
                        Err(err) => self.report(err),
                    }
                }
                ui.end_row();

                ui.label("Sample rate:");
                egui::ComboBox::from_id_source("sample_rate")
                    .selected_text(self.config.sample_rate.label())
                    .show_ui(ui, |ui| {
                        for rate in SampleRate::choices() {
                            ui.selectable_value(&mut self.config.sample_rate, *rate, rate.label());
                        }
                    });
                ui.end_row();

                ui.label("Averaging:");
                let average = ui.add(
                    egui::DragValue::new(&mut self.config.average_count)
                        .clamp_range(AVERAGE_COUNT_RANGE),
                );
                if average.changed() {
                    if let Err(err) = self.session.set_average_count(self.config.average_count) {
                        self.report(err);
                    }
                }
                ui.end_row();

                let state = self.session.state();
                let button = match state {
                    ConnectionState::Connected => egui::Button::new(
                        RichText::new("STOP").color(Color32::RED).strong(),
                    ),
                    ConnectionState::Stopped => egui::Button::new(
                        RichText::new("STOPPED").color(Color32::WHITE).strong(),
                    )
                    .fill(Color32::RED),
                    ConnectionState::Disconnected => egui::Button::new(
                        RichText::new("Disconnected").color(Color32::WHITE).strong(),
                    )
                    .fill(Color32::RED),
                };
                if ui.add(button).clicked() {
                    match state {
                        ConnectionState::Connected => self.session.stop(),
                        ConnectionState::Stopped => {
                            self.session.start();
                            self.last_tick = None;
                        }
                        ConnectionState::Disconnected => self.reconnect(),
                    }
                }
                if ui.button("Reset").clicked() {
                    self.session.reset();
                }
                ui.end_row();
            });
            ui.add_space(40.0);
            ui.label(
                RichText::new(latest.unwrap_or_else(|| "W".to_owned()))
                    .monospace()
                    .strong()
                    .size(60.0),
            );
        });
        if let Some(status) = &self.status {
            ui.label(RichText::new(status).color(Color32::RED).small());
        }
    }

    fn plots(&mut self, ui: &mut egui::Ui, frame: &TickOutput) {
        let t0 = frame.span.lower;
        let range = frame.range;
        let overview_height = (ui.available_height() / 5.0).max(60.0);
        let main_height = (ui.available_height() - overview_height - 10.0).max(100.0);

        // 放大视图：只显示所选时间段
        let (y_lo, y_hi) = y_bounds(&frame.zoomed, frame.max_power);
        let (x_lo, x_hi) = (range.lower - t0, range.upper - t0);
        Plot::new("zoomed")
            .height(main_height)
            .allow_drag(false)
            .allow_zoom(false)
            .allow_scroll(false)
            .allow_boxed_zoom(false)
            .allow_double_click_reset(false)
            .y_axis_label("Power (W)")
            .x_axis_formatter(move |x, _max_chars, _range| clock_label(x + t0, &chrono::Local))
            .show(ui, |plot_ui| {
                let x_hi = if x_hi > x_lo { x_hi } else { x_lo + 1.0 };
                plot_ui.set_plot_bounds(PlotBounds::from_min_max([x_lo, y_lo], [x_hi, y_hi]));
                plot_ui.line(
                    Line::new(PlotPoints::new(relative(&frame.zoomed, t0)))
                        .color(Color32::BLACK)
                        .width(2.0),
                );
                plot_ui.hline(
                    HLine::new(frame.max_power)
                        .color(Color32::from_rgba_unmultiplied(20, 20, 200, 50))
                        .width(2.0),
                );
            });

        // 总览：整段历史 + 可拖动的选择区域
        let (o_lo, o_hi) = y_bounds(&frame.overview, frame.max_power);
        let span_width = frame.span.width().max(1.0);
        let overview = Plot::new("overview")
            .height(overview_height)
            .allow_drag(false)
            .allow_zoom(false)
            .allow_scroll(false)
            .allow_boxed_zoom(false)
            .allow_double_click_reset(false)
            .x_axis_label("Time")
            .x_axis_formatter(move |x, _max_chars, _range| clock_label(x + t0, &chrono::Local))
            .show(ui, |plot_ui| {
                plot_ui.set_plot_bounds(PlotBounds::from_min_max(
                    [0.0, o_lo],
                    [span_width, o_hi],
                ));
                plot_ui.line(
                    Line::new(PlotPoints::new(relative(&frame.overview, t0)))
                        .color(Color32::BLACK)
                        .width(1.0),
                );
                let edge = Color32::from_rgb(200, 120, 20);
                plot_ui.vline(VLine::new(range.lower - t0).color(edge).width(2.0));
                plot_ui.vline(VLine::new(range.upper - t0).color(edge).width(2.0));
                plot_ui.pointer_coordinate()
            });

        let response = overview.response;
        let pointer = overview.inner.map(|p| p.x + t0);
        if response.double_clicked() {
            self.drag = None;
            self.session.reset_range();
            self.session.refresh();
        } else if response.drag_started() {
            self.drag = pointer.map(|x| RegionDrag::begin(x, range, span_width * 0.02));
        } else if response.dragged() {
            if let (Some(drag), Some(x)) = (self.drag, pointer) {
                self.session.set_range(drag.apply(x, range));
                self.session.refresh();
            }
        } else {
            self.drag = None;
        }
    }

    fn status_bar(&mut self, ui: &mut egui::Ui, frame: Option<&TickOutput>) {
        ui.horizontal(|ui| {
            let fps = self
                .rate
                .rate_hz()
                .map_or("0 Hz".to_owned(), |hz| format!("{hz:.1} Hz"));
            ui.label(RichText::new(fps).color(Color32::GRAY));
            ui.separator();
            let has_readings = !self.session.buffer().is_empty();
            if ui
                .add_enabled(
                    has_readings,
                    egui::Button::new(RichText::new("Save").color(Color32::GRAY).strong()).frame(false),
                )
                .clicked()
            {
                self.save();
            }
            if let Some(frame) = frame {
                if ui
                    .add(egui::Button::new(RichText::new("Snapshot").color(Color32::GRAY)).frame(false))
                    .clicked()
                {
                    self.snapshot(frame);
                }
            }
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let (visible, total) = frame.map_or((0, 0), |f| (f.num_visible, f.total));
                ui.label(
                    RichText::new(format!("# readings: {}", format_count(visible)))
                        .color(Color32::GRAY),
                )
                .on_hover_text(format!("{} stored", format_count(total)));
            });
        });
    }
}

impl eframe::App for PowerMeterApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.tick_if_due(ctx);
        ctx.set_visuals(egui::Visuals::light());

        let latest = self.session.latest().cloned();
        egui::TopBottomPanel::top("controls_panel").show(ctx, |ui| {
            ui.add_space(6.0);
            self.controls(ui);
            ui.add_space(6.0);
        });
        egui::TopBottomPanel::bottom("status_panel").show(ctx, |ui| {
            self.status_bar(ui, latest.as_ref());
        });
        egui::CentralPanel::default().show(ctx, |ui| match &latest {
            Some(frame) => self.plots(ui, frame),
            None => {
                ui.centered_and_justified(|ui| {
                    ui.label(RichText::new("Waiting for readings…").color(Color32::GRAY));
                });
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::ManualSource;

    #[test]
    fn drag_mode_from_grab_point() {
        let range = VisibleRange::new(10.0, 20.0);
        assert_eq!(RegionDrag::begin(10.1, range, 0.5), RegionDrag::Lower);
        assert_eq!(RegionDrag::begin(19.8, range, 0.5), RegionDrag::Upper);
        assert_eq!(
            RegionDrag::begin(15.0, range, 0.5),
            RegionDrag::Move {
                grab_offset: 5.0,
                width: 10.0
            }
        );
        assert_eq!(RegionDrag::begin(30.0, range, 0.5), RegionDrag::Select { anchor: 30.0 });
    }

    #[test]
    fn drag_updates_range() {
        let range = VisibleRange::new(10.0, 20.0);
        assert_eq!(RegionDrag::Lower.apply(12.0, range), VisibleRange::new(12.0, 20.0));
        assert_eq!(RegionDrag::Upper.apply(25.0, range), VisibleRange::new(10.0, 25.0));
        assert_eq!(RegionDrag::Lower.apply(22.0, range), VisibleRange::new(20.0, 22.0));
        let moved = RegionDrag::begin(15.0, range, 0.5).apply(17.0, range);
        assert_eq!(moved, VisibleRange::new(12.0, 22.0));
        let selected = RegionDrag::Select { anchor: 30.0 }.apply(25.0, range);
        assert_eq!(selected, VisibleRange::new(25.0, 30.0));
    }

    #[test]
    fn axis_labels_show_time_of_day() {
        assert_eq!(clock_label(3661.25, &chrono::Utc), "01:01:01");
        assert_eq!(clock_label(1_700_000_000.0, &chrono::Utc), "22:13:20");
    }

    #[test]
    fn y_bounds_pad_flat_series() {
        let (lo, hi) = y_bounds(&[[0.0, 1e-6], [1.0, 1e-6]], 1e-6);
        assert!(lo < 1e-6 && hi > 1e-6);
        let (lo, hi) = y_bounds(&[], 0.0);
        assert!(lo < 0.0 && hi > 0.0);
    }

    #[test]
    fn app_applies_config_to_source() {
        let source = ManualSource::new([1e-6]).with_limits(500.0, 900.0);
        let config = SessionConfig {
            wavelength_nm: 1064.0,
            ..SessionConfig::default()
        };
        let app = PowerMeterApp::new(DeviceInfo::from_resource("/dev/usbtmc3"), Box::new(source), config);
        assert_eq!(app.config.wavelength_nm, 900.0);
        assert_eq!(app.wavelength_limits, (500.0, 900.0));
        assert_eq!(app.title(), "PowerMeter (/dev/usbtmc3)");
    }
}
