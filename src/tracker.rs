// src/tracker.rs
// 设备列表窗口：勾选即打开对应的绘图进程
use std::time::{Duration, Instant};
use eframe::egui;
use egui::{Color32, RichText};
use crate::instruments::{self, DeviceInfo};
use crate::supervisor::{DeviceTracker, Launcher};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct TrackerApp<L: Launcher> {
    tracker: DeviceTracker<L>,
    simulate: bool,
    last_poll: Option<Instant>,
    discovery_error: Option<String>,
}

impl<L: Launcher> TrackerApp<L> {
    pub fn new(launcher: L, simulate: bool) -> Self {
        Self {
            tracker: DeviceTracker::new(launcher),
            simulate,
            last_poll: None,
            discovery_error: None,
        }
    }

    fn discovered(&mut self) -> Vec<DeviceInfo> {
        let mut devices = match instruments::discover() {
            Ok(devices) => {
                self.discovery_error = None;
                devices
            }
            Err(err) => {
                // 每 100 ms 一次，别刷屏
                if self.discovery_error.is_none() {
                    log::warn!("device discovery failed: {err:#}");
                }
                self.discovery_error = Some(format!("{err:#}"));
                Vec::new()
            }
        };
        if self.simulate {
            devices.push(DeviceInfo::simulated());
        }
        devices
    }

    /// Kills every plot session, then closes the tracker itself.
    fn shutdown(&mut self, ctx: &egui::Context) {
        self.tracker.set_auto(false);
        self.tracker.shutdown();
        log::info!("shutting down");
        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
    }

    fn poll(&mut self) {
        let now = Instant::now();
        if self
            .last_poll
            .is_some_and(|last| now.duration_since(last) < POLL_INTERVAL)
        {
            return;
        }
        self.last_poll = Some(now);
        let devices = self.discovered();
        self.tracker.refresh(&devices);
    }
}

impl<L: Launcher> eframe::App for TrackerApp<L> {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll();
        ctx.request_repaint_after(POLL_INTERVAL);

        egui::TopBottomPanel::bottom("tracker_buttons").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let auto = self.tracker.auto();
                let label = if auto { "Auto" } else { "Manual" };
                if ui
                    .selectable_label(auto, label)
                    .on_hover_text("Auto opens every meter and reopens closed windows")
                    .clicked()
                {
                    self.tracker.set_auto(!auto);
                }
                if ui.button("Shutdown").clicked() {
                    self.shutdown(ctx);
                }
            });
        });
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Power meters");
            ui.separator();
            if let Some(err) = &self.discovery_error {
                ui.label(RichText::new(err).color(Color32::RED).small());
            }
            if self.tracker.entries().is_empty() {
                ui.label(RichText::new("No devices found").color(Color32::GRAY));
            }
            let mut toggled = Vec::new();
            for entry in self.tracker.entries() {
                let mut checked = entry.checked;
                let text = if entry.is_running() {
                    RichText::new(entry.info.label()).strong()
                } else {
                    RichText::new(entry.info.label())
                };
                let checkbox = ui.checkbox(&mut checked, text);
                let checkbox = match &entry.info.manufacturer {
                    Some(vendor) => checkbox.on_hover_text(vendor),
                    None => checkbox,
                };
                if checkbox.changed() {
                    toggled.push((entry.info.resource.clone(), checked));
                }
            }
            for (resource, checked) in toggled {
                self.tracker.set_checked(&resource, checked);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::SessionHandle;
    use std::cell::Cell;
    use std::rc::Rc;

    struct FakeSession(Rc<Cell<bool>>);

    impl SessionHandle for FakeSession {
        fn is_alive(&mut self) -> bool {
            self.0.get()
        }

        fn kill(&mut self) {
            self.0.set(false);
        }
    }

    struct FakeLauncher;

    impl Launcher for FakeLauncher {
        type Handle = FakeSession;

        fn launch(&mut self, _device: &DeviceInfo) -> anyhow::Result<FakeSession> {
            Ok(FakeSession(Rc::new(Cell::new(true))))
        }
    }

    #[test]
    fn shutdown_kills_sessions_and_closes_window() {
        let mut app = TrackerApp::new(FakeLauncher, false);
        let found = [DeviceInfo::simulated()];
        app.tracker.set_auto(true);
        for _ in 0..2 {
            app.tracker.refresh(&found);
        }
        assert!(app.tracker.entries()[0].is_running());

        let ctx = egui::Context::default();
        let output = ctx.run(egui::RawInput::default(), |ctx| app.shutdown(ctx));
        let commands = &output.viewport_output[&egui::ViewportId::ROOT].commands;
        assert!(commands.contains(&egui::ViewportCommand::Close));
        assert!(!app.tracker.auto());
        assert!(app.tracker.entries().iter().all(|e| !e.is_running()));
        assert!(!app.tracker.entries()[0].checked);
    }
}
