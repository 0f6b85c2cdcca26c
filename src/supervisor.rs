// src/supervisor.rs
// 多设备管理：每台功率计一个独立的绘图进程
use std::path::PathBuf;
use std::process::{Child, Command};
use anyhow::{Context, Result};
use crate::instruments::DeviceInfo;

/// A running plot session for one device.
pub trait SessionHandle {
    fn is_alive(&mut self) -> bool;
    fn kill(&mut self);
}

/// Starts plot sessions.
pub trait Launcher {
    type Handle: SessionHandle;
    fn launch(&mut self, device: &DeviceInfo) -> Result<Self::Handle>;
}

/// Re-executes this binary as `pmplot plot --device <resource>`.
pub struct ProcessLauncher {
    exe: PathBuf,
    extra_args: Vec<String>,
}

impl ProcessLauncher {
    pub fn current(extra_args: Vec<String>) -> Result<Self> {
        let exe = std::env::current_exe().context("cannot locate own executable")?;
        Ok(Self { exe, extra_args })
    }
}

impl Launcher for ProcessLauncher {
    type Handle = ChildSession;

    fn launch(&mut self, device: &DeviceInfo) -> Result<ChildSession> {
        let child = Command::new(&self.exe)
            .arg("plot")
            .arg("--device")
            .arg(&device.resource)
            .args(&self.extra_args)
            .spawn()
            .with_context(|| format!("failed to start plot session for {}", device.resource))?;
        log::info!("started session pid {} for {}", child.id(), device.resource);
        Ok(ChildSession(child))
    }
}

pub struct ChildSession(Child);

impl SessionHandle for ChildSession {
    fn is_alive(&mut self) -> bool {
        matches!(self.0.try_wait(), Ok(None))
    }

    fn kill(&mut self) {
        if let Err(err) = self.0.kill() {
            log::debug!("kill pid {}: {err}", self.0.id());
        }
        let _ = self.0.wait();
    }
}

pub struct DeviceEntry<H> {
    pub info: DeviceInfo,
    /// User wants a plot window for this device.
    pub checked: bool,
    session: Option<H>,
}

impl<H> DeviceEntry<H> {
    fn new(info: DeviceInfo) -> Self {
        Self {
            info,
            checked: false,
            session: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }
}

/// Keeps the device list and the running sessions in step with what is plugged in.
pub struct DeviceTracker<L: Launcher> {
    launcher: L,
    entries: Vec<DeviceEntry<L::Handle>>,
    auto: bool,
}

impl<L: Launcher> DeviceTracker<L> {
    pub fn new(launcher: L) -> Self {
        Self {
            launcher,
            entries: Vec::new(),
            auto: false,
        }
    }

    pub fn entries(&self) -> &[DeviceEntry<L::Handle>] {
        &self.entries
    }

    pub fn auto(&self) -> bool {
        self.auto
    }

    /// Auto mode opens every device and relaunches sessions whose window was closed.
    pub fn set_auto(&mut self, auto: bool) {
        self.auto = auto;
    }

    pub fn set_checked(&mut self, resource: &str, checked: bool) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.info.resource == resource) {
            entry.checked = checked;
        }
    }

    /// One reconciliation pass against the currently discovered devices.
    pub fn refresh(&mut self, discovered: &[DeviceInfo]) {
        let Self {
            launcher,
            entries,
            auto,
        } = self;
        for device in discovered {
            let Some(entry) = entries
                .iter_mut()
                .find(|e| e.info.resource == device.resource)
            else {
                log::info!("found {}", device.label());
                entries.push(DeviceEntry::new(device.clone()));
                continue;
            };
            if entry.checked {
                let needs_launch = match entry.session.as_mut() {
                    None => true,
                    Some(session) => {
                        if session.is_alive() {
                            false
                        } else if *auto {
                            log::info!("{} exited, relaunching", entry.info.resource);
                            true
                        } else {
                            session.kill();
                            entry.session = None;
                            entry.checked = false;
                            false
                        }
                    }
                };
                if needs_launch {
                    match launcher.launch(&entry.info) {
                        Ok(session) => entry.session = Some(session),
                        Err(err) => {
                            log::error!("{err:#}");
                            entry.session = None;
                            entry.checked = false;
                        }
                    }
                }
            } else if let Some(mut session) = entry.session.take() {
                session.kill();
            } else if *auto {
                entry.checked = true;
            }
        }
        // unplugged devices go away, but a session that is still running keeps its row
        entries.retain_mut(|entry| {
            discovered.iter().any(|d| d.resource == entry.info.resource)
                || entry.session.as_mut().is_some_and(|s| s.is_alive())
        });
    }

    /// Kills every running session.
    pub fn shutdown(&mut self) {
        for entry in &mut self.entries {
            if let Some(mut session) = entry.session.take() {
                session.kill();
            }
            entry.checked = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Clone)]
    struct FakeSession {
        alive: Rc<Cell<bool>>,
    }

    impl SessionHandle for FakeSession {
        fn is_alive(&mut self) -> bool {
            self.alive.get()
        }

        fn kill(&mut self) {
            self.alive.set(false);
        }
    }

    #[derive(Default)]
    struct FakeLauncher {
        launched: Rc<RefCell<Vec<(String, Rc<Cell<bool>>)>>>,
    }

    impl Launcher for FakeLauncher {
        type Handle = FakeSession;

        fn launch(&mut self, device: &DeviceInfo) -> Result<FakeSession> {
            let alive = Rc::new(Cell::new(true));
            self.launched
                .borrow_mut()
                .push((device.resource.clone(), alive.clone()));
            Ok(FakeSession { alive })
        }
    }

    fn devices(names: &[&str]) -> Vec<DeviceInfo> {
        names.iter().map(|n| DeviceInfo::from_resource(*n)).collect()
    }

    fn tracker() -> (DeviceTracker<FakeLauncher>, Rc<RefCell<Vec<(String, Rc<Cell<bool>>)>>>) {
        let launcher = FakeLauncher::default();
        let launched = launcher.launched.clone();
        (DeviceTracker::new(launcher), launched)
    }

    #[test]
    fn new_devices_listed_unchecked() {
        let (mut t, launched) = tracker();
        t.refresh(&devices(&["/dev/usbtmc0", "/dev/usbtmc1"]));
        assert_eq!(t.entries().len(), 2);
        assert!(t.entries().iter().all(|e| !e.checked && !e.is_running()));
        assert!(launched.borrow().is_empty());
    }

    #[test]
    fn checking_launches_and_unchecking_kills() {
        let (mut t, launched) = tracker();
        let found = devices(&["/dev/usbtmc0"]);
        t.refresh(&found);
        t.set_checked("/dev/usbtmc0", true);
        t.refresh(&found);
        assert!(t.entries()[0].is_running());
        assert_eq!(launched.borrow().len(), 1);
        t.refresh(&found);
        assert_eq!(launched.borrow().len(), 1);
        t.set_checked("/dev/usbtmc0", false);
        t.refresh(&found);
        assert!(!t.entries()[0].is_running());
        assert!(!launched.borrow()[0].1.get());
    }

    #[test]
    fn closed_window_unchecks_in_manual_mode() {
        let (mut t, launched) = tracker();
        let found = devices(&["/dev/usbtmc0"]);
        t.refresh(&found);
        t.set_checked("/dev/usbtmc0", true);
        t.refresh(&found);
        launched.borrow()[0].1.set(false);
        t.refresh(&found);
        assert!(!t.entries()[0].checked);
        assert!(!t.entries()[0].is_running());
        assert_eq!(launched.borrow().len(), 1);
    }

    #[test]
    fn auto_mode_starts_and_relaunches() {
        let (mut t, launched) = tracker();
        t.set_auto(true);
        let found = devices(&["/dev/usbtmc0"]);
        t.refresh(&found);
        t.refresh(&found);
        assert!(t.entries()[0].checked);
        t.refresh(&found);
        assert_eq!(launched.borrow().len(), 1);
        launched.borrow()[0].1.set(false);
        t.refresh(&found);
        assert_eq!(launched.borrow().len(), 2);
        assert!(t.entries()[0].is_running());
    }

    #[test]
    fn unplugged_devices_dropped_unless_running() {
        let (mut t, _launched) = tracker();
        t.refresh(&devices(&["/dev/usbtmc0", "/dev/usbtmc1"]));
        t.set_checked("/dev/usbtmc1", true);
        t.refresh(&devices(&["/dev/usbtmc0", "/dev/usbtmc1"]));
        t.refresh(&[]);
        let left: Vec<_> = t.entries().iter().map(|e| e.info.resource.as_str()).collect();
        assert_eq!(left, ["/dev/usbtmc1"]);
    }

    #[test]
    fn shutdown_kills_everything() {
        let (mut t, launched) = tracker();
        t.set_auto(true);
        let found = devices(&["a", "b"]);
        for _ in 0..3 {
            t.refresh(&found);
        }
        assert_eq!(launched.borrow().len(), 2);
        t.shutdown();
        assert!(launched.borrow().iter().all(|(_, alive)| !alive.get()));
        assert!(t.entries().iter().all(|e| !e.is_running()));
    }
}
