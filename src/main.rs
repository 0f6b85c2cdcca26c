// src/main.rs
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]
mod drivers;
mod gui;
mod instruments;
mod supervisor;
mod tracker;
mod types;
use std::path::PathBuf;
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use eframe::egui;
use crate::instruments::DeviceInfo;
use crate::supervisor::ProcessLauncher;
use crate::types::{SampleRate, SessionConfig};

#[derive(Parser, Debug)]
#[command(name = "pmplot", version, about = "Live plotting for USB optical power meters")]
struct Cli {
    /// List a simulated meter next to the real ones
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the plot window for one meter
    Plot {
        /// Device node, VISA resource, or "sim"
        #[arg(long)]
        device: String,
        #[command(flatten)]
        overrides: ConfigArgs,
    },
    /// Print the attached meters and exit
    List,
    /// Device list that opens one plot window per checked meter (default)
    Track {
        #[command(flatten)]
        overrides: ConfigArgs,
    },
}

// 命令行参数覆盖配置文件
#[derive(clap::Args, Debug, Default, Clone)]
struct ConfigArgs {
    /// JSON file with session defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Correction wavelength in nm
    #[arg(long)]
    wavelength: Option<f64>,
    /// Number of readings averaged by the meter
    #[arg(long)]
    average: Option<u32>,
    /// Sample rate in Hz
    #[arg(long, value_enum)]
    rate: Option<SampleRate>,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<SessionConfig> {
        let mut config = match &self.config {
            Some(path) => SessionConfig::load(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => SessionConfig::default(),
        };
        if let Some(nm) = self.wavelength {
            config.wavelength_nm = nm;
        }
        if let Some(n) = self.average {
            config.average_count = n;
        }
        if let Some(rate) = self.rate {
            config.sample_rate = rate;
        }
        Ok(config.validate()?)
    }

    /// Arguments forwarded to child plot sessions.
    fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(path) = &self.config {
            args.push("--config".to_owned());
            args.push(path.display().to_string());
        }
        if let Some(nm) = self.wavelength {
            args.push("--wavelength".to_owned());
            args.push(nm.to_string());
        }
        if let Some(n) = self.average {
            args.push("--average".to_owned());
            args.push(n.to_string());
        }
        if let Some(value) = self.rate.and_then(|rate| rate.to_possible_value()) {
            args.push("--rate".to_owned());
            args.push(value.get_name().to_owned());
        }
        args
    }
}

fn run_plot(device: String, overrides: &ConfigArgs) -> Result<()> {
    let config = overrides.resolve()?;
    let info = DeviceInfo::from_resource(device);
    let source = instruments::connect(&info)?;
    log::info!("plotting {}", source.describe());
    let app = gui::PowerMeterApp::new(info, source, config);
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1000.0, 640.0])
        .with_min_inner_size([640.0, 420.0])
        .with_title(app.title());
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native("pmplot", options, Box::new(|_cc| Box::new(app)))
        .map_err(|err| anyhow!("plot window failed: {err}"))
}

fn run_tracker(simulate: bool, overrides: &ConfigArgs) -> Result<()> {
    // 先校验一次，免得每个子进程都报同样的错
    overrides.resolve()?;
    let launcher = ProcessLauncher::current(overrides.to_args())?;
    let app = tracker::TrackerApp::new(launcher, simulate);
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([360.0, 280.0])
        .with_title("Power meters");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native("pmplot-tracker", options, Box::new(|_cc| Box::new(app)))
        .map_err(|err| anyhow!("tracker window failed: {err}"))
}

fn run_list(simulate: bool) -> Result<()> {
    let mut devices = instruments::discover()?;
    if simulate {
        devices.push(DeviceInfo::simulated());
    }
    if devices.is_empty() {
        println!("no power meters found");
    }
    for device in devices {
        println!("{}", device.label());
    }
    Ok(())
}

// 入口函数
fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Some(Command::Plot { device, overrides }) => run_plot(device, &overrides),
        Some(Command::List) => run_list(cli.simulate),
        Some(Command::Track { overrides }) => run_tracker(cli.simulate, &overrides),
        None => run_tracker(cli.simulate, &ConfigArgs::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plot_subcommand_parses() {
        let cli = Cli::try_parse_from([
            "pmplot", "plot", "--device", "/dev/usbtmc0", "--wavelength", "1064", "--rate", "0.1",
        ])
        .unwrap();
        let Some(Command::Plot { device, overrides }) = cli.command else {
            panic!("expected plot");
        };
        assert_eq!(device, "/dev/usbtmc0");
        let config = overrides.resolve().unwrap();
        assert_eq!(config.wavelength_nm, 1064.0);
        assert_eq!(config.sample_rate, SampleRate::Tenth);
    }

    #[test]
    fn no_subcommand_means_tracker() {
        let cli = Cli::try_parse_from(["pmplot", "--simulate"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.simulate);
    }

    #[test]
    fn forwarded_args_round_trip() {
        let overrides = ConfigArgs {
            config: None,
            wavelength: Some(633.0),
            average: Some(5),
            rate: Some(SampleRate::Max),
        };
        let mut argv = vec!["pmplot".to_owned(), "plot".to_owned(), "--device".to_owned(), "sim".to_owned()];
        argv.extend(overrides.to_args());
        let cli = Cli::try_parse_from(argv).unwrap();
        let Some(Command::Plot { overrides: parsed, .. }) = cli.command else {
            panic!("expected plot");
        };
        assert_eq!(parsed.wavelength, Some(633.0));
        assert_eq!(parsed.average, Some(5));
        assert_eq!(parsed.rate, Some(SampleRate::Max));
    }

    #[test]
    fn bad_average_rejected() {
        let overrides = ConfigArgs {
            average: Some(0),
            ..ConfigArgs::default()
        };
        assert!(overrides.resolve().is_err());
    }
}
