// src/drivers/mod.rs
// 采集核心：缓冲、视窗、降采样、会话状态机
pub mod buffer;
pub mod error;
pub mod export;
pub mod format;
pub mod plot;
pub mod rate;
pub mod session;
pub mod source;
pub mod window;
// 公开导出，方便外部调用
pub use error::MeterError;
pub use export::{default_export_name, save_csv};
pub use format::format_count;
pub use plot::{render_session_png, PlotStyle};
pub use rate::RateCounter;
pub use session::{epoch_seconds, ConnectionState, PlotSession};
pub use source::{clamp_wavelength, PowerSource, SimulatedSource};
#[cfg(test)]
pub use source::ManualSource;
pub use window::{TickOutput, VisibleRange, WindowEngine, DEFAULT_POINT_BUDGET};
