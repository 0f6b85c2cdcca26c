use thiserror::Error;
#[derive(Debug, Error)]
pub enum MeterError {
    #[error("sample buffer is empty; append at least one reading first")]
    EmptyBuffer,
    #[error("instrument read failed: {0}")]
    ReadFailure(String),
    #[error("operation not supported by this instrument: {0}")]
    Unsupported(&'static str),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to render plot: {0}")]
    Plot(String),
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for MeterError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        MeterError::Plot(format!("{value:?}"))
    }
}
impl From<image::ImageError> for MeterError {
    fn from(value: image::ImageError) -> Self {
        MeterError::Plot(value.to_string())
    }
}
impl From<serde_json::Error> for MeterError {
    fn from(value: serde_json::Error) -> Self {
        MeterError::Config(value.to_string())
    }
}
