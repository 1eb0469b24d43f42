use thiserror::Error;

/// Error types for visualizer construction and per-frame work
#[derive(Error, Debug)]
pub enum VizError {
    #[error("invalid grid: rings={rings}, sectors={sectors} (both must be >= 1)")]
    InvalidGrid { rings: usize, sectors: usize },
    #[error("invalid grid radius: {0} (must be > 0)")]
    InvalidRadius(f32),
    #[error("invalid sample rate: {0} Hz (Nyquist must sit above 20 Hz)")]
    InvalidSampleRate(u32),
    #[error("invalid FFT size: {0} (expected a power of two in 32..=2048)")]
    InvalidFftSize(usize),
    #[error("audio source error: {0}")]
    Audio(String),
    #[error("render error: {0}")]
    Render(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
