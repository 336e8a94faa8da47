/// Result alias that carries the custom [`VisualiserError`] type.
pub type Result<T> = std::result::Result<T, VisualiserError>;

/// Common error type for the core crate.
///
/// Errors only leave the engine through host-facing setup calls. Anything that
/// goes wrong inside a tick is logged and degraded instead.
#[derive(Debug, thiserror::Error)]
pub enum VisualiserError {
    /// Free-form message for failures without a dedicated variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
    /// The FFT backend rejected the buffers it was given.
    #[error("fft failure: {0}")]
    Fft(#[from] realfft::FftError),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("unknown geometry variant `{0}`")]
    UnknownVariant(String),
    /// The host output surface cannot be used by the selected backend.
    #[error("output surface unavailable: {0}")]
    SurfaceUnavailable(String),
    /// A lifecycle operation was requested from a state that does not allow it.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
}

impl VisualiserError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for VisualiserError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for VisualiserError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
