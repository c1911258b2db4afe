//! Process-level error type for the `soc` binary.
//!
//! Exit code conventions:
//!
//! - 2: usage or input error (bad flags, malformed CSV schema, invalid filter
//!   parameters, model/grid mismatch)
//! - 3: insufficient or degenerate data (no valid rows, zero-variance target,
//!   fewer samples than folds)
//! - 4: internal error (a numerical step produced no usable result)

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
