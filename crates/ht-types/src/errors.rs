use thiserror::Error;

/// Main error type for the HydroTune system
#[derive(Error, Debug)]
pub enum HtError {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Calibration error: {0}")]
    Calibration(#[from] CalibrationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Errors raised by the external model process
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model command `{cmd}` exited with status {status}")]
    NonZeroExit { cmd: String, status: i32 },

    #[error("model command `{cmd}` was terminated by a signal")]
    Terminated { cmd: String },

    #[error("failed to spawn model command `{cmd}`: {source}")]
    SpawnFailed {
        cmd: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config write for iteration {iteration} failed: {message}")]
    ConfigWrite { iteration: u32, message: String },
}

/// Errors raised by calibration state management
#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("iteration {0} is not present in the calibration table")]
    UnknownIteration(u32),

    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("value vector length {actual} does not match parameter count {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("value {value} for parameter {name} is outside [{min}, {max}]")]
    OutOfBounds {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("checkpoint error: {message}")]
    Checkpoint { message: String },

    #[error("no model output available for evaluation")]
    MissingOutput,
}

/// Result type alias for HydroTune operations
pub type HtResult<T> = Result<T, HtError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::HtError::Validation(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::HtError::Config(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::HtError::Internal(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ModelError::NonZeroExit {
            cmd: "./run_model.sh".to_string(),
            status: 2,
        };

        assert!(error.to_string().contains("run_model.sh"));
        assert!(error.to_string().contains("status 2"));
    }

    #[test]
    fn test_error_conversion() {
        let model_error = ModelError::Terminated {
            cmd: "./model".to_string(),
        };
        let ht_error: HtError = model_error.into();

        match ht_error {
            HtError::Model(_) => (),
            _ => panic!("Expected Model error"),
        }
    }

    #[test]
    fn test_macros() {
        let _validation_err = validation_error!("init {} outside [{}, {}]", 2.0, 0.0, 1.0);
        let _config_err = config_error!("iterations must be >= 2, got {}", 1);
        let _internal_err = internal_error!("unreachable state");
    }
}
