//! Error types for PetalSonic AL

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PetalSonicError {
    /// Device or context could not be created at factory construction.
    #[error("Audio setup error: {0}")]
    Setup(String),

    /// The output backend behind a device failed.
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    /// A gate-checked device call left an error pending.
    #[error("{}", describe_device_failure(.operation, .message.as_deref()))]
    DeviceOperation {
        operation: &'static str,
        message: Option<String>,
    },

    #[error("Unsupported input format: {channels} channels, {bits_per_sample} bits per sample")]
    UnsupportedFormat { channels: u16, bits_per_sample: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_device_failure(operation: &str, message: Option<&str>) -> String {
    match message {
        Some(message) => format!("\"{}\" while {}", message, operation),
        None => format!(
            "non-specified error while {} (did you forget to initialize the audio device?)",
            operation
        ),
    }
}

impl PetalSonicError {
    /// Name of the device operation that failed, if this is a device failure.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::DeviceOperation { operation, .. } => Some(*operation),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PetalSonicError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_failure_quotes_device_message() {
        let err = PetalSonicError::DeviceOperation {
            operation: "starting playback",
            message: Some("Invalid Name".into()),
        };
        assert_eq!(err.to_string(), "\"Invalid Name\" while starting playback");
        assert_eq!(err.operation(), Some("starting playback"));
    }

    #[test]
    fn device_failure_without_message_hints_at_initialization() {
        let err = PetalSonicError::DeviceOperation {
            operation: "generating buffer",
            message: None,
        };
        let text = err.to_string();
        assert!(text.starts_with("non-specified error while generating buffer"));
        assert!(text.contains("did you forget to initialize"));
    }
}
