//! Post-call device error checks.

use crate::device::AudioDevice;
use crate::error::{PetalSonicError, Result};

/// Fails if the device has an error pending.
///
/// Call this right after the device call named by `operation`, before any other device
/// call, so the error is attributed to the right operation. Nothing is allocated unless
/// an error is pending.
pub fn check_device_error(device: &dyn AudioDevice, operation: &'static str) -> Result<()> {
    let Some(code) = device.get_error() else {
        return Ok(());
    };

    let message = device.error_string(code);
    log::debug!("Device error {:?} while {}", code, operation);
    Err(PetalSonicError::DeviceOperation { operation, message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{SoftDevice, SourceId};

    #[test]
    fn passes_when_nothing_is_pending() {
        let device = SoftDevice::headless();
        assert!(check_device_error(&device, "doing nothing").is_ok());
    }

    #[test]
    fn reports_device_text_with_operation() {
        let device = SoftDevice::headless();
        let handle = device.open_device(None).unwrap();
        let context = device
            .create_context(handle, &Default::default())
            .unwrap();
        device.make_context_current(Some(context));

        device.source_play(SourceId(4242));
        let err = check_device_error(&device, "starting playback").unwrap_err();
        assert_eq!(err.to_string(), "\"Invalid Name\" while starting playback");
    }

    #[test]
    fn hints_at_missing_initialization_without_device_text() {
        let device = SoftDevice::headless();
        device.gen_buffer();
        let err = check_device_error(&device, "generating buffer").unwrap_err();
        match err {
            PetalSonicError::DeviceOperation { operation, message } => {
                assert_eq!(operation, "generating buffer");
                assert_eq!(message, None);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn consumes_the_pending_error() {
        let device = SoftDevice::headless();
        device.gen_source();
        assert!(check_device_error(&device, "creating source").is_err());
        assert!(check_device_error(&device, "creating source").is_ok());
    }
}
