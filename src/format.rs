//! Buffer format negotiation.

use crate::device::{
    AudioDevice, BufferFormat, FORMAT_51CHN8, FORMAT_51CHN16, FORMAT_QUAD8, FORMAT_QUAD16,
    MULTICHANNEL_EXTENSION,
};
use crate::error::{PetalSonicError, Result};
use crate::source::SampleInfo;

/// Picks the device buffer format for a sample source and returns it with the source's rate.
///
/// Bit depth is checked first, then channel count. Quad and 5.1 layouts need the
/// multichannel extension, except 16-bit quad which is looked up unconditionally and
/// then looked up again when the extension is present; the later lookup wins.
pub fn negotiate_format(
    device: &dyn AudioDevice,
    info: &SampleInfo,
) -> Result<(BufferFormat, u32)> {
    let channels = info.channels;
    let mut format = None;

    if info.bits_per_sample == 8 {
        if channels == 1 {
            format = Some(BufferFormat::Mono8);
        }
        if channels == 2 {
            format = Some(BufferFormat::Stereo8);
        }
        if device.is_extension_present(MULTICHANNEL_EXTENSION) {
            if channels == 4 {
                format = device.format_by_name(FORMAT_QUAD8);
            }
            if channels == 6 {
                format = device.format_by_name(FORMAT_51CHN8);
            }
        }
    }

    if info.bits_per_sample == 16 {
        if channels == 1 {
            format = Some(BufferFormat::Mono16);
        }
        if channels == 2 {
            format = Some(BufferFormat::Stereo16);
        }
        if channels == 4 {
            format = device.format_by_name(FORMAT_QUAD16);
        }
        if device.is_extension_present(MULTICHANNEL_EXTENSION) {
            if channels == 4 {
                format = device.format_by_name(FORMAT_QUAD16);
            }
            if channels == 6 {
                format = device.format_by_name(FORMAT_51CHN16);
            }
        }
    }

    match format {
        Some(format) => {
            log::debug!(
                "Negotiated {:?} at {} Hz for {} channels, {} bits",
                format,
                info.sample_rate,
                channels,
                info.bits_per_sample
            );
            Ok((format, info.sample_rate))
        }
        None => Err(PetalSonicError::UnsupportedFormat {
            channels,
            bits_per_sample: info.bits_per_sample,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{OutputMode, SoftDevice, SoftDeviceDesc};

    fn device(multichannel: bool) -> SoftDevice {
        SoftDevice::new(SoftDeviceDesc {
            multichannel,
            output: OutputMode::Headless,
        })
    }

    fn info(channels: u16, bits_per_sample: u16) -> SampleInfo {
        SampleInfo {
            sample_rate: 22050,
            channels,
            bits_per_sample,
        }
    }

    #[test]
    fn resolves_mono_and_stereo() {
        let device = device(false);
        let cases = [
            ((1, 8), BufferFormat::Mono8),
            ((2, 8), BufferFormat::Stereo8),
            ((1, 16), BufferFormat::Mono16),
            ((2, 16), BufferFormat::Stereo16),
        ];
        for ((channels, bits), expected) in cases {
            let (format, rate) = negotiate_format(&device, &info(channels, bits)).unwrap();
            assert_eq!(format, expected);
            assert_eq!(rate, 22050);
        }
    }

    #[test]
    fn rejects_unsupported_layouts() {
        let device = device(false);
        for (channels, bits) in [(3, 8), (5, 16), (4, 8), (6, 16), (1, 24), (2, 32)] {
            let err = negotiate_format(&device, &info(channels, bits)).unwrap_err();
            assert!(matches!(
                err,
                PetalSonicError::UnsupportedFormat { channels: c, bits_per_sample: b }
                    if c == channels && b == bits
            ));
        }
    }

    #[test]
    fn quad16_resolves_with_or_without_extension() {
        let plain = negotiate_format(&device(false), &info(4, 16)).unwrap();
        let extended = negotiate_format(&device(true), &info(4, 16)).unwrap();
        assert_eq!(plain.0, BufferFormat::Quad16);
        assert_eq!(extended.0, BufferFormat::Quad16);
    }

    #[test]
    fn extension_unlocks_multichannel_layouts() {
        let device = device(true);
        let cases = [
            ((4, 8), BufferFormat::Quad8),
            ((6, 8), BufferFormat::Surround51_8),
            ((6, 16), BufferFormat::Surround51_16),
        ];
        for ((channels, bits), expected) in cases {
            assert_eq!(negotiate_format(&device, &info(channels, bits)).unwrap().0, expected);
        }
        assert!(negotiate_format(&device, &info(3, 8)).is_err());
        assert!(negotiate_format(&device, &info(5, 16)).is_err());
    }
}
