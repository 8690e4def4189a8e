//! OpenAL-style device interface.
//!
//! [`AudioDevice`] is the one device API the rest of the crate talks to. It mirrors the
//! shape of OpenAL: integer handles for devices, contexts, buffers and sources, plain
//! setter calls that never fail directly, and a sticky error slot that callers query
//! after each call with [`AudioDevice::get_error`].
//!
//! [`SoftDevice`] is the bundled implementation. It mixes in-process and hands the
//! result to a cpal output stream, or runs headless for tests and offline rendering.

mod mixer;
mod output;
mod soft;

pub use soft::{
    DeviceStats, HEADLESS_DEVICE_NAME, OutputMode, SoftDevice, SoftDeviceDesc, VoiceSnapshot,
};

use crate::math::Vec3;

/// Extension that unlocks the quad and 5.1 buffer formats.
pub const MULTICHANNEL_EXTENSION: &str = "AL_EXT_MCFORMATS";

pub const FORMAT_QUAD8: &str = "AL_FORMAT_QUAD8";
pub const FORMAT_QUAD16: &str = "AL_FORMAT_QUAD16";
pub const FORMAT_51CHN8: &str = "AL_FORMAT_51CHN8";
pub const FORMAT_51CHN16: &str = "AL_FORMAT_51CHN16";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub(crate) u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContextHandle(pub(crate) u32);

/// Handle of a device-resident audio buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(pub(crate) u32);

/// Handle of a playback source (one voice).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceId(pub(crate) u32);

impl std::fmt::Display for BufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BufferId({})", self.0)
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SourceId({})", self.0)
    }
}

/// Device-native sample layout of a buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BufferFormat {
    Mono8,
    Stereo8,
    Mono16,
    Stereo16,
    Quad8,
    Quad16,
    Surround51_8,
    Surround51_16,
}

impl BufferFormat {
    pub fn channels(self) -> u16 {
        match self {
            Self::Mono8 | Self::Mono16 => 1,
            Self::Stereo8 | Self::Stereo16 => 2,
            Self::Quad8 | Self::Quad16 => 4,
            Self::Surround51_8 | Self::Surround51_16 => 6,
        }
    }

    pub fn bits_per_sample(self) -> u16 {
        match self {
            Self::Mono8 | Self::Stereo8 | Self::Quad8 | Self::Surround51_8 => 8,
            _ => 16,
        }
    }

    /// Size in bytes of one frame (one sample per channel).
    pub fn frame_size(self) -> usize {
        self.channels() as usize * (self.bits_per_sample() as usize / 8)
    }
}

/// Transport state of a source as reported by the device.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SourceState {
    Initial,
    Playing,
    Paused,
    Stopped,
}

/// Scalar source parameters.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SourceParam {
    Gain,
    Pitch,
    ReferenceDistance,
    MaxDistance,
}

/// Error codes held in the device's pending-error slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidName,
    InvalidEnum,
    InvalidValue,
    InvalidOperation,
    OutOfMemory,
    /// A call was made with no current context. Carries no device text.
    NoContext,
}

/// Attributes requested when creating a rendering context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextAttributes {
    pub frequency: u32,
    pub channels: u16,
    pub block_size: usize,
}

impl Default for ContextAttributes {
    fn default() -> Self {
        Self {
            frequency: 48000,
            channels: 2,
            block_size: 1024,
        }
    }
}

/// The device API.
///
/// Setter calls do not return errors. A failing call records an [`ErrorCode`] that stays
/// pending until the next [`get_error`](Self::get_error); only the first error raised since
/// the last query is kept.
pub trait AudioDevice {
    fn open_device(&self, name: Option<&str>) -> Option<DeviceHandle>;
    fn close_device(&self, device: DeviceHandle) -> bool;
    fn create_context(
        &self,
        device: DeviceHandle,
        attributes: &ContextAttributes,
    ) -> Option<ContextHandle>;
    fn make_context_current(&self, context: Option<ContextHandle>) -> bool;
    fn destroy_context(&self, context: ContextHandle);

    fn is_extension_present(&self, name: &str) -> bool;
    /// Looks up a buffer format by its enum name, e.g. [`FORMAT_QUAD16`].
    fn format_by_name(&self, name: &str) -> Option<BufferFormat>;

    /// Returns and clears the pending error.
    fn get_error(&self) -> Option<ErrorCode>;
    /// Human-readable text for an error code, if the device has any.
    fn error_string(&self, code: ErrorCode) -> Option<String>;

    fn gen_buffer(&self) -> Option<BufferId>;
    fn buffer_data(&self, buffer: BufferId, format: BufferFormat, data: &[u8], frequency: u32);
    fn delete_buffer(&self, buffer: BufferId);

    fn gen_source(&self) -> Option<SourceId>;
    fn delete_source(&self, source: SourceId);
    fn source_buffer(&self, source: SourceId, buffer: BufferId);
    fn source_play(&self, source: SourceId);
    fn source_stop(&self, source: SourceId);
    fn source_pause(&self, source: SourceId);
    fn source_state(&self, source: SourceId) -> SourceState;
    fn source_f(&self, source: SourceId, param: SourceParam, value: f32);
    fn source_position(&self, source: SourceId, position: Vec3);
    fn source_looping(&self, source: SourceId, looping: bool);

    fn listener_position(&self, position: Vec3);
    fn listener_orientation(&self, forward: Vec3, up: Vec3);
}
