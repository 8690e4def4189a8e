//! Configuration for PetalSonic AL

use crate::device::ContextAttributes;

/// Configuration descriptor for a [`PetalSonicFactory`](crate::PetalSonicFactory).
///
/// Only consulted when the factory performs device setup.
#[derive(Debug, Clone)]
pub struct PetalSonicFactoryDesc {
    /// Output device to open (None opens the default device)
    pub device_name: Option<String>,
    /// Mixing rate requested for the rendering context
    pub sample_rate: u32,
    /// Number of output channels (typically 2 for stereo)
    pub channels: u16,
    /// Frames rendered per device callback
    pub block_size: usize,
}

impl Default for PetalSonicFactoryDesc {
    fn default() -> Self {
        Self {
            device_name: None,
            sample_rate: 48000,
            channels: 2,
            block_size: 1024,
        }
    }
}

impl PetalSonicFactoryDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    /// Context attributes forwarded to the device on context creation.
    pub fn context_attributes(&self) -> ContextAttributes {
        ContextAttributes {
            frequency: self.sample_rate,
            channels: self.channels,
            block_size: self.block_size,
        }
    }
}
