//! Playback instances.
//!
//! A [`PetalSonicSound`] pairs one device source (exclusively owned) with one device
//! buffer (shared). Cloning a sound with [`PetalSonicSound::try_clone`] creates a new
//! source on the same buffer, so many overlapping voices can play one decoded sample
//! without uploading it twice.
//!
//! The buffer is held in an [`Rc`]; its strong count is the number of sounds using it.
//! When the last sound is dropped the buffer is deleted from the device. Sources are
//! always deleted before the buffer they are bound to.

use crate::device::{AudioDevice, BufferId, SourceId, SourceParam, SourceState};
use crate::error::{PetalSonicError, Result};
use crate::factory::PetalSonicFactory;
use crate::format::negotiate_format;
use crate::gate::check_device_error;
use crate::math::Vec3;
use crate::source::{BufferedSource, SampleSource};
use std::rc::Rc;

/// Device buffer shared by a sound and its clones.
struct SharedBuffer {
    device: Rc<dyn AudioDevice>,
    id: BufferId,
}

impl Drop for SharedBuffer {
    fn drop(&mut self) {
        self.device.delete_buffer(self.id);
        match check_device_error(self.device.as_ref(), "deleting buffer") {
            Ok(()) => log::debug!("Released {}", self.id),
            Err(e) => log::error!("Failed to release {}: {}", self.id, e),
        }
    }
}

/// One controllable voice playing a shared buffer.
///
/// Dropping a sound stops it. Errors during that teardown are logged, not raised.
pub struct PetalSonicSound {
    buffer: Rc<SharedBuffer>,
    source: SourceId,
}

impl PetalSonicSound {
    /// Uploads `input` into a new device buffer and creates a source for it.
    pub fn new(factory: &PetalSonicFactory, input: &mut dyn SampleSource) -> Result<Self> {
        let device = factory.device().clone();
        let (format, rate) = negotiate_format(device.as_ref(), &input.info())?;

        let id = device.gen_buffer();
        check_device_error(device.as_ref(), "generating buffer")?;
        let id = id.ok_or(PetalSonicError::DeviceOperation {
            operation: "generating buffer",
            message: None,
        })?;
        // Owned from here on, so an upload failure still releases the buffer.
        let buffer = Rc::new(SharedBuffer { device, id });

        let direct = if input.has_ptr() {
            input.as_bytes()
        } else {
            None
        };
        match direct {
            Some(bytes) => buffer.device.buffer_data(id, format, bytes, rate),
            None => {
                let buffered = BufferedSource::new(input)?;
                buffer
                    .device
                    .buffer_data(id, format, buffered.as_bytes(), rate);
            }
        }
        check_device_error(buffer.device.as_ref(), "loading sound buffer")?;
        log::debug!("Uploaded {} as {:?} at {} Hz", id, format, rate);

        Self::with_buffer(buffer, "creating source", "assigning buffer")
    }

    /// Creates a second, independent voice on this sound's buffer.
    ///
    /// No sample data is read or uploaded.
    pub fn try_clone(&self) -> Result<Self> {
        let sound = Self::with_buffer(
            self.buffer.clone(),
            "creating instance (clone)",
            "assigning buffer (clone)",
        )?;
        log::debug!(
            "Cloned {} into {}, {} owners",
            self.source,
            sound.source,
            sound.ref_count()
        );
        Ok(sound)
    }

    fn with_buffer(
        buffer: Rc<SharedBuffer>,
        creating: &'static str,
        assigning: &'static str,
    ) -> Result<Self> {
        let device = buffer.device.as_ref();

        let source = device.gen_source();
        check_device_error(device, creating)?;
        let source = source.ok_or(PetalSonicError::DeviceOperation {
            operation: creating,
            message: None,
        })?;

        // From here `Drop` deletes the source if binding fails.
        let sound = Self { buffer, source };
        let device = sound.device();
        device.source_buffer(source, sound.buffer.id);
        check_device_error(device, assigning)?;
        Ok(sound)
    }

    fn device(&self) -> &dyn AudioDevice {
        self.buffer.device.as_ref()
    }

    pub fn play(&self) -> Result<()> {
        self.device().source_play(self.source);
        check_device_error(self.device(), "starting playback")
    }

    pub fn stop(&self) -> Result<()> {
        self.device().source_stop(self.source);
        check_device_error(self.device(), "stopping")
    }

    pub fn pause(&self) -> Result<()> {
        self.device().source_pause(self.source);
        check_device_error(self.device(), "pausing")
    }

    /// True only while the device reports the source as playing; paused is not playing.
    pub fn is_playing(&self) -> bool {
        self.device().source_state(self.source) == SourceState::Playing
    }

    /// Sets the gain, clamped to [0, 1].
    pub fn set_volume(&self, volume: f32) -> Result<()> {
        let volume = volume.clamp(0.0, 1.0);
        self.device().source_f(self.source, SourceParam::Gain, volume);
        check_device_error(self.device(), "setting volume")
    }

    /// Sets the reference and maximum attenuation distances.
    ///
    /// `_rolloff` is accepted for interface compatibility and ignored.
    pub fn set_range(&self, reference: f32, max: f32, _rolloff: f32) -> Result<()> {
        let device = self.device();
        device.source_f(self.source, SourceParam::ReferenceDistance, reference);
        device.source_f(self.source, SourceParam::MaxDistance, max);
        check_device_error(device, "setting sound ranges")
    }

    pub fn set_pos(&self, position: Vec3) -> Result<()> {
        self.device().source_position(self.source, position);
        check_device_error(self.device(), "setting position")
    }

    pub fn set_pitch(&self, pitch: f32) -> Result<()> {
        self.device().source_f(self.source, SourceParam::Pitch, pitch);
        check_device_error(self.device(), "setting pitch")
    }

    /// Enables or disables looping. Not error-checked.
    pub fn set_repeat(&self, repeat: bool) {
        self.device().source_looping(self.source, repeat);
    }

    /// Number of sounds sharing this sound's buffer, this one included.
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.buffer)
    }

    pub fn buffer_id(&self) -> BufferId {
        self.buffer.id
    }

    pub fn source_id(&self) -> SourceId {
        self.source
    }
}

impl Drop for PetalSonicSound {
    fn drop(&mut self) {
        let device = self.device();
        device.source_stop(self.source);
        device.delete_source(self.source);
        if let Some(code) = device.get_error() {
            log::warn!("Ignoring device error {:?} while releasing {}", code, self.source);
        }
        // The buffer goes when the last `Rc` does.
    }
}
