//! Software implementation of the device API.
//!
//! Object tables and the pending error live in one `DeviceState` behind a mutex, shared
//! with the cpal output callback of every live context.

use super::mixer;
use super::output::OutputStream;
use super::{
    AudioDevice, BufferFormat, BufferId, ContextAttributes, ContextHandle, DeviceHandle,
    ErrorCode, FORMAT_51CHN8, FORMAT_51CHN16, FORMAT_QUAD8, FORMAT_QUAD16,
    MULTICHANNEL_EXTENSION, SourceId, SourceParam, SourceState,
};
use crate::math::{Orientation, Vec3};
use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

/// Name under which a headless [`SoftDevice`] accepts explicit open requests.
pub const HEADLESS_DEVICE_NAME: &str = "PetalSonic Headless";

/// Where a [`SoftDevice`] sends its rendered audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Open a real output device through cpal and render from its callback.
    Cpal,
    /// No hardware. The host pulls audio with [`SoftDevice::render`].
    Headless,
}

#[derive(Debug, Clone)]
pub struct SoftDeviceDesc {
    /// Advertise the multichannel extension (quad and 5.1 formats)
    pub multichannel: bool,
    pub output: OutputMode,
}

impl Default for SoftDeviceDesc {
    fn default() -> Self {
        Self {
            multichannel: true,
            output: OutputMode::Cpal,
        }
    }
}

/// Lifetime counters of device objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub devices_opened: usize,
    pub devices_closed: usize,
    pub contexts_created: usize,
    pub contexts_destroyed: usize,
    pub buffers_generated: usize,
    pub buffers_deleted: usize,
    pub sources_generated: usize,
    pub sources_deleted: usize,
}

impl DeviceStats {
    pub fn live_buffers(&self) -> usize {
        self.buffers_generated - self.buffers_deleted
    }

    pub fn live_sources(&self) -> usize {
        self.sources_generated - self.sources_deleted
    }
}

/// Copy of one source's state, for inspection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceSnapshot {
    pub buffer: Option<BufferId>,
    pub state: SourceState,
    pub gain: f32,
    pub pitch: f32,
    pub position: Vec3,
    pub reference_distance: f32,
    pub max_distance: f32,
    pub looping: bool,
}

#[derive(Debug, Default)]
pub(super) struct BufferSlot {
    pub format: Option<BufferFormat>,
    pub frequency: u32,
    pub data: Vec<u8>,
    pub bound_sources: usize,
}

#[derive(Debug, Clone)]
pub(super) struct Voice {
    pub buffer: Option<BufferId>,
    pub state: SourceState,
    pub gain: f32,
    pub pitch: f32,
    pub position: Vec3,
    pub reference_distance: f32,
    pub max_distance: f32,
    pub looping: bool,
    /// Playback position in buffer frames
    pub cursor: f64,
}

impl Default for Voice {
    fn default() -> Self {
        Self {
            buffer: None,
            state: SourceState::Initial,
            gain: 1.0,
            pitch: 1.0,
            position: Vec3::ZERO,
            reference_distance: 1.0,
            max_distance: f32::MAX,
            looping: false,
            cursor: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(super) struct Listener {
    pub position: Vec3,
    pub orientation: Orientation,
}

#[derive(Debug, Default)]
pub(super) struct DeviceState {
    next_id: u32,
    devices: HashMap<u32, usize>,
    contexts: HashMap<u32, DeviceHandle>,
    current_context: Option<ContextHandle>,
    pub buffers: HashMap<BufferId, BufferSlot>,
    pub sources: HashMap<SourceId, Voice>,
    pub listener: Listener,
    error: Option<ErrorCode>,
    stats: DeviceStats,
}

impl DeviceState {
    fn allocate_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// First error wins until it is queried.
    fn set_error(&mut self, code: ErrorCode) {
        if self.error.is_none() {
            self.error = Some(code);
        }
    }

    fn voice_mut(&mut self, source: SourceId) -> Option<&mut Voice> {
        if !self.sources.contains_key(&source) {
            self.set_error(ErrorCode::InvalidName);
        }
        self.sources.get_mut(&source)
    }
}

/// In-process implementation of [`AudioDevice`].
///
/// Buffers and sources live in a table shared with the output callback. Calls made
/// without a current context record [`ErrorCode::NoContext`].
pub struct SoftDevice {
    desc: SoftDeviceDesc,
    state: Arc<Mutex<DeviceState>>,
    hardware: RefCell<HashMap<DeviceHandle, cpal::Device>>,
    outputs: RefCell<HashMap<ContextHandle, OutputStream>>,
}

impl SoftDevice {
    pub fn new(desc: SoftDeviceDesc) -> Self {
        Self {
            desc,
            state: Arc::new(Mutex::new(DeviceState::default())),
            hardware: RefCell::new(HashMap::new()),
            outputs: RefCell::new(HashMap::new()),
        }
    }

    /// Device backed by the system's audio output.
    pub fn cpal() -> Self {
        Self::new(SoftDeviceDesc::default())
    }

    /// Device without hardware output.
    pub fn headless() -> Self {
        Self::new(SoftDeviceDesc {
            output: OutputMode::Headless,
            ..Default::default()
        })
    }

    pub fn desc(&self) -> &SoftDeviceDesc {
        &self.desc
    }

    pub fn stats(&self) -> DeviceStats {
        self.state.lock().stats
    }

    /// Bytes uploaded to a buffer, if the buffer exists.
    pub fn buffer_contents(&self, buffer: BufferId) -> Option<Vec<u8>> {
        self.state
            .lock()
            .buffers
            .get(&buffer)
            .map(|slot| slot.data.clone())
    }

    pub fn buffer_format(&self, buffer: BufferId) -> Option<(BufferFormat, u32)> {
        let state = self.state.lock();
        let slot = state.buffers.get(&buffer)?;
        slot.format.map(|format| (format, slot.frequency))
    }

    pub fn voice(&self, source: SourceId) -> Option<VoiceSnapshot> {
        self.state.lock().sources.get(&source).map(|voice| VoiceSnapshot {
            buffer: voice.buffer,
            state: voice.state,
            gain: voice.gain,
            pitch: voice.pitch,
            position: voice.position,
            reference_distance: voice.reference_distance,
            max_distance: voice.max_distance,
            looping: voice.looping,
        })
    }

    /// Frames rendered by the cpal output streams of live contexts.
    pub fn frames_rendered(&self) -> usize {
        self.outputs
            .borrow()
            .values()
            .map(|output| output.frames_rendered())
            .sum()
    }

    /// Mixes every playing source into `out` (interleaved, `channels` wide).
    ///
    /// Returns the number of frames written. With [`OutputMode::Cpal`] the output
    /// callback does this on its own thread.
    pub fn render(&self, out: &mut [f32], channels: u16, sample_rate: u32) -> usize {
        mixer::render(&mut self.state.lock(), out, channels, sample_rate)
    }

    /// Runs `f` against the state if a context is current, else records `NoContext`.
    fn with_context<R>(&self, f: impl FnOnce(&mut DeviceState) -> R) -> Option<R> {
        let mut state = self.state.lock();
        if state.current_context.is_none() {
            state.set_error(ErrorCode::NoContext);
            return None;
        }
        Some(f(&mut *state))
    }

    fn with_voice(&self, source: SourceId, f: impl FnOnce(&mut Voice) -> Option<ErrorCode>) {
        self.with_context(|state| {
            let failure = state.voice_mut(source).and_then(f);
            if let Some(code) = failure {
                state.set_error(code);
            }
        });
    }
}

impl AudioDevice for SoftDevice {
    fn open_device(&self, name: Option<&str>) -> Option<DeviceHandle> {
        let hardware = match self.desc.output {
            OutputMode::Headless => {
                if let Some(name) = name.filter(|name| *name != HEADLESS_DEVICE_NAME) {
                    log::warn!("Headless device cannot open '{}'", name);
                    return None;
                }
                None
            }
            OutputMode::Cpal => Some(OutputStream::find_device(name)?),
        };

        let mut state = self.state.lock();
        let handle = DeviceHandle(state.allocate_id());
        state.devices.insert(handle.0, 0);
        state.stats.devices_opened += 1;
        drop(state);

        if let Some(hardware) = hardware {
            self.hardware.borrow_mut().insert(handle, hardware);
        }
        Some(handle)
    }

    fn close_device(&self, device: DeviceHandle) -> bool {
        let mut state = self.state.lock();
        match state.devices.get(&device.0).copied() {
            None => {
                state.set_error(ErrorCode::InvalidName);
                return false;
            }
            Some(contexts) if contexts > 0 => {
                state.set_error(ErrorCode::InvalidOperation);
                return false;
            }
            Some(_) => {}
        }
        state.devices.remove(&device.0);
        state.stats.devices_closed += 1;
        drop(state);

        self.hardware.borrow_mut().remove(&device);
        true
    }

    fn create_context(
        &self,
        device: DeviceHandle,
        attributes: &ContextAttributes,
    ) -> Option<ContextHandle> {
        {
            let mut state = self.state.lock();
            if !state.devices.contains_key(&device.0) {
                state.set_error(ErrorCode::InvalidName);
                return None;
            }
            if attributes.frequency == 0 || attributes.channels == 0 || attributes.block_size == 0
            {
                state.set_error(ErrorCode::InvalidValue);
                return None;
            }
        }

        let output = match self.hardware.borrow().get(&device) {
            Some(hardware) => match OutputStream::start(hardware, attributes, self.state.clone())
            {
                Ok(output) => Some(output),
                Err(e) => {
                    log::error!("Failed to start output stream: {}", e);
                    return None;
                }
            },
            None => None,
        };

        let mut state = self.state.lock();
        let handle = ContextHandle(state.allocate_id());
        state.contexts.insert(handle.0, device);
        if let Some(contexts) = state.devices.get_mut(&device.0) {
            *contexts += 1;
        }
        state.stats.contexts_created += 1;
        drop(state);

        if let Some(output) = output {
            self.outputs.borrow_mut().insert(handle, output);
        }
        Some(handle)
    }

    fn make_context_current(&self, context: Option<ContextHandle>) -> bool {
        let mut state = self.state.lock();
        if let Some(context) = context {
            if !state.contexts.contains_key(&context.0) {
                state.set_error(ErrorCode::InvalidName);
                return false;
            }
        }
        state.current_context = context;
        true
    }

    fn destroy_context(&self, context: ContextHandle) {
        let mut state = self.state.lock();
        if state.current_context == Some(context) {
            state.set_error(ErrorCode::InvalidOperation);
            return;
        }
        let Some(device) = state.contexts.remove(&context.0) else {
            state.set_error(ErrorCode::InvalidName);
            return;
        };
        if let Some(contexts) = state.devices.get_mut(&device.0) {
            *contexts = contexts.saturating_sub(1);
        }
        state.stats.contexts_destroyed += 1;
        drop(state);

        // Dropping the stream stops it.
        self.outputs.borrow_mut().remove(&context);
    }

    fn is_extension_present(&self, name: &str) -> bool {
        name == MULTICHANNEL_EXTENSION && self.desc.multichannel
    }

    fn format_by_name(&self, name: &str) -> Option<BufferFormat> {
        match name {
            "AL_FORMAT_MONO8" => Some(BufferFormat::Mono8),
            "AL_FORMAT_STEREO8" => Some(BufferFormat::Stereo8),
            "AL_FORMAT_MONO16" => Some(BufferFormat::Mono16),
            "AL_FORMAT_STEREO16" => Some(BufferFormat::Stereo16),
            FORMAT_QUAD8 => Some(BufferFormat::Quad8),
            FORMAT_QUAD16 => Some(BufferFormat::Quad16),
            FORMAT_51CHN8 => Some(BufferFormat::Surround51_8),
            FORMAT_51CHN16 => Some(BufferFormat::Surround51_16),
            _ => None,
        }
    }

    fn get_error(&self) -> Option<ErrorCode> {
        self.state.lock().error.take()
    }

    fn error_string(&self, code: ErrorCode) -> Option<String> {
        let text = match code {
            ErrorCode::InvalidName => "Invalid Name",
            ErrorCode::InvalidEnum => "Invalid Enum",
            ErrorCode::InvalidValue => "Invalid Value",
            ErrorCode::InvalidOperation => "Invalid Operation",
            ErrorCode::OutOfMemory => "Out of Memory",
            ErrorCode::NoContext => return None,
        };
        Some(text.to_string())
    }

    fn gen_buffer(&self) -> Option<BufferId> {
        self.with_context(|state| {
            let id = BufferId(state.allocate_id());
            state.buffers.insert(id, BufferSlot::default());
            state.stats.buffers_generated += 1;
            id
        })
    }

    fn buffer_data(&self, buffer: BufferId, format: BufferFormat, data: &[u8], frequency: u32) {
        self.with_context(|state| {
            let failure = match state.buffers.get_mut(&buffer) {
                None => Some(ErrorCode::InvalidName),
                Some(slot) if slot.bound_sources > 0 => Some(ErrorCode::InvalidOperation),
                Some(_) if frequency == 0 || data.len() % format.frame_size() != 0 => {
                    Some(ErrorCode::InvalidValue)
                }
                Some(slot) => {
                    slot.format = Some(format);
                    slot.frequency = frequency;
                    slot.data = data.to_vec();
                    None
                }
            };
            if let Some(code) = failure {
                state.set_error(code);
            }
        });
    }

    fn delete_buffer(&self, buffer: BufferId) {
        self.with_context(|state| match state.buffers.get(&buffer) {
            None => state.set_error(ErrorCode::InvalidName),
            Some(slot) if slot.bound_sources > 0 => state.set_error(ErrorCode::InvalidOperation),
            Some(_) => {
                state.buffers.remove(&buffer);
                state.stats.buffers_deleted += 1;
            }
        });
    }

    fn gen_source(&self) -> Option<SourceId> {
        self.with_context(|state| {
            let id = SourceId(state.allocate_id());
            state.sources.insert(id, Voice::default());
            state.stats.sources_generated += 1;
            id
        })
    }

    fn delete_source(&self, source: SourceId) {
        self.with_context(|state| {
            let Some(voice) = state.sources.remove(&source) else {
                state.set_error(ErrorCode::InvalidName);
                return;
            };
            if let Some(slot) = voice.buffer.and_then(|id| state.buffers.get_mut(&id)) {
                slot.bound_sources -= 1;
            }
            state.stats.sources_deleted += 1;
        });
    }

    fn source_buffer(&self, source: SourceId, buffer: BufferId) {
        self.with_context(|state| {
            if !state.buffers.contains_key(&buffer) {
                state.set_error(ErrorCode::InvalidName);
                return;
            }
            let Some(voice) = state.voice_mut(source) else {
                return;
            };
            if matches!(voice.state, SourceState::Playing | SourceState::Paused) {
                state.set_error(ErrorCode::InvalidOperation);
                return;
            }
            let previous = voice.buffer.replace(buffer);
            voice.state = SourceState::Initial;
            voice.cursor = 0.0;

            if let Some(slot) = previous.and_then(|id| state.buffers.get_mut(&id)) {
                slot.bound_sources -= 1;
            }
            if let Some(slot) = state.buffers.get_mut(&buffer) {
                slot.bound_sources += 1;
            }
        });
    }

    fn source_play(&self, source: SourceId) {
        self.with_voice(source, |voice| {
            if voice.state != SourceState::Paused {
                voice.cursor = 0.0;
            }
            voice.state = SourceState::Playing;
            None
        });
    }

    fn source_stop(&self, source: SourceId) {
        self.with_voice(source, |voice| {
            if voice.state != SourceState::Initial {
                voice.state = SourceState::Stopped;
            }
            voice.cursor = 0.0;
            None
        });
    }

    fn source_pause(&self, source: SourceId) {
        self.with_voice(source, |voice| {
            if voice.state == SourceState::Playing {
                voice.state = SourceState::Paused;
            }
            None
        });
    }

    fn source_state(&self, source: SourceId) -> SourceState {
        self.with_context(|state| state.voice_mut(source).map(|voice| voice.state))
            .flatten()
            .unwrap_or(SourceState::Initial)
    }

    fn source_f(&self, source: SourceId, param: SourceParam, value: f32) {
        self.with_voice(source, |voice| {
            let valid = value.is_finite()
                && match param {
                    SourceParam::Pitch => value > 0.0,
                    _ => value >= 0.0,
                };
            if !valid {
                return Some(ErrorCode::InvalidValue);
            }
            match param {
                SourceParam::Gain => voice.gain = value,
                SourceParam::Pitch => voice.pitch = value,
                SourceParam::ReferenceDistance => voice.reference_distance = value,
                SourceParam::MaxDistance => voice.max_distance = value,
            }
            None
        });
    }

    fn source_position(&self, source: SourceId, position: Vec3) {
        self.with_voice(source, |voice| {
            if !position.is_finite() {
                return Some(ErrorCode::InvalidValue);
            }
            voice.position = position;
            None
        });
    }

    fn source_looping(&self, source: SourceId, looping: bool) {
        self.with_voice(source, |voice| {
            voice.looping = looping;
            None
        });
    }

    fn listener_position(&self, position: Vec3) {
        self.with_context(|state| {
            if position.is_finite() {
                state.listener.position = position;
            } else {
                state.set_error(ErrorCode::InvalidValue);
            }
        });
    }

    fn listener_orientation(&self, forward: Vec3, up: Vec3) {
        self.with_context(|state| {
            if forward.is_finite() && up.is_finite() {
                state.listener.orientation = Orientation::new(forward, up);
            } else {
                state.set_error(ErrorCode::InvalidValue);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_device() -> SoftDevice {
        let device = SoftDevice::headless();
        let handle = device.open_device(None).unwrap();
        let context = device
            .create_context(handle, &ContextAttributes::default())
            .unwrap();
        assert!(device.make_context_current(Some(context)));
        device
    }

    #[test]
    fn calls_without_context_record_no_context() {
        let device = SoftDevice::headless();
        assert_eq!(device.gen_buffer(), None);
        assert_eq!(device.get_error(), Some(ErrorCode::NoContext));
        assert_eq!(device.error_string(ErrorCode::NoContext), None);
        assert_eq!(device.get_error(), None);
    }

    #[test]
    fn first_error_sticks_until_queried() {
        let device = active_device();
        device.source_play(SourceId(999));
        device.buffer_data(BufferId(998), BufferFormat::Mono8, &[0], 8000);
        let source = device.gen_source().unwrap();
        device.source_f(source, SourceParam::Gain, -1.0);
        assert_eq!(device.get_error(), Some(ErrorCode::InvalidName));
        assert_eq!(device.get_error(), None);
    }

    #[test]
    fn headless_device_rejects_unknown_names() {
        let device = SoftDevice::headless();
        assert!(device.open_device(Some("missing")).is_none());
        assert!(device.open_device(Some(HEADLESS_DEVICE_NAME)).is_some());
    }

    #[test]
    fn bound_buffer_cannot_be_deleted() {
        let device = active_device();
        let buffer = device.gen_buffer().unwrap();
        device.buffer_data(buffer, BufferFormat::Mono16, &[0, 0, 1, 0], 22050);
        let source = device.gen_source().unwrap();
        device.source_buffer(source, buffer);
        assert_eq!(device.get_error(), None);

        device.delete_buffer(buffer);
        assert_eq!(device.get_error(), Some(ErrorCode::InvalidOperation));

        device.delete_source(source);
        device.delete_buffer(buffer);
        assert_eq!(device.get_error(), None);
        assert_eq!(device.stats().live_buffers(), 0);
        assert_eq!(device.stats().live_sources(), 0);
    }

    #[test]
    fn buffer_data_requires_whole_frames() {
        let device = active_device();
        let buffer = device.gen_buffer().unwrap();
        device.buffer_data(buffer, BufferFormat::Stereo16, &[0, 0, 0], 44100);
        assert_eq!(device.get_error(), Some(ErrorCode::InvalidValue));
    }

    #[test]
    fn pause_only_affects_playing_sources() {
        let device = active_device();
        let source = device.gen_source().unwrap();
        device.source_pause(source);
        assert_eq!(device.source_state(source), SourceState::Initial);
        device.source_play(source);
        device.source_pause(source);
        assert_eq!(device.source_state(source), SourceState::Paused);
        device.source_stop(source);
        assert_eq!(device.source_state(source), SourceState::Stopped);
    }

    #[test]
    fn closing_a_device_with_live_contexts_fails() {
        let device = SoftDevice::headless();
        let handle = device.open_device(None).unwrap();
        let context = device
            .create_context(handle, &ContextAttributes::default())
            .unwrap();
        assert!(!device.close_device(handle));
        assert_eq!(device.get_error(), Some(ErrorCode::InvalidOperation));

        device.destroy_context(context);
        assert!(device.close_device(handle));
        let stats = device.stats();
        assert_eq!(stats.contexts_destroyed, 1);
        assert_eq!(stats.devices_closed, 1);
    }

    #[test]
    fn source_params_must_be_finite() {
        let device = active_device();
        let source = device.gen_source().unwrap();
        for param in [
            SourceParam::Gain,
            SourceParam::Pitch,
            SourceParam::ReferenceDistance,
            SourceParam::MaxDistance,
        ] {
            device.source_f(source, param, f32::INFINITY);
            assert_eq!(device.get_error(), Some(ErrorCode::InvalidValue));
            device.source_f(source, param, f32::NAN);
            assert_eq!(device.get_error(), Some(ErrorCode::InvalidValue));
        }

        let voice = device.voice(source).unwrap();
        assert_eq!(voice.gain, 1.0);
        assert_eq!(voice.pitch, 1.0);
        assert_eq!(voice.max_distance, f32::MAX);
    }

    #[test]
    fn context_attributes_must_be_nonzero() {
        let device = SoftDevice::headless();
        let handle = device.open_device(None).unwrap();
        let attributes = ContextAttributes {
            frequency: 0,
            ..Default::default()
        };
        assert_eq!(device.create_context(handle, &attributes), None);
        assert_eq!(device.get_error(), Some(ErrorCode::InvalidValue));
        assert_eq!(device.stats().contexts_created, 0);
        assert!(device.close_device(handle));
    }

    #[test]
    fn multichannel_extension_follows_desc() {
        let device = SoftDevice::new(SoftDeviceDesc {
            multichannel: false,
            output: OutputMode::Headless,
        });
        assert!(!device.is_extension_present(MULTICHANNEL_EXTENSION));
        assert!(SoftDevice::headless().is_extension_present(MULTICHANNEL_EXTENSION));
    }
}
