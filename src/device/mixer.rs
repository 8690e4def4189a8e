//! Voice mixing for the software device.
//!
//! Mono buffers are spatialized against the listener; multichannel buffers are downmixed
//! straight to the output.

use super::soft::{BufferSlot, DeviceState, Listener, Voice};
use super::{BufferFormat, SourceState};
use std::f32::consts::FRAC_PI_4;

const MAX_SOURCE_CHANNELS: usize = 6;
const HALF_POWER: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Per source channel (left, right) output gains.
type ChannelMatrix = [[f32; 2]; MAX_SOURCE_CHANNELS];

/// Mix all playing voices into `out`.
///
/// `out` is cleared first. Returns the number of frames rendered.
pub(super) fn render(
    state: &mut DeviceState,
    out: &mut [f32],
    channels: u16,
    output_rate: u32,
) -> usize {
    out.fill(0.0);
    let channels = channels.max(1) as usize;
    let frames = out.len() / channels;
    if frames == 0 || output_rate == 0 {
        return 0;
    }

    let listener = state.listener;
    let DeviceState {
        sources, buffers, ..
    } = state;

    for voice in sources.values_mut() {
        if voice.state != SourceState::Playing {
            continue;
        }

        let slot = voice.buffer.and_then(|id| buffers.get(&id));
        match slot.and_then(|slot| slot.format.map(|format| (slot, format))) {
            Some((slot, format)) => {
                mix_voice(voice, slot, format, &listener, out, channels, output_rate)
            }
            None => {
                // Nothing to play
                voice.state = SourceState::Stopped;
                voice.cursor = 0.0;
            }
        }
    }

    frames
}

fn mix_voice(
    voice: &mut Voice,
    slot: &BufferSlot,
    format: BufferFormat,
    listener: &Listener,
    out: &mut [f32],
    channels: usize,
    output_rate: u32,
) {
    let frame_size = format.frame_size();
    let total_frames = slot.data.len() / frame_size;
    if total_frames == 0 {
        voice.state = SourceState::Stopped;
        voice.cursor = 0.0;
        return;
    }

    let step = voice.pitch as f64 * slot.frequency as f64 / output_rate as f64;
    let matrix = channel_matrix(voice, format, listener);
    let source_channels = format.channels() as usize;
    let wide = format.bits_per_sample() == 16;

    for frame in out.chunks_exact_mut(channels) {
        let mut index = voice.cursor as usize;
        if index >= total_frames {
            if !voice.looping {
                break;
            }
            voice.cursor %= total_frames as f64;
            index = voice.cursor as usize;
        }

        let base = index * frame_size;
        let (mut left, mut right) = (0.0f32, 0.0f32);
        for (channel, gains) in matrix.iter().enumerate().take(source_channels) {
            let sample = decode_sample(&slot.data, base, channel, wide);
            left += sample * gains[0];
            right += sample * gains[1];
        }

        if channels == 1 {
            frame[0] += (left + right) * 0.5;
        } else {
            frame[0] += left;
            frame[1] += right;
        }

        voice.cursor += step;
    }

    if voice.cursor as usize >= total_frames {
        if voice.looping {
            voice.cursor %= total_frames as f64;
        } else {
            voice.state = SourceState::Stopped;
            voice.cursor = 0.0;
        }
    }
}

fn decode_sample(data: &[u8], base: usize, channel: usize, wide: bool) -> f32 {
    if wide {
        let at = base + channel * 2;
        i16::from_le_bytes([data[at], data[at + 1]]) as f32 / 32768.0
    } else {
        (data[base + channel] as f32 - 128.0) / 128.0
    }
}

fn channel_matrix(voice: &Voice, format: BufferFormat, listener: &Listener) -> ChannelMatrix {
    let gain = voice.gain;
    let mut matrix = [[0.0; 2]; MAX_SOURCE_CHANNELS];

    match format.channels() {
        1 => {
            let (attenuation, pan) = spatialize(voice, listener);
            // Constant-power pan: -1 is hard left, 1 is hard right.
            let angle = (pan + 1.0) * FRAC_PI_4;
            let g = gain * attenuation;
            matrix[0] = [g * angle.cos(), g * angle.sin()];
        }
        2 => {
            matrix[0] = [gain, 0.0];
            matrix[1] = [0.0, gain];
        }
        4 => {
            // FL FR RL RR
            matrix[0] = [gain, 0.0];
            matrix[1] = [0.0, gain];
            matrix[2] = [gain * HALF_POWER, 0.0];
            matrix[3] = [0.0, gain * HALF_POWER];
        }
        _ => {
            // FL FR C LFE SL SR, LFE dropped
            matrix[0] = [gain, 0.0];
            matrix[1] = [0.0, gain];
            matrix[2] = [gain * HALF_POWER, gain * HALF_POWER];
            matrix[4] = [gain * HALF_POWER, 0.0];
            matrix[5] = [0.0, gain * HALF_POWER];
        }
    }

    matrix
}

/// Inverse distance clamped attenuation and a pan value in [-1, 1].
fn spatialize(voice: &Voice, listener: &Listener) -> (f32, f32) {
    let relative = voice.position - listener.position;
    let distance = relative.length();

    let reference = voice.reference_distance;
    let max = voice.max_distance.max(reference);
    let clamped = distance.clamp(reference, max);
    let denominator = reference + (clamped - reference);
    let attenuation = if denominator > 0.0 {
        reference / denominator
    } else {
        1.0
    };

    let pan = if distance > f32::EPSILON {
        (relative / distance)
            .dot(listener.orientation.right())
            .clamp(-1.0, 1.0)
    } else {
        0.0
    };

    (attenuation, pan)
}
