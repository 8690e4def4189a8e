//! Decoded sample sources that sounds are built from.
//!
//! A [`SampleSource`] is any reader of raw interleaved PCM that can describe its layout.
//! Sources that already hold their samples in memory expose them through
//! [`SampleSource::as_bytes`] so they can be uploaded without a copy; everything else is
//! drained once through a [`BufferedSource`].

use crate::error::Result;
use std::io::{Cursor, Read};

/// Layout of the PCM data a source produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

/// Raw decoded sample data.
///
/// 8-bit samples are unsigned, 16-bit samples are signed little-endian.
pub trait SampleSource: Read {
    fn info(&self) -> SampleInfo;

    /// All remaining sample bytes as one contiguous slice, when the source holds them.
    fn as_bytes(&self) -> Option<&[u8]> {
        None
    }

    /// Whether [`as_bytes`](Self::as_bytes) gives direct access.
    fn has_ptr(&self) -> bool {
        self.as_bytes().is_some()
    }
}

/// Whole contents of a sample source, read into one block.
#[derive(Debug, Clone)]
pub struct BufferedSource {
    info: SampleInfo,
    data: Vec<u8>,
}

impl BufferedSource {
    /// Drains `source` to its end.
    pub fn new(source: &mut dyn SampleSource) -> Result<Self> {
        let info = source.info();
        let mut data = Vec::new();
        source.read_to_end(&mut data)?;

        log::debug!("Buffered {} bytes from sample source", data.len());
        Ok(Self { info, data })
    }

    pub fn info(&self) -> SampleInfo {
        self.info
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// In-memory PCM with direct access.
#[derive(Debug, Clone)]
pub struct MemorySource {
    info: SampleInfo,
    cursor: Cursor<Vec<u8>>,
}

impl MemorySource {
    pub fn new(data: Vec<u8>, info: SampleInfo) -> Self {
        Self {
            info,
            cursor: Cursor::new(data),
        }
    }

    /// Quantizes interleaved float samples in [-1, 1] to 16-bit PCM.
    pub fn from_f32_samples(samples: &[f32], sample_rate: u32, channels: u16) -> Self {
        let data = samples
            .iter()
            .flat_map(|sample| {
                let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
                value.to_le_bytes()
            })
            .collect();

        Self::new(
            data,
            SampleInfo {
                sample_rate,
                channels,
                bits_per_sample: 16,
            },
        )
    }

    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }
}

impl Read for MemorySource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl SampleSource for MemorySource {
    fn info(&self) -> SampleInfo {
        self.info
    }

    fn as_bytes(&self) -> Option<&[u8]> {
        let position = (self.cursor.position() as usize).min(self.len());
        Some(&self.cursor.get_ref()[position..])
    }
}

/// Sample source over any reader. Has no direct access, so it is always buffered.
pub struct ReadSource<R> {
    info: SampleInfo,
    reader: R,
}

impl<R: Read> ReadSource<R> {
    pub fn new(reader: R, info: SampleInfo) -> Self {
        Self { info, reader }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> Read for ReadSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl<R: Read> SampleSource for ReadSource<R> {
    fn info(&self) -> SampleInfo {
        self.info
    }
}
