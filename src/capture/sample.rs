//! Media samples, images and the synchronization clock

use crate::capture::channel::ChannelKind;
use crate::capture::configuration::PixelFormat;
use crate::error::{BridgeError, BridgeResult};
use std::time::{Duration, Instant};

/// Nanosecond timescale used by [`SynchronizationClock`]
pub const NANOSECOND_TIMESCALE: i32 = 1_000_000_000;

/// Rational timestamp, `value / timescale` seconds
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleTime {
    pub value: i64,
    pub timescale: i32,
}

impl SampleTime {
    pub fn from_duration(elapsed: Duration) -> Self {
        Self {
            value: i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX),
            timescale: NANOSECOND_TIMESCALE,
        }
    }

    pub fn seconds(&self) -> f64 {
        if self.timescale == 0 {
            return 0.0;
        }
        self.value as f64 / self.timescale as f64
    }
}

/// Monotonic clock that sample timestamps are measured against
#[derive(Debug)]
pub struct SynchronizationClock {
    origin: Instant,
}

impl SynchronizationClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now(&self) -> SampleTime {
        SampleTime::from_duration(self.origin.elapsed())
    }
}

impl Default for SynchronizationClock {
    fn default() -> Self {
        Self::new()
    }
}

/// One captured video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// Row stride in bytes; may include padding
    pub bytes_per_row: u32,
    pub pixel_format: PixelFormat,
    pub data: Vec<u8>,
}

/// One captured buffer of interleaved `f32` audio
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub channel_count: u32,
    pub samples: Vec<f32>,
}

impl AudioBuffer {
    pub fn frame_count(&self) -> usize {
        if self.channel_count == 0 {
            return 0;
        }
        self.samples.len() / self.channel_count as usize
    }
}

#[derive(Debug, Clone)]
pub enum SamplePayload {
    Video(VideoFrame),
    Audio(AudioBuffer),
}

/// One timestamped unit of captured media
#[derive(Debug, Clone)]
pub struct MediaSample {
    pub kind: ChannelKind,
    pub presentation_time: SampleTime,
    pub payload: SamplePayload,
}

impl MediaSample {
    pub fn video(presentation_time: SampleTime, frame: VideoFrame) -> Self {
        Self {
            kind: ChannelKind::Video,
            presentation_time,
            payload: SamplePayload::Video(frame),
        }
    }

    pub fn audio(kind: ChannelKind, presentation_time: SampleTime, buffer: AudioBuffer) -> Self {
        Self {
            kind,
            presentation_time,
            payload: SamplePayload::Audio(buffer),
        }
    }

    pub fn video_frame(&self) -> Option<&VideoFrame> {
        match &self.payload {
            SamplePayload::Video(frame) => Some(frame),
            SamplePayload::Audio(_) => None,
        }
    }

    pub fn audio_buffer(&self) -> Option<&AudioBuffer> {
        match &self.payload {
            SamplePayload::Audio(buffer) => Some(buffer),
            SamplePayload::Video(_) => None,
        }
    }

    /// Size of the raw payload in bytes
    pub fn byte_len(&self) -> usize {
        match &self.payload {
            SamplePayload::Video(frame) => frame.data.len(),
            SamplePayload::Audio(buffer) => buffer.samples.len() * std::mem::size_of::<f32>(),
        }
    }

    /// Copy the raw payload into `out`, returning the bytes written
    ///
    /// Audio is written as little-endian `f32`.
    pub fn copy_bytes(&self, out: &mut [u8]) -> usize {
        match &self.payload {
            SamplePayload::Video(frame) => {
                let n = frame.data.len().min(out.len());
                out[..n].copy_from_slice(&frame.data[..n]);
                n
            }
            SamplePayload::Audio(buffer) => {
                let mut written = 0;
                for (chunk, sample) in out.chunks_exact_mut(4).zip(&buffer.samples) {
                    chunk.copy_from_slice(&sample.to_le_bytes());
                    written += 4;
                }
                written
            }
        }
    }

    /// Convert a BGRA video sample into a tightly packed RGBA image
    pub fn to_image(&self) -> BridgeResult<Image> {
        let frame = self.video_frame().ok_or_else(|| {
            BridgeError::Screenshot(format!("{} sample carries no image", self.kind))
        })?;
        if frame.pixel_format != PixelFormat::Bgra {
            return Err(BridgeError::Screenshot(format!(
                "cannot convert {:?} frames to an image",
                frame.pixel_format
            )));
        }
        if frame.width == 0 || frame.height == 0 {
            return Err(BridgeError::Screenshot("frame has no pixels".into()));
        }

        let row_bytes = frame.width as usize * 4;
        let stride = frame.bytes_per_row as usize;
        let needed = stride * (frame.height as usize - 1) + row_bytes;
        if stride < row_bytes || frame.data.len() < needed {
            return Err(BridgeError::Screenshot(format!(
                "frame buffer too small: {} bytes for {}x{} with stride {}",
                frame.data.len(),
                frame.width,
                frame.height,
                stride
            )));
        }

        let mut rgba = Vec::with_capacity(row_bytes * frame.height as usize);
        for row in frame.data.chunks(stride).take(frame.height as usize) {
            for px in row[..row_bytes].chunks_exact(4) {
                rgba.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
            }
        }

        Ok(Image {
            width: frame.width,
            height: frame.height,
            data: rgba,
        })
    }
}

/// A still image, RGBA, 8 bits per channel, no row padding
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Image {
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        self.data
            .get(offset..offset + 4)
            .and_then(|px| px.try_into().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bgra_frame(width: u32, height: u32, bytes_per_row: u32) -> VideoFrame {
        let mut data = vec![0u8; (bytes_per_row * height) as usize];
        for y in 0..height {
            for x in 0..width {
                let i = (y * bytes_per_row + x * 4) as usize;
                data[i..i + 4].copy_from_slice(&[x as u8, y as u8, 200, 255]);
            }
        }
        VideoFrame {
            width,
            height,
            bytes_per_row,
            pixel_format: PixelFormat::Bgra,
            data,
        }
    }

    #[test]
    fn test_to_image_swizzles_and_strips_padding() {
        let sample = MediaSample::video(SampleTime::default(), bgra_frame(3, 2, 16));
        let image = sample.to_image().unwrap();
        assert_eq!((image.width, image.height), (3, 2));
        assert_eq!(image.data.len(), 3 * 2 * 4);
        assert_eq!(image.pixel(2, 1), Some([200, 1, 2, 255]));
        assert_eq!(image.pixel(3, 0), None);
    }

    #[test]
    fn test_to_image_rejects_other_formats() {
        let mut frame = bgra_frame(2, 2, 8);
        frame.pixel_format = PixelFormat::YCbCr420v;
        let err = MediaSample::video(SampleTime::default(), frame).to_image().unwrap_err();
        assert!(matches!(err, BridgeError::Screenshot(_)));
    }

    #[test]
    fn test_to_image_rejects_truncated_buffer() {
        let mut frame = bgra_frame(4, 4, 16);
        frame.data.truncate(20);
        assert!(MediaSample::video(SampleTime::default(), frame).to_image().is_err());
    }

    #[test]
    fn test_audio_sample_has_no_image() {
        let buffer = AudioBuffer {
            sample_rate: 48_000,
            channel_count: 2,
            samples: vec![0.5; 8],
        };
        let sample = MediaSample::audio(ChannelKind::Audio, SampleTime::default(), buffer);
        assert_eq!(sample.audio_buffer().unwrap().frame_count(), 4);
        assert!(sample.to_image().is_err());

        let mut out = vec![0u8; 64];
        assert_eq!(sample.byte_len(), 32);
        assert_eq!(sample.copy_bytes(&mut out), 32);
        assert_eq!(&out[..4], &0.5f32.to_le_bytes());
    }

    #[test]
    fn test_clock_is_monotonic() {
        let clock = SynchronizationClock::new();
        let a = clock.now();
        std::thread::sleep(Duration::from_millis(2));
        let b = clock.now();
        assert_eq!(a.timescale, NANOSECOND_TIMESCALE);
        assert!(b.value > a.value);
        assert!(b.seconds() >= 0.002);
    }
}
