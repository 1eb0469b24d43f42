//! Spectrum sources
//!
//! A source yields a fixed-size snapshot of byte magnitudes (0-255) plus a
//! sample rate. Byte conversion follows the WebAudio analyser convention:
//! Hann window, forward FFT, per-bin magnitude smoothed across frames
//! (factor 0.8), converted to dB and mapped from the [-100, -30] window
//! onto 0..255. A source that has nothing to say yields zeros, never errors.

use crate::error::VizError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::{Arc, Mutex};

/// FFT sizes the analyser accepts
pub const VALID_FFT_SIZES: [usize; 7] = [32, 64, 128, 256, 512, 1024, 2048];

/// Default FFT size
pub const DEFAULT_FFT_SIZE: usize = 2048;

const SMOOTHING: f32 = 0.8;
const ANALYSER_DB_MIN: f32 = -100.0;
const ANALYSER_DB_MAX: f32 = -30.0;

/// Snap an arbitrary requested size to the nearest valid FFT size.
pub fn nearest_fft_size(raw: usize) -> usize {
    *VALID_FFT_SIZES
        .iter()
        .min_by_key(|&&size| size.abs_diff(raw))
        .unwrap_or(&DEFAULT_FFT_SIZE)
}

fn validate_fft_size(fft_size: usize) -> Result<(), VizError> {
    if VALID_FFT_SIZES.contains(&fft_size) {
        Ok(())
    } else {
        Err(VizError::InvalidFftSize(fft_size))
    }
}

/// A provider of per-frame magnitude snapshots
pub trait SpectrumSource {
    fn sample_rate(&self) -> u32;

    /// Number of frequency bins (half the FFT size)
    fn bin_count(&self) -> usize;

    /// Refresh and return the latest byte-magnitude snapshot
    fn magnitudes(&mut self) -> &[u8];

    /// Whether the source is still producing signal (a file source turns
    /// inactive once exhausted)
    fn is_active(&self) -> bool {
        true
    }
}

/// Windowed FFT plus dB-to-byte conversion shared by the real sources
struct ByteAnalyser {
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    bytes: Vec<u8>,
}

impl ByteAnalyser {
    fn new(fft_size: usize) -> Result<Self, VizError> {
        validate_fft_size(fft_size)?;
        let mut analyser = Self {
            fft_size: 0,
            fft: FftPlanner::new().plan_fft_forward(fft_size),
            window: Vec::new(),
            smoothed: Vec::new(),
            bytes: Vec::new(),
        };
        analyser.set_fft_size(fft_size)?;
        Ok(analyser)
    }

    /// Change the FFT size, reallocating every derived buffer wholesale so
    /// no frame ever reads a buffer sized for the previous configuration.
    fn set_fft_size(&mut self, fft_size: usize) -> Result<(), VizError> {
        validate_fft_size(fft_size)?;
        // Hann window.
        let window: Vec<f32> = (0..fft_size)
            .map(|i| {
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / fft_size as f32).cos())
            })
            .collect();

        self.fft = FftPlanner::new().plan_fft_forward(fft_size);
        self.fft_size = fft_size;
        self.window = window;
        self.smoothed = vec![0.0; fft_size / 2];
        self.bytes = vec![0; fft_size / 2];
        Ok(())
    }

    fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Run one analysis pass over the most recent `fft_size` samples.
    ///
    /// `samples` shorter than the FFT size are treated as zero-padded at
    /// the front (a source that has not filled its buffer yet).
    fn process(&mut self, samples: &[f32]) -> &[u8] {
        let pad = self.fft_size.saturating_sub(samples.len());
        let tail = &samples[samples.len().saturating_sub(self.fft_size)..];

        let mut buf: Vec<Complex<f32>> = (0..self.fft_size)
            .map(|i| {
                let sample = if i < pad { 0.0 } else { tail[i - pad] };
                Complex::new(sample * self.window[i], 0.0)
            })
            .collect();
        self.fft.process(&mut buf);

        for (bin, byte) in self.bytes.iter_mut().enumerate() {
            let magnitude = buf[bin].norm() / self.fft_size as f32;
            let smoothed = SMOOTHING * self.smoothed[bin] + (1.0 - SMOOTHING) * magnitude;
            self.smoothed[bin] = smoothed;

            let db = if smoothed > 0.0 {
                20.0 * smoothed.log10()
            } else {
                ANALYSER_DB_MIN
            };
            let norm = ((db - ANALYSER_DB_MIN) / (ANALYSER_DB_MAX - ANALYSER_DB_MIN))
                .clamp(0.0, 1.0);
            *byte = (norm * 255.0).round() as u8;
        }
        &self.bytes
    }
}

/// Live microphone source backed by a cpal input stream
pub struct MicSource {
    _stream: cpal::Stream,
    shared: Arc<Mutex<Vec<f32>>>,
    analyser: ByteAnalyser,
    sample_rate: u32,
    scratch: Vec<f32>,
}

impl MicSource {
    pub fn new(fft_size: usize) -> Result<Self, VizError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| VizError::Audio("no default input device found".into()))?;
        let supported = device
            .default_input_config()
            .map_err(|e| VizError::Audio(e.to_string()))?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        let config: cpal::StreamConfig = supported.into();

        let analyser = ByteAnalyser::new(fft_size)?;
        let shared = Arc::new(Mutex::new(Vec::with_capacity(fft_size)));
        let shared_writer = shared.clone();
        let capacity = fft_size;

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let Ok(mut buffer) = shared_writer.lock() else {
                        return;
                    };
                    // Mix down to mono and keep only the newest window.
                    for frame in data.chunks(channels) {
                        let mono = frame.iter().sum::<f32>() / channels as f32;
                        buffer.push(mono);
                    }
                    let len = buffer.len();
                    if len > capacity {
                        buffer.drain(0..len - capacity);
                    }
                },
                |err| log::warn!("audio stream error: {}", err),
                None,
            )
            .map_err(|e| VizError::Audio(e.to_string()))?;
        stream.play().map_err(|e| VizError::Audio(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            shared,
            analyser,
            sample_rate,
            scratch: Vec::with_capacity(fft_size),
        })
    }

    /// List input devices for the `devices` subcommand.
    pub fn list_devices() -> Result<Vec<AudioDeviceInfo>, VizError> {
        let host = cpal::default_host();
        let default_name = host
            .default_input_device()
            .and_then(|d| d.name().ok());
        let devices = host
            .input_devices()
            .map_err(|e| VizError::Audio(e.to_string()))?;

        let mut infos = Vec::new();
        for device in devices {
            let name = device.name().unwrap_or_else(|_| "Unknown Device".into());
            let (sample_rate, channels) = device
                .default_input_config()
                .map(|c| (c.sample_rate().0, c.channels()))
                .unwrap_or((0, 0));
            infos.push(AudioDeviceInfo {
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
                default_sample_rate: sample_rate,
                channels,
            });
        }
        Ok(infos)
    }
}

impl SpectrumSource for MicSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn bin_count(&self) -> usize {
        self.analyser.bin_count()
    }

    fn magnitudes(&mut self) -> &[u8] {
        self.scratch.clear();
        if let Ok(buffer) = self.shared.lock() {
            self.scratch.extend_from_slice(&buffer);
        }
        // A poisoned or still-empty buffer analyses as silence.
        self.analyser.process(&self.scratch)
    }
}

/// Basic facts about one capture device
#[derive(Debug)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub is_default: bool,
    pub default_sample_rate: u32,
    pub channels: u16,
}

/// File source that walks a WAV recording at playback speed
pub struct WavSource {
    samples: Vec<f32>,
    cursor: usize,
    hop: usize,
    sample_rate: u32,
    analyser: ByteAnalyser,
    finished: bool,
}

impl WavSource {
    pub fn new(path: &std::path::Path, fft_size: usize) -> Result<Self, VizError> {
        let mut reader =
            hound::WavReader::open(path).map_err(|e| VizError::Audio(e.to_string()))?;
        let spec = reader.spec();
        let channels = spec.channels as usize;

        let mono: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => {
                let samples: Result<Vec<f32>, _> = reader.samples::<f32>().collect();
                mix_mono(&samples.map_err(|e| VizError::Audio(e.to_string()))?, channels)
            }
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
                let samples: Result<Vec<i32>, _> = reader.samples::<i32>().collect();
                let floats: Vec<f32> = samples
                    .map_err(|e| VizError::Audio(e.to_string()))?
                    .into_iter()
                    .map(|s| s as f32 / scale)
                    .collect();
                mix_mono(&floats, channels)
            }
        };

        Ok(Self {
            // Advance roughly one frame of audio per rendered frame.
            hop: (spec.sample_rate as usize / 60).max(1),
            sample_rate: spec.sample_rate,
            samples: mono,
            cursor: 0,
            analyser: ByteAnalyser::new(fft_size)?,
            finished: false,
        })
    }
}

fn mix_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

impl SpectrumSource for WavSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn bin_count(&self) -> usize {
        self.analyser.bin_count()
    }

    fn magnitudes(&mut self) -> &[u8] {
        if self.cursor >= self.samples.len() {
            self.finished = true;
            return self.analyser.process(&[]);
        }
        let end = (self.cursor + self.hop).min(self.samples.len());
        let window_start = end.saturating_sub(self.analyser.fft_size);
        self.cursor = end;
        let window: Vec<f32> = self.samples[window_start..end].to_vec();
        self.analyser.process(&window)
    }

    fn is_active(&self) -> bool {
        !self.finished
    }
}

/// Fixed-pattern source for tests and the self-test
pub struct SyntheticSource {
    sample_rate: u32,
    bytes: Vec<u8>,
}

impl SyntheticSource {
    pub fn constant(sample_rate: u32, fft_size: usize, value: u8) -> Result<Self, VizError> {
        validate_fft_size(fft_size)?;
        Ok(Self {
            sample_rate,
            bytes: vec![value; fft_size / 2],
        })
    }

    pub fn with_bytes(sample_rate: u32, bytes: Vec<u8>) -> Self {
        Self { sample_rate, bytes }
    }
}

impl SpectrumSource for SyntheticSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn bin_count(&self) -> usize {
        self.bytes.len()
    }

    fn magnitudes(&mut self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_fft_size() {
        assert_eq!(nearest_fft_size(32), 32);
        assert_eq!(nearest_fft_size(40), 32);
        assert_eq!(nearest_fft_size(100), 128);
        assert_eq!(nearest_fft_size(3000), 2048);
    }

    #[test]
    fn test_invalid_fft_size_rejected() {
        assert!(matches!(
            ByteAnalyser::new(100),
            Err(VizError::InvalidFftSize(100))
        ));
        assert!(SyntheticSource::constant(44100, 33, 0).is_err());
    }

    #[test]
    fn test_analyser_silence_is_zero() {
        let mut analyser = ByteAnalyser::new(512).unwrap();
        let bytes = analyser.process(&vec![0.0; 512]);
        assert_eq!(bytes.len(), 256);
        assert!(bytes.iter().all(|&b| b == 0));
        // Empty input zero-pads to a full silent window.
        assert!(analyser.process(&[]).iter().all(|&b| b == 0));
    }

    #[test]
    fn test_analyser_full_scale_sine_saturates_its_bin() {
        let fft_size = 512;
        let sample_rate = 44100.0;
        let bin = 32;
        let freq = bin as f32 * sample_rate / fft_size as f32;

        let samples: Vec<f32> = (0..fft_size)
            .map(|i| (std::f32::consts::TAU * freq * i as f32 / sample_rate).sin())
            .collect();

        let mut analyser = ByteAnalyser::new(fft_size).unwrap();
        // A few passes to let the smoothing settle.
        let mut peak = 0u8;
        for _ in 0..5 {
            peak = *analyser.process(&samples).iter().max().unwrap();
        }
        assert_eq!(peak, 255);
    }

    #[test]
    fn test_analyser_resize_reallocates() {
        let mut analyser = ByteAnalyser::new(2048).unwrap();
        assert_eq!(analyser.bin_count(), 1024);
        analyser.set_fft_size(256).unwrap();
        assert_eq!(analyser.bin_count(), 128);
        assert_eq!(analyser.process(&vec![0.0; 256]).len(), 128);
        assert!(analyser.set_fft_size(1000).is_err());
    }

    #[test]
    fn test_synthetic_source() {
        let mut source = SyntheticSource::constant(44100, 2048, 255).unwrap();
        assert_eq!(source.sample_rate(), 44100);
        assert_eq!(source.bin_count(), 1024);
        assert!(source.magnitudes().iter().all(|&b| b == 255));
        assert!(source.is_active());
    }

    #[test]
    fn test_wav_source_walks_file() {
        let path = std::env::temp_dir().join("polareq_test_tone.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..44100 / 4 {
            let value = (std::f32::consts::TAU * 440.0 * i as f32 / 44100.0).sin();
            writer.write_sample((value * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();

        let mut source = WavSource::new(&path, 1024).unwrap();
        assert_eq!(source.sample_rate(), 44100);
        assert_eq!(source.bin_count(), 512);

        let mut saw_signal = false;
        while source.is_active() {
            if source.magnitudes().iter().any(|&b| b > 0) {
                saw_signal = true;
            }
        }
        assert!(saw_signal);
        std::fs::remove_file(&path).ok();
    }
}
