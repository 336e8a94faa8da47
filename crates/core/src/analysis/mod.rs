use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{Result, VisualiserError};

/// Decibel level mapped to a normalized magnitude of 0.
pub const MIN_DECIBELS: f32 = -100.0;
/// Decibel level mapped to a normalized magnitude of 1.
pub const MAX_DECIBELS: f32 = -30.0;

/// Analyser-node style spectrum generator.
///
/// PCM samples are appended to a ring buffer holding the most recent
/// `2 * bin_count` samples. [`SpectrumAnalyser::refresh`] windows that buffer,
/// runs a real FFT, blends the magnitudes with the previous frame using the
/// smoothing constant and maps the result from decibels into `[0, 1]`.
pub struct SpectrumAnalyser {
    sample_rate: u32,
    bin_count: usize,
    smoothing: f32,
    ring: Vec<f32>,
    write_pos: usize,
    received: usize,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    normalized: Vec<f32>,
    fft: FftResources,
}

impl SpectrumAnalyser {
    pub fn new(sample_rate: u32, bin_count: usize, smoothing: f32) -> Result<Self> {
        if bin_count == 0 || !bin_count.is_power_of_two() {
            return Err(VisualiserError::InvalidInput(
                "analyser bin count must be a non-zero power of two",
            ));
        }

        let fft_size = bin_count * 2;
        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(fft_size);
        let fft = FftResources {
            input: plan.make_input_vec(),
            spectrum: plan.make_output_vec(),
            scratch: plan.make_scratch_vec(),
            plan,
        };

        Ok(Self {
            sample_rate,
            bin_count,
            smoothing: smoothing.clamp(0.0, 0.999),
            ring: vec![0.0; fft_size],
            write_pos: 0,
            received: 0,
            window: (0..fft_size).map(|i| hann_value(i, fft_size)).collect(),
            smoothed: vec![0.0; bin_count],
            normalized: vec![0.0; bin_count],
            fft,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    pub fn smoothing(&self) -> f32 {
        self.smoothing
    }

    pub fn set_smoothing(&mut self, smoothing: f32) {
        self.smoothing = smoothing.clamp(0.0, 0.999);
    }

    /// Whether at least one sample has been pushed since the last reset.
    pub fn has_signal(&self) -> bool {
        self.received > 0
    }

    /// Clears buffered audio and smoothing history while keeping the plan.
    pub fn reset(&mut self) {
        self.ring.fill(0.0);
        self.smoothed.fill(0.0);
        self.normalized.fill(0.0);
        self.write_pos = 0;
        self.received = 0;
    }

    /// Appends samples to the ring buffer. Non-finite samples are stored as 0.
    pub fn push_samples(&mut self, samples: &[f32]) {
        let len = self.ring.len();
        for &sample in samples {
            self.ring[self.write_pos] = if sample.is_finite() { sample } else { 0.0 };
            self.write_pos = (self.write_pos + 1) % len;
        }
        self.received = self.received.saturating_add(samples.len());
    }

    /// Recomputes the normalized spectrum from the buffered samples.
    pub fn refresh(&mut self) -> Result<&[f32]> {
        let len = self.ring.len();
        for i in 0..len {
            let sample = self.ring[(self.write_pos + i) % len];
            self.fft.input[i] = sample * self.window[i];
        }

        self.fft.plan.process_with_scratch(
            &mut self.fft.input,
            &mut self.fft.spectrum,
            &mut self.fft.scratch,
        )?;

        let scale = 1.0 / len as f32;
        let tau = self.smoothing;
        let range = MAX_DECIBELS - MIN_DECIBELS;
        for (i, bin) in self.fft.spectrum.iter().take(self.bin_count).enumerate() {
            let magnitude = bin.norm() * scale;
            let smoothed = tau * self.smoothed[i] + (1.0 - tau) * magnitude;
            self.smoothed[i] = if smoothed.is_finite() { smoothed } else { 0.0 };

            let normalized = if self.smoothed[i] <= f32::MIN_POSITIVE {
                0.0
            } else {
                let db = 20.0 * self.smoothed[i].log10();
                ((db - MIN_DECIBELS) / range).clamp(0.0, 1.0)
            };
            self.normalized[i] = normalized;
        }

        Ok(&self.normalized)
    }

    /// Last spectrum produced by [`SpectrumAnalyser::refresh`].
    pub fn spectrum(&self) -> &[f32] {
        &self.normalized
    }
}

struct FftResources {
    plan: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("sample_rate", &self.sample_rate)
            .field("bin_count", &self.bin_count)
            .field("smoothing", &self.smoothing)
            .field("received", &self.received)
            .finish()
    }
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}
