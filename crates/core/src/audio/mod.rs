use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, trace, warn};

use crate::{config::AnalyserConfig, Result, SpectrumAnalyser, VisualiserError};

/// Boundary to an external audio-analysis provider.
pub trait SpectrumSource {
    /// Nominal sample rate of the analysed signal.
    fn sample_rate(&self) -> u32;

    /// Number of magnitude bins the provider produces.
    fn bin_count(&self) -> usize;

    /// Forwards a temporal smoothing constant. Returns `false` when the
    /// provider does not smooth.
    fn set_smoothing(&mut self, _constant: f32) -> bool {
        false
    }

    /// Writes normalized magnitudes into `out`. Returns `false` while the
    /// provider is not ready, in which case `out` must be treated as silent.
    fn read_spectrum(&mut self, out: &mut [f32]) -> bool;
}

/// Source that replays a fixed spectrum, typically byte data from a host
/// analyser (`0..=255`).
#[derive(Debug, Clone)]
pub struct FixedSpectrum {
    sample_rate: u32,
    magnitudes: Vec<f32>,
}

impl FixedSpectrum {
    pub fn new(sample_rate: u32, magnitudes: Vec<f32>) -> Self {
        Self {
            sample_rate,
            magnitudes,
        }
    }

    pub fn from_bytes(sample_rate: u32, bytes: &[u8]) -> Self {
        Self::new(
            sample_rate,
            bytes.iter().map(|b| *b as f32 / 255.0).collect(),
        )
    }

    /// Silent spectrum with a single bin at full magnitude.
    pub fn spike(sample_rate: u32, bin_count: usize, bin: usize) -> Self {
        let mut bytes = vec![0u8; bin_count];
        if let Some(slot) = bytes.get_mut(bin) {
            *slot = 255;
        }
        Self::from_bytes(sample_rate, &bytes)
    }
}

impl SpectrumSource for FixedSpectrum {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn bin_count(&self) -> usize {
        self.magnitudes.len()
    }

    fn read_spectrum(&mut self, out: &mut [f32]) -> bool {
        let len = out.len().min(self.magnitudes.len());
        out[..len].copy_from_slice(&self.magnitudes[..len]);
        out[len..].fill(0.0);
        true
    }
}

/// High level audio façade. Capture code pushes PCM blocks from its own
/// thread while the render loop reads spectra through an [`AnalysisHandle`].
#[derive(Debug)]
pub struct AudioEngine {
    analysis: Arc<Mutex<SpectrumAnalyser>>,
}

impl AudioEngine {
    pub fn new(sample_rate: u32, config: &AnalyserConfig) -> Result<Self> {
        let analyser = SpectrumAnalyser::new(sample_rate, config.bin_count, config.smoothing)?;
        debug!(sample_rate, bins = config.bin_count, "audio engine created");
        Ok(Self {
            analysis: Arc::new(Mutex::new(analyser)),
        })
    }

    /// Resets buffered audio and returns a handle to the analysis pipeline.
    pub fn connect(&self) -> Result<AnalysisHandle> {
        self.lock_analysis()?.reset();
        Ok(AnalysisHandle::new(self.analysis.clone()))
    }

    /// Feeds a block of floating point samples into the analyser.
    pub fn push_samples(&self, samples: &[f32]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        self.lock_analysis()?.push_samples(samples);
        Ok(())
    }

    fn lock_analysis(&self) -> Result<MutexGuard<'_, SpectrumAnalyser>> {
        self.analysis
            .lock()
            .map_err(|_| VisualiserError::msg("analysis pipeline has been poisoned"))
    }
}

/// Shared view over the analyser managed by [`AudioEngine`].
#[derive(Clone)]
pub struct AnalysisHandle {
    shared: Arc<Mutex<SpectrumAnalyser>>,
    sample_rate: u32,
    bin_count: usize,
}

impl AnalysisHandle {
    pub(crate) fn new(shared: Arc<Mutex<SpectrumAnalyser>>) -> Self {
        let (sample_rate, bin_count) = match shared.lock() {
            Ok(engine) => (engine.sample_rate(), engine.bin_count()),
            Err(poisoned) => {
                let engine = poisoned.into_inner();
                (engine.sample_rate(), engine.bin_count())
            }
        };
        Self {
            shared,
            sample_rate,
            bin_count,
        }
    }
}

impl SpectrumSource for AnalysisHandle {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn bin_count(&self) -> usize {
        self.bin_count
    }

    fn set_smoothing(&mut self, constant: f32) -> bool {
        match self.shared.lock() {
            Ok(mut engine) => {
                engine.set_smoothing(constant);
                true
            }
            Err(_) => false,
        }
    }

    fn read_spectrum(&mut self, out: &mut [f32]) -> bool {
        let mut engine = match self.shared.lock() {
            Ok(engine) => engine,
            Err(_) => {
                warn!("analysis pipeline poisoned, rendering silence");
                return false;
            }
        };

        if !engine.has_signal() {
            return false;
        }

        match engine.refresh() {
            Ok(spectrum) => {
                let len = out.len().min(spectrum.len());
                out[..len].copy_from_slice(&spectrum[..len]);
                true
            }
            Err(err) => {
                warn!(%err, "spectrum refresh failed");
                false
            }
        }
    }
}

impl std::fmt::Debug for AnalysisHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisHandle")
            .field("sample_rate", &self.sample_rate)
            .field("bin_count", &self.bin_count)
            .finish()
    }
}

/// Pulls one spectrum per tick into a reused buffer.
///
/// The buffer takes the bin count of the connected source so bin indices map
/// to the frequencies that source measured. It is resized only on connect and
/// disconnect, never per tick.
///
/// Without a connected (or ready) source the buffer is all zeros, so every
/// downstream stage renders its idle animation.
pub struct FrequencyAnalyzer {
    buffer: Vec<f32>,
    configured_bins: usize,
    smoothing: f32,
    fallback_sample_rate: u32,
    source: Option<Box<dyn SpectrumSource>>,
    ready: bool,
}

impl FrequencyAnalyzer {
    pub fn new(config: &AnalyserConfig) -> Self {
        Self {
            buffer: vec![0.0; config.bin_count],
            configured_bins: config.bin_count,
            smoothing: config.smoothing,
            fallback_sample_rate: config.sample_rate,
            source: None,
            ready: false,
        }
    }

    pub fn connect(&mut self, mut source: Box<dyn SpectrumSource>) {
        let source_bins = source.bin_count();
        if source_bins == 0 {
            warn!(
                buffer_bins = self.buffer.len(),
                "audio source reports no bins, keeping analyser buffer size"
            );
        } else if source_bins != self.buffer.len() {
            debug!(
                source_bins,
                buffer_bins = self.buffer.len(),
                "resizing analyser buffer to source bin count"
            );
            self.buffer = vec![0.0; source_bins];
        }
        let smoothed = source.set_smoothing(self.smoothing);
        debug!(
            sample_rate = source.sample_rate(),
            smoothed, "audio source connected"
        );
        self.source = Some(source);
        self.ready = false;
    }

    pub fn disconnect(&mut self) {
        self.source = None;
        self.ready = false;
        if self.buffer.len() == self.configured_bins {
            self.buffer.fill(0.0);
        } else {
            self.buffer = vec![0.0; self.configured_bins];
        }
    }

    /// Whether the last pull produced real data rather than silence.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn bin_count(&self) -> usize {
        self.buffer.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.source
            .as_ref()
            .map(|source| source.sample_rate())
            .filter(|rate| *rate > 0)
            .unwrap_or(self.fallback_sample_rate)
    }

    /// Refreshes the buffer from the source and returns it. Non-finite values
    /// become 0 and everything is clamped to `[0, 1]`.
    pub fn pull(&mut self) -> &[f32] {
        self.ready = match self.source.as_mut() {
            Some(source) => source.read_spectrum(&mut self.buffer),
            None => false,
        };

        if !self.ready {
            self.buffer.fill(0.0);
            trace!("silent spectrum");
            return &self.buffer;
        }

        for value in &mut self.buffer {
            *value = if value.is_finite() {
                value.clamp(0.0, 1.0)
            } else {
                0.0
            };
        }
        &self.buffer
    }

    pub fn spectrum(&self) -> &[f32] {
        &self.buffer
    }
}

impl std::fmt::Debug for FrequencyAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrequencyAnalyzer")
            .field("bins", &self.buffer.len())
            .field("connected", &self.source.is_some())
            .field("ready", &self.ready)
            .finish()
    }
}
