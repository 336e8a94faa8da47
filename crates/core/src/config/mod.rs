use std::{ops::RangeInclusive, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{render::ViewMode, Result, VisualiserError};

pub const DEFAULT_BIN_COUNT: usize = 1024;
pub const DEFAULT_SMOOTHING: f32 = 0.8;
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

pub const DEFAULT_BASS_FRACTION: f32 = 0.10;
pub const DEFAULT_MID_LOW_FRACTION: f32 = 0.20;
pub const DEFAULT_MID_HIGH_FRACTION: f32 = 0.30;
pub const DEFAULT_TREBLE_FRACTION: f32 = 0.40;

/// Normalized magnitude the dominant bin must reach before it is considered.
/// Empirically tuned against typical analyser output; keeps the noise floor
/// from producing prime events.
pub const DEFAULT_PRIME_THRESHOLD: f32 = 0.6;
/// Minimum real time between two events for the same frequency.
pub const DEFAULT_PRIME_COOLDOWN_MS: u64 = 1_000;
/// Candidates at or below this frequency are inaudible and ignored.
pub const DEFAULT_MIN_AUDIBLE_HZ: u32 = 20;
pub const DEFAULT_PRIME_ACTIVE_MS: u64 = 3_000;
pub const DEFAULT_PULSE_HZ: f32 = 2.0;
pub const DEFAULT_PULSE_AMPLITUDE: f32 = 0.25;
pub const DEFAULT_EMISSIVE_BOOST: f32 = 1.5;

pub const DEFAULT_BURST_MIN: usize = 20;
pub const DEFAULT_BURST_MAX: usize = 30;

pub const DEFAULT_FIELD_OF_VIEW_DEG: f32 = 60.0;
pub const DEFAULT_REFRESH_MS: u64 = 16;

/// Top-level configuration structure for the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub analyser: AnalyserConfig,
    pub bands: BandSplit,
    pub prime: PrimeConfig,
    pub particles: ParticleConfig,
    pub render: RenderConfig,
}

impl EngineConfig {
    /// Parses a (possibly partial) JSON document and validates the result.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.analyser.bin_count.is_power_of_two() {
            return Err(VisualiserError::InvalidInput(
                "analyser bin count must be a power of two",
            ));
        }
        if !(0.0..1.0).contains(&self.analyser.smoothing) {
            return Err(VisualiserError::InvalidInput(
                "analyser smoothing must lie in [0, 1)",
            ));
        }
        if self.analyser.sample_rate == 0 {
            return Err(VisualiserError::InvalidInput("sample rate must be positive"));
        }
        self.bands.validate()?;
        if !(0.0..=1.0).contains(&self.prime.magnitude_threshold) {
            return Err(VisualiserError::InvalidInput(
                "prime threshold must lie in [0, 1]",
            ));
        }
        self.particles.validate()
    }
}

/// Configuration of the frequency analyser stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyserConfig {
    pub bin_count: usize,
    /// Temporal smoothing constant, forwarded to sources that support it.
    pub smoothing: f32,
    /// Sample rate assumed while no audio source is connected.
    pub sample_rate: u32,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            bin_count: DEFAULT_BIN_COUNT,
            smoothing: DEFAULT_SMOOTHING,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

/// Proportional split of the spectrum into the four named bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandSplit {
    pub bass: f32,
    pub mid_low: f32,
    pub mid_high: f32,
    pub treble: f32,
}

impl Default for BandSplit {
    fn default() -> Self {
        Self {
            bass: DEFAULT_BASS_FRACTION,
            mid_low: DEFAULT_MID_LOW_FRACTION,
            mid_high: DEFAULT_MID_HIGH_FRACTION,
            treble: DEFAULT_TREBLE_FRACTION,
        }
    }
}

impl BandSplit {
    pub fn fractions(&self) -> [f32; 4] {
        [self.bass, self.mid_low, self.mid_high, self.treble]
    }

    pub fn validate(&self) -> Result<()> {
        let fractions = self.fractions();
        if fractions.iter().any(|f| !f.is_finite() || *f < 0.0) {
            return Err(VisualiserError::InvalidInput(
                "band fractions must be finite and non-negative",
            ));
        }
        let total: f32 = fractions.iter().sum();
        if (total - 1.0).abs() > 1e-3 {
            return Err(VisualiserError::InvalidInput("band fractions must sum to 1"));
        }
        Ok(())
    }
}

/// Prime detection and prime-active pulse settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimeConfig {
    pub magnitude_threshold: f32,
    pub cooldown_ms: u64,
    pub min_frequency_hz: u32,
    pub active_window_ms: u64,
    pub pulse_hz: f32,
    pub pulse_amplitude: f32,
    pub emissive_boost: f32,
}

impl Default for PrimeConfig {
    fn default() -> Self {
        Self {
            magnitude_threshold: DEFAULT_PRIME_THRESHOLD,
            cooldown_ms: DEFAULT_PRIME_COOLDOWN_MS,
            min_frequency_hz: DEFAULT_MIN_AUDIBLE_HZ,
            active_window_ms: DEFAULT_PRIME_ACTIVE_MS,
            pulse_hz: DEFAULT_PULSE_HZ,
            pulse_amplitude: DEFAULT_PULSE_AMPLITUDE,
            emissive_boost: DEFAULT_EMISSIVE_BOOST,
        }
    }
}

impl PrimeConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn active_window(&self) -> Duration {
        Duration::from_millis(self.active_window_ms)
    }
}

/// Ranges for particles spawned by a prime burst. Speeds are scene units per
/// second and lifetimes are seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    pub burst: RangeInclusive<usize>,
    pub speed: RangeInclusive<f32>,
    pub radius: RangeInclusive<f32>,
    pub lifetime: RangeInclusive<f32>,
    /// Seed for the burst generator; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            burst: DEFAULT_BURST_MIN..=DEFAULT_BURST_MAX,
            speed: 0.6..=1.8,
            radius: 0.02..=0.06,
            lifetime: 1.0..=2.0,
            seed: None,
        }
    }
}

impl ParticleConfig {
    fn validate(&self) -> Result<()> {
        if self.burst.is_empty() || self.speed.is_empty() || self.radius.is_empty() {
            return Err(VisualiserError::InvalidInput("particle ranges must not be empty"));
        }
        if self.lifetime.is_empty() || *self.lifetime.start() <= 0.0 {
            return Err(VisualiserError::InvalidInput(
                "particle lifetime must be a positive range",
            ));
        }
        Ok(())
    }
}

/// Output-surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub view_mode: ViewMode,
    pub field_of_view_deg: f32,
    pub refresh_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            view_mode: ViewMode::Perspective,
            field_of_view_deg: DEFAULT_FIELD_OF_VIEW_DEG,
            refresh_ms: DEFAULT_REFRESH_MS,
        }
    }
}

impl RenderConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            EngineConfig::from_json_str(r#"{ "prime": { "cooldown_ms": 250 } }"#).unwrap();
        assert_eq!(config.prime.cooldown(), Duration::from_millis(250));
        assert_eq!(config.prime.magnitude_threshold, DEFAULT_PRIME_THRESHOLD);
        assert_eq!(config.analyser.bin_count, DEFAULT_BIN_COUNT);
    }

    #[test]
    fn rejects_non_power_of_two_bins() {
        let err = EngineConfig::from_json_str(r#"{ "analyser": { "bin_count": 1000 } }"#)
            .unwrap_err();
        assert!(format!("{err}").contains("power of two"));
    }

    #[test]
    fn rejects_band_split_that_does_not_cover_spectrum() {
        let err = EngineConfig::from_json_str(
            r#"{ "bands": { "bass": 0.5, "mid_low": 0.5, "mid_high": 0.5, "treble": 0.5 } }"#,
        )
        .unwrap_err();
        assert!(format!("{err}").contains("sum to 1"));
    }
}
