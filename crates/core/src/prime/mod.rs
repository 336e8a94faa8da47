use std::{collections::HashMap, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::PrimeConfig;

/// Emitted when the dominant frequency of a tick is prime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DominantFrequencyEvent {
    pub frequency_hz: u32,
    pub is_prime: bool,
    /// Engine time at which the event fired.
    pub timestamp: Duration,
    /// Bin the frequency was derived from.
    pub bin: usize,
}

/// Dominant bin of a spectrum mapped to an integer frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DominantFrequency {
    pub bin: usize,
    pub magnitude: f32,
    pub frequency_hz: u32,
}

/// Maps a bin index to its approximate frequency:
/// `round(index * sample_rate / (2 * bin_count))`.
pub fn bin_frequency(index: usize, sample_rate: u32, bin_count: usize) -> u32 {
    if bin_count == 0 {
        return 0;
    }
    let hz = index as f64 * sample_rate as f64 / (2.0 * bin_count as f64);
    hz.round() as u32
}

/// Index and magnitude of the loudest bin. Ties keep the lowest index.
pub fn dominant_bin(spectrum: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &magnitude) in spectrum.iter().enumerate() {
        if !magnitude.is_finite() {
            continue;
        }
        match best {
            Some((_, current)) if magnitude <= current => {}
            _ => best = Some((index, magnitude)),
        }
    }
    best
}

/// Trial division up to `sqrt(n)`.
pub fn is_prime(n: u32) -> bool {
    if n < 2 {
        return false;
    }
    if n < 4 {
        return true;
    }
    if n % 2 == 0 {
        return false;
    }
    let n = n as u64;
    let mut divisor = 3u64;
    while divisor * divisor <= n {
        if n % divisor == 0 {
            return false;
        }
        divisor += 2;
    }
    true
}

/// Primality test memoised per owner. Each detector keeps its own cache so
/// independent visualiser instances never share state.
#[derive(Debug, Default, Clone)]
pub struct PrimeCache {
    known: HashMap<u32, bool>,
}

impl PrimeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_prime(&mut self, n: u32) -> bool {
        *self.known.entry(n).or_insert_with(|| is_prime(n))
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

/// Finds the dominant frequency each tick and debounces prime events.
#[derive(Debug)]
pub struct PrimeDetector {
    threshold: f32,
    min_frequency_hz: u32,
    cooldown: Duration,
    cache: PrimeCache,
    last_event: Option<(u32, Duration)>,
    last_dominant: Option<DominantFrequency>,
}

impl PrimeDetector {
    pub fn new(config: &PrimeConfig) -> Self {
        Self {
            threshold: config.magnitude_threshold,
            min_frequency_hz: config.min_frequency_hz,
            cooldown: config.cooldown(),
            cache: PrimeCache::new(),
            last_event: None,
            last_dominant: None,
        }
    }

    /// Dominant frequency seen on the last tick, if it passed the audibility
    /// and magnitude gates.
    pub fn last_dominant(&self) -> Option<DominantFrequency> {
        self.last_dominant
    }

    pub fn cache(&self) -> &PrimeCache {
        &self.cache
    }

    pub fn reset(&mut self) {
        self.last_event = None;
        self.last_dominant = None;
    }

    /// Runs detection on one spectrum. Returns an event when the dominant
    /// frequency is prime and not suppressed by the cooldown.
    pub fn detect(
        &mut self,
        spectrum: &[f32],
        sample_rate: u32,
        now: Duration,
    ) -> Option<DominantFrequencyEvent> {
        self.last_dominant = None;

        let (bin, magnitude) = dominant_bin(spectrum)?;
        if magnitude < self.threshold || magnitude <= 0.0 {
            return None;
        }

        let frequency_hz = bin_frequency(bin, sample_rate, spectrum.len());
        if frequency_hz <= self.min_frequency_hz {
            return None;
        }

        self.last_dominant = Some(DominantFrequency {
            bin,
            magnitude,
            frequency_hz,
        });

        if !self.cache.is_prime(frequency_hz) {
            return None;
        }

        let allowed = match self.last_event {
            None => true,
            Some((last_hz, at)) => {
                last_hz != frequency_hz || now.saturating_sub(at) >= self.cooldown
            }
        };
        if !allowed {
            debug!(frequency_hz, "prime suppressed by cooldown");
            return None;
        }

        self.last_event = Some((frequency_hz, now));
        info!(frequency_hz, bin, "prime frequency detected");
        Some(DominantFrequencyEvent {
            frequency_hz,
            is_prime: true,
            timestamp: now,
            bin,
        })
    }
}

/// Snapshot of the prime-active pulse for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimePulse {
    pub frequency_hz: u32,
    /// Remaining strength, 1 at trigger time falling linearly to 0.
    pub strength: f32,
    /// Seconds since the trigger.
    pub elapsed: f32,
}

/// Time-bounded visual state entered on every prime event.
#[derive(Debug, Clone)]
pub struct PrimeActiveState {
    window: Duration,
    triggered: Option<(u32, Duration)>,
}

impl PrimeActiveState {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            triggered: None,
        }
    }

    pub fn trigger(&mut self, event: &DominantFrequencyEvent) {
        self.triggered = Some((event.frequency_hz, event.timestamp));
    }

    pub fn clear(&mut self) {
        self.triggered = None;
    }

    /// Current pulse, or `None` once the window has elapsed.
    pub fn pulse(&mut self, now: Duration) -> Option<PrimePulse> {
        let (frequency_hz, at) = self.triggered?;
        let elapsed = now.saturating_sub(at);
        if elapsed >= self.window || self.window.is_zero() {
            self.triggered = None;
            return None;
        }
        let strength = 1.0 - elapsed.as_secs_f32() / self.window.as_secs_f32();
        Some(PrimePulse {
            frequency_hz,
            strength: strength.clamp(0.0, 1.0),
            elapsed: elapsed.as_secs_f32(),
        })
    }

    pub fn is_active(&self, now: Duration) -> bool {
        self.triggered
            .map(|(_, at)| now.saturating_sub(at) < self.window)
            .unwrap_or(false)
    }
}
