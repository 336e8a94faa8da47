use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::config::BandSplit;

/// Mean normalized magnitude of the four named bands, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BandEnergy {
    pub bass: f32,
    pub mid_low: f32,
    pub mid_high: f32,
    pub treble: f32,
}

impl BandEnergy {
    pub const SILENT: Self = Self {
        bass: 0.0,
        mid_low: 0.0,
        mid_high: 0.0,
        treble: 0.0,
    };

    pub fn as_array(&self) -> [f32; 4] {
        [self.bass, self.mid_low, self.mid_high, self.treble]
    }
}

/// Reduces a spectrum to [`BandEnergy`] using contiguous proportional ranges.
#[derive(Debug, Clone)]
pub struct BandEnergyExtractor {
    split: BandSplit,
    cached_len: usize,
    ranges: [Range<usize>; 4],
}

impl BandEnergyExtractor {
    pub fn new(split: BandSplit) -> Self {
        Self {
            split,
            cached_len: 0,
            ranges: [0..0, 0..0, 0..0, 0..0],
        }
    }

    /// Bin ranges for a spectrum of `len` bins. The ranges are contiguous,
    /// start at 0 and end at `len`; a range may be empty when `len` is small.
    pub fn ranges(split: &BandSplit, len: usize) -> [Range<usize>; 4] {
        let fractions = split.fractions();
        let mut cumulative = 0.0_f32;
        let mut bounds = [0usize; 5];
        for (i, fraction) in fractions.iter().enumerate() {
            cumulative += fraction;
            let edge = (cumulative * len as f32).round() as usize;
            bounds[i + 1] = edge.clamp(bounds[i], len);
        }
        bounds[4] = len;

        [
            bounds[0]..bounds[1],
            bounds[1]..bounds[2],
            bounds[2]..bounds[3],
            bounds[3]..bounds[4],
        ]
    }

    pub fn extract(&mut self, spectrum: &[f32]) -> BandEnergy {
        if spectrum.len() != self.cached_len {
            self.ranges = Self::ranges(&self.split, spectrum.len());
            self.cached_len = spectrum.len();
        }

        let [bass, mid_low, mid_high, treble] =
            self.ranges.clone().map(|range| mean(&spectrum[range]));
        BandEnergy {
            bass,
            mid_low,
            mid_high,
            treble,
        }
    }
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: f32 = values
        .iter()
        .map(|v| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 })
        .sum();
    (sum / values.len() as f32).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_split_matches_documented_percentages() {
        let ranges = BandEnergyExtractor::ranges(&BandSplit::default(), 1000);
        assert_eq!(ranges, [0..100, 100..300, 300..600, 600..1000]);
    }

    #[test]
    fn averages_each_range() {
        let mut spectrum = vec![0.0; 10];
        spectrum[0] = 1.0;
        spectrum[9] = 0.8;
        let mut extractor = BandEnergyExtractor::new(BandSplit::default());
        let bands = extractor.extract(&spectrum);
        assert_eq!(bands.bass, 1.0);
        assert_eq!(bands.mid_low, 0.0);
        assert!((bands.treble - 0.2).abs() < 1e-6);
    }

    #[test]
    fn tiny_spectrum_yields_zero_for_empty_ranges() {
        let mut extractor = BandEnergyExtractor::new(BandSplit::default());
        let bands = extractor.extract(&[1.0, 1.0]);
        // Two bins split as [0..0, 0..1, 1..1, 1..2].
        assert_eq!(bands.bass, 0.0);
        assert_eq!(bands.mid_high, 0.0);
        assert!(bands.as_array().iter().all(|b| (0.0..=1.0).contains(b)));

        let empty = extractor.extract(&[]);
        assert_eq!(empty, BandEnergy::SILENT);
    }

    proptest! {
        #[test]
        fn ranges_partition_the_spectrum(len in 0usize..5000) {
            let ranges = BandEnergyExtractor::ranges(&BandSplit::default(), len);
            prop_assert_eq!(ranges[0].start, 0);
            prop_assert_eq!(ranges[3].end, len);
            for pair in ranges.windows(2) {
                prop_assert_eq!(pair[0].end, pair[1].start);
            }
            let covered: usize = ranges.iter().map(|r| r.len()).sum();
            prop_assert_eq!(covered, len);
        }

        #[test]
        fn energies_stay_normalized(values in proptest::collection::vec(-2.0f32..2.0, 0..512)) {
            let mut extractor = BandEnergyExtractor::new(BandSplit::default());
            let bands = extractor.extract(&values);
            for band in bands.as_array() {
                prop_assert!((0.0..=1.0).contains(&band));
            }
        }
    }
}
