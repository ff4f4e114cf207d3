//! Band Layout and Band Gain Mapper
//!
//! A layout partitions the N transform bins into B contiguous bands. Each bin
//! belongs to exactly one band; the layout keeps a precomputed bin -> band
//! table so the mapper does one table lookup per bin on the audio thread.
//!
//! Bands are ranges in bin-index space, which is linear in frequency. Bins past
//! N/2 hold the negative-frequency mirror of the real input, so a real
//! sinusoid at bin `k` also lives at bin `N - k`.

use rustfft::num_complex::Complex32;

use crate::error::DspError;

/// A contiguous half-open range of bins `[lo, hi)` with one gain control
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Band {
    pub label: String,
    pub lo: usize,
    pub hi: usize,
}

impl Band {
    pub fn new(label: impl Into<String>, lo: usize, hi: usize) -> Self {
        Self {
            label: label.into(),
            lo,
            hi,
        }
    }

    /// Number of bins in this band
    pub fn width(&self) -> usize {
        self.hi.saturating_sub(self.lo)
    }

    #[inline]
    pub fn contains(&self, bin: usize) -> bool {
        (self.lo..self.hi).contains(&bin)
    }

    /// Frequencies (Hz) at the band's lower and upper bin edges
    ///
    /// Bin `i` of an N-point transform sits at `i * sample_rate / N`.
    pub fn frequency_range(&self, sample_rate: f32, block_size: usize) -> (f32, f32) {
        let bin_hz = sample_rate / block_size as f32;
        (self.lo as f32 * bin_hz, self.hi as f32 * bin_hz)
    }
}

/// Validated partition of `[0, N)` into bands
#[derive(Debug, Clone)]
pub struct BandLayout {
    block_size: usize,
    bands: Vec<Band>,
    /// Band index for every bin
    bin_to_band: Vec<usize>,
}

impl BandLayout {
    /// Split `block_size` bins into `count` equal-width bands
    ///
    /// When `block_size` is not divisible by `count`, the last band absorbs the
    /// remainder.
    pub fn linear(block_size: usize, count: usize) -> Result<Self, DspError> {
        if count == 0 || count > block_size {
            return Err(DspError::InvalidBandCount {
                bands: count,
                block_size,
            });
        }

        let width = block_size / count;
        let bands = (0..count)
            .map(|i| {
                let lo = i * width;
                let hi = if i + 1 == count { block_size } else { lo + width };
                Band::new(format!("Band {}", i), lo, hi)
            })
            .collect();

        Self::from_bands(block_size, bands)
    }

    /// Build a layout from explicit band boundaries
    ///
    /// Bands must be in order, non-empty, start at bin 0, end at `block_size`
    /// and leave no gap or overlap between neighbours.
    pub fn from_bands(block_size: usize, bands: Vec<Band>) -> Result<Self, DspError> {
        if block_size == 0 {
            return Err(DspError::InvalidBlockSize(block_size));
        }
        if bands.is_empty() {
            return Err(DspError::InvalidBandCount {
                bands: 0,
                block_size,
            });
        }

        let mut expected_lo = 0;
        for (i, band) in bands.iter().enumerate() {
            if band.lo != expected_lo {
                return Err(DspError::InvalidPartition(format!(
                    "band {} ('{}') starts at bin {}, expected bin {}",
                    i, band.label, band.lo, expected_lo
                )));
            }
            if band.hi <= band.lo {
                return Err(DspError::InvalidPartition(format!(
                    "band {} ('{}') is empty: [{}, {})",
                    i, band.label, band.lo, band.hi
                )));
            }
            expected_lo = band.hi;
        }
        if expected_lo != block_size {
            return Err(DspError::InvalidPartition(format!(
                "bands end at bin {}, expected bin {}",
                expected_lo, block_size
            )));
        }

        let mut bin_to_band = Vec::with_capacity(block_size);
        for (index, band) in bands.iter().enumerate() {
            bin_to_band.extend(std::iter::repeat(index).take(band.width()));
        }

        Ok(Self {
            block_size,
            bands,
            bin_to_band,
        })
    }

    /// Build a layout from `B + 1` ascending bin edges (`0 = e0 < e1 < ... = N`)
    pub fn from_edges(block_size: usize, edges: &[usize]) -> Result<Self, DspError> {
        if edges.len() < 2 {
            return Err(DspError::InvalidPartition(format!(
                "need at least 2 band edges, got {}",
                edges.len()
            )));
        }

        let bands = edges
            .windows(2)
            .enumerate()
            .map(|(i, pair)| Band::new(format!("Band {}", i), pair[0], pair[1]))
            .collect();
        Self::from_bands(block_size, bands)
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of bands B
    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn band(&self, index: usize) -> Option<&Band> {
        self.bands.get(index)
    }

    /// Band that owns `bin`, O(1)
    #[inline]
    pub fn band_of(&self, bin: usize) -> Option<usize> {
        self.bin_to_band.get(bin).copied()
    }

    /// Scale every bin of `frame` by the gain of its band
    ///
    /// Both real and imaginary parts are multiplied. Bins past the layout's
    /// size, or whose band has no entry in `gains`, are left untouched.
    ///
    /// # Real-time Safety
    /// No allocations, one table lookup per bin.
    #[inline]
    pub fn apply(&self, frame: &mut [Complex32], gains: &[f32]) {
        for (bin, &band) in frame.iter_mut().zip(&self.bin_to_band) {
            if let Some(&gain) = gains.get(band) {
                bin.re *= gain;
                bin.im *= gain;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers_exactly_once(layout: &BandLayout) {
        let n = layout.block_size();
        let total: usize = layout.bands().iter().map(Band::width).sum();
        assert_eq!(total, n);

        for bin in 0..n {
            let owners = layout.bands().iter().filter(|b| b.contains(bin)).count();
            assert_eq!(owners, 1, "bin {} owned by {} bands", bin, owners);
            let band = layout.band_of(bin).unwrap();
            assert!(layout.bands()[band].contains(bin));
        }
        assert_eq!(layout.band_of(n), None);
    }

    #[test]
    fn test_two_band_layout() {
        let layout = BandLayout::linear(8, 2).unwrap();
        assert_eq!(layout.bands()[0], Band::new("Band 0", 0, 4));
        assert_eq!(layout.bands()[1], Band::new("Band 1", 4, 8));
    }

    #[test]
    fn test_linear_coverage_for_many_counts() {
        for count in [1, 2, 3, 7, 10, 31, 64, 1000, 1024] {
            let layout = BandLayout::linear(1024, count).unwrap();
            assert_eq!(layout.len(), count);
            assert_covers_exactly_once(&layout);
        }
    }

    #[test]
    fn test_last_band_absorbs_remainder() {
        let layout = BandLayout::linear(10, 3).unwrap();
        let widths: Vec<usize> = layout.bands().iter().map(Band::width).collect();
        assert_eq!(widths, vec![3, 3, 4]);
        assert_eq!(layout.bands()[2].hi, 10);
    }

    #[test]
    fn test_invalid_band_counts() {
        assert!(matches!(
            BandLayout::linear(8, 0),
            Err(DspError::InvalidBandCount { bands: 0, .. })
        ));
        assert!(matches!(
            BandLayout::linear(8, 9),
            Err(DspError::InvalidBandCount { bands: 9, .. })
        ));
    }

    #[test]
    fn test_custom_partition() {
        let layout = BandLayout::from_edges(16, &[0, 1, 5, 16]).unwrap();
        assert_eq!(layout.len(), 3);
        assert_eq!(layout.band_of(0), Some(0));
        assert_eq!(layout.band_of(4), Some(1));
        assert_eq!(layout.band_of(15), Some(2));
        assert_covers_exactly_once(&layout);
    }

    #[test]
    fn test_partition_with_gap_is_rejected() {
        let bands = vec![Band::new("low", 0, 4), Band::new("high", 5, 8)];
        assert!(matches!(
            BandLayout::from_bands(8, bands),
            Err(DspError::InvalidPartition(_))
        ));
    }

    #[test]
    fn test_partition_with_overlap_is_rejected() {
        let bands = vec![Band::new("low", 0, 5), Band::new("high", 4, 8)];
        assert!(BandLayout::from_bands(8, bands).is_err());
    }

    #[test]
    fn test_partition_short_of_block_is_rejected() {
        assert!(BandLayout::from_edges(8, &[0, 4, 7]).is_err());
        assert!(BandLayout::from_edges(8, &[1, 4, 8]).is_err());
        assert!(BandLayout::from_edges(8, &[0, 4, 4, 8]).is_err());
        assert!(BandLayout::from_edges(8, &[0]).is_err());
    }

    #[test]
    fn test_apply_scales_real_and_imaginary() {
        let layout = BandLayout::linear(4, 2).unwrap();
        let mut frame = vec![Complex32::new(1.0, -2.0); 4];

        layout.apply(&mut frame, &[2.0, 0.0]);

        assert_eq!(frame[0], Complex32::new(2.0, -4.0));
        assert_eq!(frame[1], Complex32::new(2.0, -4.0));
        assert_eq!(frame[2], Complex32::new(0.0, 0.0));
        assert_eq!(frame[3], Complex32::new(0.0, 0.0));
    }

    #[test]
    fn test_unity_gain_is_exact_no_op() {
        let layout = BandLayout::linear(16, 4).unwrap();
        let original: Vec<Complex32> = (0..16)
            .map(|i| Complex32::new(i as f32 * 0.37, -(i as f32) * 1.1))
            .collect();
        let mut frame = original.clone();

        layout.apply(&mut frame, &[1.0; 4]);
        assert_eq!(frame, original);
    }

    #[test]
    fn test_apply_with_short_inputs_does_not_panic() {
        let layout = BandLayout::linear(8, 2).unwrap();

        let mut short_frame = vec![Complex32::new(1.0, 1.0); 3];
        layout.apply(&mut short_frame, &[3.0, 3.0]);
        assert_eq!(short_frame[2], Complex32::new(3.0, 3.0));

        // Missing gain entry leaves the band untouched
        let mut frame = vec![Complex32::new(1.0, 0.0); 8];
        layout.apply(&mut frame, &[2.0]);
        assert_eq!(frame[0].re, 2.0);
        assert_eq!(frame[7].re, 1.0);
    }

    #[test]
    fn test_frequency_range() {
        let layout = BandLayout::linear(1024, 4).unwrap();
        let (lo, hi) = layout.bands()[0].frequency_range(44100.0, 1024);
        assert_eq!(lo, 0.0);
        assert!((hi - 11025.0).abs() < 0.01);
    }
}
