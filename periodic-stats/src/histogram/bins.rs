use crate::Error;

/// A regular binning axis, covering `[min, max)` with `n_bins` bins of the
/// same width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinAxis {
    n_bins: usize,
    min: f64,
    max: f64,
}

impl BinAxis {
    /// Create a new axis with `n_bins` bins between `min` and `max`
    pub fn new(n_bins: usize, min: f64, max: f64) -> Result<BinAxis, Error> {
        if n_bins == 0 {
            return Err(Error::InvalidParameter("the number of bins must be at least 1".into()));
        }

        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(Error::InvalidParameter(format!(
                "invalid bins range: min ({}) must be smaller than max ({})", min, max
            )));
        }

        Ok(BinAxis { n_bins, min, max })
    }

    /// Number of bins in this axis
    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    /// Lower bound of the first bin
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Upper bound of the last bin
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Width of every bin
    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.n_bins as f64
    }

    /// Get the bin containing `value`, or `None` if `value` is outside of
    /// this axis
    #[inline]
    pub fn bin(&self, value: f64) -> Option<usize> {
        if !(value >= self.min && value < self.max) {
            return None;
        }

        let bin = ((value - self.min) / self.bin_width()) as usize;
        // rounding can push values just below `max` in the next bin
        Some(usize::min(bin, self.n_bins - 1))
    }

    /// Get the `n_bins + 1` edges of the bins
    pub fn bin_edges(&self) -> Vec<f64> {
        let width = self.bin_width();
        (0..=self.n_bins).map(|i| self.min + i as f64 * width).collect()
    }

    /// Get the center of every bin
    pub fn bin_centers(&self) -> Vec<f64> {
        let width = self.bin_width();
        (0..self.n_bins).map(|i| self.min + (i as f64 + 0.5) * width).collect()
    }
}
