//! # Accumulators
//!
//! Where an [`crate::observable::Observable`] is a single measurement, an
//! accumulator folds a stream of measurements into a running statistic
//! without the engine ever holding the full measurement history in memory
//! (unless the statistic genuinely needs it, as jackknife/bootstrap do)
//! (§4.D).
//!
//! - [`MeanVarianceAccumulator`]: running mean and sample variance, O(1) per
//!   measurement, O(1) memory.
//! - [`HistogramAccumulator`]: a histogram over measured values, with
//!   [`HistogramAccumulator::normalized_histogram`] producing a probability
//!   mass function.
//! - [`JackknifeAccumulator`] / [`BootstrapAccumulator`]: resampling error
//!   estimators that need the full measurement history.
//! - [`FileAccumulator`]: a bounded in-memory cache that spills to disk once
//!   full, for measurement streams too long to hold in memory at all.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;

use serde::Serialize;

use crate::histogram::{HistKey, Histogram};
use crate::observable::{Observable, ObservableArray, ObservableVec};

/// A sink a measurement stream can be pushed into, independent of which
/// concrete accumulator is listening.
///
/// Lets [`crate::metropolis::Metropolis::run_with_accumulator`] and similar
/// entry points stay generic over "some accumulator for `Obs`" rather than
/// hard-coding [`MeanVarianceAccumulator`].
pub trait Record<Obs> {
    /// Folds one more measurement in.
    fn record(&mut self, value: Obs);
}

impl<O: SquareObservable> Record<O> for MeanVarianceAccumulator<O> {
    fn record(&mut self, value: O) {
        self.add_value(&value);
    }
}

impl<O: Observable> Record<O> for JackknifeAccumulator<O> {
    fn record(&mut self, value: O) {
        self.add_value(value);
    }
}

impl<O: Observable> Record<O> for BootstrapAccumulator<O> {
    fn record(&mut self, value: O) {
        self.add_value(value);
    }
}

impl<K: HistKey> Record<K> for HistogramAccumulator<K> {
    fn record(&mut self, value: K) {
        self.add_value(value);
    }
}

impl<O: Serialize> Record<O> for FileAccumulator<O> {
    fn record(&mut self, value: O) {
        if let Err(e) = self.add_value(value) {
            log::error!("FileAccumulator failed to record a measurement: {e}");
        }
    }
}

/// An [`Observable`] that additionally supports component-wise self
/// multiplication, needed for second-moment (variance) accumulation.
///
/// Implemented for the `f64`-backed observable shapes; not every observable
/// (e.g. [`crate::observable::HistogramObservable`]) has a meaningful square.
pub trait SquareObservable: Observable {
    /// The component-wise square of `self`.
    fn component_square(&self) -> Self;
}

impl SquareObservable for f64 {
    fn component_square(&self) -> Self {
        self * self
    }
}

impl<const N: usize> SquareObservable for ObservableArray<f64, N> {
    fn component_square(&self) -> Self {
        let mut out = [0.0; N];
        for i in 0..N {
            out[i] = self.0[i] * self.0[i];
        }
        ObservableArray(out)
    }
}

impl SquareObservable for ObservableVec<f64> {
    fn component_square(&self) -> Self {
        ObservableVec(self.0.iter().map(|x| x * x).collect())
    }
}

/// Running mean and sample variance of a stream of measurements, computed in
/// constant memory via the standard two-accumulator (sum, sum of squares)
/// formulation.
#[derive(Debug, Clone)]
pub struct MeanVarianceAccumulator<O: SquareObservable> {
    count: u64,
    sum: O,
    sum_sq: O,
}

impl<O: SquareObservable> MeanVarianceAccumulator<O> {
    /// Creates an empty accumulator, shaped like `zero` (for variable-arity
    /// observables, `zero` fixes the length every later `add_value` must
    /// match).
    pub fn new(zero: O) -> Self {
        Self {
            count: 0,
            sum: zero.clone(),
            sum_sq: zero,
        }
    }

    /// Folds one more measurement in.
    pub fn add_value(&mut self, value: &O) {
        self.sum = self
            .sum
            .checked_add(value)
            .expect("observable shape must match the accumulator's zero element");
        self.sum_sq = self
            .sum_sq
            .checked_add(&value.component_square())
            .expect("observable shape must match the accumulator's zero element");
        self.count += 1;
    }

    /// Number of measurements folded in so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// The running mean. Panics if no measurement has been added yet.
    pub fn mean(&self) -> O {
        assert!(self.count > 0, "mean of an empty accumulator is undefined");
        self.sum.divided(self.count as f64)
    }

    /// The Bessel-corrected (unbiased) sample variance. Panics with fewer
    /// than two measurements.
    pub fn variance(&self) -> O
    where
        O: SquareObservable,
    {
        assert!(
            self.count > 1,
            "variance needs at least two measurements"
        );
        let n = self.count as f64;
        let mean = self.mean();
        let mean_sq = mean.component_square();
        let biased = self
            .sum_sq
            .divided(n)
            .checked_sub(&mean_sq)
            .expect("shapes already matched by construction");
        biased.scaled(n / (n - 1.0))
    }
}

/// A histogram of how often a stream of measured keys fell into each bin,
/// with the running sample count kept separately so [`Self::normalized_histogram`]
/// can divide out an exact probability mass function.
#[derive(Debug, Clone)]
pub struct HistogramAccumulator<K: HistKey> {
    counts: Histogram<K, u64>,
    total: u64,
}

impl<K: HistKey> HistogramAccumulator<K> {
    /// Creates an accumulator over a discrete key space.
    pub fn discrete() -> Self {
        Self {
            counts: Histogram::discrete(),
            total: 0,
        }
    }

    /// Creates an accumulator over a binned key space.
    pub fn binned(width: K, reference: K) -> Result<Self, crate::error::HistogramError> {
        Ok(Self {
            counts: Histogram::binned(width, reference)?,
            total: 0,
        })
    }

    /// Records one more observation of `key`.
    pub fn add_value(&mut self, key: K) {
        self.counts.add(key, 1);
        self.total += 1;
    }

    /// Raw visit counts per bin.
    pub fn counts(&self) -> &Histogram<K, u64> {
        &self.counts
    }

    /// The histogram normalized so its bin values sum to `1.0`: a probability
    /// mass function over the observed keys.
    pub fn normalized_histogram(&self) -> Histogram<K, f64> {
        let binning = self.counts.binning();
        let mut normalized = match binning {
            crate::histogram::Binning::Discrete => Histogram::discrete(),
            crate::histogram::Binning::Binned { width, reference } => {
                Histogram::binned(width, reference).expect("width already validated")
            }
        };
        let total = self.total as f64;
        for (k, count) in self.counts.iter() {
            normalized.set(k, *count as f64 / total);
        }
        normalized
    }
}

/// A resampling error estimator that retains every measurement, so it can
/// recompute the statistic with each measurement left out in turn.
#[derive(Debug, Clone)]
pub struct JackknifeAccumulator<O: Observable> {
    values: Vec<O>,
}

impl<O: Observable> JackknifeAccumulator<O> {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Records one more measurement.
    pub fn add_value(&mut self, value: O) {
        self.values.push(value);
    }

    /// Number of measurements recorded so far.
    pub fn count(&self) -> usize {
        self.values.len()
    }

    /// The ordinary mean over all measurements.
    pub fn mean(&self) -> O {
        assert!(!self.values.is_empty(), "mean of an empty accumulator is undefined");
        let n = self.values.len() as f64;
        let mut sum = self.values[0].zero_like();
        for v in &self.values {
            sum = sum.checked_add(v).expect("accumulated observables must share a shape");
        }
        sum.divided(n)
    }

    /// The `n` leave-one-out means, one per measurement excluded.
    pub fn leave_one_out_means(&self) -> Vec<O> {
        let n = self.values.len();
        assert!(n > 1, "jackknife needs at least two measurements");
        let total = self.values.iter().skip(1).fold(self.values[0].clone(), |acc, v| {
            acc.checked_add(v).expect("accumulated observables must share a shape")
        });
        (0..n)
            .map(|i| {
                let without_i = total
                    .checked_sub(&self.values[i])
                    .expect("accumulated observables must share a shape");
                without_i.divided((n - 1) as f64)
            })
            .collect()
    }

    /// The jackknife standard error of the mean, for scalar observables.
    pub fn standard_error(&self) -> f64
    where
        O: Into<f64> + Clone,
    {
        let n = self.values.len();
        assert!(n > 1, "jackknife needs at least two measurements");
        let loo = self.leave_one_out_means();
        let loo_values: Vec<f64> = loo.into_iter().map(Into::into).collect();
        let loo_mean = loo_values.iter().sum::<f64>() / n as f64;
        let sum_sq_dev: f64 = loo_values.iter().map(|v| (v - loo_mean).powi(2)).sum();
        ((n - 1) as f64 / n as f64 * sum_sq_dev).sqrt()
    }
}

impl<O: Observable> Default for JackknifeAccumulator<O> {
    fn default() -> Self {
        Self::new()
    }
}

/// A resampling error estimator using drawn-with-replacement bootstrap
/// samples rather than jackknife's leave-one-out scheme.
#[derive(Debug, Clone)]
pub struct BootstrapAccumulator<O: Observable> {
    values: Vec<O>,
}

impl<O: Observable> BootstrapAccumulator<O> {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Records one more measurement.
    pub fn add_value(&mut self, value: O) {
        self.values.push(value);
    }

    /// Number of measurements recorded so far.
    pub fn count(&self) -> usize {
        self.values.len()
    }

    /// Draws `sample_count` bootstrap resamples (each the size of the
    /// original data set, drawn with replacement) and returns their means.
    pub fn bootstrap_means<R: rand::RngCore>(&self, sample_count: usize, rng: &mut R) -> Vec<O> {
        let n = self.values.len();
        assert!(n > 0, "bootstrap needs at least one measurement");
        use rand::Rng;
        (0..sample_count)
            .map(|_| {
                let mut sum = self.values[0].zero_like();
                for _ in 0..n {
                    let idx = rng.random_range(0..n);
                    sum = sum
                        .checked_add(&self.values[idx])
                        .expect("accumulated observables must share a shape");
                }
                sum.divided(n as f64)
            })
            .collect()
    }

    /// The bootstrap standard error of the mean, for scalar observables.
    pub fn standard_error<R: rand::RngCore>(&self, sample_count: usize, rng: &mut R) -> f64
    where
        O: Into<f64> + Clone,
    {
        let means: Vec<f64> = self
            .bootstrap_means(sample_count, rng)
            .into_iter()
            .map(Into::into)
            .collect();
        let mean = means.iter().sum::<f64>() / means.len() as f64;
        let var = means.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (means.len() - 1) as f64;
        var.sqrt()
    }
}

impl<O: Observable> Default for BootstrapAccumulator<O> {
    fn default() -> Self {
        Self::new()
    }
}

/// An accumulator that caches measurements in memory up to `cache_size`, then
/// appends the cached batch to a file as newline-delimited JSON and clears
/// the cache, so a measurement stream that would not fit in memory can still
/// be recorded in full.
///
/// Any measurements still cached when the accumulator is dropped are flushed
/// to disk on drop; a flush failure at drop time is logged rather than
/// panicking, since a destructor cannot propagate an error.
pub struct FileAccumulator<O: Serialize> {
    path: PathBuf,
    cache: Vec<O>,
    cache_size: usize,
}

impl<O: Serialize> FileAccumulator<O> {
    /// Creates an accumulator that flushes to `path` every `cache_size`
    /// measurements.
    pub fn new(path: impl Into<PathBuf>, cache_size: usize) -> Self {
        assert!(cache_size > 0, "cache_size must be positive");
        Self {
            path: path.into(),
            cache: Vec::with_capacity(cache_size),
            cache_size,
        }
    }

    /// Records one more measurement, flushing to disk if the cache is full.
    pub fn add_value(&mut self, value: O) -> io::Result<()> {
        self.cache.push(value);
        if self.cache.len() >= self.cache_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Appends every currently cached measurement to the file and empties
    /// the cache.
    pub fn flush(&mut self) -> io::Result<()> {
        if self.cache.is_empty() {
            return Ok(());
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        for value in &self.cache {
            let line = serde_json::to_string(value)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            writeln!(file, "{line}")?;
        }
        self.cache.clear();
        Ok(())
    }
}

impl<O: Serialize> Drop for FileAccumulator<O> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            log::error!("FileAccumulator failed to flush on drop: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn mean_variance_tracks_scalar_stream() {
        let mut acc = MeanVarianceAccumulator::new(0.0_f64);
        for v in [1.0, 2.0, 3.0, 4.0] {
            acc.add_value(&v);
        }
        assert_eq!(acc.mean(), 2.5);
        assert!((acc.variance() - 1.6666666666666667).abs() < 1e-12);
    }

    #[test]
    fn histogram_accumulator_normalizes_to_one() {
        let mut acc: HistogramAccumulator<i64> = HistogramAccumulator::discrete();
        for v in [0, 0, 1, 1, 2] {
            acc.add_value(v);
        }
        let normalized = acc.normalized_histogram();
        let total: f64 = normalized.iter().map(|(_, v)| *v).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!((*normalized.get(0).unwrap() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn jackknife_mean_matches_plain_mean() {
        let mut acc = JackknifeAccumulator::new();
        for v in [1.0_f64, 2.0, 3.0, 4.0, 5.0] {
            acc.add_value(v);
        }
        assert_eq!(acc.mean(), 3.0);
        assert!(acc.standard_error() > 0.0);
    }

    #[test]
    fn bootstrap_standard_error_is_nonnegative() {
        let mut acc = BootstrapAccumulator::new();
        for v in [1.0_f64, 1.0, 1.0, 1.0] {
            acc.add_value(v);
        }
        let mut rng = crate::rng::seeded(0);
        let se = acc.standard_error(50, &mut rng);
        assert!(se >= 0.0);
    }

    #[test]
    fn file_accumulator_flushes_at_cache_size_and_on_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("measurements.jsonl");
        {
            let mut acc = FileAccumulator::new(&path, 2);
            acc.add_value(1.0_f64).unwrap();
            acc.add_value(2.0_f64).unwrap();
            assert!(path.exists());
            acc.add_value(3.0_f64).unwrap();
        }
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 3);
    }
}
