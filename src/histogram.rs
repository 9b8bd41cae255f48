//! # Histogram family
//!
//! A single [`Histogram`] type implements both variants the core needs
//! (§3): a *discrete* histogram (`Histocrete`, keyed directly, no bin
//! collapsing) and a *binned* histogram (keyed through a `(width,
//! reference)` binning rule). Composition over inheritance (§9 Design Note):
//! the binning rule is a plain [`Binning`] value rather than a base-class
//! hierarchy.
//!
//! The same type doubles as the DOS histogram (`Histogram<K, f64>` storing
//! `log g(E)`) and the incidence histogram (`Histogram<K, u64>` storing
//! visit counts) that the Wang-Landau engine maintains — there is no
//! separate DOS/incidence type, just a different choice of `V`.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};

use crate::error::HistogramError;

/// How a histogram collapses incoming keys onto bins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Binning<K> {
    /// No collapsing: every distinct key is its own bin.
    Discrete,
    /// Keys are floored onto `reference + floor((key - reference) / width) * width`.
    Binned {
        /// Width of one bin.
        width: K,
        /// Reference point the binning grid is anchored to.
        reference: K,
    },
}

/// A key usable in a [`Histogram`]: orderable, convertible to and from
/// `f64` (binning arithmetic is done in `f64` space), and textually
/// round-trippable for CSV I/O.
///
/// The `f64` round trip goes through [`Self::to_f64`]/[`Self::from_f64`]
/// rather than `Into<f64>`/`From<f64>`: the standard library only provides
/// lossless widening conversions into `f64` for the narrower integer types,
/// and none at all back out of it, so `u64`/`i64`/`usize` keys (needed for
/// the incidence histograms the engines maintain) could never satisfy those
/// traits. The cast is exact for any key magnitude binning arithmetic
/// actually produces; keys near the edge of `f64`'s 53-bit mantissa are
/// outside what this crate's binning is meant to support.
pub trait HistKey:
    Copy + Clone + PartialOrd + PartialEq + std::fmt::Display + std::str::FromStr
{
    /// This key's `f64` image, used for binning arithmetic and ordering.
    fn to_f64(self) -> f64;
    /// Reconstructs a key from an `f64` image produced by [`Self::to_f64`].
    fn from_f64(v: f64) -> Self;
}
macro_rules! impl_histkey {
    ($($t:ty),*) => {
        $(impl HistKey for $t {
            fn to_f64(self) -> f64 {
                self as f64
            }
            fn from_f64(v: f64) -> Self {
                v as $t
            }
        })*
    };
}
impl_histkey!(f64, i64, i32, u64, u32, usize);

/// A value usable as the y-type of a [`Histogram`]: accumulable in place,
/// comparable to zero, NaN-aware (NaN entries are preserved verbatim and
/// never folded into a sum), and textually round-trippable.
///
/// See [`HistKey`] for why the `f64` conversion is a dedicated method
/// rather than `Into<f64>`/`From<f64>`.
pub trait HistValue:
    Copy
    + Clone
    + Default
    + PartialOrd
    + PartialEq
    + std::ops::AddAssign
    + std::ops::SubAssign
    + std::fmt::Display
    + std::str::FromStr
{
    /// Whether this value is NaN. Always `false` for integer value types.
    fn is_nan_value(&self) -> bool {
        false
    }

    /// This value's `f64` image, used by [`Histogram::flatness`].
    fn to_f64(self) -> f64;
}

impl HistValue for f64 {
    fn is_nan_value(&self) -> bool {
        f64::is_nan(*self)
    }
    fn to_f64(self) -> f64 {
        self
    }
}
impl HistValue for u64 {
    fn to_f64(self) -> f64 {
        self as f64
    }
}
impl HistValue for i64 {
    fn to_f64(self) -> f64 {
        self as f64
    }
}

/// A key that totally orders by its `f64` image, panicking on NaN.
///
/// Bin keys are physical quantities (energies, order parameters) and are
/// never expected to be NaN; a NaN key indicates a modelling bug upstream,
/// so this fails loudly rather than silently breaking the map's ordering
/// invariant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
struct OrderedKey(f64);

impl PartialEq for OrderedKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for OrderedKey {}
impl PartialOrd for OrderedKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for OrderedKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .partial_cmp(&other.0)
            .expect("histogram bin key must not be NaN")
    }
}

/// A discrete-or-binned histogram mapping keys of type `K` to accumulated
/// values of type `V`.
///
/// Keys are stored internally by their `f64` image in a [`BTreeMap`] so that
/// iteration is always in key order (§3), and reconstructed as `K` on
/// output. Binned histograms auto-create a zero bin on first *write*
/// (`get_or_insert`/`add`); plain reads via [`Self::get`] never insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Histogram<K, V> {
    binning: Binning<K>,
    values: BTreeMap<OrderedKey, V>,
}

impl<K: HistKey, V: HistValue> Histogram<K, V> {
    /// Creates an empty discrete histogram (`Histocrete`): every key is its
    /// own bin.
    pub fn discrete() -> Self {
        Self {
            binning: Binning::Discrete,
            values: BTreeMap::new(),
        }
    }

    /// Creates an empty binned histogram with the given bin `width` and
    /// `reference` point.
    ///
    /// # Errors
    /// Returns [`HistogramError::InvalidWidth`] if `width <= 0`.
    pub fn binned(width: K, reference: K) -> Result<Self, HistogramError> {
        let w: f64 = width.to_f64();
        if !(w > 0.0) {
            return Err(HistogramError::InvalidWidth(w));
        }
        Ok(Self {
            binning: Binning::Binned { width, reference },
            values: BTreeMap::new(),
        })
    }

    /// The binning rule this histogram uses.
    pub fn binning(&self) -> Binning<K> {
        self.binning
    }

    /// Applies this histogram's binning rule to `key`, returning the bin key
    /// that would actually be stored.
    pub fn bin_of(&self, key: K) -> K {
        match self.binning {
            Binning::Discrete => key,
            Binning::Binned { width, reference } => {
                let w: f64 = width.to_f64();
                let r: f64 = reference.to_f64();
                let k: f64 = key.to_f64();
                K::from_f64(r + ((k - r) / w).floor() * w)
            }
        }
    }

    /// Reads the value stored at `key`'s bin, without creating it.
    ///
    /// A binned histogram applies its binning rule first; a read never
    /// auto-creates the zero bin (only mutation does, per §3).
    pub fn get(&self, key: K) -> Option<&V> {
        let bin = self.bin_of(key);
        self.values.get(&OrderedKey(bin.to_f64()))
    }

    /// Returns a mutable reference to the bin for `key`, inserting a
    /// `V::default()` zero bin first if it did not already exist.
    pub fn entry(&mut self, key: K) -> &mut V {
        let bin = self.bin_of(key);
        self.values
            .entry(OrderedKey(bin.to_f64()))
            .or_insert_with(V::default)
    }

    /// Adds `delta` into the bin for `key`, creating the bin at zero first
    /// if necessary.
    pub fn add(&mut self, key: K, delta: V) {
        *self.entry(key) += delta;
    }

    /// Directly sets the bin for `key` to `value`, creating it if necessary.
    pub fn set(&mut self, key: K, value: V) {
        let bin = self.bin_of(key);
        self.values.insert(OrderedKey(bin.to_f64()), value);
    }

    /// Inserts a raw `(key, value)` pair without re-applying the binning
    /// rule — used by [`Self::load_csv`] to preserve exactly the keys that
    /// were written out, independent of the current binning parameters.
    fn insert_raw(&mut self, key: K, value: V) {
        self.values.insert(OrderedKey(key.to_f64()), value);
    }

    /// Number of populated bins.
    pub fn bin_count(&self) -> usize {
        self.values.len()
    }

    /// Whether the histogram has no populated bins.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates bins in key order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> + '_ {
        self.values.iter().map(|(k, v)| (K::from_f64(k.0), v))
    }

    /// Resets every populated bin to zero, keeping the key set.
    pub fn reset(&mut self) {
        for v in self.values.values_mut() {
            *v = V::default();
        }
    }

    /// Clears the histogram entirely, removing every bin.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Sum of all y-values (NaN entries propagate per ordinary IEEE rules).
    pub fn sum(&self) -> V {
        let mut total = V::default();
        for v in self.values.values() {
            total += *v;
        }
        total
    }

    /// Iterator entry with the maximum y-value, if the histogram is
    /// non-empty.
    pub fn max_y(&self) -> Option<(K, &V)> {
        self.values
            .iter()
            .filter(|(_, v)| !v.is_nan_value())
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(k, v)| (K::from_f64(k.0), v))
    }

    /// Iterator entry with the minimum y-value, if the histogram is
    /// non-empty.
    pub fn min_y(&self) -> Option<(K, &V)> {
        self.values
            .iter()
            .filter(|(_, v)| !v.is_nan_value())
            .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(k, v)| (K::from_f64(k.0), v))
    }

    /// `min_y / mean_y` over non-NaN bins (§3, §8 scenario 4).
    ///
    /// Returns `0.0` on an empty histogram or one whose non-NaN bins sum to
    /// zero, matching the documented [`HistogramError`]-free policy for
    /// `EmptyHistogramForFlatness` (§7): flatness on an empty histogram is
    /// not an error, it is defined to be zero.
    pub fn flatness(&self) -> f64 {
        let mut count = 0usize;
        let mut sum = 0.0f64;
        let mut min = f64::INFINITY;
        for v in self.values.values() {
            if v.is_nan_value() {
                continue;
            }
            let vf: f64 = (*v).to_f64();
            count += 1;
            sum += vf;
            if vf < min {
                min = vf;
            }
        }
        if count == 0 || sum == 0.0 {
            return 0.0;
        }
        let mean = sum / count as f64;
        min / mean
    }

    /// Whether every bin has been visited at least once (non-zero), used by
    /// the Wang-Landau outer loop alongside [`Self::flatness`].
    pub fn all_bins_visited(&self) -> bool {
        !self.values.is_empty() && self.values.values().all(|v| *v != V::default())
    }

    /// Subtracts the value stored at `key`'s bin from every bin (§3:
    /// `shift_bin_zero`).
    pub fn shift_bin_zero(&mut self, key: K) {
        if let Some(v) = self.get(key).copied() {
            for value in self.values.values_mut() {
                *value -= v;
            }
        }
    }

    /// Subtracts the minimum non-NaN y-value from every bin. Used to
    /// periodically re-reference a DOS histogram so its magnitudes stay
    /// bounded (§3).
    pub fn re_reference(&mut self) {
        if let Some((_, min)) = self.min_y() {
            let min = *min;
            for value in self.values.values_mut() {
                *value -= min;
            }
        }
    }

    /// Writes `key\tvalue\n` records in key order.
    pub fn save_csv<W: Write>(&self, mut out: W) -> Result<(), HistogramError> {
        for (k, v) in self.iter() {
            writeln!(out, "{}\t{}", k, v)?;
        }
        Ok(())
    }

    /// Reads `key\tvalue\n` records, ignoring blank lines and `#`-prefixed
    /// comments. Replaces the current contents but preserves the current
    /// binning rule.
    pub fn load_csv<R: BufRead>(&mut self, reader: R) -> Result<(), HistogramError> {
        self.values.clear();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut parts = trimmed.split_whitespace();
            let (Some(k_str), Some(v_str)) = (parts.next(), parts.next()) else {
                return Err(HistogramError::CsvParse {
                    line: idx + 1,
                    text: line,
                });
            };
            let key: K = k_str.parse().map_err(|_| HistogramError::CsvParse {
                line: idx + 1,
                text: line.clone(),
            })?;
            let value: V = v_str.parse().map_err(|_| HistogramError::CsvParse {
                line: idx + 1,
                text: line.clone(),
            })?;
            self.insert_raw(key, value);
        }
        Ok(())
    }
}

impl<K: HistKey, V: HistValue + PartialEq> PartialEq for Histogram<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.binning == other.binning
            && self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(other.values.iter())
                .all(|((k1, v1), (k2, v2))| k1.0 == k2.0 && v1 == v2)
    }
}
