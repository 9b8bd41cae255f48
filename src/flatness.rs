//! # Histogram flatness criteria
//!
//! This module provides implementations of the [`Flatness`] trait for
//! determining when the incidence histogram built up during a Wang-Landau
//! stage is sufficiently "flat" to multiply the modification factor and move
//! to the next stage (§4.F).
//!
//! Two criteria are provided:
//!
//! - [`Fraction`]: the spec-mandated criterion — flat once `min(H) / mean(H)`
//!   (computed by [`crate::histogram::Histogram::flatness`]) reaches the
//!   `flatness` threshold.
//! - [`RMS`]: flat once the relative standard deviation of visit counts drops
//!   below `1 - flatness`.
//!
//! Custom criteria can be implemented by implementing [`Flatness`] for any
//! key type the Wang-Landau engine is instantiated with.

use crate::histogram::{HistKey, Histogram};

/// Determines whether an incidence histogram counts as "flat enough" to end
/// a Wang-Landau stage.
pub trait Flatness<K: HistKey> {
    /// Returns `true` if `hist` is flat enough at the given `flatness`
    /// threshold (conventionally in `(0, 1]`, higher is stricter).
    fn is_flat(&self, hist: &Histogram<K, u64>, flatness: f64) -> bool;
}

/// Considers a histogram flat when `min(H) / mean(H) >= flatness`, exactly
/// the ratio computed by [`Histogram::flatness`].
///
/// This is the criterion the spec's flatness scenario is defined against,
/// and the one used when no other [`Flatness`] strategy is requested.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fraction;

impl<K: HistKey> Flatness<K> for Fraction {
    fn is_flat(&self, hist: &Histogram<K, u64>, flatness: f64) -> bool {
        if hist.is_empty() {
            return false;
        }
        hist.flatness() >= flatness
    }
}

/// Considers a histogram flat when the relative standard deviation
/// `sigma/mu <= (1 - flatness)` of its populated bins.
#[derive(Debug, Clone, Copy, Default)]
pub struct RMS;

impl<K: HistKey> Flatness<K> for RMS {
    fn is_flat(&self, hist: &Histogram<K, u64>, flatness: f64) -> bool {
        if hist.is_empty() {
            return false;
        }
        let n = hist.bin_count() as f64;
        let mean = hist.iter().map(|(_, v)| *v as f64).sum::<f64>() / n;
        if mean == 0.0 {
            return false;
        }
        let var = hist
            .iter()
            .map(|(_, v)| {
                let d = *v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        let rel_std_dev = var.sqrt() / mean;
        rel_std_dev <= 1.0 - flatness
    }
}
