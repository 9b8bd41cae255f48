//! # Observable family
//!
//! An observable is any quantity measured at a simulation's measurement
//! points that is closed under scalar `+`, `-`, `*`, `/` and has a zero
//! element (§3). This module provides the trait and the concrete shapes the
//! spec calls out: scalar `f64`, fixed-arity [`ObservableArray`],
//! variable-arity [`ObservableVec`], [`ObservablePair`], and
//! [`HistogramObservable`].
//!
//! Arithmetic that can fail (mismatched vector lengths, mismatched
//! histogram key sets) goes through the `checked_*` methods rather than
//! panicking `std::ops` impls, so accumulators can surface a proper
//! [`ObservableError`] instead of aborting a multi-hour run (§9 Design
//! Note: standardise on exact-match-or-error for histogram-valued
//! observables).

use crate::error::ObservableError;
use crate::histogram::{HistKey, Histogram};

/// A quantity measured at simulation measurement points.
///
/// Closed under scalar addition, subtraction, multiplication and division,
/// with a zero element. Component-wise arithmetic between two observables
/// of mismatched shape (different vector length, different histogram keys)
/// is a checked operation returning [`ObservableError`], not a panic.
pub trait Observable: Clone {
    /// The zero element with the same shape as `self` (e.g. same length, for
    /// variable-arity observables; same key set, for histogram observables).
    fn zero_like(&self) -> Self;

    /// Component-wise sum, or [`ObservableError`] if shapes mismatch.
    fn checked_add(&self, rhs: &Self) -> Result<Self, ObservableError>
    where
        Self: Sized;

    /// Component-wise difference, or [`ObservableError`] if shapes mismatch.
    fn checked_sub(&self, rhs: &Self) -> Result<Self, ObservableError>
    where
        Self: Sized;

    /// Scales every component by `s`.
    fn scaled(&self, s: f64) -> Self;

    /// Divides every component by `s`.
    fn divided(&self, s: f64) -> Self;
}

impl Observable for f64 {
    fn zero_like(&self) -> Self {
        0.0
    }
    fn checked_add(&self, rhs: &Self) -> Result<Self, ObservableError> {
        Ok(self + rhs)
    }
    fn checked_sub(&self, rhs: &Self) -> Result<Self, ObservableError> {
        Ok(self - rhs)
    }
    fn scaled(&self, s: f64) -> Self {
        self * s
    }
    fn divided(&self, s: f64) -> Self {
        self / s
    }
}

/// A scalar component usable inside [`ObservableArray`]/[`ObservableVec`].
pub trait ObservableScalar:
    Copy
    + Default
    + std::ops::Add<Output = Self>
    + std::ops::Sub<Output = Self>
    + std::ops::Mul<f64, Output = Self>
    + std::ops::Div<f64, Output = Self>
{
}
impl ObservableScalar for f64 {}

/// A fixed-arity observable of `N` components of type `T` (e.g. `(energy,
/// magnetisation)` as `ObservableArray<f64, 2>`).
///
/// Arithmetic between two `ObservableArray<T, N>` values of the same `N`
/// cannot fail by construction — the array length is part of the type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservableArray<T, const N: usize>(pub [T; N]);

impl<T: ObservableScalar, const N: usize> Observable for ObservableArray<T, N> {
    fn zero_like(&self) -> Self {
        ObservableArray([T::default(); N])
    }
    fn checked_add(&self, rhs: &Self) -> Result<Self, ObservableError> {
        let mut out = [T::default(); N];
        for i in 0..N {
            out[i] = self.0[i] + rhs.0[i];
        }
        Ok(ObservableArray(out))
    }
    fn checked_sub(&self, rhs: &Self) -> Result<Self, ObservableError> {
        let mut out = [T::default(); N];
        for i in 0..N {
            out[i] = self.0[i] - rhs.0[i];
        }
        Ok(ObservableArray(out))
    }
    fn scaled(&self, s: f64) -> Self {
        let mut out = [T::default(); N];
        for i in 0..N {
            out[i] = self.0[i] * s;
        }
        ObservableArray(out)
    }
    fn divided(&self, s: f64) -> Self {
        let mut out = [T::default(); N];
        for i in 0..N {
            out[i] = self.0[i] / s;
        }
        ObservableArray(out)
    }
}

impl<T, const N: usize> std::ops::Index<usize> for ObservableArray<T, N> {
    type Output = T;
    fn index(&self, i: usize) -> &T {
        &self.0[i]
    }
}

/// A variable-arity observable (e.g. a per-site measurement on a lattice
/// whose size is only known at runtime).
///
/// Arithmetic between two `ObservableVec`s of different lengths returns
/// [`ObservableError::DimensionMismatch`].
#[derive(Debug, Clone, PartialEq)]
pub struct ObservableVec<T>(pub Vec<T>);

impl<T: ObservableScalar> Observable for ObservableVec<T> {
    fn zero_like(&self) -> Self {
        ObservableVec(vec![T::default(); self.0.len()])
    }
    fn checked_add(&self, rhs: &Self) -> Result<Self, ObservableError> {
        if self.0.len() != rhs.0.len() {
            return Err(ObservableError::DimensionMismatch {
                left: self.0.len(),
                right: rhs.0.len(),
            });
        }
        Ok(ObservableVec(
            self.0.iter().zip(&rhs.0).map(|(a, b)| *a + *b).collect(),
        ))
    }
    fn checked_sub(&self, rhs: &Self) -> Result<Self, ObservableError> {
        if self.0.len() != rhs.0.len() {
            return Err(ObservableError::DimensionMismatch {
                left: self.0.len(),
                right: rhs.0.len(),
            });
        }
        Ok(ObservableVec(
            self.0.iter().zip(&rhs.0).map(|(a, b)| *a - *b).collect(),
        ))
    }
    fn scaled(&self, s: f64) -> Self {
        ObservableVec(self.0.iter().map(|a| *a * s).collect())
    }
    fn divided(&self, s: f64) -> Self {
        ObservableVec(self.0.iter().map(|a| *a / s).collect())
    }
}

/// A pair of two (possibly different-typed) observables, combined
/// component-wise.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservablePair<A, B>(pub A, pub B);

impl<A: Observable, B: Observable> Observable for ObservablePair<A, B> {
    fn zero_like(&self) -> Self {
        ObservablePair(self.0.zero_like(), self.1.zero_like())
    }
    fn checked_add(&self, rhs: &Self) -> Result<Self, ObservableError> {
        Ok(ObservablePair(
            self.0.checked_add(&rhs.0)?,
            self.1.checked_add(&rhs.1)?,
        ))
    }
    fn checked_sub(&self, rhs: &Self) -> Result<Self, ObservableError> {
        Ok(ObservablePair(
            self.0.checked_sub(&rhs.0)?,
            self.1.checked_sub(&rhs.1)?,
        ))
    }
    fn scaled(&self, s: f64) -> Self {
        ObservablePair(self.0.scaled(s), self.1.scaled(s))
    }
    fn divided(&self, s: f64) -> Self {
        ObservablePair(self.0.divided(s), self.1.divided(s))
    }
}

/// The histogram of an observable, treated as a new observable in its own
/// right: component-wise arithmetic over matching keys, with mismatched key
/// sets raising [`ObservableError::KeyMismatch`] (§9 Design Note — the
/// original mixed "union of keys" and "exact match" semantics across call
/// sites; this core standardises on exact match, erroring otherwise).
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramObservable<K: HistKey>(pub Histogram<K, f64>);

impl<K: HistKey> HistogramObservable<K> {
    fn same_keys(&self, other: &Self) -> bool {
        self.0.bin_count() == other.0.bin_count()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|((k1, _), (k2, _))| k1 == k2)
    }
}

impl<K: HistKey> Observable for HistogramObservable<K> {
    fn zero_like(&self) -> Self {
        let mut zeroed = match self.0.binning() {
            crate::histogram::Binning::Discrete => Histogram::discrete(),
            crate::histogram::Binning::Binned { width, reference } => {
                Histogram::binned(width, reference).expect("width already validated")
            }
        };
        for (k, _) in self.0.iter() {
            zeroed.set(k, 0.0);
        }
        HistogramObservable(zeroed)
    }

    fn checked_add(&self, rhs: &Self) -> Result<Self, ObservableError> {
        if !self.same_keys(rhs) {
            return Err(ObservableError::KeyMismatch);
        }
        let mut result = self.zero_like();
        for ((k, a), (_, b)) in self.0.iter().zip(rhs.0.iter()) {
            result.0.set(k, *a + *b);
        }
        Ok(result)
    }

    fn checked_sub(&self, rhs: &Self) -> Result<Self, ObservableError> {
        if !self.same_keys(rhs) {
            return Err(ObservableError::KeyMismatch);
        }
        let mut result = self.zero_like();
        for ((k, a), (_, b)) in self.0.iter().zip(rhs.0.iter()) {
            result.0.set(k, *a - *b);
        }
        Ok(result)
    }

    fn scaled(&self, s: f64) -> Self {
        let mut result = self.zero_like();
        for (k, v) in self.0.iter() {
            result.0.set(k, *v * s);
        }
        result
    }

    fn divided(&self, s: f64) -> Self {
        self.scaled(1.0 / s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_observable_arithmetic() {
        let a = 2.0_f64;
        let b = 3.0_f64;
        assert_eq!(a.checked_add(&b).unwrap(), 5.0);
        assert_eq!(a.scaled(2.0), 4.0);
    }

    #[test]
    fn array_observable_is_componentwise() {
        let a = ObservableArray([1.0, 2.0]);
        let b = ObservableArray([10.0, 20.0]);
        let sum = a.checked_add(&b).unwrap();
        assert_eq!(sum.0, [11.0, 22.0]);
    }

    #[test]
    fn vec_observable_errors_on_length_mismatch() {
        let a = ObservableVec(vec![1.0, 2.0]);
        let b = ObservableVec(vec![1.0]);
        assert_eq!(
            a.checked_add(&b).unwrap_err(),
            ObservableError::DimensionMismatch { left: 2, right: 1 }
        );
    }

    #[test]
    fn histogram_observable_requires_exact_key_match() {
        let mut h1: Histogram<i64, f64> = Histogram::discrete();
        h1.set(0, 1.0);
        h1.set(1, 2.0);
        let mut h2: Histogram<i64, f64> = Histogram::discrete();
        h2.set(0, 1.0);
        h2.set(2, 2.0);

        let o1 = HistogramObservable(h1);
        let o2 = HistogramObservable(h2);
        assert_eq!(o1.checked_add(&o2).unwrap_err(), ObservableError::KeyMismatch);
    }

    #[test]
    fn histogram_observable_adds_matching_keys() {
        let mut h1: Histogram<i64, f64> = Histogram::discrete();
        h1.set(0, 1.0);
        h1.set(1, 2.0);
        let mut h2: Histogram<i64, f64> = Histogram::discrete();
        h2.set(0, 10.0);
        h2.set(1, 20.0);

        let o1 = HistogramObservable(h1);
        let o2 = HistogramObservable(h2);
        let sum = o1.checked_add(&o2).unwrap();
        assert_eq!(*sum.0.get(0).unwrap(), 11.0);
        assert_eq!(*sum.0.get(1).unwrap(), 22.0);
    }
}
