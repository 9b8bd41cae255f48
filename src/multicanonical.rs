//! # Multicanonical / reference-state extension (§4.H)
//!
//! Wraps an arbitrary [`ReferenceModel`] so it can be driven by the generic
//! [`crate::metropolis::Metropolis`] or [`crate::wang_landau::WangLandau`]
//! engines while additionally tracking whether the walker currently sits at
//! a distinguished reference configuration — the technique multicanonical
//! sampling uses to keep a reference state resolvable as its own bin even
//! when its original energy coincides with other configurations'.
//!
//! Grounded on `libmocasinns`'s `ConfigurationTypeExtended`/`EnergyTypeExtended`
//! (original_source): the `commit_testwise` pattern there — precompute
//! whether a proposed step would land on the reference configuration before
//! committing it for real — is reproduced here via [`Model::clone`] plus a
//! probe commit, since Rust's ownership model has no analogous
//! commit-then-rollback primitive.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::histogram::HistKey;
use crate::model::{Energy, Model, ReferenceModel, StepSpec};

/// A magnitude comfortably larger than any `original` energy this crate's
/// examples produce, used to encode `(reference_count, original)` as a
/// single lossy `f64` for [`Energy::to_f64`] / histogram-key ordering.
///
/// Chosen small enough (`1e6`, not the `1e15` an unbounded-reference-count
/// encoding would need) that `original` keeps about nine significant
/// decimal digits — ample headroom for the small reference counts (typically
/// `-1..=1`, occasionally larger for multi-epoch runs) this extension
/// actually produces.
const REFERENCE_COUNT_SCALE: f64 = 1.0e6;

/// The extended energy multicanonical sampling orders lexicographically by
/// `(reference_count, original)`, reference count first (§8): being one
/// reference-state-visit "ahead" always outweighs any difference in
/// `original`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ExtendedEnergy<E> {
    /// `1` iff the walker currently sits at the reference configuration,
    /// `0` otherwise (§3). Updated by adding a `+1`/`-1` transition delta on
    /// each commit rather than recomputed from scratch, so it stays binary
    /// as long as that delta is computed correctly.
    pub reference_count: i32,
    /// The wrapped model's own energy.
    pub original: E,
}

impl<E: PartialEq> PartialEq for ExtendedEnergy<E> {
    fn eq(&self, other: &Self) -> bool {
        self.reference_count == other.reference_count && self.original == other.original
    }
}

impl<E: PartialOrd> PartialOrd for ExtendedEnergy<E> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match self.reference_count.cmp(&other.reference_count) {
            std::cmp::Ordering::Equal => self.original.partial_cmp(&other.original),
            ord => Some(ord),
        }
    }
}

impl<E: std::ops::Add<Output = E>> std::ops::Add for ExtendedEnergy<E> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            reference_count: self.reference_count + rhs.reference_count,
            original: self.original + rhs.original,
        }
    }
}

impl<E: std::ops::Sub<Output = E>> std::ops::Sub for ExtendedEnergy<E> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self {
            reference_count: self.reference_count - rhs.reference_count,
            original: self.original - rhs.original,
        }
    }
}

impl<E: Energy> Energy for ExtendedEnergy<E> {
    fn to_f64(self) -> f64 {
        self.reference_count as f64 * REFERENCE_COUNT_SCALE + self.original.to_f64()
    }
}

impl<E: Energy + HistKey> HistKey for ExtendedEnergy<E> {
    fn to_f64(self) -> f64 {
        Energy::to_f64(self)
    }

    fn from_f64(v: f64) -> Self {
        let reference_count = (v / REFERENCE_COUNT_SCALE).round() as i32;
        let original = v - reference_count as f64 * REFERENCE_COUNT_SCALE;
        ExtendedEnergy {
            reference_count,
            original: E::from_f64(original),
        }
    }
}

impl<E: Energy + HistKey> std::fmt::Display for ExtendedEnergy<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.reference_count, self.original)
    }
}

impl<E: Energy + HistKey> std::str::FromStr for ExtendedEnergy<E> {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ref_str, orig_str) = s
            .split_once(':')
            .ok_or_else(|| format!("expected \"ref:orig\", got {s:?}"))?;
        let reference_count: i32 = ref_str
            .parse()
            .map_err(|_| format!("invalid reference_count in {s:?}"))?;
        let original: E = orig_str
            .parse()
            .map_err(|_| format!("invalid original energy in {s:?}"))?;
        Ok(ExtendedEnergy {
            reference_count,
            original,
        })
    }
}

/// A proposed step through a [`Multicanonical`]-wrapped model: the inner
/// model's own step, plus the reference-state transition (`-1`, `0`, or
/// `+1`) it was precomputed to cause.
#[derive(Debug, Clone)]
pub struct MulticanonicalStep<M: Model> {
    inner: M::Step,
    ref_change: i32,
}

impl<M: ReferenceModel> StepSpec for MulticanonicalStep<M> {
    type Energy = ExtendedEnergy<M::Energy>;

    fn delta_e(&self) -> Self::Energy {
        ExtendedEnergy {
            reference_count: self.ref_change,
            original: self.inner.delta_e(),
        }
    }

    fn is_executable(&self) -> bool {
        self.inner.is_executable()
    }

    fn selection_probability_factor(&self) -> f64 {
        self.inner.selection_probability_factor()
    }
}

/// Wraps a [`ReferenceModel`] so the generic engines can sample it with an
/// [`ExtendedEnergy`] that distinguishes visits to a chosen reference
/// configuration from every other configuration of otherwise-equal energy
/// (§4.H).
#[derive(Debug, Clone)]
pub struct Multicanonical<M: ReferenceModel> {
    inner: M,
    reference: M,
    current_energy: ExtendedEnergy<M::Energy>,
}

impl<M: ReferenceModel> Multicanonical<M> {
    /// Wraps `inner`, distinguishing visits to `reference`.
    pub fn new(inner: M, reference: M) -> Self {
        let reference_count = (inner == reference) as i32;
        let original = inner.energy();
        Self {
            current_energy: ExtendedEnergy {
                reference_count,
                original,
            },
            inner,
            reference,
        }
    }

    /// The wrapped model.
    pub fn inner(&self) -> &M {
        &self.inner
    }

    /// Whether the wrapped model currently sits at the reference
    /// configuration.
    pub fn is_at_reference(&self) -> bool {
        self.inner == self.reference
    }
}

impl<M: ReferenceModel> PartialEq for Multicanonical<M> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<M: ReferenceModel> Model for Multicanonical<M> {
    type Energy = ExtendedEnergy<M::Energy>;
    type Step = MulticanonicalStep<M>;

    fn energy(&self) -> Self::Energy {
        self.current_energy
    }

    fn propose_step<R: RngCore>(&mut self, rng: &mut R) -> Self::Step {
        let inner_step = self.inner.propose_step(rng);

        let mut probe = self.inner.clone();
        probe.commit(&inner_step);
        let will_be_reference = probe == self.reference;
        let is_reference = self.is_at_reference();

        MulticanonicalStep {
            inner: inner_step,
            ref_change: will_be_reference as i32 - is_reference as i32,
        }
    }

    fn commit(&mut self, step: &Self::Step) {
        self.inner.commit(&step.inner);
        self.current_energy = ExtendedEnergy {
            reference_count: self.current_energy.reference_count + step.ref_change,
            original: self.inner.energy(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Chain {
        position: i64,
    }

    #[derive(Debug, Clone, Copy)]
    struct Hop {
        to: i64,
        delta: f64,
    }
    impl StepSpec for Hop {
        type Energy = f64;
        fn delta_e(&self) -> f64 {
            self.delta
        }
    }

    impl Model for Chain {
        type Energy = f64;
        type Step = Hop;

        fn energy(&self) -> f64 {
            (self.position as f64).abs()
        }

        fn propose_step<R: RngCore>(&mut self, rng: &mut R) -> Hop {
            use rand::Rng;
            let to = self.position + if rng.random_bool(0.5) { 1 } else { -1 };
            Hop {
                to,
                delta: (to as f64).abs() - self.energy(),
            }
        }

        fn commit(&mut self, step: &Hop) {
            self.position = step.to;
        }
    }

    #[test]
    fn extended_energy_orders_reference_count_first() {
        let lower_ref_higher_orig = ExtendedEnergy {
            reference_count: 0,
            original: 100.0_f64,
        };
        let higher_ref_lower_orig = ExtendedEnergy {
            reference_count: 1,
            original: -100.0_f64,
        };
        assert!(lower_ref_higher_orig < higher_ref_lower_orig);
    }

    #[test]
    fn extended_energy_falls_back_to_original_when_reference_count_ties() {
        let a = ExtendedEnergy {
            reference_count: 2,
            original: 1.0_f64,
        };
        let b = ExtendedEnergy {
            reference_count: 2,
            original: 2.0_f64,
        };
        assert!(a < b);
    }

    #[test]
    fn extended_energy_text_round_trips_exactly() {
        let e = ExtendedEnergy {
            reference_count: -3,
            original: 1.5_f64,
        };
        let text = e.to_string();
        let parsed: ExtendedEnergy<f64> = text.parse().unwrap();
        assert_eq!(parsed.reference_count, -3);
        assert_eq!(parsed.original, 1.5);
    }

    #[test]
    fn multicanonical_tracks_reference_visits() {
        let reference = Chain { position: 0 };
        let mut mc = Multicanonical::new(Chain { position: 0 }, reference);
        assert!(mc.is_at_reference());
        assert_eq!(mc.energy().reference_count, 1);

        let mut rng = crate::rng::seeded(1);
        for _ in 0..50 {
            let step = mc.propose_step(&mut rng);
            mc.commit(&step);
            assert_eq!(mc.is_at_reference(), mc.energy().reference_count == 1);
        }
    }
}
