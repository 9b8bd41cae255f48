//! # Core abstractions for the simulation engines
//!
//! This module defines the polymorphic contract every physical model must
//! satisfy (§4.B) so that the engines in [`crate::metropolis`],
//! [`crate::wang_landau`] and [`crate::multicanonical`] can drive it without
//! knowing anything about spins, lattices, or any other concrete physics.
//!
//! - [`Energy`]: the scalar (or extended pair) used in Boltzmann / Wang-Landau
//!   weighting — totally ordered, additive, convertible to `f64`.
//! - [`StepSpec`]: a proposed, reversible mutation of a configuration.
//! - [`Model`]: the configuration itself — owns its energy, proposes steps,
//!   commits them.
//! - [`RejectionFreeModel`]: the extra capability the rejection-free
//!   Metropolis variant needs — enumerating every currently proposable step.
//! - [`ReferenceModel`]: the equality bound the multicanonical extension
//!   needs to detect "am I at the reference configuration".
//!
//! Implementing [`Model`] for a concrete configuration type (a spin lattice,
//! say) lets the generic engines in this crate sample it.

use rand::RngCore;

/// The scalar (or extended pair, for multicanonical sampling) used to weigh
/// acceptance probabilities.
///
/// Totally ordered and additive, with a conversion to `f64` for Boltzmann
/// weighting. Implemented here for the common primitive energy types; models
/// with custom energy types (e.g. the multicanonical extension's
/// [`crate::multicanonical::ExtendedEnergy`]) implement it directly.
///
/// `to_f64` is a dedicated method rather than an `Into<f64>` bound: the
/// standard library only provides a lossless `From<T> for f64` for integer
/// types narrower than `f64`'s mantissa, which rules out `i64` — a type this
/// trait is implemented for below.
pub trait Energy:
    Copy
    + Clone
    + Default
    + PartialOrd
    + PartialEq
    + std::ops::Add<Output = Self>
    + std::ops::Sub<Output = Self>
    + std::fmt::Debug
{
    /// This energy's `f64` image, used for Boltzmann weighting.
    fn to_f64(self) -> f64;
}

macro_rules! impl_energy_for_primitive {
    ($($t:ty),*) => {
        $(impl Energy for $t {
            fn to_f64(self) -> f64 {
                self as f64
            }
        })*
    };
}
impl_energy_for_primitive!(f64, i64, i32);

/// A proposed, reversible mutation of a configuration.
///
/// Created by [`Model::propose_step`], inspected by the driving engine, then
/// either committed via [`Model::commit`] or simply dropped. A `StepSpec` is
/// only ever valid against the configuration it was proposed from.
pub trait StepSpec: Clone {
    /// The energy type of the model this step belongs to.
    type Energy: Energy;

    /// The energy change if this step were committed.
    ///
    /// Invariant: after `model.commit(&step)`, `model.energy()` must equal
    /// `energy_before + step.delta_e()` exactly — the engines rely on this to
    /// avoid recomputing the total energy from scratch every step.
    fn delta_e(&self) -> Self::Energy;

    /// Whether the model considers this move physically possible.
    ///
    /// Defaults to `true`; models that can propose impossible moves (e.g. a
    /// move that would violate a hard constraint) override this to veto them.
    fn is_executable(&self) -> bool {
        true
    }

    /// The forward-over-reverse proposal ratio `q`, used to unbias detailed
    /// balance for asymmetric proposal distributions. Defaults to `1.0`.
    fn selection_probability_factor(&self) -> f64 {
        1.0
    }
}

/// A physical configuration being sampled.
///
/// Opaque to the engines except through this contract: they can ask for its
/// current energy, ask it to propose a step given an RNG, and commit a step
/// it previously proposed. The configuration is owned by the caller; an
/// engine only ever borrows it for the duration of a run.
pub trait Model: Clone {
    /// The model's energy type.
    type Energy: Energy;
    /// The model's step type.
    type Step: StepSpec<Energy = Self::Energy>;

    /// The current total energy of the configuration.
    ///
    /// Must be a pure function of the configuration's current contents.
    fn energy(&self) -> Self::Energy;

    /// Proposes a candidate step, without mutating `self`.
    fn propose_step<R: RngCore>(&mut self, rng: &mut R) -> Self::Step;

    /// Applies a previously proposed step to `self`.
    ///
    /// Only ever called with a step this configuration itself produced via
    /// [`Self::propose_step`].
    fn commit(&mut self, step: &Self::Step);
}

/// Extra capability needed by the rejection-free Metropolis variant (§4.F):
/// enumerating every step currently proposable from the configuration, so
/// the engine can weigh and pick among all of them rather than a single
/// random proposal.
pub trait RejectionFreeModel: Model {
    /// Enumerates every currently executable step.
    fn all_steps(&self) -> Vec<Self::Step>;
}

/// Bound required by the multicanonical extension (§4.H): it needs to detect
/// whether the wrapped configuration currently equals the reference
/// configuration, which requires [`PartialEq`] on top of [`Model`].
///
/// Kept as a separate trait rather than a supertrait bound on [`Model`]
/// itself, since the base configuration/step contract (§4.B) never requires
/// equality.
pub trait ReferenceModel: Model + PartialEq {}

impl<T: Model + PartialEq> ReferenceModel for T {}
