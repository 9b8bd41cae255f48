//! # mocasinns-core
//!
//! A model-agnostic toolkit for canonical and generalized-ensemble Monte
//! Carlo sampling: Metropolis (with a rejection-free variant), Wang-Landau
//! density-of-states estimation, and a multicanonical/reference-state
//! extension layered on top of either, built from a small shared core of
//! histograms, observables, accumulators, and a cooperative-cancellation
//! simulation base.
//!
//! ## Overview
//!
//! A physical system is modeled by implementing [`model::Model`] (and, for
//! the rejection-free Metropolis variant, [`model::RejectionFreeModel`]; for
//! the multicanonical extension, [`model::ReferenceModel`]) — the engines in
//! this crate never know anything about spins, lattices, or any other
//! concrete physics, only that a `Model` can report its energy, propose a
//! step, and commit one.
//!
//! - Calculating the density of states ([`wang_landau`])
//! - Estimating thermodynamic properties at fixed temperature ([`metropolis`])
//! - Sampling systems with an otherwise energetically-degenerate reference
//!   configuration ([`multicanonical`])
//!
//! ## Features
//!
//! - Generic over any [`model::Model`] implementation
//! - Deterministic PCG-64 seeding for reproducible runs ([`rng`])
//! - Discrete and binned histograms sharing one composable type ([`histogram`])
//! - Running-statistic, jackknife, bootstrap and disk-spilling accumulators
//!   ([`accumulator`])
//! - Cooperative cancellation and atomic checkpointing ([`simulation`])
//!
//! ## Example
//!
//! ```no_run
//! use mocasinns_core::prelude::*;
//! use rand::RngCore;
//!
//! #[derive(Clone, PartialEq)]
//! struct CoinFlip { up: bool }
//!
//! #[derive(Clone, Copy)]
//! struct Flip { delta: f64 }
//! impl StepSpec for Flip {
//!     type Energy = f64;
//!     fn delta_e(&self) -> f64 { self.delta }
//! }
//!
//! impl Model for CoinFlip {
//!     type Energy = f64;
//!     type Step = Flip;
//!     fn energy(&self) -> f64 { if self.up { -1.0 } else { 1.0 } }
//!     fn propose_step<R: RngCore>(&mut self, _rng: &mut R) -> Flip {
//!         let after = if self.up { 1.0 } else { -1.0 };
//!         Flip { delta: after - self.energy() }
//!     }
//!     fn commit(&mut self, _step: &Flip) { self.up = !self.up; }
//! }
//!
//! let params = MetropolisParams {
//!     beta: 0.5,
//!     measurement_number: 1_000,
//!     relaxation_steps: 100,
//!     steps_between_measurement: 1,
//! };
//! let mut engine = Metropolis::seeded(CoinFlip { up: true }, params, 42).unwrap();
//! let outcome = engine.run(|m| m.energy());
//! ```

pub mod accumulator;
pub mod error;
pub mod flatness;
pub mod histogram;
pub mod metropolis;
pub mod model;
pub mod multicanonical;
pub mod observable;
pub mod rng;
pub mod schedule;
pub mod simulation;
pub mod traits;
pub mod wang_landau;

/// Commonly used items, exported for convenience.
pub mod prelude {
    pub use crate::accumulator::{
        BootstrapAccumulator, FileAccumulator, HistogramAccumulator, JackknifeAccumulator,
        MeanVarianceAccumulator, Record, SquareObservable,
    };
    pub use crate::error::{CheckpointError, EngineError, HistogramError, ObservableError};
    pub use crate::flatness::{Flatness, Fraction, RMS};
    pub use crate::histogram::{HistKey, HistValue, Histogram};
    pub use crate::metropolis::{
        boltzmann_acceptance, Metropolis, MetropolisParams, RejectionFreeMetropolis,
    };
    pub use crate::model::{Energy, Model, ReferenceModel, RejectionFreeModel, StepSpec};
    pub use crate::multicanonical::{ExtendedEnergy, Multicanonical, MulticanonicalStep};
    pub use crate::observable::{
        Observable, ObservableArray, ObservablePair, ObservableScalar, ObservableVec,
        HistogramObservable,
    };
    pub use crate::rng::{Rng64, SimRng};
    pub use crate::schedule::{Geometric, OneOverT};
    pub use crate::simulation::{
        load_checkpoint, save_checkpoint, CancellationFlag, CancellationState, RunOutcome,
        SimulationBase, StepObserver,
    };
    #[cfg(all(feature = "posix-signals", unix))]
    pub use crate::simulation::install_posix_handlers;
    pub use crate::traits::Schedule;
    pub use crate::wang_landau::{WangLandau, WangLandauParams};
}
