//! # Metropolis engine (§4.F)
//!
//! The canonical Metropolis-Hastings sampler built on
//! [`crate::simulation::SimulationBase`], plus the rejection-free variant
//! that picks among every currently proposable step instead of retrying a
//! single random proposal.

use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::accumulator::Record;
use crate::error::EngineError;
use crate::model::{Energy, Model, RejectionFreeModel};
use crate::rng::Rng64;
use crate::simulation::{self, CancellationState, SimulationBase, StepObserver};

/// Parameters controlling a Metropolis run (§4.F, §6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetropolisParams {
    /// Inverse temperature `beta = 1/kT` used in the Boltzmann acceptance
    /// weight `exp(-beta * delta_e)`.
    pub beta: f64,
    /// Number of measurements to take.
    pub measurement_number: u64,
    /// Inner steps to run before the first measurement (thermalisation).
    pub relaxation_steps: u64,
    /// Inner steps to run between consecutive measurements.
    pub steps_between_measurement: u64,
}

impl MetropolisParams {
    /// Validates the parameters, returning [`EngineError::InvalidParameter`]
    /// for any field that would make a run meaningless.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.beta.is_finite() {
            return Err(EngineError::InvalidParameter(format!(
                "beta must be finite, got {}",
                self.beta
            )));
        }
        if self.measurement_number == 0 {
            return Err(EngineError::InvalidParameter(
                "measurement_number must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// The Boltzmann acceptance weight `min(1, exp(-beta * delta_e))`, the
/// acceptance rule canonical Metropolis sampling uses (§4.F).
pub fn boltzmann_acceptance<E: Energy>(beta: f64, delta_e: E) -> f64 {
    (-beta * delta_e.to_f64()).exp()
}

struct BoltzmannObserver {
    beta: f64,
}

impl<M: Model> StepObserver<M> for BoltzmannObserver {
    fn acceptance_probability(&mut self, step: &M::Step, _model: &M) -> f64 {
        boltzmann_acceptance(self.beta, step.delta_e())
    }
}

/// Canonical Metropolis-Hastings sampling of a [`Model`] at fixed inverse
/// temperature.
pub struct Metropolis<M: Model, R: RngCore = Rng64> {
    base: SimulationBase<R>,
    model: M,
    params: MetropolisParams,
}

impl<M: Model> Metropolis<M, Rng64> {
    /// Creates a Metropolis engine deterministically seeded from `seed`.
    pub fn seeded(model: M, params: MetropolisParams, seed: u64) -> Result<Self, EngineError> {
        params.validate()?;
        Ok(Self {
            base: SimulationBase::seeded(seed),
            model,
            params,
        })
    }
}

impl<M: Model, R: RngCore> Metropolis<M, R> {
    /// Wraps an already-constructed simulation base.
    pub fn new(base: SimulationBase<R>, model: M, params: MetropolisParams) -> Result<Self, EngineError> {
        params.validate()?;
        Ok(Self { base, model, params })
    }

    /// The configuration being sampled.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// A clone of this engine's cancellation flag (§5).
    pub fn cancellation_flag(&self) -> crate::simulation::CancellationFlag {
        self.base.cancellation_flag()
    }

    /// Runs relaxation, then `measurement_number` measurements spaced
    /// `steps_between_measurement` inner steps apart, calling `measure` at
    /// each measurement point and collecting its results (§4.E, §6).
    ///
    /// Returns early with [`crate::simulation::RunOutcome::Cancelled`] if a
    /// termination signal is observed between measurements, carrying
    /// whatever measurements were already taken.
    pub fn run<Obs>(
        &mut self,
        mut measure: impl FnMut(&M) -> Obs,
    ) -> crate::simulation::RunOutcome<Vec<Obs>> {
        let mut observer = BoltzmannObserver {
            beta: self.params.beta,
        };

        for _ in 0..self.params.relaxation_steps {
            self.base.inner_step(&mut self.model, &mut observer);
        }

        let mut measurements = Vec::with_capacity(self.params.measurement_number as usize);
        for _ in 0..self.params.measurement_number {
            for _ in 0..self.params.steps_between_measurement {
                self.base.inner_step(&mut self.model, &mut observer);
            }
            if self.base.cancellation_flag().poll() == CancellationState::TerminateRequested {
                return crate::simulation::RunOutcome::Cancelled(measurements);
            }
            measurements.push(measure(&self.model));
        }
        crate::simulation::RunOutcome::Completed(measurements)
    }

    /// Like [`Self::run`], but feeds every measurement straight into `acc`
    /// rather than collecting a `Vec` (§4.D) — the right shape for a
    /// measurement stream too long to hold in memory at once.
    pub fn run_with_accumulator<Obs, A: Record<Obs>>(
        &mut self,
        acc: &mut A,
        mut measure: impl FnMut(&M) -> Obs,
    ) -> crate::simulation::RunOutcome<()> {
        let mut observer = BoltzmannObserver {
            beta: self.params.beta,
        };

        for _ in 0..self.params.relaxation_steps {
            self.base.inner_step(&mut self.model, &mut observer);
        }

        for _ in 0..self.params.measurement_number {
            for _ in 0..self.params.steps_between_measurement {
                self.base.inner_step(&mut self.model, &mut observer);
            }
            if self.base.cancellation_flag().poll() == CancellationState::TerminateRequested {
                return crate::simulation::RunOutcome::Cancelled(());
            }
            acc.record(measure(&self.model));
        }
        crate::simulation::RunOutcome::Completed(())
    }

    /// Atomically writes this engine's full state — RNG/dump-filename state,
    /// model, and parameters — to `path` (§5, §6) so a run can be resumed
    /// exactly where it left off, including at the original `beta` and
    /// measurement cadence (§4.E, §8: "load(save(engine)) == engine").
    pub fn save_checkpoint(
        &self,
        path: impl AsRef<std::path::Path>,
    ) -> Result<(), crate::error::CheckpointError>
    where
        M: Serialize,
        R: Serialize,
    {
        let snapshot = MetropolisCheckpoint {
            base: &self.base,
            model: &self.model,
            params: self.params,
        };
        simulation::save_checkpoint(path, &snapshot)
    }

    /// Restores an engine previously written by [`Self::save_checkpoint`],
    /// parameters included.
    pub fn load_checkpoint(
        path: impl AsRef<std::path::Path>,
    ) -> Result<Self, crate::error::CheckpointError>
    where
        M: DeserializeOwned,
        R: DeserializeOwned,
    {
        let owned: OwnedMetropolisCheckpoint<M, R> = simulation::load_checkpoint(path)?;
        owned
            .params
            .validate()
            .map_err(|e| crate::error::CheckpointError::LoadFormat(e.to_string()))?;
        Ok(Self {
            base: owned.base,
            model: owned.model,
            params: owned.params,
        })
    }
}

#[derive(Serialize)]
#[serde(bound(serialize = "M: Serialize, R: Serialize"))]
struct MetropolisCheckpoint<'a, M: Model, R: RngCore> {
    base: &'a SimulationBase<R>,
    model: &'a M,
    params: MetropolisParams,
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "M: DeserializeOwned, R: DeserializeOwned"))]
struct OwnedMetropolisCheckpoint<M: Model, R: RngCore> {
    base: SimulationBase<R>,
    model: M,
    params: MetropolisParams,
}

/// The rejection-free ("N-fold way") Metropolis variant (§4.F): instead of
/// proposing one step and accepting/rejecting it, it weighs every currently
/// executable step by its Boltzmann factor, picks one with probability
/// proportional to its weight, and always executes it — advancing
/// simulation time by `1 / sum(weights)` macro-steps' worth per pick rather
/// than one inner step per pick, since a rejection-free pick is never
/// wasted.
pub struct RejectionFreeMetropolis<M: RejectionFreeModel, R: RngCore = Rng64> {
    base: SimulationBase<R>,
    model: M,
    params: MetropolisParams,
    simulation_time: f64,
}

impl<M: RejectionFreeModel> RejectionFreeMetropolis<M, Rng64> {
    /// Creates an engine deterministically seeded from `seed`.
    pub fn seeded(model: M, params: MetropolisParams, seed: u64) -> Result<Self, EngineError> {
        params.validate()?;
        Ok(Self {
            base: SimulationBase::seeded(seed),
            model,
            params,
            simulation_time: 0.0,
        })
    }
}

impl<M: RejectionFreeModel, R: RngCore> RejectionFreeMetropolis<M, R> {
    /// The configuration being sampled.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Total simulation time (§4.F) advanced so far, in units of one
    /// ordinary Metropolis inner step.
    pub fn simulation_time(&self) -> f64 {
        self.simulation_time
    }

    /// Executes one rejection-free macro-step (§4.F): weighs every currently
    /// executable step `i` by `w_i = min(1, exp(-beta*delta_E_i)) / q_i`,
    /// picks one proportionally to its weight, commits it, and advances
    /// [`Self::simulation_time`] by a geometric waiting time
    /// `-log(rng.uniform()) / sum(w)`.
    ///
    /// No-op (and does not advance simulation time) if the model currently
    /// has no executable steps.
    pub fn macro_step(&mut self) {
        let steps = self.model.all_steps();
        let executable: Vec<&M::Step> = steps.iter().filter(|s| s.is_executable()).collect();
        let weights: Vec<f64> = executable
            .iter()
            .map(|s| {
                boltzmann_acceptance(self.params.beta, s.delta_e()).min(1.0)
                    / s.selection_probability_factor()
            })
            .collect();
        let total: f64 = weights.iter().sum();
        if total <= 0.0 || executable.is_empty() {
            return;
        }

        let pick = self.base.rng().uniform() * total;
        let mut running = 0.0;
        let mut chosen = executable[executable.len() - 1];
        for (step, w) in executable.iter().zip(&weights) {
            running += w;
            if pick < running {
                chosen = step;
                break;
            }
        }
        self.model.commit(chosen);
        self.simulation_time += -self.base.rng().uniform().ln() / total;
    }

    /// Runs relaxation macro-steps, then takes `measurement_number`
    /// measurements spaced `steps_between_measurement` units of
    /// [`Self::simulation_time`] apart (§4.F: "measurement cadence is
    /// expressed in the same simulation-time units; measurements fire
    /// whenever cumulative simulation time crosses a
    /// `steps_between_measurement` boundary").
    pub fn run<Obs>(
        &mut self,
        mut measure: impl FnMut(&M) -> Obs,
    ) -> crate::simulation::RunOutcome<Vec<Obs>> {
        for _ in 0..self.params.relaxation_steps {
            self.macro_step();
        }

        let dt = self.params.steps_between_measurement as f64;
        let mut next_boundary = self.simulation_time + dt;
        let mut measurements = Vec::with_capacity(self.params.measurement_number as usize);
        while (measurements.len() as u64) < self.params.measurement_number {
            self.macro_step();
            if self.base.cancellation_flag().poll() == CancellationState::TerminateRequested {
                return crate::simulation::RunOutcome::Cancelled(measurements);
            }
            while self.simulation_time >= next_boundary
                && (measurements.len() as u64) < self.params.measurement_number
            {
                next_boundary += dt;
                measurements.push(measure(&self.model));
            }
        }
        crate::simulation::RunOutcome::Completed(measurements)
    }
}
