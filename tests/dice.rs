//! Test the Wang-Landau algorithm on a six-sided die model.
//!
//! This test verifies that the Wang-Landau algorithm correctly estimates
//! the density of states for a system with six equally probable states.

use mocasinns_core::prelude::*;
use rand::{Rng, RngCore};

/// A system representing a six-sided die with values 1-6.
#[derive(Clone)]
struct Dice(i64);

/// A move that randomly rolls the die to a new face.
#[derive(Clone, Copy)]
struct Roll {
    to_face: i64,
    delta: f64,
}

impl StepSpec for Roll {
    type Energy = f64;
    fn delta_e(&self) -> f64 {
        self.delta
    }
}

impl Model for Dice {
    type Energy = f64;
    type Step = Roll;

    fn energy(&self) -> f64 {
        self.0 as f64
    }

    fn propose_step<R: RngCore>(&mut self, rng: &mut R) -> Roll {
        let to_face = rng.random_range(1..=6);
        Roll {
            to_face,
            delta: to_face as f64 - self.energy(),
        }
    }

    fn commit(&mut self, step: &Roll) {
        self.0 = step.to_face;
    }
}

/// Since all six faces are equally probable, the estimated density of states
/// should come out approximately flat across all six bins.
#[test]
fn dice_entropy_constant() {
    let _ = env_logger::try_init();
    let params = WangLandauParams {
        modification_factor_initial: 1.0,
        modification_factor_final: 1e-7,
        modification_factor_multiplier: 0.5,
        flatness: 0.8,
        sweep_len: 1,
    };

    let mut engine = WangLandau::seeded(Dice(1), params, 2025).unwrap();
    let outcome = engine.run();
    assert!(!outcome.was_cancelled(), "run should complete, not cancel");

    let g = engine.get_density_of_states();
    assert_eq!(g.bin_count(), 6);
    let (min, max) = g
        .iter()
        .map(|(_, v)| *v)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(a, b), x| {
            (a.min(x), b.max(x))
        });
    assert!(max - min < 2.0, "spread of ln(g) values too large: {}", max - min);
}
