//! Test the Wang-Landau algorithm on a simple coin flip model.
//!
//! This test verifies that the Wang-Landau algorithm correctly estimates
//! the density of states for a system with two equally probable states.

use mocasinns_core::prelude::*;
use rand::RngCore;

/// A simple two-state system representing a coin (heads or tails). Its
/// energy is just an arbitrary label distinguishing the two faces: `0.0` for
/// tails, `1.0` for heads.
#[derive(Clone)]
struct Coin(bool);

/// The only possible move: flip to the other face.
#[derive(Clone, Copy)]
struct Flip {
    delta: f64,
}

impl StepSpec for Flip {
    type Energy = f64;
    fn delta_e(&self) -> f64 {
        self.delta
    }
}

impl Model for Coin {
    type Energy = f64;
    type Step = Flip;

    fn energy(&self) -> f64 {
        if self.0 {
            1.0
        } else {
            0.0
        }
    }

    fn propose_step<R: RngCore>(&mut self, _rng: &mut R) -> Flip {
        let after = if self.0 { 0.0 } else { 1.0 };
        Flip {
            delta: after - self.energy(),
        }
    }

    fn commit(&mut self, _step: &Flip) {
        self.0 = !self.0;
    }
}

/// Since both faces are equally probable, the estimated density of states
/// should come out approximately flat: `ln g(0) ~= ln g(1)`.
#[test]
fn coin_ln_g_flat() {
    let _ = env_logger::try_init();
    let params = WangLandauParams {
        modification_factor_initial: 1.0,
        modification_factor_final: 1e-6,
        modification_factor_multiplier: 0.5,
        flatness: 0.8,
        sweep_len: 1,
    };

    let mut engine = WangLandau::seeded(Coin(false), params, 42).unwrap();
    let outcome = engine.run();
    assert!(!outcome.was_cancelled(), "run should complete, not cancel");

    let g = engine.get_density_of_states();
    assert_eq!(g.bin_count(), 2);
    let d = (*g.get(0.0).unwrap() - *g.get(1.0).unwrap()).abs();
    assert!(d < 2.0, "ln g difference is too large: {d}");
}
