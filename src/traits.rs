//! # Modification-factor schedule contract
//!
//! The only abstraction left here after [`crate::model::Model`]/[`crate::model::StepSpec`]
//! took over the configuration/step contract and [`crate::flatness::Flatness`]
//! took over the flatness criterion: the [`Schedule`] trait controlling how
//! the Wang-Landau modification factor (`ln_f`) decays between epochs.

/// Controls how the modification factor (`ln_f`) changes once a Wang-Landau
/// epoch's incidence histogram is judged flat (§4.G).
///
/// # Example
///
/// ```
/// use mocasinns_core::prelude::*;
///
/// struct CustomSchedule {
///     step: u64,
///     tol: f64,
/// }
///
/// impl Schedule for CustomSchedule {
///     fn update(&mut self, ln_f: &mut f64) -> bool {
///         self.step += 1;
///         *ln_f = 1.0 / (self.step as f64).sqrt();
///         *ln_f < self.tol
///     }
/// }
/// ```
pub trait Schedule {
    /// Updates the modification factor in place, returning whether the
    /// schedule itself now considers the run converged.
    ///
    /// The engine's own termination condition (`ln_f <=
    /// modification_factor_final`) is authoritative; this return value is
    /// informational only (see [`crate::wang_landau::WangLandau::run`]).
    fn update(&mut self, ln_f: &mut f64) -> bool;
}
