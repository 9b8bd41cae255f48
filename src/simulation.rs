//! # Simulation base (§4.E)
//!
//! The shared engine skeleton every driver in [`crate::metropolis`],
//! [`crate::wang_landau`] and [`crate::multicanonical`] is built on: RNG
//! ownership, the random dump filename, cooperative cancellation, and the
//! generic inner acceptance loop.
//!
//! This is the direct generalization of
//! the teacher crate's own step loop's propose/accept/bookkeep sequence: the
//! teacher hard-codes "propose, compare bins, accept-or-revert" for exactly
//! one algorithm; [`SimulationBase::inner_step`] factors that shape out
//! behind a small [`StepObserver`] trait so Metropolis and Wang-Landau can
//! both drive it with their own acceptance rule and bookkeeping.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CheckpointError;
use crate::model::Model;
use crate::rng::{random_dump_filename, Rng64, SimRng};

/// The cooperative-cancellation state a running engine observes at every
/// macro-step boundary (§5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CancellationState {
    /// No signal pending.
    #[default]
    None,
    /// A termination signal has been observed; the engine should return
    /// partial results at the next safe point.
    TerminateRequested,
    /// The first user hook fired; its handler runs once, then the flag
    /// resets to `None`.
    UserHook1Fired,
    /// The second user hook fired; its handler runs once, then the flag
    /// resets to `None`.
    UserHook2Fired,
}

/// An atomic flag carrying [`CancellationState`], shared rather than
/// interrupt-driven (§9 Design Note: "signal handling as flag, not
/// interrupt"). Cloning a `CancellationFlag` shares the same underlying
/// state, so an OS signal handler installed once per process (or a test
/// harness) can request termination from outside the engine's own thread.
#[derive(Debug, Clone)]
pub struct CancellationFlag(Arc<AtomicU8>);

impl CancellationFlag {
    /// Creates a flag in the `None` state.
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(0)))
    }

    /// Requests termination. Observed by the next [`Self::poll`] call.
    pub fn request_terminate(&self) {
        self.0.store(1, Ordering::SeqCst);
    }

    /// Fires user hook 1.
    pub fn fire_user1(&self) {
        self.0.store(2, Ordering::SeqCst);
    }

    /// Fires user hook 2.
    pub fn fire_user2(&self) {
        self.0.store(3, Ordering::SeqCst);
    }

    fn raw(&self) -> CancellationState {
        match self.0.load(Ordering::SeqCst) {
            1 => CancellationState::TerminateRequested,
            2 => CancellationState::UserHook1Fired,
            3 => CancellationState::UserHook2Fired,
            _ => CancellationState::None,
        }
    }

    /// Reads the current state. User-hook states reset to `None` as a side
    /// effect of being observed (§4.E: "User-hook fires invoke their
    /// handlers and reset the flag"); `TerminateRequested` is sticky, since
    /// the engine is expected to stop, not keep running.
    pub fn poll(&self) -> CancellationState {
        let state = self.raw();
        if matches!(
            state,
            CancellationState::UserHook1Fired | CancellationState::UserHook2Fired
        ) {
            self.0.store(0, Ordering::SeqCst);
        }
        state
    }
}

impl Default for CancellationFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// The result of an engine's `run` entry point: either it ran to
/// completion, or a termination signal cut it short (§4.E, §5).
///
/// Represented as a variant carrying the partial result rather than an
/// `Err`, since a user-requested stop is an ordinary outcome, not a
/// failure — whatever measurements were already taken are still valid data.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome<T> {
    /// The run completed every requested step/measurement.
    Completed(T),
    /// A termination signal was observed before completion; `T` carries
    /// whatever partial result had been produced up to that point.
    Cancelled(T),
}

impl<T> RunOutcome<T> {
    /// The inner value regardless of whether the run completed or was
    /// cancelled.
    pub fn into_inner(self) -> T {
        match self {
            RunOutcome::Completed(v) | RunOutcome::Cancelled(v) => v,
        }
    }

    /// Whether the run was cut short by a termination signal.
    pub fn was_cancelled(&self) -> bool {
        matches!(self, RunOutcome::Cancelled(_))
    }
}

/// The acceptance rule and bookkeeping a concrete engine (Metropolis,
/// Wang-Landau) plugs into [`SimulationBase::inner_step`] (§4.E point 3-5).
///
/// Default no-op bodies let an engine override only what it needs — the
/// rejection-free Metropolis variant implements its own stepping entirely
/// and never uses this trait.
pub trait StepObserver<M: Model> {
    /// `a` in `a/q >= 1 || rng.uniform() < a/q` (§4.E point 3).
    fn acceptance_probability(&mut self, step: &M::Step, model: &M) -> f64;

    /// Called after `step` is committed to `model`.
    fn handle_executed_step(&mut self, _step: &M::Step, _model: &M) {}

    /// Called when `step` was vetoed (`!is_executable()`) or rejected by the
    /// acceptance test.
    fn handle_rejected_step(&mut self, _step: &M::Step, _model: &M) {}
}

/// Owns the RNG, dump filename, and cancellation flag shared by every
/// concrete engine, and implements the inner acceptance loop template
/// (§4.E).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "R: Serialize", deserialize = "R: Deserialize<'de>"))]
pub struct SimulationBase<R: RngCore = Rng64> {
    rng: SimRng<R>,
    dump_filename: String,
    #[serde(skip)]
    cancellation: CancellationFlag,
}

impl SimulationBase<Rng64> {
    /// Creates a base deterministically seeded from `seed`, with a freshly
    /// chosen dump filename.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(SimRng::seeded(seed))
    }
}

impl<R: RngCore> SimulationBase<R> {
    /// Wraps an already-constructed RNG.
    pub fn with_rng(rng: SimRng<R>) -> Self {
        Self {
            rng,
            dump_filename: random_dump_filename(rand::random()),
            cancellation: CancellationFlag::new(),
        }
    }

    /// The RNG this base owns.
    pub fn rng(&mut self) -> &mut SimRng<R> {
        &mut self.rng
    }

    /// The current dump filename.
    pub fn dump_filename(&self) -> &str {
        &self.dump_filename
    }

    /// Overrides the dump filename (§6: "regenerated on construction unless
    /// the caller sets it explicitly").
    pub fn set_dump_filename(&mut self, name: impl Into<String>) {
        self.dump_filename = name.into();
    }

    /// A clone of this base's cancellation flag, shareable with an external
    /// signal handler or test harness.
    pub fn cancellation_flag(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    /// Runs one inner acceptance-loop step (§4.E):
    ///
    /// 1. propose a step from `model`,
    /// 2. veto it via [`StepObserver::handle_rejected_step`] if not executable,
    /// 3. otherwise weigh it by `acceptance_probability(step) / selection_probability_factor()`,
    /// 4. execute-and-notify or reject-and-notify accordingly.
    pub fn inner_step<M, O>(&mut self, model: &mut M, observer: &mut O)
    where
        M: Model,
        O: StepObserver<M>,
    {
        let step = model.propose_step(&mut self.rng);
        if !step.is_executable() {
            observer.handle_rejected_step(&step, model);
            return;
        }
        let a = observer.acceptance_probability(&step, model);
        let q = step.selection_probability_factor();
        let ratio = if q > 0.0 { a / q } else { f64::INFINITY };
        if ratio >= 1.0 || self.rng.uniform() < ratio {
            model.commit(&step);
            observer.handle_executed_step(&step, model);
        } else {
            observer.handle_rejected_step(&step, model);
        }
    }
}

/// `path` -> `path.tmp`: appends a literal `.tmp` suffix to the whole file
/// name, as opposed to replacing the extension (§5, §6).
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Atomically writes a checkpoint archive to `path` (§5): if a file already
/// exists there it is moved aside to `path.tmp` first, so a concurrent
/// reader never observes a truncated file; the backup is removed once the
/// new archive is written successfully, or restored if writing fails.
pub fn save_checkpoint<T: Serialize>(path: impl AsRef<Path>, state: &T) -> Result<(), CheckpointError> {
    let path = path.as_ref();
    let tmp = tmp_path(path);
    let had_existing = path.exists();
    if had_existing {
        fs::rename(path, &tmp)?;
    }
    let json = serde_json::to_vec_pretty(state)?;
    match fs::write(path, json) {
        Ok(()) => {
            if had_existing {
                let _ = fs::remove_file(&tmp);
            }
            Ok(())
        }
        Err(e) => {
            if had_existing {
                let _ = fs::rename(&tmp, path);
            }
            Err(CheckpointError::Io(e))
        }
    }
}

/// Reads back a checkpoint archive written by [`save_checkpoint`]. Does not
/// mutate any caller state on failure (§7: `CheckpointIoFailure` /
/// `LoadFormatError` "leave engine state untouched" / "surface; engine
/// unchanged").
pub fn load_checkpoint<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, CheckpointError> {
    let data = fs::read(path.as_ref())?;
    serde_json::from_slice(&data).map_err(CheckpointError::from)
}

/// Registers `SIGTERM`, `SIGUSR1` and `SIGUSR2` handlers that drive `flag`,
/// mirroring `register_posix_signal_handler` from the original C++ base
/// (§6) without baking libc signal state into the engine itself: a host
/// binary opts in by calling this once at startup, the engine itself never
/// touches `signal(2)`.
///
/// Available only with the `posix-signals` feature, and only on Unix.
#[cfg(all(feature = "posix-signals", unix))]
pub fn install_posix_handlers(flag: CancellationFlag) -> Result<(), std::io::Error> {
    use signal_hook::consts::{SIGTERM, SIGUSR1, SIGUSR2};
    use signal_hook::flag as signal_flag;
    use std::sync::atomic::AtomicBool;

    let terminate = Arc::new(AtomicBool::new(false));
    signal_flag::register(SIGTERM, Arc::clone(&terminate))?;
    let user1 = Arc::new(AtomicBool::new(false));
    signal_flag::register(SIGUSR1, Arc::clone(&user1))?;
    let user2 = Arc::new(AtomicBool::new(false));
    signal_flag::register(SIGUSR2, Arc::clone(&user2))?;

    std::thread::spawn(move || loop {
        if terminate.swap(false, Ordering::SeqCst) {
            flag.request_terminate();
            break;
        }
        if user1.swap(false, Ordering::SeqCst) {
            flag.fire_user1();
        }
        if user2.swap(false, Ordering::SeqCst) {
            flag.fire_user2();
        }
        std::thread::sleep(std::time::Duration::from_millis(50));
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_flag_terminate_is_sticky() {
        let flag = CancellationFlag::new();
        assert_eq!(flag.poll(), CancellationState::None);
        flag.request_terminate();
        assert_eq!(flag.poll(), CancellationState::TerminateRequested);
        assert_eq!(flag.poll(), CancellationState::TerminateRequested);
    }

    #[test]
    fn cancellation_flag_user_hooks_reset_after_poll() {
        let flag = CancellationFlag::new();
        flag.fire_user1();
        assert_eq!(flag.poll(), CancellationState::UserHook1Fired);
        assert_eq!(flag.poll(), CancellationState::None);

        flag.fire_user2();
        assert_eq!(flag.poll(), CancellationState::UserHook2Fired);
        assert_eq!(flag.poll(), CancellationState::None);
    }

    #[test]
    fn checkpoint_round_trips_and_leaves_no_tmp_file_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        save_checkpoint(&path, &SimRng::seeded(7)).unwrap();
        let tmp = tmp_path(&path);
        assert!(!tmp.exists());

        let _restored: SimRng<Rng64> = load_checkpoint(&path).unwrap();

        // A second save moves the first archive aside then replaces it.
        save_checkpoint(&path, &SimRng::seeded(8)).unwrap();
        assert!(!tmp.exists());
        assert!(path.exists());
    }
}
