//! # Random number generation utilities
//!
//! This module provides the small RNG surface the simulation engines
//! actually consume (§4.A): uniform `[0,1)` doubles, bounded integer draws,
//! and deterministic reseeding. The PCG-64 algorithm is used as the default
//! RNG due to its excellent statistical properties and performance — the
//! same choice the generic Wang-Landau driver this crate grew out of made.

use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

/// Default random number generator used throughout the core.
///
/// PCG-64 is a high-quality, fast random number generator with excellent
/// statistical properties, making it suitable for Monte Carlo simulations.
pub type Rng64 = rand_pcg::Pcg64;

/// Creates a seeded PCG-64 random number generator.
///
/// Using a fixed seed allows for reproducible simulations, which is
/// crucial for testing and validation.
pub fn seeded(seed: u64) -> Rng64 {
    Rng64::seed_from_u64(seed)
}

/// Wraps an [`RngCore`] with the capability surface the simulation engines
/// rely on: uniform doubles, bounded `u32` draws, and a configurable default
/// inclusive upper bound for unqualified `uniform_u32()` calls.
///
/// No concurrency is assumed: a `SimRng` is owned exclusively by the
/// simulation that created it. `Serialize`/`Deserialize` (bounded on the
/// wrapped `R`) let an engine checkpoint the exact RNG state rather than
/// just its original seed, so a resumed run continues the same draw
/// sequence a seed alone could not reproduce.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "R: Serialize", deserialize = "R: Deserialize<'de>"))]
pub struct SimRng<R: RngCore = Rng64> {
    inner: R,
    int_max: u32,
}

impl<R: RngCore> RngCore for SimRng<R> {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }
    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest)
    }
}

impl SimRng<Rng64> {
    /// Creates a `SimRng` deterministically seeded from `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self::new(Rng64::seed_from_u64(seed))
    }
}

impl<R: RngCore> SimRng<R> {
    /// Wraps an existing RNG. The default inclusive upper bound for
    /// `uniform_u32()` is `u32::MAX`.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            int_max: u32::MAX,
        }
    }

    /// Reseeds the generator deterministically.
    pub fn seed(&mut self, seed: u64)
    where
        R: SeedableRng,
    {
        self.inner = R::seed_from_u64(seed);
    }

    /// Draws a uniform double in `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.inner.random::<f64>()
    }

    /// Draws a `u32` uniformly in `[0, int_max]`, where `int_max` is the
    /// value last set via [`Self::set_int_max`] (default `u32::MAX`).
    pub fn uniform_u32(&mut self) -> u32 {
        self.inner.random_range(0..=self.int_max)
    }

    /// Draws a `u32` uniformly in the inclusive range `[min, max]`.
    pub fn uniform_u32_in(&mut self, min: u32, max: u32) -> u32 {
        self.inner.random_range(min..=max)
    }

    /// Sets the default inclusive upper bound used by [`Self::uniform_u32`].
    pub fn set_int_max(&mut self, m: u32) {
        self.int_max = m;
    }

    /// Borrows the underlying RNG for use with `rand`'s own extension traits.
    pub fn inner_mut(&mut self) -> &mut R {
        &mut self.inner
    }
}

/// Generates a random dump-file name: 16 alphanumeric characters followed by
/// `.dat`, retried until a name that does not already exist on disk is
/// found.
///
/// This draws from its own dedicated RNG rather than the simulation's RNG
/// (Design Note §9) so that choosing a dump file name never perturbs the
/// deterministic sequence of moves a seeded simulation produces.
pub fn random_dump_filename(seed: u64) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut namer = Rng64::seed_from_u64(seed);
    loop {
        let name: String = (0..16)
            .map(|_| {
                let idx = namer.random_range(0..ALPHABET.len());
                ALPHABET[idx] as char
            })
            .chain(".dat".chars())
            .collect();
        if !std::path::Path::new(&name).exists() {
            return name;
        }
    }
}
