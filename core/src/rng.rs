//! Deterministic random number generation.
//!
//! RULE: Nothing in the simulation may call any platform RNG.
//! All randomness flows through RandomSource instances derived
//! from the single master seed in SimConfig.
//!
//! Each persona gets its own stream, seeded deterministically
//! from (master_seed XOR stream_index). This means:
//!   - A persona's draws never depend on how many personas exist
//!     or on the order they are visited in.
//!   - Each persona's stream is fully reproducible in isolation.

use crate::{
    error::{SimError, SimResult},
    types::PersonaIndex,
};
use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

const STREAM_MIX: u64 = 0x9e37_79b9_7f4a_7c15;

/// A named, deterministic RNG for a single stream.
pub struct RandomSource {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl RandomSource {
    pub fn new(seed: u64) -> Self {
        Self {
            name: "unnamed",
            inner: Pcg64Mcg::seed_from_u64(seed),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Reset this source to the start of the sequence for `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.inner = Pcg64Mcg::seed_from_u64(seed);
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Draw a raw u64 (full range).
    pub fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Pick one item with probability proportional to its weight.
    ///
    /// Always consumes exactly one draw, including for a single candidate.
    /// Negative and non-finite weights count as zero.
    pub fn weighted_choice<'a, T>(&mut self, choices: &'a [(T, f64)]) -> SimResult<&'a T> {
        let total: f64 = choices.iter().map(|(_, w)| usable_weight(*w)).sum();
        if !(total > 0.0 && total.is_finite()) {
            return Err(SimError::InvalidDistribution);
        }

        let roll = self.next_f64() * total;
        let mut cumulative = 0.0;
        let mut last_positive = None;
        for (item, weight) in choices {
            let w = usable_weight(*weight);
            if w == 0.0 {
                continue;
            }
            cumulative += w;
            last_positive = Some(item);
            if roll < cumulative {
                return Ok(item);
            }
        }
        // Float accumulation can leave roll a hair above the final bound.
        last_positive.ok_or(SimError::InvalidDistribution)
    }

    /// Fisher–Yates shuffle driven by this stream.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_u64_below(i as u64 + 1) as usize;
            items.swap(i, j);
        }
    }
}

fn usable_weight(w: f64) -> f64 {
    if w.is_finite() && w > 0.0 { w } else { 0.0 }
}

/// Derives every stream for a single run from the master seed.
pub struct SeedBank {
    master_seed: u64,
}

impl SeedBank {
    /// Stream 0 orders personas; persona `i` owns stream `i + 1`.
    const SCHEDULER_STREAM: u64 = 0;

    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    pub fn stream_seed(&self, stream_index: u64) -> u64 {
        self.master_seed ^ stream_index.wrapping_mul(STREAM_MIX)
    }

    pub fn for_scheduler(&self) -> RandomSource {
        RandomSource::new(self.stream_seed(Self::SCHEDULER_STREAM)).with_name("scheduler")
    }

    pub fn for_persona(&self, index: PersonaIndex) -> RandomSource {
        RandomSource::new(self.stream_seed(index as u64 + 1)).with_name("persona")
    }
}
