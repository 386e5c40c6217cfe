//! Deterministic sub-seed derivation.
//!
//! Every resampling iteration owns its own generator, seeded from the run
//! seed and the iteration index. Results therefore do not depend on how
//! iterations are scheduled across threads.

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Derive a well-mixed seed for iteration `counter` of a run seeded with `seed`.
///
/// Uses the SplitMix64 finaliser so that adjacent counters produce
/// uncorrelated Xoshiro states.
#[inline]
pub fn counter_rng_seed(seed: u64, counter: u64) -> u64 {
    let mut z = seed
        .wrapping_add(counter.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Generator for iteration `counter` of resampling phase `salt`.
#[inline]
pub fn phase_rng(seed: u64, salt: u64, counter: u64) -> Xoshiro256PlusPlus {
    Xoshiro256PlusPlus::seed_from_u64(counter_rng_seed(seed ^ salt, counter))
}
