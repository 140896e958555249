//! Seeded randomness for simulated backends.
//!
//! Everything a simulation decides (how many steps, which filler line,
//! whether a fault fires) goes through [`DeterministicRng`], so one `u64`
//! replays a whole run. The draws are deliberately few and domain-shaped;
//! a new kind of decision gets a new method rather than raw access to the
//! generator.

use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

/// A run drawing this many values is almost certainly stuck retrying.
const DRAWS_MAX: u64 = 1_000_000_000;

/// Deterministic source for simulation decisions (Xoshiro256**).
///
/// ```rust
/// use sw_dst::DeterministicRng;
///
/// let mut a = DeterministicRng::new(12345);
/// let mut b = DeterministicRng::new(12345);
/// assert_eq!(a.count_up_to(10), b.count_up_to(10));
/// ```
pub struct DeterministicRng {
    seed: u64,
    rng: Xoshiro256StarStar,
    draws_count: u64,
}

impl DeterministicRng {
    /// Seeded source. Zero seeds are accepted but discouraged.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        debug_assert!(seed != 0, "Seed should not be zero");
        Self {
            seed,
            rng: Xoshiro256StarStar::seed_from_u64(seed),
            draws_count: 0,
        }
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Decisions drawn so far.
    #[must_use]
    pub fn draws_count(&self) -> u64 {
        self.draws_count
    }

    fn draw(&mut self) -> &mut Xoshiro256StarStar {
        self.draws_count += 1;
        debug_assert!(self.draws_count < DRAWS_MAX, "Runaway simulation");
        &mut self.rng
    }

    /// True with `probability`.
    pub fn chance(&mut self, probability: f64) -> bool {
        debug_assert!((0.0..=1.0).contains(&probability), "Probability must be in [0, 1]");
        self.draw().gen_bool(probability)
    }

    /// Uniform count in `0..=count_max`.
    pub fn count_up_to(&mut self, count_max: u32) -> u32 {
        self.draw().gen_range(0..=count_max)
    }

    /// Uniform count in `count_min..=count_max`.
    pub fn count_between(&mut self, count_min: u32, count_max: u32) -> u32 {
        debug_assert!(count_min <= count_max, "Empty count range");
        self.draw().gen_range(count_min..=count_max)
    }

    /// One element of `items`, or `None` when it is empty.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        items.choose(self.draw())
    }

    /// Independent stream for another component.
    ///
    /// Extra draws on one fork never shift the values seen by another.
    #[must_use]
    pub fn fork(&mut self) -> Self {
        let seed = self.draw().next_u64().max(1);
        Self::new(seed)
    }
}
