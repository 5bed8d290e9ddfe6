//! Seeded randomness: the per-thread PRNG, seed derivation, and the shared
//! random-string pool.
//!
//! Each step seeds from `initial_seed + step`; each worker thread derives
//! its own seed by advancing the step PRNG `thread_id` times and drawing
//! once in `[MIN_SEED, MAX_SEED]`. All randomness inside a thread then goes
//! through that thread's own [`Prng`]; nothing is shared.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Lower bound of a derived thread seed.
pub const MIN_SEED: i64 = 10_000;
/// Upper bound of a derived thread seed.
pub const MAX_SEED: i64 = 100_000;

/// Length of each entry in the random-string pool.
pub const RANDOM_STRING_LEN: usize = 32;
/// Number of entries in the random-string pool.
const POOL_SIZE: usize = 10_000;

/// Alphabet the string pool draws from.
const ALPHABET: &[u8] = b"  abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A deterministic per-thread random number generator.
#[derive(Debug, Clone)]
pub struct Prng {
    rng: ChaCha8Rng,
}

impl Prng {
    /// Creates a generator from a seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Uniform integer in `[0, upper]`, inclusive.
    pub fn int(&mut self, upper: i64) -> i64 {
        self.int_in(upper, 0)
    }

    /// Uniform integer in `[lower, upper]`, inclusive.
    pub fn int_in(&mut self, upper: i64, lower: i64) -> i64 {
        debug_assert!(upper >= lower, "bad range [{lower}, {upper}]");
        self.rng.gen_range(lower..=upper)
    }

    /// Uniform float in `[0, upper)` rendered with two decimals.
    pub fn float_str(&mut self, upper: f64, negate: bool) -> String {
        let v = self.rng.gen_range(0.0..upper.max(f64::MIN_POSITIVE));
        format!("{:.2}", if negate { -v } else { v })
    }

    /// Uniform double in `[0, upper)` rendered with five decimals.
    pub fn double_str(&mut self, upper: f64, negate: bool) -> String {
        let v = self.rng.gen_range(0.0..upper.max(f64::MIN_POSITIVE));
        format!("{:.5}", if negate { -v } else { v })
    }

    /// A random `b'0101...'` literal of the given bit length.
    pub fn bit_literal(&mut self, length: i64) -> String {
        let mut bits = String::with_capacity(length as usize + 3);
        bits.push_str("b'");
        for _ in 0..length {
            bits.push(if self.int(1) == 1 { '1' } else { '0' });
        }
        bits.push('\'');
        bits
    }

    /// A random DATE in years 1000-9999.
    pub fn date(&mut self) -> String {
        format!(
            "{:04}-{:02}-{:02}",
            self.int_in(9999, 1000),
            self.int_in(12, 1),
            self.int_in(28, 1)
        )
    }

    /// A random DATETIME in years 1000-9999.
    pub fn datetime(&mut self) -> String {
        format!("{} {}", self.date(), self.clock())
    }

    /// A random TIMESTAMP in years 1971-2037.
    pub fn timestamp(&mut self) -> String {
        format!(
            "{:04}-{:02}-{:02} {}",
            self.int_in(2037, 1971),
            self.int_in(12, 1),
            self.int_in(28, 1),
            self.clock()
        )
    }

    /// Hour, minute and second each land on 0 or 1 so that equal values are
    /// common enough to make time predicates selective.
    fn clock(&mut self) -> String {
        format!("{:02}:{:02}:{:02}", self.int(1), self.int(1), self.int(1))
    }
}

/// Derives the seed for a worker thread from the step seed.
pub fn thread_seed(initial_seed: i64, step: i64, thread_id: usize) -> i64 {
    let mut rng = Prng::from_seed((initial_seed + step) as u64);
    for _ in 0..thread_id {
        rng.int_in(MAX_SEED, MIN_SEED);
    }
    rng.int_in(MAX_SEED, MIN_SEED)
}

/// A pool of pre-generated random strings, built once per step and shared
/// read-only by every thread.
#[derive(Debug)]
pub struct StringPool {
    strs: Vec<String>,
}

impl StringPool {
    /// Generates the pool from the step seed.
    pub fn generate(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let strs = (0..POOL_SIZE)
            .map(|_| {
                (0..RANDOM_STRING_LEN)
                    .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
                    .collect()
            })
            .collect();
        Self { strs }
    }

    /// A random string whose length is drawn in `[lower, upper]`, stitched
    /// from pool entries.
    pub fn rand_string(&self, rng: &mut Prng, upper: i64, lower: i64) -> String {
        debug_assert!(upper >= 2 && upper >= lower);
        let mut size = rng.int_in(upper, lower);
        let mut out = String::with_capacity(size as usize);
        while size > 0 {
            let entry = &self.strs[rng.int(self.strs.len() as i64 - 1) as usize];
            if size as usize > RANDOM_STRING_LEN {
                out.push_str(entry);
            } else {
                out.push_str(&entry[..size as usize]);
            }
            size -= RANDOM_STRING_LEN as i64;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = Prng::from_seed(7);
        let mut b = Prng::from_seed(7);
        for _ in 0..100 {
            assert_eq!(a.int(1000), b.int(1000));
        }
    }

    #[test]
    fn int_in_is_inclusive() {
        let mut rng = Prng::from_seed(1);
        let mut seen_lower = false;
        let mut seen_upper = false;
        for _ in 0..1000 {
            let v = rng.int_in(3, 1);
            assert!((1..=3).contains(&v));
            seen_lower |= v == 1;
            seen_upper |= v == 3;
        }
        assert!(seen_lower && seen_upper);
    }

    #[test]
    fn thread_seed_is_deterministic_and_distinct() {
        let a = thread_seed(42, 1, 0);
        let b = thread_seed(42, 1, 0);
        assert_eq!(a, b);
        assert!((MIN_SEED..=MAX_SEED).contains(&a));

        let c = thread_seed(42, 1, 1);
        assert!((MIN_SEED..=MAX_SEED).contains(&c));
        // Different thread ids come from different points of the step stream.
        assert_ne!(a, c);
    }

    #[test]
    fn date_shapes() {
        let mut rng = Prng::from_seed(3);
        let d = rng.date();
        assert_eq!(d.len(), 10);
        let ts = rng.timestamp();
        let year: i32 = ts[..4].parse().unwrap();
        assert!((1971..=2037).contains(&year));
    }

    #[test]
    fn pool_strings_have_fixed_length() {
        let pool = StringPool::generate(9);
        let mut rng = Prng::from_seed(9);
        let s = pool.rand_string(&mut rng, 10, 5);
        assert!((5..=10).contains(&(s.len() as i64)));
        let long = pool.rand_string(&mut rng, 80, 70);
        assert!((70..=80).contains(&(long.len() as i64)));
    }

    #[test]
    fn bit_literal_shape() {
        let mut rng = Prng::from_seed(4);
        let b = rng.bit_literal(8);
        assert!(b.starts_with("b'") && b.ends_with('\''));
        assert_eq!(b.len(), 8 + 3);
    }
}
