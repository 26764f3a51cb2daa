//! Splittable, single-use PRNG keys.
//!
//! All randomness in the sampler flows from a root [`Key`]. Splitting a key
//! yields statistically independent children and consumes the parent; drawing
//! from a key consumes it too. `Key` is deliberately neither `Clone` nor
//! `Copy`, so reusing a key is a compile error rather than a silent
//! correlation bug.

use crate::tree::ParamTree;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// An opaque handle to a deterministic pseudo-random stream.
///
/// Every operation takes `self` by value: a key is consumed by exactly one
/// split or draw.
#[derive(Debug, PartialEq, Eq)]
pub struct Key {
    seed: [u8; 32],
}

impl Key {
    /// Derives a root key from a 64-bit seed.
    pub fn from_seed(seed: u64) -> Key {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Key { seed: bytes }
    }

    fn stream(self) -> ChaCha8Rng {
        ChaCha8Rng::from_seed(self.seed)
    }

    /// Splits into `n` independent child keys, consuming the parent.
    ///
    /// Children are produced in index order; the same parent always yields
    /// the same children.
    pub fn split(self, n: usize) -> Vec<Key> {
        let mut rng = self.stream();
        (0..n)
            .map(|_| {
                let mut bytes = [0u8; 32];
                rng.fill_bytes(&mut bytes);
                Key { seed: bytes }
            })
            .collect()
    }

    /// Splits into two keys.
    pub fn split2(self) -> (Key, Key) {
        let mut keys = self.split(2);
        let b = keys.pop().expect("split(2) yields two keys");
        let a = keys.pop().expect("split(2) yields two keys");
        (a, b)
    }

    /// Splits into three keys.
    pub fn split3(self) -> (Key, Key, Key) {
        let mut keys = self.split(3);
        let c = keys.pop().expect("split(3) yields three keys");
        let b = keys.pop().expect("split(3) yields three keys");
        let a = keys.pop().expect("split(3) yields three keys");
        (a, b, c)
    }

    /// Draws a single uniform value in `[0, 1)`, consuming the key.
    pub fn uniform(self) -> f64 {
        self.stream().random::<f64>()
    }

    /// Draws a same-structure tree of standard-normal values, consuming the
    /// key.
    pub fn standard_normal_like(self, tree: &ParamTree) -> ParamTree {
        let mut rng = self.stream();
        tree.standard_normal_like(&mut rng)
    }
}
