use rand::prelude::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};

pub mod hex;

/// Random records with lengths in `1..=max_len`, reproducible for the given seed.
pub fn data(count: usize, max_len: usize, seed: u64) -> Vec<Vec<u8>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .into_iter()
        .map(|_| {
            let mut rec = vec![0u8; rng.gen_range(1..=max_len)];
            rng.fill_bytes(&mut rec);
            rec
        })
        .collect()
}

pub fn shuffle<T>(mut items: Vec<T>, seed: u64) -> Vec<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    items.shuffle(&mut rng);
    items
}
