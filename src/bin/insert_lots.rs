use stripemap::HashSet;

use rayon::prelude::*;

fn main() {
    const N_KEYS: usize = 10_000_000;

    let set = HashSet::new();

    (0..N_KEYS).into_par_iter().for_each(|key| {
        set.add(key).expect("bucket counts this small are always representable");
    });

    assert_eq!(set.n_keys(), N_KEYS);
    assert!(set.n_buckets() >= N_KEYS);
}
