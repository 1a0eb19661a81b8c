use rand::Rng;

/// Uniform Fisher–Yates permutation of `0..len`. The randomness source is
/// explicit so attempt creation stays deterministic under a seeded rng in
/// tests while production draws fresh entropy per attempt.
pub fn permutation<R: Rng>(len: usize, rng: &mut R) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    for i in (1..order.len()).rev() {
        let j = rng.gen_range(0..=i);
        order.swap(i, j);
    }
    order
}

pub fn shuffled<T: Clone, R: Rng>(items: &[T], rng: &mut R) -> Vec<T> {
    permutation(items.len(), rng)
        .into_iter()
        .map(|i| items[i].clone())
        .collect()
}
