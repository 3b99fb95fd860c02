use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// Generate a random vector with a given dimension
pub fn generate_random_vector(dimension: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    let mut vector = vec![];
    for _ in 0..dimension {
        vector.push(rng.gen::<f32>());
    }
    vector
}

/// Flattened `num_vectors x dimension` matrix with entries in [0, 1), reproducible from `seed`.
pub fn generate_seeded_vectors(num_vectors: usize, dimension: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..num_vectors * dimension).map(|_| rng.gen::<f32>()).collect()
}
