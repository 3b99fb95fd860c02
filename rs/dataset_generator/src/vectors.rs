use ndarray::Array2;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;

/// Dense `num_vectors x dimension` matrix with independent entries drawn uniformly from [0, 1).
pub fn generate_uniform_vectors<R: Rng + ?Sized>(
    rng: &mut R,
    num_vectors: usize,
    dimension: usize,
) -> Array2<f32> {
    Array2::random_using((num_vectors, dimension), Uniform::new(0.0f32, 1.0f32), rng)
}

/// Generates the train matrix, then the test matrix, from the same generator.
pub fn generate_train_and_test<R: Rng + ?Sized>(
    rng: &mut R,
    train_count: usize,
    test_count: usize,
    dimension: usize,
) -> (Array2<f32>, Array2<f32>) {
    let train = generate_uniform_vectors(rng, train_count, dimension);
    let test = generate_uniform_vectors(rng, test_count, dimension);
    (train, test)
}
