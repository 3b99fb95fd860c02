pub mod distance;
pub mod test_utils;

pub trait DistanceCalculator {
    fn calculate(a: &[f32], b: &[f32]) -> f32;

    /// Squared distance. Enough for ranking when the true distance is not needed.
    fn calculate_squared(a: &[f32], b: &[f32]) -> f32;
}
