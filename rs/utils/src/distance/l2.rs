use crate::DistanceCalculator;

const LANES: usize = 8;

pub struct L2DistanceCalculator {}

impl L2DistanceCalculator {
    /// Accumulates squared differences in `LANES` independent partial sums so the compiler can
    /// vectorize the inner loop on stable.
    pub fn calculate_squared_unrolled(a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        let mut lanes = [0.0f32; LANES];
        let a_chunks = a.chunks_exact(LANES);
        let b_chunks = b.chunks_exact(LANES);
        let a_rem = a_chunks.remainder();
        let b_rem = b_chunks.remainder();
        for (x, y) in a_chunks.zip(b_chunks) {
            for i in 0..LANES {
                let diff = x[i] - y[i];
                lanes[i] += diff * diff;
            }
        }
        let mut dist = 0.0;
        for (&x, &y) in a_rem.iter().zip(b_rem.iter()) {
            dist += (x - y).powi(2);
        }
        lanes.iter().sum::<f32>() + dist
    }

    pub fn calculate_squared_scalar(a: &[f32], b: &[f32]) -> f32 {
        a.iter()
            .zip(b.iter())
            .map(|(&x, &y)| (x - y).powi(2))
            .sum::<f32>()
    }

    pub fn calculate_scalar(a: &[f32], b: &[f32]) -> f32 {
        Self::calculate_squared_scalar(a, b).sqrt()
    }
}

impl DistanceCalculator for L2DistanceCalculator {
    fn calculate(a: &[f32], b: &[f32]) -> f32 {
        Self::calculate_squared(a, b).sqrt()
    }

    fn calculate_squared(a: &[f32], b: &[f32]) -> f32 {
        if a.len() < 32 {
            Self::calculate_squared_scalar(a, b)
        } else {
            Self::calculate_squared_unrolled(a, b)
        }
    }
}
