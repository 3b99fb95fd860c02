use ndarray::Array2;

/// Marks a neighbor slot with no train vector behind it.
pub const NEIGHBOR_SENTINEL: i32 = -1;
/// Distance stored alongside a `NEIGHBOR_SENTINEL` slot.
pub const DISTANCE_SENTINEL: f32 = -1.0;

pub const TRAIN_DATASET: &str = "train";
pub const TEST_DATASET: &str = "test";
pub const NEIGHBORS_DATASET: &str = "neighbors";
pub const DISTANCES_DATASET: &str = "distances";
pub const TRAIN_IDS_DATASET: &str = "train_ids";
pub const TEST_IDS_DATASET: &str = "test_ids";

/// Group assignment of train vectors and group restriction of queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicates {
    /// Group id of every train vector, indexed by train row.
    pub train_ids: Vec<i32>,
    /// Sorted, distinct group ids each query is restricted to.
    pub test_ids: Vec<Vec<i32>>,
}

impl Predicates {
    /// Whether train row `train_idx` is eligible as a neighbor of query `query_idx`.
    pub fn is_eligible(&self, query_idx: usize, train_idx: usize) -> bool {
        self.test_ids[query_idx].contains(&self.train_ids[train_idx])
    }
}

/// A complete benchmark dataset, as generated or as loaded back from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct KnnDataset {
    pub train: Array2<f32>,
    pub test: Array2<f32>,
    pub neighbors: Array2<i32>,
    pub distances: Array2<f32>,
    pub predicates: Option<Predicates>,
    /// Seed the dataset was generated from, when known.
    pub seed: Option<u64>,
}

impl KnnDataset {
    pub fn dimension(&self) -> usize {
        self.train.ncols()
    }

    pub fn train_count(&self) -> usize {
        self.train.nrows()
    }

    pub fn test_count(&self) -> usize {
        self.test.nrows()
    }

    pub fn num_neighbors(&self) -> usize {
        self.neighbors.ncols()
    }
}
