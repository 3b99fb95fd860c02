use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::enums::DistanceType;

pub const DEFAULT_NUM_NEIGHBORS: usize = 100;
pub const DEFAULT_GROUP_SIZE: usize = 100;
pub const DEFAULT_MAX_GROUPS_PER_QUERY: usize = 5;

/// Config for generating a KNN benchmark dataset.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DatasetConfig {
    /// Number of train (database) vectors.
    /// Default: 1000
    pub train_count: usize,

    /// Dimensionality of both train and test vectors.
    /// Default: 128
    pub dimension: usize,

    /// Number of test (query) vectors.
    /// Default: 100
    pub test_count: usize,

    /// Destination HDF5 file. The file name may contain bracketed tokens such as `[d]` or
    /// `[b]`, which are resolved from the dataset shape before writing.
    pub output_path: String,

    /// Partition the train vectors into groups and restrict every query to a random subset of
    /// those groups.
    /// Default: false
    pub use_predicates: bool,

    /// Number of ground truth neighbors stored per query.
    /// Default: 100
    pub num_neighbors: usize,

    /// Number of consecutive train vectors that share a group id.
    /// Default: 100
    pub group_size: usize,

    /// Upper bound on the number of groups associated with a query.
    /// Default: 5
    pub max_groups_per_query: usize,

    /// Seed for the random number generator. A random seed is chosen (and recorded in the
    /// output file) when unset.
    pub seed: Option<u64>,

    /// Replace the output file if it already exists.
    /// Default: false
    pub overwrite: bool,

    /// Distance used for ground truth.
    /// Default: L2
    pub distance_type: DistanceType,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            train_count: 1000,
            dimension: 128,
            test_count: 100,
            output_path: String::from("dataset.hdf5"),
            use_predicates: false,
            num_neighbors: DEFAULT_NUM_NEIGHBORS,
            group_size: DEFAULT_GROUP_SIZE,
            max_groups_per_query: DEFAULT_MAX_GROUPS_PER_QUERY,
            seed: None,
            overwrite: false,
            distance_type: DistanceType::L2,
        }
    }
}

impl DatasetConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("train_count", self.train_count),
            ("dimension", self.dimension),
            ("test_count", self.test_count),
            ("num_neighbors", self.num_neighbors),
            ("group_size", self.group_size),
            ("max_groups_per_query", self.max_groups_per_query),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(anyhow!("{} must be greater than 0", name));
            }
        }

        if self.output_path.trim().is_empty() {
            return Err(anyhow!("output_path must not be empty"));
        }

        // Ids are stored as i32 in the output file.
        if self.train_count > i32::MAX as usize {
            return Err(anyhow!(
                "train_count {} does not fit into 32-bit neighbor indices",
                self.train_count
            ));
        }

        if self.use_predicates && self.num_groups() == 0 {
            return Err(anyhow!(
                "train_count {} is too small to form a group",
                self.train_count
            ));
        }
        Ok(())
    }

    /// Number of train groups, counting a trailing partial block as its own group.
    pub fn num_groups(&self) -> usize {
        if self.group_size == 0 {
            return 0;
        }
        self.train_count.div_ceil(self.group_size)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn write_yaml_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }
}
