use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use config::dataset::DatasetConfig;
use config::enums::DistanceType;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use utils::distance::l2::L2DistanceCalculator;

use crate::dataset::KnnDataset;
use crate::ground_truth::compute_ground_truth;
use crate::groups::assign_groups;
use crate::output::hdf5::Hdf5Writer;
use crate::output::template::{resolve_output_path, TemplateValues};
use crate::vectors::generate_train_and_test;

pub struct DatasetGenerator {
    config: DatasetConfig,
    seed: u64,
}

impl DatasetGenerator {
    pub fn new(config: DatasetConfig) -> Result<Self> {
        config.validate()?;
        let seed = match config.seed {
            Some(seed) => seed,
            None => {
                let seed = rand::random::<u64>();
                info!("No seed configured, using random seed {}", seed);
                seed
            }
        };
        Ok(Self { config, seed })
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Runs the vector, group and ground truth stages. The same seed always yields the same
    /// dataset.
    pub fn generate(&self) -> Result<KnnDataset> {
        let config = &self.config;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let start = Instant::now();
        let (train, test) = generate_train_and_test(
            &mut rng,
            config.train_count,
            config.test_count,
            config.dimension,
        );
        info!(
            "Generated train {:?} and test {:?} vectors in {:?}",
            train.dim(),
            test.dim(),
            start.elapsed()
        );

        let predicates = if config.use_predicates {
            let predicates = assign_groups(
                &mut rng,
                config.train_count,
                config.test_count,
                config.group_size,
                config.max_groups_per_query,
            )?;
            info!(
                "Assigned {} train vectors to {} groups",
                config.train_count,
                config.num_groups()
            );
            Some(predicates)
        } else {
            None
        };

        let ground_truth = match config.distance_type {
            DistanceType::L2 => compute_ground_truth::<L2DistanceCalculator>(
                train.view(),
                test.view(),
                config.num_neighbors,
                predicates.as_ref(),
            )?,
        };

        Ok(KnnDataset {
            train,
            test,
            neighbors: ground_truth.neighbors,
            distances: ground_truth.distances,
            predicates,
            seed: Some(self.seed),
        })
    }

    /// Resolves the output file name template against the shape of `dataset`.
    pub fn output_path(&self, dataset: &KnnDataset) -> Result<PathBuf> {
        let values = TemplateValues {
            dimensions: dataset.dimension(),
            base_count: dataset.train_count(),
            query_count: dataset.test_count(),
            max_k: dataset.num_neighbors(),
            distance_function: self.config.distance_type.to_string(),
        };
        resolve_output_path(&self.config.output_path, &values)
    }

    pub fn write(&self, dataset: &KnnDataset) -> Result<PathBuf> {
        let path = self.output_path(dataset)?;
        Hdf5Writer::new(self.config.overwrite, self.config.distance_type).write(dataset, &path)?;
        Ok(path)
    }

    /// Generates the dataset and writes it out, returning the path of the written file.
    pub fn run(&self) -> Result<PathBuf> {
        let dataset = self.generate()?;
        self.write(&dataset)
    }
}
