use std::path::Path;

use anyhow::{anyhow, Context, Result};
use hdf5::types::VarLenArray;
use log::{debug, warn};

use crate::dataset::{
    KnnDataset, Predicates, DISTANCES_DATASET, NEIGHBORS_DATASET, TEST_DATASET, TEST_IDS_DATASET,
    TRAIN_DATASET, TRAIN_IDS_DATASET,
};

pub fn open_dataset(file: &hdf5::File, name: &str) -> Result<hdf5::Dataset> {
    file.dataset(name)
        .with_context(|| format!("Dataset {} not found", name))
}

/// Reads `train_ids` and `test_ids` when both are present.
pub fn read_predicates(
    file: &hdf5::File,
    train_count: usize,
    test_count: usize,
) -> Result<Option<Predicates>> {
    let has_train_ids = file.link_exists(TRAIN_IDS_DATASET);
    let has_test_ids = file.link_exists(TEST_IDS_DATASET);
    match (has_train_ids, has_test_ids) {
        (true, true) => {
            let train_ids = open_dataset(file, TRAIN_IDS_DATASET)?
                .read_1d::<i32>()?
                .to_vec();
            let test_ids: Vec<Vec<i32>> = open_dataset(file, TEST_IDS_DATASET)?
                .read_1d::<VarLenArray<i32>>()?
                .iter()
                .map(|ids| ids.as_slice().to_vec())
                .collect();
            if train_ids.len() != train_count || test_ids.len() != test_count {
                return Err(anyhow!(
                    "Group ids cover {} train and {} test vectors, expected {} and {}",
                    train_ids.len(),
                    test_ids.len(),
                    train_count,
                    test_count
                ));
            }
            Ok(Some(Predicates {
                train_ids,
                test_ids,
            }))
        }
        (false, false) => Ok(None),
        _ => {
            warn!(
                "Ignoring group ids in {}: {} and {} must both be present",
                file.filename(),
                TRAIN_IDS_DATASET,
                TEST_IDS_DATASET
            );
            Ok(None)
        }
    }
}

/// Loads every dataset of a KNN benchmark file into memory.
pub fn load_dataset(path: impl AsRef<Path>) -> Result<KnnDataset> {
    let path = path.as_ref();
    let file = hdf5::File::open(path)
        .with_context(|| format!("Failed to open HDF5 file {}", path.display()))?;

    let train = open_dataset(&file, TRAIN_DATASET)?.read_2d::<f32>()?;
    let test = open_dataset(&file, TEST_DATASET)?.read_2d::<f32>()?;
    let neighbors = open_dataset(&file, NEIGHBORS_DATASET)?.read_2d::<i32>()?;
    let distances = open_dataset(&file, DISTANCES_DATASET)?.read_2d::<f32>()?;

    if train.ncols() != test.ncols() {
        return Err(anyhow!(
            "Train dimension {} does not match test dimension {}",
            train.ncols(),
            test.ncols()
        ));
    }
    if neighbors.nrows() != test.nrows() || distances.dim() != neighbors.dim() {
        return Err(anyhow!(
            "Neighbors {:?} and distances {:?} do not line up with {} queries",
            neighbors.dim(),
            distances.dim(),
            test.nrows()
        ));
    }

    let predicates = read_predicates(&file, train.nrows(), test.nrows())?;

    let seed = file
        .attr("seed")
        .and_then(|attr| attr.read_scalar::<u64>())
        .ok();

    debug!(
        "Loaded {}: train {:?}, test {:?}, neighbors {:?}, predicates: {}",
        path.display(),
        train.dim(),
        test.dim(),
        neighbors.dim(),
        predicates.is_some()
    );
    Ok(KnnDataset {
        train,
        test,
        neighbors,
        distances,
        predicates,
        seed,
    })
}
