use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use config::enums::DistanceType;
use hdf5::types::{VarLenArray, VarLenUnicode};
use hdf5::Location;
use log::{info, warn};
use ndarray::Array1;

use crate::dataset::{
    KnnDataset, DISTANCES_DATASET, NEIGHBORS_DATASET, TEST_DATASET, TEST_IDS_DATASET,
    TRAIN_DATASET, TRAIN_IDS_DATASET,
};

fn write_u64_attr(location: &Location, name: &str, value: u64) -> Result<()> {
    location
        .new_attr::<u64>()
        .shape(())
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn write_str_attr(location: &Location, name: &str, value: &str) -> Result<()> {
    let value: VarLenUnicode = value
        .parse()
        .map_err(|e| anyhow!("Invalid value '{}' for attribute {}: {:?}", value, name, e))?;
    location
        .new_attr::<VarLenUnicode>()
        .shape(())
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

/// Writes a `KnnDataset` as a single HDF5 file. The file is first written next to the destination
/// under a unique temporary name and only renamed into place once it is complete.
pub struct Hdf5Writer {
    overwrite: bool,
    distance_type: DistanceType,
}

impl Hdf5Writer {
    pub fn new(overwrite: bool, distance_type: DistanceType) -> Self {
        Self {
            overwrite,
            distance_type,
        }
    }

    fn temporary_path(destination: &Path) -> Result<PathBuf> {
        let file_name = destination
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("Output path {} has no file name", destination.display()))?;
        Ok(destination.with_file_name(format!(
            ".{}.{}.tmp",
            file_name,
            uuid::Uuid::new_v4()
        )))
    }

    pub fn write(&self, dataset: &KnnDataset, destination: &Path) -> Result<()> {
        if destination.exists() && !self.overwrite {
            return Err(anyhow!(
                "Output file {} already exists, set overwrite to replace it",
                destination.display()
            ));
        }
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create output directory {}", parent.display())
                })?;
            }
        }

        let start = Instant::now();
        let temp_path = Self::temporary_path(destination)?;
        if let Err(e) = self.write_file(dataset, &temp_path) {
            if temp_path.exists() {
                if let Err(remove_err) = std::fs::remove_file(&temp_path) {
                    warn!(
                        "Failed to remove temporary file {}: {}",
                        temp_path.display(),
                        remove_err
                    );
                }
            }
            return Err(e);
        }
        std::fs::rename(&temp_path, destination).with_context(|| {
            format!(
                "Failed to move {} to {}",
                temp_path.display(),
                destination.display()
            )
        })?;

        info!(
            "Wrote dataset to {} in {:?}",
            destination.display(),
            start.elapsed()
        );
        Ok(())
    }

    fn write_file(&self, dataset: &KnnDataset, path: &Path) -> Result<()> {
        let file = hdf5::File::create(path)
            .with_context(|| format!("Failed to create HDF5 file {}", path.display()))?;

        let dimension = dataset.dimension() as u64;
        let train_count = dataset.train_count() as u64;
        let test_count = dataset.test_count() as u64;
        let max_k = dataset.num_neighbors() as u64;

        let train = file
            .new_dataset_builder()
            .with_data(&dataset.train)
            .create(TRAIN_DATASET)?;
        write_u64_attr(&train, "count", train_count)?;
        write_u64_attr(&train, "dimensions", dimension)?;

        let test = file
            .new_dataset_builder()
            .with_data(&dataset.test)
            .create(TEST_DATASET)?;
        write_u64_attr(&test, "count", test_count)?;
        write_u64_attr(&test, "dimensions", dimension)?;

        let neighbors = file
            .new_dataset_builder()
            .with_data(&dataset.neighbors)
            .create(NEIGHBORS_DATASET)?;
        write_u64_attr(&neighbors, "count", test_count)?;
        write_u64_attr(&neighbors, "max_k", max_k)?;

        let distances = file
            .new_dataset_builder()
            .with_data(&dataset.distances)
            .create(DISTANCES_DATASET)?;
        write_u64_attr(&distances, "count", test_count)?;
        write_u64_attr(&distances, "max_k", max_k)?;

        if let Some(predicates) = &dataset.predicates {
            let train_ids = Array1::from_vec(predicates.train_ids.clone());
            file.new_dataset_builder()
                .with_data(&train_ids)
                .create(TRAIN_IDS_DATASET)?;

            let test_ids: Array1<VarLenArray<i32>> = predicates
                .test_ids
                .iter()
                .map(|ids| VarLenArray::from_slice(ids))
                .collect();
            file.new_dataset_builder()
                .with_data(&test_ids)
                .create(TEST_IDS_DATASET)?;
        }

        write_u64_attr(&file, "dimensions", dimension)?;
        write_u64_attr(&file, "base_count", train_count)?;
        write_u64_attr(&file, "query_count", test_count)?;
        write_u64_attr(&file, "max_k", max_k)?;
        if let Some(seed) = dataset.seed {
            write_u64_attr(&file, "seed", seed)?;
        }
        write_str_attr(&file, "distance_function", self.distance_type.as_str())?;

        file.close()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::dataset::Predicates;
    use crate::input::knn_file::load_dataset;

    fn small_dataset(with_predicates: bool) -> KnnDataset {
        let predicates = with_predicates.then(|| Predicates {
            train_ids: vec![1, 1, 2],
            test_ids: vec![vec![1, 2], vec![2]],
        });
        KnnDataset {
            train: array![[0.1f32, 0.2], [0.3, 0.4], [0.5, 0.6]],
            test: array![[0.25f32, 0.75], [0.9, 0.05]],
            neighbors: array![[1, 0, 2], [2, -1, -1]],
            distances: array![[0.1f32, 0.2, 0.3], [0.4, -1.0, -1.0]],
            predicates,
            seed: Some(17),
        }
    }

    #[test]
    fn test_round_trip_without_predicates() {
        let temp_dir = tempdir::TempDir::new("hdf5_writer_test").unwrap();
        let path = temp_dir.path().join("data.hdf5");
        let dataset = small_dataset(false);

        Hdf5Writer::new(false, DistanceType::L2)
            .write(&dataset, &path)
            .unwrap();

        let file = hdf5::File::open(&path).unwrap();
        assert!(!file.link_exists(TRAIN_IDS_DATASET));
        assert!(!file.link_exists(TEST_IDS_DATASET));
        drop(file);

        let loaded = load_dataset(&path).unwrap();
        assert_eq!(loaded, dataset);
    }

    #[test]
    fn test_round_trip_with_predicates() {
        let temp_dir = tempdir::TempDir::new("hdf5_writer_test").unwrap();
        let path = temp_dir.path().join("nested").join("data.hdf5");
        let dataset = small_dataset(true);

        Hdf5Writer::new(false, DistanceType::L2)
            .write(&dataset, &path)
            .unwrap();

        let loaded = load_dataset(&path).unwrap();
        assert_eq!(loaded, dataset);
        assert_eq!(
            loaded.predicates.unwrap().test_ids,
            vec![vec![1, 2], vec![2]]
        );
    }

    #[test]
    fn test_round_trip_is_bit_identical() {
        let temp_dir = tempdir::TempDir::new("hdf5_writer_test").unwrap();
        let path = temp_dir.path().join("data.hdf5");
        let mut dataset = small_dataset(false);
        dataset.train = array![[f32::MIN_POSITIVE, 0.999_999_94], [1e-30, 0.5], [0.0, 0.333_333_34]];

        Hdf5Writer::new(false, DistanceType::L2)
            .write(&dataset, &path)
            .unwrap();
        let loaded = load_dataset(&path).unwrap();
        let expected: Vec<u32> = dataset.train.iter().map(|v| v.to_bits()).collect();
        let actual: Vec<u32> = loaded.train.iter().map(|v| v.to_bits()).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_attributes() {
        let temp_dir = tempdir::TempDir::new("hdf5_writer_test").unwrap();
        let path = temp_dir.path().join("data.hdf5");
        Hdf5Writer::new(false, DistanceType::L2)
            .write(&small_dataset(false), &path)
            .unwrap();

        let file = hdf5::File::open(&path).unwrap();
        assert_eq!(file.attr("dimensions").unwrap().read_scalar::<u64>().unwrap(), 2);
        assert_eq!(file.attr("base_count").unwrap().read_scalar::<u64>().unwrap(), 3);
        assert_eq!(file.attr("query_count").unwrap().read_scalar::<u64>().unwrap(), 2);
        assert_eq!(file.attr("max_k").unwrap().read_scalar::<u64>().unwrap(), 3);
        assert_eq!(file.attr("seed").unwrap().read_scalar::<u64>().unwrap(), 17);
        let distance = file
            .attr("distance_function")
            .unwrap()
            .read_scalar::<VarLenUnicode>()
            .unwrap();
        assert_eq!(distance.as_str(), "l2");

        let neighbors = file.dataset(NEIGHBORS_DATASET).unwrap();
        assert_eq!(neighbors.attr("max_k").unwrap().read_scalar::<u64>().unwrap(), 3);
    }

    #[test]
    fn test_refuses_to_overwrite() {
        let temp_dir = tempdir::TempDir::new("hdf5_writer_test").unwrap();
        let path = temp_dir.path().join("data.hdf5");
        std::fs::write(&path, b"keep me").unwrap();

        let result = Hdf5Writer::new(false, DistanceType::L2).write(&small_dataset(false), &path);
        assert!(result.is_err());
        assert_eq!(std::fs::read(&path).unwrap(), b"keep me");

        Hdf5Writer::new(true, DistanceType::L2)
            .write(&small_dataset(false), &path)
            .unwrap();
        assert_eq!(load_dataset(&path).unwrap(), small_dataset(false));
    }

    #[test]
    fn test_no_temporary_file_left_behind() {
        let temp_dir = tempdir::TempDir::new("hdf5_writer_test").unwrap();
        let path = temp_dir.path().join("data.hdf5");
        Hdf5Writer::new(false, DistanceType::L2)
            .write(&small_dataset(true), &path)
            .unwrap();

        let entries: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("data.hdf5")]);
    }
}
