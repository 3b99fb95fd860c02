use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use hdf5::types::VarLenUnicode;
use log::{debug, info, warn};
use utils::distance::l2::L2DistanceCalculator;
use utils::DistanceCalculator;

use crate::dataset::{
    Predicates, DISTANCES_DATASET, NEIGHBORS_DATASET, NEIGHBOR_SENTINEL, TEST_DATASET,
    TRAIN_DATASET,
};
use crate::ground_truth::query_neighbors;
use crate::input::hdf5::Hdf5Reader;
use crate::input::knn_file::{open_dataset, read_predicates};
use crate::input::Input;

#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// First query to check.
    pub start: usize,
    /// One past the last query to check. Checks through the last query when unset.
    pub end: Option<usize>,
    /// Distances closer than this are considered equal, so tied neighbors may swap places.
    pub phi: f32,
    /// Stop at the first incorrect neighborhood.
    pub fail_fast: bool,
    /// Number of query rows read from disk at a time.
    pub chunk_size: usize,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            start: 0,
            end: None,
            phi: 0.001,
            fail_fast: false,
            chunk_size: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerificationReport {
    pub num_checked: usize,
    pub mismatched_queries: Vec<usize>,
}

impl VerificationReport {
    pub fn is_ok(&self) -> bool {
        self.mismatched_queries.is_empty()
    }
}

/// Whether a stored neighbor row agrees with the recomputed one. Every stored id must be a
/// distinct, in-range train row the query may see, and its distance to `query`, recomputed from
/// `train`, must be within `phi` of the expected distance at the same slot. Stored distances are
/// never consulted.
pub fn neighborhoods_match<DC: DistanceCalculator>(
    train: &[f32],
    dimension: usize,
    query: &[f32],
    query_idx: usize,
    predicates: Option<&Predicates>,
    stored_ids: &[i32],
    expected_ids: &[i32],
    expected_distances: &[f32],
    phi: f32,
) -> bool {
    if stored_ids == expected_ids {
        return true;
    }
    if stored_ids.len() != expected_ids.len() || dimension == 0 {
        return false;
    }
    let num_train = train.len() / dimension;
    let mut seen = HashSet::with_capacity(stored_ids.len());
    (0..stored_ids.len()).all(|slot| {
        let stored_id = stored_ids[slot];
        let stored_empty = stored_id == NEIGHBOR_SENTINEL;
        let expected_empty = expected_ids[slot] == NEIGHBOR_SENTINEL;
        if stored_empty || expected_empty {
            return stored_empty == expected_empty;
        }
        if stored_id < 0 || stored_id as usize >= num_train || !seen.insert(stored_id) {
            return false;
        }
        let train_idx = stored_id as usize;
        if let Some(predicates) = predicates {
            if !predicates.is_eligible(query_idx, train_idx) {
                return false;
            }
        }
        let vector = &train[train_idx * dimension..(train_idx + 1) * dimension];
        (DC::calculate(query, vector) - expected_distances[slot]).abs() <= phi
    })
}

fn check_distance_function(file: &hdf5::File) -> Result<()> {
    match file
        .attr("distance_function")
        .and_then(|attr| attr.read_scalar::<VarLenUnicode>())
    {
        Ok(name) if name.as_str().eq_ignore_ascii_case("l2") => Ok(()),
        Ok(name) => Err(anyhow!("Unsupported distance function {}", name.as_str())),
        Err(_) => {
            warn!("No distance_function attribute, assuming l2");
            Ok(())
        }
    }
}

/// Recomputes the neighborhoods of the queries in `[options.start, options.end)` and compares
/// them against the neighbors stored in the file at `path`.
pub fn verify(path: impl AsRef<Path>, options: &VerifyOptions) -> Result<VerificationReport> {
    let path = path.as_ref();
    let file = hdf5::File::open(path)
        .with_context(|| format!("Failed to open HDF5 file {}", path.display()))?;
    check_distance_function(&file)?;

    let train = open_dataset(&file, TRAIN_DATASET)?.read_2d::<f32>()?;
    let neighbors = open_dataset(&file, NEIGHBORS_DATASET)?.read_2d::<i32>()?;
    let distances_shape = open_dataset(&file, DISTANCES_DATASET)?.shape();
    let mut queries = Hdf5Reader::new(options.chunk_size, TEST_DATASET, path)?;
    if queries.dimension() != train.ncols() {
        return Err(anyhow!(
            "Query dimension {} does not match train dimension {}",
            queries.dimension(),
            train.ncols()
        ));
    }
    if neighbors.nrows() != queries.num_rows()
        || distances_shape != [neighbors.nrows(), neighbors.ncols()]
    {
        return Err(anyhow!(
            "Neighbors {:?} and distances {:?} do not line up with {} queries",
            neighbors.dim(),
            distances_shape,
            queries.num_rows()
        ));
    }
    let predicates = read_predicates(&file, train.nrows(), queries.num_rows())?;

    let k = neighbors.ncols();
    let end = options
        .end
        .unwrap_or(queries.num_rows())
        .min(queries.num_rows());
    let start = options.start.min(end);
    info!(
        "Verifying queries {}..{} of {} against {} train vectors (k = {})",
        start,
        end,
        path.display(),
        train.nrows(),
        k
    );

    let timer = Instant::now();
    let train_view = train.view();
    let flat_train = train
        .as_slice()
        .ok_or_else(|| anyhow!("train matrix is not in standard layout"))?;
    let mut report = VerificationReport::default();
    queries.skip_to(start);
    while queries.has_next() && report.num_checked < end - start {
        let row = queries.next()?;
        let query_idx = row.id as usize;
        let (expected_ids, expected_distances) = query_neighbors::<L2DistanceCalculator>(
            &train_view,
            row.data,
            query_idx,
            k,
            predicates.as_ref(),
        )?;
        let stored_ids = neighbors.row(query_idx).to_vec();
        report.num_checked += 1;

        if neighborhoods_match::<L2DistanceCalculator>(
            flat_train,
            train.ncols(),
            row.data,
            query_idx,
            predicates.as_ref(),
            &stored_ids,
            &expected_ids,
            &expected_distances,
            options.phi,
        ) {
            debug!("Query {} is correct", query_idx);
            continue;
        }

        let num_missing = expected_ids
            .iter()
            .filter(|&&id| id != NEIGHBOR_SENTINEL && !stored_ids.contains(&id))
            .count();
        warn!(
            "Query {} has an incorrect neighborhood: {} of {} expected neighbors missing",
            query_idx, num_missing, k
        );
        report.mismatched_queries.push(query_idx);
        if options.fail_fast {
            break;
        }
    }

    info!(
        "Checked {} queries in {:?}, {} incorrect",
        report.num_checked,
        timer.elapsed(),
        report.mismatched_queries.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use config::dataset::DatasetConfig;
    use config::enums::DistanceType;

    use super::*;
    use crate::generator::DatasetGenerator;
    use crate::input::knn_file::load_dataset;
    use crate::output::hdf5::Hdf5Writer;

    fn generate(dir: &Path, use_predicates: bool) -> std::path::PathBuf {
        let config = DatasetConfig {
            train_count: 500,
            dimension: 4,
            test_count: 6,
            use_predicates,
            output_path: dir.join("data.hdf5").to_str().unwrap().to_string(),
            seed: Some(99),
            ..DatasetConfig::default()
        };
        DatasetGenerator::new(config).unwrap().run().unwrap()
    }

    fn check(
        stored_ids: &[i32],
        expected_ids: &[i32],
        expected_distances: &[f32],
        predicates: Option<&Predicates>,
    ) -> bool {
        // Distances from the origin: 0, 1, 2 and 1.
        let train = [0.0f32, 0.0, 1.0, 0.0, 0.0, 2.0, 1.0, 0.0];
        neighborhoods_match::<L2DistanceCalculator>(
            &train,
            2,
            &[0.0, 0.0],
            0,
            predicates,
            stored_ids,
            expected_ids,
            expected_distances,
            0.001,
        )
    }

    #[test]
    fn test_neighborhoods_match() {
        let expected_ids = [0, 1, 3];
        let expected_distances = [0.0, 1.0, 1.0];
        assert!(check(&[0, 1, 3], &expected_ids, &expected_distances, None));
        // Rows 1 and 3 are tied, either order is correct.
        assert!(check(&[0, 3, 1], &expected_ids, &expected_distances, None));
        assert!(!check(&[0, 2, 1], &expected_ids, &expected_distances, None));
        assert!(!check(&[0, 1, 7], &expected_ids, &expected_distances, None));
        assert!(!check(&[0, 1, -5], &expected_ids, &expected_distances, None));
        assert!(!check(
            &[0, 1, NEIGHBOR_SENTINEL],
            &expected_ids,
            &expected_distances,
            None
        ));
    }

    #[test]
    fn test_neighborhoods_match_rejects_repeated_ids() {
        // Stored distances play no part, so a repeated id cannot hide behind them.
        assert!(!check(&[0, 0, 0], &[0, 1, 3], &[0.0, 1.0, 1.0], None));
        assert!(!check(&[1, 3, 3], &[1, 3, 2], &[1.0, 1.0, 2.0], None));
    }

    #[test]
    fn test_neighborhoods_match_respects_groups() {
        let predicates = Predicates {
            train_ids: vec![1, 1, 2, 2],
            test_ids: vec![vec![1]],
        };
        let expected_ids = [0, 1, NEIGHBOR_SENTINEL];
        let expected_distances = [0.0, 1.0, -1.0];
        assert!(check(
            &[0, 1, NEIGHBOR_SENTINEL],
            &expected_ids,
            &expected_distances,
            Some(&predicates)
        ));
        // Row 3 is as close as row 1 but belongs to group 2.
        assert!(!check(
            &[0, 3, NEIGHBOR_SENTINEL],
            &expected_ids,
            &expected_distances,
            Some(&predicates)
        ));
    }

    #[test]
    fn test_verify_generated_file() {
        let temp_dir = tempdir::TempDir::new("verify_test").unwrap();
        for use_predicates in [false, true] {
            let sub_dir = temp_dir.path().join(format!("predicates_{}", use_predicates));
            let path = generate(&sub_dir, use_predicates);
            let report = verify(&path, &VerifyOptions::default()).unwrap();
            assert!(report.is_ok());
            assert_eq!(report.num_checked, 6);
        }
    }

    #[test]
    fn test_verify_range() {
        let temp_dir = tempdir::TempDir::new("verify_test").unwrap();
        let path = generate(temp_dir.path(), false);
        let options = VerifyOptions {
            start: 2,
            end: Some(4),
            chunk_size: 3,
            ..VerifyOptions::default()
        };
        let report = verify(&path, &options).unwrap();
        assert_eq!(report.num_checked, 2);

        let options = VerifyOptions {
            start: 5,
            end: Some(100),
            ..VerifyOptions::default()
        };
        assert_eq!(verify(&path, &options).unwrap().num_checked, 1);
    }

    #[test]
    fn test_verify_detects_tampering() {
        let temp_dir = tempdir::TempDir::new("verify_test").unwrap();
        let path = generate(temp_dir.path(), false);

        let mut dataset = load_dataset(&path).unwrap();
        // Replace the nearest neighbor of queries 1 and 4 with the farthest one.
        for query_idx in [1, 4] {
            let mut row = dataset.neighbors.row_mut(query_idx);
            row[0] = row[99];
            let mut dists = dataset.distances.row_mut(query_idx);
            dists[0] = dists[99];
        }
        let tampered = temp_dir.path().join("tampered.hdf5");
        Hdf5Writer::new(false, DistanceType::L2)
            .write(&dataset, &tampered)
            .unwrap();

        let report = verify(&tampered, &VerifyOptions::default()).unwrap();
        assert_eq!(report.mismatched_queries, vec![1, 4]);
        assert_eq!(report.num_checked, 6);

        let options = VerifyOptions {
            fail_fast: true,
            ..VerifyOptions::default()
        };
        let report = verify(&tampered, &options).unwrap();
        assert_eq!(report.mismatched_queries, vec![1]);
        assert_eq!(report.num_checked, 2);
    }

    #[test]
    fn test_verify_rejects_forged_ids_with_intact_distances() {
        let temp_dir = tempdir::TempDir::new("verify_test").unwrap();
        let path = generate(temp_dir.path(), false);

        let mut dataset = load_dataset(&path).unwrap();
        dataset.neighbors.row_mut(1).fill(0);
        let forged = temp_dir.path().join("forged.hdf5");
        Hdf5Writer::new(false, DistanceType::L2)
            .write(&dataset, &forged)
            .unwrap();

        let report = verify(&forged, &VerifyOptions::default()).unwrap();
        assert_eq!(report.mismatched_queries, vec![1]);
    }
}
