use std::collections::BinaryHeap;
use std::time::Instant;

use anyhow::{anyhow, Result};
use log::{debug, info};
use ndarray::{Array2, ArrayView2};
use ordered_float::NotNan;
use utils::DistanceCalculator;

use crate::dataset::{Predicates, DISTANCE_SENTINEL, NEIGHBOR_SENTINEL};

/// A candidate neighbor. Ordered by squared distance, then by train index, so a max-heap of these
/// keeps the farthest candidate on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Neighbor {
    pub squared_distance: NotNan<f32>,
    pub train_idx: usize,
}

impl Neighbor {
    pub fn distance(&self) -> f32 {
        self.squared_distance.into_inner().sqrt()
    }
}

/// Neighbor rows for every query, `k` slots wide.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundTruth {
    pub neighbors: Array2<i32>,
    pub distances: Array2<f32>,
}

fn as_contiguous<'a>(matrix: &'a ArrayView2<f32>, name: &str) -> Result<&'a [f32]> {
    matrix
        .as_slice()
        .ok_or_else(|| anyhow!("{} matrix is not in standard layout", name))
}

/// Exhaustively scans the flattened `train` matrix and returns the `k` nearest eligible rows in
/// ascending order of distance. Ties go to the lower train index.
pub fn k_nearest<DC: DistanceCalculator>(
    train: &[f32],
    dimension: usize,
    query: &[f32],
    k: usize,
    is_eligible: impl Fn(usize) -> bool,
) -> Result<Vec<Neighbor>> {
    if dimension == 0 {
        return Err(anyhow!("Vectors must have at least one dimension"));
    }
    if query.len() != dimension {
        return Err(anyhow!(
            "Query has dimension {} but train vectors have dimension {}",
            query.len(),
            dimension
        ));
    }
    if k == 0 {
        return Ok(vec![]);
    }

    let mut heap = BinaryHeap::with_capacity(k);
    for (train_idx, vector) in train.chunks_exact(dimension).enumerate() {
        if !is_eligible(train_idx) {
            continue;
        }
        let squared_distance = NotNan::new(DC::calculate_squared(query, vector))
            .map_err(|_| anyhow!("NaN distance to train vector {}", train_idx))?;
        let candidate = Neighbor {
            squared_distance,
            train_idx,
        };
        if heap.len() < k {
            heap.push(candidate);
        } else if let Some(max) = heap.peek() {
            if candidate < *max {
                heap.pop();
                heap.push(candidate);
            }
        }
    }

    Ok(heap.into_sorted_vec())
}

/// Lays out `neighbors` as a `k` slot row of global train indices and distances. Slots without a
/// neighbor hold the sentinels.
pub fn to_row(neighbors: &[Neighbor], k: usize) -> (Vec<i32>, Vec<f32>) {
    let mut ids = vec![NEIGHBOR_SENTINEL; k];
    let mut distances = vec![DISTANCE_SENTINEL; k];
    for (slot, neighbor) in neighbors.iter().take(k).enumerate() {
        ids[slot] = neighbor.train_idx as i32;
        distances[slot] = neighbor.distance();
    }
    (ids, distances)
}

/// Computes the neighbor row of a single query, honoring its group restriction when
/// `predicates` is present.
pub fn query_neighbors<DC: DistanceCalculator>(
    train: &ArrayView2<f32>,
    query: &[f32],
    query_idx: usize,
    k: usize,
    predicates: Option<&Predicates>,
) -> Result<(Vec<i32>, Vec<f32>)> {
    let dimension = train.ncols();
    let flat_train = as_contiguous(train, "train")?;
    let neighbors = match predicates {
        Some(predicates) => {
            if query_idx >= predicates.test_ids.len() {
                return Err(anyhow!("No group restriction for query {}", query_idx));
            }
            if predicates.train_ids.len() != train.nrows() {
                return Err(anyhow!(
                    "{} train group ids for {} train vectors",
                    predicates.train_ids.len(),
                    train.nrows()
                ));
            }
            k_nearest::<DC>(flat_train, dimension, query, k, |train_idx| {
                predicates.is_eligible(query_idx, train_idx)
            })?
        }
        None => k_nearest::<DC>(flat_train, dimension, query, k, |_| true)?,
    };
    Ok(to_row(&neighbors, k))
}

/// Brute-force exact neighbors of every test vector.
pub fn compute_ground_truth<DC: DistanceCalculator>(
    train: ArrayView2<f32>,
    test: ArrayView2<f32>,
    k: usize,
    predicates: Option<&Predicates>,
) -> Result<GroundTruth> {
    if train.ncols() != test.ncols() {
        return Err(anyhow!(
            "Train dimension {} does not match test dimension {}",
            train.ncols(),
            test.ncols()
        ));
    }
    if test.ncols() == 0 {
        return Err(anyhow!("Vectors must have at least one dimension"));
    }
    if let Some(predicates) = predicates {
        if predicates.train_ids.len() != train.nrows() || predicates.test_ids.len() != test.nrows()
        {
            return Err(anyhow!(
                "Group ids cover {} train and {} test vectors, expected {} and {}",
                predicates.train_ids.len(),
                predicates.test_ids.len(),
                train.nrows(),
                test.nrows()
            ));
        }
    }

    let start = Instant::now();
    info!(
        "Computing {} nearest neighbors for {} queries over {} train vectors",
        k,
        test.nrows(),
        train.nrows()
    );

    let flat_test = as_contiguous(&test, "test")?;
    let mut neighbors = Array2::from_elem((test.nrows(), k), NEIGHBOR_SENTINEL);
    let mut distances = Array2::from_elem((test.nrows(), k), DISTANCE_SENTINEL);
    let mut num_empty = 0;
    for (query_idx, query) in flat_test.chunks_exact(test.ncols()).enumerate() {
        let (ids, dists) = query_neighbors::<DC>(&train, query, query_idx, k, predicates)?;
        if ids.first() == Some(&NEIGHBOR_SENTINEL) {
            num_empty += 1;
        }
        neighbors
            .row_mut(query_idx)
            .iter_mut()
            .zip(ids)
            .for_each(|(slot, id)| *slot = id);
        distances
            .row_mut(query_idx)
            .iter_mut()
            .zip(dists)
            .for_each(|(slot, dist)| *slot = dist);

        if (query_idx + 1) % 1000 == 0 {
            debug!("Computed neighbors for {} queries", query_idx + 1);
        }
    }

    if num_empty > 0 {
        info!("{} queries have no eligible train vectors", num_empty);
    }
    info!("Computed ground truth in {:?}", start.elapsed());
    Ok(GroundTruth {
        neighbors,
        distances,
    })
}
