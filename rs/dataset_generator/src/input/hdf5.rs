use std::cmp::min;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use ndarray::{s, Array2};

use super::{Input, Row};

/// Streams the rows of a 2-D `f32` dataset, reading `chunk_size` rows from disk at a time.
pub struct Hdf5Reader {
    dataset: hdf5::Dataset,
    chunk_size: usize,
    row_idx: usize,
    num_rows: usize,
    dimension: usize,
    chunk_start: usize,
    chunk: Vec<f32>,
}

impl Hdf5Reader {
    pub fn new(chunk_size: usize, dataset: &str, file: impl AsRef<Path>) -> Result<Self> {
        if chunk_size == 0 {
            return Err(anyhow!("chunk_size must be greater than 0"));
        }
        let path = file.as_ref();
        let file = hdf5::File::open(path)
            .with_context(|| format!("Failed to open HDF5 file {}", path.display()))?;
        let dataset = file
            .dataset(dataset)
            .with_context(|| format!("Dataset {} not found in {}", dataset, path.display()))?;
        let shape = dataset.shape();
        if shape.len() != 2 {
            return Err(anyhow!(
                "Expected a 2-D dataset but {} has shape {:?}",
                dataset.name(),
                shape
            ));
        }
        Ok(Self {
            dataset,
            chunk_size,
            row_idx: 0,
            num_rows: shape[0],
            dimension: shape[1],
            chunk_start: 0,
            chunk: vec![],
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn chunk_contains(&self, row_idx: usize) -> bool {
        let num_chunk_rows = if self.dimension == 0 {
            0
        } else {
            self.chunk.len() / self.dimension
        };
        row_idx >= self.chunk_start && row_idx < self.chunk_start + num_chunk_rows
    }

    pub fn fetch_next_chunk(&mut self) -> Result<()> {
        let end_idx = min(self.row_idx + self.chunk_size, self.num_rows);
        let selection = s![self.row_idx..end_idx, ..];
        let chunk: Array2<f32> = self.dataset.read_slice_2d(selection)?;
        self.chunk.clear();
        self.chunk.extend(chunk.iter().copied());
        self.chunk_start = self.row_idx;
        Ok(())
    }
}

impl Input for Hdf5Reader {
    fn reset(&mut self) {
        self.row_idx = 0;
        self.chunk_start = 0;
        self.chunk.clear();
    }

    fn has_next(&self) -> bool {
        self.row_idx < self.num_rows
    }

    fn next(&mut self) -> Result<Row<'_>> {
        if !self.has_next() {
            return Err(anyhow!("No more rows in dataset {}", self.dataset.name()));
        }
        if !self.chunk_contains(self.row_idx) {
            self.fetch_next_chunk()?;
        }

        let offset = (self.row_idx - self.chunk_start) * self.dimension;
        let doc_id = self.row_idx as u64;
        self.row_idx += 1;
        Ok(Row {
            id: doc_id,
            data: &self.chunk[offset..offset + self.dimension],
        })
    }

    fn num_rows(&self) -> usize {
        self.num_rows
    }

    fn skip_to(&mut self, row_idx: usize) {
        self.row_idx = min(row_idx, self.num_rows);
    }
}
