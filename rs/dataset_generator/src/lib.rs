pub mod dataset;
pub mod generator;
pub mod ground_truth;
pub mod groups;
pub mod input;
pub mod output;
pub mod vectors;
pub mod verify;
