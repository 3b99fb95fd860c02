pub mod dataset;
pub mod enums;
