use serde::{Deserialize, Serialize};

// TODO(datagen): add dot product once the verifier can compare similarity scores.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum DistanceType {
    #[default]
    L2,
}

impl DistanceType {
    /// Name recorded in the `distance_function` attribute of generated files.
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceType::L2 => "l2",
        }
    }
}

impl std::fmt::Display for DistanceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
