use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use log::info;

/// Shape facts a file name template may refer to.
#[derive(Debug, Clone)]
pub struct TemplateValues {
    pub dimensions: usize,
    pub base_count: usize,
    pub query_count: usize,
    pub max_k: usize,
    pub distance_function: String,
}

impl TemplateValues {
    fn tokens(&self) -> HashMap<&'static str, String> {
        let mut tokens = HashMap::new();
        for name in ["d", "dims", "dimensions"] {
            tokens.insert(name, self.dimensions.to_string());
        }
        for name in ["b", "base_count"] {
            tokens.insert(name, self.base_count.to_string());
        }
        for name in ["q", "query_count"] {
            tokens.insert(name, self.query_count.to_string());
        }
        for name in ["k", "max_k"] {
            tokens.insert(name, self.max_k.to_string());
        }
        for name in ["f", "distance_function"] {
            tokens.insert(name, self.distance_function.clone());
        }
        tokens
    }
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Replaces every `[token]` in the file name of `path`. `[token*]` resolves to nothing when the
/// token is unknown; any other unknown token is an error. Parent directories are left untouched.
pub fn resolve_output_path(path: &str, values: &TemplateValues) -> Result<PathBuf> {
    let path = Path::new(path);
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("Output path {} has no file name", path.display()))?;

    let tokens = values.tokens();
    let mut resolved = String::with_capacity(file_name.len());
    let mut rest = file_name;
    while let Some(open) = rest.find('[') {
        resolved.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];
        let close = after_open
            .find(']')
            .ok_or_else(|| anyhow!("Unclosed '[' in output file name '{}'", file_name))?;
        let section = &after_open[..close];
        let (token, optional) = match section.strip_suffix('*') {
            Some(token) => (token, true),
            None => (section, false),
        };
        match tokens.get(token) {
            Some(value) => {
                let sanitized = sanitize(value);
                if sanitized != *value {
                    info!(
                        "Sanitized value of token '{}' from '{}' to '{}'",
                        token, value, sanitized
                    );
                }
                resolved.push_str(&sanitized);
            }
            None if optional => {}
            None => {
                return Err(anyhow!(
                    "Unknown token '{}' in output file name '{}'",
                    token,
                    file_name
                ))
            }
        }
        rest = &after_open[close + 1..];
    }
    if rest.contains(']') {
        return Err(anyhow!("Unmatched ']' in output file name '{}'", file_name));
    }
    resolved.push_str(rest);

    Ok(path.with_file_name(resolved))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values() -> TemplateValues {
        TemplateValues {
            dimensions: 128,
            base_count: 1000,
            query_count: 10,
            max_k: 100,
            distance_function: "l2".to_string(),
        }
    }

    #[test]
    fn test_plain_path_is_unchanged() {
        let path = resolve_output_path("/tmp/out/data.hdf5", &values()).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/out/data.hdf5"));
    }

    #[test]
    fn test_tokens_are_resolved() {
        let path =
            resolve_output_path("/tmp/[b]/knn_d[d]_b[b]_q[q]_k[k]_[f].hdf5", &values()).unwrap();
        // Only the file name is templated.
        assert_eq!(
            path,
            PathBuf::from("/tmp/[b]/knn_d128_b1000_q10_k100_l2.hdf5")
        );

        let path = resolve_output_path("knn_[dimensions]_[base_count].hdf5", &values()).unwrap();
        assert_eq!(path, PathBuf::from("knn_128_1000.hdf5"));
    }

    #[test]
    fn test_optional_and_unknown_tokens() {
        let path = resolve_output_path("knn[model*].hdf5", &values()).unwrap();
        assert_eq!(path, PathBuf::from("knn.hdf5"));

        assert!(resolve_output_path("knn[model].hdf5", &values()).is_err());
        assert!(resolve_output_path("knn[d.hdf5", &values()).is_err());
        assert!(resolve_output_path("knn]d.hdf5", &values()).is_err());
    }

    #[test]
    fn test_values_are_sanitized() {
        let mut values = values();
        values.distance_function = "l2/euclid".to_string();
        let path = resolve_output_path("knn_[f].hdf5", &values).unwrap();
        assert_eq!(path, PathBuf::from("knn_l2euclid.hdf5"));
    }
}
