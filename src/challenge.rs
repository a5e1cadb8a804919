//! Challenge definitions.
//!
//! A challenge bundles the problem statement, the starter code shown to the
//! participant and the suite the submission is judged against. Definitions
//! are YAML files; one ships embedded in the binary.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::diagnostics::ChallengeError;

const BUILTIN_SOURCE: &str = include_str!("../challenges/roman.yaml");
const BUILTIN_PATH: &str = "<builtin>/roman.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub name: String,
    pub description: String,
    /// TypeScript the editor starts from.
    pub starter_code: String,
    /// Suite text run against the transpiled submission.
    pub suite: String,
    #[serde(default)]
    pub time_limit_secs: Option<u64>,
}

impl Challenge {
    pub fn from_yaml(text: &str, path: impl Into<PathBuf>) -> Result<Self, ChallengeError> {
        serde_yaml::from_str(text).map_err(|source| ChallengeError::Yaml {
            path: path.into(),
            source,
        })
    }
}

// ============================================================================
// LOADING
// ============================================================================

/// The embedded Roman numeral challenge.
pub fn builtin() -> Result<Challenge, ChallengeError> {
    Challenge::from_yaml(BUILTIN_SOURCE, BUILTIN_PATH)
}

pub fn load(path: &Path) -> Result<Challenge, ChallengeError> {
    let text = fs::read_to_string(path).map_err(|source| ChallengeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Challenge::from_yaml(&text, path)
}

/// Recursively find `*.yaml` and `*.yml` files under `root`, sorted by path.
pub fn discover_challenges(root: &Path) -> Result<Vec<PathBuf>, ChallengeError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| ChallengeError::Discovery {
            path: root.to_path_buf(),
            message: e.to_string(),
        })?;
        if entry.file_type().is_file() && is_challenge_file(entry.path()) {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();
    debug!(root = %root.display(), found = files.len(), "discovered challenge files");
    Ok(files)
}

fn is_challenge_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_challenge() {
        let challenge = builtin().unwrap();
        assert_eq!(challenge.name, "Convert Roman Numeral to Number");
        assert!(challenge.starter_code.contains("function convertRomanToDecimal(roman: string): number"));
        assert_eq!(challenge.suite.matches("it('").count(), 11);
    }

    #[test]
    fn test_missing_fields_are_yaml_errors() {
        let error = Challenge::from_yaml("name: only a name\n", "broken.yaml").unwrap_err();
        assert!(matches!(error, ChallengeError::Yaml { .. }));
    }

    #[test]
    fn test_challenge_file_extensions() {
        assert!(is_challenge_file(Path::new("a/b.yaml")));
        assert!(is_challenge_file(Path::new("b.yml")));
        assert!(!is_challenge_file(Path::new("b.json")));
        assert!(!is_challenge_file(Path::new("yaml")));
    }
}
