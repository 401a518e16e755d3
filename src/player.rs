//! Player identity.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;

/// Opaque stable identifier for one player, unique within a match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Creates an identifier from any string-like name.
    pub fn new(name: impl Into<String>) -> Self {
        PlayerId(name.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(name: &str) -> Self {
        PlayerId(name.to_owned())
    }
}

impl From<String> for PlayerId {
    fn from(name: String) -> Self {
        PlayerId(name)
    }
}

/// Derives a unique display name per executable from its file stem.
///
/// Duplicate stems get `_2`, `_3`, ... suffixes in order of appearance, so
/// the same strategy entered several times stays distinguishable in the
/// standings.
pub fn unique_display_names(executables: &[impl AsRef<Path>]) -> Vec<String> {
    let mut seen: HashMap<String, u32> = HashMap::new();
    executables
        .iter()
        .map(|path| {
            let stem = path
                .as_ref()
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "player".to_owned());
            let count = seen.entry(stem.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                stem
            } else {
                format!("{stem}_{count}")
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn names_come_from_file_stems() {
        let paths = [PathBuf::from("bots/tit_for_tat.sh"), PathBuf::from("bots/grudger")];
        assert_eq!(unique_display_names(&paths), vec!["tit_for_tat", "grudger"]);
    }

    #[test]
    fn duplicate_stems_are_suffixed() {
        let paths = [
            PathBuf::from("a/random.sh"),
            PathBuf::from("b/random.sh"),
            PathBuf::from("c/random.sh"),
            PathBuf::from("d/other.sh"),
        ];
        assert_eq!(
            unique_display_names(&paths),
            vec!["random", "random_2", "random_3", "other"]
        );
    }
}
