//! JSON observation documents.

use std::path::Path;

use serde::Deserialize;

use claimgate_core::{Observation, ObservationGroup, ObservationSet};

use super::DataError;

/// A per-group document: a full group object or a bare observation array.
#[derive(Deserialize)]
#[serde(untagged)]
enum GroupDocument {
    Group(ObservationGroup),
    Bare(Vec<Observation>),
}

fn read(path: &Path) -> Result<String, DataError> {
    std::fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a combined observation document.
///
/// Record-level validation (blank source units, non-finite values, mixed
/// kinds) happens later, when the statistic is prepared.
pub fn parse_observations(raw: &str) -> Result<ObservationSet, DataError> {
    serde_json::from_str(raw).map_err(|source| DataError::Parse {
        origin: "observation document".to_string(),
        source,
    })
}

/// Parse one group document, naming bare arrays `default_name`.
pub fn parse_group(raw: &str, default_name: &str) -> Result<ObservationGroup, DataError> {
    let doc: GroupDocument = serde_json::from_str(raw).map_err(|source| DataError::Parse {
        origin: format!("group document '{}'", default_name),
        source,
    })?;
    Ok(match doc {
        GroupDocument::Group(mut group) => {
            if group.name.is_empty() {
                group.name = default_name.to_string();
            }
            group
        }
        GroupDocument::Bare(observations) => ObservationGroup::new(default_name, observations),
    })
}

/// Load a combined observation document from disk.
pub fn load_observations(path: impl AsRef<Path>) -> Result<ObservationSet, DataError> {
    let path = path.as_ref();
    let raw = read(path)?;
    serde_json::from_str(&raw).map_err(|source| DataError::Parse {
        origin: path.display().to_string(),
        source,
    })
}

/// Load the two groups from separate files.
///
/// Groups without a name take the file stem.
pub fn load_separate_files(
    group_a: impl AsRef<Path>,
    group_b: impl AsRef<Path>,
) -> Result<ObservationSet, DataError> {
    let load = |path: &Path| -> Result<ObservationGroup, DataError> {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        parse_group(&read(path)?, &stem)
    };
    Ok(ObservationSet::new(
        load(group_a.as_ref())?,
        load(group_b.as_ref())?,
    ))
}
