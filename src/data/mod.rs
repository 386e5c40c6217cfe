//! Loading observation sets produced by the upstream extraction pipeline.
//!
//! # Supported Formats
//!
//! - **Combined document**: one JSON object with `group_a` and `group_b`,
//!   each `{ "name": .., "observations": [..] }`
//! - **Separate files**: two JSON files, one per group, each either a group
//!   object or a bare array of observations
//!
//! Every observation is `{ "source_unit_id": string, "value": number | string }`.
//!
//! # Example
//!
//! ```ignore
//! use claimgate::data::load_observations;
//!
//! let set = load_observations("observations.json")?;
//! println!("{} observations", set.len());
//! ```

mod json;

pub use json::{load_observations, load_separate_files, parse_group, parse_observations};

use std::fmt;
use std::path::PathBuf;

/// Errors that can occur while loading observations.
#[derive(Debug)]
pub enum DataError {
    /// IO error reading a file.
    Io {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The document is not valid JSON for the observation schema.
    Parse {
        /// Where the document came from.
        origin: String,
        /// Underlying error.
        source: serde_json::Error,
    },
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::Io { path, source } => {
                write!(f, "IO error reading {}: {}", path.display(), source)
            }
            DataError::Parse { origin, source } => {
                write!(f, "Parse error in {}: {}", origin, source)
            }
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataError::Io { source, .. } => Some(source),
            DataError::Parse { source, .. } => Some(source),
        }
    }
}
