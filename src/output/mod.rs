//! Output surfaces for verdict artifacts.
//!
//! - Artifact: the canonical, coherence-checked record of a run
//! - JSON: machine-readable serialization of the artifact
//! - Terminal: human-readable summary with colors and box drawing

mod artifact;
mod json;
mod terminal;

pub use artifact::{
    AdequacySection, ArtifactEmitter, EffectSection, Fingerprints, ResamplingSection, RunRecord,
    VerdictArtifact, ARTIFACT_SCHEMA_VERSION,
};
pub use json::{to_json, to_json_pretty};
pub use terminal::format_summary;
