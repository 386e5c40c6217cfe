//! Content fingerprints and run identifiers.
//!
//! Fingerprints are SHA-256 digests of the compact JSON serialization of a
//! value, rendered as `sha256:<hex>`. Struct fields serialize in
//! declaration order, so equal values always produce equal fingerprints.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Fingerprint of any serializable value.
pub fn fingerprint<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(value)?;
    Ok(format!("sha256:{}", hex::encode(Sha256::digest(bytes))))
}

/// Deterministic run identifier.
///
/// Derived from the input fingerprints, the seed and the iteration count,
/// so re-running the same invocation yields the same id.
pub fn run_id(
    observations: &str,
    lane_matrix: &str,
    policy: &str,
    seed: u64,
    iterations: usize,
) -> String {
    let mut hasher = Sha256::new();
    for part in [observations, lane_matrix, policy] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hasher.update(seed.to_le_bytes());
    hasher.update((iterations as u64).to_le_bytes());
    let digest = hasher.finalize();
    format!("run-{}", &hex::encode(digest)[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_format_and_stability() {
        let fp = fingerprint(&vec![1, 2, 3]).unwrap();
        assert!(fp.starts_with("sha256:"));
        assert_eq!(fp.len(), "sha256:".len() + 64);
        assert_eq!(fp, fingerprint(&vec![1, 2, 3]).unwrap());
        assert_ne!(fp, fingerprint(&vec![1, 2, 4]).unwrap());
    }

    #[test]
    fn test_run_id_depends_on_every_input() {
        let base = run_id("a", "b", "c", 42, 2000);
        assert_eq!(base, run_id("a", "b", "c", 42, 2000));
        assert!(base.starts_with("run-"));
        assert_ne!(base, run_id("a", "b", "c", 43, 2000));
        assert_ne!(base, run_id("a", "b", "c", 42, 200));
        assert_ne!(base, run_id("a", "b", "x", 42, 2000));
    }
}
