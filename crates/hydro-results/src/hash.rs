//! Content-based hashing for run IDs.
//!
//! The run ID is a hash of the INP file's own bytes (its content already
//! determines the network) plus the run parameters that aren't otherwise
//! captured in the file -- duration, step, demand mode -- and the solver
//! version, so a re-run of the identical INP with identical options
//! reproduces the same run ID and a changed solver build does not silently
//! reuse a stale cache entry.

use sha2::{Digest, Sha256};

use crate::types::DemandMode;

pub fn compute_run_id(
    inp_bytes: &[u8],
    dt_s: f64,
    duration_s: f64,
    mode: DemandMode,
    solver_version: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(inp_bytes);
    hasher.update(dt_s.to_le_bytes());
    hasher.update(duration_s.to_le_bytes());
    hasher.update(mode.to_string().as_bytes());
    hasher.update(solver_version.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_stability() {
        let hash1 = compute_run_id(b"[OPTIONS]\nUNITS GPM\n", 3600.0, 86400.0, DemandMode::Dd, "v1");
        let hash2 = compute_run_id(b"[OPTIONS]\nUNITS GPM\n", 3600.0, 86400.0, DemandMode::Dd, "v1");
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn hash_differs_for_different_inputs() {
        let hash1 = compute_run_id(b"network a", 3600.0, 86400.0, DemandMode::Dd, "v1");
        let hash2 = compute_run_id(b"network b", 3600.0, 86400.0, DemandMode::Dd, "v1");
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn hash_differs_for_different_mode() {
        let hash1 = compute_run_id(b"network a", 3600.0, 86400.0, DemandMode::Dd, "v1");
        let hash2 = compute_run_id(b"network a", 3600.0, 86400.0, DemandMode::Pdd, "v1");
        assert_ne!(hash1, hash2);
    }
}
