// Orchestration layer: everything around the VCDIFF core needed to turn a
// vanilla disc image into a patched one the way the original updater did --
// locate the source image, poll a release catalog, reshape known container
// formats into the canonical raw image, and apply the decoded patch.
//
// None of this participates in the decoder's correctness invariants; it is
// glue code with its own error boundary.

pub mod catalog;
pub mod profile;
pub mod reshape;

use std::path::PathBuf;

pub use catalog::{CatalogClient, CatalogError, ReleaseDescriptor};
pub use profile::{ImageProfile, ProfileError, identify_image};
pub use reshape::{ContainerFormat, ReshapeError};

/// Errors surfaced by the orchestrator layer, wrapping the lower-level
/// errors from each of its components plus the core decoder.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Reshape(#[from] ReshapeError),
    #[error("patch decode failed: {0}")]
    Decode(#[from] crate::vcdiff::DecodeError),
    #[error("patch apply failed: {0}")]
    Apply(#[from] crate::io::IoError),
}

/// Persisted on-disk state, mirroring the original updater's flat files
/// under `data/` but round-tripped through `serde` instead of raw bytes.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct State {
    /// Version name of the last successfully applied patch, if any.
    pub current_version: Option<String>,
    /// Path to the known-good source image, once located.
    pub source_image_path: Option<PathBuf>,
}

impl State {
    const FILE_NAME: &'static str = "state.json";

    /// Load state from `dir/state.json`, or a default empty state if it
    /// does not exist yet.
    pub fn load(dir: &std::path::Path) -> Result<Self, OrchestratorError> {
        let path = dir.join(Self::FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = std::fs::read(&path)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| OrchestratorError::Catalog(CatalogError::Json(e)))
    }

    /// Persist state to `dir/state.json`, creating `dir` if needed.
    pub fn save(&self, dir: &std::path::Path) -> Result<(), OrchestratorError> {
        std::fs::create_dir_all(dir)?;
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| OrchestratorError::Catalog(CatalogError::Json(e)))?;
        std::fs::write(dir.join(Self::FILE_NAME), bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_roundtrips_through_json() {
        let dir = std::env::temp_dir().join("deltapatch_orchestrator_state_test");
        let _ = std::fs::remove_dir_all(&dir);

        let state = State {
            current_version: Some("1.2.3".to_string()),
            source_image_path: Some(PathBuf::from("/tmp/source.iso")),
        };
        state.save(&dir).unwrap();

        let loaded = State::load(&dir).unwrap();
        assert_eq!(loaded.current_version, state.current_version);
        assert_eq!(loaded.source_image_path, state.source_image_path);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_state_file_is_default() {
        let dir = std::env::temp_dir().join("deltapatch_orchestrator_missing_state_test");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let loaded = State::load(&dir).unwrap();
        assert!(loaded.current_version.is_none());
        assert!(loaded.source_image_path.is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
