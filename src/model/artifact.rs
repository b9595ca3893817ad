//! Opaque model persistence. Callers get a content-addressed handle back and
//! never look at the stored bytes.

use crate::error::PipelineError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactHandle {
    pub name: String,
    /// Hex SHA-256 of the stored bytes
    pub digest: String,
}

impl fmt::Display for ArtifactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, &self.digest[..self.digest.len().min(12)])
    }
}

/// Ordered input columns a persisted model expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureManifest {
    pub features: Vec<String>,
}

impl FeatureManifest {
    pub fn new(features: Vec<String>) -> Self {
        Self { features }
    }
}

pub trait ArtifactStore {
    fn save<M: Serialize>(&self, name: &str, model: &M) -> Result<ArtifactHandle, PipelineError>;
    fn load<M: DeserializeOwned>(&self, handle: &ArtifactHandle) -> Result<M, PipelineError>;
}

/// One JSON blob per artifact name inside a directory.
pub struct FsArtifactStore {
    dir: PathBuf,
}

impl FsArtifactStore {
    pub fn open(dir: &Path) -> Result<Self, PipelineError> {
        std::fs::create_dir_all(dir)?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

fn digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

impl ArtifactStore for FsArtifactStore {
    fn save<M: Serialize>(&self, name: &str, model: &M) -> Result<ArtifactHandle, PipelineError> {
        let bytes = serde_json::to_vec(model)?;
        std::fs::write(self.path(name), &bytes)?;
        let handle = ArtifactHandle {
            name: name.to_string(),
            digest: digest(&bytes),
        };
        tracing::info!(artifact = %handle, bytes = bytes.len(), "artifact saved");
        Ok(handle)
    }

    fn load<M: DeserializeOwned>(&self, handle: &ArtifactHandle) -> Result<M, PipelineError> {
        let bytes = std::fs::read(self.path(&handle.name))?;
        if digest(&bytes) != handle.digest {
            return Err(PipelineError::Artifact {
                handle: handle.to_string(),
                reason: "content digest changed since save".to_string(),
            });
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::open(dir.path()).unwrap();
        let manifest = FeatureManifest::new(vec!["steps".into(), "d_sleep".into()]);
        let handle = store.save("manifest", &manifest).unwrap();
        assert_eq!(handle.digest.len(), 64);
        let back: FeatureManifest = store.load(&handle).unwrap();
        assert_eq!(back, manifest);
    }

    #[test]
    fn tampered_blob_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::open(dir.path()).unwrap();
        let handle = store.save("m", &vec![1.0, 2.0]).unwrap();
        std::fs::write(dir.path().join("m.json"), b"[1.0,3.0]").unwrap();
        let err = store.load::<Vec<f64>>(&handle).unwrap_err();
        assert!(matches!(err, PipelineError::Artifact { .. }));
    }
}
