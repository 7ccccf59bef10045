use std::fs;
use std::io::{BufReader, BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::Builder;

use crate::error::IndexError;
use crate::relation::{Multimap, MultimapEntry};

pub const SCHEMA_VERSION: u32 = 1;
pub const MANIFEST_FILE: &str = "manifest.json";

/// Self-contained persisted relation: `<name>.gz` holds one of these as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact<E> {
    pub schema_version: u32,
    pub name: String,
    pub entries: Vec<E>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub name: String,
    pub file: String,
    pub entries: usize,
    pub written_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: u32,
    pub tool: String,
    pub species: String,
    pub built_at: String,
    pub artifacts: Vec<ArtifactRecord>,
}

#[derive(Debug, Clone)]
pub struct IndexStore {
    root: Utf8PathBuf,
}

impl IndexStore {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn artifact_path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(format!("{name}.gz"))
    }

    pub fn manifest_path(&self) -> Utf8PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn ensure_root(&self) -> Result<(), IndexError> {
        fs::create_dir_all(self.root.as_std_path()).map_err(|err| IndexError::Persistence {
            name: self.root.to_string(),
            message: err.to_string(),
        })
    }

    pub fn exists(&self, name: &str) -> bool {
        self.artifact_path(name).as_std_path().exists()
    }

    /// Writes `<name>.gz` through a temporary sibling file, so a failed write
    /// never leaves a truncated artifact behind.
    pub fn write_artifact<E: Serialize>(
        &self,
        name: &str,
        entries: &[E],
    ) -> Result<ArtifactRecord, IndexError> {
        let persistence = |message: String| IndexError::Persistence {
            name: name.to_string(),
            message,
        };
        let path = self.artifact_path(name);
        fs::create_dir_all(self.root.as_std_path()).map_err(|err| persistence(err.to_string()))?;

        let temp = Builder::new()
            .prefix(".pathway-index")
            .tempfile_in(self.root.as_std_path())
            .map_err(|err| persistence(err.to_string()))?;
        {
            let mut encoder =
                GzEncoder::new(BufWriter::new(temp.as_file()), Compression::default());
            let document = ArtifactRef {
                schema_version: SCHEMA_VERSION,
                name,
                entries,
            };
            serde_json::to_writer(&mut encoder, &document)
                .map_err(|err| persistence(err.to_string()))?;
            let mut writer = encoder.finish().map_err(|err| persistence(err.to_string()))?;
            writer.flush().map_err(|err| persistence(err.to_string()))?;
        }
        temp.persist(path.as_std_path())
            .map_err(|err| persistence(err.to_string()))?;

        Ok(ArtifactRecord {
            name: name.to_string(),
            file: path
                .file_name()
                .map(str::to_string)
                .unwrap_or_else(|| path.to_string()),
            entries: entries.len(),
            written_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    pub fn write_multimap<K, V>(
        &self,
        name: &str,
        relation: &Multimap<K, V>,
    ) -> Result<ArtifactRecord, IndexError>
    where
        K: Ord + Clone + Serialize,
        V: Ord + Clone + Serialize,
    {
        self.write_artifact(name, &relation.entries())
    }

    pub fn read_artifact<E: DeserializeOwned>(&self, name: &str) -> Result<Artifact<E>, IndexError> {
        let read_error = |message: String| IndexError::ArtifactRead {
            name: name.to_string(),
            message,
        };
        let path = self.artifact_path(name);
        if !path.as_std_path().exists() {
            return Err(IndexError::ArtifactNotFound(name.to_string()));
        }
        let file = fs::File::open(path.as_std_path())
            .map_err(|err| read_error(format!("open {path}: {err}")))?;
        let artifact: Artifact<E> =
            serde_json::from_reader(BufReader::new(GzDecoder::new(file)))
                .map_err(|err| read_error(err.to_string()))?;
        if artifact.schema_version != SCHEMA_VERSION {
            return Err(read_error(format!(
                "unsupported schema version {}",
                artifact.schema_version
            )));
        }
        Ok(artifact)
    }

    pub fn read_multimap<K, V>(&self, name: &str) -> Result<Multimap<K, V>, IndexError>
    where
        K: Ord + DeserializeOwned,
        V: Ord + DeserializeOwned,
    {
        let artifact: Artifact<MultimapEntry<K, V>> = self.read_artifact(name)?;
        Ok(artifact.entries.into_iter().collect())
    }

    pub fn write_manifest(&self, manifest: &Manifest) -> Result<(), IndexError> {
        let path = self.manifest_path();
        let persistence = |message: String| IndexError::Persistence {
            name: MANIFEST_FILE.to_string(),
            message,
        };
        let content =
            serde_json::to_vec_pretty(manifest).map_err(|err| persistence(err.to_string()))?;
        let tmp_path = path.with_extension("json.tmp");
        fs::create_dir_all(self.root.as_std_path()).map_err(|err| persistence(err.to_string()))?;
        fs::write(tmp_path.as_std_path(), &content).map_err(|err| persistence(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| persistence(err.to_string()))?;
        Ok(())
    }

    pub fn read_manifest(&self) -> Result<Option<Manifest>, IndexError> {
        let path = self.manifest_path();
        if !path.as_std_path().exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path.as_std_path()).map_err(|err| {
            IndexError::ArtifactRead {
                name: MANIFEST_FILE.to_string(),
                message: err.to_string(),
            }
        })?;
        let manifest = serde_json::from_str(&content).map_err(|err| IndexError::ArtifactRead {
            name: MANIFEST_FILE.to_string(),
            message: err.to_string(),
        })?;
        Ok(Some(manifest))
    }
}

#[derive(Serialize)]
struct ArtifactRef<'a, E> {
    schema_version: u32,
    name: &'a str,
    entries: &'a [E],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_path_follows_relation_name() {
        let store = IndexStore::new(Utf8PathBuf::from("/tmp/index"));
        assert!(store.artifact_path("genesToProteins").ends_with("genesToProteins.gz"));
        assert!(store.artifact_path("rsIdsToProteins7").ends_with("rsIdsToProteins7.gz"));
        assert!(store.manifest_path().ends_with(MANIFEST_FILE));
    }
}
