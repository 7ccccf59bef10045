use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use pathway_index::error::IndexError;
use pathway_index::relation::Multimap;
use pathway_index::store::{IndexStore, Manifest, SCHEMA_VERSION};

fn store(temp: &tempfile::TempDir) -> IndexStore {
    IndexStore::new(Utf8PathBuf::from_path_buf(temp.path().join("index")).unwrap())
}

#[test]
fn multimap_survives_write_and_read() {
    let temp = tempfile::tempdir().unwrap();
    let store = store(&temp);
    let mut builder = Multimap::builder();
    builder.insert("INS".to_string(), "P01308".to_string());
    builder.insert("HBB".to_string(), "P68871".to_string());
    builder.insert_key("ORPHAN".to_string());
    let relation = builder.build();

    let record = store.write_multimap("genesToProteins", &relation).unwrap();

    assert_eq!(record.file, "genesToProteins.gz");
    assert_eq!(record.entries, 3);
    let read: Multimap<String, String> = store.read_multimap("genesToProteins").unwrap();
    assert_eq!(read, relation);
    assert!(read.get("ORPHAN").unwrap().is_empty());
}

#[test]
fn rewrite_replaces_previous_artifact() {
    let temp = tempfile::tempdir().unwrap();
    let store = store(&temp);
    store.write_artifact("proteinsToNames", &["a", "b"]).unwrap();
    store.write_artifact("proteinsToNames", &["c"]).unwrap();

    let artifact = store.read_artifact::<String>("proteinsToNames").unwrap();
    assert_eq!(artifact.schema_version, SCHEMA_VERSION);
    assert_eq!(artifact.entries, vec!["c"]);

    let leftovers: Vec<_> = std::fs::read_dir(store.root().as_std_path())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(".pathway-index"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn missing_artifact_is_reported() {
    let temp = tempfile::tempdir().unwrap();
    let store = store(&temp);
    let err = store.read_artifact::<String>("reactions").unwrap_err();
    assert_matches!(err, IndexError::ArtifactNotFound(name) if name == "reactions");
}

#[test]
fn manifest_roundtrip() {
    let temp = tempfile::tempdir().unwrap();
    let store = store(&temp);
    assert!(store.read_manifest().unwrap().is_none());

    let record = store.write_artifact("pathways", &[1, 2, 3]).unwrap();
    let manifest = Manifest {
        schema_version: SCHEMA_VERSION,
        tool: "pathway-index/test".to_string(),
        species: "Homo sapiens".to_string(),
        built_at: "2026-01-01T00:00:00Z".to_string(),
        artifacts: vec![record.clone()],
    };
    store.write_manifest(&manifest).unwrap();

    let read = store.read_manifest().unwrap().unwrap();
    assert_eq!(read.species, "Homo sapiens");
    assert_eq!(read.artifacts, vec![record]);
}
