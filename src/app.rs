use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::config::ResolvedConfig;
use crate::error::IndexError;
use crate::graph::GraphClient;
use crate::pipeline::{BuildReport, Pipeline, Target};
use crate::store::{Artifact, IndexStore};

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Targets to build; empty means every target.
    pub targets: Vec<Target>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    pub output_dir: String,
    pub species: Option<String>,
    pub built_at: Option<String>,
    pub artifacts: Vec<ListEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListEntry {
    pub name: String,
    pub file: String,
    pub entries: usize,
    pub written_at: String,
    pub present: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InspectResult {
    pub name: String,
    pub schema_version: u32,
    pub entries: usize,
    pub sample: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct App<G: GraphClient> {
    store: IndexStore,
    graph: G,
}

impl<G: GraphClient> App<G> {
    pub fn new(store: IndexStore, graph: G) -> Self {
        Self { store, graph }
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn build(
        &self,
        config: &ResolvedConfig,
        options: BuildOptions,
        sink: &dyn ProgressSink,
    ) -> Result<BuildReport, IndexError> {
        let targets = if options.targets.is_empty() {
            Target::BUILD_PLAN.to_vec()
        } else {
            options.targets
        };
        sink.event(ProgressEvent {
            message: format!(
                "phase=Build; species={} targets={}",
                config.species,
                targets.len()
            ),
            elapsed: None,
        });

        let mut pipeline = Pipeline::new(
            &self.graph,
            self.store.clone(),
            config.variant_dir.clone(),
            &config.species,
            sink,
        );
        pipeline.run(&targets)
    }

    pub fn list(&self, sink: &dyn ProgressSink) -> Result<ListResult, IndexError> {
        sink.event(ProgressEvent {
            message: format!("phase=Resolve; reading manifest in {}", self.store.root()),
            elapsed: None,
        });

        let manifest = self.store.read_manifest()?;
        let Some(manifest) = manifest else {
            return Ok(ListResult {
                output_dir: self.store.root().to_string(),
                species: None,
                built_at: None,
                artifacts: Vec::new(),
            });
        };

        let artifacts = manifest
            .artifacts
            .into_iter()
            .map(|record| ListEntry {
                present: self.store.exists(&record.name),
                name: record.name,
                file: record.file,
                entries: record.entries,
                written_at: record.written_at,
            })
            .collect();

        Ok(ListResult {
            output_dir: self.store.root().to_string(),
            species: Some(manifest.species),
            built_at: Some(manifest.built_at),
            artifacts,
        })
    }

    pub fn inspect(
        &self,
        name: &str,
        limit: usize,
        sink: &dyn ProgressSink,
    ) -> Result<InspectResult, IndexError> {
        sink.event(ProgressEvent {
            message: format!("phase=Resolve; reading {name}"),
            elapsed: None,
        });

        let artifact: Artifact<Value> = self.store.read_artifact(name)?;
        let entries = artifact.entries.len();
        Ok(InspectResult {
            name: artifact.name,
            schema_version: artifact.schema_version,
            entries,
            sample: artifact.entries.into_iter().take(limit).collect(),
        })
    }
}
