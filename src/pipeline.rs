use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::time::Instant;

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::{CHROMOSOMES, Pathway, Proteoform, Reaction};
use crate::error::IndexError;
use crate::graph::{GraphClient, QueryParams};
use crate::membership::{self, Container, Membership};
use crate::primitive::{self, StringMultimap};
use crate::proteoforms::{self, EntityProteoforms};
use crate::queries;
use crate::relation::{self, Multimap, map_entries};
use crate::store::{ArtifactRecord, IndexStore, Manifest, SCHEMA_VERSION};
use crate::variants::{self, ChromosomeScan};

/// Unit of work the coordinator knows how to build. Most targets produce one
/// artifact; membership and variant targets produce several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Target {
    Reactions,
    Pathways,
    GenesToProteins,
    EnsemblToProteins,
    ProteinsToNames,
    ProteinsToReactions,
    PhysicalEntitiesToReactions,
    ReactionsToPathways,
    PathwaysToTopLevelPathways,
    PhysicalEntitiesToProteoforms,
    ProteinsToProteoforms,
    ProteoformsToReactions,
    Complexes,
    Sets,
    Variants,
}

impl Target {
    /// Every target, each listed after all of its prerequisites.
    pub const BUILD_PLAN: [Target; 15] = [
        Target::Reactions,
        Target::GenesToProteins,
        Target::EnsemblToProteins,
        Target::ProteinsToNames,
        Target::ProteinsToReactions,
        Target::PhysicalEntitiesToReactions,
        Target::ReactionsToPathways,
        Target::PathwaysToTopLevelPathways,
        Target::PhysicalEntitiesToProteoforms,
        Target::ProteinsToProteoforms,
        Target::ProteoformsToReactions,
        Target::Pathways,
        Target::Complexes,
        Target::Sets,
        Target::Variants,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Target::Reactions => "reactions",
            Target::Pathways => "pathways",
            Target::GenesToProteins => "genesToProteins",
            Target::EnsemblToProteins => "ensemblToProteins",
            Target::ProteinsToNames => "proteinsToNames",
            Target::ProteinsToReactions => "proteinsToReactions",
            Target::PhysicalEntitiesToReactions => "physicalEntitiesToReactions",
            Target::ReactionsToPathways => "reactionsToPathways",
            Target::PathwaysToTopLevelPathways => "pathwaysToTopLevelPathways",
            Target::PhysicalEntitiesToProteoforms => "physicalEntitiesToProteoforms",
            Target::ProteinsToProteoforms => "proteinsToProteoforms",
            Target::ProteoformsToReactions => "proteoformsToReactions",
            Target::Complexes => "complexes",
            Target::Sets => "sets",
            Target::Variants => "variants",
        }
    }

    pub fn prerequisites(self) -> &'static [Target] {
        match self {
            Target::ProteinsToReactions => &[Target::Reactions],
            Target::ProteinsToProteoforms | Target::Complexes | Target::Sets => {
                &[Target::PhysicalEntitiesToProteoforms]
            }
            Target::ProteoformsToReactions => &[
                Target::PhysicalEntitiesToProteoforms,
                Target::PhysicalEntitiesToReactions,
            ],
            Target::Pathways => &[Target::ProteoformsToReactions, Target::ReactionsToPathways],
            Target::Variants => &[Target::ProteinsToReactions],
            _ => &[],
        }
    }

    pub fn artifacts(self) -> Vec<String> {
        match self {
            Target::PhysicalEntitiesToProteoforms => vec![
                "physicalEntitiesToProteoforms".to_string(),
                "proteoformsToPhysicalEntities".to_string(),
            ],
            Target::Complexes => Container::Complex
                .artifact_names()
                .iter()
                .map(|name| name.to_string())
                .collect(),
            Target::Sets => Container::Set
                .artifact_names()
                .iter()
                .map(|name| name.to_string())
                .collect(),
            Target::Variants => CHROMOSOMES
                .flat_map(|chromosome| {
                    [
                        variants::rs_ids_artifact(chromosome),
                        variants::positions_artifact(chromosome),
                    ]
                })
                .collect(),
            other => vec![other.name().to_string()],
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Accepts a target name or the name of any artifact it produces.
impl FromStr for Target {
    type Err = IndexError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value == "rsIdsToProteins" || value == "chrBpToProteins" {
            return Ok(Target::Variants);
        }
        Target::BUILD_PLAN
            .into_iter()
            .find(|target| {
                target.name() == value || target.artifacts().iter().any(|name| name == value)
            })
            .ok_or_else(|| IndexError::InvalidRelation(value.to_string()))
    }
}

/// Per-chromosome scans; always one entry per chromosome 1 to 22.
#[derive(Debug)]
pub struct VariantRelations {
    pub chromosomes: Vec<ChromosomeScan>,
}

impl VariantRelations {
    pub fn chromosome(&self, chromosome: u8) -> Option<&ChromosomeScan> {
        self.chromosomes
            .iter()
            .find(|scan| scan.chromosome == chromosome)
    }
}

/// Every relation built during one run, memoized for the run's lifetime.
#[derive(Debug, Default)]
pub struct PipelineContext {
    pub reactions: Option<Rc<BTreeMap<String, Reaction>>>,
    pub pathways: Option<Rc<BTreeMap<String, Pathway>>>,
    pub genes_to_proteins: Option<Rc<StringMultimap>>,
    pub ensembl_to_proteins: Option<Rc<StringMultimap>>,
    pub proteins_to_names: Option<Rc<BTreeMap<String, String>>>,
    pub proteins_to_reactions: Option<Rc<StringMultimap>>,
    pub physical_entities_to_reactions: Option<Rc<StringMultimap>>,
    pub reactions_to_pathways: Option<Rc<StringMultimap>>,
    pub pathways_to_top_level_pathways: Option<Rc<StringMultimap>>,
    pub entity_proteoforms: Option<Rc<EntityProteoforms>>,
    pub proteins_to_proteoforms: Option<Rc<Multimap<String, Proteoform>>>,
    pub proteoforms_to_reactions: Option<Rc<Multimap<Proteoform, String>>>,
    pub complexes: Option<Rc<Membership>>,
    pub sets: Option<Rc<Membership>>,
    pub variants: Option<Rc<VariantRelations>>,
    failed: BTreeSet<Target>,
    written: Vec<ArtifactRecord>,
    chromosome_failures: Vec<ChromosomeFailure>,
}

impl PipelineContext {
    pub fn written(&self) -> &[ArtifactRecord] {
        &self.written
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedTarget {
    pub target: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChromosomeFailure {
    pub chromosome: u8,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub built: Vec<String>,
    pub failed: Vec<FailedTarget>,
    pub chromosome_failures: Vec<ChromosomeFailure>,
    pub artifacts: Vec<ArtifactRecord>,
}

impl BuildReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

type Slot<T> = fn(&mut PipelineContext) -> &mut Option<Rc<T>>;
type PrimitiveBuild = fn(&dyn GraphClient, &QueryParams) -> Result<StringMultimap, IndexError>;

/// Lazy build coordinator. Each accessor builds its relation on first use,
/// after its prerequisites, persists it and keeps it for later calls.
///
/// Not meant to be shared between threads.
pub struct Pipeline<'a, G: GraphClient> {
    graph: G,
    params: QueryParams,
    species: String,
    store: IndexStore,
    variant_dir: Utf8PathBuf,
    sink: &'a dyn ProgressSink,
    context: PipelineContext,
}

impl<'a, G: GraphClient> Pipeline<'a, G> {
    pub fn new(
        graph: G,
        store: IndexStore,
        variant_dir: Utf8PathBuf,
        species: &str,
        sink: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            graph,
            params: queries::species_params(species),
            species: species.to_string(),
            store,
            variant_dir,
            sink,
            context: PipelineContext::default(),
        }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Builds `targets` in dependency order. Recoverable failures are
    /// collected in the report; a persistence failure aborts the run.
    pub fn run(&mut self, targets: &[Target]) -> Result<BuildReport, IndexError> {
        self.store.ensure_root()?;
        let mut built = Vec::new();
        let mut failed = Vec::new();

        for target in Target::BUILD_PLAN {
            if !targets.contains(&target) {
                continue;
            }
            match self.build(target) {
                Ok(()) => built.push(target.name().to_string()),
                Err(err) if err.is_fatal() => {
                    error!(target = target.name(), "aborting run: {err}");
                    return Err(err);
                }
                Err(err) => {
                    warn!(target = target.name(), "relation not built: {err}");
                    failed.push(FailedTarget {
                        target: target.name().to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }

        let manifest = Manifest {
            schema_version: SCHEMA_VERSION,
            tool: format!("pathway-index/{}", env!("CARGO_PKG_VERSION")),
            species: self.species.clone(),
            built_at: chrono::Utc::now().to_rfc3339(),
            artifacts: self.context.written.clone(),
        };
        self.store.write_manifest(&manifest)?;

        Ok(BuildReport {
            built,
            failed,
            chromosome_failures: self.context.chromosome_failures.clone(),
            artifacts: self.context.written.clone(),
        })
    }

    pub fn build(&mut self, target: Target) -> Result<(), IndexError> {
        match target {
            Target::Reactions => self.reactions().map(drop),
            Target::Pathways => self.pathways().map(drop),
            Target::GenesToProteins => self.genes_to_proteins().map(drop),
            Target::EnsemblToProteins => self.ensembl_to_proteins().map(drop),
            Target::ProteinsToNames => self.proteins_to_names().map(drop),
            Target::ProteinsToReactions => self.proteins_to_reactions().map(drop),
            Target::PhysicalEntitiesToReactions => self.physical_entities_to_reactions().map(drop),
            Target::ReactionsToPathways => self.reactions_to_pathways().map(drop),
            Target::PathwaysToTopLevelPathways => {
                self.pathways_to_top_level_pathways().map(drop)
            }
            Target::PhysicalEntitiesToProteoforms => {
                self.physical_entities_to_proteoforms().map(drop)
            }
            Target::ProteinsToProteoforms => self.proteins_to_proteoforms().map(drop),
            Target::ProteoformsToReactions => self.proteoforms_to_reactions().map(drop),
            Target::Complexes => self.complexes().map(drop),
            Target::Sets => self.sets().map(drop),
            Target::Variants => self.variants().map(drop),
        }
    }

    pub fn reactions(&mut self) -> Result<Rc<BTreeMap<String, Reaction>>, IndexError> {
        if let Some(relation) = &self.context.reactions {
            return Ok(Rc::clone(relation));
        }
        let result = self.build_reactions();
        let relation = self.settle(Target::Reactions, result)?;
        self.context.reactions = Some(Rc::clone(&relation));
        Ok(relation)
    }

    fn build_reactions(&mut self) -> Result<Rc<BTreeMap<String, Reaction>>, IndexError> {
        let started = self.begin(Target::Reactions)?;
        let reactions = primitive::reactions(&self.graph, &self.params)?;
        let records: Vec<&Reaction> = reactions.values().collect();
        self.persist(Target::Reactions.name(), &records)?;
        self.finish(Target::Reactions, started, reactions.len());
        Ok(Rc::new(reactions))
    }

    pub fn pathways(&mut self) -> Result<Rc<BTreeMap<String, Pathway>>, IndexError> {
        if let Some(relation) = &self.context.pathways {
            return Ok(Rc::clone(relation));
        }
        let result = self.build_pathways();
        let relation = self.settle(Target::Pathways, result)?;
        self.context.pathways = Some(Rc::clone(&relation));
        Ok(relation)
    }

    fn build_pathways(&mut self) -> Result<Rc<BTreeMap<String, Pathway>>, IndexError> {
        let target = Target::Pathways;
        self.ensure_not_failed(target)?;
        let proteoforms_to_reactions = self.prerequisite(target, Target::ProteoformsToReactions, |p| {
            p.proteoforms_to_reactions()
        })?;
        let reactions_to_pathways = self.prerequisite(target, Target::ReactionsToPathways, |p| {
            p.reactions_to_pathways()
        })?;
        let started = self.begin(target)?;
        let mut pathways = primitive::pathways(&self.graph, &self.params)?;
        primitive::count_pathway_proteoforms(
            &mut pathways,
            &proteoforms_to_reactions,
            &reactions_to_pathways,
        );
        let records: Vec<&Pathway> = pathways.values().collect();
        self.persist(Target::Pathways.name(), &records)?;
        self.finish(Target::Pathways, started, pathways.len());
        Ok(Rc::new(pathways))
    }

    pub fn genes_to_proteins(&mut self) -> Result<Rc<StringMultimap>, IndexError> {
        self.primitive_multimap(
            Target::GenesToProteins,
            |context| &mut context.genes_to_proteins,
            primitive::genes_to_proteins,
        )
    }

    pub fn ensembl_to_proteins(&mut self) -> Result<Rc<StringMultimap>, IndexError> {
        self.primitive_multimap(
            Target::EnsemblToProteins,
            |context| &mut context.ensembl_to_proteins,
            primitive::ensembl_to_proteins,
        )
    }

    pub fn physical_entities_to_reactions(&mut self) -> Result<Rc<StringMultimap>, IndexError> {
        self.primitive_multimap(
            Target::PhysicalEntitiesToReactions,
            |context| &mut context.physical_entities_to_reactions,
            primitive::physical_entities_to_reactions,
        )
    }

    pub fn reactions_to_pathways(&mut self) -> Result<Rc<StringMultimap>, IndexError> {
        self.primitive_multimap(
            Target::ReactionsToPathways,
            |context| &mut context.reactions_to_pathways,
            primitive::reactions_to_pathways,
        )
    }

    pub fn pathways_to_top_level_pathways(&mut self) -> Result<Rc<StringMultimap>, IndexError> {
        self.primitive_multimap(
            Target::PathwaysToTopLevelPathways,
            |context| &mut context.pathways_to_top_level_pathways,
            primitive::pathways_to_top_level_pathways,
        )
    }

    fn primitive_multimap(
        &mut self,
        target: Target,
        slot: Slot<StringMultimap>,
        build: PrimitiveBuild,
    ) -> Result<Rc<StringMultimap>, IndexError> {
        if let Some(relation) = slot(&mut self.context) {
            return Ok(Rc::clone(relation));
        }
        let result = self.build_primitive(target, build);
        let relation = self.settle(target, result)?;
        *slot(&mut self.context) = Some(Rc::clone(&relation));
        Ok(relation)
    }

    fn build_primitive(
        &mut self,
        target: Target,
        build: PrimitiveBuild,
    ) -> Result<Rc<StringMultimap>, IndexError> {
        let started = self.begin(target)?;
        let relation = build(&self.graph, &self.params)?;
        self.persist_multimap(target.name(), &relation)?;
        self.finish(target, started, relation.len());
        Ok(Rc::new(relation))
    }

    pub fn proteins_to_names(&mut self) -> Result<Rc<BTreeMap<String, String>>, IndexError> {
        if let Some(relation) = &self.context.proteins_to_names {
            return Ok(Rc::clone(relation));
        }
        let result = self.build_proteins_to_names();
        let relation = self.settle(Target::ProteinsToNames, result)?;
        self.context.proteins_to_names = Some(Rc::clone(&relation));
        Ok(relation)
    }

    fn build_proteins_to_names(&mut self) -> Result<Rc<BTreeMap<String, String>>, IndexError> {
        let started = self.begin(Target::ProteinsToNames)?;
        let names = primitive::proteins_to_names(&self.graph, &self.params)?;
        self.persist(Target::ProteinsToNames.name(), &map_entries(&names))?;
        self.finish(Target::ProteinsToNames, started, names.len());
        Ok(Rc::new(names))
    }

    pub fn proteins_to_reactions(&mut self) -> Result<Rc<StringMultimap>, IndexError> {
        if let Some(relation) = &self.context.proteins_to_reactions {
            return Ok(Rc::clone(relation));
        }
        let result = self.build_proteins_to_reactions();
        let relation = self.settle(Target::ProteinsToReactions, result)?;
        self.context.proteins_to_reactions = Some(Rc::clone(&relation));
        Ok(relation)
    }

    fn build_proteins_to_reactions(&mut self) -> Result<Rc<StringMultimap>, IndexError> {
        self.ensure_not_failed(Target::ProteinsToReactions)?;
        let reactions = self.prerequisite(Target::ProteinsToReactions, Target::Reactions, |p| {
            p.reactions()
        })?;
        let started = self.begin(Target::ProteinsToReactions)?;
        let relation = primitive::proteins_to_reactions(&self.graph, &self.params, &reactions)?;
        self.persist_multimap(Target::ProteinsToReactions.name(), &relation)?;
        self.finish(Target::ProteinsToReactions, started, relation.len());
        Ok(Rc::new(relation))
    }

    pub fn physical_entities_to_proteoforms(&mut self) -> Result<Rc<EntityProteoforms>, IndexError> {
        if let Some(relation) = &self.context.entity_proteoforms {
            return Ok(Rc::clone(relation));
        }
        let result = self.build_physical_entities_to_proteoforms();
        let relation = self.settle(Target::PhysicalEntitiesToProteoforms, result)?;
        self.context.entity_proteoforms = Some(Rc::clone(&relation));
        Ok(relation)
    }

    fn build_physical_entities_to_proteoforms(
        &mut self,
    ) -> Result<Rc<EntityProteoforms>, IndexError> {
        let target = Target::PhysicalEntitiesToProteoforms;
        let started = self.begin(target)?;
        let resolved = proteoforms::physical_entities_to_proteoforms(&self.graph, &self.params)?;
        self.persist_multimap("physicalEntitiesToProteoforms", &resolved.entities_to_proteoforms)?;
        self.persist_multimap("proteoformsToPhysicalEntities", &resolved.proteoforms_to_entities)?;
        self.finish(target, started, resolved.entities_to_proteoforms.len());
        Ok(Rc::new(resolved))
    }

    pub fn proteins_to_proteoforms(
        &mut self,
    ) -> Result<Rc<Multimap<String, Proteoform>>, IndexError> {
        if let Some(relation) = &self.context.proteins_to_proteoforms {
            return Ok(Rc::clone(relation));
        }
        let result = self.build_proteins_to_proteoforms();
        let relation = self.settle(Target::ProteinsToProteoforms, result)?;
        self.context.proteins_to_proteoforms = Some(Rc::clone(&relation));
        Ok(relation)
    }

    fn build_proteins_to_proteoforms(
        &mut self,
    ) -> Result<Rc<Multimap<String, Proteoform>>, IndexError> {
        let target = Target::ProteinsToProteoforms;
        self.ensure_not_failed(target)?;
        let resolved = self.prerequisite(target, Target::PhysicalEntitiesToProteoforms, |p| {
            p.physical_entities_to_proteoforms()
        })?;
        let started = self.begin(target)?;
        let relation = resolved.proteins_to_proteoforms();
        self.persist_multimap(target.name(), &relation)?;
        self.finish(target, started, relation.len());
        Ok(Rc::new(relation))
    }

    pub fn proteoforms_to_reactions(
        &mut self,
    ) -> Result<Rc<Multimap<Proteoform, String>>, IndexError> {
        if let Some(relation) = &self.context.proteoforms_to_reactions {
            return Ok(Rc::clone(relation));
        }
        let result = self.build_proteoforms_to_reactions();
        let relation = self.settle(Target::ProteoformsToReactions, result)?;
        self.context.proteoforms_to_reactions = Some(Rc::clone(&relation));
        Ok(relation)
    }

    fn build_proteoforms_to_reactions(
        &mut self,
    ) -> Result<Rc<Multimap<Proteoform, String>>, IndexError> {
        let target = Target::ProteoformsToReactions;
        self.ensure_not_failed(target)?;
        let resolved = self.prerequisite(target, Target::PhysicalEntitiesToProteoforms, |p| {
            p.physical_entities_to_proteoforms()
        })?;
        let entity_reactions = self.prerequisite(
            target,
            Target::PhysicalEntitiesToReactions,
            |p| p.physical_entities_to_reactions(),
        )?;
        let started = self.begin(target)?;
        let relation = relation::join(&entity_reactions, &resolved.entities_to_proteoforms);
        self.persist_multimap(target.name(), &relation)?;
        self.finish(target, started, relation.len());
        Ok(Rc::new(relation))
    }

    pub fn complexes(&mut self) -> Result<Rc<Membership>, IndexError> {
        if let Some(relation) = &self.context.complexes {
            return Ok(Rc::clone(relation));
        }
        let result = self.build_membership(Target::Complexes, Container::Complex);
        let relation = self.settle(Target::Complexes, result)?;
        self.context.complexes = Some(Rc::clone(&relation));
        Ok(relation)
    }

    pub fn sets(&mut self) -> Result<Rc<Membership>, IndexError> {
        if let Some(relation) = &self.context.sets {
            return Ok(Rc::clone(relation));
        }
        let result = self.build_membership(Target::Sets, Container::Set);
        let relation = self.settle(Target::Sets, result)?;
        self.context.sets = Some(Rc::clone(&relation));
        Ok(relation)
    }

    fn build_membership(
        &mut self,
        target: Target,
        container: Container,
    ) -> Result<Rc<Membership>, IndexError> {
        self.ensure_not_failed(target)?;
        let resolved = self.prerequisite(target, Target::PhysicalEntitiesToProteoforms, |p| {
            p.physical_entities_to_proteoforms()
        })?;
        let started = self.begin(target)?;
        let membership = membership::build_membership(
            &self.graph,
            &self.params,
            container,
            &resolved.entities_to_proteoforms,
        )?;
        let [to_proteins, from_proteins, to_proteoforms, from_proteoforms] =
            container.artifact_names();
        self.persist_multimap(to_proteins, &membership.containers_to_proteins)?;
        self.persist_multimap(from_proteins, &membership.proteins_to_containers)?;
        self.persist_multimap(to_proteoforms, &membership.containers_to_proteoforms)?;
        self.persist_multimap(from_proteoforms, &membership.proteoforms_to_containers)?;
        self.finish(target, started, membership.containers_to_proteins.len());
        Ok(Rc::new(membership))
    }

    pub fn variants(&mut self) -> Result<Rc<VariantRelations>, IndexError> {
        if let Some(relation) = &self.context.variants {
            return Ok(Rc::clone(relation));
        }
        let result = self.build_variants();
        let relation = self.settle(Target::Variants, result)?;
        self.context.variants = Some(Rc::clone(&relation));
        Ok(relation)
    }

    fn build_variants(&mut self) -> Result<Rc<VariantRelations>, IndexError> {
        let target = Target::Variants;
        self.ensure_not_failed(target)?;
        let known = self.prerequisite(target, Target::ProteinsToReactions, |p| {
            p.proteins_to_reactions()
        })?;
        let started = self.begin(target)?;
        let is_known = |accession: &str| known.contains_key(accession);
        let scans = variants::scan_all(&self.variant_dir, &is_known);

        for scan in &scans {
            self.persist_multimap(&scan.rs_ids_artifact(), &scan.rs_ids_to_proteins)?;
            self.persist_multimap(&scan.positions_artifact(), &scan.positions_to_proteins)?;
            if let Some(err) = &scan.error {
                self.context.chromosome_failures.push(ChromosomeFailure {
                    chromosome: scan.chromosome,
                    message: err.to_string(),
                });
            }
            self.sink.event(ProgressEvent {
                message: format!(
                    "chromosome={} rsids={} positions={}",
                    scan.chromosome,
                    scan.rs_ids_to_proteins.len(),
                    scan.positions_to_proteins.len()
                ),
                elapsed: None,
            });
        }

        self.finish(target, started, scans.len());
        Ok(Rc::new(VariantRelations { chromosomes: scans }))
    }

    fn ensure_not_failed(&self, target: Target) -> Result<(), IndexError> {
        if self.context.failed.contains(&target) {
            return Err(IndexError::AlreadyFailed(target.name().to_string()));
        }
        Ok(())
    }

    /// Announces the build and starts its timer. Called once prerequisites
    /// are in hand, so the elapsed time covers this relation only.
    fn begin(&self, target: Target) -> Result<Instant, IndexError> {
        self.ensure_not_failed(target)?;
        self.sink.event(ProgressEvent {
            message: format!("relation={target} phase=build"),
            elapsed: None,
        });
        Ok(Instant::now())
    }

    fn finish(&self, target: Target, started: Instant, keys: usize) {
        let elapsed = started.elapsed();
        info!(
            relation = target.name(),
            keys,
            elapsed_ms = elapsed.as_millis() as u64,
            "relation built"
        );
        self.sink.event(ProgressEvent {
            message: format!("relation={target} keys={keys}"),
            elapsed: Some(elapsed),
        });
    }

    /// Remembers a failed target so later requests fail fast instead of
    /// querying again.
    fn settle<T>(&mut self, target: Target, result: Result<T, IndexError>) -> Result<T, IndexError> {
        if result.is_err() {
            self.context.failed.insert(target);
        }
        result
    }

    fn prerequisite<T>(
        &mut self,
        target: Target,
        prerequisite: Target,
        build: impl FnOnce(&mut Self) -> Result<T, IndexError>,
    ) -> Result<T, IndexError> {
        build(self).map_err(|err| {
            if err.is_fatal() {
                err
            } else {
                IndexError::PrerequisiteFailed {
                    relation: target.name().to_string(),
                    prerequisite: prerequisite.name().to_string(),
                }
            }
        })
    }

    fn persist<E: Serialize>(&mut self, name: &str, entries: &[E]) -> Result<(), IndexError> {
        let record = self.store.write_artifact(name, entries)?;
        self.context.written.push(record);
        Ok(())
    }

    fn persist_multimap<K, V>(&mut self, name: &str, relation: &Multimap<K, V>) -> Result<(), IndexError>
    where
        K: Ord + Clone + Serialize,
        V: Ord + Clone + Serialize,
    {
        let record = self.store.write_multimap(name, relation)?;
        self.context.written.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_plan_lists_prerequisites_first() {
        for (index, target) in Target::BUILD_PLAN.iter().enumerate() {
            for prerequisite in target.prerequisites() {
                let position = Target::BUILD_PLAN
                    .iter()
                    .position(|candidate| candidate == prerequisite)
                    .unwrap();
                assert!(position < index, "{prerequisite} must precede {target}");
            }
        }
    }

    #[test]
    fn targets_parse_from_artifact_names() {
        assert_eq!("proteoformsToSets".parse::<Target>().unwrap(), Target::Sets);
        assert_eq!("chrBpToProteins22".parse::<Target>().unwrap(), Target::Variants);
        assert_eq!(
            "proteoformsToPhysicalEntities".parse::<Target>().unwrap(),
            Target::PhysicalEntitiesToProteoforms
        );
        assert!("chrBpToProteins23".parse::<Target>().is_err());
    }

    #[test]
    fn variant_target_names_all_chromosomes() {
        let artifacts = Target::Variants.artifacts();
        assert_eq!(artifacts.len(), 44);
        assert!(artifacts.contains(&"rsIdsToProteins1".to_string()));
        assert!(artifacts.contains(&"chrBpToProteins22".to_string()));
    }
}
