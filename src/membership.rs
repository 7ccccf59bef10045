use crate::domain::Proteoform;
use crate::error::IndexError;
use crate::graph::{GraphClient, QueryParams, Record};
use crate::queries;
use crate::relation::{Multimap, MultimapBuilder};

/// Composite entity kind whose recursive membership is flattened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Complex,
    Set,
}

impl Container {
    pub fn query(self) -> &'static str {
        match self {
            Container::Complex => queries::COMPLEX_COMPONENTS,
            Container::Set => queries::SET_MEMBERS,
        }
    }

    /// Artifact names in the order container→protein, protein→container,
    /// container→proteoform, proteoform→container.
    pub fn artifact_names(self) -> [&'static str; 4] {
        match self {
            Container::Complex => [
                "complexesToProteins",
                "proteinsToComplexes",
                "complexesToProteoforms",
                "proteoformsToComplexes",
            ],
            Container::Set => [
                "setsToProteins",
                "proteinsToSets",
                "setsToProteoforms",
                "proteoformsToSets",
            ],
        }
    }
}

/// Flattened membership of one container kind at protein and proteoform level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub containers_to_proteins: Multimap<String, String>,
    pub proteins_to_containers: Multimap<String, String>,
    pub containers_to_proteoforms: Multimap<String, Proteoform>,
    pub proteoforms_to_containers: Multimap<Proteoform, String>,
}

/// Single pass over (container, physicalEntity, protein) rows. Proteoform
/// membership follows the row's physical entity through
/// `entities_to_proteoforms`; entities without proteoforms contribute protein
/// membership only.
pub fn fold_membership(
    records: &[Record],
    entities_to_proteoforms: &Multimap<String, Proteoform>,
) -> Result<Membership, IndexError> {
    let mut containers_to_proteins = MultimapBuilder::new();
    let mut proteins_to_containers = MultimapBuilder::new();
    let mut containers_to_proteoforms = MultimapBuilder::new();
    let mut proteoforms_to_containers = MultimapBuilder::new();

    for record in records {
        let container = record.text("container")?;
        let entity = record.text("physicalEntity")?;
        let protein = record.text("protein")?;

        containers_to_proteins.insert(container.to_string(), protein.to_string());
        proteins_to_containers.insert(protein.to_string(), container.to_string());

        if let Some(proteoforms) = entities_to_proteoforms.get(entity) {
            for proteoform in proteoforms {
                containers_to_proteoforms.insert(container.to_string(), proteoform.clone());
                proteoforms_to_containers.insert(proteoform.clone(), container.to_string());
            }
        }
    }

    Ok(Membership {
        containers_to_proteins: containers_to_proteins.build(),
        proteins_to_containers: proteins_to_containers.build(),
        containers_to_proteoforms: containers_to_proteoforms.build(),
        proteoforms_to_containers: proteoforms_to_containers.build(),
    })
}

pub fn build_membership(
    graph: &dyn GraphClient,
    params: &QueryParams,
    container: Container,
    entities_to_proteoforms: &Multimap<String, Proteoform>,
) -> Result<Membership, IndexError> {
    let records = graph.execute(container.query(), params)?;
    fold_membership(&records, entities_to_proteoforms)
}
