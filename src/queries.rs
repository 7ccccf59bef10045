//! Cypher statements issued against the pathway graph, one per relation.
//!
//! Every statement takes a `$species` parameter and returns `DISTINCT` rows.

use serde_json::Value;

use crate::graph::QueryParams;

/// Relationship path from a reaction to every physical entity it involves,
/// descending through catalysts, regulations, complexes and sets.
macro_rules! participant_path {
    () => {
        "input|output|catalystActivity|physicalEntity|regulatedBy|regulator|hasComponent|hasMember|hasCandidate|repeatedUnit*"
    };
}

pub const GENES_TO_PROTEINS: &str = "\
MATCH (pe:PhysicalEntity {speciesName: $species})-[:referenceEntity]->(re:ReferenceEntity {databaseName: 'UniProt'})
WITH DISTINCT re
UNWIND re.geneName AS gene
RETURN DISTINCT gene, re.identifier AS protein";

pub const ENSEMBL_TO_PROTEINS: &str = "\
MATCH (pe:PhysicalEntity {speciesName: $species})-[:referenceEntity]->(re:ReferenceEntity {databaseName: 'UniProt'})-[:referenceGene]->(rds:ReferenceDNASequence)
WHERE rds.databaseName = 'ENSEMBL' AND rds.identifier STARTS WITH 'ENSG'
RETURN DISTINCT rds.identifier AS ensembl, re.identifier AS protein";

pub const REACTIONS: &str = concat!(
    "MATCH (rle:ReactionLikeEvent {speciesName: $species})\n",
    "OPTIONAL MATCH (rle)-[path:",
    participant_path!(),
    "]->(pe:PhysicalEntity)-[:referenceEntity]->(re:ReferenceEntity {databaseName: 'UniProt'})\n",
    "RETURN DISTINCT rle.stId AS reaction, rle.displayName AS displayName, ",
    "re.identifier AS protein, CASE WHEN path IS NULL THEN null ELSE type(head(path)) END AS role"
);

/// Proteoform totals are not counted here; physical entities are not
/// proteoforms, so the pipeline fills them in from `proteoformsToReactions`.
pub const PATHWAYS: &str = concat!(
    "MATCH (p:Pathway {speciesName: $species})\n",
    "OPTIONAL MATCH (p)-[:hasEvent*]->(rle:ReactionLikeEvent)\n",
    "OPTIONAL MATCH (rle)-[:",
    participant_path!(),
    "]->(pe:PhysicalEntity)-[:referenceEntity]->(re:ReferenceEntity {databaseName: 'UniProt'})\n",
    "RETURN p.stId AS pathway, p.displayName AS displayName, ",
    "count(DISTINCT re.identifier) AS numEntitiesTotal, ",
    "count(DISTINCT rle) AS numReactionsTotal"
);

/// Proteins without any reaction come back with the reaction column set to
/// the literal `"null"`.
pub const PROTEINS_TO_REACTIONS: &str = concat!(
    "MATCH (pe:PhysicalEntity {speciesName: $species})-[:referenceEntity]->(re:ReferenceEntity {databaseName: 'UniProt'})\n",
    "OPTIONAL MATCH (rle:ReactionLikeEvent {speciesName: $species})-[:",
    participant_path!(),
    "]->(pe)\n",
    "RETURN DISTINCT re.identifier AS protein, coalesce(rle.stId, 'null') AS reaction"
);

pub const PHYSICAL_ENTITIES_TO_REACTIONS: &str = concat!(
    "MATCH (rle:ReactionLikeEvent {speciesName: $species})-[:",
    participant_path!(),
    "]->(pe:PhysicalEntity)-[:referenceEntity]->(:ReferenceEntity {databaseName: 'UniProt'})\n",
    "RETURN DISTINCT pe.stId AS physicalEntity, rle.stId AS reaction"
);

pub const REACTIONS_TO_PATHWAYS: &str = "\
MATCH (p:Pathway {speciesName: $species})-[:hasEvent*]->(rle:ReactionLikeEvent {speciesName: $species})
RETURN DISTINCT rle.stId AS reaction, p.stId AS pathway";

pub const PATHWAYS_TO_TOP_LEVEL_PATHWAYS: &str = "\
MATCH (tlp:TopLevelPathway {speciesName: $species})-[:hasEvent*]->(p:Pathway {speciesName: $species})
RETURN DISTINCT p.stId AS pathway, tlp.stId AS topLevelPathway";

pub const PROTEINS_TO_NAMES: &str = "\
MATCH (:PhysicalEntity {speciesName: $species})-[:referenceEntity]->(re:ReferenceEntity {databaseName: 'UniProt'})
RETURN DISTINCT re.identifier AS protein, re.displayName AS name
ORDER BY protein";

/// One row per (protein, isoform, modification set) signature with every
/// physical entity sharing it.
pub const PHYSICAL_ENTITIES_TO_PROTEOFORMS: &str = "\
MATCH (pe:PhysicalEntity {speciesName: $species})-[:referenceEntity]->(re:ReferenceEntity {databaseName: 'UniProt'})
WITH DISTINCT pe, re
OPTIONAL MATCH (pe)-[:hasModifiedResidue]->(tm:TranslationalModification)-[:psiMod]->(mod:PsiMod)
WITH DISTINCT pe.stId AS physicalEntity, re.identifier AS protein, re.variantIdentifier AS isoform,
     tm.coordinate AS coordinate, mod.identifier AS type
ORDER BY type, coordinate
WITH DISTINCT physicalEntity, protein, isoform,
     COLLECT(type + ':' + CASE WHEN coordinate IS NOT NULL THEN toString(coordinate) ELSE 'null' END) AS ptms
RETURN DISTINCT protein, isoform, ptms, COLLECT(physicalEntity) AS physicalEntities";

pub const COMPLEX_COMPONENTS: &str = "\
MATCH (c:Complex {speciesName: $species})-[:hasComponent|hasMember|hasCandidate|repeatedUnit*]->(pe:PhysicalEntity)-[:referenceEntity]->(re:ReferenceEntity {databaseName: 'UniProt'})
RETURN DISTINCT c.stId AS container, pe.stId AS physicalEntity, re.identifier AS protein";

pub const SET_MEMBERS: &str = "\
MATCH (s:EntitySet {speciesName: $species})-[:hasMember|hasCandidate|hasComponent|repeatedUnit*]->(pe:PhysicalEntity)-[:referenceEntity]->(re:ReferenceEntity {databaseName: 'UniProt'})
RETURN DISTINCT s.stId AS container, pe.stId AS physicalEntity, re.identifier AS protein";

pub fn species_params(species: &str) -> QueryParams {
    let mut params = QueryParams::new();
    params.insert("species".to_string(), Value::String(species.to_string()));
    params
}
