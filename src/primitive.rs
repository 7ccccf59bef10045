use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::domain::{Pathway, Proteoform, Reaction, Role};
use crate::error::IndexError;
use crate::graph::{GraphClient, QueryParams, Record};
use crate::queries;
use crate::relation::{self, Multimap, MultimapBuilder};

pub type StringMultimap = Multimap<String, String>;

/// Reaction column value used by the graph for a protein without reactions.
pub const NO_REACTION: &str = "null";

/// Runs `query` once and folds every row into a `key_field -> value_field`
/// relation.
fn fold_pairs(
    graph: &dyn GraphClient,
    query: &str,
    params: &QueryParams,
    key_field: &str,
    value_field: &str,
) -> Result<StringMultimap, IndexError> {
    let records = graph.execute(query, params)?;
    let mut builder = MultimapBuilder::new();
    for record in &records {
        builder.insert(
            record.text(key_field)?.to_string(),
            record.text(value_field)?.to_string(),
        );
    }
    Ok(builder.build())
}

pub fn genes_to_proteins(
    graph: &dyn GraphClient,
    params: &QueryParams,
) -> Result<StringMultimap, IndexError> {
    fold_pairs(graph, queries::GENES_TO_PROTEINS, params, "gene", "protein")
}

pub fn ensembl_to_proteins(
    graph: &dyn GraphClient,
    params: &QueryParams,
) -> Result<StringMultimap, IndexError> {
    fold_pairs(graph, queries::ENSEMBL_TO_PROTEINS, params, "ensembl", "protein")
}

pub fn physical_entities_to_reactions(
    graph: &dyn GraphClient,
    params: &QueryParams,
) -> Result<StringMultimap, IndexError> {
    fold_pairs(
        graph,
        queries::PHYSICAL_ENTITIES_TO_REACTIONS,
        params,
        "physicalEntity",
        "reaction",
    )
}

pub fn reactions_to_pathways(
    graph: &dyn GraphClient,
    params: &QueryParams,
) -> Result<StringMultimap, IndexError> {
    fold_pairs(
        graph,
        queries::REACTIONS_TO_PATHWAYS,
        params,
        "reaction",
        "pathway",
    )
}

pub fn pathways_to_top_level_pathways(
    graph: &dyn GraphClient,
    params: &QueryParams,
) -> Result<StringMultimap, IndexError> {
    fold_pairs(
        graph,
        queries::PATHWAYS_TO_TOP_LEVEL_PATHWAYS,
        params,
        "pathway",
        "topLevelPathway",
    )
}

/// Protein to reaction ids. A `"null"` reaction keeps the protein as a key
/// with no values; reaction ids missing from `reactions` are dropped.
pub fn proteins_to_reactions(
    graph: &dyn GraphClient,
    params: &QueryParams,
    reactions: &BTreeMap<String, Reaction>,
) -> Result<StringMultimap, IndexError> {
    let records = graph.execute(queries::PROTEINS_TO_REACTIONS, params)?;
    let mut builder = MultimapBuilder::new();
    let mut unknown = 0usize;
    for record in &records {
        let protein = record.text("protein")?.to_string();
        match record.optional_text("reaction")? {
            None | Some(NO_REACTION) => {
                builder.insert_key(protein);
            }
            Some(reaction) if reactions.contains_key(reaction) => {
                builder.insert(protein, reaction.to_string());
            }
            Some(reaction) => {
                debug!(protein = %protein, reaction, "reaction missing from catalogue");
                unknown += 1;
                builder.insert_key(protein);
            }
        }
    }
    if unknown > 0 {
        warn!(unknown, "dropped reactions missing from the reaction catalogue");
    }
    Ok(builder.build())
}

/// Reaction catalogue keyed by stable id, with participants and roles
/// accumulated across rows.
pub fn reactions(
    graph: &dyn GraphClient,
    params: &QueryParams,
) -> Result<BTreeMap<String, Reaction>, IndexError> {
    let records = graph.execute(queries::REACTIONS, params)?;
    let mut reactions = BTreeMap::<String, Reaction>::new();
    for record in &records {
        let id = record.text("reaction")?;
        let name = display_name(record)?;
        let reaction = reactions
            .entry(id.to_string())
            .or_insert_with(|| Reaction::new(id, name));
        let (Some(protein), Some(role)) = (
            record.optional_text("protein")?,
            record.optional_text("role")?,
        ) else {
            continue;
        };
        match role.parse::<Role>() {
            Ok(role) => reaction.add_participant(protein, role),
            Err(err) => warn!(reaction = id, protein, "skipping participant: {err}"),
        }
    }
    Ok(reactions)
}

/// Pathway list with entity and reaction totals. `num_proteoforms_total` is
/// left at zero until [`count_pathway_proteoforms`] runs.
pub fn pathways(
    graph: &dyn GraphClient,
    params: &QueryParams,
) -> Result<BTreeMap<String, Pathway>, IndexError> {
    let records = graph.execute(queries::PATHWAYS, params)?;
    let mut pathways = BTreeMap::new();
    for record in &records {
        let id = record.text("pathway")?.to_string();
        let pathway = Pathway {
            id: id.clone(),
            display_name: display_name(record)?,
            num_entities_total: count_field(record, "numEntitiesTotal")?,
            num_reactions_total: count_field(record, "numReactionsTotal")?,
            num_proteoforms_total: 0,
        };
        pathways.entry(id).or_insert(pathway);
    }
    Ok(pathways)
}

/// Sets each pathway's proteoform total to the number of distinct
/// proteoforms taking part in any of its reactions. Pathways without
/// proteoform participants get zero.
pub fn count_pathway_proteoforms(
    pathways: &mut BTreeMap<String, Pathway>,
    proteoforms_to_reactions: &Multimap<Proteoform, String>,
    reactions_to_pathways: &StringMultimap,
) {
    let pathways_to_proteoforms =
        relation::join(&proteoforms_to_reactions.invert(), reactions_to_pathways);
    for (id, pathway) in pathways.iter_mut() {
        pathway.num_proteoforms_total = pathways_to_proteoforms
            .get(id.as_str())
            .map_or(0, |proteoforms| proteoforms.len() as u64);
    }
}

/// Protein display names; the first name seen for a protein is kept.
pub fn proteins_to_names(
    graph: &dyn GraphClient,
    params: &QueryParams,
) -> Result<BTreeMap<String, String>, IndexError> {
    let records = graph.execute(queries::PROTEINS_TO_NAMES, params)?;
    let mut names = BTreeMap::new();
    for record in &records {
        let protein = record.text("protein")?;
        if let Some(name) = record.optional_text("name")? {
            names
                .entry(protein.to_string())
                .or_insert_with(|| name.to_string());
        }
    }
    Ok(names)
}

fn display_name(record: &Record) -> Result<String, IndexError> {
    Ok(record
        .optional_text("displayName")?
        .unwrap_or_default()
        .to_string())
}

fn count_field(record: &Record, field: &str) -> Result<u64, IndexError> {
    let value = record.integer(field)?;
    u64::try_from(value).map_err(|_| IndexError::RecordField {
        field: field.to_string(),
        message: format!("negative count {value}"),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert_matches::assert_matches;

    use super::*;

    struct StaticGraph {
        rows: Vec<Record>,
        queries: Mutex<Vec<String>>,
    }

    impl GraphClient for StaticGraph {
        fn execute(&self, query: &str, _params: &QueryParams) -> Result<Vec<Record>, IndexError> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.rows.clone())
        }
    }

    fn graph(rows: Vec<Record>) -> StaticGraph {
        StaticGraph {
            rows,
            queries: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn null_reaction_keeps_protein_key() {
        let graph = graph(vec![
            Record::new().with("protein", "P1").with("reaction", "null"),
            Record::new().with("protein", "P2").with("reaction", "R-1"),
            Record::new().with("protein", "P2").with("reaction", "R-1"),
        ]);
        let mut catalogue = BTreeMap::new();
        catalogue.insert("R-1".to_string(), Reaction::new("R-1", "binding"));

        let relation = proteins_to_reactions(&graph, &QueryParams::new(), &catalogue).unwrap();

        assert!(relation.get("P1").unwrap().is_empty());
        assert_eq!(relation.get("P2").unwrap().len(), 1);
        assert_eq!(graph.queries.lock().unwrap().len(), 1);
    }

    #[test]
    fn reactions_collect_participants_and_roles() {
        let graph = graph(vec![
            Record::new()
                .with("reaction", "R-1")
                .with("displayName", "Insulin binds receptor")
                .with("protein", "P01308")
                .with("role", "input"),
            Record::new()
                .with("reaction", "R-1")
                .with("displayName", "Insulin binds receptor")
                .with("protein", "P01308")
                .with("role", "catalystActivity"),
            Record::new()
                .with("reaction", "R-2")
                .with("displayName", "Orphan")
                .with("protein", None::<&str>)
                .with("role", None::<&str>),
        ]);

        let reactions = reactions(&graph, &QueryParams::new()).unwrap();

        assert_eq!(reactions.len(), 2);
        let roles = &reactions["R-1"].participants["P01308"];
        assert!(roles.contains(&Role::Input));
        assert!(roles.contains(&Role::CatalystActivity));
        assert!(reactions["R-2"].participants.is_empty());
    }

    #[test]
    fn pathway_counts_must_be_non_negative() {
        let graph = graph(vec![
            Record::new()
                .with("pathway", "R-HSA-1")
                .with("displayName", "Metabolism")
                .with("numEntitiesTotal", -1i64)
                .with("numReactionsTotal", 2i64),
        ]);
        assert!(pathways(&graph, &QueryParams::new()).is_err());
    }

    #[test]
    fn display_name_of_the_wrong_type_is_an_error() {
        let graph = graph(vec![
            Record::new()
                .with("reaction", "R-1")
                .with("displayName", 7i64)
                .with("protein", None::<&str>)
                .with("role", None::<&str>),
        ]);
        let err = reactions(&graph, &QueryParams::new()).unwrap_err();
        assert_matches!(err, IndexError::RecordField { field, .. } if field == "displayName");
    }

    #[test]
    fn compartment_copies_of_one_proteoform_count_once() {
        let mut pathways = BTreeMap::new();
        for id in ["R-HSA-1", "R-HSA-2"] {
            pathways.insert(
                id.to_string(),
                Pathway {
                    id: id.to_string(),
                    display_name: String::new(),
                    num_entities_total: 1,
                    num_reactions_total: 2,
                    num_proteoforms_total: 0,
                },
            );
        }
        // Two physical entities of one unmodified P1 resolve to the same key.
        let mut entity_reactions = MultimapBuilder::new();
        entity_reactions.insert("E1".to_string(), "R-1".to_string());
        entity_reactions.insert("E2".to_string(), "R-2".to_string());
        let mut entity_proteoforms = MultimapBuilder::new();
        entity_proteoforms.insert("E1".to_string(), Proteoform::new("P1", None, Vec::new()));
        entity_proteoforms.insert("E2".to_string(), Proteoform::new("P1", None, Vec::new()));
        let proteoforms_to_reactions =
            relation::join(&entity_reactions.build(), &entity_proteoforms.build());
        let mut reactions_to_pathways = MultimapBuilder::new();
        reactions_to_pathways.insert("R-1".to_string(), "R-HSA-1".to_string());
        reactions_to_pathways.insert("R-2".to_string(), "R-HSA-1".to_string());
        let reactions_to_pathways = reactions_to_pathways.build();

        count_pathway_proteoforms(&mut pathways, &proteoforms_to_reactions, &reactions_to_pathways);

        assert_eq!(pathways["R-HSA-1"].num_proteoforms_total, 1);
        assert_eq!(pathways["R-HSA-2"].num_proteoforms_total, 0);
    }
}
