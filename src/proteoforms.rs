use tracing::warn;

use crate::domain::Proteoform;
use crate::error::IndexError;
use crate::graph::{GraphClient, QueryParams, Record};
use crate::queries;
use crate::relation::{Multimap, MultimapBuilder};

/// Both directions of the physical entity to proteoform relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityProteoforms {
    pub entities_to_proteoforms: Multimap<String, Proteoform>,
    pub proteoforms_to_entities: Multimap<Proteoform, String>,
}

impl EntityProteoforms {
    /// Base accession to every proteoform observed for it.
    pub fn proteins_to_proteoforms(&self) -> Multimap<String, Proteoform> {
        let mut builder = MultimapBuilder::new();
        for proteoform in self.proteoforms_to_entities.keys() {
            builder.insert(proteoform.accession().to_string(), proteoform.clone());
        }
        builder.build()
    }
}

/// One resolved row: the proteoform and the physical entities carrying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRow {
    pub proteoform: Proteoform,
    pub physical_entities: Vec<String>,
}

pub fn resolve_row(record: &Record) -> Result<ResolvedRow, IndexError> {
    let protein = record.text("protein")?;
    let isoform = record.optional_text("isoform")?;
    // Modifications come as `type:site` strings or as `[type, site]` pairs.
    let proteoform = match record.pair_list("ptms") {
        Ok(pairs) => {
            let tokens: Vec<String> = pairs
                .iter()
                .map(|(mod_type, site)| format!("{mod_type}:{site}"))
                .collect();
            Proteoform::parse(protein, isoform, tokens.as_slice())?
        }
        Err(_) => Proteoform::parse(protein, isoform, record.text_list("ptms")?)?,
    };
    Ok(ResolvedRow {
        proteoform,
        physical_entities: record.text_list("physicalEntities")?.to_vec(),
    })
}

/// Folds resolver rows into both relation directions. Rows with malformed
/// modification tokens are logged and skipped; equal proteoforms coming from
/// separate rows end up under one key.
pub fn resolve(records: &[Record]) -> EntityProteoforms {
    let mut forward = MultimapBuilder::new();
    let mut backward = MultimapBuilder::new();
    for record in records {
        let row = match resolve_row(record) {
            Ok(row) => row,
            Err(err) => {
                warn!("skipping proteoform row: {err}");
                continue;
            }
        };
        for entity in row.physical_entities {
            forward.insert(entity.clone(), row.proteoform.clone());
            backward.insert(row.proteoform.clone(), entity);
        }
    }
    EntityProteoforms {
        entities_to_proteoforms: forward.build(),
        proteoforms_to_entities: backward.build(),
    }
}

pub fn physical_entities_to_proteoforms(
    graph: &dyn GraphClient,
    params: &QueryParams,
) -> Result<EntityProteoforms, IndexError> {
    let records = graph.execute(queries::PHYSICAL_ENTITIES_TO_PROTEOFORMS, params)?;
    Ok(resolve(&records))
}

#[cfg(test)]
mod tests {
    use crate::graph::FieldValue;

    use super::*;

    fn row(protein: &str, isoform: Option<&str>, ptms: Vec<&str>, entities: Vec<&str>) -> Record {
        Record::new()
            .with("protein", protein)
            .with("isoform", isoform)
            .with("ptms", ptms)
            .with("physicalEntities", entities)
    }

    #[test]
    fn both_directions_are_filled() {
        let resolved = resolve(&[row(
            "P01308",
            None,
            vec!["00798:31", "00087:53"],
            vec!["E1", "E2"],
        )]);

        let proteoform: Proteoform = "P01308;00087:53,00798:31".parse().unwrap();
        assert_eq!(resolved.entities_to_proteoforms.len(), 2);
        assert!(resolved.entities_to_proteoforms.get("E2").unwrap().contains(&proteoform));
        let entities: Vec<_> = resolved
            .proteoforms_to_entities
            .get(&proteoform)
            .unwrap()
            .iter()
            .cloned()
            .collect();
        assert_eq!(entities, vec!["E1", "E2"]);
    }

    #[test]
    fn malformed_row_is_skipped() {
        let resolved = resolve(&[
            row("P1", None, vec!["00046:abc"], vec!["E1"]),
            row("P2", Some("P2-2"), vec![], vec!["E2"]),
        ]);
        assert!(resolved.entities_to_proteoforms.get("E1").is_none());
        let proteoform = resolved
            .entities_to_proteoforms
            .get("E2")
            .unwrap()
            .iter()
            .next()
            .unwrap();
        assert_eq!(proteoform.to_string(), "P2-2;");
    }

    #[test]
    fn modifications_may_arrive_as_pairs() {
        let record = Record::new()
            .with("protein", "P01308")
            .with("isoform", None::<&str>)
            .with(
                "ptms",
                FieldValue::PairList(vec![
                    ("00798".to_string(), "31".to_string()),
                    ("00087".to_string(), "53".to_string()),
                ]),
            )
            .with("physicalEntities", vec!["E1"]);
        let row = resolve_row(&record).unwrap();
        assert_eq!(row.proteoform.to_string(), "P01308;00087:53,00798:31");
    }

    #[test]
    fn proteins_to_proteoforms_groups_by_base_accession() {
        let resolved = resolve(&[
            row("P2", Some("P2-2"), vec![], vec!["E1"]),
            row("P2", None, vec!["00046:null"], vec!["E2"]),
        ]);
        let by_protein = resolved.proteins_to_proteoforms();
        assert_eq!(by_protein.len(), 1);
        assert_eq!(by_protein.get("P2").unwrap().len(), 2);
    }
}
