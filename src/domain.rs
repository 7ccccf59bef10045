use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// Autosomes covered by the variant tables.
pub const CHROMOSOMES: RangeInclusive<u8> = 1..=22;

/// Coordinate token used by the graph for a modification without a known site.
pub const UNKNOWN_SITE: &str = "null";

/// A post-translational modification: PSI-MOD type code plus optional residue site.
///
/// Ordering is by type code, then site, with an unlocalized modification placed
/// after every localized one of the same type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ptm {
    pub mod_type: String,
    pub site: Option<i64>,
}

impl Ptm {
    pub fn new(mod_type: impl Into<String>, site: Option<i64>) -> Self {
        Self {
            mod_type: mod_type.into(),
            site,
        }
    }
}

impl Ord for Ptm {
    fn cmp(&self, other: &Self) -> Ordering {
        self.mod_type
            .cmp(&other.mod_type)
            .then_with(|| match (self.site, other.site) {
                (Some(left), Some(right)) => left.cmp(&right),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    }
}

impl PartialOrd for Ptm {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Ptm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.site {
            Some(site) => write!(f, "{}:{site}", self.mod_type),
            None => write!(f, "{}:{UNKNOWN_SITE}", self.mod_type),
        }
    }
}

impl FromStr for Ptm {
    type Err = IndexError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let (mod_type, coordinate) = token
            .trim()
            .split_once(':')
            .ok_or_else(|| IndexError::InvalidModification(token.to_string()))?;
        if mod_type.is_empty() {
            return Err(IndexError::InvalidModification(token.to_string()));
        }
        let site = match coordinate {
            UNKNOWN_SITE => None,
            value => Some(
                value
                    .parse::<i64>()
                    .map_err(|_| IndexError::InvalidModification(token.to_string()))?,
            ),
        };
        Ok(Self::new(mod_type, site))
    }
}

/// Canonical proteoform identity.
///
/// Equality, ordering and hashing treat the modifications as a set, so two
/// proteoforms built from the same tokens in a different order (or with a
/// repeated token) are the same key. The stored list keeps every token it was
/// built from, sorted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "ProteoformRecord", into = "ProteoformRecord")]
pub struct Proteoform {
    accession: String,
    isoform: Option<String>,
    ptms: Vec<Ptm>,
}

impl Proteoform {
    pub fn new(accession: impl Into<String>, isoform: Option<String>, mut ptms: Vec<Ptm>) -> Self {
        ptms.sort();
        Self {
            accession: accession.into(),
            isoform,
            ptms,
        }
    }

    /// Builds a proteoform from the raw fields of a graph row.
    pub fn parse<S: AsRef<str>>(
        accession: &str,
        isoform: Option<&str>,
        modifications: &[S],
    ) -> Result<Self, IndexError> {
        let ptms = modifications
            .iter()
            .map(|token| token.as_ref().parse::<Ptm>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(accession, isoform.map(str::to_string), ptms))
    }

    pub fn accession(&self) -> &str {
        &self.accession
    }

    pub fn isoform(&self) -> Option<&str> {
        self.isoform.as_deref()
    }

    /// Isoform when one is set, otherwise the base accession.
    pub fn display_accession(&self) -> &str {
        self.isoform.as_deref().unwrap_or(&self.accession)
    }

    /// Distinct modifications in canonical order.
    pub fn ptms(&self) -> impl Iterator<Item = &Ptm> {
        self.ptms
            .iter()
            .enumerate()
            .filter(move |(index, ptm)| *index == 0 || self.ptms[index - 1] != **ptm)
            .map(|(_, ptm)| ptm)
    }

    pub fn is_unmodified(&self) -> bool {
        self.ptms.is_empty()
    }
}

impl PartialEq for Proteoform {
    fn eq(&self, other: &Self) -> bool {
        self.accession == other.accession
            && self.isoform == other.isoform
            && self.ptms().eq(other.ptms())
    }
}

impl Eq for Proteoform {}

impl Ord for Proteoform {
    fn cmp(&self, other: &Self) -> Ordering {
        self.accession
            .cmp(&other.accession)
            .then_with(|| self.isoform.cmp(&other.isoform))
            .then_with(|| self.ptms().cmp(other.ptms()))
    }
}

impl PartialOrd for Proteoform {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for Proteoform {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.accession.hash(state);
        self.isoform.hash(state);
        for ptm in self.ptms() {
            ptm.hash(state);
        }
    }
}

impl fmt::Display for Proteoform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};", self.display_accession())?;
        for (index, ptm) in self.ptms().enumerate() {
            if index > 0 {
                write!(f, ",")?;
            }
            write!(f, "{ptm}")?;
        }
        Ok(())
    }
}

/// Parses the rendering produced by `Display`, e.g. `P01308;00087:53,00798:31`
/// or `P12345-2;`.
impl FromStr for Proteoform {
    type Err = IndexError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let (display, modifications) = trimmed.split_once(';').unwrap_or((trimmed, ""));
        if display.is_empty() {
            return Err(IndexError::InvalidProteoform(value.to_string()));
        }
        let (accession, isoform) = match display.split_once('-') {
            Some((base, _)) if !base.is_empty() => (base, Some(display.to_string())),
            Some(_) => return Err(IndexError::InvalidProteoform(value.to_string())),
            None => (display, None),
        };
        let ptms = modifications
            .split(',')
            .filter(|token| !token.trim().is_empty())
            .map(|token| token.parse::<Ptm>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(accession, isoform, ptms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProteoformRecord {
    accession: String,
    isoform: Option<String>,
    ptms: Vec<Ptm>,
}

impl From<ProteoformRecord> for Proteoform {
    fn from(record: ProteoformRecord) -> Self {
        Proteoform::new(record.accession, record.isoform, record.ptms)
    }
}

impl From<Proteoform> for ProteoformRecord {
    fn from(proteoform: Proteoform) -> Self {
        let ptms = proteoform.ptms().cloned().collect();
        Self {
            accession: proteoform.accession,
            isoform: proteoform.isoform,
            ptms,
        }
    }
}

/// How a protein takes part in a reaction, named after the graph relationship
/// that links the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Input,
    Output,
    CatalystActivity,
    PhysicalEntity,
    Regulator,
    RegulatedBy,
    HasComponent,
    HasMember,
    HasCandidate,
    RepeatedUnit,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Input => "input",
            Role::Output => "output",
            Role::CatalystActivity => "catalystActivity",
            Role::PhysicalEntity => "physicalEntity",
            Role::Regulator => "regulator",
            Role::RegulatedBy => "regulatedBy",
            Role::HasComponent => "hasComponent",
            Role::HasMember => "hasMember",
            Role::HasCandidate => "hasCandidate",
            Role::RepeatedUnit => "repeatedUnit",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = IndexError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let role = match value.trim().to_ascii_lowercase().as_str() {
            "input" => Role::Input,
            "output" => Role::Output,
            "catalystactivity" => Role::CatalystActivity,
            "physicalentity" => Role::PhysicalEntity,
            "regulator" => Role::Regulator,
            "regulatedby" => Role::RegulatedBy,
            "hascomponent" => Role::HasComponent,
            "hasmember" => Role::HasMember,
            "hascandidate" => Role::HasCandidate,
            "repeatedunit" => Role::RepeatedUnit,
            _ => {
                return Err(IndexError::RecordField {
                    field: "role".to_string(),
                    message: format!("unknown participant role {value}"),
                });
            }
        };
        Ok(role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub id: String,
    pub display_name: String,
    pub participants: BTreeMap<String, BTreeSet<Role>>,
}

impl Reaction {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            participants: BTreeMap::new(),
        }
    }

    pub fn add_participant(&mut self, protein: impl Into<String>, role: Role) {
        self.participants
            .entry(protein.into())
            .or_default()
            .insert(role);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pathway {
    pub id: String,
    pub display_name: String,
    pub num_entities_total: u64,
    pub num_reactions_total: u64,
    pub num_proteoforms_total: u64,
}

/// One (chromosome, position, rsID) triple read from a variant table line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Snp {
    pub chromosome: u8,
    pub base_pair: i64,
    pub rs_id: String,
}

impl Snp {
    pub fn new(chromosome: u8, base_pair: i64, rs_id: impl Into<String>) -> Self {
        Self {
            chromosome,
            base_pair,
            rs_id: rs_id.into(),
        }
    }
}
