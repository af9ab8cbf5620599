//! Record types flowing between stages.
//!
//! Normalized snapshots are immutable once built; every derived artifact is
//! rebuilt from them on each run.
use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// The three upstream registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Registry {
    /// Business establishments, keyed by SIRET.
    Sirene,
    /// Nonprofit associations, keyed by RNA id.
    Rna,
    /// Geocoded national address base.
    Ban,
}

impl Registry {
    pub fn as_str(&self) -> &'static str {
        match self {
            Registry::Sirene => "sirene",
            Registry::Rna => "rna",
            Registry::Ban => "ban",
        }
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstablishmentRecord {
    pub siret: String,
    pub siren: Option<String>,
    pub status: Option<String>,
    pub display_name: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationRecord {
    pub id_rna: String,
    pub display_name: Option<String>,
    pub postal_code: String,
    pub city: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub number: Option<String>,
    pub street: Option<String>,
    pub postal_code: String,
    pub city: String,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
}

impl AddressRecord {
    /// `(latitude, longitude)` when both are present.
    pub fn point(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MappingPair {
    pub siret: String,
    pub id_rna: String,
}

/// Believed correspondences between establishments and associations.
///
/// Many-to-many: a SIRET may map to several RNA ids and the reverse. Pairs
/// are unique. The order of [`IdentifierMapping::pairs`] is the order pairs
/// were added and carries no meaning.
#[derive(Debug, Clone, Default)]
pub struct IdentifierMapping {
    pairs: Vec<MappingPair>,
    seen: HashSet<MappingPair>,
}

impl IdentifierMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a pair, returning `false` when it was already present.
    pub fn insert(&mut self, pair: MappingPair) -> bool {
        if self.seen.contains(&pair) {
            return false;
        }
        self.seen.insert(pair.clone());
        self.pairs.push(pair);
        true
    }

    pub fn contains(&self, siret: &str, id_rna: &str) -> bool {
        self.seen.contains(&MappingPair {
            siret: siret.to_string(),
            id_rna: id_rna.to_string(),
        })
    }

    pub fn pairs(&self) -> &[MappingPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Every RNA id mapped to each SIRET, in insertion order.
    pub fn by_siret(&self) -> HashMap<&str, Vec<&str>> {
        let mut grouped: HashMap<&str, Vec<&str>> = HashMap::new();
        for pair in &self.pairs {
            grouped
                .entry(pair.siret.as_str())
                .or_default()
                .push(pair.id_rna.as_str());
        }
        grouped
    }

    /// SIRETs with at least one mapping row.
    pub fn matched_sirets(&self) -> HashSet<&str> {
        self.pairs.iter().map(|p| p.siret.as_str()).collect()
    }
}

impl FromIterator<MappingPair> for IdentifierMapping {
    fn from_iter<I: IntoIterator<Item = MappingPair>>(iter: I) -> Self {
        let mut mapping = Self::new();
        for pair in iter {
            mapping.insert(pair);
        }
        mapping
    }
}

/// Canonical enriched profile of one establishment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldenRecord {
    pub siret: String,
    pub status: Option<String>,
    pub name: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub id_rna: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_ban_validated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsEntry {
    pub postal_code: String,
    pub total_entites: u64,
    pub associations: u64,
    pub entreprises_pures: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchEntry {
    pub siret: String,
    pub name: String,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub is_association: bool,
}
