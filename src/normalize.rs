//! Registry normalization.
//!
//! Turns raw snapshot rows into the canonical per-registry records: trimmed,
//! uppercased text, street-type abbreviations expanded, and rows lacking a
//! required field dropped. Malformed but present values pass through.
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::error::Result;
use crate::models::{AddressRecord, AssociationRecord, EstablishmentRecord, Registry};
use crate::source::{self, RawRow};

/// Raw SIRENE columns.
pub mod sirene {
    pub const SIRET: &str = "siret";
    pub const SIREN: &str = "siren";
    pub const STATUS: &str = "etatAdministratifEtablissement";
    pub const TRADE_NAME: &str = "enseigne1Etablissement";
    pub const USUAL_NAME: &str = "denominationUsuelleEtablissement";
    pub const POSTAL_CODE: &str = "codePostalEtablissement";
    pub const CITY: &str = "libelleCommuneEtablissement";

    pub const COLUMNS: &[&str] = &[
        SIRET,
        SIREN,
        STATUS,
        TRADE_NAME,
        USUAL_NAME,
        POSTAL_CODE,
        CITY,
    ];
}

/// Raw RNA columns.
pub mod rna {
    pub const ID: &str = "id";
    pub const TITLE: &str = "titre";
    pub const POSTAL_CODE: &str = "adrs_codepostal";
    pub const CITY: &str = "adrs_libcommune";

    pub const COLUMNS: &[&str] = &[ID, TITLE, POSTAL_CODE, CITY];
}

/// Raw BAN columns.
pub mod ban {
    pub const NUMBER: &str = "numero";
    pub const STREET: &str = "nom_voie";
    pub const POSTAL_CODE: &str = "code_postal";
    pub const CITY: &str = "nom_commune";
    pub const LONGITUDE: &str = "lon";
    pub const LATITUDE: &str = "lat";

    pub const COLUMNS: &[&str] = &[NUMBER, STREET, POSTAL_CODE, CITY, LONGITUDE, LATITUDE];
}

/// Street-type rewrites, applied in this order on the uppercased street name.
///
/// Literal substring replacement: a later rule sees the output of earlier
/// ones, so the order is part of the normalized output.
pub const STREET_ABBREVIATIONS: &[(&str, &str)] = &[
    ("AV ", "AVENUE "),
    ("ST ", "SAINT "),
    ("BD ", "BOULEVARD "),
];

fn upper(value: Option<&str>) -> Option<String> {
    value.map(str::to_uppercase)
}

pub fn expand_street_abbreviations(street: &str) -> String {
    STREET_ABBREVIATIONS
        .iter()
        .fold(street.to_uppercase(), |acc, (short, long)| acc.replace(short, long))
}

fn parse_coordinate(value: Option<&str>, column: &str) -> Option<f64> {
    let raw = value?;
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            debug!("Unparseable {column} value {raw:?}, treating as absent");
            None
        }
    }
}

/// `None` when the row has no SIRET.
pub fn establishment_from_row(row: RawRow<'_>) -> Option<EstablishmentRecord> {
    let siret = row.get(sirene::SIRET)?;
    let display_name = row
        .get(sirene::TRADE_NAME)
        .or_else(|| row.get(sirene::USUAL_NAME));

    Some(EstablishmentRecord {
        siret: siret.to_string(),
        siren: row.get(sirene::SIREN).map(str::to_string),
        status: row.get(sirene::STATUS).map(str::to_string),
        display_name: upper(display_name),
        postal_code: row.get(sirene::POSTAL_CODE).map(str::to_string),
        city: upper(row.get(sirene::CITY)),
    })
}

/// `None` when the row has no id or no postal code.
pub fn association_from_row(row: RawRow<'_>) -> Option<AssociationRecord> {
    let id_rna = row.get(rna::ID)?;
    let postal_code = row.get(rna::POSTAL_CODE)?;

    Some(AssociationRecord {
        id_rna: id_rna.to_string(),
        display_name: upper(row.get(rna::TITLE)),
        postal_code: postal_code.to_string(),
        city: upper(row.get(rna::CITY)),
    })
}

/// `None` when the row has no postal code or no municipality.
pub fn address_from_row(row: RawRow<'_>) -> Option<AddressRecord> {
    let postal_code = row.get(ban::POSTAL_CODE)?;
    let city = row.get(ban::CITY)?;

    Some(AddressRecord {
        number: row.get(ban::NUMBER).map(str::to_string),
        street: row.get(ban::STREET).map(expand_street_abbreviations),
        postal_code: postal_code.to_string(),
        city: city.to_uppercase(),
        longitude: parse_coordinate(row.get(ban::LONGITUDE), ban::LONGITUDE),
        latitude: parse_coordinate(row.get(ban::LATITUDE), ban::LATITUDE),
    })
}

fn normalize_with<T>(
    registry: Registry,
    source: &SourceConfig,
    columns: &[&str],
    convert: fn(RawRow<'_>) -> Option<T>,
) -> Result<Vec<T>> {
    let mut records = Vec::new();
    let read = source::for_each_row(registry, source, columns, |row| {
        if let Some(record) = convert(row) {
            records.push(record);
        }
    })?;
    info!(
        "Normalized {registry}: kept {} of {read} rows ({} dropped)",
        records.len(),
        read - records.len()
    );
    Ok(records)
}

pub fn normalize_establishments(source: &SourceConfig) -> Result<Vec<EstablishmentRecord>> {
    normalize_with(Registry::Sirene, source, sirene::COLUMNS, establishment_from_row)
}

pub fn normalize_associations(source: &SourceConfig) -> Result<Vec<AssociationRecord>> {
    normalize_with(Registry::Rna, source, rna::COLUMNS, association_from_row)
}

pub fn normalize_addresses(source: &SourceConfig) -> Result<Vec<AddressRecord>> {
    normalize_with(Registry::Ban, source, ban::COLUMNS, address_from_row)
}
