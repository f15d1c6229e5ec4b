use anyhow::{Context, Result};
use csv::ReaderBuilder;
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use crate::models::{AreaType, MunicipalIndexEntry, PostalCodeEntry};
use crate::pip::normalize_admin_code;

//schema (one row per postal code)

//admin_code,municipality,department,postal_code,area_type,preferred
//76001,Cali,Valle del Cauca,760001,urbano,1
//76001,Cali,Valle del Cauca,760002,urbano,
//76001,Cali,Valle del Cauca,764001,rural,

#[derive(Debug, Deserialize)]
struct Row {
    admin_code: String,
    #[serde(default)]
    municipality: String,
    #[serde(default)]
    department: String,
    postal_code: String,
    #[serde(default)]
    area_type: String,
    #[serde(default)]
    preferred: String,
}

/// Load the municipal index table from CSV (plain or gzip).
pub fn load_municipal_csv(path: &Path) -> Result<Vec<MunicipalIndexEntry>> {
    info!("Loading municipal index from {}", path.display());

    let file = File::open(path).context("Failed to open municipal index file")?;
    let reader: Box<dyn Read> = if path.extension().map_or(false, |e| e == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let entries = parse_municipal_csv(reader)?;
    info!("Loaded {} municipal entries", entries.len());
    Ok(entries)
}

/// Group rows per admin code into index entries, in admin code order.
pub fn parse_municipal_csv<R: Read>(reader: R) -> Result<Vec<MunicipalIndexEntry>> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut grouped: BTreeMap<String, MunicipalIndexEntry> = BTreeMap::new();
    let mut explicit_preference: BTreeSet<String> = BTreeSet::new();

    for (line, result) in csv_reader.deserialize::<Row>().enumerate() {
        let row = result.with_context(|| format!("Bad municipal index row {}", line + 2))?;

        let Some(code) = normalize_admin_code(&row.admin_code) else {
            warn!("Row {}: missing admin code, skipped", line + 2);
            continue;
        };
        if row.postal_code.is_empty() {
            warn!("Row {}: missing postal code, skipped", line + 2);
            continue;
        }
        let area_type = AreaType::parse(&row.area_type).unwrap_or(AreaType::Urban);

        let entry = grouped
            .entry(code.clone())
            .or_insert_with(|| MunicipalIndexEntry {
                admin_code: code.clone(),
                municipality: row.municipality.clone(),
                department: row.department.clone(),
                postal_codes: Vec::new(),
                preferred: String::new(),
            });

        if !entry
            .postal_codes
            .iter()
            .any(|e| e.postal_code == row.postal_code)
        {
            entry.postal_codes.push(PostalCodeEntry {
                postal_code: row.postal_code.clone(),
                area_type,
            });
        }

        if is_truthy(&row.preferred) {
            entry.preferred = row.postal_code;
            explicit_preference.insert(code);
        }
    }

    Ok(grouped
        .into_values()
        .map(|mut entry| {
            if !explicit_preference.contains(&entry.admin_code) {
                let preferred = entry
                    .urban_codes()
                    .next()
                    .or_else(|| entry.postal_codes.first().map(|e| e.postal_code.as_str()))
                    .unwrap_or_default()
                    .to_string();
                entry.preferred = preferred;
            }
            entry
        })
        .collect())
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "1" | "true" | "si" | "sí" | "s" | "x" | "yes" | "y"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    const TABLE: &str = "\
admin_code,municipality,department,postal_code,area_type,preferred
76001,Cali,Valle del Cauca,760001,urbano,
76001,Cali,Valle del Cauca,760002,urbano,1
76001,Cali,Valle del Cauca,764001,rural,
5001,Medellín,Antioquia,050001,,
,Nowhere,,000000,,
";

    #[test]
    fn test_groups_rows_per_code() {
        let entries = parse_municipal_csv(TABLE.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);

        let medellin = &entries[0];
        assert_eq!(medellin.admin_code, "05001");
        assert_eq!(medellin.preferred, "050001");

        let cali = &entries[1];
        assert_eq!(cali.postal_codes.len(), 3);
        assert_eq!(cali.preferred, "760002");
        assert_eq!(cali.rural_codes().collect::<Vec<_>>(), vec!["764001"]);
        assert!(!cali.is_unambiguous());
    }

    #[test]
    fn test_preferred_defaults_to_first_urban_code() {
        let table = "\
admin_code,municipality,department,postal_code,area_type,preferred
15090,Briceño,Boyacá,154801,rural,
15090,Briceño,Boyacá,154001,urbano,
15090,Briceño,Boyacá,154002,urbano,
25001,Agua de Dios,Cundinamarca,252801,rural,
";
        let entries = parse_municipal_csv(table.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].admin_code, "15090");
        assert_eq!(entries[0].preferred, "154001");
        // no urban code at all: first listed
        assert_eq!(entries[1].preferred, "252801");
    }

    #[test]
    fn test_load_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("municipal.csv.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(TABLE.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let entries = load_municipal_csv(&path).unwrap();
        assert_eq!(entries.len(), 2);
    }
}
