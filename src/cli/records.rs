use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;

use cartero::models::{AddressRecord, ResolutionResult};

/// Input row; header names in Spanish or English
#[derive(Debug, Deserialize)]
struct InputRow {
    #[serde(default, alias = "ciudad", alias = "municipio")]
    city: String,
    #[serde(default, alias = "departamento")]
    department: String,
    #[serde(default, alias = "codigo_dane", alias = "divipola")]
    admin_code: String,
    #[serde(default, alias = "direccion")]
    address: String,
    #[serde(default, alias = "destinatario")]
    recipient: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    city: &'a str,
    department: &'a str,
    admin_code: &'a str,
    address: &'a str,
    postal_code: &'a str,
    lat: Option<f64>,
    lon: Option<f64>,
    sub_area: Option<&'a str>,
    resolved_by: String,
}

pub fn read_records(path: &Path) -> Result<Vec<AddressRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open records file: {}", path.display()))?;

    let mut records = Vec::new();
    for (line, row) in reader.deserialize::<InputRow>().enumerate() {
        let row = row.with_context(|| format!("Bad record on line {}", line + 2))?;
        let mut record = AddressRecord::new(row.city, row.department, row.admin_code, row.address);
        record.recipient = row.recipient.filter(|r| !r.is_empty());
        records.push(record);
    }
    Ok(records)
}

pub fn write_results(path: &Path, records: &[AddressRecord], results: &[ResolutionResult]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;

    for (record, result) in records.iter().zip(results) {
        writer.serialize(OutputRow {
            city: &record.city,
            department: &record.department,
            admin_code: &record.admin_code,
            address: &record.address,
            postal_code: result.code(),
            lat: result.point.map(|p| p.lat),
            lon: result.point.map(|p| p.lon),
            sub_area: result.sub_area.as_deref(),
            resolved_by: format!("{:?}", result.resolved_by),
        })?;
    }
    writer.flush()?;
    Ok(())
}
