//! Input records and resolution results.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::GeoPoint;

/// One address to resolve, as delivered by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
    #[serde(default)]
    pub city: String,

    #[serde(default)]
    pub department: String,

    /// Municipality code hint; any width, normalized on lookup
    #[serde(default)]
    pub admin_code: String,

    #[serde(default)]
    pub address: String,

    /// Free text about the recipient (business name, landmark, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
}

impl AddressRecord {
    pub fn new(
        city: impl Into<String>,
        department: impl Into<String>,
        admin_code: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            city: city.into(),
            department: department.into(),
            admin_code: admin_code.into(),
            address: address.into(),
            recipient: None,
        }
    }

    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    /// Recipient text if present and not blank
    pub fn recipient_text(&self) -> Option<&str> {
        self.recipient
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }
}

/// Non-numeric codes standing in for a postal code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sentinel {
    /// Neither city nor address (or no address at all)
    #[serde(rename = "DATOS_INCOMPLETOS")]
    IncompleteData,
    /// No candidate zones and no municipal index entry
    #[serde(rename = "MUNICIPIO_SIN_ZONAS")]
    MunicipalityWithoutZones,
    /// Every geocoding level and provider came back empty
    #[serde(rename = "DIR_NO_ENCONTRADA")]
    AddressNotFound,
    /// A coordinate was found but no zone or index entry matched it
    #[serde(rename = "REVISAR_DIRECCION")]
    ReviewAddress,
    /// Unclassified failure while resolving this record
    #[serde(rename = "ERROR_GEOCODIFICACION")]
    GeocodingError,
    /// The batch was cancelled before this record was attempted
    #[serde(rename = "SIN_PROCESAR")]
    NotProcessed,
}

impl Sentinel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentinel::IncompleteData => "DATOS_INCOMPLETOS",
            Sentinel::MunicipalityWithoutZones => "MUNICIPIO_SIN_ZONAS",
            Sentinel::AddressNotFound => "DIR_NO_ENCONTRADA",
            Sentinel::ReviewAddress => "REVISAR_DIRECCION",
            Sentinel::GeocodingError => "ERROR_GEOCODIFICACION",
            Sentinel::NotProcessed => "SIN_PROCESAR",
        }
    }
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Either a real postal code or a sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Assignment {
    PostalCode(String),
    Sentinel(Sentinel),
}

/// Which step of the chain produced the assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedBy {
    /// Geocoded point fell inside a candidate zone
    Containment,
    /// Municipal index shortcut, no geocoding
    DirectIndex,
    /// Reverse-geocoded sub-area matched a zone's sub-area name
    SubArea,
    /// Preferred code of the municipal entry for the admin code
    IndexByCode,
    /// Preferred code of the municipal entry for the city name
    IndexByName,
    /// Terminal sentinel
    Sentinel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub assignment: Assignment,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub point: Option<GeoPoint>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_area: Option<String>,

    pub resolved_by: ResolvedBy,
}

impl ResolutionResult {
    pub fn postal_code(
        code: impl Into<String>,
        point: Option<GeoPoint>,
        sub_area: Option<String>,
        resolved_by: ResolvedBy,
    ) -> Self {
        Self {
            assignment: Assignment::PostalCode(code.into()),
            point,
            sub_area,
            resolved_by,
        }
    }

    pub fn sentinel(sentinel: Sentinel) -> Self {
        Self {
            assignment: Assignment::Sentinel(sentinel),
            point: None,
            sub_area: None,
            resolved_by: ResolvedBy::Sentinel,
        }
    }

    /// Sentinel that still carries the coordinate that was found
    pub fn sentinel_at(sentinel: Sentinel, point: Option<GeoPoint>) -> Self {
        Self {
            point,
            ..Self::sentinel(sentinel)
        }
    }

    /// The postal code or the sentinel string
    pub fn code(&self) -> &str {
        match &self.assignment {
            Assignment::PostalCode(code) => code,
            Assignment::Sentinel(s) => s.as_str(),
        }
    }

    pub fn sentinel_kind(&self) -> Option<Sentinel> {
        match self.assignment {
            Assignment::Sentinel(s) => Some(s),
            Assignment::PostalCode(_) => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.assignment, Assignment::PostalCode(_))
    }
}
