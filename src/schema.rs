//! Extraction result types returned by `POST /upload`.

use serde::{Deserialize, Serialize};

/// Business record assembled from one tax-status certificate.
///
/// Every field defaults to empty: a field the document does not carry is
/// not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub rfc: String,
    pub id_cif: String,
    pub social_name: String,
    pub capital_name: String,
    pub comercial_name: String,
    pub start_date: String,
    pub status: String,
    pub address: Address,
    pub activity: Vec<String>,
    pub obligations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub postal_code: String,
    pub street: String,
    pub number: String,
    pub location: String,
    pub federal_entity: String,
    pub city: String,
}

/// Scalar fields of an [`ExtractionResult`], used as keys by the
/// extraction tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Rfc,
    IdCif,
    SocialName,
    CapitalName,
    CommercialName,
    StartDate,
    Status,
    PostalCode,
    Street,
    Number,
    Location,
    FederalEntity,
    City,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Rfc => "rfc",
            Field::IdCif => "id_cif",
            Field::SocialName => "social_name",
            Field::CapitalName => "capital_name",
            Field::CommercialName => "comercial_name",
            Field::StartDate => "start_date",
            Field::Status => "status",
            Field::PostalCode => "address.postal_code",
            Field::Street => "address.street",
            Field::Number => "address.number",
            Field::Location => "address.location",
            Field::FederalEntity => "address.federal_entity",
            Field::City => "address.city",
        }
    }
}

impl ExtractionResult {
    /// Mutable slot backing a scalar field.
    pub fn field_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Rfc => &mut self.rfc,
            Field::IdCif => &mut self.id_cif,
            Field::SocialName => &mut self.social_name,
            Field::CapitalName => &mut self.capital_name,
            Field::CommercialName => &mut self.comercial_name,
            Field::StartDate => &mut self.start_date,
            Field::Status => &mut self.status,
            Field::PostalCode => &mut self.address.postal_code,
            Field::Street => &mut self.address.street,
            Field::Number => &mut self.address.number,
            Field::Location => &mut self.address.location,
            Field::FederalEntity => &mut self.address.federal_entity,
            Field::City => &mut self.address.city,
        }
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        *self.field_mut(field) = value.into();
    }

    /// Number of non-empty scalar fields plus list entries, for logging.
    pub fn filled_count(&self) -> usize {
        let a = &self.address;
        [
            &self.rfc,
            &self.id_cif,
            &self.social_name,
            &self.capital_name,
            &self.comercial_name,
            &self.start_date,
            &self.status,
            &a.postal_code,
            &a.street,
            &a.number,
            &a.location,
            &a.federal_entity,
            &a.city,
        ]
        .iter()
        .filter(|s| !s.is_empty())
        .count()
            + self.activity.len()
            + self.obligations.len()
    }
}

/// Which extraction runs over the processor's response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Positional line scan plus keyword lookup over the OCR text.
    Scan,
    /// Entity-type lookup over a custom extractor's entities.
    Structured,
}

impl Strategy {
    /// Parse a config or query string into a strategy.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "scan" => Some(Self::Scan),
            "structured" => Some(Self::Structured),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Scan => "scan",
            Strategy::Structured => "structured",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
