//! Entity lookup over a custom extractor's output.
//!
//! Table-driven: each business field maps to the entity type label the
//! processor was trained with.

use tracing::debug;

use crate::docai::Entity;
use crate::schema::{ExtractionResult, Field};

/// Entity type label for each scalar field.
pub const ENTITY_LABELS: &[(Field, &str)] = &[
    (Field::Rfc, "RFC"),
    (Field::IdCif, "idCIF"),
    (Field::SocialName, "RazonSocial"),
    (Field::CapitalName, "RegimenCapital"),
    (Field::CommercialName, "Comercial"),
    (Field::StartDate, "InicioDeOperaciones"),
    (Field::Status, "Status"),
    (Field::PostalCode, "CodigoPostal"),
    (Field::Street, "YCalle"),
    (Field::Number, "NumeroExterior"),
    // Label as trained on the processor, spelling included.
    (Field::Location, "NombreDeLaLocallidad"),
    (Field::FederalEntity, "EntidadFederativa"),
    (Field::City, "DemarcacionTerritorial"),
];

pub const ACTIVITIES_LABEL: &str = "ActividadesEconomicas";
pub const OBLIGATIONS_LABEL: &str = "Obligaciones";

/// Run the structured strategy over the processor's entities.
pub fn extract(entities: &[Entity]) -> ExtractionResult {
    let mut result = ExtractionResult::default();
    for (field, label) in ENTITY_LABELS {
        let value = property_by_type(entities, label);
        if value.is_empty() {
            debug!("No '{}' entity for {}", label, field.as_str());
        }
        result.set(*field, value);
    }
    result.activity = collect_by_type(entities, ACTIVITIES_LABEL);
    result.obligations = collect_by_type(entities, OBLIGATIONS_LABEL);
    result
}

/// Mention text of the first entity of type `label`, or empty.
pub fn property_by_type(entities: &[Entity], label: &str) -> String {
    entities
        .iter()
        .find(|e| e.entity_type == label)
        .map(|e| e.mention_text.clone())
        .unwrap_or_default()
}

/// Non-empty mention texts of every entity of type `label`, in service order.
pub fn collect_by_type(entities: &[Entity], label: &str) -> Vec<String> {
    entities
        .iter()
        .filter(|e| e.entity_type == label && !e.mention_text.is_empty())
        .map(|e| e.mention_text.clone())
        .collect()
}
