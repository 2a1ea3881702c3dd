//! Text heuristics over the OCR output of a tax-status certificate.
//!
//! Pure functions, no async. The company block is read positionally after a
//! fixed marker line; the identifier and address fields are read after their
//! Spanish labels.

use tracing::warn;

use crate::schema::{ExtractionResult, Field};

/// Line that precedes the company block.
pub const MARKER_LINE: &str = "Fecha de último cambio de estado:";

/// Fields read from the lines following [`MARKER_LINE`], in order.
pub const POSITIONAL_FIELDS: [Field; 6] = [
    Field::Rfc,
    Field::SocialName,
    Field::CapitalName,
    Field::CommercialName,
    Field::StartDate,
    Field::Status,
];

/// Label preceding each keyword-anchored field.
pub const KEYWORD_FIELDS: &[(Field, &str)] = &[
    (Field::IdCif, "idCIF"),
    (Field::City, "Nombre del Municipio o Demarcación Territorial"),
    (Field::Number, "Número Exterior"),
    (Field::PostalCode, "Código Postal"),
    (Field::Street, "Y Calle"),
    (Field::Location, "Nombre de la Localidad"),
    (Field::FederalEntity, "Nombre de la Entidad Federativa"),
];

/// Run the full scan strategy: positional block plus keyword fields.
pub fn extract(text: &str) -> ExtractionResult {
    let mut result = scan_lines(text);
    for (field, keyword) in KEYWORD_FIELDS {
        result.set(*field, find_by_keyword(text, keyword));
    }
    result
}

/// Fill the six positional fields from the lines after the marker.
///
/// The marker must equal a whole line. A second marker inside or after the
/// block does not restart the count.
pub fn scan_lines(text: &str) -> ExtractionResult {
    let mut result = ExtractionResult::default();
    let mut found = false;
    let mut count = 0;

    for line in split_lines(text) {
        if found && count < POSITIONAL_FIELDS.len() {
            result.set(POSITIONAL_FIELDS[count], line);
            count += 1;
        }

        if line == MARKER_LINE {
            found = true;
        }
    }

    result
}

/// Split on `\n`, dropping one trailing `\r` per line, the final one included.
fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    let body = text.strip_suffix('\n').unwrap_or(text);
    let pieces = if text.is_empty() { None } else { Some(body.split('\n')) };
    pieces
        .into_iter()
        .flatten()
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
}

/// Text after the first occurrence of `keyword` (and any colons right after
/// it) up to the end of that line. Empty when the keyword is absent.
pub fn find_by_keyword(text: &str, keyword: &str) -> String {
    let Some(index) = text.find(keyword) else {
        warn!("Field '{}' not found in document", keyword);
        return String::new();
    };

    let rest = text[index + keyword.len()..].trim_start_matches(':');
    let end = rest.find('\n').unwrap_or(rest.len());
    rest[..end].to_string()
}
