//! Fixed event code catalog

use trackrelay_domain::constants::UNKNOWN_EVENT_DESCRIPTION;

/// Partner event codes and their descriptions.
pub const EVENT_CATALOG: &[(i64, &str)] = &[
    (1, "Movimiento"),
    (2, "Encendido"),
    (3, "Apagado"),
    (4, "Pánico"),
    (5, "Exceso de velocidad"),
    (6, "Detenido"),
    (33, "Batería baja"),
    (34, "Batería alta"),
    (273, "Frenada brusca media"),
    (274, "Aceleración brusca media"),
    (277, "Aceleración brusca alta"),
];

/// Catalog description for `code`, if it is a known integral code.
#[allow(clippy::cast_possible_truncation)]
pub fn catalog_description(code: f64) -> Option<&'static str> {
    if code.fract() != 0.0 || code.abs() > f64::from(u32::MAX) {
        return None;
    }
    let code = code as i64;
    EVENT_CATALOG.iter().find(|(known, _)| *known == code).map(|(_, description)| *description)
}

/// Description sent with an event.
///
/// A non-empty description from the source row wins, then the catalog, then
/// the generic fallback.
pub fn describe_event(source: Option<&str>, code: f64) -> String {
    match source {
        Some(description) if !description.is_empty() => description.to_string(),
        _ => catalog_description(code).unwrap_or(UNKNOWN_EVENT_DESCRIPTION).to_string(),
    }
}
