//! Identifier generation for stored entities.

use uuid::Uuid;

/// Generate a fresh, globally unique identifier.
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Parse an identifier read back from storage.
pub(crate) fn parse(raw: &str) -> crate::Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| crate::Error::InvalidData(format!("id '{raw}': {e}")))
}
