//! Binary IR persistence.
//!
//! The stream is bincode's fixed-int little-endian encoding of the unit:
//! every record starts with its enum kind tag and variable-size payloads
//! are length-prefixed. The only contract is the round trip: reading back
//! a written unit yields a structurally equal unit.

use crate::ir::Unit;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IrStreamError {
    #[error("malformed binary IR stream: {0}")]
    Malformed(#[from] bincode::Error),
}

/// Serialize a unit to its binary stream form.
pub fn write_unit(unit: &Unit) -> Result<Vec<u8>, IrStreamError> {
    Ok(bincode::serialize(unit)?)
}

/// Deserialize a unit from its binary stream form.
pub fn read_unit(bytes: &[u8]) -> Result<Unit, IrStreamError> {
    Ok(bincode::deserialize(bytes)?)
}
