use serde::{Deserialize, Serialize};

/// Entity identifiers are plain integers, identity-assigned on create.
pub type Id = i64;

/// A single field-level validation failure, reported in 400 responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}
