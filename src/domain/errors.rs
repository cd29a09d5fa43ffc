use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Value must be non-negative")]
    MustBeNonNegative,

    #[error("Value must be finite")]
    MustBeFinite,
}

impl From<ValidationError> for String {
    fn from(error: ValidationError) -> Self {
        error.to_string()
    }
}

/// Trims a display name and rejects blank or oversized ones.
pub fn validate_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidName("name must not be empty".to_string()));
    }
    if trimmed.chars().count() > 50 {
        return Err(ValidationError::InvalidName(format!(
            "name must be at most 50 characters, got {}",
            trimmed.chars().count()
        )));
    }
    Ok(trimmed.to_string())
}
