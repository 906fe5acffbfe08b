use crate::error::{AppError, Result};
use crate::models::content::ContentMetadata;

/// Validates a content title.
///
/// # Arguments
///
/// * `title` - The title to validate.
///
/// # Returns
///
/// A `Result<()>` indicating whether the title is valid.
pub fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(AppError::Validation("Title must not be empty".to_string()));
    }

    if title.chars().count() > 255 {
        return Err(AppError::Validation("Title must be at most 255 characters".to_string()));
    }

    Ok(())
}

/// Validates a content price. Must be finite and non-negative.
pub fn validate_price(price: f64) -> Result<()> {
    if !price.is_finite() {
        return Err(AppError::Validation("Price must be a number".to_string()));
    }

    if price < 0.0 {
        return Err(AppError::Validation("Price must not be negative".to_string()));
    }

    Ok(())
}

pub fn validate_metadata(metadata: &ContentMetadata) -> Result<()> {
    validate_title(&metadata.title)?;
    validate_price(metadata.price)?;

    if metadata.description.chars().count() > 10_000 {
        return Err(AppError::Validation(
            "Description must be at most 10000 characters".to_string(),
        ));
    }

    Ok(())
}
