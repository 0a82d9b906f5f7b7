use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ProviderError, Result};
use crate::models::ContentValues;

#[allow(clippy::expect_used)]
static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern must compile"));

/// Validation utilities for insert payloads and SQL identifiers
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Fail with `MissingField` on the first required column that is absent
    pub fn require_fields(resource: &'static str, values: &ContentValues, required: &[&'static str]) -> Result<()> {
        match required.iter().copied().find(|column| !values.contains(column)) {
            Some(field) => Err(ProviderError::MissingField { resource, field }),
            None => Ok(()),
        }
    }

    /// True when `name` can be spliced into SQL as a table or column name
    #[must_use]
    pub fn is_identifier(name: &str) -> bool {
        name.len() <= 64 && IDENTIFIER.is_match(name)
    }

    /// Validate a form prefix before it is used to name a data table
    pub fn validate_form_prefix(prefix: &str) -> Result<()> {
        if prefix.trim().is_empty() {
            return Err(ProviderError::SchemaMismatch("form prefix cannot be empty".to_string()));
        }

        if !Self::is_identifier(prefix) {
            return Err(ProviderError::SchemaMismatch(format!(
                "form prefix '{prefix}' is not a valid table identifier"
            )));
        }

        Ok(())
    }

    /// Validate the column names of an insert payload
    pub fn validate_columns(resource: &str, values: &ContentValues) -> Result<()> {
        if values.is_empty() {
            return Err(ProviderError::InsertFailed {
                resource: resource.to_string(),
                reason: "no values supplied".to_string(),
            });
        }

        if let Some((column, _)) = values.iter().find(|(column, _)| !Self::is_identifier(column)) {
            return Err(ProviderError::InsertFailed {
                resource: resource.to_string(),
                reason: format!("invalid column name '{column}'"),
            });
        }

        Ok(())
    }

    /// Validate a query projection
    pub fn validate_projection(resource: &str, projection: &[String]) -> Result<()> {
        match projection.iter().find(|column| !Self::is_identifier(column)) {
            Some(column) => Err(ProviderError::UnsupportedOperation(format!(
                "invalid projection column '{column}' for {resource}"
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_rules() {
        assert!(InputValidator::is_identifier("formdata_bednets"));
        assert!(InputValidator::is_identifier("_x1"));
        assert!(!InputValidator::is_identifier("1abc"));
        assert!(!InputValidator::is_identifier("bad name"));
        assert!(!InputValidator::is_identifier("x; DROP TABLE y"));
        assert!(!InputValidator::is_identifier(""));
    }
}
