//! Name validation for stages, slots and artifacts.
//!
//! Names end up as keys in the compiled document and as path components on
//! the execution side, so they are restricted to a conservative alphabet.

use crate::errors::DefinitionError;
use regex::Regex;
use std::sync::LazyLock;

static NAME_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-]{0,127}$").ok());

/// Returns true if `name` is usable as a stage, slot or artifact name.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    match NAME_PATTERN.as_ref() {
        Some(pattern) => pattern.is_match(name),
        None => !name.trim().is_empty(),
    }
}

/// Validates a name, naming `what` in the error.
pub fn validate_name(what: &'static str, name: &str) -> Result<(), DefinitionError> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(DefinitionError::InvalidName {
            what,
            name: name.to_string(),
        })
    }
}

/// Validates a pipeline display name. Display names are free text but must
/// not be blank.
pub fn validate_display_name(name: &str) -> Result<(), DefinitionError> {
    if name.trim().is_empty() {
        return Err(DefinitionError::InvalidName {
            what: "pipeline",
            name: name.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["extract", "raw_csv", "model-onnx", "_private", "Stage2"] {
            assert!(is_valid_name(name), "{name} should be valid");
        }
    }

    #[test]
    fn test_invalid_names() {
        for name in ["", " ", "2fast", "has space", "slash/name", "dot.name"] {
            assert!(!is_valid_name(name), "{name:?} should be invalid");
        }
    }

    #[test]
    fn test_validate_name_reports_kind() {
        let err = validate_name("slot", "bad name").unwrap_err();
        assert_eq!(
            err,
            DefinitionError::InvalidName {
                what: "slot",
                name: "bad name".to_string()
            }
        );
    }

    #[test]
    fn test_display_name_must_not_be_blank() {
        assert!(validate_display_name("get_data_train_upload").is_ok());
        assert!(validate_display_name("Fraud detection (v2)").is_ok());
        assert!(validate_display_name("   ").is_err());
    }
}
