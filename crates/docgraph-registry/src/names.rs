//! Type name validation.
//!
//! Valid type names:
//! - Must be non-empty
//! - Must start with an ASCII letter
//! - May contain ASCII letters, digits, `_` and `::` namespace separators
//! - Must not end with `:`

use crate::error::RegistryError;

/// Validate a type name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use docgraph_registry::names::validate_type_name;
///
/// assert!(validate_type_name("AttributeFloat").is_ok());
/// assert!(validate_type_name("Arch::Wall").is_ok());
/// assert!(validate_type_name("").is_err());
/// assert!(validate_type_name("9Lives").is_err());
/// ```
pub fn validate_type_name(name: &str) -> Result<(), RegistryError> {
    let invalid = |reason: &str| RegistryError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let Some(first) = name.chars().next() else {
        return Err(invalid("type name must not be empty"));
    };
    if !first.is_ascii_alphabetic() {
        return Err(invalid("must start with an ASCII letter"));
    }

    if let Some(ch) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == ':'))
    {
        return Err(invalid(&format!("contains forbidden character: {ch:?}")));
    }

    // Colons only appear as `::` separators between non-empty segments.
    if name.ends_with(':') || name.split("::").any(|seg| seg.is_empty() || seg.contains(':')) {
        return Err(invalid("':' is only allowed as a '::' separator"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        for name in ["Base", "AttributeLinkList", "Arch::Wall", "Ifc::Ifc4::Door", "a_b1"] {
            assert!(validate_type_name(name).is_ok(), "rejected {name}");
        }
    }

    #[test]
    fn invalid_names() {
        for name in ["", "1Wall", "_Hidden", "Wall Type", "Arch:Wall", "Arch::", "Arch:::Wall", "Wall-2"] {
            assert!(validate_type_name(name).is_err(), "accepted {name}");
        }
    }

    #[test]
    fn error_carries_the_name() {
        let err = validate_type_name("bad name").unwrap_err();
        assert!(matches!(err, RegistryError::InvalidName { ref name, .. } if name == "bad name"));
    }
}
