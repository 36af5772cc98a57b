pub mod loader;
pub mod registry;
pub mod signature;

pub use loader::{ClassMetadata, ImageFileMetadataLoader, MetadataLoader, MethodMetadata, ModuleMetadata};
pub use registry::{Class, Method, Module, ModuleRegistry};
pub use signature::is_valid_signature_desc;

/// Only `a-z`, `A-Z`, digits and `_` are allowed, and a name can't start with a digit —
/// keeps metadata names from colliding with anything downstream (signatures, emitted
/// code, etc.) that might treat them as identifiers.
pub fn validate_metadata_name(name: &str) -> bool {
    let mut chars = name.bytes();
    let Some(first) = chars.next() else {
        return false;
    };
    if !is_name_char(first) || first.is_ascii_digit() {
        return false;
    }
    name.bytes().skip(1).all(is_name_char)
}

fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_leading_digit() {
        assert!(!validate_metadata_name("1Foo"));
    }

    #[test]
    fn rejects_empty() {
        assert!(!validate_metadata_name(""));
    }

    #[test]
    fn accepts_underscored_identifier() {
        assert!(validate_metadata_name("_Foo_Bar9"));
    }

    #[test]
    fn rejects_punctuation() {
        assert!(!validate_metadata_name("Foo.Bar"));
    }
}
