const VOID_DESC: u8 = b'V';
const BOOL_DESC: u8 = b'B';
const INT_DESC: u8 = b'I';
const FLOAT_DESC: u8 = b'F';
const CLASS_DESC_BEGIN: u8 = b'{';
const CLASS_DESC_END: u8 = b'}';

/// Quick syntactic check of a method signature descriptor, without resolving class
/// references — full verification happens later, during method body verification.
///
/// Outside `{...}`: each byte must be one of `V`, `I`, `F`, `B`; `V` ("void") is only
/// legal at index 0, as a return type. Inside `{...}` (a fully-qualified class name,
/// e.g. `{core.StringBuilder}`): any byte but `}` is accepted, and braces don't nest.
pub fn is_valid_signature_desc(signature: &str) -> bool {
    if signature.is_empty() {
        return false;
    }
    let mut in_class_desc = false;
    for (i, &b) in signature.as_bytes().iter().enumerate() {
        if b == CLASS_DESC_BEGIN {
            if in_class_desc {
                return false;
            }
            in_class_desc = true;
            continue;
        }
        if b == CLASS_DESC_END {
            if !in_class_desc {
                return false;
            }
            in_class_desc = false;
            continue;
        }
        if in_class_desc {
            continue;
        }
        if b == VOID_DESC {
            if i > 0 {
                return false;
            }
            continue;
        }
        if b != BOOL_DESC && b != INT_DESC && b != FLOAT_DESC {
            return false;
        }
    }
    !in_class_desc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_signature_is_invalid() {
        assert!(!is_valid_signature_desc(""));
    }

    #[test]
    fn primitive_only_signature_is_valid() {
        assert!(is_valid_signature_desc("IIB"));
    }

    #[test]
    fn void_only_valid_as_first_byte() {
        assert!(is_valid_signature_desc("V"));
        assert!(!is_valid_signature_desc("IV"));
    }

    #[test]
    fn class_desc_passes_through_arbitrary_bytes() {
        assert!(is_valid_signature_desc("{core.StringBuilder}I"));
    }

    #[test]
    fn unmatched_opening_brace_is_invalid() {
        assert!(!is_valid_signature_desc("I{core.Foo"));
    }

    #[test]
    fn unmatched_closing_brace_is_invalid() {
        assert!(!is_valid_signature_desc("I}"));
    }

    #[test]
    fn nested_class_desc_is_invalid() {
        assert!(!is_valid_signature_desc("{core.{Foo}}"));
    }

    #[test]
    fn empty_class_desc_braces_are_permitted() {
        // Matches the original byte-scanning algorithm's permissiveness: it never
        // checks that anything sits between the braces.
        assert!(is_valid_signature_desc("{}"));
    }

    #[test]
    fn digit_leading_bytes_inside_class_desc_are_permitted() {
        assert!(is_valid_signature_desc("{9Foo}"));
    }
}
