//! Test utilities for property-based testing
//!
//! This module provides generators and helpers for proptest.

#[cfg(test)]
pub mod generators {
    use proptest::prelude::*;

    /// Generate a project name (may contain dots)
    pub fn project_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,12}(\\.[a-z][a-z0-9_]{0,6})?"
    }

    /// Generate a build type
    pub fn build_type() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("debug".to_string()),
            Just("release".to_string()),
            "[a-z][a-z0-9]{0,8}",
        ]
    }

    /// Generate a target type such as `E7-HE`
    pub fn target_type() -> impl Strategy<Value = String> {
        "[A-Z][0-9]{1,2}-(HE|HP|A32)"
    }

    /// Generate `(project, build_type, target)`
    pub fn build_context_parts() -> impl Strategy<Value = (String, String, String)> {
        (project_name(), build_type(), target_type())
    }

    /// Generate an MRAM address
    pub fn hex_address() -> impl Strategy<Value = String> {
        "0x80[0-9a-f]{6}"
    }

    /// Generate a map line that mentions neither the image nor the
    /// package start marker
    pub fn map_noise_line() -> impl Strategy<Value = String> {
        "(0x[0-9a-f]{8}  [a-z_]{1,12}\\.bin  0x[0-9a-f]{4}|[A-Za-z ]{0,30})"
            .prop_filter("must not mention markers", |s| {
                !s.contains("alif-img.bin") && !s.to_lowercase().contains("package start address")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_target_type_generator(target in target_type()) {
            prop_assert!(!target.contains('+'));
            prop_assert!(!target.contains('.'));
        }

        #[test]
        fn test_hex_address_generator(addr in hex_address()) {
            prop_assert_eq!(addr.len(), 10);
            prop_assert!(u64::from_str_radix(&addr[2..], 16).is_ok());
        }

        #[test]
        fn test_noise_line_generator(line in map_noise_line()) {
            prop_assert!(!line.contains("alif-img.bin"));
        }
    }
}
