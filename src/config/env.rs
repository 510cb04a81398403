//! Environment variable helpers shared by the config structs.

/// Read environment variable or return default value
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
pub(crate) fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map_or(default, |v| parse_bool(&v))
}

/// Read environment variable as string or return default
pub(crate) fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

pub(crate) fn parse_bool(value: &str) -> bool {
    let v_lower = value.trim().to_lowercase();
    v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        for truthy in ["true", "TRUE", "1", "yes", "on", " On "] {
            assert!(parse_bool(truthy), "{truthy} should be true");
        }
        for falsy in ["false", "0", "no", "off", "", "maybe"] {
            assert!(!parse_bool(falsy), "{falsy} should be false");
        }
    }

    #[test]
    fn test_env_var_or_default_missing_key() {
        assert_eq!(
            env_var_or_default("RESOURCE_DUPLICATOR_TEST_UNSET_NUMBER", 42_u64),
            42
        );
        assert!(env_var_or_default_bool(
            "RESOURCE_DUPLICATOR_TEST_UNSET_BOOL",
            true
        ));
        assert_eq!(
            env_var_or_default_str("RESOURCE_DUPLICATOR_TEST_UNSET_STR", "json"),
            "json"
        );
    }
}
