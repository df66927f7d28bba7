/// Get environment variable with CASTWAY_ prefix, falling back to unprefixed version
///
/// Checks `CASTWAY_{key}` first, then `{key}`, so hosting platforms that
/// only set `PORT` or `CRON_SECRET` keep working.
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("CASTWAY_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
}

/// Parse a prefixed environment variable, ignoring values that fail to parse.
pub fn parse_env_with_prefix<T: std::str::FromStr>(key: &str) -> Option<T> {
    get_env_with_prefix(key).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_with_prefix() {
        unsafe {
            std::env::set_var("CASTWAY_ENV_TEST_VAR", "prefixed_value");
        }
        assert_eq!(get_env_with_prefix("ENV_TEST_VAR"), Some("prefixed_value".to_string()));
        unsafe {
            std::env::remove_var("CASTWAY_ENV_TEST_VAR");
        }

        unsafe {
            std::env::set_var("ENV_FALLBACK_VAR", "unprefixed_value");
        }
        assert_eq!(get_env_with_prefix("ENV_FALLBACK_VAR"), Some("unprefixed_value".to_string()));
        unsafe {
            std::env::remove_var("ENV_FALLBACK_VAR");
        }

        assert_eq!(get_env_with_prefix("ENV_NON_EXISTENT_VAR"), None);
    }

    #[test]
    fn test_parse_env_with_prefix() {
        unsafe {
            std::env::set_var("CASTWAY_ENV_PARSE_NUM", "42");
            std::env::set_var("CASTWAY_ENV_PARSE_BAD", "forty-two");
        }
        assert_eq!(parse_env_with_prefix::<u64>("ENV_PARSE_NUM"), Some(42));
        assert_eq!(parse_env_with_prefix::<u64>("ENV_PARSE_BAD"), None);
        unsafe {
            std::env::remove_var("CASTWAY_ENV_PARSE_NUM");
            std::env::remove_var("CASTWAY_ENV_PARSE_BAD");
        }
    }
}
