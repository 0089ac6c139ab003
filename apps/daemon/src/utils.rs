//! Daemon utility functions.

/// Expand `${VAR}` patterns with environment variable values.
///
/// Unset variables expand to an empty string. An unterminated `${` is
/// kept verbatim.
pub fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            result.push_str(&rest[start..]);
            return result;
        };
        if let Ok(value) = std::env::var(&after[..end]) {
            result.push_str(&value);
        }
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::expand_env_vars;

    #[test]
    fn expands_known_and_drops_unknown() {
        // SAFETY: single-threaded test touching a variable unique to it.
        unsafe { std::env::set_var("VNCGATE_TEST_SECRET", "hunter2") };
        assert_eq!(
            expand_env_vars("passwd = \"${VNCGATE_TEST_SECRET}\"${VNCGATE_UNSET_VAR}"),
            "passwd = \"hunter2\""
        );
    }

    #[test]
    fn unterminated_is_verbatim() {
        assert_eq!(expand_env_vars("a ${b"), "a ${b");
        assert_eq!(expand_env_vars("no vars"), "no vars");
    }
}
