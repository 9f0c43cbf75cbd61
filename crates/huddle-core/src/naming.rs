//! Channel and workspace names, and workspace join codes.

use rand::Rng;

use crate::error::RemoteError;

pub const NAME_MIN_LEN: usize = 3;
pub const NAME_MAX_LEN: usize = 80;
pub const JOIN_CODE_LEN: usize = 6;

const JOIN_CODE_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Channel names are lower-case with each whitespace run replaced by `-`.
pub fn normalize_channel_name(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push('-');
            }
            in_space = true;
        } else {
            out.extend(ch.to_lowercase());
            in_space = false;
        }
    }
    out
}

/// Normalize and length-check a channel name.
pub fn channel_name(input: &str) -> Result<String, RemoteError> {
    let name = normalize_channel_name(input);
    check_len("Channel name", &name)?;
    Ok(name)
}

pub fn workspace_name(input: &str) -> Result<String, RemoteError> {
    let name = input.trim().to_string();
    check_len("Workspace name", &name)?;
    Ok(name)
}

fn check_len(what: &str, name: &str) -> Result<(), RemoteError> {
    let len = name.chars().count();
    if (NAME_MIN_LEN..=NAME_MAX_LEN).contains(&len) {
        Ok(())
    } else {
        Err(RemoteError::validation(format!(
            "{what} must be between {NAME_MIN_LEN} and {NAME_MAX_LEN} characters"
        )))
    }
}

pub fn generate_join_code() -> String {
    let mut rng = rand::rng();
    (0..JOIN_CODE_LEN)
        .map(|_| JOIN_CODE_ALPHABET[rng.random_range(0..JOIN_CODE_ALPHABET.len())] as char)
        .collect()
}

pub fn join_code_matches(expected: &str, given: &str) -> bool {
    expected.eq_ignore_ascii_case(given.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_runs_become_single_dashes() {
        assert_eq!(normalize_channel_name("Product  Launch\tQ3"), "product-launch-q3");
        assert_eq!(normalize_channel_name("general"), "general");
        assert_eq!(normalize_channel_name("My Channel "), "my-channel-");
    }

    #[test]
    fn channel_name_length_bounds() {
        assert!(channel_name("ab").is_err());
        assert_eq!(channel_name("a b").unwrap(), "a-b");
        assert!(channel_name(&"x".repeat(80)).is_ok());
        let err = channel_name(&"x".repeat(81)).unwrap_err();
        assert_eq!(err.kind, crate::error::RemoteErrorKind::Validation);
    }

    #[test]
    fn workspace_names_are_trimmed() {
        assert_eq!(workspace_name("  Home ").unwrap(), "Home");
        assert!(workspace_name("  a ").is_err());
    }

    #[test]
    fn join_codes() {
        let code = generate_join_code();
        assert_eq!(code.len(), JOIN_CODE_LEN);
        assert!(code.bytes().all(|b| JOIN_CODE_ALPHABET.contains(&b)));
        assert!(join_code_matches(&code, &code.to_uppercase()));
        assert!(!join_code_matches("abc123", "abc124"));
    }
}
