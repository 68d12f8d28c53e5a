//! Trigger token generation

use rand::Rng;
use rand::distr::Alphanumeric;

/// Length of generated trigger tokens.
pub const TRIGGER_TOKEN_LENGTH: usize = 32;

/// Generates a random alphanumeric trigger token
///
/// The token is the only credential embedded in a pipeline's webhook
/// URL, so it comes from the thread-local CSPRNG.
pub fn generate_trigger_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TRIGGER_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_length() {
        assert_eq!(generate_trigger_token().len(), TRIGGER_TOKEN_LENGTH);
    }

    #[test]
    fn test_token_is_alphanumeric() {
        let token = generate_trigger_token();
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_tokens_do_not_repeat() {
        let a = generate_trigger_token();
        let b = generate_trigger_token();
        assert_ne!(a, b);
    }
}
