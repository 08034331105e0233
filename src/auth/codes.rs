use rand::distributions::Alphanumeric;
use rand::Rng;

pub const RESET_CODE_LEN: usize = 64;

/// 6-digit numeric code sent by email to prove address ownership.
pub fn verification_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Opaque 64-char code for password resets.
pub fn reset_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RESET_CODE_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_code_is_six_digits() {
        for _ in 0..100 {
            let code = verification_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            assert!(!code.starts_with('0'));
        }
    }

    #[test]
    fn reset_code_is_64_alphanumeric() {
        let code = reset_code();
        assert_eq!(code.len(), RESET_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn reset_codes_do_not_repeat() {
        assert_ne!(reset_code(), reset_code());
    }
}
