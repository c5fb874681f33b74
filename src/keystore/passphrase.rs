//! Passphrase strength policy
//!
//! A passphrase protecting vault keys needs at least eight characters with
//! a digit, an uppercase letter and a punctuation/symbol character. Only
//! printable ASCII is accepted; anything else is rejected outright.

use thiserror::Error;

/// Minimum passphrase length
pub const MIN_PASSPHRASE_LENGTH: usize = 8;

/// Why a passphrase was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PassphraseIssue {
    #[error("must be at least {0} characters")]
    TooShort(usize),
    #[error("must contain a digit")]
    MissingDigit,
    #[error("must contain an uppercase letter")]
    MissingUppercase,
    #[error("must contain a punctuation or symbol character")]
    MissingSymbol,
    #[error("contains a disallowed character")]
    DisallowedCharacter,
}

/// Check a passphrase against the policy, reporting the first problem found
pub fn check_passphrase(passphrase: &str) -> Result<(), PassphraseIssue> {
    let mut length = 0;
    let mut digit = false;
    let mut upper = false;
    let mut symbol = false;

    for c in passphrase.chars() {
        match c {
            '0'..='9' => digit = true,
            'A'..='Z' => upper = true,
            'a'..='z' | ' ' => {}
            c if c.is_ascii_punctuation() => symbol = true,
            _ => return Err(PassphraseIssue::DisallowedCharacter),
        }
        length += 1;
    }

    if length < MIN_PASSPHRASE_LENGTH {
        return Err(PassphraseIssue::TooShort(MIN_PASSPHRASE_LENGTH));
    }
    if !digit {
        return Err(PassphraseIssue::MissingDigit);
    }
    if !upper {
        return Err(PassphraseIssue::MissingUppercase);
    }
    if !symbol {
        return Err(PassphraseIssue::MissingSymbol);
    }
    Ok(())
}

/// `true` iff the passphrase satisfies the policy
pub fn verify(passphrase: &str) -> bool {
    check_passphrase(passphrase).is_ok()
}
