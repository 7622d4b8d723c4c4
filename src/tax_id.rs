//! Syntactic validation of customer tax identifiers.
//!
//! Fiscal documents must reference a customer holding either an RNC
//! (9 digits) or a cédula (11 digits). Separators (`-`, spaces) are
//! accepted and ignored. Validation here is purely syntactic; registry
//! lookups against the tax authority are an external concern.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxIdKind {
    /// 9-digit company registration number
    Rnc,
    /// 11-digit national identity number
    Cedula,
}

impl fmt::Display for TaxIdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaxIdKind::Rnc => write!(f, "RNC"),
            TaxIdKind::Cedula => write!(f, "cedula"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaxIdError {
    #[error("tax id is empty")]
    Empty,
    #[error("tax id contains non-digit characters")]
    NonDigit,
    #[error("tax id has {0} digits; expected 9 (RNC) or 11 (cedula)")]
    BadLength(usize),
}

/// Validates a raw tax identifier, returning which kind it is.
pub fn validate_tax_id(raw: &str) -> Result<TaxIdKind, TaxIdError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '-' | ' '))
        .collect();

    if cleaned.is_empty() {
        return Err(TaxIdError::Empty);
    }
    if !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return Err(TaxIdError::NonDigit);
    }

    match cleaned.len() {
        9 => Ok(TaxIdKind::Rnc),
        11 => Ok(TaxIdKind::Cedula),
        n => Err(TaxIdError::BadLength(n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_rnc() {
        assert_eq!(validate_tax_id("131246789"), Ok(TaxIdKind::Rnc));
    }

    #[test]
    fn accepts_cedula_with_separators() {
        assert_eq!(validate_tax_id("001-1234567-8"), Ok(TaxIdKind::Cedula));
        assert_eq!(validate_tax_id("001 1234567 8"), Ok(TaxIdKind::Cedula));
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(validate_tax_id("12345"), Err(TaxIdError::BadLength(5)));
        assert_eq!(validate_tax_id("1234567890"), Err(TaxIdError::BadLength(10)));
    }

    #[test]
    fn rejects_letters_and_empty() {
        assert_eq!(validate_tax_id("13124678A"), Err(TaxIdError::NonDigit));
        assert_eq!(validate_tax_id("--"), Err(TaxIdError::Empty));
        assert_eq!(validate_tax_id(""), Err(TaxIdError::Empty));
    }
}
