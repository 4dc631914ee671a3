// ABOUTME: Deterministic PIN-to-credential derivation for the disguised login flow
// ABOUTME: Maps (PIN, platform identity) to a stable hex credential that is never stored

use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};

/// Domain half of the derived email-like account key.
pub const ACCOUNT_DOMAIN: &str = "haven.id";

/// Derive the authentication credential from the entered PIN and the
/// platform-supplied user identity. Deterministic: the same pair always
/// yields the same value, and the value only ever travels as the password
/// field of an authentication request. The backend's own password hashing
/// is the only at-rest form of this secret.
pub fn derive_credential(pin: &str, platform_id: &str) -> Result<String> {
    if pin.len() != 4 || !pin.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::InvalidInput(
            "PIN must be exactly 4 digits".to_string(),
        ));
    }
    if platform_id.is_empty() {
        return Err(AppError::InvalidInput(
            "platform identity must not be empty".to_string(),
        ));
    }

    let mut hasher = Sha256::new();
    hasher.update(pin.as_bytes());
    hasher.update(b"-");
    hasher.update(platform_id.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Email-like key for the account record. One account per platform identity,
/// independent of the PIN.
pub fn derived_email(platform_id: &str) -> String {
    format!("{}@{}", platform_id, ACCOUNT_DOMAIN)
}

/// Stable account id for provisioning. Keyed by the platform identity so
/// account creation is idempotent against the identity, not the PIN.
pub fn account_id_for(platform_id: &str) -> String {
    format!("acct_{}", platform_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_deterministic() {
        let a = derive_credential("1234", "777001").unwrap();
        let b = derive_credential("1234", "777001").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_pin_and_identity_both_contribute() {
        let base = derive_credential("1234", "777001").unwrap();
        assert_ne!(base, derive_credential("4321", "777001").unwrap());
        assert_ne!(base, derive_credential("1234", "777002").unwrap());
    }

    #[test]
    fn test_malformed_pin_rejected() {
        assert!(derive_credential("123", "777001").is_err());
        assert!(derive_credential("12345", "777001").is_err());
        assert!(derive_credential("12a4", "777001").is_err());
        assert!(derive_credential("１２３４", "777001").is_err());
    }

    #[test]
    fn test_empty_identity_rejected() {
        assert!(derive_credential("1234", "").is_err());
    }

    #[test]
    fn test_derived_email_shape() {
        assert_eq!(derived_email("777001"), "777001@haven.id");
        assert_eq!(account_id_for("777001"), "acct_777001");
    }
}
