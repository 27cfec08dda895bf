use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use argon2::password_hash::{rand_core::OsRng, SaltString};

use crate::models::AccountError;

pub struct PasswordService;

impl PasswordService {
    pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let password_hash = argon2.hash_password(password.as_bytes(), &salt)?;
        Ok(password_hash.to_string())
    }

    pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
        let parsed_hash = PasswordHash::new(hash)?;
        let argon2 = Argon2::default();

        match argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Minimum password rules applied at registration and reset.
    pub fn validate_password(password: &str) -> Result<(), AccountError> {
        if password.len() < 8 {
            return Err(AccountError::ValidationError(
                "Password must be at least 8 characters long".to_string(),
            ));
        }

        if !password.chars().any(|c| c.is_alphabetic()) {
            return Err(AccountError::ValidationError(
                "Password must contain at least one letter".to_string(),
            ));
        }

        if !password.chars().any(|c| c.is_numeric()) {
            return Err(AccountError::ValidationError(
                "Password must contain at least one number".to_string(),
            ));
        }

        let common_passwords = [
            "password", "123456", "password123", "admin", "qwerty",
            "letmein", "welcome", "password1", "abc123",
        ];
        if common_passwords.iter().any(|&common| password.eq_ignore_ascii_case(common)) {
            return Err(AccountError::ValidationError(
                "Password is too common".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hash = PasswordService::hash_password("s3cure-Pass9").unwrap();
        assert!(PasswordService::verify_password("s3cure-Pass9", &hash).unwrap());
        assert!(!PasswordService::verify_password("wrong-pass1", &hash).unwrap());
    }

    #[test]
    fn rejects_short_passwords() {
        assert_matches!(
            PasswordService::validate_password("ab1"),
            Err(AccountError::ValidationError(_))
        );
    }

    #[test]
    fn rejects_digit_only_passwords() {
        assert_matches!(
            PasswordService::validate_password("1234567890"),
            Err(AccountError::ValidationError(_))
        );
    }

    #[test]
    fn rejects_common_passwords() {
        assert_matches!(
            PasswordService::validate_password("password123"),
            Err(AccountError::ValidationError(_))
        );
    }

    #[test]
    fn accepts_reasonable_passwords() {
        assert!(PasswordService::validate_password("clinic-visit-42").is_ok());
    }
}
