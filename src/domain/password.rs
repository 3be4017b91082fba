use anyhow::anyhow;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

/// Password hashed for accounts created without an explicit password, such as
/// users spawned on the fly during task creation. Accounts carrying this
/// password are expected to have it changed by an operator later.
pub const PLACEHOLDER_PASSWORD: &str = "password";

/// Hashes a plaintext password into a PHC-format Argon2id string
pub fn hash_password(password: &str) -> Result<String, anyhow::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|hash_err| anyhow!("password hashing failed: {hash_err}"))?;

    Ok(hash.to_string())
}

/// Checks a plaintext password against a stored PHC-format hash
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, anyhow::Error> {
    let parsed_hash = PasswordHash::new(stored_hash)
        .map_err(|parse_err| anyhow!("stored password hash is malformed: {parse_err}"))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(verify_err) => Err(anyhow!("password verification failed: {verify_err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use speculoos::prelude::*;

    #[test]
    fn produces_phc_format_hashes_with_unique_salts() {
        let first = hash_password("hunter22").expect("first hash failed");
        let second = hash_password("hunter22").expect("second hash failed");

        assert!(first.starts_with("$argon2id$"));
        assert_ne!(first, second);
    }

    #[test]
    fn round_trips_verification() {
        let hash = hash_password("something secret").expect("hash failed");

        assert_that!(verify_password("something secret", &hash)).is_ok_containing(true);
        assert_that!(verify_password("something else", &hash)).is_ok_containing(false);
    }

    #[test]
    fn rejects_malformed_stored_hashes() {
        assert_that!(verify_password("password", "not-a-phc-string")).is_err();
    }
}
