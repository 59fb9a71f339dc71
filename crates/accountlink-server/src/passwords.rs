//! Credential rules and Argon2 password hashing.
//!
//! - Passwords: at least 8 characters with a lowercase letter, an uppercase
//!   letter and a digit
//! - Usernames: non-empty, not one of [`RESERVED_USERNAMES`]
//! - Hashing uses Argon2id with default parameters and a random salt

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Usernames that collide with account routes.
pub const RESERVED_USERNAMES: [&str; 5] = ["delete", "edit", "new", "register", "unsubscribe"];

/// Checks the password strength rules, returning the first violated rule.
pub fn check_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters long"
        ));
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Err("password must contain a lowercase letter".into());
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err("password must contain an uppercase letter".into());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("password must contain a digit".into());
    }
    Ok(())
}

pub fn check_username(username: &str) -> Result<(), String> {
    let username = username.trim();
    if username.is_empty() {
        return Err("username cannot be empty".into());
    }
    if RESERVED_USERNAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(username))
    {
        return Err(format!("username '{username}' is reserved"));
    }
    Ok(())
}

/// Hash a password for storage using Argon2id.
///
/// # Errors
///
/// Returns `argon2::password_hash::Error` if hashing fails (rare).
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a stored Argon2 hash.
///
/// Returns `Err` only if the hash format is invalid.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    let result = Argon2::default().verify_password(password.as_bytes(), &parsed_hash);
    Ok(result.is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_rules() {
        assert!(check_password_strength("Secret123").is_ok());
        assert!(check_password_strength("Se1").unwrap_err().contains("8 characters"));
        assert!(check_password_strength("SECRET123").unwrap_err().contains("lowercase"));
        assert!(check_password_strength("secret123").unwrap_err().contains("uppercase"));
        assert!(check_password_strength("SecretPass").unwrap_err().contains("digit"));
    }

    #[test]
    fn test_reserved_usernames() {
        for name in RESERVED_USERNAMES {
            assert!(check_username(name).is_err(), "{name} should be reserved");
        }
        assert!(check_username("Register").is_err());
        assert!(check_username("  ").is_err());
        assert!(check_username("alice").is_ok());
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("Secret123").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Secret123", &hash).unwrap());
        assert!(!verify_password("Secret124", &hash).unwrap());
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(verify_password("Secret123", "not-a-hash").is_err());
    }
}
