use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::AppError;

pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern compiles"));

/// Trims and collapses internal whitespace.
pub fn sanitize(input: &str) -> String {
    WHITESPACE.replace_all(input.trim(), " ").into_owned()
}

pub fn normalize_email(input: &str) -> String {
    input.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

pub fn require(value: Option<&str>, message: &str) -> Result<String, AppError> {
    value
        .map(sanitize)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::validation(message))
}

pub fn check_password_rule(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters."
        )));
    }

    Ok(())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Salted digest stored as `salt$hex`.
pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    let digest = salted_digest(&salt, password);

    format!("{salt}${digest}")
}

pub fn verify_password(stored: &str, password: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, digest)) => {
            bool::from(salted_digest(salt, password).as_bytes().ct_eq(digest.as_bytes()))
        }
        None => false,
    }
}

fn salted_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());

    hex::encode(hasher.finalize())
}

/// Adds two unit counts, rejecting totals that do not fit.
pub fn add_quantities(a: i64, b: i64) -> Result<i64, AppError> {
    a.checked_add(b)
        .ok_or_else(|| AppError::validation("Quantity is too large."))
}

/// Name shown next to a product review.
///
/// Anonymous reviewers appear as their initial plus a short digest of their
/// account id, everyone else as their name followed by their initial.
pub fn reviewer_display_name(full_name: &str, user_id: i64, anonymous: bool) -> String {
    let initial = full_name.chars().next();

    if anonymous {
        let letter = initial
            .map(|c| c.to_uppercase().to_string())
            .unwrap_or_else(|| "A".to_string());
        let digest = sha256_hex(user_id.to_string().as_bytes());

        format!("{letter}-{}", &digest[..6])
    } else {
        match initial {
            Some(c) => format!("{full_name} {c}."),
            None => "Customer".to_string(),
        }
    }
}

/// Rounds a peso amount to centavos.
pub fn round_money(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
