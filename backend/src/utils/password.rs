//! Password strength rules applied on registration and password changes.

use bcrypt::{DEFAULT_COST, hash, verify};
use tokio::task;

use crate::errors::{ServiceError, ServiceResult};

pub const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_SIMILARITY: f64 = 0.7;

const COMMON_PASSWORDS: &[&str] = &[
    "123456", "password", "12345678", "qwerty", "123456789", "12345", "1234", "111111",
    "1234567", "dragon", "123123", "baseball", "abc123", "football", "monkey", "letmein",
    "696969", "shadow", "master", "666666", "qwertyuiop", "123321", "mustang", "1234567890",
    "michael", "654321", "superman", "1qaz2wsx", "7777777", "121212", "000000", "qazwsx",
    "123qwe", "killer", "trustno1", "jordan", "jennifer", "zxcvbnm", "asdfgh", "hunter",
    "buster", "soccer", "harley", "batman", "andrew", "tigger", "sunshine", "iloveyou",
    "2000", "charlie", "robert", "thomas", "hockey", "ranger", "daniel", "starwars",
    "klaster", "112233", "george", "computer", "michelle", "jessica", "pepper", "1111",
    "zxcvbn", "555555", "11111111", "131313", "freedom", "777777", "pass", "maggie",
    "159753", "aaaaaa", "ginger", "princess", "joshua", "cheese", "amanda", "summer",
    "love", "ashley", "nicole", "chelsea", "biteme", "matthew", "access", "yankees",
    "987654321", "dallas", "austin", "thunder", "taylor", "matrix", "mobilemail", "mom",
    "monitor", "monitoring", "montana", "moon", "moscow", "password1", "password123",
    "passw0rd", "welcome", "welcome1", "admin", "admin123", "qwerty123", "iloveyou1",
    "letmein1", "abcdef", "abcd1234", "changeme", "secret", "whatever", "trustme",
];

/// Checks `password` against the strength rules.
///
/// `user_attributes` are values such as the username and email the password
/// must not resemble.
///
/// # Returns
/// Every violated rule as a human-readable message, empty if the password is acceptable
pub fn password_problems(password: &str, user_attributes: &[&str]) -> Vec<String> {
    let mut problems = Vec::new();

    if let Some(attribute) = similar_attribute(password, user_attributes) {
        problems.push(format!("The password is too similar to the {attribute}."));
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        problems.push(format!(
            "This password is too short. It must contain at least {MIN_PASSWORD_LENGTH} characters."
        ));
    }

    let lowered = password.trim().to_lowercase();
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        problems.push("This password is too common.".to_string());
    }

    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.".to_string());
    }

    problems
}

/// Fails with the first violated rule, prefixed the way clients expect.
pub fn validate_password(password: &str, user_attributes: &[&str]) -> ServiceResult<()> {
    match password_problems(password, user_attributes).into_iter().next() {
        Some(problem) => Err(ServiceError::validation(format!("Weak Password: {problem}"))),
        None => Ok(()),
    }
}

/// Hashes `password` with bcrypt on the blocking thread pool.
pub async fn hash_password(password: &str) -> ServiceResult<String> {
    let password = password.to_string();
    task::spawn_blocking(move || hash(password, DEFAULT_COST))
        .await
        .map_err(|e| ServiceError::internal_error(format!("Password hashing task panicked: {e}")))?
        .map_err(|e| ServiceError::internal_error(format!("Password hashing failed: {e}")))
}

/// Verifies `password` against a stored hash; an empty hash never matches.
pub async fn verify_password(password: &str, password_hash: &str) -> ServiceResult<bool> {
    if password_hash.is_empty() {
        return Ok(false);
    }

    let password = password.to_string();
    let password_hash = password_hash.to_string();
    task::spawn_blocking(move || verify(password, &password_hash))
        .await
        .map_err(|e| {
            ServiceError::internal_error(format!("Password verification task panicked: {e}"))
        })?
        .map_err(|e| ServiceError::internal_error(format!("Password verification failed: {e}")))
}

fn similar_attribute(password: &str, user_attributes: &[&str]) -> Option<String> {
    let password = password.to_lowercase();
    let password: Vec<char> = password.chars().collect();

    for attribute in user_attributes {
        let value = attribute.to_lowercase();
        if value.is_empty() {
            continue;
        }

        // an email is compared whole and by its word-like parts
        let mut parts: Vec<&str> = vec![value.as_str()];
        parts.extend(
            value
                .split(|c: char| !c.is_alphanumeric() && c != '_')
                .filter(|p| !p.is_empty()),
        );

        for part in parts {
            let part: Vec<char> = part.chars().collect();
            if similarity_ratio(&password, &part) >= MAX_SIMILARITY {
                let name = if attribute.contains('@') {
                    "email address"
                } else {
                    "username"
                };
                return Some(name.to_string());
            }
        }
    }

    None
}

/// Ratcliff/Obershelp similarity: twice the matched characters over the total length.
fn similarity_ratio(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_characters(a, b) as f64 / total as f64
}

fn matching_characters(a: &[char], b: &[char]) -> usize {
    let (start_a, start_b, len) = longest_common_block(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_characters(&a[..start_a], &b[..start_b])
        + matching_characters(&a[start_a + len..], &b[start_b + len..])
}

fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut previous = vec![0usize; b.len() + 1];

    for i in 0..a.len() {
        let mut current = vec![0usize; b.len() + 1];
        for j in 0..b.len() {
            if a[i] == b[j] {
                current[j + 1] = previous[j] + 1;
                if current[j + 1] > best.2 {
                    best = (i + 1 - current[j + 1], j + 1 - current[j + 1], current[j + 1]);
                }
            }
        }
        previous = current;
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strong_password_is_accepted() {
        assert!(password_problems("Str0ng!Passw0rd123", &["testuser", "test@example.com"]).is_empty());
    }

    #[test]
    fn test_rules() {
        let short = password_problems("Ab1!", &[]);
        assert!(short.iter().any(|p| p.contains("too short")));

        let numeric = password_problems("83920174655", &[]);
        assert_eq!(numeric, vec!["This password is entirely numeric.".to_string()]);

        let common = password_problems("Password123", &[]);
        assert_eq!(common, vec!["This password is too common.".to_string()]);

        let similar = password_problems("testuser1", &["testuser", "someone@example.com"]);
        assert_eq!(
            similar,
            vec!["The password is too similar to the username.".to_string()]
        );
    }

    #[test]
    fn test_validate_password_prefix() {
        let error = validate_password("short", &[]).unwrap_err();
        assert!(error.to_string().contains("Weak Password: This password is too short."));
    }

    #[test]
    fn test_similarity_ratio() {
        let a: Vec<char> = "abcd".chars().collect();
        let b: Vec<char> = "bcde".chars().collect();
        assert!((similarity_ratio(&a, &b) - 0.75).abs() < f64::EPSILON);
        assert_eq!(similarity_ratio(&a, &a), 1.0);
    }

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hashed = hash_password("Str0ng!Passw0rd123").await.unwrap();
        assert_ne!(hashed, "Str0ng!Passw0rd123");
        assert!(verify_password("Str0ng!Passw0rd123", &hashed).await.unwrap());
        assert!(!verify_password("wrong-password", &hashed).await.unwrap());
        assert!(!verify_password("anything", "").await.unwrap());
    }
}
