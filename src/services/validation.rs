//! Local form validation shared by the auth and booking flows.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Loose email shape: something, `@`, something, `.`, something.
    static ref EMAIL_REGEX: Regex = Regex::new(r"\S+@\S+\.\S+").unwrap();
}

pub fn is_email_shaped(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

pub fn require(value: &str, message: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(message.to_string());
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    require(email, "Email is required")?;
    if !is_email_shaped(email) {
        return Err("Please enter a valid email".to_string());
    }
    Ok(())
}
