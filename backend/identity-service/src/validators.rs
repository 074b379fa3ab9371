use once_cell::sync::Lazy;
use regex::Regex;
use validator::ValidationError;

/// Input validation utilities for identity service

// Compile regex patterns once at startup
static CITY_CODE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z0-9][A-Z0-9_-]{1,31}$")
        .expect("hardcoded city code regex is invalid - fix source code")
});

static INVITE_CODE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{6}$").expect("hardcoded invite code regex is invalid - fix source code")
});

/// Municipality codes are upper-case identifiers such as `QC` or `CALUMPIT`
pub fn validate_city_code(code: &str) -> bool {
    CITY_CODE_REGEX.is_match(code)
}

/// validator crate compatible custom validator for municipality codes
pub fn validate_city_code_shape(code: &str) -> Result<(), ValidationError> {
    if validate_city_code(code) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_city_code"))
    }
}

/// Invite codes are exactly six ASCII digits
pub fn validate_invite_code(code: &str) -> bool {
    INVITE_CODE_REGEX.is_match(code)
}
