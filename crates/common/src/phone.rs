//! Phone number normalization.
//!
//! Produces the canonical digit-only recipient identifier used everywhere
//! upstream of the sidecar. Transport suffixes (`@c.us`) are appended only
//! at the point of talking to the sidecar, never here.

use crate::error::Error;

/// Country code prepended to bare 10-digit numbers when none is configured.
pub const DEFAULT_COUNTRY_CODE: &str = "91";

/// Normalize a raw phone number to its canonical digit string.
///
/// Strips every non-digit character. Numbers that come out exactly 10
/// digits long are assumed to be national and get `country_code` prepended;
/// anything else is passed through untouched, which makes the function
/// idempotent on its own output.
pub fn normalize(raw: &str, country_code: &str) -> Result<String, Error> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.is_empty() {
        return Err(Error::InvalidRecipient);
    }

    if digits.len() == 10 {
        return Ok(format!("{country_code}{digits}"));
    }

    Ok(digits)
}
