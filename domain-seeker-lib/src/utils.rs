//! Utility functions for candidate and domain validation.
//!
//! This module contains the validation rules shared by the generator, the
//! resolver and the configuration layer, plus small URL helpers.

use crate::error::DomainSeekerError;
use regex::Regex;

lazy_static::lazy_static! {
    /// Base label: alphanumerics and hyphens, no hyphen at either end, at most 63 chars
    static ref CANDIDATE_RE: Regex =
        Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?$").expect("valid candidate regex");

    /// One or more labels followed by a final label of two or more chars.
    /// Digits and hyphens are allowed in the final label so punycode TLDs match.
    static ref FQDN_RE: Regex =
        Regex::new(r"^([a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z0-9][a-zA-Z0-9\-]{0,61}[a-zA-Z0-9]$").expect("valid fqdn regex");
}

/// Maximum length of a single DNS label.
pub const MAX_LABEL_LEN: usize = 63;

/// Validate a normalized candidate base name.
///
/// Returns the reason for rejection so the generator can log it.
pub fn validate_candidate(value: &str) -> Result<(), DomainSeekerError> {
    if value.is_empty() {
        return Err(DomainSeekerError::invalid_candidate(value, "empty value"));
    }

    if value.len() > MAX_LABEL_LEN {
        return Err(DomainSeekerError::invalid_candidate(
            value,
            format!("longer than {} characters", MAX_LABEL_LEN),
        ));
    }

    if value.starts_with('-') || value.ends_with('-') {
        return Err(DomainSeekerError::invalid_candidate(
            value,
            "cannot start or end with a hyphen",
        ));
    }

    if !CANDIDATE_RE.is_match(value) {
        return Err(DomainSeekerError::invalid_candidate(
            value,
            "only letters, digits and hyphens are allowed",
        ));
    }

    Ok(())
}

pub fn is_valid_candidate(value: &str) -> bool {
    validate_candidate(value).is_ok()
}

/// Check the overall shape of a fully qualified domain before probing it.
pub fn is_valid_fqdn(domain: &str) -> bool {
    domain.len() <= 253 && FQDN_RE.is_match(domain)
}

/// Bring a TLD into `.label` form: trimmed, lowercase, one leading dot.
pub fn normalize_tld(tld: &str) -> String {
    let tld = tld.trim().to_lowercase();
    if tld.starts_with('.') {
        tld
    } else {
        format!(".{}", tld)
    }
}

/// Validate a TLD as typed by the user (must already carry its leading dot).
///
/// Accepts exactly the suffixes `is_valid_fqdn` accepts after a base name.
pub fn validate_tld(tld: &str) -> Result<(), DomainSeekerError> {
    let Some(label) = tld.strip_prefix('.') else {
        return Err(DomainSeekerError::invalid_tld(tld, "must start with '.'"));
    };

    if label.is_empty() {
        return Err(DomainSeekerError::invalid_tld(tld, "missing label after '.'"));
    }

    if label.starts_with('.') || label.ends_with('.') || label.contains("..") {
        return Err(DomainSeekerError::invalid_tld(tld, "empty label"));
    }

    if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-') {
        return Err(DomainSeekerError::invalid_tld(
            tld,
            "only letters, digits, hyphens and dots are allowed",
        ));
    }

    if label.split('.').any(|part| !CANDIDATE_RE.is_match(part)) {
        return Err(DomainSeekerError::invalid_tld(
            tld,
            "labels cannot start or end with a hyphen or exceed 63 characters",
        ));
    }

    if label.rsplit('.').next().is_some_and(|last| last.len() < 2) {
        return Err(DomainSeekerError::invalid_tld(tld, "last label needs two or more characters"));
    }

    Ok(())
}

/// The TLD of a domain, leading dot included ("example.ch" -> ".ch").
pub fn extract_tld(domain: &str) -> Option<String> {
    let (_, tld) = domain.rsplit_once('.')?;
    if tld.is_empty() {
        return None;
    }
    Some(format!(".{}", tld.to_lowercase()))
}

/// Lowercased host of an absolute URL.
pub fn host_of(url: &str) -> Option<String> {
    reqwest::Url::parse(url)
        .ok()?
        .host_str()
        .map(|host| host.to_lowercase())
}

/// Resolve a `Location` header against the URL that returned it.
pub fn resolve_location(base: &str, location: &str) -> Option<String> {
    let base = reqwest::Url::parse(base).ok()?;
    base.join(location.trim()).ok().map(|url| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_candidate() {
        assert!(is_valid_candidate("example"));
        assert!(is_valid_candidate("a"));
        assert!(is_valid_candidate("test-domain"));
        assert!(is_valid_candidate("abc123"));
        assert!(is_valid_candidate(&"a".repeat(63)));

        assert!(!is_valid_candidate(""));
        assert!(!is_valid_candidate("-example"));
        assert!(!is_valid_candidate("example-"));
        assert!(!is_valid_candidate("test.com"));
        assert!(!is_valid_candidate("with space"));
        assert!(!is_valid_candidate("emoji🙂"));
        assert!(!is_valid_candidate(&"a".repeat(64)));
    }

    #[test]
    fn test_validate_candidate_reasons() {
        let err = validate_candidate("-abc").unwrap_err();
        assert!(err.to_string().contains("hyphen"));

        let err = validate_candidate("a_b").unwrap_err();
        assert!(err.to_string().contains("letters, digits and hyphens"));
    }

    #[test]
    fn test_is_valid_fqdn() {
        assert!(is_valid_fqdn("example.com"));
        assert!(is_valid_fqdn("test.co.uk"));

        assert!(!is_valid_fqdn("example"));
        assert!(!is_valid_fqdn(".com"));
        assert!(!is_valid_fqdn("example."));
        assert!(!is_valid_fqdn("-example.com"));
        assert!(!is_valid_fqdn("example.c"));
        assert!(!is_valid_fqdn("example.co-"));
    }

    #[test]
    fn test_accepted_tlds_build_valid_domains() {
        for tld in [".com", ".co.uk", ".c0m", ".xn--p1ai", ".xn--80asehdb"] {
            assert!(validate_tld(tld).is_ok(), "{tld} should be accepted");
            assert!(is_valid_fqdn(&format!("name{tld}")), "name{tld} should be checkable");
        }

        for tld in [".c", ".-com", ".com-", ".co.-uk"] {
            assert!(validate_tld(tld).is_err(), "{tld} should be rejected");
            assert!(!is_valid_fqdn(&format!("name{tld}")), "name{tld} should not be checkable");
        }
    }

    #[test]
    fn test_normalize_and_validate_tld() {
        assert_eq!(normalize_tld("com"), ".com");
        assert_eq!(normalize_tld(" .CH "), ".ch");

        assert!(validate_tld(".com").is_ok());
        assert!(validate_tld(".co.uk").is_ok());
        assert!(validate_tld("com").is_err());
        assert!(validate_tld(".").is_err());
        assert!(validate_tld(".c$m").is_err());
    }

    #[test]
    fn test_extract_tld() {
        assert_eq!(extract_tld("example.ch"), Some(".ch".to_string()));
        assert_eq!(extract_tld("a.b.DE"), Some(".de".to_string()));
        assert_eq!(extract_tld("example"), None);
        assert_eq!(extract_tld("example."), None);
    }

    #[test]
    fn test_url_helpers() {
        assert_eq!(
            host_of("https://rdap.nic.ch/domain/x.ch"),
            Some("rdap.nic.ch".to_string())
        );
        assert_eq!(host_of("not a url"), None);
        assert_eq!(
            resolve_location("https://rdap.org/domain/x.io", "https://rdap.nic.io/domain/x.io"),
            Some("https://rdap.nic.io/domain/x.io".to_string())
        );
        assert_eq!(
            resolve_location("https://rdap.org/domain/x.io", "/other/x.io"),
            Some("https://rdap.org/other/x.io".to_string())
        );
    }
}
